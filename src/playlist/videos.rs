//! Per-entry enumeration of a playlist.
//!
//! The tool prints one JSON record per playlist entry. Each line is parsed on
//! its own: a bad line is logged and skipped, and progress is reported after
//! every line that yields a video.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::error::{ExtractError, classify_access_text};
use super::info::{RawThumbnail, pick_thumbnail, playlist_url};
use super::model::VideoRecord;
use crate::tool::{InvokeOptions, ToolClient, ToolError};

/// Default hard deadline for one enumeration.
pub const DEFAULT_ENUMERATION_TIMEOUT: Duration = Duration::from_secs(120);

const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// Titles the tool prints for entries that can no longer be watched.
const PLACEHOLDER_TITLES: [&str; 3] = ["Private video", "[Private video]", "Deleted video"];

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Option<Vec<RawThumbnail>>,
}

/// Canonical watch URL for a video id.
#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_BASE}{video_id}")
}

/// Lists the videos of a playlist through a rate-limited tool client.
#[derive(Debug, Clone)]
pub struct PlaylistVideoEnumerator {
    client: ToolClient,
    options: InvokeOptions,
}

impl PlaylistVideoEnumerator {
    /// Creates an enumerator with the default deadline and output cap.
    #[must_use]
    pub fn new(client: ToolClient) -> Self {
        Self {
            client,
            options: InvokeOptions::new(DEFAULT_ENUMERATION_TIMEOUT),
        }
    }

    /// Replaces the invocation limits.
    #[must_use]
    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.options = options;
        self
    }

    /// Enumerates the videos of a playlist URL or bare id.
    ///
    /// `on_progress` receives the running count of parsed videos, in line
    /// order.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::EnumerationTimedOut`] when the deadline elapses
    /// - [`ExtractError::AuthRequired`] / [`ExtractError::PrivateContent`] for access walls
    /// - [`ExtractError::EnumerationExhausted`] when no line yields a video
    #[instrument(skip(self, on_progress))]
    pub async fn enumerate_videos<F>(
        &self,
        target: &str,
        on_progress: F,
    ) -> Result<Vec<VideoRecord>, ExtractError>
    where
        F: FnMut(usize) + Send,
    {
        let url = playlist_url(target);
        let args = vec![
            "--flat-playlist".to_string(),
            "--dump-json".to_string(),
            "--no-warnings".to_string(),
            url,
        ];

        let output = self
            .client
            .invoke(&args, &self.options)
            .await
            .map_err(|error| match error {
                ToolError::Timeout { timeout } => ExtractError::EnumerationTimedOut { timeout },
                other => ExtractError::from_tool_failure(other),
            })?;

        let videos = parse_video_lines(&output, on_progress)?;
        info!(count = videos.len(), "enumerated playlist videos");
        Ok(videos)
    }
}

/// Parses newline-delimited entry records into videos.
///
/// Empty output is an empty playlist. Output with lines but no usable record
/// is classified by its text.
///
/// # Errors
///
/// Returns an access classification or [`ExtractError::EnumerationExhausted`]
/// when non-empty output yields no video.
pub fn parse_video_lines<F>(output: &str, mut on_progress: F) -> Result<Vec<VideoRecord>, ExtractError>
where
    F: FnMut(usize),
{
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        debug!("tool printed no entries; playlist is empty");
        return Ok(Vec::new());
    }

    let mut videos = Vec::with_capacity(lines.len());
    let mut seen = HashSet::with_capacity(lines.len());
    let mut placeholders = 0usize;

    for (index, line) in lines.iter().enumerate() {
        let position = index + 1;
        let video = match parse_entry(line, position) {
            Entry::Video(video) => video,
            Entry::Placeholder => {
                placeholders += 1;
                continue;
            }
            Entry::Malformed => continue,
        };
        if !seen.insert(video.id.clone()) {
            warn!(video_id = %video.id, line = position, "duplicate video id, skipping");
            continue;
        }
        videos.push(video);
        on_progress(videos.len());
    }

    if videos.is_empty() && placeholders == 0 {
        let error = classify_access_text(output).unwrap_or(ExtractError::EnumerationExhausted {
            lines: lines.len(),
        });
        warn!(lines = lines.len(), error = %error, "no parsable entries in tool output");
        return Err(error);
    }

    let skipped = lines.len() - videos.len();
    if skipped > 0 {
        warn!(
            skipped,
            placeholders,
            total = lines.len(),
            "some playlist entries were skipped"
        );
    }
    Ok(videos)
}

/// Outcome of parsing one output line.
enum Entry {
    Video(VideoRecord),
    /// A private or deleted entry the tool still lists.
    Placeholder,
    Malformed,
}

fn parse_entry(line: &str, position: usize) -> Entry {
    let raw: RawEntry = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(line = position, error = %error, "malformed entry record, skipping");
            return Entry::Malformed;
        }
    };

    let Some(id) = raw.id.filter(|id| !id.trim().is_empty()) else {
        warn!(line = position, "entry record has no id, skipping");
        return Entry::Malformed;
    };

    if raw
        .title
        .as_deref()
        .is_some_and(|title| PLACEHOLDER_TITLES.contains(&title.trim()))
    {
        warn!(video_id = %id, line = position, "private or deleted video, skipping");
        return Entry::Placeholder;
    }

    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("Video {position}"));
    let url = raw
        .url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| watch_url(&id));

    let mut video = VideoRecord::new(id, title, url, Utc::now());
    video.duration_seconds = raw.duration.and_then(whole_seconds);
    video.thumbnail_url = pick_thumbnail(raw.thumbnail, raw.thumbnails);
    Entry::Video(video)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(duration: f64) -> Option<u64> {
    (duration.is_finite() && duration >= 0.0).then(|| duration.round() as u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::playlist::model::Availability;

    fn entry(id: &str, title: &str) -> String {
        format!(r#"{{"id":"{id}","title":"{title}","url":"https://www.youtube.com/watch?v={id}"}}"#)
    }

    // ==================== Line Parsing Tests ====================

    #[test]
    fn test_malformed_line_is_skipped() {
        let output = [
            entry("a", "A"),
            "{not json".to_string(),
            entry("b", "B"),
            entry("c", "C"),
        ]
        .join("\n");

        let videos = parse_video_lines(&output, |_| {}).unwrap();

        assert_eq!(videos.len(), 3);
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_progress_is_monotonic_and_in_line_order() {
        let output = [entry("a", "A"), "garbage".to_string(), entry("b", "B"), entry("c", "C")].join("\n");
        let mut counts = Vec::new();

        parse_video_lines(&output, |count| counts.push(count)).unwrap();

        assert_eq!(counts, [1, 2, 3]);
    }

    #[test]
    fn test_new_records_have_default_state() {
        let videos = parse_video_lines(&entry("a", "A"), |_| {}).unwrap();
        let video = &videos[0];

        assert!(!video.downloaded);
        assert_eq!(video.availability, Availability::Available);
        assert_eq!(video.duration_seconds, None);
        assert_eq!(video.thumbnail_url, None);
        assert!(video.download_status.is_none());
    }

    #[test]
    fn test_optional_fields_and_fallbacks() {
        let output = concat!(
            r#"{"id":"a","duration":212.4,"thumbnails":[{"url":"s"},{"url":"l"}]}"#,
            "\n",
            r#"{"id":"b","title":"","duration":null}"#,
        );
        let videos = parse_video_lines(output, |_| {}).unwrap();

        assert_eq!(videos[0].title, "Video 1");
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=a");
        assert_eq!(videos[0].duration_seconds, Some(212));
        assert_eq!(videos[0].thumbnail_url.as_deref(), Some("l"));
        assert_eq!(videos[1].title, "Video 2");
        assert_eq!(videos[1].duration_seconds, None);
    }

    #[test]
    fn test_record_without_id_is_skipped() {
        let output = [r#"{"title":"orphan"}"#.to_string(), entry("a", "A")].join("\n");
        let videos = parse_video_lines(&output, |_| {}).unwrap();
        assert_eq!(videos.len(), 1);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let output = [entry("a", "First"), entry("a", "Second"), entry("b", "B")].join("\n");
        let mut counts = Vec::new();

        let videos = parse_video_lines(&output, |count| counts.push(count)).unwrap();

        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].title, "First");
        assert_eq!(counts, [1, 2]);
    }

    #[test]
    fn test_private_and_deleted_placeholders_are_skipped() {
        let output = [
            entry("a", "A"),
            entry("p1", "Private video"),
            entry("p2", "[Private video]"),
            entry("d1", "Deleted video"),
            entry("b", "B"),
        ]
        .join("\n");
        let mut counts = Vec::new();

        let videos = parse_video_lines(&output, |count| counts.push(count)).unwrap();

        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(counts, [1, 2]);
    }

    #[test]
    fn test_only_placeholders_is_empty_playlist() {
        let output = [entry("p1", "Private video"), entry("d1", "Deleted video")].join("\n");
        let videos = parse_video_lines(&output, |_| {}).unwrap();
        assert!(videos.is_empty());
    }

    // ==================== Failure Classification Tests ====================

    #[test]
    fn test_empty_output_is_empty_playlist() {
        let videos = parse_video_lines("\n   \n", |_| {}).unwrap();
        assert!(videos.is_empty());
    }

    #[test]
    fn test_all_lines_malformed_is_exhausted() {
        let error = parse_video_lines("oops\n{broken\n", |_| {}).unwrap_err();
        assert!(matches!(error, ExtractError::EnumerationExhausted { lines: 2 }));
    }

    #[test]
    fn test_sign_in_output_is_auth_required() {
        let error =
            parse_video_lines("Sign in to confirm you're not a bot\n", |_| {}).unwrap_err();
        assert!(matches!(error, ExtractError::AuthRequired));
    }

    #[test]
    fn test_private_output_is_private_content() {
        let error = parse_video_lines("ERROR: Private video\n", |_| {}).unwrap_err();
        assert!(matches!(error, ExtractError::PrivateContent));
    }

    #[test]
    fn test_whole_seconds_rejects_nonsense() {
        assert_eq!(whole_seconds(-3.0), None);
        assert_eq!(whole_seconds(f64::NAN), None);
        assert_eq!(whole_seconds(59.5), Some(60));
    }
}
