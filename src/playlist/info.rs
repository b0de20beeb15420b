//! Playlist-level metadata fetch.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::error::ExtractError;
use super::model::PlaylistMetadata;
use crate::tool::{InvokeOptions, ToolClient};

/// Default deadline for the container fetch.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Title used when the container record has none.
pub const UNTITLED_PLAYLIST: &str = "Untitled Playlist";

const PLAYLIST_URL_BASE: &str = "https://www.youtube.com/playlist";

#[derive(Debug, Default, Deserialize)]
struct RawPlaylist {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Option<Vec<RawThumbnail>>,
    #[serde(default)]
    playlist_count: Option<usize>,
    #[serde(default)]
    entries: Option<Vec<serde::de::IgnoredAny>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawThumbnail {
    #[serde(default)]
    pub(crate) url: Option<String>,
}

/// Picks `thumbnail`, else the last (largest) entry of `thumbnails`.
pub(crate) fn pick_thumbnail(
    thumbnail: Option<String>,
    thumbnails: Option<Vec<RawThumbnail>>,
) -> Option<String> {
    thumbnail.filter(|t| !t.trim().is_empty()).or_else(|| {
        thumbnails?
            .into_iter()
            .rev()
            .find_map(|t| t.url.filter(|u| !u.trim().is_empty()))
    })
}

/// Returns the URL the tool should be given for `target`.
///
/// Anything that parses as an absolute URL is passed through; a bare value is
/// treated as a playlist id.
#[must_use]
pub fn playlist_url(target: &str) -> String {
    let target = target.trim();
    if Url::parse(target).is_ok() {
        return target.to_string();
    }
    match Url::parse_with_params(PLAYLIST_URL_BASE, &[("list", target)]) {
        Ok(url) => url.to_string(),
        Err(_) => target.to_string(),
    }
}

/// Extracts the `list=` query parameter from a playlist URL.
#[must_use]
pub fn playlist_id_from_url(target: &str) -> Option<String> {
    let url = Url::parse(target.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "list")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Fetches playlist container metadata through a rate-limited tool client.
#[derive(Debug, Clone)]
pub struct PlaylistInfoExtractor {
    client: ToolClient,
    options: InvokeOptions,
}

impl PlaylistInfoExtractor {
    /// Creates an extractor with the default deadline and output cap.
    #[must_use]
    pub fn new(client: ToolClient) -> Self {
        Self {
            client,
            options: InvokeOptions::new(DEFAULT_METADATA_TIMEOUT),
        }
    }

    /// Replaces the invocation limits.
    #[must_use]
    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.options = options;
        self
    }

    /// Fetches metadata for a playlist URL or bare id.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::NotFound`] when the tool prints nothing
    /// - [`ExtractError::Parse`] when the first line is not JSON
    /// - [`ExtractError::Tool`] (or an access classification) when the run fails
    #[instrument(skip(self))]
    pub async fn fetch_metadata(&self, target: &str) -> Result<PlaylistMetadata, ExtractError> {
        let url = playlist_url(target);
        let args = vec![
            "--flat-playlist".to_string(),
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            url.clone(),
        ];

        let output = self
            .client
            .invoke(&args, &self.options)
            .await
            .map_err(ExtractError::from_tool_failure)?;

        let metadata = parse_metadata(&output, &url)?;
        info!(
            playlist_id = %metadata.id,
            title = %metadata.title,
            declared = metadata.declared_video_count,
            "fetched playlist metadata"
        );
        Ok(metadata)
    }
}

/// Parses the first non-empty line of container output.
///
/// # Errors
///
/// [`ExtractError::NotFound`] for empty output, [`ExtractError::Parse`] for
/// malformed JSON.
pub fn parse_metadata(output: &str, url: &str) -> Result<PlaylistMetadata, ExtractError> {
    let Some(first) = output.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return Err(ExtractError::NotFound {
            target: url.to_string(),
        });
    };

    let raw: RawPlaylist = serde_json::from_str(first).map_err(|source| ExtractError::Parse {
        target: url.to_string(),
        source,
    })?;

    let id = raw
        .id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| playlist_id_from_url(url))
        .unwrap_or_default();
    if id.is_empty() {
        debug!(url, "no playlist id in record or URL");
    }

    let declared_video_count = raw
        .playlist_count
        .or_else(|| raw.entries.as_ref().map(Vec::len))
        .unwrap_or(0);

    Ok(PlaylistMetadata {
        id,
        title: raw
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED_PLAYLIST.to_string()),
        description: raw.description.unwrap_or_default(),
        thumbnail_url: pick_thumbnail(raw.thumbnail, raw.thumbnails).unwrap_or_default(),
        declared_video_count,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "https://www.youtube.com/playlist?list=PLabc";

    #[test]
    fn test_parse_full_record() {
        let output = r#"{"id":"PLabc","title":"Road trip","description":"songs","thumbnail":"https://img/t.jpg","playlist_count":12}"#;
        let metadata = parse_metadata(output, URL).unwrap();

        assert_eq!(metadata.id, "PLabc");
        assert_eq!(metadata.title, "Road trip");
        assert_eq!(metadata.description, "songs");
        assert_eq!(metadata.thumbnail_url, "https://img/t.jpg");
        assert_eq!(metadata.declared_video_count, 12);
    }

    #[test]
    fn test_parse_defaults_missing_fields() {
        let metadata = parse_metadata("{}", URL).unwrap();

        assert_eq!(metadata.id, "PLabc");
        assert_eq!(metadata.title, UNTITLED_PLAYLIST);
        assert_eq!(metadata.description, "");
        assert_eq!(metadata.thumbnail_url, "");
        assert_eq!(metadata.declared_video_count, 0);
    }

    #[test]
    fn test_parse_counts_entries_and_picks_last_thumbnail() {
        let output = r#"{"title":"X","entries":[{},{},{}],"thumbnails":[{"url":"small"},{"url":"large"}]}"#;
        let metadata = parse_metadata(output, URL).unwrap();

        assert_eq!(metadata.declared_video_count, 3);
        assert_eq!(metadata.thumbnail_url, "large");
    }

    #[test]
    fn test_parse_uses_first_non_empty_line_only() {
        let output = "\n  \n{\"title\":\"First\"}\nnot json at all\n";
        assert_eq!(parse_metadata(output, URL).unwrap().title, "First");
    }

    #[test]
    fn test_parse_empty_output_is_not_found() {
        let error = parse_metadata("  \n\n", URL).unwrap_err();
        assert!(matches!(error, ExtractError::NotFound { .. }));
    }

    #[test]
    fn test_parse_invalid_json_is_parse_error() {
        let error = parse_metadata("<html>blocked</html>", URL).unwrap_err();
        assert!(matches!(error, ExtractError::Parse { .. }));
    }

    #[test]
    fn test_playlist_url_wraps_bare_id() {
        assert_eq!(
            playlist_url("PLabc"),
            "https://www.youtube.com/playlist?list=PLabc"
        );
        assert_eq!(playlist_url(URL), URL);
    }

    #[test]
    fn test_playlist_id_from_url() {
        assert_eq!(
            playlist_id_from_url("https://www.youtube.com/watch?v=x&list=PLzz&index=2"),
            Some("PLzz".to_string())
        );
        assert_eq!(playlist_id_from_url("https://www.youtube.com/watch?v=x"), None);
        assert_eq!(playlist_id_from_url("PLabc"), None);
    }
}
