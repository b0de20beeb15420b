//! Single-video tool operations: availability probe and download.
//!
//! Both go through the shared rate-limited [`ToolClient`]. Scheduling of
//! downloads is left to the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::format::{ContainerPreference, select_format};
use crate::playlist::{Availability, VideoRecord};
use crate::tool::{InvokeOptions, ToolClient, ToolError};

/// Default deadline for the availability probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for one download.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// What to download and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Video id, used as the file stem.
    pub video_id: String,
    /// Watch URL handed to the tool.
    pub video_url: String,
    /// Directory the file is written to.
    pub output_dir: PathBuf,
    /// Audio, bounded video, or best.
    pub container: ContainerPreference,
    /// Quality tier label such as `720p`; ignored for audio and best.
    pub quality_tier: String,
}

impl DownloadRequest {
    /// Builds a request for a playlist video.
    pub fn for_video(
        video: &VideoRecord,
        output_dir: impl Into<PathBuf>,
        container: ContainerPreference,
        quality_tier: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video.id.clone(),
            video_url: video.url.clone(),
            output_dir: output_dir.into(),
            container,
            quality_tier: quality_tier.into(),
        }
    }

    /// Path the downloaded file will have, always directly inside `output_dir`.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            file_stem(&self.video_id),
            self.container.file_extension()
        ))
    }
}

/// Turns a remote video id into a single safe file name component.
///
/// Separators, reserved and non-alphanumeric characters collapse to `_`,
/// and leading dots are dropped.
fn file_stem(video_id: &str) -> String {
    let mut out = String::with_capacity(video_id.len());
    let mut prev_sep = false;
    for ch in video_id.chars() {
        let mapped = match ch {
            c if c.is_alphanumeric() || matches!(c, '-' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    let stem = out.trim_start_matches(['.', '_']).trim_end_matches('_');
    if stem.is_empty() {
        "video".to_string()
    } else {
        stem.to_string()
    }
}

/// Builds the tool arguments for `request`.
#[must_use]
pub fn download_args(request: &DownloadRequest) -> Vec<String> {
    let expression = select_format(request.container, &request.quality_tier);
    let mut args = vec![
        "-f".to_string(),
        expression.into(),
        "-o".to_string(),
        path_arg(&request.output_path()),
        "--no-playlist".to_string(),
    ];
    if request.container == ContainerPreference::Audio {
        args.extend([
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
        ]);
    }
    args.push(request.video_url.clone());
    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Probe and download operations for individual videos.
#[derive(Debug, Clone)]
pub struct VideoOperations {
    client: ToolClient,
    probe_options: InvokeOptions,
    download_options: InvokeOptions,
}

impl VideoOperations {
    /// Creates operations with default deadlines.
    #[must_use]
    pub fn new(client: ToolClient) -> Self {
        Self {
            client,
            probe_options: InvokeOptions::new(DEFAULT_PROBE_TIMEOUT),
            download_options: InvokeOptions::new(DEFAULT_DOWNLOAD_TIMEOUT),
        }
    }

    /// Replaces the download deadline.
    #[must_use]
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_options.timeout = timeout;
        self
    }

    /// Checks whether a video can be fetched by asking the tool for its title.
    ///
    /// # Errors
    ///
    /// Only failures to run the tool at all ([`ToolError::BinaryNotFound`],
    /// [`ToolError::Spawn`], [`ToolError::Io`]) are returned; any other failure
    /// means the video is unavailable.
    #[instrument(skip(self))]
    pub async fn probe_availability(&self, video_url: &str) -> Result<Availability, ToolError> {
        let args = vec![
            "--get-title".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            video_url.to_string(),
        ];

        let availability = match self.client.invoke(&args, &self.probe_options).await {
            Ok(title) if !title.trim().is_empty() => Availability::Available,
            Ok(_) => Availability::Unavailable,
            Err(error) => classify_probe_failure(error)?,
        };
        debug!(availability = %availability, "probed video");
        Ok(availability)
    }

    /// Downloads one video and returns the written path.
    ///
    /// # Errors
    ///
    /// Returns the [`ToolError`] of the download run.
    #[instrument(skip(self, request), fields(video_id = %request.video_id, container = %request.container))]
    pub async fn download_video(&self, request: &DownloadRequest) -> Result<PathBuf, ToolError> {
        let args = download_args(request);
        self.client.invoke(&args, &self.download_options).await?;
        let path = request.output_path();
        info!(path = %path.display(), "downloaded video");
        Ok(path)
    }
}

fn classify_probe_failure(error: ToolError) -> Result<Availability, ToolError> {
    match error {
        ToolError::ProcessExecution { ref stderr, .. } => {
            if stderr.to_lowercase().contains("private video") {
                Ok(Availability::Private)
            } else {
                Ok(Availability::Unavailable)
            }
        }
        ToolError::Timeout { .. } => Ok(Availability::Unavailable),
        other => Err(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rate_limiter::{RateLimitPolicy, RateLimiter};
    use crate::tool::ToolRunner;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct ScriptedTool {
        reply: fn() -> Result<String, ToolError>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl ToolRunner for ScriptedTool {
        async fn run(&self, args: &[String], _options: &InvokeOptions) -> Result<String, ToolError> {
            self.calls.lock().unwrap().push(args.to_vec());
            (self.reply)()
        }
    }

    fn operations(reply: fn() -> Result<String, ToolError>) -> (VideoOperations, Arc<ScriptedTool>) {
        let tool = Arc::new(ScriptedTool {
            reply,
            calls: Mutex::new(Vec::new()),
        });
        let limiter = Arc::new(RateLimiter::with_tool_pool(RateLimitPolicy::new(100, 1, 0)));
        let client = ToolClient::new(tool.clone(), limiter);
        (VideoOperations::new(client), tool)
    }

    fn request(container: ContainerPreference) -> DownloadRequest {
        DownloadRequest {
            video_id: "abc".to_string(),
            video_url: "https://www.youtube.com/watch?v=abc".to_string(),
            output_dir: PathBuf::from("/lib"),
            container,
            quality_tier: "720p".to_string(),
        }
    }

    fn title_ok() -> Result<String, ToolError> {
        Ok("A title\n".to_string())
    }

    fn private_failure() -> Result<String, ToolError> {
        Err(ToolError::process_execution(Some(1), "ERROR: Private video. Sign in"))
    }

    fn removed_failure() -> Result<String, ToolError> {
        Err(ToolError::process_execution(Some(1), "ERROR: Video unavailable"))
    }

    fn missing_binary() -> Result<String, ToolError> {
        Err(ToolError::BinaryNotFound {
            path: PathBuf::from("yt-dlp"),
        })
    }

    // ==================== Download Args Tests ====================

    #[test]
    fn test_download_args_for_video() {
        let args = download_args(&request(ContainerPreference::Video));
        assert_eq!(
            args,
            [
                "-f",
                "bestvideo[height<=720]+bestaudio/best[height<=720]",
                "-o",
                "/lib/abc.mp4",
                "--no-playlist",
                "https://www.youtube.com/watch?v=abc",
            ]
        );
    }

    #[test]
    fn test_download_args_for_audio_extracts_mp3() {
        let args = download_args(&request(ContainerPreference::Audio));
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert!(args.contains(&"/lib/abc.mp3".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_output_path_stays_inside_output_dir() {
        let mut req = request(ContainerPreference::Video);
        req.video_id = "../../etc/passwd".to_string();
        let path = req.output_path();
        assert_eq!(path.parent(), Some(Path::new("/lib")));
        assert_eq!(path, PathBuf::from("/lib/etc_passwd.mp4"));

        req.video_id = "..".to_string();
        assert_eq!(req.output_path(), PathBuf::from("/lib/video.mp4"));

        req.video_id = "a\\b%(title)s".to_string();
        assert_eq!(req.output_path(), PathBuf::from("/lib/a_b_title_s.mp4"));
    }

    #[test]
    fn test_file_stem_keeps_ordinary_ids() {
        assert_eq!(file_stem("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(file_stem("a-b_c"), "a-b_c");
    }

    // ==================== Probe Tests ====================

    #[tokio::test]
    async fn test_probe_title_means_available() {
        let (ops, tool) = operations(title_ok);
        let availability = ops.probe_availability("https://x/v").await.unwrap();

        assert_eq!(availability, Availability::Available);
        assert_eq!(tool.calls.lock().unwrap()[0][0], "--get-title");
    }

    #[tokio::test]
    async fn test_probe_private_and_unavailable() {
        let (ops, _) = operations(private_failure);
        assert_eq!(ops.probe_availability("u").await.unwrap(), Availability::Private);

        let (ops, _) = operations(removed_failure);
        assert_eq!(ops.probe_availability("u").await.unwrap(), Availability::Unavailable);
    }

    #[tokio::test]
    async fn test_probe_propagates_missing_binary() {
        let (ops, _) = operations(missing_binary);
        let error = ops.probe_availability("u").await.unwrap_err();
        assert!(matches!(error, ToolError::BinaryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_download_returns_output_path() {
        let (ops, tool) = operations(title_ok);
        let path = ops
            .download_video(&request(ContainerPreference::Best))
            .await
            .unwrap();

        assert_eq!(path, PathBuf::from("/lib/abc.mp4"));
        assert_eq!(tool.calls.lock().unwrap()[0][1], "bestvideo+bestaudio/best");
    }
}
