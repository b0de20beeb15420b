//! Playlist and video records.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::info::UNTITLED_PLAYLIST;

/// Whether a video can currently be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Listed and fetchable.
    #[default]
    Available,
    /// Removed or otherwise not fetchable.
    Unavailable,
    /// Requires access the user does not have.
    Private,
    /// Not checked yet.
    Pending,
}

impl Availability {
    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Private => "private",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of the external download step for one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting for the download step.
    Queued,
    /// Transfer in progress.
    Downloading,
    /// File written.
    Completed,
    /// Download step gave up.
    Failed,
}

impl DownloadStatus {
    /// Returns the label used in persisted records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    /// Remote identifier, unique within its playlist.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Watch URL.
    pub url: String,
    /// Thumbnail, when the flattened listing supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Length in seconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    /// Whether the download step has produced a file.
    #[serde(default)]
    pub downloaded: bool,
    /// Where the downloaded file lives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_path: Option<PathBuf>,
    /// Last known state of the download step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_status: Option<DownloadStatus>,
    /// When this video was first observed. Never changes afterwards.
    pub added_at: DateTime<Utc>,
    /// Remote availability.
    #[serde(default)]
    pub availability: Availability,
}

impl VideoRecord {
    /// Creates a freshly observed, not yet downloaded, available video.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            thumbnail_url: None,
            duration_seconds: None,
            downloaded: false,
            download_path: None,
            download_status: None,
            added_at,
            availability: Availability::Available,
        }
    }

    /// Records a completed download.
    pub fn mark_downloaded(&mut self, path: PathBuf) {
        self.downloaded = true;
        self.download_path = Some(path);
        self.download_status = Some(DownloadStatus::Completed);
    }
}

/// Playlist-level metadata from one container fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaylistMetadata {
    /// Remote playlist identifier; empty when none could be determined.
    pub id: String,
    /// Playlist title.
    pub title: String,
    /// Description, empty when absent.
    pub description: String,
    /// Thumbnail URL, empty when absent.
    pub thumbnail_url: String,
    /// Item count the remote service declares.
    pub declared_video_count: usize,
}

/// Where a playlist came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistSource {
    /// Created by the user.
    Local,
    /// Imported from a remote playlist URL.
    Remote,
}

impl PlaylistSource {
    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for PlaylistSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted playlist aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    /// Local identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Thumbnail URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Videos in presentation order, ids unique.
    #[serde(default)]
    pub videos: Vec<VideoRecord>,
    /// Origin of the playlist.
    pub source: PlaylistSource,
    /// Remote URL for imported playlists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    /// Assembles a remote playlist from fetched metadata and videos.
    #[must_use]
    pub fn from_remote(
        id: impl Into<String>,
        metadata: &PlaylistMetadata,
        source_url: impl Into<String>,
        videos: Vec<VideoRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: metadata.title.clone(),
            description: non_empty(&metadata.description),
            thumbnail_url: non_empty(&metadata.thumbnail_url),
            videos,
            source: PlaylistSource::Remote,
            source_url: Some(source_url.into()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a copy updated from re-fetched metadata and a merged video list.
    ///
    /// Blank or placeholder fresh values keep the previous ones. Identity,
    /// source and creation time never change.
    #[must_use]
    pub fn refreshed(
        &self,
        metadata: &PlaylistMetadata,
        videos: Vec<VideoRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let name = if metadata.title.trim().is_empty() || metadata.title == UNTITLED_PLAYLIST {
            self.name.clone()
        } else {
            metadata.title.clone()
        };
        Self {
            id: self.id.clone(),
            name,
            description: non_empty(&metadata.description).or_else(|| self.description.clone()),
            thumbnail_url: non_empty(&metadata.thumbnail_url)
                .or_else(|| self.thumbnail_url.clone()),
            videos,
            source: self.source,
            source_url: self.source_url.clone(),
            created_at: self.created_at,
            updated_at: now,
        }
    }

    /// Returns whether this playlist can be re-synchronized from its source.
    #[must_use]
    pub fn is_refreshable(&self) -> bool {
        self.source == PlaylistSource::Remote
            && self.source_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    /// Looks up a video by id.
    #[must_use]
    pub fn video(&self, id: &str) -> Option<&VideoRecord> {
        self.videos.iter().find(|video| video.id == id)
    }

    /// Looks up a video by id for modification.
    pub fn video_mut(&mut self, id: &str) -> Option<&mut VideoRecord> {
        self.videos.iter_mut().find(|video| video.id == id)
    }

    /// Number of videos with a completed download.
    #[must_use]
    pub fn downloaded_count(&self) -> usize {
        self.videos.iter().filter(|video| video.downloaded).count()
    }
}

/// `Some(value)` unless `value` is blank.
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
