//! Import progress events and the sink they are delivered to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of an import or refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStage {
    /// Work accepted, nothing fetched yet.
    Initializing,
    /// Fetching playlist container metadata.
    FetchingMetadata,
    /// Listing playlist entries.
    EnumeratingVideos,
    /// Building or merging the playlist aggregate.
    Assembling,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
}

impl ImportStage {
    /// Returns the wire label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::FetchingMetadata => "fetching-metadata",
            Self::EnumeratingVideos => "enumerating-videos",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns whether no further events follow this stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgressEvent {
    /// Current stage.
    pub stage: ImportStage,
    /// Items processed so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_count: Option<usize>,
    /// Expected item total.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    /// Failure description for [`ImportStage::Failed`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ImportProgressEvent {
    /// An event carrying only a stage.
    #[must_use]
    pub fn stage(stage: ImportStage) -> Self {
        Self {
            stage,
            processed_count: None,
            total_count: None,
            error_message: None,
        }
    }

    /// An enumeration progress event.
    #[must_use]
    pub fn enumerating(processed: usize, total: usize) -> Self {
        Self {
            processed_count: Some(processed),
            total_count: Some(total),
            ..Self::stage(ImportStage::EnumeratingVideos)
        }
    }

    /// The terminal success event for `count` videos.
    #[must_use]
    pub fn done(count: usize) -> Self {
        Self {
            processed_count: Some(count),
            total_count: Some(count),
            ..Self::stage(ImportStage::Done)
        }
    }

    /// The terminal failure event.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::stage(ImportStage::Failed)
        }
    }
}

/// Receives progress events, synchronously and in order.
pub trait ProgressSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, event: ImportProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ImportProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ImportProgressEvent) {
        self(event);
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ImportProgressEvent) {}
}
