//! Playlist Sync Core Library
//!
//! This library imports remote video playlists through an external
//! extraction tool and keeps them synchronized, while keeping the request rate
//! toward the remote service under a fixed policy.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`rate_limiter`] - Sliding-window plus cooldown admission per named pool
//! - [`tool`] - Extraction tool resolution, subprocess invocation, rate-limited client
//! - [`format`] - Quality preference to format expression mapping
//! - [`playlist`] - Data model, metadata fetch, video enumeration, merge
//! - [`import`] - Import/refresh orchestration, progress events, persistence seam
//! - [`video`] - Single-video availability probe and download invocation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod format;
pub mod import;
pub mod playlist;
pub mod rate_limiter;
pub mod tool;
pub mod video;

// Re-export commonly used types
pub use format::{ContainerPreference, FormatExpression, select_format};
pub use import::{
    ImportError, ImportOrchestrator, ImportProgressEvent, ImportStage, MemoryPlaylistStore,
    NoProgress, PlaylistStore, ProgressSink, RefreshOutcome, StoreError,
};
pub use playlist::{
    Availability, DownloadStatus, ExtractError, MergeOutcome, Playlist, PlaylistInfoExtractor,
    PlaylistMetadata, PlaylistSource, PlaylistVideoEnumerator, VideoRecord, merge,
};
pub use rate_limiter::{RateLimitPolicy, RateLimiter, TOOL_EXEC_POOL};
pub use tool::{
    BinaryLocator, ExternalToolInvoker, InvokeOptions, ToolClient, ToolError, ToolRunner,
    ToolSettings,
};
pub use video::{DownloadRequest, VideoOperations};
