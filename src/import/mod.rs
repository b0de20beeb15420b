//! Playlist import and refresh workflow.
//!
//! [`ImportOrchestrator`] drives `initializing → fetching-metadata →
//! enumerating-videos → assembling → done | failed`, reporting each step to a
//! [`ProgressSink`]. Persistence goes through the [`PlaylistStore`] trait.

mod error;
mod orchestrator;
mod progress;
mod store;

pub use error::ImportError;
pub use orchestrator::{ImportOrchestrator, RefreshOutcome};
pub use progress::{ImportProgressEvent, ImportStage, NoProgress, ProgressSink};
pub use store::{MemoryPlaylistStore, PlaylistStore, StoreError};
