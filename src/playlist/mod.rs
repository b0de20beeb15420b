//! Playlist data model, extraction, and synchronization.

mod error;
mod info;
mod model;
mod sync;
mod videos;

pub use error::ExtractError;
pub use info::{
    DEFAULT_METADATA_TIMEOUT, PlaylistInfoExtractor, UNTITLED_PLAYLIST, parse_metadata,
    playlist_id_from_url, playlist_url,
};
pub use model::{Availability, DownloadStatus, Playlist, PlaylistMetadata, PlaylistSource, VideoRecord};
pub use sync::{MergeOutcome, merge};
pub use videos::{DEFAULT_ENUMERATION_TIMEOUT, PlaylistVideoEnumerator, parse_video_lines, watch_url};
