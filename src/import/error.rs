//! Import workflow errors.

use thiserror::Error;

use super::store::StoreError;
use crate::playlist::ExtractError;

/// Errors that abort an import or refresh.
///
/// The `Display` text is what the `failed` progress event carries.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Fetching playlist metadata failed.
    #[error("failed to fetch playlist metadata: {0}")]
    Metadata(#[source] ExtractError),

    /// Listing playlist videos failed.
    #[error("failed to list playlist videos: {0}")]
    Enumeration(#[source] ExtractError),

    /// The persistence collaborator failed.
    #[error("failed to save playlist: {0}")]
    Store(#[from] StoreError),

    /// No stored playlist has this id.
    #[error("playlist not found: {id}")]
    PlaylistNotFound {
        /// The requested id.
        id: String,
    },

    /// The playlist has no remote source to re-synchronize from.
    #[error("playlist {id} is not a remote playlist and cannot be refreshed")]
    NotRefreshable {
        /// The requested id.
        id: String,
    },
}

impl ImportError {
    /// Returns the extraction error behind a metadata or enumeration failure.
    #[must_use]
    pub fn extract_error(&self) -> Option<&ExtractError> {
        match self {
            Self::Metadata(error) | Self::Enumeration(error) => Some(error),
            _ => None,
        }
    }
}
