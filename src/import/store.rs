//! Persistence collaborator for playlists.

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::playlist::Playlist;

/// Errors raised by a [`PlaylistStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing storage failed.
    #[error("playlist storage IO failed at {path}: {source}")]
    Io {
        /// Location being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored playlist could not be encoded or decoded.
    #[error("playlist data at {path} is not valid: {source}")]
    Serialization {
        /// Location being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The id cannot be used as a storage key.
    #[error("invalid playlist id: {0:?}")]
    InvalidId(String),
}

/// Reads and writes playlists.
///
/// Implementations own the storage format.
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Returns the playlist with `id`, or `None` if it is not stored.
    async fn read_playlist(&self, id: &str) -> Result<Option<Playlist>, StoreError>;

    /// Stores `playlist`, replacing any previous value with the same id.
    async fn write_playlist(&self, playlist: &Playlist) -> Result<(), StoreError>;

    /// Returns every stored playlist.
    async fn list_playlists(&self) -> Result<Vec<Playlist>, StoreError>;
}

/// Process-local store, used by tests and embedders without persistence.
#[derive(Debug, Default)]
pub struct MemoryPlaylistStore {
    playlists: DashMap<String, Playlist>,
}

impl MemoryPlaylistStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored playlists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }
}

#[async_trait]
impl PlaylistStore for MemoryPlaylistStore {
    async fn read_playlist(&self, id: &str) -> Result<Option<Playlist>, StoreError> {
        Ok(self.playlists.get(id).map(|entry| entry.value().clone()))
    }

    async fn write_playlist(&self, playlist: &Playlist) -> Result<(), StoreError> {
        self.playlists.insert(playlist.id.clone(), playlist.clone());
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>, StoreError> {
        let mut playlists: Vec<Playlist> = self
            .playlists
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        playlists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(playlists)
    }
}
