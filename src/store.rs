//! JSON-file-per-playlist storage under the library directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use playlist_sync_core::{Playlist, PlaylistStore, StoreError};
use tokio::fs;
use tracing::{debug, warn};

const PLAYLISTS_DIR: &str = "playlists";

/// Stores each playlist as `<library>/playlists/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonPlaylistStore {
    dir: PathBuf,
}

impl JsonPlaylistStore {
    /// Creates a store rooted at `library_dir`.
    pub fn new(library_dir: &Path) -> Self {
        Self {
            dir: library_dir.join(PLAYLISTS_DIR),
        }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl PlaylistStore for JsonPlaylistStore {
    async fn read_playlist(&self, id: &str) -> Result<Option<Playlist>, StoreError> {
        let path = self.path_for(id)?;
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(io_error(&path)(error)),
        };
        let playlist = serde_json::from_str(&raw).map_err(|source| StoreError::Serialization {
            path: path.clone(),
            source,
        })?;
        Ok(Some(playlist))
    }

    async fn write_playlist(&self, playlist: &Playlist) -> Result<(), StoreError> {
        let path = self.path_for(&playlist.id)?;
        fs::create_dir_all(&self.dir).await.map_err(io_error(&self.dir))?;

        let json = serde_json::to_vec_pretty(playlist).map_err(|source| {
            StoreError::Serialization {
                path: path.clone(),
                source,
            }
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(io_error(&tmp))?;
        fs::rename(&tmp, &path).await.map_err(io_error(&path))?;
        debug!(path = %path.display(), "wrote playlist");
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(io_error(&self.dir)(error)),
        };

        let mut playlists = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.dir))? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path).await.map_err(io_error(&path))?;
            match serde_json::from_str::<Playlist>(&raw) {
                Ok(playlist) => playlists.push(playlist),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "skipping unreadable playlist file");
                }
            }
        }
        playlists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(playlists)
    }
}
