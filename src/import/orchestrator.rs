//! End-to-end import and refresh workflow.
//!
//! Stages run strictly in order: metadata, then enumeration, then assembly.
//! Every failure after `initializing` is reported to the sink as a `failed`
//! event before the error is returned.

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::error::ImportError;
use super::progress::{ImportProgressEvent, ImportStage, ProgressSink};
use super::store::PlaylistStore;
use crate::playlist::{
    Playlist, PlaylistInfoExtractor, PlaylistMetadata, PlaylistVideoEnumerator, VideoRecord, merge,
};
use crate::tool::ToolClient;

/// A refreshed playlist and the videos the refresh removed.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    /// The new playlist value.
    pub playlist: Playlist,
    /// Ids present before the refresh but absent from the remote playlist.
    pub dropped_ids: Vec<String>,
}

/// Composes metadata fetch, enumeration, and merge into imports and refreshes.
#[derive(Debug, Clone)]
pub struct ImportOrchestrator {
    info: PlaylistInfoExtractor,
    videos: PlaylistVideoEnumerator,
}

impl ImportOrchestrator {
    /// Creates an orchestrator whose extractors share `client`.
    #[must_use]
    pub fn new(client: ToolClient) -> Self {
        Self {
            info: PlaylistInfoExtractor::new(client.clone()),
            videos: PlaylistVideoEnumerator::new(client),
        }
    }

    /// Creates an orchestrator from preconfigured extractors.
    #[must_use]
    pub fn with_extractors(info: PlaylistInfoExtractor, videos: PlaylistVideoEnumerator) -> Self {
        Self { info, videos }
    }

    /// Imports the playlist at `url` and returns it without persisting.
    ///
    /// # Errors
    ///
    /// [`ImportError::Metadata`] or [`ImportError::Enumeration`].
    #[instrument(skip(self, sink))]
    pub async fn import(&self, url: &str, sink: &dyn ProgressSink) -> Result<Playlist, ImportError> {
        sink.emit(ImportProgressEvent::stage(ImportStage::Initializing));
        let playlist = self.assemble_new(url, sink).await?;
        finish(sink, &playlist);
        Ok(playlist)
    }

    /// Imports the playlist at `url` and writes it to `store`.
    ///
    /// # Errors
    ///
    /// As [`Self::import`], plus [`ImportError::Store`].
    #[instrument(skip(self, store, sink))]
    pub async fn import_into(
        &self,
        url: &str,
        store: &dyn PlaylistStore,
        sink: &dyn ProgressSink,
    ) -> Result<Playlist, ImportError> {
        sink.emit(ImportProgressEvent::stage(ImportStage::Initializing));
        let playlist = self.assemble_new(url, sink).await?;
        persist(store, &playlist, sink).await?;
        finish(sink, &playlist);
        Ok(playlist)
    }

    /// Re-synchronizes `previous` from its source URL without persisting.
    ///
    /// # Errors
    ///
    /// [`ImportError::NotRefreshable`] for playlists without a remote source,
    /// otherwise as [`Self::import`].
    #[instrument(skip(self, previous, sink), fields(playlist_id = %previous.id))]
    pub async fn refresh(
        &self,
        previous: &Playlist,
        sink: &dyn ProgressSink,
    ) -> Result<RefreshOutcome, ImportError> {
        sink.emit(ImportProgressEvent::stage(ImportStage::Initializing));
        let outcome = self.assemble_refresh(previous, sink).await?;
        finish(sink, &outcome.playlist);
        Ok(outcome)
    }

    /// Reads playlist `id` from `store`, re-synchronizes it, and writes it back.
    ///
    /// # Errors
    ///
    /// [`ImportError::PlaylistNotFound`] if `store` has no such playlist,
    /// otherwise as [`Self::refresh`] plus [`ImportError::Store`].
    #[instrument(skip(self, store, sink))]
    pub async fn refresh_in(
        &self,
        id: &str,
        store: &dyn PlaylistStore,
        sink: &dyn ProgressSink,
    ) -> Result<RefreshOutcome, ImportError> {
        sink.emit(ImportProgressEvent::stage(ImportStage::Initializing));

        let previous = match store.read_playlist(id).await {
            Ok(Some(playlist)) => playlist,
            Ok(None) => {
                return Err(fail(sink, ImportError::PlaylistNotFound { id: id.to_string() }));
            }
            Err(error) => return Err(fail(sink, ImportError::Store(error))),
        };

        let outcome = self.assemble_refresh(&previous, sink).await?;
        persist(store, &outcome.playlist, sink).await?;
        finish(sink, &outcome.playlist);
        Ok(outcome)
    }

    async fn assemble_new(&self, url: &str, sink: &dyn ProgressSink) -> Result<Playlist, ImportError> {
        let (metadata, videos) = self.fetch(url, sink).await?;

        sink.emit(ImportProgressEvent::stage(ImportStage::Assembling));
        let playlist = Playlist::from_remote(
            Uuid::new_v4().to_string(),
            &metadata,
            url,
            videos,
            Utc::now(),
        );
        info!(
            playlist_id = %playlist.id,
            name = %playlist.name,
            videos = playlist.videos.len(),
            "imported playlist"
        );
        Ok(playlist)
    }

    async fn assemble_refresh(
        &self,
        previous: &Playlist,
        sink: &dyn ProgressSink,
    ) -> Result<RefreshOutcome, ImportError> {
        let source_url = match previous.source_url.as_deref() {
            Some(url) if previous.is_refreshable() => url,
            _ => {
                return Err(fail(
                    sink,
                    ImportError::NotRefreshable {
                        id: previous.id.clone(),
                    },
                ));
            }
        };

        let (metadata, fresh) = self.fetch(source_url, sink).await?;

        sink.emit(ImportProgressEvent::stage(ImportStage::Assembling));
        let merged = merge(&previous.videos, fresh);
        if !merged.dropped_ids.is_empty() {
            warn!(
                playlist_id = %previous.id,
                dropped = merged.dropped_ids.len(),
                dropped_ids = ?merged.dropped_ids,
                "videos no longer in remote playlist were removed"
            );
        }

        let playlist = previous.refreshed(&metadata, merged.videos, Utc::now());
        info!(
            playlist_id = %playlist.id,
            videos = playlist.videos.len(),
            "refreshed playlist"
        );
        Ok(RefreshOutcome {
            playlist,
            dropped_ids: merged.dropped_ids,
        })
    }

    async fn fetch(
        &self,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<(PlaylistMetadata, Vec<VideoRecord>), ImportError> {
        sink.emit(ImportProgressEvent::stage(ImportStage::FetchingMetadata));
        let metadata = match self.info.fetch_metadata(url).await {
            Ok(metadata) => metadata,
            Err(error) => return Err(fail(sink, ImportError::Metadata(error))),
        };

        let total = metadata.declared_video_count;
        sink.emit(ImportProgressEvent::enumerating(0, total));
        let enumerated = self
            .videos
            .enumerate_videos(url, |count| {
                sink.emit(ImportProgressEvent::enumerating(count, total));
            })
            .await;

        match enumerated {
            Ok(videos) => Ok((metadata, videos)),
            Err(error) => Err(fail(sink, ImportError::Enumeration(error))),
        }
    }
}

async fn persist(
    store: &dyn PlaylistStore,
    playlist: &Playlist,
    sink: &dyn ProgressSink,
) -> Result<(), ImportError> {
    store
        .write_playlist(playlist)
        .await
        .map_err(|error| fail(sink, ImportError::Store(error)))
}

fn finish(sink: &dyn ProgressSink, playlist: &Playlist) {
    sink.emit(ImportProgressEvent::done(playlist.videos.len()));
}

fn fail(sink: &dyn ProgressSink, error: ImportError) -> ImportError {
    warn!(error = %error, "import failed");
    sink.emit(ImportProgressEvent::failed(error.to_string()));
    error
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::import::store::MemoryPlaylistStore;
    use crate::playlist::{ExtractError, PlaylistSource};
    use crate::rate_limiter::{RateLimitPolicy, RateLimiter};
    use crate::tool::{InvokeOptions, ToolError, ToolRunner};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    const URL: &str = "https://www.youtube.com/playlist?list=PLx";

    #[derive(Clone)]
    enum Reply {
        Text(String),
        Exit(&'static str),
        Timeout,
    }

    impl Reply {
        fn text(text: &str) -> Self {
            Self::Text(text.to_string())
        }

        fn to_result(&self) -> Result<String, ToolError> {
            match self {
                Self::Text(text) => Ok(text.clone()),
                Self::Exit(stderr) => Err(ToolError::process_execution(Some(1), *stderr)),
                Self::Timeout => Err(ToolError::Timeout {
                    timeout: std::time::Duration::from_secs(120),
                }),
            }
        }
    }

    /// Answers metadata and enumeration calls with fixed replies.
    struct FakeTool {
        metadata: Reply,
        entries: Reply,
    }

    impl FakeTool {
        fn ok(metadata: &str, entries: &str) -> Self {
            Self {
                metadata: Reply::text(metadata),
                entries: Reply::text(entries),
            }
        }
    }

    #[async_trait]
    impl ToolRunner for FakeTool {
        async fn run(&self, args: &[String], _options: &InvokeOptions) -> Result<String, ToolError> {
            if args.iter().any(|a| a == "--dump-single-json") {
                self.metadata.to_result()
            } else {
                self.entries.to_result()
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ImportProgressEvent>>);

    impl ProgressSink for Recorder {
        fn emit(&self, event: ImportProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl Recorder {
        fn stages(&self) -> Vec<ImportStage> {
            self.0.lock().unwrap().iter().map(|e| e.stage).collect()
        }

        fn last(&self) -> ImportProgressEvent {
            self.0.lock().unwrap().last().cloned().unwrap()
        }
    }

    fn orchestrator(tool: FakeTool) -> ImportOrchestrator {
        let limiter = Arc::new(RateLimiter::with_tool_pool(RateLimitPolicy::new(100, 1, 0)));
        ImportOrchestrator::new(ToolClient::new(Arc::new(tool), limiter))
    }

    fn entries(ids: &[&str]) -> String {
        ids.iter()
            .map(|id| format!(r#"{{"id":"{id}","title":"title {id}"}}"#))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ==================== Import Tests ====================

    #[tokio::test]
    async fn test_import_assembles_playlist_and_reports_done() {
        let orchestrator = orchestrator(FakeTool::ok(
            r#"{"id":"PLx","title":"X","playlist_count":2}"#,
            &entries(&["a", "b"]),
        ));
        let sink = Recorder::default();

        let playlist = orchestrator.import(URL, &sink).await.unwrap();

        assert_eq!(playlist.name, "X");
        assert_eq!(playlist.videos.len(), 2);
        assert_eq!(playlist.source, PlaylistSource::Remote);
        assert_eq!(playlist.source_url.as_deref(), Some(URL));
        assert!(Uuid::parse_str(&playlist.id).is_ok());

        let last = sink.last();
        assert_eq!(last.stage, ImportStage::Done);
        assert_eq!(last.processed_count, Some(2));
        assert_eq!(last.total_count, Some(2));
    }

    #[tokio::test]
    async fn test_import_stage_sequence() {
        let orchestrator = orchestrator(FakeTool::ok(
            r#"{"title":"X","playlist_count":2}"#,
            &entries(&["a", "b"]),
        ));
        let sink = Recorder::default();

        orchestrator.import(URL, &sink).await.unwrap();

        assert_eq!(
            sink.stages(),
            [
                ImportStage::Initializing,
                ImportStage::FetchingMetadata,
                ImportStage::EnumeratingVideos,
                ImportStage::EnumeratingVideos,
                ImportStage::EnumeratingVideos,
                ImportStage::Assembling,
                ImportStage::Done,
            ]
        );
        let events = sink.0.lock().unwrap();
        assert_eq!(events[2].processed_count, Some(0));
        assert_eq!(events[4].processed_count, Some(2));
        assert_eq!(events[4].total_count, Some(2));
    }

    #[tokio::test]
    async fn test_import_metadata_failure_emits_failed_and_skips_enumeration() {
        let orchestrator = orchestrator(FakeTool {
            metadata: Reply::Exit("ERROR: Unsupported URL"),
            entries: Reply::Text(entries(&["a"])),
        });
        let sink = Recorder::default();

        let error = orchestrator.import(URL, &sink).await.unwrap_err();

        assert!(matches!(error, ImportError::Metadata(_)));
        assert!(!sink.stages().contains(&ImportStage::EnumeratingVideos));
        let last = sink.last();
        assert_eq!(last.stage, ImportStage::Failed);
        assert!(last.error_message.unwrap().contains("Unsupported URL"));
    }

    #[tokio::test]
    async fn test_import_enumeration_timeout_is_classified() {
        let orchestrator = orchestrator(FakeTool {
            metadata: Reply::text(r#"{"title":"X"}"#),
            entries: Reply::Timeout,
        });
        let sink = Recorder::default();

        let error = orchestrator.import(URL, &sink).await.unwrap_err();

        assert!(matches!(
            error.extract_error(),
            Some(ExtractError::EnumerationTimedOut { .. })
        ));
        assert_eq!(sink.last().stage, ImportStage::Failed);
    }

    #[tokio::test]
    async fn test_import_into_persists_before_done() {
        let orchestrator = orchestrator(FakeTool::ok(r#"{"title":"X"}"#, &entries(&["a"])));
        let store = MemoryPlaylistStore::new();
        let sink = Recorder::default();

        let playlist = orchestrator.import_into(URL, &store, &sink).await.unwrap();

        let stored = store.read_playlist(&playlist.id).await.unwrap().unwrap();
        assert_eq!(stored, playlist);
        assert_eq!(sink.last().stage, ImportStage::Done);
    }

    // ==================== Refresh Tests ====================

    #[tokio::test]
    async fn test_refresh_merges_and_reports_dropped() {
        let first = orchestrator(FakeTool::ok(r#"{"title":"X"}"#, &entries(&["a", "b"])));
        let mut original = first.import(URL, &crate::import::NoProgress).await.unwrap();
        original
            .video_mut("a")
            .unwrap()
            .mark_downloaded("/lib/a.mp4".into());
        let original_added = original.video("a").unwrap().added_at;

        let second = orchestrator(FakeTool::ok(r#"{"title":"X v2"}"#, &entries(&["c", "a"])));
        let sink = Recorder::default();
        let outcome = second.refresh(&original, &sink).await.unwrap();

        let ids: Vec<&str> = outcome.playlist.videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(outcome.dropped_ids, ["b"]);
        assert_eq!(outcome.playlist.id, original.id);
        assert_eq!(outcome.playlist.name, "X v2");
        let a = outcome.playlist.video("a").unwrap();
        assert!(a.downloaded);
        assert_eq!(a.added_at, original_added);
        assert_eq!(sink.last(), ImportProgressEvent::done(2));
    }

    #[tokio::test]
    async fn test_refresh_rejects_local_playlist() {
        let first = orchestrator(FakeTool::ok(r#"{"title":"X"}"#, &entries(&["a"])));
        let mut local = first.import(URL, &crate::import::NoProgress).await.unwrap();
        local.source = PlaylistSource::Local;
        let sink = Recorder::default();

        let error = first.refresh(&local, &sink).await.unwrap_err();

        assert!(matches!(error, ImportError::NotRefreshable { .. }));
        assert_eq!(sink.stages(), [ImportStage::Initializing, ImportStage::Failed]);
    }

    #[tokio::test]
    async fn test_refresh_in_missing_playlist() {
        let orchestrator = orchestrator(FakeTool::ok("{}", ""));
        let store = MemoryPlaylistStore::new();
        let sink = Recorder::default();

        let error = orchestrator
            .refresh_in("nope", &store, &sink)
            .await
            .unwrap_err();

        assert!(matches!(error, ImportError::PlaylistNotFound { .. }));
        assert_eq!(sink.last().stage, ImportStage::Failed);
    }

    #[tokio::test]
    async fn test_refresh_in_writes_back() {
        let orchestrator = orchestrator(FakeTool::ok(r#"{"title":"X"}"#, &entries(&["a"])));
        let store = MemoryPlaylistStore::new();
        let imported = orchestrator
            .import_into(URL, &store, &crate::import::NoProgress)
            .await
            .unwrap();

        let outcome = orchestrator
            .refresh_in(&imported.id, &store, &crate::import::NoProgress)
            .await
            .unwrap();

        let stored = store.read_playlist(&imported.id).await.unwrap().unwrap();
        assert_eq!(stored.updated_at, outcome.playlist.updated_at);
        assert!(stored.updated_at >= imported.updated_at);
    }
}
