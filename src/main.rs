//! CLI entry point for playlist-sync.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use playlist_sync_core::{
    Availability, BinaryLocator, DownloadRequest, ExternalToolInvoker, ImportOrchestrator,
    PlaylistInfoExtractor, PlaylistStore, PlaylistVideoEnumerator, RateLimiter, ToolClient,
    VideoOperations,
};
use tracing::{debug, info, warn};

mod cli;
mod config;
mod output;
mod store;

use cli::{Args, Command};
use config::{FileConfig, LoadedConfig, RuntimeSettings, VerbositySetting};
use output::TerminalProgress;
use store::JsonPlaylistStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = config::load_file_config_from(args.config.as_deref());

    let file_verbosity = loaded
        .as_ref()
        .ok()
        .and_then(|loaded| loaded.config.as_ref())
        .and_then(|config| config.verbosity);
    init_tracing(&args, file_verbosity);

    let loaded = loaded?;
    debug!(?args, "CLI arguments parsed");
    log_config_source(&loaded);

    let settings = effective_settings(&args, loaded.config.as_ref());
    let tool_settings = loaded.config.clone().unwrap_or_default();
    let app = App::new(&args, settings, tool_settings);

    match args.command {
        Command::Import { url } => app.import(&url).await,
        Command::Refresh { playlist_id } => app.refresh(&playlist_id).await,
        Command::List => app.list().await,
        Command::Probe { video_url } => app.probe(&video_url).await,
        Command::Download {
            playlist_id,
            video_id,
            format,
            quality,
        } => {
            app.download(&playlist_id, &video_id, format.into(), &quality)
                .await
        }
        Command::ToolVersion => app.tool_version().await,
    }
}

/// Priority: `RUST_LOG` > `--quiet` > `-v`/`-vv` > config verbosity > info.
fn init_tracing(args: &Args, file_verbosity: Option<VerbositySetting>) {
    let default_level = if args.quiet {
        "error"
    } else {
        match (args.verbose, file_verbosity) {
            (0, Some(VerbositySetting::Quiet)) => "error",
            (0, Some(VerbositySetting::Verbose | VerbositySetting::Debug)) | (1, _) => "debug",
            (0, _) => "info",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn log_config_source(loaded: &LoadedConfig) {
    match (&loaded.path, loaded.loaded_from_file) {
        (Some(path), true) => debug!(path = %path.display(), "loaded config file"),
        (Some(path), false) => debug!(path = %path.display(), "no config file, using defaults"),
        (None, _) => debug!("no config directory known, using defaults"),
    }
    if let Some(verbosity) = loaded.config.as_ref().and_then(|config| config.verbosity) {
        debug!(verbosity = verbosity.as_str(), "config verbosity");
    }
}

/// CLI flags override file values.
fn effective_settings(args: &Args, config: Option<&FileConfig>) -> RuntimeSettings {
    let mut settings = RuntimeSettings::from_file(config);
    if let Some(path) = &args.tool_path {
        settings.tool_path = Some(path.clone());
    }
    if let Some(dir) = &args.library_dir {
        settings.library_dir.clone_from(dir);
    }
    if let Some(cooldown_ms) = args.cooldown_ms {
        settings.policy.cooldown_ms = cooldown_ms;
    }
    if let Some(secs) = args.enumeration_timeout {
        settings.enumeration_timeout = Duration::from_secs(secs);
    }
    settings
}

/// Wired-up collaborators for one CLI run.
struct App {
    invoker: Arc<ExternalToolInvoker>,
    orchestrator: ImportOrchestrator,
    videos: VideoOperations,
    store: JsonPlaylistStore,
    library_dir: PathBuf,
    quiet: bool,
}

impl App {
    fn new(args: &Args, settings: RuntimeSettings, tool_settings: FileConfig) -> Self {
        let locator = BinaryLocator::new(settings.tool_path.clone(), Box::new(tool_settings));
        let invoker = Arc::new(ExternalToolInvoker::new(locator));
        let limiter = Arc::new(RateLimiter::with_tool_pool(settings.policy));
        let client = ToolClient::new(invoker.clone(), limiter);

        let orchestrator = ImportOrchestrator::with_extractors(
            PlaylistInfoExtractor::new(client.clone()).with_options(settings.metadata_options()),
            PlaylistVideoEnumerator::new(client.clone())
                .with_options(settings.enumeration_options()),
        );

        Self {
            invoker,
            orchestrator,
            videos: VideoOperations::new(client),
            store: JsonPlaylistStore::new(&settings.library_dir),
            library_dir: settings.library_dir,
            quiet: args.quiet,
        }
    }

    async fn import(&self, url: &str) -> Result<()> {
        let progress = TerminalProgress::new(self.quiet);
        let playlist = self
            .orchestrator
            .import_into(url, &self.store, &progress)
            .await
            .with_context(|| format!("Failed to import playlist '{url}'"))?;

        info!(id = %playlist.id, videos = playlist.videos.len(), "Import complete");
        println!("{}", output::playlist_line(&playlist));
        Ok(())
    }

    async fn refresh(&self, playlist_id: &str) -> Result<()> {
        let progress = TerminalProgress::new(self.quiet);
        let outcome = self
            .orchestrator
            .refresh_in(playlist_id, &self.store, &progress)
            .await
            .with_context(|| format!("Failed to refresh playlist '{playlist_id}'"))?;

        if !outcome.dropped_ids.is_empty() {
            warn!(
                count = outcome.dropped_ids.len(),
                "Removed videos no longer in the remote playlist"
            );
        }
        println!("{}", output::playlist_line(&outcome.playlist));
        Ok(())
    }

    async fn list(&self) -> Result<()> {
        let playlists = self
            .store
            .list_playlists()
            .await
            .context("Failed to read stored playlists")?;
        if playlists.is_empty() {
            info!(library = %self.library_dir.display(), "No playlists stored yet");
            return Ok(());
        }
        for playlist in &playlists {
            println!("{}", output::playlist_line(playlist));
        }
        Ok(())
    }

    async fn probe(&self, video_url: &str) -> Result<()> {
        let availability = self
            .videos
            .probe_availability(video_url)
            .await
            .context("Failed to run the extraction tool")?;
        println!("{availability}");
        if availability != Availability::Available {
            debug!(video_url, %availability, "video not available");
        }
        Ok(())
    }

    async fn download(
        &self,
        playlist_id: &str,
        video_id: &str,
        container: playlist_sync_core::ContainerPreference,
        quality: &str,
    ) -> Result<()> {
        let Some(playlist) = self
            .store
            .read_playlist(playlist_id)
            .await
            .context("Failed to read stored playlist")?
        else {
            bail!("Playlist not found: {playlist_id}");
        };
        let Some(video) = playlist.video(video_id) else {
            bail!("Video '{video_id}' is not in playlist '{playlist_id}'");
        };

        let output_dir = self.library_dir.join("downloads").join(&playlist.id);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Failed to create '{}'", output_dir.display()))?;

        let request = DownloadRequest::for_video(video, &output_dir, container, quality);
        let path = self
            .videos
            .download_video(&request)
            .await
            .with_context(|| format!("Failed to download video '{video_id}'"))?;

        // Re-read so concurrent refreshes are not overwritten with a stale copy.
        let mut latest = self
            .store
            .read_playlist(playlist_id)
            .await
            .context("Failed to read stored playlist")?
            .unwrap_or(playlist);
        if let Some(video) = latest.video_mut(video_id) {
            video.mark_downloaded(path.clone());
        }
        latest.updated_at = chrono::Utc::now();
        self.store
            .write_playlist(&latest)
            .await
            .context("Failed to record download")?;

        println!("{}", path.display());
        Ok(())
    }

    async fn tool_version(&self) -> Result<()> {
        let resolved = self.invoker.resolve_binary_path();
        let version = self.invoker.version().await.with_context(|| {
            format!(
                "Extraction tool unavailable at '{}' ({})",
                resolved.path.display(),
                resolved.source.as_str()
            )
        })?;
        println!("{version}");
        Ok(())
    }
}
