//! CLI output formatting and the terminal progress sink.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use playlist_sync_core::{ImportProgressEvent, ImportStage, Playlist, ProgressSink};

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

/// One line summarizing a stored playlist for `list`.
pub fn playlist_line(playlist: &Playlist) -> String {
    format!(
        "{}  {}  [{} videos, {} downloaded, {}]",
        playlist.id,
        playlist.name,
        playlist.videos.len(),
        playlist.downloaded_count(),
        playlist.updated_at.format("%Y-%m-%d %H:%M"),
    )
}

/// Human text for a progress event.
pub fn progress_message(event: &ImportProgressEvent) -> String {
    match event.stage {
        ImportStage::Initializing => "Starting".to_string(),
        ImportStage::FetchingMetadata => "Fetching playlist details".to_string(),
        ImportStage::EnumeratingVideos => match (event.processed_count, event.total_count) {
            (Some(done), Some(total)) if total > 0 => format!("Listing videos {done}/{total}"),
            (Some(done), _) => format!("Listing videos ({done} so far)"),
            _ => "Listing videos".to_string(),
        },
        ImportStage::Assembling => "Saving playlist".to_string(),
        ImportStage::Done => format!("Done: {} videos", event.processed_count.unwrap_or(0)),
        ImportStage::Failed => format!(
            "Failed: {}",
            event.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Progress sink drawing an `indicatif` bar on stderr.
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    /// Creates a visible bar, or a hidden one when `quiet`.
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressSink for TerminalProgress {
    fn emit(&self, event: ImportProgressEvent) {
        let width = terminal_width().saturating_sub(4);
        let message = truncate_to_width(&progress_message(&event), width);
        match event.stage {
            ImportStage::Done => self.bar.finish_and_clear(),
            ImportStage::Failed => self.bar.abandon_with_message(message),
            _ => self.bar.set_message(message),
        }
    }
}
