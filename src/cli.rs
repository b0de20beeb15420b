//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use playlist_sync_core::ContainerPreference;

/// Import and re-synchronize remote video playlists.
///
/// Playlist-sync drives an external extraction tool to list playlist
/// contents, stores them locally, and merges later changes without losing
/// download state.
#[derive(Parser, Debug)]
#[command(name = "playlist-sync")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the extraction tool binary
    #[arg(long, global = true, value_name = "PATH")]
    pub tool_path: Option<PathBuf>,

    /// Directory holding stored playlists and downloads
    #[arg(long, global = true, value_name = "DIR")]
    pub library_dir: Option<PathBuf>,

    /// Minimum delay between tool requests in milliseconds (max 60000)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub cooldown_ms: Option<u64>,

    /// Deadline for listing playlist videos, in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub enumeration_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Import a remote playlist and store it
    Import {
        /// Playlist URL or playlist id
        url: String,
    },

    /// Re-synchronize a stored playlist with its remote source
    Refresh {
        /// Local playlist id
        playlist_id: String,
    },

    /// List stored playlists
    List,

    /// Check whether a video is still available
    Probe {
        /// Video URL
        video_url: String,
    },

    /// Download one video of a stored playlist
    Download {
        /// Local playlist id
        playlist_id: String,
        /// Video id within the playlist
        video_id: String,
        /// Output kind
        #[arg(short, long, value_enum, default_value_t = FormatArg::Video)]
        format: FormatArg,
        /// Height bound for video output (360p, 480p, 720p, 1080p, 1440p, 2160p)
        #[arg(long, default_value = "1080p")]
        quality: String,
    },

    /// Print the extraction tool version
    ToolVersion,
}

/// Output kind accepted by `download --format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Audio,
    Video,
    Best,
}

impl From<FormatArg> for ContainerPreference {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Audio => Self::Audio,
            FormatArg::Video => Self::Video,
            FormatArg::Best => Self::Best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_import_parses_url() {
        let args =
            Args::try_parse_from(["playlist-sync", "import", "https://x/playlist?list=PL1"])
                .unwrap();
        assert_eq!(
            args.command,
            Command::Import {
                url: "https://x/playlist?list=PL1".to_string()
            }
        );
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_subcommand_required() {
        let result = Args::try_parse_from(["playlist-sync"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["playlist-sync", "-v", "list"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["playlist-sync", "list", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["playlist-sync", "--quiet", "list"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["playlist-sync", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["playlist-sync", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["playlist-sync", "list", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    // ==================== Download Tests ====================

    #[test]
    fn test_cli_download_defaults() {
        let args = Args::try_parse_from(["playlist-sync", "download", "p1", "v1"]).unwrap();
        assert_eq!(
            args.command,
            Command::Download {
                playlist_id: "p1".to_string(),
                video_id: "v1".to_string(),
                format: FormatArg::Video,
                quality: "1080p".to_string(),
            }
        );
    }

    #[test]
    fn test_cli_download_audio() {
        let args = Args::try_parse_from([
            "playlist-sync",
            "download",
            "p1",
            "v1",
            "--format",
            "audio",
        ])
        .unwrap();
        let Command::Download { format, .. } = args.command else {
            panic!("expected download command");
        };
        assert_eq!(ContainerPreference::from(format), ContainerPreference::Audio);
    }

    #[test]
    fn test_cli_download_rejects_unknown_format() {
        let err = Args::try_parse_from(["playlist-sync", "download", "p1", "v1", "-f", "flac"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    // ==================== Override Flag Tests ====================

    #[test]
    fn test_cli_cooldown_over_max_rejected() {
        let err = Args::try_parse_from(["playlist-sync", "--cooldown-ms", "60001", "list"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_overrides_parse() {
        let args = Args::try_parse_from([
            "playlist-sync",
            "--tool-path",
            "/opt/yt-dlp",
            "--library-dir",
            "/lib",
            "--enumeration-timeout",
            "300",
            "tool-version",
        ])
        .unwrap();
        assert_eq!(args.tool_path, Some(PathBuf::from("/opt/yt-dlp")));
        assert_eq!(args.library_dir, Some(PathBuf::from("/lib")));
        assert_eq!(args.enumeration_timeout, Some(300));
        assert_eq!(args.command, Command::ToolVersion);
    }
}
