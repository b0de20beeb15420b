//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use playlist_sync_core::playlist::{DEFAULT_ENUMERATION_TIMEOUT, DEFAULT_METADATA_TIMEOUT};
use playlist_sync_core::rate_limiter::{
    DEFAULT_COOLDOWN_MS, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MINUTES, RateLimitPolicy,
};
use playlist_sync_core::tool::DEFAULT_MAX_OUTPUT_BYTES;
use playlist_sync_core::{InvokeOptions, ToolSettings};

const APP_DIR: &str = "playlist-sync";

/// Key = value file configuration for playlist-sync defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Explicit path to the extraction tool binary.
    pub tool_path: Option<PathBuf>,
    /// Directory holding stored playlists and downloads.
    pub library_dir: Option<PathBuf>,
    /// Tool requests allowed per rate limit window (1..=1000).
    pub rate_limit_max_requests: Option<u32>,
    /// Rate limit window length in minutes (1..=60).
    pub rate_limit_window_minutes: Option<u32>,
    /// Minimum delay between tool requests in milliseconds (0..=60000).
    pub rate_limit_cooldown_ms: Option<u64>,
    /// Deadline for playlist metadata fetches.
    pub metadata_timeout_secs: Option<u64>,
    /// Deadline for playlist video enumeration.
    pub enumeration_timeout_secs: Option<u64>,
    /// Cap on captured tool output in megabytes (1..=1024).
    pub max_output_mb: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.rate_limit_max_requests
            && !(1..=1000).contains(&max)
        {
            bail!(
                "Invalid config value for `rate_limit_max_requests`: {max}. Expected range: 1..=1000"
            );
        }
        if let Some(window) = self.rate_limit_window_minutes
            && !(1..=60).contains(&window)
        {
            bail!(
                "Invalid config value for `rate_limit_window_minutes`: {window}. Expected range: 1..=60"
            );
        }
        if let Some(cooldown) = self.rate_limit_cooldown_ms
            && cooldown > 60_000
        {
            bail!(
                "Invalid config value for `rate_limit_cooldown_ms`: {cooldown}. Expected range: 0..=60000"
            );
        }
        validate_timeout_secs("metadata_timeout_secs", self.metadata_timeout_secs)?;
        validate_timeout_secs("enumeration_timeout_secs", self.enumeration_timeout_secs)?;
        if let Some(mb) = self.max_output_mb
            && !(1..=1024).contains(&mb)
        {
            bail!("Invalid config value for `max_output_mb`: {mb}. Expected range: 1..=1024");
        }
        Ok(())
    }
}

impl ToolSettings for FileConfig {
    fn configured_tool_path(&self) -> Option<PathBuf> {
        self.tool_path.clone()
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }
}

/// Effective runtime settings after merging file config and CLI flags.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub tool_path: Option<PathBuf>,
    pub library_dir: PathBuf,
    pub policy: RateLimitPolicy,
    pub metadata_timeout: Duration,
    pub enumeration_timeout: Duration,
    pub max_output_bytes: usize,
}

impl RuntimeSettings {
    /// Builds settings from an optional file config; CLI overrides are applied
    /// by the caller afterwards.
    #[must_use]
    pub fn from_file(config: Option<&FileConfig>) -> Self {
        let config = config.cloned().unwrap_or_default();
        let max_output_bytes = config
            .max_output_mb
            .and_then(|mb| usize::try_from(mb).ok())
            .map_or(DEFAULT_MAX_OUTPUT_BYTES, |mb| mb * 1024 * 1024);

        Self {
            tool_path: config.tool_path,
            library_dir: config.library_dir.unwrap_or_else(default_library_dir),
            policy: RateLimitPolicy::new(
                config.rate_limit_max_requests.unwrap_or(DEFAULT_MAX_REQUESTS),
                config
                    .rate_limit_window_minutes
                    .unwrap_or(DEFAULT_WINDOW_MINUTES),
                config.rate_limit_cooldown_ms.unwrap_or(DEFAULT_COOLDOWN_MS),
            ),
            metadata_timeout: config
                .metadata_timeout_secs
                .map_or(DEFAULT_METADATA_TIMEOUT, Duration::from_secs),
            enumeration_timeout: config
                .enumeration_timeout_secs
                .map_or(DEFAULT_ENUMERATION_TIMEOUT, Duration::from_secs),
            max_output_bytes,
        }
    }

    /// Invocation limits for metadata fetches.
    #[must_use]
    pub fn metadata_options(&self) -> InvokeOptions {
        InvokeOptions::new(self.metadata_timeout).with_max_output_bytes(self.max_output_bytes)
    }

    /// Invocation limits for enumeration.
    #[must_use]
    pub fn enumeration_options(&self) -> InvokeOptions {
        InvokeOptions::new(self.enumeration_timeout).with_max_output_bytes(self.max_output_bytes)
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/playlist-sync/config.toml`
/// 2. `$HOME/.config/playlist-sync/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

/// Default library directory.
///
/// Priority:
/// 1. `$XDG_DATA_HOME/playlist-sync`
/// 2. `$HOME/.local/share/playlist-sync`
/// 3. `./playlist-sync`
#[must_use]
pub fn default_library_dir() -> PathBuf {
    if let Some(xdg_data_home) = env_var_non_empty_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home).join(APP_DIR);
    }
    env_var_non_empty_os("HOME").map_or_else(
        || PathBuf::from(APP_DIR),
        |home| PathBuf::from(home).join(".local").join("share").join(APP_DIR),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` if given, otherwise from the default path if present.
pub fn load_file_config_from(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "tool_path" => {
                cfg.tool_path = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "library_dir" => {
                cfg.library_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "rate_limit_max_requests" => {
                cfg.rate_limit_max_requests = Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "rate_limit_window_minutes" => {
                cfg.rate_limit_window_minutes =
                    Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "rate_limit_cooldown_ms" => {
                cfg.rate_limit_cooldown_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "metadata_timeout_secs" => {
                cfg.metadata_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "enumeration_timeout_secs" => {
                cfg.enumeration_timeout_secs =
                    Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "max_output_mb" => {
                cfg.max_output_mb = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
