//! Resolution of the extraction tool's executable path.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

/// Bare program name handed to the OS when nothing else resolves.
pub const DEFAULT_BINARY_NAME: &str = "yt-dlp";

/// Directory (under the development or resources root) holding a bundled binary.
const BUNDLED_DIR: &str = "ytdlp";

/// Settings collaborator consulted during binary resolution.
pub trait ToolSettings: Send + Sync {
    /// Returns the user-configured tool path, if any.
    fn configured_tool_path(&self) -> Option<PathBuf>;
}

/// Settings with nothing configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSettings;

impl ToolSettings for NoSettings {
    fn configured_tool_path(&self) -> Option<PathBuf> {
        None
    }
}

/// Where a resolved binary path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySource {
    /// Explicit caller-supplied override.
    Override,
    /// Path from the settings collaborator.
    Settings,
    /// Binary bundled with the application.
    Bundled,
    /// Bare program name; the OS performs `PATH` lookup at spawn time.
    SystemPath,
}

impl BinarySource {
    /// Returns a stable label for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Settings => "settings",
            Self::Bundled => "bundled",
            Self::SystemPath => "system_path",
        }
    }
}

/// A resolved executable location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinary {
    /// Path or bare program name to spawn.
    pub path: PathBuf,
    /// Which resolution step produced `path`.
    pub source: BinarySource,
}

/// Resolves the extraction tool executable.
///
/// Order: override (if it exists) → settings (if it exists) → bundled binary
/// for the current build mode (if it exists) → bare program name.
pub struct BinaryLocator {
    override_path: Option<PathBuf>,
    settings: Box<dyn ToolSettings>,
    bundled_root: Option<PathBuf>,
}

impl std::fmt::Debug for BinaryLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryLocator")
            .field("override_path", &self.override_path)
            .field("bundled_root", &self.bundled_root)
            .finish_non_exhaustive()
    }
}

impl Default for BinaryLocator {
    fn default() -> Self {
        Self::new(None, Box::new(NoSettings))
    }
}

impl BinaryLocator {
    /// Creates a locator using the build-mode default bundled root.
    #[must_use]
    pub fn new(override_path: Option<PathBuf>, settings: Box<dyn ToolSettings>) -> Self {
        Self {
            override_path,
            settings,
            bundled_root: default_bundled_root(),
        }
    }

    /// Replaces the root directory searched for a bundled binary.
    #[must_use]
    pub fn with_bundled_root(mut self, root: Option<PathBuf>) -> Self {
        self.bundled_root = root;
        self
    }

    /// Returns the bundled binary path for this platform, if a root is known.
    #[must_use]
    pub fn bundled_path(&self) -> Option<PathBuf> {
        self.bundled_root
            .as_ref()
            .map(|root| root.join(BUNDLED_DIR).join(platform_binary_name()))
    }

    /// Resolves the executable to spawn.
    #[must_use]
    #[instrument(skip(self))]
    pub fn resolve(&self) -> ResolvedBinary {
        let resolved = self.resolve_inner();
        debug!(
            path = %resolved.path.display(),
            source = resolved.source.as_str(),
            "resolved extraction tool"
        );
        resolved
    }

    fn resolve_inner(&self) -> ResolvedBinary {
        if let Some(path) = self.override_path.as_deref().filter(|p| p.exists()) {
            return ResolvedBinary {
                path: path.to_path_buf(),
                source: BinarySource::Override,
            };
        }
        if let Some(path) = self.override_path.as_deref() {
            debug!(path = %path.display(), "override tool path does not exist, skipping");
        }

        if let Some(path) = self.settings.configured_tool_path() {
            if path.exists() {
                return ResolvedBinary {
                    path,
                    source: BinarySource::Settings,
                };
            }
            debug!(path = %path.display(), "configured tool path does not exist, skipping");
        }

        if let Some(path) = self.bundled_path().filter(|p| p.exists()) {
            return ResolvedBinary {
                path,
                source: BinarySource::Bundled,
            };
        }

        ResolvedBinary {
            path: PathBuf::from(platform_binary_name()),
            source: BinarySource::SystemPath,
        }
    }
}

/// Executable file name on this platform.
#[must_use]
pub fn platform_binary_name() -> &'static str {
    if cfg!(windows) {
        "yt-dlp.exe"
    } else {
        DEFAULT_BINARY_NAME
    }
}

/// Development builds look under the working directory; release builds look
/// under `resources/` next to the running executable.
fn default_bundled_root() -> Option<PathBuf> {
    if cfg!(debug_assertions) {
        env::current_dir().ok()
    } else {
        env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .map(|dir| dir.join("resources"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedSettings(Option<PathBuf>);

    impl ToolSettings for FixedSettings {
        fn configured_tool_path(&self) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        path
    }

    #[test]
    fn test_resolve_prefers_existing_override() {
        let tmp = TempDir::new().unwrap();
        let override_path = touch(tmp.path(), "custom-tool");
        let settings_path = touch(tmp.path(), "settings-tool");

        let locator = BinaryLocator::new(
            Some(override_path.clone()),
            Box::new(FixedSettings(Some(settings_path))),
        )
        .with_bundled_root(None);

        let resolved = locator.resolve();
        assert_eq!(resolved.path, override_path);
        assert_eq!(resolved.source, BinarySource::Override);
    }

    #[test]
    fn test_resolve_skips_missing_override_for_settings() {
        let tmp = TempDir::new().unwrap();
        let settings_path = touch(tmp.path(), "settings-tool");

        let locator = BinaryLocator::new(
            Some(tmp.path().join("missing")),
            Box::new(FixedSettings(Some(settings_path.clone()))),
        )
        .with_bundled_root(None);

        let resolved = locator.resolve();
        assert_eq!(resolved.path, settings_path);
        assert_eq!(resolved.source, BinarySource::Settings);
    }

    #[test]
    fn test_resolve_uses_bundled_when_present() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(BUNDLED_DIR)).unwrap();
        let bundled = touch(&tmp.path().join(BUNDLED_DIR), platform_binary_name());

        let locator = BinaryLocator::new(
            None,
            Box::new(FixedSettings(Some(tmp.path().join("missing")))),
        )
        .with_bundled_root(Some(tmp.path().to_path_buf()));

        let resolved = locator.resolve();
        assert_eq!(resolved.path, bundled);
        assert_eq!(resolved.source, BinarySource::Bundled);
    }

    #[test]
    fn test_resolve_falls_back_to_program_name() {
        let tmp = TempDir::new().unwrap();
        let locator = BinaryLocator::new(None, Box::new(NoSettings))
            .with_bundled_root(Some(tmp.path().to_path_buf()));

        let resolved = locator.resolve();
        assert_eq!(resolved.path, PathBuf::from(platform_binary_name()));
        assert_eq!(resolved.source, BinarySource::SystemPath);
    }
}
