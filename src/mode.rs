//! Runtime mode: packaged install vs. development checkout.
//!
//! The mode decides which directory the bundle is read from. It is computed
//! exactly once at startup and then passed by value to whoever needs it.
//!
//! ## Resolution order
//!
//! 1. `BUNDLEVIEW_MODE` environment variable (`packaged` / `development`)
//! 2. `bundle.mode` in `config.toml`
//! 3. Executable location: a binary running from `target/<profile>/` is a
//!    development build, anything else is packaged

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable overriding mode detection.
pub const MODE_ENV: &str = "BUNDLEVIEW_MODE";

/// Where the bundle lives relative to the running program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Installed application: bundle sits in the read-only resources directory.
    Packaged,
    /// Cargo checkout: bundle sits next to the project.
    Development,
}

impl RuntimeMode {
    /// Parses a user-supplied mode name. Accepts a few common aliases.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "packaged" | "package" | "prod" | "production" | "release" => Some(Self::Packaged),
            "development" | "dev" | "debug" => Some(Self::Development),
            _ => None,
        }
    }

    /// Infers the mode from the executable path alone.
    pub fn from_exe(exe: &Path) -> Self {
        match exe.parent().and_then(cargo_project_root) {
            Some(_) => Self::Development,
            None => Self::Packaged,
        }
    }

    /// Computes the mode for this process. Call once at startup.
    pub fn detect(configured: Option<RuntimeMode>) -> Self {
        if let Ok(value) = env::var(MODE_ENV) {
            match Self::parse(&value) {
                Some(mode) => {
                    debug!(?mode, "Runtime mode from {MODE_ENV}");
                    return mode;
                }
                None => warn!(value, "Ignoring unrecognised {MODE_ENV}"),
            }
        }

        if let Some(mode) = configured {
            debug!(?mode, "Runtime mode from configuration");
            return mode;
        }

        match env::current_exe() {
            Ok(exe) => Self::from_exe(&exe),
            Err(e) => {
                warn!(error = %e, "Cannot locate executable, assuming packaged mode");
                Self::Packaged
            }
        }
    }
}

/// Returns the project root when `exe_dir` is a cargo output directory
/// (`target/debug`, `target/release`, `target/debug/deps`, ...).
pub fn cargo_project_root(exe_dir: &Path) -> Option<&Path> {
    exe_dir
        .ancestors()
        .take(3)
        .find(|dir| dir.file_name().is_some_and(|n| n == "target"))
        .and_then(Path::parent)
}
