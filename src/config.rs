//! TOML-based configuration system.
//!
//! Loads settings from a `config.toml` file, falling back to defaults for
//! anything missing. Every struct implements `Default` so a missing or
//! partial config file still yields a working shell.
//!
//! ## Config file search order
//!
//! 1. `BUNDLEVIEW_CONFIG` environment variable (explicit override)
//! 2. Next to the executable (`<exe_dir>/config.toml`)
//! 3. Platform config directory (`%APPDATA%\BundleView\config.toml` on Windows)
//! 4. Current working directory (`./config.toml`)
//! 5. No file found → `Config::default()`

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mode::RuntimeMode;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "BUNDLEVIEW_CONFIG";

// ─────────────────────────────────────────────────────────────────────────────
// Config structs
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub window: WindowConfig,
    pub bundle: BundleConfig,
    pub servo: ServoConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Title used until the page provides its own `<title>`.
    pub window_title: String,
}

/// Window dimensions, shared by every managed window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

/// Where the bundle lives and how it is addressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Bundle directory name under the base location (see [`crate::resolver::base_path`]).
    pub site_dir: String,
    /// Default document served for directory-style paths.
    pub index_document: String,
    /// Scheme of the virtual protocol.
    pub scheme: String,
    /// Host part of bundle URLs.
    pub host: String,
    /// Forces the runtime mode. Unset = detect from the executable location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RuntimeMode>,
}

/// Servo engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// Maximum layout threads. 0 = auto-detect from CPU count.
    pub layout_threads: i64,
    /// User-agent string. Empty = engine default.
    pub user_agent: String,
    /// Pre-cache GPU shaders at startup.
    pub precache_shaders: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Default impls
// ─────────────────────────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            window_title: "BundleView".to_string(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            site_dir: "dist".to_string(),
            index_document: "index.html".to_string(),
            scheme: "app".to_string(),
            host: "bundle".to_string(),
            mode: None,
        }
    }
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            layout_threads: 0,
            user_agent: String::new(),
            precache_shaders: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config loading and saving
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Loads configuration from a TOML file. Never panics: returns defaults
    /// if no file is found or if parsing fails.
    pub fn load() -> Self {
        match find_config_path() {
            Some(path) => match fs::read_to_string(&path) {
                Ok(content) => match Self::parse(&content) {
                    Ok(config) => {
                        info!(path = %path.display(), "Configuration loaded");
                        config
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                        Config::default()
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read config, using defaults");
                    Config::default()
                }
            },
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        }
    }

    /// Parses and sanitizes a TOML document.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        config.sanitize();
        Ok(config)
    }

    /// Saves configuration to the platform config directory.
    /// Creates the directory if it doesn't exist.
    pub fn save(&self) -> io::Result<()> {
        let path = save_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(&path, content)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Replaces blank bundle fields with their defaults. An empty scheme or
    /// index document would make every internal link unresolvable.
    fn sanitize(&mut self) {
        let defaults = BundleConfig::default();
        let bundle = &mut self.bundle;
        for (value, fallback) in [
            (&mut bundle.site_dir, defaults.site_dir),
            (&mut bundle.index_document, defaults.index_document),
            (&mut bundle.scheme, defaults.scheme),
            (&mut bundle.host, defaults.host),
        ] {
            if value.trim().is_empty() {
                warn!(fallback = %fallback, "Empty bundle setting, using default");
                *value = fallback;
            }
        }
        bundle.scheme = bundle.scheme.trim().to_ascii_lowercase();
    }
}

/// Searches for a config file in the standard locations.
fn find_config_path() -> Option<PathBuf> {
    // 1. Explicit env var override
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let p = PathBuf::from(path);
        if p.is_file() {
            return Some(p);
        }
    }

    // 2. Next to the executable
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 3. Platform config directory
    if let Some(dir) = platform_config_dir() {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 4. Current working directory
    let p = PathBuf::from("config.toml");
    if p.is_file() {
        return Some(p);
    }

    None
}

/// Returns the platform-specific save path for the config file.
fn save_path() -> PathBuf {
    platform_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Returns the platform config directory without adding a dependency.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join("BundleView"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| format!("{h}/.config")))
            .map(|dir| PathBuf::from(dir).join("bundleview"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.general.window_title, "BundleView");
        assert_eq!(c.window.width, 1200);
        assert_eq!(c.window.height, 800);
        assert_eq!(c.bundle.site_dir, "dist");
        assert_eq!(c.bundle.index_document, "index.html");
        assert_eq!(c.bundle.scheme, "app");
        assert_eq!(c.bundle.host, "bundle");
        assert!(c.bundle.mode.is_none());
        assert_eq!(c.servo.layout_threads, 0);
    }

    #[test]
    fn test_empty_toml_returns_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 1200);
        assert_eq!(config.bundle.scheme, "app");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
[bundle]
site_dir = "public"
mode = "development"
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.bundle.site_dir, "public");
        assert_eq!(config.bundle.mode, Some(RuntimeMode::Development));
        assert_eq!(config.bundle.index_document, "index.html"); // default
        assert_eq!(config.window.height, 800); // default
    }

    #[test]
    fn test_blank_bundle_fields_fall_back() {
        let toml = r#"
[bundle]
scheme = "  "
index_document = ""
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.bundle.scheme, "app");
        assert_eq!(config.bundle.index_document, "index.html");
    }

    #[test]
    fn test_scheme_is_lowercased() {
        let config = Config::parse("[bundle]\nscheme = \"Site\"\n").unwrap();
        assert_eq!(config.bundle.scheme, "site");
    }

    #[test]
    fn test_invalid_mode_is_an_error() {
        assert!(Config::parse("[bundle]\nmode = \"staging\"\n").is_err());
    }

    #[test]
    fn test_full_toml_roundtrip() {
        let mut config = Config::default();
        config.bundle.mode = Some(RuntimeMode::Packaged);
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized = Config::parse(&serialized).unwrap();
        assert_eq!(deserialized.window.width, config.window.width);
        assert_eq!(deserialized.bundle.mode, Some(RuntimeMode::Packaged));
        assert_eq!(deserialized.bundle.host, config.bundle.host);
    }

    #[test]
    fn test_unset_mode_is_not_serialized() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(!serialized.contains("mode"));
    }

    #[test]
    fn test_save_path_not_empty() {
        let path = save_path();
        assert!(!path.as_os_str().is_empty());
    }
}
