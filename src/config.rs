//! TOML-based configuration system.
//!
//! Loads settings from a `config.toml` file, falling back to defaults that
//! reproduce the stock constants (100 000-bit filter, 3 probes, 20-entry
//! journal, 2 s sweep, 15 s freeze threshold, …). Every struct implements
//! `Default` so a missing or partial config file behaves like no file at all.
//!
//! ## Config file search order
//!
//! 1. `SANDA_CONFIG` environment variable (explicit override)
//! 2. Next to the executable (`<exe_dir>/config.toml`)
//! 3. Platform config directory (`%APPDATA%\Sanda\config.toml` on Windows)
//! 4. Current working directory (`./config.toml`)
//! 5. No file found → `Config::default()`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bloom;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Config structs
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub filter: FilterConfig,
    pub shield: ShieldConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub default_url: String,
}

/// Membership filter and blocked pattern sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Bit array size.
    pub size: usize,
    /// Number of hash probes.
    pub hash_count: u32,
    /// Directory of `*.txt` pattern lists. Unset = search `resources/patterns/`.
    pub patterns_dir: Option<PathBuf>,
    /// Appended after the built-in and file patterns.
    pub extra_patterns: Vec<String>,
}

/// Shield session journal and simulated bridge latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    pub log_capacity: usize,
    /// Chance of a synthesized background log after an allowed request.
    pub background_log_probability: f64,
    pub stealth_on_start: bool,
    pub bridge_latency_min_ms: u64,
    pub bridge_latency_max_ms: u64,
}

/// Tab lifecycle timings and memory model (MB).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub tick_interval_ms: u64,
    pub idle_freeze_ms: u64,
    pub navigate_settle_ms: u64,
    pub wake_settle_ms: u64,
    pub recover_settle_ms: u64,
    pub navigate_memory_mb: f64,
    pub wake_memory_mb: f64,
    pub new_tab_memory_mb: f64,
    pub frozen_memory_mb: f64,
    pub background_floor_mb: f64,
    pub background_decay_mb: f64,
    pub active_min_mb: f64,
    pub active_max_mb: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Default impls
// ─────────────────────────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_url: "browser://newtab".to_string(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            size: bloom::DEFAULT_SIZE,
            hash_count: bloom::DEFAULT_HASH_COUNT,
            patterns_dir: None,
            extra_patterns: Vec::new(),
        }
    }
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            log_capacity: 20,
            background_log_probability: 0.15,
            stealth_on_start: false,
            bridge_latency_min_ms: 2,
            bridge_latency_max_ms: 7,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_000,
            idle_freeze_ms: 15_000,
            navigate_settle_ms: 800,
            wake_settle_ms: 500,
            recover_settle_ms: 800,
            navigate_memory_mb: 35.5,
            wake_memory_mb: 45.0,
            new_tab_memory_mb: 8.0,
            frozen_memory_mb: 2.5,
            background_floor_mb: 15.0,
            background_decay_mb: 5.0,
            active_min_mb: 40.0,
            active_max_mb: 150.0,
        }
    }
}

impl LifecycleConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn idle_freeze(&self) -> Duration {
        Duration::from_millis(self.idle_freeze_ms)
    }
}

impl ShieldConfig {
    pub fn bridge_latency(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.bridge_latency_min_ms),
            Duration::from_millis(self.bridge_latency_max_ms),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.size == 0 {
            return Err(invalid("filter.size", "must be greater than 0"));
        }
        if self.filter.hash_count == 0 {
            return Err(invalid("filter.hash_count", "must be greater than 0"));
        }
        if self.shield.log_capacity == 0 {
            return Err(invalid("shield.log_capacity", "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.shield.background_log_probability) {
            return Err(invalid("shield.background_log_probability", "must be within 0.0..=1.0"));
        }
        if self.shield.bridge_latency_min_ms > self.shield.bridge_latency_max_ms {
            return Err(invalid("shield.bridge_latency_min_ms", "exceeds bridge_latency_max_ms"));
        }
        let l = &self.lifecycle;
        if l.tick_interval_ms == 0 {
            return Err(invalid("lifecycle.tick_interval_ms", "must be greater than 0"));
        }
        if l.active_min_mb > l.active_max_mb {
            return Err(invalid("lifecycle.active_min_mb", "exceeds active_max_mb"));
        }
        Ok(())
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config loading and saving
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Loads configuration from a TOML file. Never panics: returns defaults
    /// if no file is found, if parsing fails or if validation fails.
    pub fn load() -> Self {
        match find_config_path() {
            Some(path) => match Self::load_from(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "Configuration loaded");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                    Config::default()
                }
            },
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        }
    }

    /// Reads, parses and validates one file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the platform config directory.
    /// Creates the directory if it doesn't exist.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = save_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// Searches for a config file in the standard locations.
fn find_config_path() -> Option<PathBuf> {
    // 1. Explicit env var override
    if let Ok(path) = std::env::var("SANDA_CONFIG") {
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
            .map(|appdata| PathBuf::from(appdata).join("Sanda"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| format!("{h}/.config")))
            .map(|dir| PathBuf::from(dir).join("sanda"))
    }
}
