//! Shroud Configuration
//!
//! Shared configuration crate for the worker and the CLI.
//!
//! Handles loading configuration from:
//! 1. SHROUD_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.shroud/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".shroud";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_GATEWAY_URL: &str = "https://api.explorer.provable.com/v1/testnet";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROGRAM_ID: &str = "private_donation.aleo";
const DEFAULT_FEE: f64 = 0.1;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// Floor applied to the poll interval so a zero setting cannot spin.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 120;
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShroudConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub program: ProgramConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Ledger gateway connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.into()
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Target program and fee defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    #[serde(default = "default_program_id")]
    pub id: String,
    /// Fee in credits used when a request omits one
    #[serde(default = "default_fee")]
    pub default_fee: f64,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_PROGRAM_ID.into(),
            default_fee: DEFAULT_FEE,
        }
    }
}

fn default_program_id() -> String {
    DEFAULT_PROGRAM_ID.into()
}
fn default_fee() -> f64 {
    DEFAULT_FEE
}

/// Status polling limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: Some(DEFAULT_POLL_MAX_ATTEMPTS),
            timeout_secs: None,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_max_attempts() -> Option<u32> {
    Some(DEFAULT_POLL_MAX_ATTEMPTS)
}

/// Worker message loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Follow every broadcast with status tracking events
    #[serde(default)]
    pub track_after_broadcast: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            track_after_broadcast: false,
        }
    }
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

/// Set Option<T> from env var if present and parseable
fn env_parse_option<T: std::str::FromStr>(key: &str, field: &mut Option<T>) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = Some(parsed),
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ShroudConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SHROUD_CONFIG env var
        if let Ok(path) = env::var("SHROUD_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("SHROUD_CONFIG points to missing file: {}", path.display());
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shroud/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Gateway
        env_string("SHROUD_GATEWAY_URL", &mut self.gateway.url);
        env_parse(
            "SHROUD_REQUEST_TIMEOUT_SECS",
            &mut self.gateway.request_timeout_secs,
        );

        // Program
        env_string("SHROUD_PROGRAM_ID", &mut self.program.id);
        env_parse("SHROUD_DEFAULT_FEE", &mut self.program.default_fee);

        // Poller
        env_parse("SHROUD_POLL_INTERVAL_MS", &mut self.poller.interval_ms);
        env_parse_option("SHROUD_POLL_MAX_ATTEMPTS", &mut self.poller.max_attempts);
        env_parse_option("SHROUD_POLL_TIMEOUT_SECS", &mut self.poller.timeout_secs);

        // Worker
        env_parse("SHROUD_CHANNEL_CAPACITY", &mut self.worker.channel_capacity);
        if let Some(v) = env_bool("SHROUD_TRACK_AFTER_BROADCAST") {
            self.worker.track_after_broadcast = v;
        }
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.poller.timeout_secs = Some(300);
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
