//! Matchcast Configuration
//!
//! Configuration structures with serde defaults so that a partial YAML file
//! (or none at all) still produces a runnable setup.

use crate::error::MatchcastError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Seconds between simulation ticks
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;
/// Extra attempts after a failed tick batch
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Fixed delay between tick attempts (seconds)
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;
/// Minute-units a half-time break lasts
pub const DEFAULT_HALF_TIME_MINUTES: u32 = 15;
/// Minute at which the first half ends
pub const DEFAULT_FIRST_HALF_END_MINUTE: u32 = 45;
/// Minute at which the match ends
pub const DEFAULT_FULL_TIME_MINUTE: u32 = 90;
/// Typing flag lifetime (seconds)
pub const DEFAULT_TYPING_TTL_SECS: u64 = 5;
/// Keys requested per presence scan round-trip
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;
/// Default gateway host
pub const DEFAULT_GATEWAY_HOST: &str = "127.0.0.1";
/// Default gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 3001;
/// Longest accepted chat message, in characters
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 280;
/// Queued outbound messages per viewer connection
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Flavor roster used when naming the player behind a simulated event
pub const DEFAULT_PLAYERS: [&str; 10] = [
    "Odegaard", "Haaland", "Salah", "Palmer", "Saka", "Foden", "Rodri", "Rice", "Van Dijk",
    "Saliba",
];

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_matchcast_dir() -> PathBuf {
    home_dir().join(".matchcast")
}

// ============================================================================
// Main Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

// ============================================================================
// Simulation Config
// ============================================================================

/// Tick scheduler and lifecycle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "SimulationConfig::default_tick_interval")]
    pub tick_interval_secs: u64,
    #[serde(default = "SimulationConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "SimulationConfig::default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "SimulationConfig::default_half_time_minutes")]
    pub half_time_minutes: u32,
    #[serde(default = "SimulationConfig::default_first_half_end")]
    pub first_half_end_minute: u32,
    #[serde(default = "SimulationConfig::default_full_time")]
    pub full_time_minute: u32,
    /// Player names attached to generated events
    #[serde(default = "SimulationConfig::default_players")]
    pub players: Vec<String>,
}

impl SimulationConfig {
    fn default_tick_interval() -> u64 {
        DEFAULT_TICK_INTERVAL_SECS
    }
    fn default_max_retries() -> u32 {
        DEFAULT_MAX_RETRIES
    }
    fn default_retry_delay() -> u64 {
        DEFAULT_RETRY_DELAY_SECS
    }
    fn default_half_time_minutes() -> u32 {
        DEFAULT_HALF_TIME_MINUTES
    }
    fn default_first_half_end() -> u32 {
        DEFAULT_FIRST_HALF_END_MINUTE
    }
    fn default_full_time() -> u32 {
        DEFAULT_FULL_TIME_MINUTE
    }
    fn default_players() -> Vec<String> {
        DEFAULT_PLAYERS.iter().map(|p| p.to_string()).collect()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            half_time_minutes: DEFAULT_HALF_TIME_MINUTES,
            first_half_end_minute: DEFAULT_FIRST_HALF_END_MINUTE,
            full_time_minute: DEFAULT_FULL_TIME_MINUTE,
            players: Self::default_players(),
        }
    }
}

// ============================================================================
// Presence Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "PresenceConfig::default_typing_ttl")]
    pub typing_ttl_secs: u64,
    #[serde(default = "PresenceConfig::default_scan_batch_size")]
    pub scan_batch_size: usize,
}

impl PresenceConfig {
    fn default_typing_ttl() -> u64 {
        DEFAULT_TYPING_TTL_SECS
    }
    fn default_scan_batch_size() -> usize {
        DEFAULT_SCAN_BATCH_SIZE
    }

    pub fn typing_ttl(&self) -> Duration {
        Duration::from_secs(self.typing_ttl_secs)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            typing_ttl_secs: DEFAULT_TYPING_TTL_SECS,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}

// ============================================================================
// Gateway Config
// ============================================================================

/// Viewer-facing WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "GatewayConfig::default_host")]
    pub host: String,
    #[serde(default = "GatewayConfig::default_port")]
    pub port: u16,
    #[serde(default = "GatewayConfig::default_max_message_chars")]
    pub max_message_chars: usize,
    #[serde(default = "GatewayConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl GatewayConfig {
    fn default_host() -> String {
        DEFAULT_GATEWAY_HOST.to_string()
    }
    fn default_port() -> u16 {
        DEFAULT_GATEWAY_PORT
    }
    fn default_max_message_chars() -> usize {
        DEFAULT_MAX_MESSAGE_CHARS
    }
    fn default_outbound_buffer() -> usize {
        DEFAULT_OUTBOUND_BUFFER
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GATEWAY_HOST.to_string(),
            port: DEFAULT_GATEWAY_PORT,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

// ============================================================================
// Store Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database holding teams, matches and events
    #[serde(default = "StoreConfig::default_db_path")]
    pub db_path: PathBuf,
}

impl StoreConfig {
    fn default_db_path() -> PathBuf {
        default_matchcast_dir().join("matchcast.db")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: Self::default_db_path(),
        }
    }
}

// ============================================================================
// Config Loading and Validation
// ============================================================================

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from an explicit path or the first default location found
    pub fn load(path: Option<&str>) -> Result<Config, MatchcastError> {
        let config_path = Self::resolve_config_path(path)?;
        Self::load_from(&config_path)
    }

    /// Like [`ConfigLoader::load`], but falls back to defaults when no file exists
    /// in any default location. An explicit path that is missing is still an error.
    pub fn load_or_default(path: Option<&str>) -> Result<Config, MatchcastError> {
        if path.is_none() && Self::default_paths().iter().all(|p| !p.exists()) {
            tracing::info!("No config file found, using defaults");
            return Ok(Config::default());
        }
        Self::load(path)
    }

    pub fn load_from(path: &Path) -> Result<Config, MatchcastError> {
        if !path.exists() {
            return Err(MatchcastError::config_not_found(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| MatchcastError::config_parse_error(format!("Failed to read: {}", e)))?;
        let config: Config = serde_yml::from_str(&content)
            .map_err(|e| MatchcastError::config_parse_error(format!("Failed to parse: {}", e)))?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    fn default_paths() -> [PathBuf; 3] {
        [
            default_matchcast_dir().join("config.yaml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("matchcast.yaml"),
            PathBuf::from("./matchcast.yaml"),
        ]
    }

    fn resolve_config_path(path: Option<&str>) -> Result<PathBuf, MatchcastError> {
        if let Some(p) = path {
            return Ok(PathBuf::from(p));
        }

        Self::default_paths()
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| {
                MatchcastError::config_not_found(
                    "Config not found. Run `matchcast config-sample` or create ~/.matchcast/config.yaml",
                )
            })
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), MatchcastError> {
        let sim = &config.simulation;
        if sim.tick_interval_secs == 0 {
            return Err(MatchcastError::config_invalid(
                "simulation.tick_interval_secs",
                "Tick interval must be positive",
            ));
        }
        if sim.players.is_empty() {
            return Err(MatchcastError::config_invalid(
                "simulation.players",
                "Player roster cannot be empty",
            ));
        }
        if sim.first_half_end_minute >= sim.full_time_minute {
            return Err(MatchcastError::config_invalid(
                "simulation.first_half_end_minute",
                format!(
                    "First half must end before full time ({} >= {})",
                    sim.first_half_end_minute, sim.full_time_minute
                ),
            ));
        }
        if config.presence.typing_ttl_secs == 0 {
            return Err(MatchcastError::config_invalid(
                "presence.typing_ttl_secs",
                "Typing TTL must be positive",
            ));
        }
        if config.presence.scan_batch_size == 0 {
            return Err(MatchcastError::config_invalid(
                "presence.scan_batch_size",
                "Scan batch size must be positive",
            ));
        }
        if config.gateway.max_message_chars == 0 {
            return Err(MatchcastError::config_invalid(
                "gateway.max_message_chars",
                "Chat limit must be positive",
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn save(&self, path: &Path) -> Result<(), MatchcastError> {
        let content = serde_yml::to_string(self).map_err(|e| {
            MatchcastError::config_parse_error(format!("Serialization failed: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        Config {
            simulation: SimulationConfig::default(),
            presence: PresenceConfig::default(),
            gateway: GatewayConfig {
                host: "0.0.0.0".to_string(),
                ..GatewayConfig::default()
            },
            store: StoreConfig::default(),
        }
    }
}
