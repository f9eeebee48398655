//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (`PORT`, `RELAY_HOST`, `RELAY_CONFIG`)
//! - TOML configuration file

use anyhow::{Context, Result};
use relay_core::RouterConfig;
use relay_transport::WebSocketConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default listen port.
const DEFAULT_PORT: u16 = 4000;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Room limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Allowed browser origins.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Room limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum participants per room. Unlimited when absent.
    #[serde(default)]
    pub max_room_size: Option<usize>,

    /// Maximum room id length in bytes.
    #[serde(default = "default_max_room_id_length")]
    pub max_room_id_length: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ping interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// Silence after which a connection is dropped, in milliseconds.
    #[serde(default = "default_heartbeat_timeout")]
    pub timeout_ms: u64,
}

/// Origin allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Empty means any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

fn default_port() -> u16 {
    port_from_env(std::env::var("PORT").ok())
}

fn port_from_env(value: Option<String>) -> u16 {
    value
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_max_room_id_length() -> usize {
    relay_core::room::MAX_ROOM_ID_LENGTH
}

fn default_heartbeat_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_heartbeat_timeout() -> u64 {
    60_000 // 60 seconds
}

fn default_allowed_origins() -> Vec<String> {
    [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://127.0.0.1:3000",
        "https://plag-detector-next-psi.vercel.app",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            cors: CorsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_room_size: None,
            max_room_id_length: default_max_room_id_length(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            timeout_ms: default_heartbeat_timeout(),
        }
    }
}

impl HeartbeatConfig {
    /// Ping interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// Inactivity timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl CorsConfig {
    /// Check whether a browser origin may connect.
    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == origin)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// `RELAY_HOST` and `PORT` override whatever the file sets.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env_overrides(
            std::env::var("RELAY_HOST").ok(),
            std::env::var("PORT").ok(),
        );
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        if let Ok(path) = std::env::var("RELAY_CONFIG") {
            let expanded = shellexpand::tilde(&path);
            return Self::from_file(expanded.as_ref());
        }

        let config_paths = [
            "relay.toml",
            "/etc/signal-relay/relay.toml",
            "~/.config/signal-relay/relay.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    fn apply_env_overrides(&mut self, host: Option<String>, port: Option<String>) {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.host = host;
        }
        if let Some(port) = port.and_then(|p| p.trim().parse().ok()) {
            self.port = port;
        }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Router settings derived from the limits section.
    #[must_use]
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            max_room_size: self.limits.max_room_size,
            max_room_id_length: self.limits.max_room_id_length,
        }
    }

    /// WebSocket settings derived from the transport section.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: self.transport.max_message_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_from_env() {
        assert_eq!(port_from_env(None), 4000);
        assert_eq!(port_from_env(Some("9000".into())), 9000);
        assert_eq!(port_from_env(Some("not-a-port".into())), 4000);
    }

    #[test]
    fn test_default_sections() {
        let config = Config::default();
        assert_eq!(config.transport.websocket_path, "/ws");
        assert_eq!(config.limits.max_room_size, None);
        assert_eq!(config.heartbeat.interval(), Duration::from_secs(30));
        assert!(config.cors.allows("http://localhost:3000"));
        assert!(!config.cors.allows("https://evil.example"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: Config = toml::from_str("host = \"127.0.0.1\"\nport = 9000").unwrap();

        config.apply_env_overrides(None, Some("not-a-port".into()));
        assert_eq!((config.host.as_str(), config.port), ("127.0.0.1", 9000));

        config.apply_env_overrides(Some("0.0.0.0".into()), Some("8123".into()));
        assert_eq!((config.host.as_str(), config.port), ("0.0.0.0", 8123));
    }

    #[test]
    fn test_empty_allow_list_allows_everything() {
        let cors = CorsConfig {
            allowed_origins: Vec::new(),
        };
        assert!(cors.allows("https://anywhere.example"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "127.0.0.1"
            port = 9000

            [limits]
            max_room_size = 2

            [cors]
            allowed_origins = ["https://interviews.example"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.router_config().max_room_size, Some(2));
        assert_eq!(config.limits.max_room_id_length, 256);
        assert!(config.cors.allows("https://interviews.example"));
        assert!(!config.cors.allows("http://localhost:3000"));
    }
}
