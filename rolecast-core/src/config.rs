use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub hub: HubConfig,
    pub logging: LoggingConfig,
    pub profiles: ProfilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Shared HS256 secret
    pub secret: String,
    /// Clock skew tolerated when checking `exp`
    pub leeway_seconds: u64,
    pub token_ttl_hours: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            leeway_seconds: 60,
            token_ttl_hours: 72,
        }
    }
}

/// Longest accepted writer heartbeat (one day)
pub const MAX_PING_INTERVAL_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Frames buffered per connection before it is treated as a slow consumer
    pub outbound_capacity: usize,
    /// Largest inbound frame accepted from a peer
    pub max_message_size: usize,
    /// Writer heartbeat; 0 disables pings
    pub ping_interval_seconds: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            max_message_size: 64 * 1024,
            ping_interval_seconds: 30,
        }
    }
}

impl HubConfig {
    #[must_use]
    pub const fn ping_interval(&self) -> Option<Duration> {
        if self.ping_interval_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ping_interval_seconds))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Seed data for the in-memory profile store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// YAML file holding a list of profiles
    pub seed_file: Option<String>,
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // ROLECAST_JWT__SECRET, ROLECAST_HUB__OUTBOUND_CAPACITY, ...
        builder = builder.add_source(
            Environment::with_prefix("ROLECAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Check settings the server cannot start without
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.jwt.secret.trim().is_empty() {
            errors.push("jwt.secret is required".to_string());
        }
        if self.jwt.token_ttl_hours == 0 {
            errors.push("jwt.token_ttl_hours must be non-zero".to_string());
        }
        if self.hub.outbound_capacity == 0 {
            errors.push("hub.outbound_capacity must be non-zero".to_string());
        }
        if self.hub.max_message_size == 0 {
            errors.push("hub.max_message_size must be non-zero".to_string());
        }
        if self.hub.ping_interval_seconds > MAX_PING_INTERVAL_SECONDS {
            errors.push(format!(
                "hub.ping_interval_seconds must be at most {MAX_PING_INTERVAL_SECONDS}, got {}",
                self.hub.ping_interval_seconds
            ));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got {:?}",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
