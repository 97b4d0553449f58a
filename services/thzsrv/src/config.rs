//! Service configuration
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. YAML file (`config/thzsrv.yaml` unless given explicitly)
//! 3. Environment variables prefixed `THZ_`, nested with `__`
//!    (e.g. `THZ_CONNECTION__KIND=ip`, `THZ_DEVICE__CACHE_TTL_SECS=30`)

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigurationError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/thzsrv.yaml";
pub const ENV_PREFIX: &str = "THZ_";

/// How the controller is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// USB/serial adapter on the service interface
    #[default]
    Usb,
    /// Serial-to-network bridge
    Ip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub kind: ConnectionKind,
    /// Serial device path, used when `kind` is `usb`
    pub device: String,
    /// Bridge host, used when `kind` is `ip`
    pub host: String,
    pub port: u16,
    pub baud_rate: u32,
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            kind: ConnectionKind::Usb,
            device: "/dev/ttyUSB0".to_string(),
            host: "127.0.0.1".to_string(),
            port: 2323,
            baud_rate: 115_200,
            connect_timeout_ms: 5000,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Upper bound for every handshake wait
    pub read_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    /// Directory with YAML register schemas overriding the built-in tables
    pub register_map_dir: Option<PathBuf>,
    /// Interval of the `poll` command
    pub poll_interval_secs: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
            cache_ttl_secs: 60,
            register_map_dir: None,
            poll_interval_secs: 60,
        }
    }
}

impl DeviceSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily log files are written here when set
    pub dir: Option<PathBuf>,
    /// JSON lines in the log file
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub device: DeviceSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate configuration from defaults, file and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        Self::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Load from a YAML file only, ignoring the environment
    pub fn load_file(path: &Path) -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default())).merge(Yaml::file(path)),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| ConfigurationError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let conn = &self.connection;
        match conn.kind {
            ConnectionKind::Usb => {
                if conn.device.trim().is_empty() {
                    return Err(invalid("connection.device cannot be empty"));
                }
                if conn.baud_rate == 0 {
                    return Err(invalid("connection.baud_rate must be greater than zero"));
                }
            },
            ConnectionKind::Ip => {
                if conn.host.trim().is_empty() {
                    return Err(invalid("connection.host cannot be empty"));
                }
                if conn.port == 0 {
                    return Err(invalid("connection.port cannot be zero"));
                }
            },
        }
        if conn.connect_timeout_ms == 0 {
            return Err(invalid("connection.connect_timeout_ms must be greater than zero"));
        }
        if self.device.read_timeout_ms == 0 {
            return Err(invalid("device.read_timeout_ms must be greater than zero"));
        }
        if self.device.poll_interval_secs == 0 {
            return Err(invalid("device.poll_interval_secs must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> crate::error::ThzError {
    ConfigurationError::Invalid(msg.to_string()).into()
}
