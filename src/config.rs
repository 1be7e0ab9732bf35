//! ==============================================================================
//! config.rs - runtime configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `config/dashboard.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig:  web server bind address.
//!     - SerialConfig:  device port name and baud rate.
//!     - RefreshConfig: dashboard refresh cadence.
//!     - StoreConfig:   demo seeding toggle.
//!     - LoggingConfig: log level.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashConfig {
    pub server: ServerConfig,
    pub serial: SerialConfig,
    pub refresh: RefreshConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialConfig {
    /// start the ingestion thread at all
    pub enabled: bool,
    /// preferred port name; the first enumerated port is used when absent
    pub port: String,
    pub baud: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    /// dashboard poll interval in milliseconds
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// pre-seed the store with demo readings at startup
    pub seed_demo: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl DashConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: DashConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("dashboard.toml"),
            std::path::PathBuf::from("dashboard.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│         DASHBOARD CONFIGURATION         │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Bind: {}:{}", self.server.host, self.server.port);
        println!(
            "│ Serial: {} @ {} baud ({})",
            self.serial.port,
            self.serial.baud,
            if self.serial.enabled { "enabled" } else { "disabled" }
        );
        println!("│ Refresh: {}ms", self.refresh.interval_ms);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            serial: SerialConfig::default(),
            refresh: RefreshConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8052,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: "COM3".to_string(),
            baud: 9600,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_ms: 2000 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { seed_demo: false }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_behavior() {
        let config = DashConfig::default();
        assert_eq!(config.server.port, 8052);
        assert_eq!(config.serial.baud, 9600);
        assert_eq!(config.refresh.interval_ms, 2000);
        assert!(config.serial.enabled);
        assert!(!config.store.seed_demo);
    }

    #[test]
    fn parses_a_full_document() {
        let config: DashConfig = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 3000

            [serial]
            enabled = false
            port = "/dev/ttyUSB0"
            baud = 115200

            [refresh]
            interval_ms = 1000

            [store]
            seed_demo = true

            [logging]
            level = "debug"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert!(!config.serial.enabled);
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud, 115200);
        assert_eq!(config.refresh.interval_ms, 1000);
        assert!(config.store.seed_demo);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: DashConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            "#,
        )
        .expect("partial config");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.serial.baud, 9600);
        assert_eq!(config.refresh.interval_ms, 2000);
    }
}
