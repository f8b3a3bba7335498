/// Configuration structures that can be tested independently
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_password: String,
    /// Access point SSID prefix; the last two MAC bytes are appended.
    pub ap_ssid_base: String,
    /// Empty means an open access point.
    pub ap_password: String,
    pub ap_channel: u8,
    pub ap_max_connections: u16,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            ap_ssid_base: "ESP".to_string(),
            ap_password: "12345678".to_string(),
            ap_channel: 1,
            ap_max_connections: 4,
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub base_path: String,
    pub partition_label: String,
    pub format_if_mount_failed: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: "/web".to_string(),
            partition_label: "web".to_string(),
            format_if_mount_failed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateConfig {
    pub write_block_size: usize,
    pub restart_delay_ms: u32,
    pub unmount_settle_ms: u32,
    pub pull_timeout_ms: u32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            write_block_size: crate::reader::DEFAULT_BLOCK_SIZE,
            restart_delay_ms: 2000,
            unmount_settle_ms: 500,
            pull_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpdaterConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub update: UpdateConfig,
    pub log_level: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
            update: UpdateConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ApPasswordTooShort(usize),
    SsidTooLong(usize),
    BlockSize(usize),
    BasePath(String),
    PartitionLabel(String),
    LogLevel(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ApPasswordTooShort(len) => {
                write!(f, "AP password must be empty or at least 8 characters, got {}", len)
            }
            ConfigError::SsidTooLong(len) => write!(f, "SSID longer than 32 bytes: {}", len),
            ConfigError::BlockSize(size) => {
                write!(f, "write block size {} outside 512..=65536", size)
            }
            ConfigError::BasePath(path) => write!(f, "base path must be absolute: {:?}", path),
            ConfigError::PartitionLabel(label) => {
                write!(f, "partition label must be 1..=16 characters: {:?}", label)
            }
            ConfigError::LogLevel(level) => write!(f, "unknown log level: {:?}", level),
        }
    }
}

impl std::error::Error for ConfigError {}

impl UpdaterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ap_password_len = self.network.ap_password.len();
        if ap_password_len > 0 && ap_password_len < 8 {
            return Err(ConfigError::ApPasswordTooShort(ap_password_len));
        }
        // Base plus "_XXXX" must still fit the 32 byte SSID field.
        if self.network.ap_ssid_base.len() + 5 > 32 {
            return Err(ConfigError::SsidTooLong(self.network.ap_ssid_base.len() + 5));
        }
        if self.network.wifi_ssid.len() > 32 {
            return Err(ConfigError::SsidTooLong(self.network.wifi_ssid.len()));
        }
        if !(512..=65536).contains(&self.update.write_block_size) {
            return Err(ConfigError::BlockSize(self.update.write_block_size));
        }
        if !self.storage.base_path.starts_with('/') || self.storage.base_path.len() < 2 {
            return Err(ConfigError::BasePath(self.storage.base_path.clone()));
        }
        let label = &self.storage.partition_label;
        if label.is_empty() || label.len() > 16 {
            return Err(ConfigError::PartitionLabel(label.clone()));
        }
        if parse_log_level(&self.log_level).is_none() {
            return Err(ConfigError::LogLevel(self.log_level.clone()));
        }
        Ok(())
    }
}

/// Access point SSID: base, underscore, last two MAC bytes in hex.
pub fn ap_ssid(base: &str, mac: &[u8; 6]) -> String {
    format!("{}_{:02X}{:02X}", base, mac[4], mac[5])
}

pub fn parse_log_level(level: &str) -> Option<log::LevelFilter> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Some(log::LevelFilter::Off),
        "error" => Some(log::LevelFilter::Error),
        "warn" | "warning" => Some(log::LevelFilter::Warn),
        "info" => Some(log::LevelFilter::Info),
        "debug" => Some(log::LevelFilter::Debug),
        "trace" => Some(log::LevelFilter::Trace),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = UpdaterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.base_path, "/web");
        assert_eq!(config.update.write_block_size, 8192);
        assert_eq!(config.update.restart_delay_ms, 2000);
    }

    #[test]
    fn test_config_serialization() {
        let config = UpdaterConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: UpdaterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: UpdaterConfig = serde_json::from_str(r#"{"log_level":"debug"}"#).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_ap_ssid_uses_last_mac_bytes() {
        let mac = [0x24, 0x6f, 0x28, 0x01, 0xab, 0x0c];
        assert_eq!(ap_ssid("ESP", &mac), "ESP_AB0C");
    }

    #[test]
    fn test_short_ap_password_rejected() {
        let mut config = UpdaterConfig::default();
        config.network.ap_password = "1234".to_string();
        assert_eq!(config.validate(), Err(ConfigError::ApPasswordTooShort(4)));

        config.network.ap_password.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_block_size_bounds() {
        let mut config = UpdaterConfig::default();
        config.update.write_block_size = 100;
        assert_eq!(config.validate(), Err(ConfigError::BlockSize(100)));
    }
}
