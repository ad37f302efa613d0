use crate::core::constants::{ACK_TIMEOUT_MS, DATA_TIMEOUT_MS, MAX_RETRY};
use crate::processing::frame::LengthEncoding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Complete link configuration as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Physical port parameters
    pub serial: SerialSettings,
    /// Retry budget and timeouts of the transaction engine
    pub protocol: ProtocolSettings,
    /// Default log filter for the binary (`RUST_LOG` takes precedence)
    pub log_level: String,
}

/// Serial port parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// OS name of the port, e.g. `COM4` or `/dev/ttyUSB0`
    pub port_name: String,
    pub baud_rate: u32,
    /// 5 to 8
    pub data_bits: u8,
    pub parity: ParitySetting,
    pub stop_bits: StopBitsSetting,
    /// Timeout for writes and port control calls (milliseconds)
    pub write_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParitySetting {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBitsSetting {
    One,
    Two,
}

/// Transaction engine parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Attempts per phase (handshake and response)
    pub max_retry: u8,
    /// Wait for the handshake byte (milliseconds)
    pub ack_timeout_ms: u64,
    /// Wait for each response read (milliseconds)
    pub data_timeout_ms: u64,
    /// Encoding of the response length field
    pub length_encoding: LengthEncoding,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("I/O error: {message}")]
    Io { message: String },
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            protocol: ProtocolSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port_name: "COM4".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: ParitySetting::None,
            stop_bits: StopBitsSetting::One,
            write_timeout_ms: 1000,
        }
    }
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            max_retry: MAX_RETRY,
            ack_timeout_ms: ACK_TIMEOUT_MS,
            data_timeout_ms: DATA_TIMEOUT_MS,
            length_encoding: LengthEncoding::BigEndian,
        }
    }
}

impl SerialSettings {
    pub fn data_bits(&self) -> serialport::DataBits {
        match self.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port_name.trim().is_empty() {
            return Err(invalid("serial.port_name", &self.port_name, "port name is empty"));
        }
        if self.baud_rate == 0 {
            return Err(invalid("serial.baud_rate", self.baud_rate, "must be positive"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(invalid("serial.data_bits", self.data_bits, "must be between 5 and 8"));
        }
        if self.write_timeout_ms == 0 {
            return Err(invalid(
                "serial.write_timeout_ms",
                self.write_timeout_ms,
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl From<ParitySetting> for serialport::Parity {
    fn from(parity: ParitySetting) -> Self {
        match parity {
            ParitySetting::None => serialport::Parity::None,
            ParitySetting::Odd => serialport::Parity::Odd,
            ParitySetting::Even => serialport::Parity::Even,
        }
    }
}

impl From<StopBitsSetting> for serialport::StopBits {
    fn from(stop_bits: StopBitsSetting) -> Self {
        match stop_bits {
            StopBitsSetting::One => serialport::StopBits::One,
            StopBitsSetting::Two => serialport::StopBits::Two,
        }
    }
}

impl ProtocolSettings {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_millis(self.data_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retry == 0 {
            return Err(invalid(
                "protocol.max_retry",
                self.max_retry,
                "at least one attempt is required",
            ));
        }
        if self.ack_timeout_ms == 0 {
            return Err(invalid(
                "protocol.ack_timeout_ms",
                self.ack_timeout_ms,
                "must be positive",
            ));
        }
        if self.data_timeout_ms == 0 {
            return Err(invalid(
                "protocol.data_timeout_ms",
                self.data_timeout_ms,
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl LinkConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: LinkConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Serialization {
                message: format!("Failed to parse config file '{}': {}", path_str, e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialization {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::Io {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serial.validate()?;
        self.protocol.validate()
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = LinkConfig::default();
        assert_eq!(config.serial.port_name, "COM4");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.protocol.max_retry, 3);
        assert_eq!(config.protocol.ack_timeout(), Duration::from_millis(2000));
        assert_eq!(config.protocol.data_timeout(), Duration::from_millis(120_000));
        assert_eq!(config.protocol.length_encoding, LengthEncoding::BigEndian);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let mut config = LinkConfig::default();
        config.protocol.max_retry = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { ref parameter, .. })
                if parameter == "protocol.max_retry"
        ));

        let mut config = LinkConfig::default();
        config.serial.data_bits = 9;
        assert!(config.validate().is_err());

        let mut config = LinkConfig::default();
        config.serial.port_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link.json");

        let mut config = LinkConfig::default();
        config.serial.port_name = "/dev/ttyUSB0".to_string();
        config.serial.parity = ParitySetting::Even;
        config.protocol.length_encoding = LengthEncoding::Bcd;
        config.log_level = "debug".to_string();

        config.save_to_file(&path).unwrap();
        let loaded = LinkConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        let json = r#"{
            "serial": { "port_name": "COM7" },
            "protocol": { "length_encoding": "bcd" }
        }"#;
        fs::write(&path, json).unwrap();

        let loaded = LinkConfig::from_file(&path).unwrap();
        assert_eq!(loaded.serial.port_name, "COM7");
        assert_eq!(loaded.serial.baud_rate, 9600);
        assert_eq!(loaded.protocol.max_retry, 3);
        assert_eq!(loaded.protocol.length_encoding, LengthEncoding::Bcd);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = LinkConfig::from_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LinkConfig::from_file(&path),
            Err(ConfigError::Serialization { .. })
        ));

        fs::write(&path, r#"{ "protocol": { "ack_timeout_ms": 0 } }"#).unwrap();
        assert!(matches!(
            LinkConfig::from_file(&path),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }
}
