//! Link configuration

pub mod config;

pub use config::{
    ConfigError, LinkConfig, ParitySetting, ProtocolSettings, SerialSettings, StopBitsSetting,
};
