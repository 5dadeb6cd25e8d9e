mod config;

pub use config::{CadenceConfig, ConfigError, SyncSetting};
