use cadence_fifo::SyncMode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings shared by the tone writer and reader processes.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CadenceConfig {
    #[serde(default = "defaults::shm_file_path")]
    pub shm_file_path: String,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default = "defaults::frame_count")]
    pub frame_count: u32,
    #[serde(default = "defaults::frame_size")]
    pub frame_size: u32,
    /// Whether the reader throttles the writer.
    #[serde(default = "defaults::throttle")]
    pub throttle: bool,
    #[serde(default)]
    pub sync: SyncSetting,
    pub low_arm: Option<u32>,
    pub high_trigger: Option<u32>,
    pub effective_frames: Option<u32>,
    /// Blocking obtain timeout; 0 means non-blocking.
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,
    /// Frames per write/read call.
    #[serde(default = "defaults::chunk_frames")]
    pub chunk_frames: u32,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SyncSetting {
    None,
    Sleep,
    FutexPrivate,
    #[default]
    FutexShared,
}

impl From<SyncSetting> for SyncMode {
    fn from(setting: SyncSetting) -> Self {
        match setting {
            SyncSetting::None => SyncMode::None,
            SyncSetting::Sleep => SyncMode::Sleep,
            SyncSetting::FutexPrivate => SyncMode::FutexPrivate,
            SyncSetting::FutexShared => SyncMode::FutexShared,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn shm_file_path() -> String {
        "/tmp/cadence_fifo".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn frame_count() -> u32 {
        4096
    }

    pub fn frame_size() -> u32 {
        4
    }

    pub fn throttle() -> bool {
        true
    }

    pub fn timeout_ms() -> u64 {
        10
    }

    pub fn chunk_frames() -> u32 {
        256
    }
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            shm_file_path: defaults::shm_file_path(),
            log_level: defaults::log_level(),
            frame_count: defaults::frame_count(),
            frame_size: defaults::frame_size(),
            throttle: defaults::throttle(),
            sync: SyncSetting::default(),
            low_arm: None,
            high_trigger: None,
            effective_frames: None,
            timeout_ms: defaults::timeout_ms(),
            chunk_frames: defaults::chunk_frames(),
        }
    }
}

impl CadenceConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_str)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync.into()
    }

    /// `None` when the configured timeout is zero (non-blocking).
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = CadenceConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, CadenceConfig::default());
        assert_eq!(cfg.sync, SyncSetting::FutexShared);
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn parses_all_fields() {
        let cfg = CadenceConfig::from_toml_str(
            r#"
            shm_file_path = "/dev/shm/tone"
            log_level = "debug"
            frame_count = 480
            frame_size = 8
            throttle = false
            sync = "futex-private"
            low_arm = 120
            high_trigger = 360
            effective_frames = 400
            timeout_ms = 0
            chunk_frames = 64
            "#,
        )
        .unwrap();
        assert_eq!(cfg.shm_file_path, "/dev/shm/tone");
        assert_eq!((cfg.frame_count, cfg.frame_size), (480, 8));
        assert!(!cfg.throttle);
        assert_eq!(cfg.sync, SyncSetting::FutexPrivate);
        assert_eq!((cfg.low_arm, cfg.high_trigger), (Some(120), Some(360)));
        assert_eq!(cfg.effective_frames, Some(400));
        assert_eq!((cfg.timeout_ms, cfg.chunk_frames), (0, 64));
        assert_eq!(cfg.timeout(), None);
        assert_eq!(cfg.sync_mode(), SyncMode::FutexPrivate);
    }

    #[test]
    fn rejects_unknown_sync_mode() {
        assert!(matches!(
            CadenceConfig::from_toml_str(r#"sync = "spin""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(
            CadenceConfig::load("/nonexistent/cadence.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
