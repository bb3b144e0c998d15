use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::models::{validate_bpm, DEFAULT_BPM};
use crate::profiles::CueId;

pub const CONFIG_FILE: &str = "bilateral.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_bpm")]
    pub bpm: u32,
    #[serde(default)]
    pub cue: CueId,
    #[serde(default = "default_gain")]
    pub master_gain: f32,
    #[serde(default = "default_queue_capacity")]
    pub cue_queue_capacity: usize,
    #[serde(default = "default_render_sample_rate")]
    pub render_sample_rate: u32,
}

fn default_bpm() -> u32 {
    DEFAULT_BPM
}

fn default_gain() -> f32 {
    1.0
}

fn default_queue_capacity() -> usize {
    64
}

fn default_render_sample_rate() -> u32 {
    44_100
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            cue: CueId::default(),
            master_gain: default_gain(),
            cue_queue_capacity: default_queue_capacity(),
            render_sample_rate: default_render_sample_rate(),
        }
    }
}

impl BackendConfig {
    /// Parse a config file. The bpm is checked here so nothing downstream has to.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let txt = std::fs::read_to_string(path)?;
        let cfg: BackendConfig = toml::from_str(&txt)?;
        validate_bpm(cfg.bpm)?;
        Ok(cfg)
    }

    pub fn generate_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let txt = toml::to_string_pretty(&BackendConfig::default())?;
        std::fs::write(path, txt)?;
        Ok(())
    }
}

/// `bilateral.toml` from the working directory, or defaults.
pub static CONFIG: Lazy<BackendConfig> = Lazy::new(|| {
    let path = PathBuf::from(CONFIG_FILE);
    if !path.exists() {
        return BackendConfig::default();
    }
    BackendConfig::load(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), "ignoring config: {e}");
        BackendConfig::default()
    })
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    #[test]
    fn generated_default_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bilateral.toml");
        BackendConfig::generate_default(&path).unwrap();
        assert_eq!(BackendConfig::load(&path).unwrap(), BackendConfig::default());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg: BackendConfig = toml::from_str("bpm = 90\ncue = \"chime\"\n").unwrap();
        assert_eq!(cfg.bpm, 90);
        assert_eq!(cfg.cue, CueId::Chime);
        assert_eq!(cfg.master_gain, 1.0);
        assert_eq!(cfg.cue_queue_capacity, 64);
    }

    #[test]
    fn out_of_range_bpm_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "bpm = 300\n").unwrap();
        assert!(matches!(
            BackendConfig::load(&path),
            Err(SessionError::InvalidBpm(300))
        ));
    }
}
