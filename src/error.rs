//! Error types for the bilateral backend.

use thiserror::Error;

use crate::session::SessionPhase;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("bpm {0} is outside 60..=200 or not a multiple of 5")]
    InvalidBpm(u32),

    #[error("cannot {action} while session is {phase:?}")]
    InvalidTransition {
        phase: SessionPhase,
        action: &'static str,
    },

    #[error("unknown cue: {0}")]
    UnknownCue(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("session runtime is no longer running")]
    RuntimeStopped,

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
