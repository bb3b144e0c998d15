use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;
pub const BPM_STEP: u32 = 5;
pub const DEFAULT_BPM: u32 = 120;

/// Stereo side a cue is panned to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub fn flip(self) -> Self {
        match self {
            Channel::Left => Channel::Right,
            Channel::Right => Channel::Left,
        }
    }

    /// Pan position: -1.0 is hard left, 1.0 is hard right.
    pub fn pan(self) -> f32 {
        match self {
            Channel::Left => -1.0,
            Channel::Right => 1.0,
        }
    }
}

/// One completed session as shown in the history list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionHistoryRecord {
    pub date: DateTime<Local>,
    #[serde(alias = "duration")]
    pub duration_seconds: u64,
    pub bpm: u32,
}

/// Delivered to the journal once per completed run with a non-zero duration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JournalHandoff {
    pub duration_seconds: u64,
    pub bpm: u32,
    #[serde(default, alias = "beforeText")]
    pub before_text: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub date: DateTime<Local>,
    #[serde(alias = "beforeSession")]
    pub before_session: String,
    #[serde(alias = "sessionDuration")]
    pub session_duration: u64,
    #[serde(alias = "afterSession")]
    pub after_session: String,
}

/// Check a caller-supplied rate against the slider domain (60..=200, step 5).
///
/// The scheduler itself never clamps, so every entry point that accepts a bpm
/// from outside the crate runs it through here first.
pub fn validate_bpm(bpm: u32) -> Result<u32> {
    if (MIN_BPM..=MAX_BPM).contains(&bpm) && (bpm - MIN_BPM) % BPM_STEP == 0 {
        Ok(bpm)
    } else {
        Err(SessionError::InvalidBpm(bpm))
    }
}

/// `m:ss` rendering of an elapsed counter.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_domain_is_sixty_to_two_hundred_in_fives() {
        assert_eq!(validate_bpm(60).unwrap(), 60);
        assert_eq!(validate_bpm(125).unwrap(), 125);
        assert_eq!(validate_bpm(200).unwrap(), 200);
        assert!(matches!(validate_bpm(55), Err(SessionError::InvalidBpm(55))));
        assert!(matches!(validate_bpm(205), Err(SessionError::InvalidBpm(205))));
        assert!(matches!(validate_bpm(121), Err(SessionError::InvalidBpm(121))));
    }

    #[test]
    fn elapsed_formats_as_minutes_and_padded_seconds() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(9), "0:09");
        assert_eq!(format_elapsed(125), "2:05");
        assert_eq!(format_elapsed(3600), "60:00");
    }

    #[test]
    fn channel_flip_and_pan() {
        assert_eq!(Channel::Left.flip(), Channel::Right);
        assert_eq!(Channel::Right.flip(), Channel::Left);
        assert_eq!(Channel::Left.pan(), -1.0);
        assert_eq!(Channel::Right.pan(), 1.0);
    }
}
