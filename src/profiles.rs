//! Built-in cue sounds.
//!
//! Every cue the session can play is a row in [`PROFILES`]; the synthesizer in
//! `voices` only ever reads these parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CueId {
    #[default]
    Click,
    Pulse,
    Clap,
    Bell,
    Chime,
    Drum,
    Marimba,
    Wave,
    Beep,
    Tick,
}

impl CueId {
    pub const ALL: [CueId; 10] = [
        CueId::Click,
        CueId::Pulse,
        CueId::Clap,
        CueId::Bell,
        CueId::Chime,
        CueId::Drum,
        CueId::Marimba,
        CueId::Wave,
        CueId::Beep,
        CueId::Tick,
    ];

    pub fn as_str(self) -> &'static str {
        profile(self).name
    }
}

impl fmt::Display for CueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CueId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        CueId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| SessionError::UnknownCue(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    /// White noise through a low-pass at the profile frequency.
    Noise,
}

/// Exponential decay from `peak` down to `floor` across the cue duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainEnvelope {
    pub peak: f32,
    pub floor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundProfile {
    pub id: CueId,
    pub name: &'static str,
    pub description: &'static str,
    pub waveform: Waveform,
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub gain_envelope: GainEnvelope,
}

impl SoundProfile {
    pub fn duration_secs(&self) -> f32 {
        self.duration_ms as f32 / 1000.0
    }
}

const FLOOR: f32 = 0.01;

const fn row(
    id: CueId,
    name: &'static str,
    description: &'static str,
    waveform: Waveform,
    frequency_hz: f32,
    duration_ms: u32,
    peak: f32,
) -> SoundProfile {
    SoundProfile {
        id,
        name,
        description,
        waveform,
        frequency_hz,
        duration_ms,
        gain_envelope: GainEnvelope { peak, floor: FLOOR },
    }
}

/// Indexed by `CueId` discriminant.
pub static PROFILES: [SoundProfile; 10] = [
    row(CueId::Click, "click", "short click", Waveform::Sine, 1000.0, 50, 0.3),
    row(CueId::Pulse, "pulse", "soft tone", Waveform::Sine, 440.0, 100, 0.2),
    row(CueId::Clap, "clap", "sharp square burst", Waveform::Square, 200.0, 80, 0.25),
    row(CueId::Bell, "bell", "ringing tone", Waveform::Sine, 880.0, 400, 0.3),
    row(CueId::Chime, "chime", "high shimmer", Waveform::Triangle, 1760.0, 300, 0.2),
    row(CueId::Drum, "drum", "deep hit", Waveform::Sine, 100.0, 150, 0.5),
    row(CueId::Marimba, "marimba", "mellow mallet", Waveform::Triangle, 523.25, 200, 0.3),
    row(CueId::Wave, "wave", "soft filtered wash", Waveform::Noise, 600.0, 500, 0.2),
    row(CueId::Beep, "beep", "electronic beep", Waveform::Square, 1200.0, 120, 0.15),
    row(CueId::Tick, "tick", "short tick", Waveform::Triangle, 3000.0, 20, 0.3),
];

pub fn profile(id: CueId) -> &'static SoundProfile {
    &PROFILES[id as usize]
}
