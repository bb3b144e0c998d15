use crate::command::Command;
use crate::dsp::normalize_block;
use crate::voices::{CueVoice, Voice};

const NORMALIZE_THRESH: f32 = 0.95;
const VOICE_CAPACITY: usize = 32;

/// Sums every cue that is still ringing into an interleaved stereo block.
pub struct CueMixer {
    voices: Vec<CueVoice>,
    master_gain: f32,
}

impl CueMixer {
    pub fn new(master_gain: f32) -> Self {
        Self {
            voices: Vec::with_capacity(VOICE_CAPACITY),
            master_gain,
        }
    }

    pub fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Trigger(voice) => self.trigger(voice),
            Command::SetMasterGain(gain) => self.master_gain = gain.max(0.0),
        }
    }

    /// At capacity the oldest voice, the one furthest into its decay, makes
    /// room so the audio thread never reallocates.
    pub fn trigger(&mut self, voice: CueVoice) {
        if self.voices.len() >= VOICE_CAPACITY {
            self.voices.remove(0);
        }
        self.voices.push(voice);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn process_block(&mut self, buffer: &mut [f32]) {
        buffer.fill(0.0);
        if self.voices.is_empty() {
            return;
        }
        for voice in &mut self.voices {
            voice.process(buffer);
        }
        self.voices.retain(|v| !v.is_finished());

        for v in buffer.iter_mut() {
            *v *= self.master_gain;
        }
        normalize_block(buffer, NORMALIZE_THRESH);
    }
}
