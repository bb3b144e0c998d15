//! Offline rendering of a session's cue track.
//!
//! Steps the same pure tick the live scheduler uses, at its exact nominal
//! cadence, and drops each cue into the mixer at the sample where the
//! reversal lands.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::Result;
use crate::mixer::CueMixer;
use crate::profiles::{profile, CueId};
use crate::scheduler::{tick_interval_ms, StimulationEffect, StimulationState};
use crate::voices::CueVoice;

/// Interleaved stereo samples for `seconds` of a session. `bpm` must already
/// be validated.
pub fn render_session(bpm: u32, cue: CueId, seconds: f64, sample_rate: u32, master_gain: f32) -> Vec<f32> {
    let sr = sample_rate as f64;
    let total_frames = (seconds * sr).round() as usize;
    let interval_secs = tick_interval_ms(bpm) / 1000.0;
    let sound = profile(cue);

    let mut out = vec![0.0f32; total_frames * 2];
    let mut mixer = CueMixer::new(master_gain);
    let mut state = StimulationState::default();
    let mut cursor = 0usize;
    let mut tick_index = 1u64;

    loop {
        let tick_frame = ((tick_index as f64 * interval_secs) * sr).round() as usize;
        let upto = tick_frame.min(total_frames);
        if upto > cursor {
            mixer.process_block(&mut out[cursor * 2..upto * 2]);
            cursor = upto;
        }
        if tick_frame >= total_frames {
            break;
        }

        let (next, effects) = state.advance();
        state = next;
        for effect in effects {
            if let StimulationEffect::Cue(side) = effect {
                mixer.trigger(CueVoice::new(sound, side, sample_rate as f32));
            }
        }
        tick_index += 1;
    }
    out
}

pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for sample in samples {
        let s = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

pub fn render_to_wav<P: AsRef<Path>>(
    path: P,
    bpm: u32,
    cue: CueId,
    seconds: f64,
    sample_rate: u32,
    master_gain: f32,
) -> Result<()> {
    let start_time = Instant::now();
    let samples = render_session(bpm, cue, seconds, sample_rate, master_gain);
    write_wav(&path, &samples, sample_rate)?;
    info!(
        path = %path.as_ref().display(),
        elapsed_secs = start_time.elapsed().as_secs_f32(),
        "rendered session"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 8_000;

    fn onsets(samples: &[f32], channel: usize) -> Vec<usize> {
        let mut found = Vec::new();
        let mut silent_run = usize::MAX;
        for (frame, chunk) in samples.chunks_exact(2).enumerate() {
            if chunk[channel].abs() > 1e-4 {
                if silent_run > 100 {
                    found.push(frame);
                }
                silent_run = 0;
            } else {
                silent_run = silent_run.saturating_add(1);
            }
        }
        found
    }

    #[test]
    fn first_cue_lands_half_a_beat_in_on_the_right() {
        // 120 bpm: 25 ticks of 10 ms from centre to the right edge
        let samples = render_session(120, CueId::Clap, 1.0, SR, 1.0);
        assert_eq!(samples.len(), SR as usize * 2);
        let right = onsets(&samples, 1);
        assert_eq!(right.first().copied(), Some(2_000));
        let left = onsets(&samples, 0);
        // then the left edge one full beat later
        assert_eq!(left.first().copied(), Some(6_000));
    }

    #[test]
    fn cues_alternate_once_per_beat() {
        let samples = render_session(60, CueId::Clap, 5.0, SR, 1.0);
        let right = onsets(&samples, 1);
        let left = onsets(&samples, 0);
        // beats at 0.5s (R), 1.5s (L), 2.5s (R), 3.5s (L), 4.5s (R)
        assert_eq!(right, vec![4_000, 20_000, 36_000]);
        assert_eq!(left, vec![12_000, 28_000]);
    }

    #[test]
    fn wav_has_the_rendered_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.wav");
        render_to_wav(&path, 120, CueId::Click, 0.5, SR, 1.0).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, SR);
        assert_eq!(reader.duration(), SR / 2);
    }
}
