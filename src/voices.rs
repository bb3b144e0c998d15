use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type, Q_BUTTERWORTH_F32};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::dsp::{decay_coefficient, pan2, sine_wave, square_wave, triangle_wave};
use crate::models::Channel;
use crate::profiles::{SoundProfile, Waveform};

/// Anything the mixer can pull interleaved stereo frames from.
pub trait Voice: Send {
    /// Add this voice's next `output.len() / 2` frames into `output`.
    fn process(&mut self, output: &mut [f32]);
    fn is_finished(&self) -> bool;
}

struct NoiseSource {
    rng: StdRng,
    filter: Option<DirectForm1<f32>>,
}

impl NoiseSource {
    fn new(cutoff: f32, sample_rate: f32) -> Self {
        let filter = Coefficients::<f32>::from_params(
            Type::LowPass,
            sample_rate.hz(),
            cutoff.hz(),
            Q_BUTTERWORTH_F32,
        )
        .ok()
        .map(DirectForm1::<f32>::new);
        Self {
            rng: StdRng::from_entropy(),
            filter,
        }
    }

    fn next(&mut self) -> f32 {
        let white = self.rng.gen::<f32>() * 2.0 - 1.0;
        match &mut self.filter {
            Some(f) => f.run(white),
            None => white,
        }
    }
}

/// One synthesized cue: a single oscillator under an exponential decay,
/// hard-panned to one side. Each cue owns its oscillator, so any number of
/// them can overlap in the mixer.
pub struct CueVoice {
    waveform: Waveform,
    phase: f32,
    phase_inc: f32,
    gain: f32,
    decay: f32,
    pan_l: f32,
    pan_r: f32,
    noise: Option<NoiseSource>,
    remaining_samples: usize,
}

impl CueVoice {
    pub fn new(profile: &SoundProfile, side: Channel, sample_rate: f32) -> Self {
        let total_samples = (profile.duration_secs() * sample_rate).round() as usize;
        let env = profile.gain_envelope;
        let (pan_l, pan_r) = pan2(1.0, side.pan());
        let noise = match profile.waveform {
            Waveform::Noise => Some(NoiseSource::new(profile.frequency_hz, sample_rate)),
            _ => None,
        };
        Self {
            waveform: profile.waveform,
            phase: 0.0,
            phase_inc: TAU * profile.frequency_hz / sample_rate,
            gain: env.peak,
            decay: decay_coefficient(env.peak, env.floor, total_samples),
            pan_l,
            pan_r,
            noise,
            remaining_samples: total_samples,
        }
    }

    fn oscillator(&mut self) -> f32 {
        match self.waveform {
            Waveform::Sine => sine_wave(self.phase),
            Waveform::Square => square_wave(self.phase),
            Waveform::Triangle => triangle_wave(self.phase),
            Waveform::Noise => self.noise.as_mut().map_or(0.0, NoiseSource::next),
        }
    }
}

impl Voice for CueVoice {
    fn process(&mut self, output: &mut [f32]) {
        let frames = output.len() / 2;
        for i in 0..frames {
            if self.remaining_samples == 0 {
                break;
            }
            let sample = self.oscillator() * self.gain;
            output[i * 2] += sample * self.pan_l;
            output[i * 2 + 1] += sample * self.pan_r;

            self.phase = (self.phase + self.phase_inc).rem_euclid(TAU);
            self.gain *= self.decay;
            self.remaining_samples -= 1;
        }
    }

    fn is_finished(&self) -> bool {
        self.remaining_samples == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{profile, CueId};
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    const SR: f32 = 44_100.0;

    fn render(voice: &mut CueVoice, frames: usize) -> Vec<f32> {
        let mut buf = vec![0.0f32; frames * 2];
        voice.process(&mut buf);
        buf
    }

    #[test]
    fn left_cue_stays_out_of_the_right_channel() {
        let mut v = CueVoice::new(profile(CueId::Click), Channel::Left, SR);
        let buf = render(&mut v, 4096);
        let left: f32 = buf.iter().step_by(2).map(|s| s.abs()).sum();
        let right: f32 = buf.iter().skip(1).step_by(2).map(|s| s.abs()).sum();
        assert!(left > 1.0);
        assert!(right < 1e-3);
    }

    #[test]
    fn cue_lasts_its_profile_duration_then_finishes() {
        let p = profile(CueId::Clap);
        let expected = (p.duration_secs() * SR).round() as usize;
        let mut v = CueVoice::new(p, Channel::Right, SR);
        let buf = render(&mut v, expected - 1);
        assert!(!v.is_finished());
        assert!(buf.iter().any(|s| s.abs() > 0.0));

        let tail = render(&mut v, 64);
        assert!(v.is_finished());
        // one frame left, then silence
        assert!(tail[4..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn gain_starts_at_peak_and_decays_to_floor() {
        let p = profile(CueId::Clap);
        let total = (p.duration_secs() * SR).round() as usize;
        let mut v = CueVoice::new(p, Channel::Right, SR);
        let buf = render(&mut v, total);
        let right: Vec<f32> = buf.iter().skip(1).step_by(2).copied().collect();
        assert!((right[0].abs() - p.gain_envelope.peak).abs() < 1e-3);
        let last = right[total - 1].abs();
        assert!(last <= p.gain_envelope.floor * 1.01, "tail gain {last}");
    }

    #[test]
    fn overlapping_cues_do_not_share_oscillator_state() {
        let mut a = CueVoice::new(profile(CueId::Click), Channel::Left, SR);
        let mut b = CueVoice::new(profile(CueId::Pulse), Channel::Right, SR);
        let alone_a = render(&mut a, 2048);
        let alone_b = render(&mut b, 2048);

        let mut a = CueVoice::new(profile(CueId::Click), Channel::Left, SR);
        let mut b = CueVoice::new(profile(CueId::Pulse), Channel::Right, SR);
        let mut mixed = vec![0.0f32; 4096];
        a.process(&mut mixed);
        b.process(&mut mixed);

        for i in 0..mixed.len() {
            assert!((mixed[i] - (alone_a[i] + alone_b[i])).abs() < 1e-6);
        }
    }

    #[test]
    fn pulse_spectrum_peaks_at_its_profile_frequency() {
        let p = profile(CueId::Pulse);
        let n = 4096;
        let mut v = CueVoice::new(p, Channel::Left, SR);
        let buf = render(&mut v, n);
        let mut spectrum: Vec<Complex<f32>> = buf
            .iter()
            .step_by(2)
            .map(|s| Complex { re: *s, im: 0.0 })
            .collect();
        let mut planner = FftPlanner::<f32>::new();
        planner.plan_fft_forward(n).process(&mut spectrum);

        let peak_bin = spectrum[..n / 2]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i)
            .unwrap();
        let peak_hz = peak_bin as f32 * SR / n as f32;
        assert!((peak_hz - p.frequency_hz).abs() < 2.0 * SR / n as f32, "{peak_hz}");
    }

    #[test]
    fn noise_cue_is_audible_and_bounded() {
        let mut v = CueVoice::new(profile(CueId::Wave), Channel::Left, SR);
        let buf = render(&mut v, 8192);
        assert!(buf.iter().step_by(2).any(|s| s.abs() > 1e-4));
        assert!(buf.iter().all(|s| s.abs() <= 1.0));
    }
}
