use std::f32::consts::{FRAC_PI_4, PI, TAU};

pub fn sine_wave(phase: f32) -> f32 {
    phase.sin()
}

pub fn square_wave(phase: f32) -> f32 {
    if phase.rem_euclid(TAU) < PI {
        1.0
    } else {
        -1.0
    }
}

pub fn triangle_wave(phase: f32) -> f32 {
    let t = (phase / TAU).rem_euclid(1.0);
    2.0 * (2.0 * (t - (t + 0.5).floor())).abs() - 1.0
}

/// Per-sample multiplier that takes a gain from `peak` to `floor` in `samples` steps.
pub fn decay_coefficient(peak: f32, floor: f32, samples: usize) -> f32 {
    if samples == 0 || peak <= 0.0 || floor <= 0.0 {
        return 0.0;
    }
    (floor / peak).powf(1.0 / samples as f32)
}

/// Equal-power pan. `pan = -1.0` puts everything in the left channel.
pub fn pan2(signal: f32, pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    let angle = (pan + 1.0) * FRAC_PI_4;
    let left = angle.cos() * signal;
    let right = angle.sin() * signal;
    (left, right)
}

/// Scale the block down if any sample exceeds `thresh`.
pub fn normalize_block(buffer: &mut [f32], thresh: f32) {
    let max_val = buffer.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if max_val > thresh {
        let norm = thresh / max_val;
        for v in buffer.iter_mut() {
            *v *= norm;
        }
    }
}
