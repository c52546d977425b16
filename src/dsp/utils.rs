/// Frames quieter than this are treated as silence.
pub const SILENCE_POWER: f32 = 1e-12;

pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-12).log10()
}

/// Periodic sqrt-Hann window; squared copies overlap-add to one at 50% hop.
pub fn make_sqrt_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            (0.5 - 0.5 * phase.cos()).sqrt()
        })
        .collect()
}

/// Mean power of the two channels' average, `mean(((l + r) / 2)^2)`.
pub fn frame_power(left: &[f32], right: &[f32]) -> f32 {
    let n = left.len().min(right.len());
    if n == 0 {
        return 0.0;
    }
    let mut s = 0.0f64;
    for i in 0..n {
        let m = 0.5 * (left[i] as f64 + right[i] as f64);
        s += m * m;
    }
    (s / n as f64) as f32
}

/// Pearson correlation of two equally long buffers, in `[-1, 1]`.
/// A channel with no variance correlates with nothing (returns 0).
pub fn normalised_correlation(left: &[f32], right: &[f32]) -> f32 {
    let n = left.len().min(right.len());
    if n == 0 {
        return 0.0;
    }

    // f64 accumulation: narrow bands over long frames lose precision in f32
    let mut mean_l = 0.0f64;
    let mut mean_r = 0.0f64;
    for i in 0..n {
        mean_l += left[i] as f64;
        mean_r += right[i] as f64;
    }
    mean_l /= n as f64;
    mean_r /= n as f64;

    let mut sxy = 0.0f64;
    let mut sxx = 0.0f64;
    let mut syy = 0.0f64;
    for i in 0..n {
        let a = left[i] as f64 - mean_l;
        let b = right[i] as f64 - mean_r;
        sxy += a * b;
        sxx += a * a;
        syy += b * b;
    }

    let denom = (sxx * syy).sqrt();
    if denom <= f64::MIN_POSITIVE {
        return 0.0;
    }
    (sxy / denom).clamp(-1.0, 1.0) as f32
}

pub fn frame_rms(x: &[f32]) -> f32 {
    let mut s = 0.0f32;
    for &v in x {
        s += v * v;
    }
    (s / (x.len().max(1) as f32)).sqrt()
}
