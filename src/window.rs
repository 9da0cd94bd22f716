//! Window functions used by the STFT and by feature smoothing.

/// Compute a Hann window.
pub fn hann(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }
    let m = n as f32;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / m).cos())
        .collect()
}

/// Hann window scaled to unit sum, for use as a smoothing kernel.
pub fn hann_normalized(n: usize) -> Vec<f32> {
    let mut w = hann(n);
    let sum: f32 = w.iter().sum();
    if sum > 0.0 {
        for v in &mut w {
            *v /= sum;
        }
    }
    w
}
