//! Pitch-class onset salience.
//!
//! Onset peaks alone make a poor DTW feature: a peak one frame off costs
//! as much as a peak a second off. Locally normalising the peaks and
//! appending a short decaying tail turns each onset into a gradient the
//! warping path can slide down, which sharpens alignment near note starts
//! without dominating the sustained chroma cost.

use crate::config::AlignConfig;
use crate::feature::pitch_to_chroma;
use ndarray::Array2;

const NORM_EPSILON: f32 = 1e-6;

/// Build the 12-bin onset-salience matrix from per-pitch onset peaks.
///
/// Peaks are folded to pitch classes, divided by a sliding-window local
/// maximum (window length `smoothing_secs`), and each peak is extended by
/// a tail that halves over `onset_decay` frames.
pub fn onset_salience(pitch_onsets: &Array2<f32>, cfg: &AlignConfig) -> Array2<f32> {
    let folded = pitch_to_chroma(pitch_onsets);
    let normalized = local_max_normalize(
        &folded,
        (cfg.smoothing_secs * cfg.feature_rate as f32) as usize,
    );
    apply_decay(&normalized, cfg.onset_decay)
}

/// Divide each value by the maximum over a centered sliding window of its
/// row, so loud and quiet passages contribute onsets of comparable weight.
fn local_max_normalize(mat: &Array2<f32>, window_len: usize) -> Array2<f32> {
    let n_rows = mat.shape()[0];
    let n_frames = mat.shape()[1];
    let half = (window_len / 2).max(1);

    let mut out = Array2::<f32>::zeros((n_rows, n_frames));
    for row in 0..n_rows {
        for frame in 0..n_frames {
            let lo = frame.saturating_sub(half);
            let hi = (frame + half + 1).min(n_frames);
            let mut local_max = 0.0f32;
            for t in lo..hi {
                local_max = local_max.max(mat[(row, t)]);
            }
            if local_max > NORM_EPSILON {
                out[(row, frame)] = mat[(row, frame)] / local_max;
            }
        }
    }
    out
}

/// Extend each peak with a geometric tail that halves over `decay_frames`.
fn apply_decay(mat: &Array2<f32>, decay_frames: usize) -> Array2<f32> {
    let n_rows = mat.shape()[0];
    let n_frames = mat.shape()[1];
    let decay = 0.5f32.powf(1.0 / decay_frames.max(1) as f32);

    let mut out = mat.clone();
    for row in 0..n_rows {
        for frame in 1..n_frames {
            let tail = out[(row, frame - 1)] * decay;
            if tail > out[(row, frame)] {
                out[(row, frame)] = tail;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{N_CHROMA, N_PITCHES};
    use approx::assert_relative_eq;

    fn impulse_at(pitch: usize, frame: usize, n_frames: usize) -> Array2<f32> {
        let mut mat = Array2::<f32>::zeros((N_PITCHES, n_frames));
        mat[(pitch, frame)] = 2.0;
        mat
    }

    #[test]
    fn test_peak_is_normalized_to_one() {
        let cfg = AlignConfig::default();
        let onsets = impulse_at(60, 50, 200);
        let salience = onset_salience(&onsets, &cfg);
        assert_eq!(salience.shape(), &[N_CHROMA, 200]);
        assert_relative_eq!(salience[(0, 50)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_decaying_tail_halves_over_decay_window() {
        let cfg = AlignConfig::default();
        let onsets = impulse_at(60, 10, 100);
        let salience = onset_salience(&onsets, &cfg);
        let at_peak = salience[(0, 10)];
        let after_decay = salience[(0, 10 + cfg.onset_decay)];
        assert_relative_eq!(after_decay, at_peak * 0.5, epsilon = 1e-4);
        // Monotone decrease after the peak.
        for frame in 11..40 {
            assert!(salience[(0, frame)] <= salience[(0, frame - 1)] + 1e-6);
        }
    }

    #[test]
    fn test_local_normalization_equalizes_dynamics() {
        let cfg = AlignConfig::default();
        // A quiet onset far from a loud one still normalises to 1.
        let mut onsets = Array2::<f32>::zeros((N_PITCHES, 1000));
        onsets[(60, 100)] = 10.0;
        onsets[(60, 900)] = 0.1;
        let salience = onset_salience(&onsets, &cfg);
        assert_relative_eq!(salience[(0, 100)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(salience[(0, 900)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_silence_stays_zero() {
        let cfg = AlignConfig::default();
        let onsets = Array2::<f32>::zeros((N_PITCHES, 50));
        let salience = onset_salience(&onsets, &cfg);
        assert!(salience.iter().all(|&v| v == 0.0));
    }
}
