//! Per-recording alignment orchestration.

use crate::align::dtw::{dtw_full, CostFn};
use crate::align::multiscale::align_multiscale;
use crate::align::path::make_strictly_monotonic;
use crate::config::AlignConfig;
use crate::feature::{self, smooth_downsample_chroma, FeatureSet};
use crate::tuning;
use log::{debug, info};
use ndarray::Array2;

/// Result of aligning one recording against a score.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Strictly monotonic warping path, (audio frame, score frame), at the
    /// configured feature rate.
    pub path: Vec<(u32, u32)>,
    /// Estimated deviation of the recording from A440, in cents.
    pub tuning_cents: f32,
    /// Chroma-bin transposition applied to the score side (0..12).
    pub chroma_shift: usize,
}

/// Search the 12 circular transpositions for the one minimising the DTW
/// cost between ~1 Hz chroma summaries of both sides.
///
/// Recordings of historically tuned or transposing performances can be a
/// semitone or more away from the written key; a full-rate search would be
/// 12 alignments, the 1 Hz summary makes it cheap.
pub(crate) fn best_chroma_shift(
    audio_chroma: &Array2<f32>,
    score_chroma: &Array2<f32>,
    cfg: &AlignConfig,
) -> usize {
    let audio_summary = smooth_downsample_chroma(audio_chroma, cfg.cens_window, cfg.cens_downsample);
    let score_summary = smooth_downsample_chroma(score_chroma, cfg.cens_window, cfg.cens_downsample);

    let mut best_shift = 0usize;
    let mut best_cost = f64::INFINITY;
    for shift in 0..feature::N_CHROMA {
        let shifted = feature::shift_chroma(&score_summary, shift);
        let cost_fn = CostFn::chroma_only(&audio_summary, &shifted);
        let (cost, _) = dtw_full(&cost_fn, cfg.step_weights);
        debug!("shift {shift}: coarse DTW cost {cost:.4}");
        if cost < best_cost {
            best_cost = cost;
            best_shift = shift;
        }
    }
    best_shift
}

/// Align a mono waveform against precomputed score features.
///
/// Runs the full per-recording pipeline: tuning estimation, audio feature
/// extraction with the tuning folded in, chroma-shift search, multiscale
/// DTW, and monotonicity repair.
///
/// # Errors
/// Feature-extraction errors (empty/non-finite/silent audio, degenerate
/// score features) and alignment shape errors.
pub fn align_to_score(
    audio: &[f32],
    score: &FeatureSet,
    cfg: &AlignConfig,
) -> crate::Result<Alignment> {
    let tuning_cents = tuning::estimate_tuning_cents(audio, cfg.sample_rate, 2048)?;
    info!("estimated tuning: {tuning_cents:+.1} cents");

    let audio_features = feature::audio_features(audio, tuning_cents, cfg)?;
    debug!(
        "features: audio {} frames, score {} frames",
        audio_features.n_frames(),
        score.n_frames()
    );

    let chroma_shift = best_chroma_shift(&audio_features.chroma, &score.chroma, cfg);
    if chroma_shift != 0 {
        info!("applying chroma shift of {chroma_shift} bins to the score side");
    }
    let shifted_score = score.shifted(chroma_shift);

    let raw_path = align_multiscale(&audio_features, &shifted_score, cfg)?;
    let path = make_strictly_monotonic(&raw_path);
    info!(
        "alignment done: {} raw pairs, {} after monotonicity repair",
        raw_path.len(),
        path.len()
    );

    Ok(Alignment {
        path,
        tuning_cents,
        chroma_shift,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::N_CHROMA;

    fn melody_chroma(bins: &[usize], hold: usize) -> Array2<f32> {
        let mut mat = Array2::<f32>::zeros((N_CHROMA, bins.len() * hold));
        for (idx, &bin) in bins.iter().enumerate() {
            for frame in idx * hold..(idx + 1) * hold {
                mat[(bin, frame)] = 1.0;
            }
        }
        mat
    }

    #[test]
    fn test_shift_search_recovers_transposition() {
        let cfg = AlignConfig {
            cens_window: 11,
            cens_downsample: 4,
            ..AlignConfig::default()
        };
        let melody = [0usize, 4, 7, 0, 2, 4, 5, 7, 9, 11];
        let audio = melody_chroma(
            &melody.iter().map(|&b| (b + 3) % 12).collect::<Vec<_>>(),
            20,
        );
        let score = melody_chroma(&melody, 20);
        assert_eq!(best_chroma_shift(&audio, &score, &cfg), 3);
    }

    #[test]
    fn test_shift_search_zero_for_same_key() {
        let cfg = AlignConfig {
            cens_window: 11,
            cens_downsample: 4,
            ..AlignConfig::default()
        };
        let melody = [0usize, 4, 7, 11, 2, 5];
        let mat = melody_chroma(&melody, 25);
        assert_eq!(best_chroma_shift(&mat, &mat, &cfg), 0);
    }
}
