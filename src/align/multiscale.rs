//! Coarse-to-fine DTW.
//!
//! Full DTW over two hour-long recordings at 50 Hz would need a matrix of
//! hundreds of millions of cells. Above the configured cell threshold the
//! aligner decimates both feature pairs, aligns the coarse level
//! recursively, projects the coarse path back up, and refines inside a
//! band around the projection.

use crate::align::dtw::{dtw_banded, dtw_full, CostFn};
use crate::config::AlignConfig;
use crate::feature::FeatureSet;
use crate::window;
use log::debug;
use ndarray::Array2;

/// Align two feature sets, recursing to coarser resolutions while the
/// cost-matrix cell count exceeds `cfg.threshold_rec`.
///
/// # Returns
/// The raw warping path, (audio frame, score frame), before monotonicity
/// repair.
pub fn align_multiscale(
    audio: &FeatureSet,
    score: &FeatureSet,
    cfg: &AlignConfig,
) -> crate::Result<Vec<(u32, u32)>> {
    let n = audio.n_frames();
    let m = score.n_frames();
    if n == 0 || m == 0 {
        return Err(crate::Error::ShapeMismatch {
            expected: "non-empty feature matrices on both sides".into(),
            got: format!("audio {n} frames, score {m} frames"),
        });
    }

    let cells = n.saturating_mul(m);
    if cells <= cfg.threshold_rec {
        debug!("full DTW at {n}x{m} ({cells} cells)");
        let cost_fn = CostFn::with_onsets(
            &audio.chroma,
            &score.chroma,
            &audio.onset,
            &score.onset,
            cfg.onset_weight,
        );
        let (total, path) = dtw_full(&cost_fn, cfg.step_weights);
        debug!("full DTW cost {total:.3}, path length {}", path.len());
        return Ok(path);
    }

    debug!(
        "recursing: {n}x{m} ({cells} cells) exceeds threshold {}",
        cfg.threshold_rec
    );
    let factor = cfg.coarse_factor.max(2);
    let coarse_audio = decimate_set(audio, factor);
    let coarse_score = decimate_set(score, factor);
    let coarse_path = align_multiscale(&coarse_audio, &coarse_score, cfg)?;

    let band = band_from_projection(&coarse_path, factor, n, m, cfg.band_radius);
    let cost_fn = CostFn::with_onsets(
        &audio.chroma,
        &score.chroma,
        &audio.onset,
        &score.onset,
        cfg.onset_weight,
    );
    let (total, path) = dtw_banded(&cost_fn, cfg.step_weights, &band);
    debug!("banded refinement cost {total:.3}, path length {}", path.len());
    Ok(path)
}

/// Smooth each row with a Hann kernel spanning two decimation periods and
/// keep every `factor`-th frame. No per-column renormalization: coarse
/// levels should keep relative energy so the onset distance stays
/// meaningful.
fn smooth_decimate(mat: &Array2<f32>, factor: usize) -> Array2<f32> {
    let n_rows = mat.shape()[0];
    let n_frames = mat.shape()[1];
    let n_out = n_frames.div_ceil(factor).max(1);
    let kernel = window::hann_normalized(2 * factor + 1);
    let half = kernel.len() / 2;

    let mut out = Array2::<f32>::zeros((n_rows, n_out));
    for row in 0..n_rows {
        for j in 0..n_out {
            let center = (j * factor).min(n_frames.saturating_sub(1));
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let idx = center as isize + k as isize - half as isize;
                if idx >= 0 && (idx as usize) < n_frames {
                    acc += w * mat[(row, idx as usize)];
                }
            }
            out[(row, j)] = acc;
        }
    }
    out
}

fn decimate_set(set: &FeatureSet, factor: usize) -> FeatureSet {
    FeatureSet {
        chroma: smooth_decimate(&set.chroma, factor),
        onset: smooth_decimate(&set.onset, factor),
    }
}

/// Project a coarse path up by `factor` and build a per-audio-frame band
/// of score frames around its piecewise-linear interpolation.
fn band_from_projection(
    coarse_path: &[(u32, u32)],
    factor: usize,
    n: usize,
    m: usize,
    radius: usize,
) -> Vec<(usize, usize)> {
    let anchors: Vec<(f64, f64)> = coarse_path
        .iter()
        .map(|&(i, j)| ((i as usize * factor) as f64, (j as usize * factor) as f64))
        .collect();

    let estimate = |i: usize| -> f64 {
        let x = i as f64;
        if anchors.len() < 2 {
            return anchors.first().map(|a| a.1).unwrap_or(0.0);
        }
        if x <= anchors[0].0 {
            return anchors[0].1;
        }
        if x >= anchors[anchors.len() - 1].0 {
            return anchors[anchors.len() - 1].1;
        }
        let seg = anchors.partition_point(|a| a.0 <= x) - 1;
        let (x0, y0) = anchors[seg];
        let (x1, y1) = anchors[seg + 1];
        if x1 > x0 {
            y0 + (y1 - y0) * (x - x0) / (x1 - x0)
        } else {
            y0
        }
    };

    let mut band = Vec::with_capacity(n);
    for i in 0..n {
        let est = estimate(i);
        let lo = ((est as isize) - radius as isize).max(0) as usize;
        let hi = ((est as usize) + radius + 1).min(m);
        band.push((lo.min(m - 1), hi.max(lo + 1)));
    }

    // The corners must be reachable.
    band[0].0 = 0;
    band[n - 1].1 = m;
    // Consecutive rows must overlap so backtracking never strands.
    for i in 1..n {
        if band[i].0 > band[i - 1].1 - 1 {
            band[i].0 = band[i - 1].1 - 1;
        }
    }
    for i in (0..n - 1).rev() {
        if band[i].1 < band[i + 1].0 + 1 {
            band[i].1 = band[i + 1].0 + 1;
        }
    }
    band
}
