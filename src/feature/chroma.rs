//! Chroma folding, quantization, and smoothing.

use crate::feature::{N_CHROMA, N_PITCHES};
use crate::window;
use ndarray::Array2;

/// Quantization level thresholds applied to L2-normalized chroma values.
/// Each threshold crossed adds 0.25 to the quantized level.
const QUANT_THRESHOLDS: [f32; 4] = [0.05, 0.1, 0.2, 0.4];

const NORM_EPSILON: f32 = 1e-6;

/// Fold a per-MIDI-pitch matrix (128 × frames) into chroma (12 × frames).
pub fn pitch_to_chroma(pitch: &Array2<f32>) -> Array2<f32> {
    let n_frames = pitch.shape()[1];
    let n_rows = pitch.shape()[0].min(N_PITCHES);
    let mut chroma = Array2::<f32>::zeros((N_CHROMA, n_frames));
    for p in 0..n_rows {
        let c = p % N_CHROMA;
        for frame in 0..n_frames {
            chroma[(c, frame)] += pitch[(p, frame)];
        }
    }
    chroma
}

/// L2-normalize each column in place. Columns with negligible energy are
/// replaced by the uniform unit vector so that silence is equidistant from
/// every pitch class.
pub fn normalize_columns(mat: &mut Array2<f32>) {
    let n_rows = mat.shape()[0];
    let uniform = 1.0 / (n_rows as f32).sqrt();
    for mut col in mat.columns_mut() {
        let norm = col.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > NORM_EPSILON {
            col.mapv_inplace(|v| v / norm);
        } else {
            col.fill(uniform);
        }
    }
}

/// Quantize normalized chroma values onto the five levels
/// {0, 0.25, 0.5, 0.75, 1.0}.
///
/// Quantization discards loudness detail that differs between a synthetic
/// score rendition and a real performance while keeping the pitch-class
/// pattern the DTW cost cares about.
pub fn quantize_chroma(chroma: &Array2<f32>) -> Array2<f32> {
    chroma.mapv(|v| {
        let mut level = 0.0f32;
        for &threshold in &QUANT_THRESHOLDS {
            if v > threshold {
                level += 0.25;
            }
        }
        level
    })
}

/// Hann-smooth each chroma row and decimate, then re-normalize columns.
///
/// With the default window (201 frames) and factor (50) this turns the
/// 50 Hz quantized chroma into a ~1 Hz summary, used by the chroma-shift
/// search and by coarse multiscale DTW levels.
pub fn smooth_downsample_chroma(
    chroma: &Array2<f32>,
    window_len: usize,
    downsample: usize,
) -> Array2<f32> {
    let n_rows = chroma.shape()[0];
    let n_frames = chroma.shape()[1];
    if n_frames == 0 || downsample == 0 {
        return chroma.clone();
    }

    let kernel = window::hann_normalized(window_len.max(1));
    let half = kernel.len() / 2;
    let n_out = n_frames.div_ceil(downsample);

    let mut out = Array2::<f32>::zeros((n_rows, n_out));
    for row in 0..n_rows {
        for j in 0..n_out {
            let center = j * downsample;
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let idx = center as isize + k as isize - half as isize;
                if idx >= 0 && (idx as usize) < n_frames {
                    acc += w * chroma[(row, idx as usize)];
                }
            }
            out[(row, j)] = acc;
        }
    }
    normalize_columns(&mut out);
    out
}

/// Circularly roll the rows of a 12-bin matrix by `shift` bins: row `c`
/// of the input lands in row `(c + shift) % 12` of the output.
pub fn shift_chroma(mat: &Array2<f32>, shift: usize) -> Array2<f32> {
    let n_rows = mat.shape()[0];
    let n_frames = mat.shape()[1];
    let mut out = Array2::<f32>::zeros((n_rows, n_frames));
    for row in 0..n_rows {
        let dst = (row + shift) % n_rows;
        for frame in 0..n_frames {
            out[(dst, frame)] = mat[(row, frame)];
        }
    }
    out
}
