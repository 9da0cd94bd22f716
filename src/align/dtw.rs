//! Weighted-step dynamic time warping.
//!
//! Steps (1,0), (0,1), (1,1) with configurable weights multiplying the
//! local cost. The local cost between an audio frame and a score frame is
//! the cosine distance of their chroma columns plus a weighted Euclidean
//! distance of their onset columns.

use ndarray::Array2;

const STEP_UP: u8 = 0; // (1, 0): advance audio only
const STEP_LEFT: u8 = 1; // (0, 1): advance score only
const STEP_DIAG: u8 = 2; // (1, 1)

/// Local-cost function over a pair of feature matrices.
pub(crate) struct CostFn<'a> {
    chroma_a: &'a Array2<f32>,
    chroma_b: &'a Array2<f32>,
    onsets: Option<(&'a Array2<f32>, &'a Array2<f32>)>,
    onset_weight: f32,
}

impl<'a> CostFn<'a> {
    pub(crate) fn chroma_only(chroma_a: &'a Array2<f32>, chroma_b: &'a Array2<f32>) -> Self {
        Self {
            chroma_a,
            chroma_b,
            onsets: None,
            onset_weight: 0.0,
        }
    }

    pub(crate) fn with_onsets(
        chroma_a: &'a Array2<f32>,
        chroma_b: &'a Array2<f32>,
        onset_a: &'a Array2<f32>,
        onset_b: &'a Array2<f32>,
        onset_weight: f32,
    ) -> Self {
        Self {
            chroma_a,
            chroma_b,
            onsets: Some((onset_a, onset_b)),
            onset_weight,
        }
    }

    pub(crate) fn n_audio(&self) -> usize {
        self.chroma_a.shape()[1]
    }

    pub(crate) fn n_score(&self) -> usize {
        self.chroma_b.shape()[1]
    }

    /// Cost of matching audio frame `i` to score frame `j`.
    pub(crate) fn cost(&self, i: usize, j: usize) -> f32 {
        let n_bins = self.chroma_a.shape()[0];
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for bin in 0..n_bins {
            let a = self.chroma_a[(bin, i)];
            let b = self.chroma_b[(bin, j)];
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        let denom = (norm_a * norm_b).sqrt();
        let mut cost = if denom > 1e-9 { 1.0 - dot / denom } else { 1.0 };

        if let Some((onset_a, onset_b)) = self.onsets {
            let mut sq = 0.0f32;
            for bin in 0..onset_a.shape()[0] {
                let d = onset_a[(bin, i)] - onset_b[(bin, j)];
                sq += d * d;
            }
            cost += self.onset_weight * sq.sqrt();
        }
        cost
    }
}

fn backtrack(steps: impl Fn(usize, usize) -> u8, mut i: usize, mut j: usize) -> Vec<(u32, u32)> {
    let mut path = vec![(i as u32, j as u32)];
    while i > 0 || j > 0 {
        match steps(i, j) {
            STEP_UP => i -= 1,
            STEP_LEFT => j -= 1,
            _ => {
                i -= 1;
                j -= 1;
            }
        }
        path.push((i as u32, j as u32));
    }
    path.reverse();
    path
}

/// Full-matrix weighted DTW.
///
/// # Returns
/// The accumulated cost of the optimal path and the path itself as
/// (audio frame, score frame) pairs from (0, 0) to (n-1, m-1).
pub(crate) fn dtw_full(cost_fn: &CostFn, weights: [f32; 3]) -> (f64, Vec<(u32, u32)>) {
    let n = cost_fn.n_audio();
    let m = cost_fn.n_score();
    if n == 0 || m == 0 {
        return (0.0, Vec::new());
    }

    let [w_up, w_left, w_diag] = weights;
    let mut acc = Array2::<f64>::from_elem((n, m), f64::INFINITY);
    let mut steps = Array2::<u8>::zeros((n, m));

    acc[(0, 0)] = cost_fn.cost(0, 0) as f64;
    for j in 1..m {
        acc[(0, j)] = acc[(0, j - 1)] + (w_left * cost_fn.cost(0, j)) as f64;
        steps[(0, j)] = STEP_LEFT;
    }
    for i in 1..n {
        acc[(i, 0)] = acc[(i - 1, 0)] + (w_up * cost_fn.cost(i, 0)) as f64;
        steps[(i, 0)] = STEP_UP;
        for j in 1..m {
            let c = cost_fn.cost(i, j);
            let up = acc[(i - 1, j)] + (w_up * c) as f64;
            let left = acc[(i, j - 1)] + (w_left * c) as f64;
            let diag = acc[(i - 1, j - 1)] + (w_diag * c) as f64;

            // Prefer the diagonal on ties.
            let (best, step) = if diag <= up && diag <= left {
                (diag, STEP_DIAG)
            } else if up <= left {
                (up, STEP_UP)
            } else {
                (left, STEP_LEFT)
            };
            acc[(i, j)] = best;
            steps[(i, j)] = step;
        }
    }

    let total = acc[(n - 1, m - 1)];
    let path = backtrack(|i, j| steps[(i, j)], n - 1, m - 1);
    (total, path)
}

/// Band-constrained weighted DTW.
///
/// `band[i] = (lo, hi)` gives the half-open score-frame range reachable
/// from audio frame `i`; cells outside the band are treated as infinite.
/// The band must contain (0, 0) and (n-1, m-1) and overlap between
/// consecutive rows.
pub(crate) fn dtw_banded(
    cost_fn: &CostFn,
    weights: [f32; 3],
    band: &[(usize, usize)],
) -> (f64, Vec<(u32, u32)>) {
    let n = cost_fn.n_audio();
    let m = cost_fn.n_score();
    if n == 0 || m == 0 {
        return (0.0, Vec::new());
    }
    debug_assert_eq!(band.len(), n);

    let [w_up, w_left, w_diag] = weights;

    // Row-major storage with per-row offsets.
    let mut acc: Vec<Vec<f64>> = Vec::with_capacity(n);
    let mut steps: Vec<Vec<u8>> = Vec::with_capacity(n);
    for &(lo, hi) in band {
        acc.push(vec![f64::INFINITY; hi - lo]);
        steps.push(vec![STEP_DIAG; hi - lo]);
    }

    let get = |acc: &Vec<Vec<f64>>, i: usize, j: usize| -> f64 {
        let (lo, hi) = band[i];
        if j >= lo && j < hi {
            acc[i][j - lo]
        } else {
            f64::INFINITY
        }
    };

    for i in 0..n {
        let (lo, hi) = band[i];
        for j in lo..hi {
            let c = cost_fn.cost(i, j);
            let (best, step) = if i == 0 && j == 0 {
                (c as f64, STEP_DIAG)
            } else {
                let up = if i > 0 {
                    get(&acc, i - 1, j) + (w_up * c) as f64
                } else {
                    f64::INFINITY
                };
                let left = if j > 0 {
                    get(&acc, i, j - 1) + (w_left * c) as f64
                } else {
                    f64::INFINITY
                };
                let diag = if i > 0 && j > 0 {
                    get(&acc, i - 1, j - 1) + (w_diag * c) as f64
                } else {
                    f64::INFINITY
                };
                if diag <= up && diag <= left {
                    (diag, STEP_DIAG)
                } else if up <= left {
                    (up, STEP_UP)
                } else {
                    (left, STEP_LEFT)
                }
            };
            acc[i][j - lo] = best;
            steps[i][j - lo] = step;
        }
    }

    let total = get(&acc, n - 1, m - 1);
    let path = backtrack(
        |i, j| {
            let (lo, _) = band[i];
            steps[i][j - lo]
        },
        n - 1,
        m - 1,
    );
    (total, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(bins: &[usize]) -> Array2<f32> {
        let mut mat = Array2::<f32>::zeros((12, bins.len()));
        for (frame, &bin) in bins.iter().enumerate() {
            mat[(bin, frame)] = 1.0;
        }
        mat
    }

    #[test]
    fn test_identical_sequences_align_diagonally() {
        let a = one_hot(&[0, 2, 4, 5, 7]);
        let cost_fn = CostFn::chroma_only(&a, &a);
        let (total, path) = dtw_full(&cost_fn, [1.5, 1.5, 2.0]);
        assert!(total < 1e-6);
        let expected: Vec<(u32, u32)> = (0..5).map(|i| (i, i)).collect();
        assert_eq!(path, expected);
    }

    #[test]
    fn test_stretched_sequence() {
        // Score plays each frame once, audio holds each twice.
        let score = one_hot(&[0, 4, 7]);
        let audio = one_hot(&[0, 0, 4, 4, 7, 7]);
        let cost_fn = CostFn::chroma_only(&audio, &score);
        let (total, path) = dtw_full(&cost_fn, [1.5, 1.5, 2.0]);
        assert!(total < 3.0);
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(5, 2)));
        // Every audio frame maps to the score frame with matching chroma.
        for &(i, j) in &path {
            assert_eq!(
                (0..12).find(|&b| audio[(b, i as usize)] > 0.0),
                (0..12).find(|&b| score[(b, j as usize)] > 0.0)
            );
        }
    }

    #[test]
    fn test_path_endpoints_and_steps() {
        let a = one_hot(&[0, 1, 2, 3]);
        let b = one_hot(&[0, 2, 3]);
        let cost_fn = CostFn::chroma_only(&a, &b);
        let (_, path) = dtw_full(&cost_fn, [1.5, 1.5, 2.0]);
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(3, 2)));
        for pair in path.windows(2) {
            let di = pair[1].0 - pair[0].0;
            let dj = pair[1].1 - pair[0].1;
            assert!(di <= 1 && dj <= 1 && di + dj >= 1);
        }
    }

    #[test]
    fn test_banded_matches_full_when_band_covers_matrix() {
        let a = one_hot(&[0, 0, 4, 7, 7, 9]);
        let b = one_hot(&[0, 4, 7, 9]);
        let cost_fn = CostFn::chroma_only(&a, &b);
        let (full_cost, full_path) = dtw_full(&cost_fn, [1.5, 1.5, 2.0]);
        let band = vec![(0usize, 4usize); 6];
        let (banded_cost, banded_path) = dtw_banded(&cost_fn, [1.5, 1.5, 2.0], &band);
        assert!((full_cost - banded_cost).abs() < 1e-9);
        assert_eq!(full_path, banded_path);
    }

    #[test]
    fn test_onset_cost_breaks_chroma_ties() {
        // Two score frames with identical chroma; onsets disambiguate.
        let chroma_a = one_hot(&[0]);
        let chroma_b = one_hot(&[0, 0]);
        let mut onset_a = Array2::<f32>::zeros((12, 1));
        onset_a[(0, 0)] = 1.0;
        let mut onset_b = Array2::<f32>::zeros((12, 2));
        onset_b[(0, 1)] = 1.0;
        let cost_fn = CostFn::with_onsets(&chroma_a, &chroma_b, &onset_a, &onset_b, 0.5);
        // Frame 1 has the matching onset, frame 0 does not.
        assert!(cost_fn.cost(0, 1) < cost_fn.cost(0, 0));
    }

    #[test]
    fn test_empty_inputs() {
        let a = Array2::<f32>::zeros((12, 0));
        let b = one_hot(&[0]);
        let cost_fn = CostFn::chroma_only(&a, &b);
        let (total, path) = dtw_full(&cost_fn, [1.5, 1.5, 2.0]);
        assert_eq!(total, 0.0);
        assert!(path.is_empty());
    }
}
