//! Evaluation of predicted time points against a reference.

/// Precision, recall, and F-score of a point-set comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrfScores {
    pub precision: f64,
    pub recall: f64,
    pub f_score: f64,
    /// Number of estimated points matched to a reference point.
    pub n_matched: usize,
}

/// Score estimated time points (seconds) against reference points with a
/// ±`tolerance` window.
///
/// Matching is greedy in time order and one-to-one: each reference point
/// absorbs at most one estimate, so an estimate cluster around a single
/// reference point does not inflate precision.
pub fn evaluate_points(estimated: &[f64], reference: &[f64], tolerance: f64) -> PrfScores {
    let mut est = estimated.to_vec();
    let mut refs = reference.to_vec();
    est.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    refs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut n_matched = 0usize;
    let mut ref_idx = 0usize;
    for &e in &est {
        while ref_idx < refs.len() && refs[ref_idx] < e - tolerance {
            ref_idx += 1;
        }
        if ref_idx < refs.len() && (refs[ref_idx] - e).abs() <= tolerance {
            n_matched += 1;
            ref_idx += 1;
        }
    }

    let precision = if est.is_empty() {
        0.0
    } else {
        n_matched as f64 / est.len() as f64
    };
    let recall = if refs.is_empty() {
        0.0
    } else {
        n_matched as f64 / refs.len() as f64
    };
    let f_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    PrfScores {
        precision,
        recall,
        f_score,
        n_matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_match() {
        let points = vec![1.0, 2.0, 3.0];
        let scores = evaluate_points(&points, &points, 0.1);
        assert_eq!(scores.n_matched, 3);
        assert_relative_eq!(scores.precision, 1.0);
        assert_relative_eq!(scores.recall, 1.0);
        assert_relative_eq!(scores.f_score, 1.0);
    }

    #[test]
    fn test_tolerance_window() {
        let estimated = vec![1.05, 2.3];
        let reference = vec![1.0, 2.0];
        let scores = evaluate_points(&estimated, &reference, 0.1);
        assert_eq!(scores.n_matched, 1);
        assert_relative_eq!(scores.precision, 0.5);
        assert_relative_eq!(scores.recall, 0.5);
    }

    #[test]
    fn test_one_to_one_matching() {
        // Three estimates around one reference point count once.
        let estimated = vec![0.95, 1.0, 1.05];
        let reference = vec![1.0];
        let scores = evaluate_points(&estimated, &reference, 0.1);
        assert_eq!(scores.n_matched, 1);
        assert_relative_eq!(scores.precision, 1.0 / 3.0);
        assert_relative_eq!(scores.recall, 1.0);
    }

    #[test]
    fn test_empty_inputs() {
        let scores = evaluate_points(&[], &[1.0], 0.1);
        assert_eq!(scores.precision, 0.0);
        assert_eq!(scores.f_score, 0.0);
        let scores = evaluate_points(&[1.0], &[], 0.1);
        assert_eq!(scores.recall, 0.0);
        assert_eq!(scores.f_score, 0.0);
    }

    #[test]
    fn test_unsorted_input() {
        let estimated = vec![3.0, 1.0, 2.0];
        let reference = vec![2.0, 3.0, 1.0];
        let scores = evaluate_points(&estimated, &reference, 0.05);
        assert_eq!(scores.n_matched, 3);
    }
}
