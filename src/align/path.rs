//! Warping-path repair and interpolation.

/// Collapse a warping path into one that is strictly increasing in both
/// coordinates.
///
/// DTW paths contain vertical and horizontal runs (one frame on one side
/// matched to several on the other). Interpolation needs a function, so
/// ties are collapsed: the last pair of each audio-frame run is kept,
/// then the first pair of each score-frame run. Keeping the last score
/// pair pins an audio frame spanning several score events to the final
/// one, which is the one actually sounding; keeping the first audio pair
/// pins a held score note to its earliest audio frame.
pub fn make_strictly_monotonic(path: &[(u32, u32)]) -> Vec<(u32, u32)> {
    if path.is_empty() {
        return Vec::new();
    }

    // Last pair of each audio-frame run.
    let mut by_audio: Vec<(u32, u32)> = Vec::with_capacity(path.len());
    for &(i, j) in path {
        match by_audio.last_mut() {
            Some(last) if last.0 == i => *last = (i, j),
            _ => by_audio.push((i, j)),
        }
    }

    // First pair of each score-frame run.
    let mut out: Vec<(u32, u32)> = Vec::with_capacity(by_audio.len());
    for &(i, j) in &by_audio {
        match out.last() {
            Some(&(_, last_j)) if last_j == j => {}
            _ => out.push((i, j)),
        }
    }
    out
}

/// Piecewise-linear interpolation over a strictly increasing grid.
///
/// Queries outside the domain extrapolate with the slope of the boundary
/// segment, so a table row slightly before the first aligned frame (the
/// deliberate score-timeline offset guarantees some are) still gets a
/// sensible timestamp.
#[derive(Debug, Clone)]
pub struct Interp1d {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Interp1d {
    /// Build an interpolant from matched sample points. `xs` must be
    /// strictly increasing.
    ///
    /// # Errors
    /// [`crate::Error::PathTooShort`] with fewer than two points.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> crate::Result<Self> {
        if xs.len() < 2 || xs.len() != ys.len() {
            return Err(crate::Error::PathTooShort { len: xs.len() });
        }
        Ok(Self { xs, ys })
    }

    /// Build an interpolant mapping score frames to audio frames from a
    /// strictly monotonic warping path.
    pub fn from_path(path: &[(u32, u32)]) -> crate::Result<Self> {
        let xs: Vec<f64> = path.iter().map(|&(_, j)| j as f64).collect();
        let ys: Vec<f64> = path.iter().map(|&(i, _)| i as f64).collect();
        Self::new(xs, ys)
    }

    /// Evaluate at `x`, extrapolating beyond the domain with the boundary
    /// segment's slope.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        let seg = if x <= self.xs[0] {
            0
        } else if x >= self.xs[n - 1] {
            n - 2
        } else {
            // partition_point: first index with xs[idx] > x, minus one.
            self.xs.partition_point(|&v| v <= x) - 1
        };
        let (x0, x1) = (self.xs[seg], self.xs[seg + 1]);
        let (y0, y1) = (self.ys[seg], self.ys[seg + 1]);
        let slope = (y1 - y0) / (x1 - x0);
        y0 + slope * (x - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_monotonic_repair_collapses_runs() {
        let path = vec![(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (3, 3)];
        let repaired = make_strictly_monotonic(&path);
        for pair in repaired.windows(2) {
            assert!(pair[1].0 > pair[0].0, "audio not strict: {repaired:?}");
            assert!(pair[1].1 > pair[0].1, "score not strict: {repaired:?}");
        }
        // Vertical run at audio 2: last score frame (2) wins; horizontal
        // run at score 0: first audio frame (0) wins.
        assert!(repaired.contains(&(0, 0)));
        assert!(repaired.contains(&(2, 2)));
        assert!(repaired.contains(&(3, 3)));
    }

    #[test]
    fn test_monotonic_repair_identity_on_strict_path() {
        let path = vec![(0, 0), (1, 1), (2, 3), (4, 4)];
        assert_eq!(make_strictly_monotonic(&path), path);
    }

    #[test]
    fn test_monotonic_repair_empty() {
        assert!(make_strictly_monotonic(&[]).is_empty());
    }

    #[test]
    fn test_interp_within_domain() {
        let interp = Interp1d::new(vec![0.0, 2.0, 4.0], vec![0.0, 1.0, 5.0]).unwrap();
        assert_relative_eq!(interp.eval(1.0), 0.5);
        assert_relative_eq!(interp.eval(3.0), 3.0);
        assert_relative_eq!(interp.eval(2.0), 1.0);
    }

    #[test]
    fn test_interp_extrapolates_with_boundary_slope() {
        let interp = Interp1d::new(vec![0.0, 2.0, 4.0], vec![0.0, 1.0, 5.0]).unwrap();
        // Left segment slope 0.5, right segment slope 2.0.
        assert_relative_eq!(interp.eval(-2.0), -1.0);
        assert_relative_eq!(interp.eval(6.0), 9.0);
    }

    #[test]
    fn test_interp_too_short() {
        let err = Interp1d::new(vec![1.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, crate::Error::PathTooShort { len: 1 }));
    }

    #[test]
    fn test_interp_from_path() {
        let path = vec![(0, 0), (2, 1), (4, 2)];
        let interp = Interp1d::from_path(&path).unwrap();
        assert_relative_eq!(interp.eval(1.5), 3.0);
    }
}
