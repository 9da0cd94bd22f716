use num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Cached real-to-complex FFT plan.
///
/// STFT frames are real-valued, so only the non-redundant half of the
/// spectrum (len/2 + 1 bins) is computed. The plan is built once and
/// reused across all frames of one transform.
///
/// # Example
/// ```
/// use taktsync::fft::RealFftPlan;
///
/// let plan = RealFftPlan::new(512);
/// let mut input = vec![1.0f32; 512];
/// let mut output = plan.make_output_vec();
/// plan.forward(&mut input, &mut output);
/// assert_eq!(output.len(), 257);
/// ```
pub struct RealFftPlan {
    r2c: Arc<dyn RealToComplex<f32>>,
    len: usize,
}

impl RealFftPlan {
    /// Create a plan for real input of length `len`.
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(len);
        Self { r2c, len }
    }

    /// Forward transform. `input` is scratch and gets overwritten;
    /// `output` must hold `len/2 + 1` bins.
    pub fn forward(&self, input: &mut [f32], output: &mut [Complex32]) {
        let _ = self.r2c.process(input, output);
    }

    /// An output buffer of the right length for this plan.
    pub fn make_output_vec(&self) -> Vec<Complex32> {
        self.r2c.make_output_vec()
    }

    /// The input length this plan was built for.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of output bins (`len/2 + 1`).
    pub fn output_len(&self) -> usize {
        self.len / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_component() {
        let plan = RealFftPlan::new(16);
        let mut input = vec![1.0f32; 16];
        let mut output = plan.make_output_vec();
        plan.forward(&mut input, &mut output);
        assert_eq!(output.len(), 9);
        assert!((output[0].re - 16.0).abs() < 1e-4);
        for v in &output[1..] {
            assert!(v.norm() < 1e-4);
        }
    }

    #[test]
    fn test_single_bin_sine() {
        let plan = RealFftPlan::new(64);
        // Two full cycles over the window: all energy in bin 2.
        let mut input: Vec<f32> = (0..64)
            .map(|i| (2.0 * std::f32::consts::PI * 2.0 * i as f32 / 64.0).sin())
            .collect();
        let mut output = plan.make_output_vec();
        plan.forward(&mut input, &mut output);
        let peak = (0..output.len())
            .max_by(|&a, &b| output[a].norm().partial_cmp(&output[b].norm()).unwrap())
            .unwrap();
        assert_eq!(peak, 2);
    }
}
