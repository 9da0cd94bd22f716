//! Pipeline configuration.
//!
//! Every stage of the pipeline reads its knobs from an [`AlignConfig`]
//! passed in explicitly, so batch runs with different settings can execute
//! concurrently without cross-talk through module-level state.

/// Configuration shared by feature extraction and the alignment engine.
#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// Working sample rate for audio analysis (input audio is resampled).
    pub sample_rate: u32,
    /// Feature frames per second, shared by the audio and score sides.
    pub feature_rate: u32,
    /// FFT size for the pitch-salience STFT.
    pub n_fft: usize,
    /// DTW step weights for the (1,0), (0,1), and (1,1) moves. The default
    /// favours diagonal continuity; raising the axis weights helps pieces
    /// with sparse onsets.
    pub step_weights: [f32; 3],
    /// Weight of the onset-salience distance in the local DTW cost,
    /// relative to the chroma cosine distance.
    pub onset_weight: f32,
    /// Maximum cost-matrix cell count before the aligner recurses to a
    /// coarser resolution instead of running full DTW.
    pub threshold_rec: usize,
    /// Downsampling factor between multiscale DTW levels.
    pub coarse_factor: usize,
    /// Half-width (in fine-level frames) of the band kept around the
    /// projected coarse path during refinement.
    pub band_radius: usize,
    /// Smoothing window length in frames for the ~1 Hz chroma summary used
    /// by the chroma-shift search.
    pub cens_window: usize,
    /// Downsampling factor for the ~1 Hz chroma summary.
    pub cens_downsample: usize,
    /// Length in frames of the decaying tail appended to onset peaks.
    pub onset_decay: usize,
    /// Window length in seconds for local onset normalization and for
    /// tempo-curve smoothing.
    pub smoothing_secs: f32,
    /// Decimal digits kept in emitted timestamps; suppresses float drift
    /// accumulated over long performances.
    pub rounding_digits: u32,
    /// Offset in seconds added to the score timeline before alignment so
    /// that timestamp 0.0 is never a forced match point.
    pub score_offset_secs: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            feature_rate: 50,
            n_fft: 4096,
            step_weights: [1.5, 1.5, 2.0],
            onset_weight: 0.5,
            threshold_rec: 1_000_000,
            coarse_factor: 10,
            band_radius: 50,
            cens_window: 201,
            cens_downsample: 50,
            onset_decay: 10,
            smoothing_secs: 4.0,
            rounding_digits: 4,
            score_offset_secs: 1.0,
        }
    }
}

impl AlignConfig {
    /// Hop length in samples between successive feature frames.
    pub fn hop_length(&self) -> usize {
        (self.sample_rate / self.feature_rate) as usize
    }

    /// Round a value to the configured number of decimal digits.
    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.rounding_digits as i32);
        (value * scale).round() / scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_length() {
        let cfg = AlignConfig::default();
        assert_eq!(cfg.hop_length(), 441);
    }

    #[test]
    fn test_round() {
        let cfg = AlignConfig::default();
        assert_eq!(cfg.round(1.23456789), 1.2346);
        assert_eq!(cfg.round(2.0), 2.0);
        assert_eq!(cfg.round(-0.123442), -0.1234);
    }
}
