//! Feature extraction for alignment.
//!
//! Both sides of an alignment are reduced to the same two matrices at the
//! configured feature rate: a 12-bin quantized chroma matrix capturing
//! sustained harmonic content, and a 12-bin onset-salience matrix that
//! sharpens the DTW cost near note starts. The audio side derives them
//! from an STFT pitch-salience representation; the score side synthesises
//! them directly from expanded note events.

mod chroma;
mod onset;
mod pitch;
mod score;

pub use chroma::{
    normalize_columns, pitch_to_chroma, quantize_chroma, shift_chroma, smooth_downsample_chroma,
};
pub use onset::onset_salience;
pub use pitch::{audio_pitch_features, PitchFeatures};
pub use score::score_pitch_features;

use crate::config::AlignConfig;
use crate::score::ExpandedEvent;
use ndarray::Array2;

/// Number of chroma bins.
pub const N_CHROMA: usize = 12;
/// Number of MIDI pitches in the intermediate pitch representation.
pub const N_PITCHES: usize = 128;

/// The matrix pair one side of an alignment is reduced to.
///
/// Both matrices are (12 × frames) at the configured feature rate; the
/// audio and score sides share dimensionality and rate but not frame
/// counts.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Quantized chroma, values in {0, 0.25, 0.5, 0.75, 1.0}.
    pub chroma: Array2<f32>,
    /// Pitch-class onset salience with decaying tails.
    pub onset: Array2<f32>,
}

impl FeatureSet {
    pub fn n_frames(&self) -> usize {
        self.chroma.shape()[1]
    }

    /// Circularly shift both matrices by `shift` chroma bins.
    pub fn shifted(&self, shift: usize) -> FeatureSet {
        FeatureSet {
            chroma: shift_chroma(&self.chroma, shift),
            onset: shift_chroma(&self.onset, shift),
        }
    }
}

fn ensure_not_degenerate(energy: &Array2<f32>, side: &'static str) -> crate::Result<()> {
    if energy.iter().all(|&v| v == 0.0) {
        return Err(crate::Error::DegenerateFeatures { side });
    }
    Ok(())
}

fn build_feature_set(
    pitch: &PitchFeatures,
    cfg: &AlignConfig,
    side: &'static str,
) -> crate::Result<FeatureSet> {
    ensure_not_degenerate(&pitch.energy, side)?;

    let mut chroma = pitch_to_chroma(&pitch.energy);
    normalize_columns(&mut chroma);
    let chroma = quantize_chroma(&chroma);
    let onset = onset_salience(&pitch.onsets, cfg);

    Ok(FeatureSet { chroma, onset })
}

/// Extract the chroma/onset feature pair from a mono waveform.
///
/// `tuning_cents` is the deviation from A440 estimated by
/// [`crate::tuning::estimate_tuning_cents`]; it is folded into the pitch
/// filterbank's reference frequency.
///
/// # Errors
/// [`crate::Error::DegenerateFeatures`] if the waveform carries no energy,
/// plus STFT errors for empty or non-finite input.
pub fn audio_features(
    y: &[f32],
    tuning_cents: f32,
    cfg: &AlignConfig,
) -> crate::Result<FeatureSet> {
    let pitch = audio_pitch_features(y, tuning_cents, cfg)?;
    build_feature_set(&pitch, cfg, "audio")
}

/// Synthesise the chroma/onset feature pair from expanded score events.
///
/// # Errors
/// [`crate::Error::DegenerateFeatures`] if the events produce an all-zero
/// matrix (e.g. every event is a grace note).
pub fn score_features(events: &[ExpandedEvent], cfg: &AlignConfig) -> crate::Result<FeatureSet> {
    let pitch = score_pitch_features(events, cfg)?;
    build_feature_set(&pitch, cfg, "score")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::tone;

    #[test]
    fn test_audio_features_shapes_match() {
        let cfg = AlignConfig::default();
        let signal = tone(440.0, cfg.sample_rate, 2.0);
        let features = audio_features(&signal, 0.0, &cfg).unwrap();
        assert_eq!(features.chroma.shape()[0], N_CHROMA);
        assert_eq!(features.onset.shape()[0], N_CHROMA);
        assert_eq!(features.chroma.shape()[1], features.onset.shape()[1]);
        // 2 s at 50 Hz: about 100 frames.
        assert!((features.n_frames() as i64 - 100).abs() < 10);
    }

    #[test]
    fn test_audio_features_tone_lands_in_pitch_class() {
        let cfg = AlignConfig::default();
        let signal = tone(440.0, cfg.sample_rate, 2.0);
        let features = audio_features(&signal, 0.0, &cfg).unwrap();

        // A440 is pitch class 9; its chroma row should dominate.
        let row_energy: Vec<f32> = (0..N_CHROMA)
            .map(|c| features.chroma.row(c).sum())
            .collect();
        let best = (0..N_CHROMA)
            .max_by(|&a, &b| row_energy[a].partial_cmp(&row_energy[b]).unwrap())
            .unwrap();
        assert_eq!(best, 9);
    }

    #[test]
    fn test_silence_is_degenerate() {
        let cfg = AlignConfig::default();
        let signal = vec![0.0f32; cfg.sample_rate as usize];
        let err = audio_features(&signal, 0.0, &cfg).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::DegenerateFeatures { side: "audio" }
        ));
    }

    #[test]
    fn test_shifted_rolls_both_matrices() {
        let cfg = AlignConfig::default();
        let signal = tone(440.0, cfg.sample_rate, 1.0);
        let features = audio_features(&signal, 0.0, &cfg).unwrap();
        let rolled = features.shifted(3);
        assert_eq!(rolled.chroma.row(3), features.chroma.row(0));
        assert_eq!(rolled.onset.row(3), features.onset.row(0));
    }
}
