//! STFT-based pitch salience for the audio side.

use crate::config::AlignConfig;
use crate::feature::N_PITCHES;
use crate::stft::{magnitude_spectrogram, StftConfig};
use ndarray::Array2;

/// Intermediate per-MIDI-pitch representation, (128 × frames).
#[derive(Debug, Clone)]
pub struct PitchFeatures {
    /// Spectral energy accumulated per MIDI pitch.
    pub energy: Array2<f32>,
    /// Half-wave rectified temporal difference of `energy`: per-pitch
    /// onset peaks.
    pub onsets: Array2<f32>,
}

/// Map a waveform onto per-MIDI-pitch energy at the configured feature
/// rate.
///
/// Each STFT bin's energy is assigned to the nearest MIDI pitch under a
/// reference frequency of `440 * 2^(tuning_cents/1200)`, so a detuned
/// performance still lands in the correct semitone rows.
pub fn audio_pitch_features(
    y: &[f32],
    tuning_cents: f32,
    cfg: &AlignConfig,
) -> crate::Result<PitchFeatures> {
    let stft_cfg = StftConfig::new(cfg.n_fft, cfg.hop_length());
    let magnitude = magnitude_spectrogram(y, &stft_cfg)?;
    let n_freq = magnitude.shape()[0];
    let n_frames = magnitude.shape()[1];

    let f_ref = 440.0f32 * 2f32.powf(tuning_cents / 1200.0);
    let freq_res = cfg.sample_rate as f32 / cfg.n_fft as f32;

    // Precompute the bin -> MIDI pitch assignment; bin 0 (DC) is dropped.
    let mut bin_pitch = vec![None; n_freq];
    for (bin, slot) in bin_pitch.iter_mut().enumerate().skip(1) {
        let freq = bin as f32 * freq_res;
        let midi = 69.0 + 12.0 * (freq / f_ref).log2();
        let p = midi.round();
        if (0.0..N_PITCHES as f32).contains(&p) {
            *slot = Some(p as usize);
        }
    }

    let mut energy = Array2::<f32>::zeros((N_PITCHES, n_frames));
    for bin in 1..n_freq {
        if let Some(p) = bin_pitch[bin] {
            for frame in 0..n_frames {
                let m = magnitude[(bin, frame)];
                energy[(p, frame)] += m * m;
            }
        }
    }

    let onsets = half_wave_diff(&energy);
    Ok(PitchFeatures { energy, onsets })
}

/// Positive temporal difference per row; the first frame keeps its full
/// energy so a note sounding from frame 0 still registers as an onset.
pub(crate) fn half_wave_diff(energy: &Array2<f32>) -> Array2<f32> {
    let (n_rows, n_frames) = (energy.shape()[0], energy.shape()[1]);
    let mut onsets = Array2::<f32>::zeros((n_rows, n_frames));
    for row in 0..n_rows {
        if n_frames > 0 {
            onsets[(row, 0)] = energy[(row, 0)];
        }
        for frame in 1..n_frames {
            let diff = energy[(row, frame)] - energy[(row, frame - 1)];
            if diff > 0.0 {
                onsets[(row, frame)] = diff;
            }
        }
    }
    onsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::tone;

    #[test]
    fn test_tone_energy_concentrates_at_midi_pitch() {
        let cfg = AlignConfig::default();
        let signal = tone(440.0, cfg.sample_rate, 1.0);
        let features = audio_pitch_features(&signal, 0.0, &cfg).unwrap();

        let mid_frame = features.energy.shape()[1] / 2;
        let best = (0..N_PITCHES)
            .max_by(|&a, &b| {
                features.energy[(a, mid_frame)]
                    .partial_cmp(&features.energy[(b, mid_frame)])
                    .unwrap()
            })
            .unwrap();
        assert_eq!(best, 69);
    }

    #[test]
    fn test_tuning_offset_shifts_reference() {
        let cfg = AlignConfig::default();
        // A tone 50 cents sharp of A4: without correction it straddles
        // pitches 69/70; with the matching tuning offset it maps to 69.
        let sharp = 440.0 * 2f32.powf(0.5 / 12.0);
        let signal = tone(sharp, cfg.sample_rate, 1.0);
        let features = audio_pitch_features(&signal, 50.0, &cfg).unwrap();

        let mid_frame = features.energy.shape()[1] / 2;
        let best = (0..N_PITCHES)
            .max_by(|&a, &b| {
                features.energy[(a, mid_frame)]
                    .partial_cmp(&features.energy[(b, mid_frame)])
                    .unwrap()
            })
            .unwrap();
        assert_eq!(best, 69);
    }

    #[test]
    fn test_half_wave_diff_rectifies() {
        let energy =
            Array2::from_shape_vec((1, 4), vec![1.0, 3.0, 2.0, 5.0]).unwrap();
        let onsets = half_wave_diff(&energy);
        assert_eq!(onsets[(0, 0)], 1.0);
        assert_eq!(onsets[(0, 1)], 2.0);
        assert_eq!(onsets[(0, 2)], 0.0);
        assert_eq!(onsets[(0, 3)], 3.0);
    }

    #[test]
    fn test_frame_count_matches_feature_rate() {
        let cfg = AlignConfig::default();
        let signal = tone(220.0, cfg.sample_rate, 3.0);
        let features = audio_pitch_features(&signal, 0.0, &cfg).unwrap();
        let n_frames = features.energy.shape()[1] as i64;
        assert!((n_frames - 150).abs() < 10, "got {n_frames}");
    }
}
