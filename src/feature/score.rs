//! Score-side feature synthesis.
//!
//! The score side never touches audio: expanded note events are rendered
//! straight into the per-pitch representation the audio side produces from
//! its STFT, so both sides flow through the same chroma and onset
//! pipelines.

use crate::config::AlignConfig;
use crate::feature::pitch::PitchFeatures;
use crate::feature::N_PITCHES;
use crate::score::ExpandedEvent;
use ndarray::Array2;

/// Render expanded events into per-pitch energy and onset peaks.
///
/// Each event contributes its velocity as sustained energy over
/// `[tstamp, tstamp + duration_secs)` and as a single impulse at its start
/// frame. Grace notes (zero written duration) are skipped: their timing is
/// ornamental and would only add noise to the onset matrix.
pub fn score_pitch_features(
    events: &[ExpandedEvent],
    cfg: &AlignConfig,
) -> crate::Result<PitchFeatures> {
    let rate = cfg.feature_rate as f64;
    let end_secs = events
        .iter()
        .map(|e| e.tstamp + e.duration_secs)
        .fold(0.0f64, f64::max);
    let n_frames = ((end_secs * rate).ceil() as usize).max(1) + 1;

    let mut energy = Array2::<f32>::zeros((N_PITCHES, n_frames));
    let mut onsets = Array2::<f32>::zeros((N_PITCHES, n_frames));

    for event in events {
        if event.duration_quarter <= 0.0 {
            continue;
        }
        let pitch = event.pitch as usize;
        if pitch >= N_PITCHES {
            continue;
        }
        let velocity = event.velocity as f32;

        let start = (event.tstamp * rate).round() as usize;
        let end = (((event.tstamp + event.duration_secs) * rate).round() as usize)
            .max(start + 1)
            .min(n_frames);
        for frame in start.min(n_frames - 1)..end {
            energy[(pitch, frame)] += velocity;
        }
        onsets[(pitch, start.min(n_frames - 1))] += velocity;
    }

    Ok(PitchFeatures { energy, onsets })
}
