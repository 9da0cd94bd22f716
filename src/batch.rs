//! Batch alignment of several recordings against one score.
//!
//! Score features are computed once and shared read-only; recordings are
//! aligned in parallel. One recording failing to decode or align is
//! reported, not fatal: comparison corpora routinely contain a broken
//! download or a mislabeled file, and the surviving columns are still
//! useful.

use std::path::Path;
use std::sync::OnceLock;

use log::{error, info};
use rayon::prelude::*;
use regex::Regex;

use crate::align::{self, Alignment};
use crate::config::AlignConfig;
use crate::feature::{self, FeatureSet};
use crate::io;
use crate::score::ExpandedEvent;
use crate::table::{offset_score_events, AlignmentTable};

/// One recording of the scored piece.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Column id in the alignment table.
    pub id: String,
    /// Local path to the audio file.
    pub path: String,
    /// Crop start in seconds of the original file, if the performance is
    /// embedded in a longer recording.
    pub start_secs: Option<f64>,
    /// Crop end in seconds.
    pub end_secs: Option<f64>,
}

impl Recording {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            start_secs: None,
            end_secs: None,
        }
    }

    pub fn with_crop(mut self, start_secs: Option<f64>, end_secs: Option<f64>) -> Self {
        self.start_secs = start_secs;
        self.end_secs = end_secs;
        self
    }
}

/// Outcome of a batch run: the merged table plus per-recording results.
#[derive(Debug)]
pub struct BatchReport {
    /// The wide table; failed recordings appear as all-empty columns.
    pub table: AlignmentTable,
    /// Successful alignments, in table-column order of their ids.
    pub alignments: Vec<(String, Alignment)>,
    /// `(id, error message)` for recordings that failed.
    pub failed: Vec<(String, String)>,
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").unwrap())
}

fn align_one(
    recording: &Recording,
    score: &FeatureSet,
    cfg: &AlignConfig,
) -> crate::Result<Alignment> {
    if url_pattern().is_match(&recording.path) {
        return Err(crate::Error::RemoteAudio {
            url: recording.path.clone(),
        });
    }
    let audio = io::load_waveform(
        Path::new(&recording.path),
        cfg.sample_rate,
        recording.start_secs,
        recording.end_secs,
    )?;
    align::align_to_score(&audio, score, cfg)
}

/// Align every recording against the expanded score and merge the results
/// into one table.
///
/// # Errors
/// Score-side errors (degenerate features, inconsistent beats) are fatal;
/// per-recording errors are collected in [`BatchReport::failed`].
pub fn align_batch(
    events: &[ExpandedEvent],
    recordings: &[Recording],
    cfg: &AlignConfig,
) -> crate::Result<BatchReport> {
    let offset_events = offset_score_events(events, cfg.score_offset_secs);
    let score_features = feature::score_features(&offset_events, cfg)?;
    info!(
        "score features ready: {} frames for {} recordings",
        score_features.n_frames(),
        recordings.len()
    );

    let results: Vec<(usize, crate::Result<Alignment>)> = recordings
        .par_iter()
        .enumerate()
        .map(|(idx, recording)| (idx, align_one(recording, &score_features, cfg)))
        .collect();

    let mut table = AlignmentTable::build(events, cfg)?;
    let mut alignments = Vec::new();
    let mut failed = Vec::new();

    for (idx, result) in results {
        let recording = &recordings[idx];
        // Tabulation can still fail for a recording whose repaired path
        // is too short to interpolate; that is a per-recording failure
        // like any other, not a batch abort.
        let tabulated = result.and_then(|alignment| {
            table
                .add_recording(
                    &recording.id,
                    &alignment,
                    recording.start_secs.unwrap_or(0.0),
                    cfg,
                )
                .map(|()| alignment)
        });
        match tabulated {
            Ok(alignment) => {
                info!("aligned `{}`", recording.id);
                alignments.push((recording.id.clone(), alignment));
            }
            Err(err) => {
                error!("failed to align `{}`: {err}", recording.id);
                table.add_failed_recording(&recording.id);
                failed.push((recording.id.clone(), err.to_string()));
            }
        }
    }

    Ok(BatchReport {
        table,
        alignments,
        failed,
    })
}
