//! Score-to-audio alignment for Rust.
//!
//! Taktsync aligns one or more audio recordings of a musical performance to
//! a symbolic score, producing a table that maps score time (quarter-note
//! positions) to real time (seconds) in every recording. The pipeline:
//!
//! 1. **Measure-map expansion** — walk the score's repeat/jump graph to
//!    obtain the performance order of measures and stamp every note event
//!    with an expanded quarter-note position (`qstamp`) and a nominal
//!    real-time position (`tstamp`) under a per-measure tempo map.
//! 2. **Feature extraction** — quantized chroma and pitch-class onset
//!    salience at a fixed feature rate, computed independently from the
//!    audio waveform and from the expanded note-event table.
//! 3. **Alignment** — tuning estimation, optimal chroma-shift correction,
//!    and multi-resolution dynamic time warping between the two feature
//!    timelines, repaired to a strictly monotonic warping path.
//! 4. **Table building** — interpolate every expanded score event through
//!    the warping path to a timestamp in each recording and merge the
//!    per-recording results into one alignment table.
//!
//! # Quick Start
//!
//! ```no_run
//! use taktsync::batch::{align_batch, Recording};
//! use taktsync::config::AlignConfig;
//! use taktsync::score::{expand_score, read_note_events, MeasureMap, TempoMap, TimeSigMap};
//!
//! let cfg = AlignConfig::default();
//! let events = read_note_events("symphony.csv").unwrap();
//! let map = MeasureMap::from_json_file("symphony.mm.json").unwrap();
//! let time_sigs = TimeSigMap::uniform(4, 4);
//! let tempos = TempoMap::build(&[], 1);
//! let expanded = expand_score(&events, &map, &tempos, &time_sigs, &cfg).unwrap();
//!
//! let recordings = vec![Recording::new("karajan1963", "karajan.mp3")];
//! let report = align_batch(&expanded, &recordings, &cfg).unwrap();
//! println!("{} aligned, {} failed", report.alignments.len(), report.failed.len());
//! report.table.write_csv("symphony_alignment.csv").unwrap();
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`score`] | Note events, measure maps, tempo maps, repeat expansion |
//! | [`feature`] | Quantized chroma and onset-salience feature extraction |
//! | [`align`] | Weighted multi-resolution DTW and warping-path utilities |
//! | [`table`] | Alignment table construction, merging, downstream views |
//! | [`batch`] | Parallel alignment of many recordings to one score |
//! | [`evaluate`] | Segmentation-point evaluation (precision/recall/F) |
//! | [`io`] | Audio decode, resampling, cropping, signal generators |
//! | [`tuning`] | Tuning-deviation estimation in cents |
//! | [`stft`] | Short-time Fourier transform |
//! | [`config`] | Pipeline configuration |
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. The [`Error`] enum covers input
//! validation, measure-map graph walks, degenerate features, and I/O.

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, Result};

pub mod align;
pub mod batch;
pub mod config;
pub mod evaluate;
pub mod feature;
pub mod fft;
pub mod io;
pub mod score;
pub mod stft;
pub mod table;
pub mod tuning;
pub mod window;
