//! The alignment engine: DTW over chroma/onset features.
//!
//! Entry point is [`align_to_score`], which runs tuning estimation,
//! feature extraction, the chroma-shift search, multiscale DTW, and
//! monotonicity repair for one recording.

mod dtw;
mod engine;
mod multiscale;
mod path;

pub use engine::{align_to_score, Alignment};
pub use multiscale::align_multiscale;
pub use path::{make_strictly_monotonic, Interp1d};
