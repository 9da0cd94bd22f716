/// Crate-level error type for the taktsync alignment library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid parameter value.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Audio data is empty when a non-empty signal was required.
    #[error("audio data is empty")]
    EmptyAudio,

    /// Audio data contains non-finite values (NaN or Inf).
    #[error("audio data contains non-finite values")]
    NonFiniteAudio,

    /// A feature matrix carries no energy at all, so any warping path
    /// computed from it would be meaningless.
    #[error("degenerate {side} feature matrix: all frames are silent")]
    DegenerateFeatures { side: &'static str },

    /// Input array has incorrect shape for the operation.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// A malformed row in a tabular input file.
    #[error("malformed row {line} in `{file}`: {reason}")]
    MalformedRow {
        file: String,
        line: usize,
        reason: String,
    },

    /// A timestamp field that is not in hh:mm:ss form.
    #[error("malformed timestamp `{value}`: expected hh:mm:ss")]
    MalformedTimestamp { value: String },

    /// No time signature is resolvable for a measure, so beat positions
    /// and the measure's nominal length cannot be computed.
    #[error("no time signature resolvable for measure {measure}")]
    MissingTimeSignature { measure: u32 },

    /// The measure-map walk never reached the end sentinel.
    #[error(
        "measure map walk did not reach the end sentinel within {steps} steps \
         (cycle or missing `next = [-1]` entry?)"
    )]
    UnreachableSentinel { steps: usize },

    /// The measure map is empty or has no usable start entry.
    #[error("measure map is empty")]
    EmptyMeasureMap,

    /// A single expanded qstamp maps to more than one (measure, beat)
    /// position, which signals an upstream parsing bug.
    #[error(
        "inconsistent beat values: qstamp {qstamp} maps to measure {measure_a} beat {beat_a} \
         and measure {measure_b} beat {beat_b}"
    )]
    InconsistentBeat {
        qstamp: f64,
        measure_a: u32,
        beat_a: f64,
        measure_b: u32,
        beat_b: f64,
    },

    /// A warping path too short (or too degenerate) to interpolate along.
    #[error("warping path has {len} usable points, need at least 2")]
    PathTooShort { len: usize },

    /// Remote audio must be fetched by an external loader before alignment.
    #[error("`{url}` is a URL; fetch the audio locally before aligning")]
    RemoteAudio { url: String },

    /// A required sibling file was not found next to the score.
    #[error("no sibling {kind} file found for `{score}` (looked for `{expected}`)")]
    MissingSibling {
        kind: &'static str,
        score: String,
        expected: String,
    },

    /// Audio decode/resample errors.
    #[error(transparent)]
    Audio(#[from] crate::io::AudioError),

    /// File I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Measure-map JSON errors.
    #[error("measure map JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type for taktsync operations.
pub type Result<T> = std::result::Result<T, Error>;
