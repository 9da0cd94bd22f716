use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A time signature in effect from some measure onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSig {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSig {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Nominal measure length in quarter notes.
    pub fn bar_quarters(&self) -> f64 {
        self.numerator as f64 * 4.0 / self.denominator as f64
    }

    /// Length of one notated beat in quarter notes.
    pub fn beat_quarters(&self) -> f64 {
        4.0 / self.denominator as f64
    }
}

/// Time-signature context per measure, forward-filled like [`super::TempoMap`].
///
/// Expansion needs a resolvable signature for every visited measure: it
/// supplies both the measure's nominal length (to advance the running
/// counters across measure boundaries) and the beat duration (to recompute
/// ambiguous beat values). An unresolvable measure is a structured error,
/// never a silent default.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSigMap {
    by_measure: BTreeMap<u32, TimeSig>,
}

impl TimeSigMap {
    /// Build from `(measure, signature)` entries; un-marked measures take
    /// the most recent earlier entry.
    pub fn build(entries: &[(u32, TimeSig)]) -> Self {
        let mut by_measure = BTreeMap::new();
        for &(measure, sig) in entries {
            by_measure.insert(measure, sig);
        }
        Self { by_measure }
    }

    /// A single signature covering the whole score.
    pub fn uniform(numerator: u32, denominator: u32) -> Self {
        Self::build(&[(1, TimeSig::new(numerator, denominator))])
    }

    /// The signature in effect during `measure`.
    ///
    /// # Errors
    /// [`crate::Error::MissingTimeSignature`] when no entry exists at or
    /// before `measure`.
    pub fn sig_at(&self, measure: u32) -> crate::Result<TimeSig> {
        self.by_measure
            .range(..=measure)
            .next_back()
            .map(|(_, &sig)| sig)
            .ok_or(crate::Error::MissingTimeSignature { measure })
    }

    /// Nominal quarter-note offset of each measure's start in the written
    /// score, for measures `1..=max_measure` (index 0 is measure 1).
    pub fn measure_starts(&self, max_measure: u32) -> crate::Result<Vec<f64>> {
        let mut starts = Vec::with_capacity(max_measure as usize);
        let mut offset = 0.0;
        for measure in 1..=max_measure {
            starts.push(offset);
            offset += self.sig_at(measure)?.bar_quarters();
        }
        Ok(starts)
    }
}

/// Read time signatures from a CSV file with header
/// `measure,numerator,denominator`.
pub fn read_time_sigs<P: AsRef<Path>>(path: P) -> crate::Result<Vec<(u32, TimeSig)>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let file_name = path.display().to_string();

    let mut entries = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || (line_no == 0 && trimmed.starts_with("measure")) {
            continue;
        }
        let malformed = |reason: String| crate::Error::MalformedRow {
            file: file_name.clone(),
            line: line_no + 1,
            reason,
        };
        let fields: Vec<&str> = trimmed.split(',').collect();
        if fields.len() < 3 {
            return Err(malformed(format!("expected 3 fields, got {}", fields.len())));
        }
        let parse_u32 = |idx: usize, name: &str| -> crate::Result<u32> {
            fields[idx]
                .trim()
                .parse::<u32>()
                .map_err(|_| malformed(format!("field `{name}`: `{}` is not an integer", fields[idx])))
        };
        entries.push((
            parse_u32(0, "measure")?,
            TimeSig::new(parse_u32(1, "numerator")?, parse_u32(2, "denominator")?),
        ));
    }
    Ok(entries)
}
