use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Quarter-note BPM assumed when a score carries no tempo marking at all.
pub const DEFAULT_QUARTER_BPM: f64 = 120.0;

/// Mapping from measure number to the quarter-note BPM in effect there.
///
/// Built once per score from explicit tempo markings, defaulted to 120 BPM
/// when none exist, and forward-filled so every measure up to the last one
/// has a value. Consumed read-only during expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    by_measure: BTreeMap<u32, f64>,
}

impl TempoMap {
    /// Build a tempo map from `(measure, quarter_bpm)` markings.
    ///
    /// Markings need not be sorted. If no marking covers measure 1, the
    /// default of 120 BPM is inserted there. Every un-marked measure in
    /// `1..=max_measure` receives the most recent marking (forward fill),
    /// which makes the builder idempotent: feeding its own output back in
    /// as explicit markings yields an identical map.
    pub fn build(markings: &[(u32, f64)], max_measure: u32) -> Self {
        let mut by_measure: BTreeMap<u32, f64> = BTreeMap::new();
        for &(measure, bpm) in markings {
            by_measure.insert(measure, bpm);
        }
        if !by_measure.contains_key(&1) {
            by_measure.insert(1, DEFAULT_QUARTER_BPM);
        }

        let mut curr = DEFAULT_QUARTER_BPM;
        for measure in 1..=max_measure.max(1) {
            match by_measure.get(&measure) {
                Some(&bpm) => curr = bpm,
                None => {
                    by_measure.insert(measure, curr);
                }
            }
        }

        Self { by_measure }
    }

    /// Quarter-note BPM in effect during `measure`. Measures beyond the
    /// filled range inherit the last known tempo.
    pub fn bpm_at(&self, measure: u32) -> f64 {
        self.by_measure
            .range(..=measure)
            .next_back()
            .map(|(_, &bpm)| bpm)
            .unwrap_or(DEFAULT_QUARTER_BPM)
    }

    /// Length of one quarter note in seconds during `measure`.
    pub fn quarter_secs_at(&self, measure: u32) -> f64 {
        60.0 / self.bpm_at(measure)
    }

    /// Every `(measure, bpm)` pair, usable as explicit markings.
    pub fn markings(&self) -> Vec<(u32, f64)> {
        self.by_measure.iter().map(|(&m, &b)| (m, b)).collect()
    }
}

/// Read tempo markings from a CSV file with header `measure,quarter_bpm`.
pub fn read_tempo_markings<P: AsRef<Path>>(path: P) -> crate::Result<Vec<(u32, f64)>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let file_name = path.display().to_string();

    let mut markings = Vec::new();
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
        if fields.len() < 2 {
            return Err(malformed(format!("expected 2 fields, got {}", fields.len())));
        }
        let measure = fields[0]
            .trim()
            .parse::<u32>()
            .map_err(|_| malformed(format!("`{}` is not a measure number", fields[0])))?;
        let bpm = fields[1]
            .trim()
            .parse::<f64>()
            .map_err(|_| malformed(format!("`{}` is not a BPM value", fields[1])))?;
        markings.push((measure, bpm));
    }
    Ok(markings)
}
