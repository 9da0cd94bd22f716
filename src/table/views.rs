//! Derived views over the alignment table: tempo curves, measure
//! timestamps, and the annotation join.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::table::AlignmentTable;
use crate::window;
use regex::Regex;

/// Restriction on which annotation labels take part in the join.
#[derive(Debug, Clone)]
pub enum LabelFilter {
    /// Keep labels matching the pattern.
    Regex(Regex),
    /// Keep labels appearing verbatim in the list.
    AllowList(Vec<String>),
}

impl LabelFilter {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            LabelFilter::Regex(re) => re.is_match(label),
            LabelFilter::AllowList(allowed) => allowed.iter().any(|a| a == label),
        }
    }
}

/// An external annotation keyed on the nominal (written) score position.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub qstamp: f64,
    pub measure: u32,
    pub beat: f64,
    pub label: String,
}

/// An annotation joined with the table: the label plus one timestamp per
/// recording per physical playing of its position.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedAnnotation {
    pub annotation: Annotation,
    /// Expanded position of this playing.
    pub qstamp: f64,
    /// Parallel to the table's recording list.
    pub tstamps: Vec<Option<f64>>,
}

/// Read annotations from a CSV with header `qstamp,measure,beat,label`.
pub fn read_annotations<P: AsRef<Path>>(path: P) -> crate::Result<Vec<Annotation>> {
    let path_ref = path.as_ref();
    let file_name = path_ref.display().to_string();
    let reader = BufReader::new(std::fs::File::open(path_ref)?);

    let mut annotations = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line_no == 0 || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(4, ',').collect();
        if fields.len() < 4 {
            return Err(crate::Error::MalformedRow {
                file: file_name.clone(),
                line: line_no + 1,
                reason: "expected qstamp,measure,beat,label".into(),
            });
        }
        let malformed = |reason: String| crate::Error::MalformedRow {
            file: file_name.clone(),
            line: line_no + 1,
            reason,
        };
        annotations.push(Annotation {
            qstamp: fields[0]
                .trim()
                .parse()
                .map_err(|_| malformed(format!("unparseable qstamp `{}`", fields[0])))?,
            measure: fields[1]
                .trim()
                .parse()
                .map_err(|_| malformed(format!("unparseable measure `{}`", fields[1])))?,
            beat: fields[2]
                .trim()
                .parse()
                .map_err(|_| malformed(format!("unparseable beat `{}`", fields[2])))?,
            label: fields[3].trim().to_string(),
        });
    }
    Ok(annotations)
}

/// Join annotations with the table on the written score position.
///
/// An annotation in a repeated measure matches one table row per playing,
/// so it yields several output rows at distinct expanded qstamps.
pub fn join_annotations(
    table: &AlignmentTable,
    annotations: &[Annotation],
    filter: Option<&LabelFilter>,
) -> Vec<AlignedAnnotation> {
    let mut joined = Vec::new();
    for annotation in annotations {
        if let Some(f) = filter {
            if !f.matches(&annotation.label) {
                continue;
            }
        }
        for row in &table.rows {
            if (row.score_qstamp - annotation.qstamp).abs() < 1e-6 {
                joined.push(AlignedAnnotation {
                    annotation: annotation.clone(),
                    qstamp: row.qstamp,
                    tstamps: row.tstamps.clone(),
                });
            }
        }
    }
    joined
}

/// Write the annotation join as CSV.
pub fn write_aligned_annotations<P: AsRef<Path>>(
    path: P,
    table: &AlignmentTable,
    joined: &[AlignedAnnotation],
) -> crate::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = BufWriter::new(file);

    write!(w, "qstamp,score_qstamp,measure,beat,label")?;
    for id in &table.recordings {
        write!(w, ",{id}_tstamp")?;
    }
    writeln!(w)?;

    for row in joined {
        write!(
            w,
            "{},{},{},{},{}",
            row.qstamp,
            row.annotation.qstamp,
            row.annotation.measure,
            row.annotation.beat,
            row.annotation.label
        )?;
        for tstamp in &row.tstamps {
            match tstamp {
                Some(t) => write!(w, ",{t}")?,
                None => write!(w, ",")?,
            }
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Timestamps of measure downbeats (beat-1 rows) for one recording.
pub fn measure_timestamps(table: &AlignmentTable, id: &str) -> Vec<(u32, f64)> {
    let Some(col) = table.column(id) else {
        return Vec::new();
    };
    table
        .rows
        .iter()
        .zip(col)
        .filter(|(row, tstamp)| row.beat == 1.0 && tstamp.is_some())
        .map(|(row, tstamp)| (row.measure, tstamp.unwrap()))
        .collect()
}

/// Write one recording's downbeat timestamps as CSV.
pub fn write_measure_timestamps<P: AsRef<Path>>(
    path: P,
    timestamps: &[(u32, f64)],
) -> crate::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "measure,tstamp")?;
    for (measure, tstamp) in timestamps {
        writeln!(w, "{measure},{tstamp}")?;
    }
    w.flush()?;
    Ok(())
}

/// Local tempo curve for one recording: `(qstamp, quarter-note BPM)`
/// between consecutive table rows, smoothed by a normalised Hann window
/// of `window_points` rows.
///
/// Rows with a missing timestamp or a non-increasing time delta are
/// skipped rather than producing infinite tempi.
pub fn tempo_curve(table: &AlignmentTable, id: &str, window_points: usize) -> Vec<(f64, f64)> {
    let Some(col) = table.column(id) else {
        return Vec::new();
    };

    let mut raw: Vec<(f64, f64)> = Vec::new();
    for idx in 1..table.rows.len() {
        let (Some(t0), Some(t1)) = (col[idx - 1], col[idx]) else {
            continue;
        };
        let dq = table.rows[idx].qstamp - table.rows[idx - 1].qstamp;
        let dt = t1 - t0;
        if dq > 0.0 && dt > 1e-9 {
            raw.push((table.rows[idx - 1].qstamp, dq / dt * 60.0));
        }
    }

    if raw.len() < 2 || window_points < 2 {
        return raw;
    }

    let kernel = window::hann_normalized(window_points | 1);
    let half = kernel.len() / 2;
    let mut smoothed = Vec::with_capacity(raw.len());
    for idx in 0..raw.len() {
        let mut acc = 0.0f64;
        let mut weight = 0.0f64;
        for (k, &w) in kernel.iter().enumerate() {
            let j = idx as isize + k as isize - half as isize;
            if j >= 0 && (j as usize) < raw.len() {
                acc += w as f64 * raw[j as usize].1;
                weight += w as f64;
            }
        }
        smoothed.push((raw[idx].0, acc / weight));
    }
    smoothed
}

/// Write one recording's tempo curve as CSV.
pub fn write_tempo_curve<P: AsRef<Path>>(path: P, curve: &[(f64, f64)]) -> crate::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "qstamp,bpm")?;
    for (qstamp, bpm) in curve {
        writeln!(w, "{qstamp},{bpm:.4}")?;
    }
    w.flush()?;
    Ok(())
}
