//! Building and serialising the wide alignment table.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::align::{Alignment, Interp1d};
use crate::config::AlignConfig;
use crate::score::ExpandedEvent;

/// One row of the alignment table: a deduplicated score position plus one
/// optional timestamp per recording.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub qstamp: f64,
    pub score_qstamp: f64,
    pub measure: u32,
    pub beat: f64,
    /// Nominal score time including the deliberate score-timeline offset;
    /// used for interpolation, never serialised.
    score_tstamp: f64,
    /// Parallel to [`AlignmentTable::recordings`].
    pub tstamps: Vec<Option<f64>>,
}

/// The wide alignment table: one row per distinct `qstamp`, one timestamp
/// column per recording.
#[derive(Debug, Clone)]
pub struct AlignmentTable {
    pub rows: Vec<TableRow>,
    pub recordings: Vec<String>,
    feature_rate: u32,
}

/// Shift every event's performance time by `offset_secs`.
///
/// The same offset must be applied to the events used for score feature
/// synthesis and to the table rows, otherwise interpolated timestamps
/// drift by the offset. Keeping 0.0 off the score timeline means the
/// first real event is never pinned to the DTW boundary cell.
pub fn offset_score_events(events: &[ExpandedEvent], offset_secs: f64) -> Vec<ExpandedEvent> {
    events
        .iter()
        .map(|e| {
            let mut shifted = e.clone();
            shifted.tstamp += offset_secs;
            shifted
        })
        .collect()
}

impl AlignmentTable {
    /// Build the score-side skeleton from expanded events: one row per
    /// distinct `qstamp`, in increasing order, with no recording columns
    /// yet.
    ///
    /// # Errors
    /// [`crate::Error::InconsistentBeat`] if one `qstamp` carries two
    /// distinct `(measure, beat)` positions.
    pub fn build(expanded: &[ExpandedEvent], cfg: &AlignConfig) -> crate::Result<Self> {
        let mut sorted: Vec<&ExpandedEvent> = expanded.iter().collect();
        sorted.sort_by(|a, b| {
            a.qstamp
                .partial_cmp(&b.qstamp)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut rows: Vec<TableRow> = Vec::new();
        for event in sorted {
            match rows.last() {
                Some(last) if last.qstamp == event.qstamp => {
                    if last.measure != event.measure || last.beat != event.beat {
                        return Err(crate::Error::InconsistentBeat {
                            qstamp: event.qstamp,
                            measure_a: last.measure,
                            beat_a: last.beat,
                            measure_b: event.measure,
                            beat_b: event.beat,
                        });
                    }
                }
                _ => rows.push(TableRow {
                    qstamp: event.qstamp,
                    score_qstamp: event.score_qstamp,
                    measure: event.measure,
                    beat: event.beat,
                    score_tstamp: event.tstamp + cfg.score_offset_secs,
                    tstamps: Vec::new(),
                }),
            }
        }

        Ok(Self {
            rows,
            recordings: Vec::new(),
            feature_rate: cfg.feature_rate,
        })
    }

    /// Interpolate every row's performance timestamp for one recording
    /// through its warping path and append the column.
    ///
    /// `crop_start_secs` is the recording's crop start: timestamps are
    /// reported on the original file's timeline, not the cropped one.
    ///
    /// # Errors
    /// [`crate::Error::PathTooShort`] if the path has fewer than two
    /// usable points.
    pub fn add_recording(
        &mut self,
        id: &str,
        alignment: &Alignment,
        crop_start_secs: f64,
        cfg: &AlignConfig,
    ) -> crate::Result<()> {
        let interp = Interp1d::from_path(&alignment.path)?;
        let rate = self.feature_rate as f64;

        for row in &mut self.rows {
            let score_frame = row.score_tstamp * rate;
            let audio_frame = interp.eval(score_frame);
            let tstamp = cfg.round(audio_frame / rate + crop_start_secs);
            row.tstamps.push(Some(tstamp));
        }
        self.recordings.push(id.to_string());
        Ok(())
    }

    /// Append an all-empty column for a recording that failed to align,
    /// keeping the table's column set stable across partial batches.
    pub fn add_failed_recording(&mut self, id: &str) {
        for row in &mut self.rows {
            row.tstamps.push(None);
        }
        self.recordings.push(id.to_string());
    }

    /// Timestamp column for one recording, if present.
    pub fn column(&self, id: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.recordings.iter().position(|r| r == id)?;
        Some(self.rows.iter().map(|row| row.tstamps[idx]).collect())
    }

    /// Write the table as CSV with one `{id}_tstamp` column per recording.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut w = BufWriter::new(file);

        write!(w, "score_qstamp,qstamp,measure,beat")?;
        for id in &self.recordings {
            write!(w, ",{id}_tstamp")?;
        }
        writeln!(w)?;

        for row in &self.rows {
            write!(
                w,
                "{},{},{},{}",
                row.score_qstamp, row.qstamp, row.measure, row.beat
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

    /// Read a table previously written by [`write_csv`](Self::write_csv).
    /// Recording ids are recovered from the `{id}_tstamp` header columns.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path_ref = path.as_ref();
        let file_name = path_ref.display().to_string();
        let reader = BufReader::new(std::fs::File::open(path_ref)?);
        let mut lines = reader.lines();

        let header = lines.next().transpose()?.ok_or(crate::Error::MalformedRow {
            file: file_name.clone(),
            line: 1,
            reason: "empty file".into(),
        })?;
        let columns: Vec<&str> = header.split(',').collect();
        if columns.len() < 4 || columns[..4] != ["score_qstamp", "qstamp", "measure", "beat"] {
            return Err(crate::Error::MalformedRow {
                file: file_name,
                line: 1,
                reason: format!("unexpected header `{header}`"),
            });
        }
        let recordings: Vec<String> = columns[4..]
            .iter()
            .map(|c| c.trim_end_matches("_tstamp").to_string())
            .collect();

        let mut rows = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 4 + recordings.len() {
                return Err(crate::Error::MalformedRow {
                    file: file_name.clone(),
                    line: line_no + 2,
                    reason: format!("expected {} fields, got {}", 4 + recordings.len(), fields.len()),
                });
            }
            let parse_f64 = |s: &str, name: &'static str| -> crate::Result<f64> {
                s.trim().parse().map_err(|_| crate::Error::MalformedRow {
                    file: file_name.clone(),
                    line: line_no + 2,
                    reason: format!("unparseable {name} `{s}`"),
                })
            };
            let score_qstamp = parse_f64(fields[0], "score_qstamp")?;
            let qstamp = parse_f64(fields[1], "qstamp")?;
            let measure = fields[2]
                .trim()
                .parse()
                .map_err(|_| crate::Error::MalformedRow {
                    file: file_name.clone(),
                    line: line_no + 2,
                    reason: format!("unparseable measure `{}`", fields[2]),
                })?;
            let beat = parse_f64(fields[3], "beat")?;
            let mut tstamps = Vec::with_capacity(recordings.len());
            for field in &fields[4..] {
                if field.trim().is_empty() {
                    tstamps.push(None);
                } else {
                    tstamps.push(Some(parse_f64(field, "tstamp")?));
                }
            }
            rows.push(TableRow {
                qstamp,
                score_qstamp,
                measure,
                beat,
                score_tstamp: 0.0,
                tstamps,
            });
        }

        Ok(Self {
            rows,
            recordings,
            feature_rate: AlignConfig::default().feature_rate,
        })
    }
}
