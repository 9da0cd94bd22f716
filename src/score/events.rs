use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One sounding symbolic event: a note, or one pitch of a chord.
///
/// Produced once per parse of a score by an external parser and consumed
/// immutably by the measure-map expander. `beat` may be `NaN` when the
/// parser could not disambiguate it (multi-voice measures); the expander
/// recomputes it from the time-signature context in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// Quarter-note offset within the written score, repeats not expanded.
    pub score_qstamp: f64,
    /// Measure number, 1-based.
    pub measure: u32,
    /// 1-based beat position within the measure (`NaN` = unresolved).
    pub beat: f64,
    /// Instrument (part) name.
    pub instrument: String,
    /// Duration in quarter notes.
    pub duration_quarter: f64,
    /// MIDI note number.
    pub pitch: u8,
    /// Velocity in [0, 1].
    pub velocity: f64,
}

impl NoteEvent {
    /// Grace notes and other zero-duration events contribute no sustained
    /// energy and are excluded from score-side feature synthesis.
    pub fn is_grace(&self) -> bool {
        self.duration_quarter <= 0.0
    }
}

/// Read a note-event table from a CSV file.
///
/// Expected header:
/// `score_qstamp,measure,beat,instrument,duration_quarter,pitch,velocity`.
/// An empty `beat` field is kept as `NaN` for the expander to resolve.
///
/// # Errors
/// Returns [`crate::Error::MalformedRow`] for rows with missing or
/// unparseable fields, and I/O errors from opening the file.
pub fn read_note_events<P: AsRef<Path>>(path: P) -> crate::Result<Vec<NoteEvent>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let file_name = path.display().to_string();

    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Header row
        if line_no == 0 && trimmed.starts_with("score_qstamp") {
            continue;
        }

        let fields: Vec<&str> = trimmed.split(',').collect();
        if fields.len() < 7 {
            return Err(crate::Error::MalformedRow {
                file: file_name.clone(),
                line: line_no + 1,
                reason: format!("expected 7 fields, got {}", fields.len()),
            });
        }

        let parse_f64 = |idx: usize, name: &str| -> crate::Result<f64> {
            fields[idx].trim().parse::<f64>().map_err(|_| {
                crate::Error::MalformedRow {
                    file: file_name.clone(),
                    line: line_no + 1,
                    reason: format!("field `{name}`: `{}` is not a number", fields[idx]),
                }
            })
        };

        let pitch_raw = parse_f64(5, "pitch")?;
        if !(0.0..=127.0).contains(&pitch_raw) {
            return Err(crate::Error::MalformedRow {
                file: file_name.clone(),
                line: line_no + 1,
                reason: format!(
                    "field `pitch`: `{}` is outside the MIDI range 0..=127",
                    fields[5]
                ),
            });
        }

        let beat_field = fields[2].trim();
        let beat = if beat_field.is_empty() {
            f64::NAN
        } else {
            parse_f64(2, "beat")?
        };

        events.push(NoteEvent {
            score_qstamp: parse_f64(0, "score_qstamp")?,
            measure: fields[1].trim().parse::<u32>().map_err(|_| {
                crate::Error::MalformedRow {
                    file: file_name.clone(),
                    line: line_no + 1,
                    reason: format!("field `measure`: `{}` is not an integer", fields[1]),
                }
            })?,
            beat,
            instrument: fields[3].trim().to_string(),
            duration_quarter: parse_f64(4, "duration_quarter")?,
            pitch: pitch_raw as u8,
            velocity: parse_f64(6, "velocity")?,
        });
    }

    Ok(events)
}
