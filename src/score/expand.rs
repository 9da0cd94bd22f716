use std::collections::BTreeMap;

use crate::config::AlignConfig;
use crate::score::{MeasureMap, NoteEvent, TempoMap, TimeSigMap};

/// A [`NoteEvent`] stamped with its performance-order position.
///
/// One input event yields one `ExpandedEvent` per physical playing of its
/// measure, so `score_qstamp` repeats while `qstamp`/`tstamp` are distinct
/// and increasing across repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedEvent {
    /// Quarter-note offset in the written score (repeats not expanded).
    pub score_qstamp: f64,
    /// Quarter-note offset with repeats expanded.
    pub qstamp: f64,
    /// Seconds offset with repeats expanded, under the tempo map.
    pub tstamp: f64,
    pub measure: u32,
    pub beat: f64,
    pub instrument: String,
    pub duration_quarter: f64,
    /// Duration in seconds under the tempo in effect at the measure.
    pub duration_secs: f64,
    pub pitch: u8,
    pub velocity: f64,
}

/// Running accumulator for the expansion fold: the expanded position of
/// the *start* of the measure currently being visited.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    qstamp: f64,
    tstamp: f64,
}

/// Expand a note-event table into performance order.
///
/// Walks the measure map to obtain the visitation order, then folds over
/// the visited measures carrying an explicit `(qstamp, tstamp)` cursor.
/// Within a measure, an event's expanded position is the cursor plus the
/// event's offset from the measure's nominal start, scaled by the measure's
/// quarter-note length for `tstamp`. After each visited measure the cursor
/// advances to the measure's nominal end boundary, so an unused remainder
/// of a measure cannot desynchronize the following measure's start.
///
/// All emitted floats are rounded to the configured precision.
///
/// # Errors
/// - [`crate::Error::MissingTimeSignature`] if a visited measure has no
///   resolvable signature.
/// - Graph-walk errors from [`MeasureMap::performance_order`].
pub fn expand_score(
    events: &[NoteEvent],
    map: &MeasureMap,
    tempos: &TempoMap,
    time_sigs: &TimeSigMap,
    cfg: &AlignConfig,
) -> crate::Result<Vec<ExpandedEvent>> {
    let order = map.performance_order()?;
    let max_measure = order
        .iter()
        .copied()
        .max()
        .max(events.iter().map(|e| e.measure).max())
        .unwrap_or(1);
    let starts = time_sigs.measure_starts(max_measure)?;

    // Group event indices by measure, each group sorted by score_qstamp.
    let mut by_measure: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, event) in events.iter().enumerate() {
        by_measure.entry(event.measure).or_default().push(idx);
    }
    for group in by_measure.values_mut() {
        group.sort_by(|&a, &b| {
            events[a]
                .score_qstamp
                .partial_cmp(&events[b].score_qstamp)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let mut expanded = Vec::new();
    let mut cursor = Cursor {
        qstamp: 0.0,
        tstamp: 0.0,
    };

    for &measure in &order {
        let sig = time_sigs.sig_at(measure)?;
        let quarter_secs = tempos.quarter_secs_at(measure);
        let measure_start = starts[(measure - 1) as usize];
        let bar_quarters = sig.bar_quarters();

        if let Some(indices) = by_measure.get(&measure) {
            for &idx in indices {
                let event = &events[idx];
                let rel = event.score_qstamp - measure_start;
                if rel < 0.0 {
                    return Err(crate::Error::InvalidParameter {
                        name: "score_qstamp",
                        value: event.score_qstamp.to_string(),
                        reason: format!(
                            "precedes the nominal start ({measure_start}) of measure {measure}"
                        ),
                    });
                }

                let beat = if event.beat.is_nan() {
                    // Manual fallback when the parser left the beat
                    // ambiguous (multi-voice measures).
                    1.0 + rel / sig.beat_quarters()
                } else {
                    event.beat
                };

                expanded.push(ExpandedEvent {
                    score_qstamp: cfg.round(event.score_qstamp),
                    qstamp: cfg.round(cursor.qstamp + rel),
                    tstamp: cfg.round(cursor.tstamp + rel * quarter_secs),
                    measure,
                    beat: cfg.round(beat),
                    instrument: event.instrument.clone(),
                    duration_quarter: cfg.round(event.duration_quarter),
                    duration_secs: cfg.round(event.duration_quarter * quarter_secs),
                    pitch: event.pitch,
                    velocity: cfg.round(event.velocity),
                });
            }
        }

        // Advance to the measure's nominal end boundary.
        cursor.qstamp += bar_quarters;
        cursor.tstamp += bar_quarters * quarter_secs;
    }

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{MeasureMapEntry, END_SENTINEL};

    fn note(score_qstamp: f64, measure: u32, beat: f64, pitch: u8) -> NoteEvent {
        NoteEvent {
            score_qstamp,
            measure,
            beat,
            instrument: "Violin".into(),
            duration_quarter: 1.0,
            pitch,
            velocity: 0.7,
        }
    }

    fn linear_map(n: i32) -> MeasureMap {
        let mut entries: Vec<MeasureMapEntry> = (1..n)
            .map(|id| MeasureMapEntry {
                id,
                next: vec![id + 1],
            })
            .collect();
        entries.push(MeasureMapEntry {
            id: n,
            next: vec![END_SENTINEL],
        });
        MeasureMap::from_entries(entries)
    }

    #[test]
    fn test_no_repeats_is_identity() {
        // With nothing to expand, qstamp == score_qstamp for every event.
        let events = vec![
            note(0.0, 1, 1.0, 60),
            note(2.0, 1, 3.0, 62),
            note(4.0, 2, 1.0, 64),
            note(7.0, 2, 4.0, 65),
        ];
        let cfg = AlignConfig::default();
        let expanded = expand_score(
            &events,
            &linear_map(2),
            &TempoMap::build(&[], 2),
            &TimeSigMap::uniform(4, 4),
            &cfg,
        )
        .unwrap();
        assert_eq!(expanded.len(), 4);
        for ev in &expanded {
            assert_eq!(ev.qstamp, ev.score_qstamp);
        }
        // 120 BPM: one quarter is 0.5 s.
        assert_eq!(expanded[1].tstamp, 1.0);
        assert_eq!(expanded[3].tstamp, 3.5);
    }

    #[test]
    fn test_repeat_duplicates_events() {
        // 2 measures in 4/4 at 120 BPM, measure 2 repeats
        // once then ends; performance order is [1, 2, 1, 2].
        let events = vec![note(0.0, 1, 1.0, 60), note(4.0, 2, 1.0, 64)];
        let map = MeasureMap::from_entries(vec![
            MeasureMapEntry {
                id: 1,
                next: vec![2],
            },
            MeasureMapEntry {
                id: 2,
                next: vec![1, END_SENTINEL],
            },
        ]);
        let cfg = AlignConfig::default();
        let expanded = expand_score(
            &events,
            &map,
            &TempoMap::build(&[], 2),
            &TimeSigMap::uniform(4, 4),
            &cfg,
        )
        .unwrap();

        // Each event appears twice.
        assert_eq!(expanded.len(), 4);
        let m2: Vec<&ExpandedEvent> = expanded.iter().filter(|e| e.measure == 2).collect();
        assert_eq!(m2.len(), 2);
        assert_eq!(m2[0].score_qstamp, 4.0);
        assert_eq!(m2[1].score_qstamp, 4.0);
        assert_eq!(m2[0].qstamp, 4.0);
        assert_eq!(m2[1].qstamp, 12.0);
        assert!(m2[1].tstamp > m2[0].tstamp);
        assert_eq!(m2[0].tstamp, 2.0);
        assert_eq!(m2[1].tstamp, 6.0);
    }

    #[test]
    fn test_qstamp_monotonic_across_visits() {
        let events = vec![
            note(0.0, 1, 1.0, 60),
            note(2.0, 1, 3.0, 62),
            note(4.0, 2, 1.0, 64),
        ];
        let map = MeasureMap::from_entries(vec![
            MeasureMapEntry {
                id: 1,
                next: vec![2],
            },
            MeasureMapEntry {
                id: 2,
                next: vec![1, END_SENTINEL],
            },
        ]);
        let cfg = AlignConfig::default();
        let expanded = expand_score(
            &events,
            &map,
            &TempoMap::build(&[], 2),
            &TimeSigMap::uniform(4, 4),
            &cfg,
        )
        .unwrap();

        for pair in expanded.windows(2) {
            assert!(pair[1].qstamp >= pair[0].qstamp);
        }
        // Second visit of measure 1 strictly after everything in the first.
        let first_visit_max = expanded[..3].iter().map(|e| e.qstamp).fold(0.0, f64::max);
        for ev in &expanded[3..] {
            assert!(ev.qstamp > first_visit_max);
        }
    }

    #[test]
    fn test_tempo_change_scales_tstamp() {
        let events = vec![note(0.0, 1, 1.0, 60), note(4.0, 2, 1.0, 64)];
        let cfg = AlignConfig::default();
        // Measure 2 at 60 BPM: quarters last a full second there.
        let expanded = expand_score(
            &events,
            &linear_map(2),
            &TempoMap::build(&[(1, 120.0), (2, 60.0)], 2),
            &TimeSigMap::uniform(4, 4),
            &cfg,
        )
        .unwrap();
        assert_eq!(expanded[0].tstamp, 0.0);
        assert_eq!(expanded[1].tstamp, 2.0);
        assert_eq!(expanded[1].duration_secs, 1.0);
    }

    #[test]
    fn test_beat_fallback() {
        let mut ev = note(6.0, 2, f64::NAN, 64);
        ev.duration_quarter = 0.5;
        let cfg = AlignConfig::default();
        let expanded = expand_score(
            &[ev],
            &linear_map(2),
            &TempoMap::build(&[], 2),
            &TimeSigMap::uniform(4, 4),
            &cfg,
        )
        .unwrap();
        // Offset 2.0 quarters into measure 2 with quarter-note beats.
        assert_eq!(expanded[0].beat, 3.0);
    }

    #[test]
    fn test_missing_time_signature_is_fatal() {
        let events = vec![note(0.0, 1, 1.0, 60)];
        let cfg = AlignConfig::default();
        let err = expand_score(
            &events,
            &linear_map(2),
            &TempoMap::build(&[], 2),
            &TimeSigMap::build(&[]),
            &cfg,
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::MissingTimeSignature { .. }));
    }

    #[test]
    fn test_empty_remainder_keeps_next_measure_in_sync() {
        // Measure 1 has a single note on beat 1 and nothing else; measure 2
        // must still start on the nominal boundary.
        let events = vec![note(0.0, 1, 1.0, 60), note(3.0, 2, 1.0, 64)];
        let cfg = AlignConfig::default();
        let expanded = expand_score(
            &events,
            &linear_map(2),
            &TempoMap::build(&[], 2),
            &TimeSigMap::uniform(3, 4),
            &cfg,
        )
        .unwrap();
        assert_eq!(expanded[1].qstamp, 3.0);
        assert_eq!(expanded[1].tstamp, 1.5);
    }
}
