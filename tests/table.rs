//! Alignment-table integration tests, including the multi-recording merge.

use taktsync::batch::{align_batch, Recording};
use taktsync::config::AlignConfig;
use taktsync::io;
use taktsync::score::ExpandedEvent;
use taktsync::table::{join_annotations, Annotation, LabelFilter};

fn events() -> Vec<ExpandedEvent> {
    let pitches = [69u8, 71, 73, 74, 76, 74, 73, 71, 69, 71, 73, 74];
    pitches
        .iter()
        .enumerate()
        .map(|(idx, &pitch)| ExpandedEvent {
            score_qstamp: idx as f64,
            qstamp: idx as f64,
            tstamp: idx as f64 * 0.5,
            measure: (idx / 4) as u32 + 1,
            beat: (idx % 4) as f64 + 1.0,
            instrument: "Violin".into(),
            duration_quarter: 1.0,
            duration_secs: 0.5,
            pitch,
            velocity: 0.7,
        })
        .collect()
}

fn render(events: &[ExpandedEvent], sr: u32, lead_silence_secs: f64) -> Vec<f32> {
    let end = events
        .iter()
        .map(|e| e.tstamp + e.duration_secs)
        .fold(0.0f64, f64::max);
    let offset = (lead_silence_secs * sr as f64) as usize;
    let mut signal = vec![0.0f32; offset + ((end + 0.25) * sr as f64) as usize];
    for event in events {
        let freq = 440.0 * 2f32.powf((event.pitch as f32 - 69.0) / 12.0);
        let start = offset + (event.tstamp * sr as f64) as usize;
        let len = (event.duration_secs * sr as f64) as usize;
        for n in 0..len {
            if start + n < signal.len() {
                let t = n as f32 / sr as f32;
                signal[start + n] += 0.4 * (2.0 * std::f32::consts::PI * freq * t).sin();
            }
        }
    }
    signal
}

#[test]
fn two_crops_merge_with_their_own_offsets() {
    let cfg = AlignConfig::default();
    let score = events();

    // The same rendition twice: once bare, once embedded 2 s into a
    // longer file and cropped back out.
    let bare = render(&score, cfg.sample_rate, 0.0);
    let embedded = render(&score, cfg.sample_rate, 2.0);

    let bare_path = std::env::temp_dir().join("taktsync_it_bare.wav");
    let embedded_path = std::env::temp_dir().join("taktsync_it_embedded.wav");
    io::save_wav(&bare_path, &bare, cfg.sample_rate).unwrap();
    io::save_wav(&embedded_path, &embedded, cfg.sample_rate).unwrap();

    let recordings = vec![
        Recording::new("bare", bare_path.display().to_string()),
        Recording::new("cropped", embedded_path.display().to_string())
            .with_crop(Some(2.0), None),
    ];
    let report = align_batch(&score, &recordings, &cfg).unwrap();
    let _ = std::fs::remove_file(&bare_path);
    let _ = std::fs::remove_file(&embedded_path);

    assert!(report.failed.is_empty(), "failures: {:?}", report.failed);
    assert_eq!(report.table.recordings, vec!["bare", "cropped"]);

    // Per-recording timestamps differ by exactly the crop start: the
    // cropped waveform is sample-identical to the bare one.
    let bare_col = report.table.column("bare").unwrap();
    let cropped_col = report.table.column("cropped").unwrap();
    for (a, b) in bare_col.iter().zip(cropped_col.iter()) {
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!((b - a - 2.0).abs() < 1e-6, "bare {a}, cropped {b}");
    }
}

#[test]
fn final_table_has_no_duplicate_qstamps() {
    let cfg = AlignConfig::default();
    // Chords: several events share each qstamp.
    let mut score = events();
    let chord_partners: Vec<ExpandedEvent> = score
        .iter()
        .map(|e| {
            let mut third = e.clone();
            third.pitch += 4;
            third
        })
        .collect();
    score.extend(chord_partners);

    let signal = render(&score, cfg.sample_rate, 0.0);
    let path = std::env::temp_dir().join("taktsync_it_chords.wav");
    io::save_wav(&path, &signal, cfg.sample_rate).unwrap();

    let recordings = vec![Recording::new("rec", path.display().to_string())];
    let report = align_batch(&score, &recordings, &cfg).unwrap();
    let _ = std::fs::remove_file(&path);

    let qstamps: Vec<f64> = report.table.rows.iter().map(|r| r.qstamp).collect();
    for pair in qstamps.windows(2) {
        assert!(pair[1] > pair[0], "duplicate or unsorted qstamp: {pair:?}");
    }
}

#[test]
fn annotation_join_follows_repeats() {
    let cfg = AlignConfig::default();
    // Simulate a repeat: the first four events appear again at higher
    // qstamps with the same written positions.
    let mut score = events();
    let revisit: Vec<ExpandedEvent> = score[..4]
        .iter()
        .map(|e| {
            let mut again = e.clone();
            again.qstamp += 12.0;
            again.tstamp += 6.0;
            again
        })
        .collect();
    score.extend(revisit);

    let signal = render(&score, cfg.sample_rate, 0.0);
    let path = std::env::temp_dir().join("taktsync_it_repeat.wav");
    io::save_wav(&path, &signal, cfg.sample_rate).unwrap();
    let recordings = vec![Recording::new("rec", path.display().to_string())];
    let report = align_batch(&score, &recordings, &cfg).unwrap();
    let _ = std::fs::remove_file(&path);

    let annotations = vec![
        Annotation {
            qstamp: 0.0,
            measure: 1,
            beat: 1.0,
            label: "theme A".into(),
        },
        Annotation {
            qstamp: 4.0,
            measure: 2,
            beat: 1.0,
            label: "bridge".into(),
        },
    ];

    // The annotation at written position 0.0 plays twice.
    let joined = join_annotations(&report.table, &annotations, None);
    let theme_rows: Vec<_> = joined
        .iter()
        .filter(|j| j.annotation.label == "theme A")
        .collect();
    assert_eq!(theme_rows.len(), 2);
    assert!(theme_rows[1].qstamp > theme_rows[0].qstamp);

    // Filtering keeps column structure but drops labels.
    let filter = LabelFilter::AllowList(vec!["bridge".into()]);
    let filtered = join_annotations(&report.table, &annotations, Some(&filter));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].annotation.label, "bridge");
}
