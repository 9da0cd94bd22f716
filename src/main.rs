use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use taktsync::batch::{align_batch, Recording};
use taktsync::config::AlignConfig;
use taktsync::score::{
    expand_score, read_note_events, read_tempo_markings, read_time_sigs, MeasureMap, TempoMap,
    TimeSigMap,
};
use taktsync::table::{
    join_annotations, measure_timestamps, read_annotations, tempo_curve,
    write_aligned_annotations, write_measure_timestamps, write_tempo_curve, LabelFilter,
};

#[derive(Parser)]
#[command(name = "taktsync", version, about = "Align audio recordings to a symbolic score")]
struct Cli {
    /// Note-event table (CSV) produced by the score parser
    #[arg(long)]
    score: PathBuf,

    /// Measure map (JSON or CSV); defaults to the score's `<stem>.mm.json` sibling
    #[arg(long)]
    measure_map: Option<PathBuf>,

    /// Tempo markings CSV (measure,quarter_bpm)
    #[arg(long)]
    tempos: Option<PathBuf>,

    /// Time signatures CSV (measure,numerator,denominator); defaults to 4/4
    #[arg(long)]
    time_sigs: Option<PathBuf>,

    /// Recording as `id=path[,start[,end]]` with hh:mm:ss crop times; repeatable
    #[arg(long = "audio")]
    audio: Vec<String>,

    /// Tab-separated file of recordings: id, path, [start], [end]
    #[arg(long)]
    file_list: Option<PathBuf>,

    /// Annotations CSV (qstamp,measure,beat,label) to align
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Only join annotations whose label matches this regex
    #[arg(long, conflicts_with = "labels")]
    label_regex: Option<String>,

    /// Only join annotations with one of these labels (comma-separated)
    #[arg(long, value_delimiter = ',')]
    labels: Vec<String>,

    /// Output directory
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Parse an `hh:mm:ss` timestamp into seconds.
fn parse_hms(value: &str) -> taktsync::Result<f64> {
    let malformed = || taktsync::Error::MalformedTimestamp {
        value: value.to_string(),
    };
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 3 {
        return Err(malformed());
    }
    let hours: f64 = parts[0].trim().parse().map_err(|_| malformed())?;
    let minutes: f64 = parts[1].trim().parse().map_err(|_| malformed())?;
    let seconds: f64 = parts[2].trim().parse().map_err(|_| malformed())?;
    if !(0.0..60.0).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        return Err(malformed());
    }
    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse one `--audio id=path[,start[,end]]` argument.
fn parse_audio_arg(arg: &str) -> Result<Recording> {
    let (id, rest) = arg
        .split_once('=')
        .with_context(|| format!("`{arg}`: expected id=path[,start[,end]]"))?;
    let mut parts = rest.split(',');
    let path = parts
        .next()
        .filter(|p| !p.is_empty())
        .with_context(|| format!("`{arg}`: missing path"))?;
    let start = parts.next().map(parse_hms).transpose()?;
    let end = parts.next().map(parse_hms).transpose()?;
    Ok(Recording::new(id, path).with_crop(start, end))
}

/// Read a tab-separated recording list: id, path, optional start/end.
fn read_file_list(path: &Path) -> Result<Vec<Recording>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut recordings = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            bail!(
                "{}:{}: expected at least id and path separated by tabs",
                path.display(),
                line_no + 1
            );
        }
        let start = fields
            .get(2)
            .filter(|f| !f.trim().is_empty())
            .map(|f| parse_hms(f))
            .transpose()?;
        let end = fields
            .get(3)
            .filter(|f| !f.trim().is_empty())
            .map(|f| parse_hms(f))
            .transpose()?;
        recordings.push(Recording::new(fields[0].trim(), fields[1].trim()).with_crop(start, end));
    }
    Ok(recordings)
}

/// Resolve the measure map: explicit flag, or the score's `.mm.json` sibling.
fn resolve_measure_map(cli: &Cli) -> taktsync::Result<MeasureMap> {
    if let Some(path) = &cli.measure_map {
        return MeasureMap::from_file(path);
    }
    let sibling = cli.score.with_extension("mm.json");
    if !sibling.exists() {
        return Err(taktsync::Error::MissingSibling {
            kind: "measure map",
            score: cli.score.display().to_string(),
            expected: sibling.display().to_string(),
        });
    }
    MeasureMap::from_json_file(&sibling)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let cfg = AlignConfig::default();

    let events = read_note_events(&cli.score)
        .with_context(|| format!("reading note events from {}", cli.score.display()))?;
    if events.is_empty() {
        bail!("{} contains no note events", cli.score.display());
    }
    let map = resolve_measure_map(&cli).context("resolving the measure map")?;

    let max_measure = events.iter().map(|e| e.measure).max().unwrap_or(1);
    let tempos = match &cli.tempos {
        Some(path) => {
            let markings = read_tempo_markings(path)
                .with_context(|| format!("reading tempo markings from {}", path.display()))?;
            TempoMap::build(&markings, max_measure)
        }
        None => TempoMap::build(&[], max_measure),
    };
    let time_sigs = match &cli.time_sigs {
        Some(path) => {
            let entries = read_time_sigs(path)
                .with_context(|| format!("reading time signatures from {}", path.display()))?;
            TimeSigMap::build(&entries)
        }
        None => TimeSigMap::uniform(4, 4),
    };

    let expanded = expand_score(&events, &map, &tempos, &time_sigs, &cfg)
        .context("expanding the score into performance order")?;
    log::info!(
        "expanded {} events into {} performance-order rows",
        events.len(),
        expanded.len()
    );

    let mut recordings: Vec<Recording> = Vec::new();
    for arg in &cli.audio {
        recordings.push(parse_audio_arg(arg)?);
    }
    if let Some(list) = &cli.file_list {
        recordings.extend(read_file_list(list)?);
    }
    if recordings.is_empty() {
        bail!("no recordings given; use --audio or --file-list");
    }

    let report = align_batch(&expanded, &recordings, &cfg).context("batch alignment")?;
    for (id, alignment) in &report.alignments {
        println!(
            "{id}: ok (tuning {:+.1} cents, chroma shift {})",
            alignment.tuning_cents, alignment.chroma_shift
        );
    }
    for (id, message) in &report.failed {
        println!("{id}: FAILED ({message})");
    }

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    let stem = cli
        .score
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "score".to_string());

    let table_path = cli.out_dir.join(format!("{stem}_alignment.csv"));
    report.table.write_csv(&table_path)?;
    println!("wrote {}", table_path.display());

    for (id, _) in &report.alignments {
        let downbeats = measure_timestamps(&report.table, id);
        let path = cli.out_dir.join(format!("{id}_measure_tstamps.csv"));
        write_measure_timestamps(&path, &downbeats)?;

        let curve = tempo_curve(&report.table, id, 9);
        let path = cli.out_dir.join(format!("{id}_tempo_curve.csv"));
        write_tempo_curve(&path, &curve)?;
    }

    if let Some(annotations_path) = &cli.annotations {
        let annotations = read_annotations(annotations_path)
            .with_context(|| format!("reading annotations from {}", annotations_path.display()))?;
        let filter = if let Some(pattern) = &cli.label_regex {
            Some(LabelFilter::Regex(
                regex::Regex::new(pattern).context("invalid --label-regex")?,
            ))
        } else if !cli.labels.is_empty() {
            Some(LabelFilter::AllowList(cli.labels.clone()))
        } else {
            None
        };
        let joined = join_annotations(&report.table, &annotations, filter.as_ref());
        let annotations_stem = annotations_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "annotations".to_string());
        let path = cli.out_dir.join(format!("{annotations_stem}_aligned.csv"));
        write_aligned_annotations(&path, &report.table, &joined)?;
        println!("wrote {}", path.display());
    }

    if !report.failed.is_empty() {
        bail!("{} of {} recordings failed", report.failed.len(), recordings.len());
    }
    Ok(())
}
