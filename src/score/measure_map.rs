use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// The `next` id marking the end of the piece.
pub const END_SENTINEL: i32 = -1;

/// One node in the performance-order graph of measures.
///
/// `next` lists the successors in playing order. More than one successor
/// marks a choice point (repeat-then-continue): the walk takes the first
/// successor and consumes it, so the second pass through the same measure
/// continues with the remaining entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MeasureMapEntry {
    #[serde(rename = "ID")]
    pub id: i32,
    pub next: Vec<i32>,
}

/// The repeat/jump topology of a score, as an explicit adjacency structure.
///
/// The map may be compressed: measures where `next = [id + 1]` (plain
/// linear continuation) need not be materialized, and the walk defaults to
/// `id + 1` when an id has no entry.
#[derive(Debug, Clone)]
pub struct MeasureMap {
    entries: Vec<MeasureMapEntry>,
}

impl MeasureMap {
    pub fn from_entries(entries: Vec<MeasureMapEntry>) -> Self {
        Self { entries }
    }

    /// Load a measure map from its JSON form: `[{"ID": 1, "next": [2]}, ...]`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = File::open(path)?;
        let entries: Vec<MeasureMapEntry> = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self { entries })
    }

    /// Load a measure map from its tabular form: header `ID,next`, with the
    /// successor list written as `[2]`, `[1; -1]`, or a bare integer.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_name = path.display().to_string();
        let mut entries = Vec::new();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || (line_no == 0 && trimmed.starts_with("ID")) {
                continue;
            }
            let (id_part, next_part) =
                trimmed
                    .split_once(',')
                    .ok_or_else(|| crate::Error::MalformedRow {
                        file: file_name.clone(),
                        line: line_no + 1,
                        reason: "expected `ID,next`".into(),
                    })?;
            let id = id_part
                .trim()
                .parse::<i32>()
                .map_err(|_| crate::Error::MalformedRow {
                    file: file_name.clone(),
                    line: line_no + 1,
                    reason: format!("`{id_part}` is not an integer id"),
                })?;
            let next = parse_next_list(next_part).ok_or_else(|| crate::Error::MalformedRow {
                file: file_name.clone(),
                line: line_no + 1,
                reason: format!("`{next_part}` is not a successor list"),
            })?;
            entries.push(MeasureMapEntry { id, next });
        }

        Ok(Self { entries })
    }

    /// Load from JSON or CSV based on the file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_csv_file(path),
        }
    }

    pub fn entries(&self) -> &[MeasureMapEntry] {
        &self.entries
    }

    /// Largest measure id mentioned in the map, as a sizing hint.
    pub fn max_measure_hint(&self) -> u32 {
        self.entries
            .iter()
            .flat_map(|e| e.next.iter().copied().chain(std::iter::once(e.id)))
            .filter(|&id| id > 0)
            .max()
            .unwrap_or(1) as u32
    }

    /// Walk the graph from the starting id to the end sentinel and return
    /// the ordered list of measure ids in performance order. A measure id
    /// appears once per physical playing, so repeated measures repeat here.
    ///
    /// The walk is bounded: every visit either consumes a branch entry or
    /// follows a single successor, so a map whose sentinel is unreachable
    /// fails with [`crate::Error::UnreachableSentinel`] instead of looping.
    pub fn performance_order(&self) -> crate::Result<Vec<u32>> {
        let first = self.entries.first().ok_or(crate::Error::EmptyMeasureMap)?;

        let mut adjacency: HashMap<i32, Vec<i32>> = HashMap::with_capacity(self.entries.len());
        let mut total_branches = 0usize;
        for entry in &self.entries {
            total_branches += entry.next.len();
            adjacency.insert(entry.id, entry.next.clone());
        }

        // Each branch entry can be consumed at most once, and between
        // consumptions the walk is a function of the current id, so it can
        // visit at most every id once per remaining branch.
        let span = self.max_measure_hint() as usize + 1;
        let limit = span * (total_branches + 2);

        let mut order = Vec::new();
        let mut curr = first.id;
        let mut steps = 0usize;
        while curr != END_SENTINEL {
            steps += 1;
            if steps > limit {
                return Err(crate::Error::UnreachableSentinel { steps: limit });
            }
            if curr <= 0 {
                return Err(crate::Error::InvalidParameter {
                    name: "measure_id",
                    value: curr.to_string(),
                    reason: "measure ids must be positive".into(),
                });
            }
            order.push(curr as u32);

            curr = match adjacency.get_mut(&curr) {
                // Compressed map: no entry means linear continuation.
                None => curr + 1,
                Some(next) => match next.len() {
                    0 => curr + 1,
                    1 => next[0],
                    // Choice point: take and consume the first successor.
                    _ => next.remove(0),
                },
            };
        }

        Ok(order)
    }
}

fn parse_next_list(raw: &str) -> Option<Vec<i32>> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let mut next = Vec::new();
    for part in inner.split([';', ' ']) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        next.push(part.parse::<i32>().ok()?);
    }
    if next.is_empty() {
        return None;
    }
    Some(next)
}
