//! Symbolic score inputs and repeat expansion.
//!
//! Score parsing itself is an external collaborator's job: this module
//! consumes a flat table of note events ([`NoteEvent`]), a measure map
//! encoding the repeat/jump topology ([`MeasureMap`]), a per-measure tempo
//! map ([`TempoMap`]), and a time-signature map ([`TimeSigMap`]), and
//! produces the performance-order event table ([`ExpandedEvent`]).

mod events;
mod expand;
mod measure_map;
mod meter;
mod tempo;

pub use events::{read_note_events, NoteEvent};
pub use expand::{expand_score, ExpandedEvent};
pub use measure_map::{MeasureMap, MeasureMapEntry, END_SENTINEL};
pub use meter::{read_time_sigs, TimeSig, TimeSigMap};
pub use tempo::{read_tempo_markings, TempoMap, DEFAULT_QUARTER_BPM};
