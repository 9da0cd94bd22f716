//! The wide alignment table and its derived views.

mod builder;
mod views;

pub use builder::{offset_score_events, AlignmentTable, TableRow};
pub use views::{
    join_annotations, measure_timestamps, read_annotations, tempo_curve,
    write_aligned_annotations, write_measure_timestamps, write_tempo_curve, AlignedAnnotation,
    Annotation, LabelFilter,
};
