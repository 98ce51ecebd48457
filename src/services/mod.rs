//! Service layer for reqvector business logic.
//!
//! This module contains domain logic separated from UI concerns.
//! Services report progress through events and return plain results.

pub mod annotate;
pub mod repair;
pub mod split;

pub use annotate::{
    default_output_path, resolve_output_cursor, AnnotationEvent, AnnotationResult,
    AnnotationService, BatchOutcome, CheckpointStore, PipelineError, RunOptions, XlsxCheckpoint,
    VECTOR_COLUMN,
};
pub use repair::{parse_and_repair, strip_code_fence, RepairDiagnostic, RepairOutcome};
pub use split::{
    expand_last_column, forward_fill, split_file, split_knowledge_points, SplitSummary,
    DEFAULT_SPLIT_INPUT, DEFAULT_SPLIT_OUTPUT, KNOWLEDGE_POINT_DELIMITER,
};
