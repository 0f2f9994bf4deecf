//! Page pipeline for sn2n.
//!
//! Ties conversion, auditing and marker resolution into [`convert_page`],
//! runs batches of pages concurrently, and hands results to a [`PageSink`]
//! through the two-phase [`commit`].

pub mod markers;
pub mod pipeline;
pub mod sink;

pub use markers::{Resolved, reattach, resolve};
pub use pipeline::{
    BatchSummary, PageConversion, PageInput, PipelineConfig, ProgressReporter, SilentProgress,
    convert_batch, convert_page,
};
pub use sink::{
    CommitOutcome, CommitPolicy, DirectorySink, PageSink, RemotePageId, commit,
    queue_for_reprocess,
};
