// file: src/pipeline/mod.rs
// description: indexing progress and statistics exports
// reference: pipeline orchestration

mod progress;

pub use progress::{PipelineStats, ProgressDisplay, ProgressTracker};
