pub mod pipeline;

#[cfg(any(test, feature = "test-stubs"))]
pub mod test_stubs;

pub use pipeline::{
    EditError, EditOutcome, EditPipeline, EditRequest, EditStage, FailureKind, PipelineOptions,
};
