//! Pressroom core: pure stage orchestrator and view-model helpers.
mod effect;
mod msg;
mod orchestrator;
mod stage;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use orchestrator::{Orchestrator, OrchestratorError, TickOutcome};
pub use stage::{
    PipelineKind, PipelineLayout, ProcessStage, StageDefinition, StageGroup, StageStatus,
    ADVANCED_AI, COPY_EDITING, EXTRACT, FORMAT_CONVERSION, PREP_PUBLISH, PROCESS, PUBLISH_NEWS,
    UPLOAD,
};
pub use state::{Metadata, Overall, OverallStatus, ProcessState, ProgressTick, TICK_LOG_LIMIT};
pub use update::{apply, update};
pub use view_model::{ProcessView, StageGroupView, StageRowView};
