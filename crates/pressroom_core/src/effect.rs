use crate::{OrchestratorError, OverallStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// A stage became `processing`; its handler should run.
    RunStage { stage_id: String },
    /// No stage is left to run.
    RunFinished { run_id: String, status: OverallStatus },
    /// The run state was thrown away.
    Discarded { run_id: String },
    /// The message was refused; state is unchanged apart from the tick log.
    Rejected { error: OrchestratorError },
}
