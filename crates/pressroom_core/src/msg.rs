use serde_json::Value;

use crate::{Metadata, PipelineKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A new run was requested for a file or a URL.
    Start {
        kind: PipelineKind,
        metadata: Metadata,
    },
    /// Progress tick from a stage handler or its timer.
    StageProgress {
        stage_id: String,
        percent: u8,
        message: Option<String>,
    },
    /// Stage handler finished its work.
    StageCompleted {
        stage_id: String,
        message: Option<String>,
    },
    /// Stage handler failed; the run keeps going unless the caller halts it.
    StageFailed { stage_id: String, message: String },
    /// Opaque payload produced by a stage.
    StageResult { stage_id: String, result: Value },
    /// Move on to the next pending stage.
    Advance,
    /// User asked to run a finished stage again.
    RestartStage { stage_id: String },
    /// Discard the current run.
    Reset,
}
