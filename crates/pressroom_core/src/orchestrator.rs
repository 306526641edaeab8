use serde_json::Value;
use thiserror::Error;

use crate::stage::{PipelineKind, PipelineLayout, StageStatus};
use crate::state::{Metadata, OverallStatus, ProcessState, ProgressTick};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("no pipeline run is active")]
    NoActiveRun,
    #[error("unknown stage `{0}`")]
    UnknownStage(String),
    #[error("stage `{stage_id}` cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        stage_id: String,
        from: StageStatus,
        to: StageStatus,
    },
    #[error("stage `{active}` is still processing")]
    StageBusy { active: String },
    #[error("pipeline layout for {0:?} has no stages")]
    EmptyLayout(PipelineKind),
}

/// Whether a progress tick changed the stage it targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied,
    Ignored,
}

/// Owner of the single in-memory `ProcessState`.
#[derive(Debug, Clone, PartialEq)]
pub struct Orchestrator {
    file_layout: PipelineLayout,
    url_layout: PipelineLayout,
    state: Option<ProcessState>,
    run_seq: u64,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            file_layout: PipelineLayout::for_kind(PipelineKind::File),
            url_layout: PipelineLayout::for_kind(PipelineKind::Url),
            state: None,
            run_seq: 0,
        }
    }

    pub fn with_layout(mut self, kind: PipelineKind, layout: PipelineLayout) -> Self {
        match kind {
            PipelineKind::File => self.file_layout = layout,
            PipelineKind::Url => self.url_layout = layout,
        }
        self
    }

    pub fn layout(&self, kind: PipelineKind) -> &PipelineLayout {
        match kind {
            PipelineKind::File => &self.file_layout,
            PipelineKind::Url => &self.url_layout,
        }
    }

    pub fn state(&self) -> Option<&ProcessState> {
        self.state.as_ref()
    }

    fn state_mut(&mut self) -> Result<&mut ProcessState, OrchestratorError> {
        self.state.as_mut().ok_or(OrchestratorError::NoActiveRun)
    }

    /// Creates a fresh run with the first stage processing. Any previous run is discarded.
    pub fn start(
        &mut self,
        kind: PipelineKind,
        metadata: Metadata,
    ) -> Result<&ProcessState, OrchestratorError> {
        if self.layout(kind).stages.is_empty() {
            return Err(OrchestratorError::EmptyLayout(kind));
        }
        self.run_seq += 1;
        let id = format!("{}-{}", kind.as_str(), self.run_seq);
        let state = ProcessState::new(id, kind, self.layout(kind), metadata);
        Ok(self.state.insert(state))
    }

    /// Ticks for a stage that is not processing are recorded but change nothing.
    pub fn update_stage_progress(
        &mut self,
        stage_id: &str,
        percent: u8,
        message: Option<String>,
    ) -> Result<TickOutcome, OrchestratorError> {
        let state = self.state_mut()?;
        let percent = percent.min(100);
        let stage = state
            .stage_mut(stage_id)
            .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.to_string()))?;

        let applied = stage.is_active();
        if applied {
            stage.progress = stage.progress.max(percent);
            if message.is_some() {
                stage.message = message.clone();
            }
        }
        state.record_tick(ProgressTick {
            stage_id: stage_id.to_string(),
            percent,
            message,
            applied,
        });
        if !applied {
            return Ok(TickOutcome::Ignored);
        }
        state.recompute_progress();
        Ok(TickOutcome::Applied)
    }

    pub fn complete_stage(
        &mut self,
        stage_id: &str,
        message: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let state = self.state_mut()?;
        let stage = state
            .stage_mut(stage_id)
            .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.to_string()))?;
        if stage.status != StageStatus::Processing {
            return Err(OrchestratorError::InvalidTransition {
                stage_id: stage_id.to_string(),
                from: stage.status,
                to: StageStatus::Completed,
            });
        }
        stage.status = StageStatus::Completed;
        stage.progress = 100;
        if message.is_some() {
            stage.message = message;
        }
        if !state.has_remaining_work() {
            state.overall.status = OverallStatus::Completed;
        }
        state.recompute_progress();
        Ok(())
    }

    /// Marks the stage failed without aborting the run; callers may still advance.
    pub fn set_stage_error(
        &mut self,
        stage_id: &str,
        message: impl Into<String>,
    ) -> Result<(), OrchestratorError> {
        let state = self.state_mut()?;
        let stage = state
            .stage_mut(stage_id)
            .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.to_string()))?;
        if stage.status != StageStatus::Processing {
            return Err(OrchestratorError::InvalidTransition {
                stage_id: stage_id.to_string(),
                from: stage.status,
                to: StageStatus::Error,
            });
        }
        stage.status = StageStatus::Error;
        stage.message = Some(message.into());
        state.overall.status = OverallStatus::Error;
        state.recompute_progress();
        Ok(())
    }

    /// Advances to the next pending stage. Returns its id, or `None` once the run is complete.
    pub fn move_to_next_stage(&mut self) -> Result<Option<String>, OrchestratorError> {
        let state = self.state_mut()?;
        let current = state
            .stages
            .iter()
            .position(|s| s.id == state.current_stage_id);

        if let Some(idx) = current {
            let stage = &mut state.stages[idx];
            if stage.status == StageStatus::Processing {
                stage.status = StageStatus::Completed;
                stage.progress = 100;
            }
        }
        if let Some(active) = state.active_stage() {
            return Err(OrchestratorError::StageBusy {
                active: active.id.clone(),
            });
        }

        let from = current.map_or(0, |idx| idx + 1);
        let next = state
            .stages
            .iter()
            .skip(from)
            .position(|s| s.status == StageStatus::Pending)
            .map(|offset| from + offset);

        let moved_to = match next {
            Some(idx) => {
                let stage = &mut state.stages[idx];
                stage.status = StageStatus::Processing;
                state.current_stage_id = stage.id.clone();
                Some(stage.id.clone())
            }
            None => {
                state.overall.status = OverallStatus::Completed;
                None
            }
        };
        state.recompute_progress();
        Ok(moved_to)
    }

    /// Manual re-entry of a finished stage, e.g. a retry requested from the UI.
    pub fn restart_stage(&mut self, stage_id: &str) -> Result<(), OrchestratorError> {
        let state = self.state_mut()?;
        if let Some(active) = state.active_stage() {
            return Err(OrchestratorError::StageBusy {
                active: active.id.clone(),
            });
        }
        let stage = state
            .stage_mut(stage_id)
            .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.to_string()))?;
        if !stage.status.is_terminal() {
            return Err(OrchestratorError::InvalidTransition {
                stage_id: stage_id.to_string(),
                from: stage.status,
                to: StageStatus::Processing,
            });
        }
        stage.status = StageStatus::Processing;
        stage.message = None;
        state.current_stage_id = stage_id.to_string();
        state.overall.status = if state.failed_stages().is_empty() {
            OverallStatus::Processing
        } else {
            OverallStatus::Error
        };
        state.recompute_progress();
        Ok(())
    }

    pub fn save_stage_result(&mut self, stage_id: &str, result: Value) -> Result<(), OrchestratorError> {
        let state = self.state_mut()?;
        let result_key = format!("{}-{}", state.id, stage_id);
        let stage = state
            .stage_mut(stage_id)
            .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.to_string()))?;
        stage.result_key = Some(result_key);
        state.stage_results.insert(stage_id.to_string(), result);
        Ok(())
    }

    pub fn stage_result(&self, stage_id: &str) -> Option<&Value> {
        self.state.as_ref()?.stage_result(stage_id)
    }

    /// Discards the current run and returns it.
    pub fn reset(&mut self) -> Option<ProcessState> {
        self.state.take()
    }
}
