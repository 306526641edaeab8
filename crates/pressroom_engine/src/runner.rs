//! Drives one pipeline run: executes stage handlers strictly in order and
//! feeds their outcomes back through the orchestrator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use pressroom_core::{
    apply, Effect, Metadata, Msg, Orchestrator, OrchestratorError, OverallStatus, PipelineKind,
    ProcessState, ProcessView,
};
use pressroom_logging::{clear_run_label, press_error, press_info, press_warn, set_run_label};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc::UnboundedSender, watch};

use crate::agent::{resolve_agent_config, AgentConfigSource};
use crate::persist::ObjectStore;
use crate::retry::RetryEvent;
use crate::stages::{Clock, StageContext, StageHandler, StageInput};
use crate::ProgressSink;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("orchestrator refused the operation: {0}")]
    Rejected(#[from] OrchestratorError),
    #[error("no run is active")]
    NotStarted,
    #[error("run {0} has no paused stage to resume")]
    NothingToResume(String),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub status: OverallStatus,
    pub failed_stages: Vec<String>,
    pub paused_at: Option<String>,
    pub halted_at: Option<String>,
}

impl RunSummary {
    pub fn is_halted(&self) -> bool {
        self.halted_at.is_some()
    }
}

/// Shared entry point for every orchestrator mutation. Readers subscribe to
/// view snapshots instead of touching the state.
#[derive(Clone)]
pub struct PipelineHandle {
    orchestrator: Arc<Mutex<Orchestrator>>,
    views: Arc<watch::Sender<ProcessView>>,
}

impl Default for PipelineHandle {
    fn default() -> Self {
        Self::new(Orchestrator::new())
    }
}

impl PipelineHandle {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let (views, _) = watch::channel(orchestrator.view());
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            views: Arc::new(views),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Orchestrator> {
        self.orchestrator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies `msg` in place and publishes the new view.
    pub fn dispatch(&self, msg: Msg) -> Vec<Effect> {
        let (view, effects) = {
            let mut guard = self.lock();
            let effects = apply(&mut guard, msg);
            (guard.view(), effects)
        };
        self.views.send_replace(view);
        effects
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessView> {
        self.views.subscribe()
    }

    pub fn view(&self) -> ProcessView {
        self.views.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<ProcessState> {
        self.lock().state().cloned()
    }
}

impl ProgressSink for PipelineHandle {
    fn stage_progress(&self, stage_id: &str, percent: u8, message: Option<String>) {
        for effect in self.dispatch(Msg::StageProgress {
            stage_id: stage_id.to_string(),
            percent,
            message,
        }) {
            if let Effect::Rejected { error } = effect {
                press_warn!("progress tick for {stage_id} dropped: {error}");
            }
        }
    }
}

enum StageFlow {
    Continue(Vec<Effect>),
    Paused,
    Halted,
}

/// Executes stages one at a time until the run completes, halts or pauses.
pub struct PipelineRunner {
    handle: PipelineHandle,
    handlers: Vec<Arc<dyn StageHandler>>,
    agents: Arc<dyn AgentConfigSource>,
    store: Arc<dyn ObjectStore>,
    clock: Clock,
    tick_interval: Duration,
    retry_events: Option<UnboundedSender<RetryEvent>>,
}

impl PipelineRunner {
    pub fn new(handle: PipelineHandle, agents: Arc<dyn AgentConfigSource>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            handle,
            handlers: Vec::new(),
            agents,
            store,
            clock: Arc::new(|| chrono::Utc::now().to_rfc3339()),
            tick_interval: Duration::from_secs(1),
            retry_events: None,
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn StageHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_handlers(mut self, handlers: impl IntoIterator<Item = Arc<dyn StageHandler>>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_retry_events(mut self, observer: UnboundedSender<RetryEvent>) -> Self {
        self.retry_events = Some(observer);
        self
    }

    pub fn handle(&self) -> &PipelineHandle {
        &self.handle
    }

    pub async fn run(&self, kind: PipelineKind, metadata: Metadata) -> Result<RunSummary, RunnerError> {
        let effects = self.handle.dispatch(Msg::Start { kind, metadata });
        if let Some(state) = self.handle.snapshot() {
            press_info!("run {} started ({} stages)", state.id, state.stages.len());
        }
        self.drive(effects).await
    }

    /// Re-runs the stage a previous `run` paused on.
    pub async fn resume(&self) -> Result<RunSummary, RunnerError> {
        let state = self.handle.snapshot().ok_or(RunnerError::NotStarted)?;
        let paused = state
            .active_stage()
            .map(|stage| stage.id.clone())
            .ok_or_else(|| RunnerError::NothingToResume(state.id.clone()))?;
        press_info!("resuming run {} at {paused}", state.id);
        self.drive(vec![Effect::RunStage { stage_id: paused }]).await
    }

    async fn drive(&self, effects: Vec<Effect>) -> Result<RunSummary, RunnerError> {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut paused_at = None;
        let mut halted_at = None;

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::RunStage { stage_id } => match self.run_stage(&stage_id).await {
                    StageFlow::Continue(next) => queue.extend(next),
                    StageFlow::Paused => {
                        paused_at = Some(stage_id);
                        break;
                    }
                    StageFlow::Halted => {
                        halted_at = Some(stage_id);
                        break;
                    }
                },
                Effect::RunFinished { run_id, status } => {
                    press_info!("run {run_id} finished: {status:?}");
                }
                Effect::Discarded { run_id } => press_warn!("run {run_id} was discarded"),
                Effect::Rejected { error } => return Err(error.into()),
            }
        }
        clear_run_label();

        let state = self.handle.snapshot().ok_or(RunnerError::NotStarted)?;
        Ok(RunSummary {
            run_id: state.id.clone(),
            status: state.overall.status,
            failed_stages: state.failed_stages().iter().map(|s| s.id.clone()).collect(),
            paused_at,
            halted_at,
        })
    }

    fn handler(&self, stage_id: &str) -> Option<Arc<dyn StageHandler>> {
        self.handlers
            .iter()
            .find(|handler| handler.stage_id() == stage_id)
            .cloned()
    }

    async fn run_stage(&self, stage_id: &str) -> StageFlow {
        let Some(state) = self.handle.snapshot() else {
            return StageFlow::Halted;
        };
        set_run_label(state.id.clone());

        let Some(handler) = self.handler(stage_id) else {
            press_error!("no handler registered for stage {stage_id}");
            self.dispatch_logged(Msg::StageFailed {
                stage_id: stage_id.to_string(),
                message: "no handler registered for this stage".to_string(),
            });
            return StageFlow::Halted;
        };

        let agent = match handler.agent_role() {
            Some(role) => Some(resolve_agent_config(self.agents.as_ref(), role).await),
            None => None,
        };
        let input = StageInput {
            previous: previous_result(&state, stage_id),
            agent,
        };
        let ctx = StageContext {
            run_id: state.id.clone(),
            kind: state.kind,
            metadata: state.metadata.clone(),
            progress: Arc::new(self.handle.clone()),
            store: self.store.clone(),
            clock: self.clock.clone(),
            tick_interval: self.tick_interval,
            retry_events: self.retry_events.clone(),
        };

        press_info!("stage {stage_id} started");
        let outcome = handler.run(&ctx, input).await;
        set_run_label(state.id.clone());
        self.dispatch_logged(Msg::StageResult {
            stage_id: stage_id.to_string(),
            result: outcome.to_result(),
        });

        let message = outcome.message.clone();
        match (outcome.success, outcome.stage_complete) {
            (true, true) => {
                press_info!("stage {stage_id} completed");
                let effects = self.dispatch_logged(Msg::StageCompleted {
                    stage_id: stage_id.to_string(),
                    message,
                });
                if effects.iter().any(|e| matches!(e, Effect::RunFinished { .. })) {
                    return StageFlow::Continue(effects);
                }
                StageFlow::Continue(self.handle.dispatch(Msg::Advance))
            }
            (false, true) => {
                press_warn!("stage {stage_id} failed, continuing: {}", message.as_deref().unwrap_or(""));
                self.dispatch_logged(Msg::StageFailed {
                    stage_id: stage_id.to_string(),
                    message: message.unwrap_or_else(|| "stage failed".to_string()),
                });
                StageFlow::Continue(self.handle.dispatch(Msg::Advance))
            }
            (false, false) => {
                press_error!("stage {stage_id} failed, halting: {}", message.as_deref().unwrap_or(""));
                self.dispatch_logged(Msg::StageFailed {
                    stage_id: stage_id.to_string(),
                    message: message.unwrap_or_else(|| "stage failed".to_string()),
                });
                StageFlow::Halted
            }
            (true, false) => {
                press_info!("stage {stage_id} paused: {}", message.as_deref().unwrap_or(""));
                if let Some(message) = message {
                    self.handle.stage_progress(stage_id, 0, Some(message));
                }
                StageFlow::Paused
            }
        }
    }

    /// Dispatches and logs refusals. Used where a refusal leaves nothing to do.
    fn dispatch_logged(&self, msg: Msg) -> Vec<Effect> {
        let effects = self.handle.dispatch(msg);
        for effect in &effects {
            if let Effect::Rejected { error } = effect {
                press_warn!("orchestrator refused update: {error}");
            }
        }
        effects
    }
}

/// Result of the closest earlier stage that saved one.
fn previous_result(state: &ProcessState, stage_id: &str) -> Option<Value> {
    let position = state.stages.iter().position(|s| s.id == stage_id)?;
    state.stages[..position]
        .iter()
        .rev()
        .find_map(|stage| state.stage_result(&stage.id).cloned())
}
