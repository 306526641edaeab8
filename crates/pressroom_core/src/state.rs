use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stage::{PipelineKind, PipelineLayout, ProcessStage, StageStatus};

/// Most recent progress ticks kept on a run.
pub const TICK_LOG_LIMIT: usize = 64;

pub type Metadata = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    #[default]
    Idle,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Overall {
    pub progress: u8,
    pub status: OverallStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressTick {
    pub stage_id: String,
    pub percent: u8,
    pub message: Option<String>,
    pub applied: bool,
}

/// State of one pipeline run. Only the orchestrator mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessState {
    pub id: String,
    pub kind: PipelineKind,
    pub stages: Vec<ProcessStage>,
    pub current_stage_id: String,
    pub overall: Overall,
    pub stage_results: BTreeMap<String, Value>,
    pub metadata: Metadata,
    pub ticks: VecDeque<ProgressTick>,
}

impl ProcessState {
    pub(crate) fn new(id: String, kind: PipelineKind, layout: &PipelineLayout, metadata: Metadata) -> Self {
        let mut stages: Vec<ProcessStage> = layout.stages.iter().map(|d| d.instantiate()).collect();
        let current_stage_id = stages.first().map(|s| s.id.clone()).unwrap_or_default();
        if let Some(first) = stages.first_mut() {
            first.status = StageStatus::Processing;
        }
        let mut state = Self {
            id,
            kind,
            stages,
            current_stage_id,
            overall: Overall {
                progress: 0,
                status: OverallStatus::Processing,
            },
            stage_results: BTreeMap::new(),
            metadata,
            ticks: VecDeque::new(),
        };
        state.recompute_progress();
        state
    }

    pub fn stage(&self, stage_id: &str) -> Option<&ProcessStage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    pub(crate) fn stage_mut(&mut self, stage_id: &str) -> Option<&mut ProcessStage> {
        self.stages.iter_mut().find(|s| s.id == stage_id)
    }

    pub fn current_stage(&self) -> Option<&ProcessStage> {
        self.stage(&self.current_stage_id)
    }

    pub fn active_stage(&self) -> Option<&ProcessStage> {
        self.stages.iter().find(|s| s.is_active())
    }

    pub fn failed_stages(&self) -> Vec<&ProcessStage> {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Error)
            .collect()
    }

    pub fn has_remaining_work(&self) -> bool {
        self.stages
            .iter()
            .any(|s| matches!(s.status, StageStatus::Pending | StageStatus::Processing))
    }

    pub fn stage_result(&self, stage_id: &str) -> Option<&Value> {
        self.stage_results.get(stage_id)
    }

    /// Weighted mean of per-stage progress, rounded.
    pub fn weighted_progress(&self) -> u8 {
        let total_weight: f64 = self.stages.iter().map(|s| s.weight).sum();
        if total_weight <= 0.0 {
            return 0;
        }
        let weighted: f64 = self
            .stages
            .iter()
            .map(|s| f64::from(s.progress) * s.weight)
            .sum();
        (weighted / total_weight).round().clamp(0.0, 100.0) as u8
    }

    pub(crate) fn recompute_progress(&mut self) {
        self.overall.progress = self.weighted_progress();
    }

    pub(crate) fn record_tick(&mut self, tick: ProgressTick) {
        if self.ticks.len() == TICK_LOG_LIMIT {
            self.ticks.pop_front();
        }
        self.ticks.push_back(tick);
    }
}
