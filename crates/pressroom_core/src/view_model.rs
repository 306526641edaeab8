use serde::Serialize;

use crate::{Orchestrator, OverallStatus, PipelineKind, StageStatus};

/// Read-only snapshot handed to UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessView {
    pub run_id: Option<String>,
    pub kind: Option<PipelineKind>,
    pub current_stage_id: Option<String>,
    pub progress: u8,
    pub status: OverallStatus,
    pub stages: Vec<StageRowView>,
    pub groups: Vec<StageGroupView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRowView {
    pub id: String,
    pub name: String,
    pub status: StageStatus,
    pub progress: u8,
    pub message: Option<String>,
    pub has_result: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageGroupView {
    pub title: String,
    pub stage_ids: Vec<String>,
    pub completed: usize,
}

impl Orchestrator {
    pub fn view(&self) -> ProcessView {
        let Some(state) = self.state() else {
            return ProcessView::default();
        };

        let stages = state
            .stages
            .iter()
            .map(|stage| StageRowView {
                id: stage.id.clone(),
                name: stage.name.clone(),
                status: stage.status,
                progress: stage.progress,
                message: stage.message.clone(),
                has_result: state.stage_results.contains_key(&stage.id),
            })
            .collect();

        let groups = self
            .layout(state.kind)
            .groups
            .iter()
            .map(|group| {
                let members: Vec<_> = state
                    .stages
                    .iter()
                    .filter(|s| s.group.as_deref() == Some(group.id.as_str()))
                    .collect();
                StageGroupView {
                    title: group.title.clone(),
                    stage_ids: members.iter().map(|s| s.id.clone()).collect(),
                    completed: members
                        .iter()
                        .filter(|s| s.status == StageStatus::Completed)
                        .count(),
                }
            })
            .collect();

        ProcessView {
            run_id: Some(state.id.clone()),
            kind: Some(state.kind),
            current_stage_id: Some(state.current_stage_id.clone()),
            progress: state.overall.progress,
            status: state.overall.status,
            stages,
            groups,
        }
    }
}
