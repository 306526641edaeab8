use crate::{Effect, Msg, Orchestrator, OrchestratorError, OverallStatus};

/// Pure update function: applies a message to the orchestrator and returns any effects.
pub fn update(mut orchestrator: Orchestrator, msg: Msg) -> (Orchestrator, Vec<Effect>) {
    let effects = apply(&mut orchestrator, msg);
    (orchestrator, effects)
}

/// In-place form of [`update`] for owners that keep the orchestrator behind a lock.
pub fn apply(orchestrator: &mut Orchestrator, msg: Msg) -> Vec<Effect> {
    let result: Result<Vec<Effect>, OrchestratorError> = match msg {
        Msg::Start { kind, metadata } => orchestrator.start(kind, metadata).map(|state| {
            vec![Effect::RunStage {
                stage_id: state.current_stage_id.clone(),
            }]
        }),
        Msg::StageProgress {
            stage_id,
            percent,
            message,
        } => orchestrator
            .update_stage_progress(&stage_id, percent, message)
            .map(|_| Vec::new()),
        Msg::StageCompleted { stage_id, message } => orchestrator
            .complete_stage(&stage_id, message)
            .map(|()| finished_effect(orchestrator).into_iter().collect()),
        Msg::StageFailed { stage_id, message } => orchestrator
            .set_stage_error(&stage_id, message)
            .map(|()| Vec::new()),
        Msg::StageResult { stage_id, result } => orchestrator
            .save_stage_result(&stage_id, result)
            .map(|()| Vec::new()),
        Msg::Advance => orchestrator.move_to_next_stage().map(|next| match next {
            Some(stage_id) => vec![Effect::RunStage { stage_id }],
            None => finished_effect(orchestrator).into_iter().collect(),
        }),
        Msg::RestartStage { stage_id } => orchestrator
            .restart_stage(&stage_id)
            .map(|()| vec![Effect::RunStage { stage_id }]),
        Msg::Reset => Ok(orchestrator
            .reset()
            .map(|state| Effect::Discarded { run_id: state.id })
            .into_iter()
            .collect()),
    };

    result.unwrap_or_else(|error| vec![Effect::Rejected { error }])
}

fn finished_effect(orchestrator: &Orchestrator) -> Option<Effect> {
    let state = orchestrator.state()?;
    (state.overall.status == OverallStatus::Completed).then(|| Effect::RunFinished {
        run_id: state.id.clone(),
        status: state.overall.status,
    })
}
