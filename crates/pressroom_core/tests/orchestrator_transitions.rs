use pressroom_core::{
    Metadata, Orchestrator, OrchestratorError, OverallStatus, PipelineKind, StageStatus,
    ADVANCED_AI, EXTRACT, PROCESS, PUBLISH_NEWS, UPLOAD,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    pressroom_logging::initialize_for_tests();
}

fn started(kind: PipelineKind) -> Orchestrator {
    let mut orchestrator = Orchestrator::new();
    let mut metadata = Metadata::new();
    metadata.insert("fileName".into(), json!("report.docx"));
    orchestrator.start(kind, metadata).expect("start");
    orchestrator
}

#[test]
fn start_marks_only_first_stage_processing() {
    init_logging();
    let orchestrator = started(PipelineKind::File);
    let state = orchestrator.state().unwrap();

    assert_eq!(state.id, "file-1");
    assert_eq!(state.current_stage_id, UPLOAD);
    assert_eq!(state.overall.status, OverallStatus::Processing);
    assert_eq!(state.overall.progress, 0);
    assert_eq!(state.metadata["fileName"], json!("report.docx"));
    let statuses: Vec<_> = state.stages.iter().map(|s| s.status).collect();
    assert_eq!(statuses[0], StageStatus::Processing);
    assert!(statuses[1..].iter().all(|s| *s == StageStatus::Pending));
}

#[test]
fn run_ids_are_sequential_per_orchestrator() {
    init_logging();
    let mut orchestrator = started(PipelineKind::File);
    let state = orchestrator.start(PipelineKind::Url, Metadata::new()).unwrap();
    assert_eq!(state.id, "url-2");
    assert_eq!(state.stages[0].name, "Resolve URL");
}

#[test]
fn error_then_advance_continues_with_next_pending_stage() {
    init_logging();
    let mut orchestrator = started(PipelineKind::File);
    orchestrator.move_to_next_stage().unwrap();
    orchestrator.move_to_next_stage().unwrap();
    orchestrator
        .set_stage_error(PROCESS, "AI enhancement failed")
        .unwrap();

    let state = orchestrator.state().unwrap();
    assert_eq!(state.overall.status, OverallStatus::Error);
    assert_eq!(state.stage(ADVANCED_AI).unwrap().status, StageStatus::Pending);

    let next = orchestrator.move_to_next_stage().unwrap();
    assert_eq!(next.as_deref(), Some(ADVANCED_AI));
    let state = orchestrator.state().unwrap();
    assert_eq!(state.current_stage_id, ADVANCED_AI);
    assert_eq!(state.stage(PROCESS).unwrap().status, StageStatus::Error);
    assert_eq!(
        state.stage(PROCESS).unwrap().message.as_deref(),
        Some("AI enhancement failed")
    );
    assert_eq!(state.stage(ADVANCED_AI).unwrap().status, StageStatus::Processing);
    assert_eq!(state.failed_stages().len(), 1);
}

#[test]
fn advancing_past_last_stage_completes_run() {
    init_logging();
    let mut orchestrator = started(PipelineKind::Url);
    let mut visited = vec![UPLOAD.to_string()];
    while let Some(next) = orchestrator.move_to_next_stage().unwrap() {
        visited.push(next);
    }

    assert_eq!(visited.len(), 8);
    assert_eq!(visited.last().map(String::as_str), Some(PUBLISH_NEWS));
    let state = orchestrator.state().unwrap();
    assert_eq!(state.overall.status, OverallStatus::Completed);
    assert_eq!(state.overall.progress, 100);
}

#[test]
fn completing_last_stage_finishes_run() {
    init_logging();
    let mut orchestrator = started(PipelineKind::File);
    for _ in 0..7 {
        orchestrator.move_to_next_stage().unwrap();
    }
    orchestrator
        .complete_stage(PUBLISH_NEWS, Some("published".into()))
        .unwrap();

    let state = orchestrator.state().unwrap();
    assert_eq!(state.overall.status, OverallStatus::Completed);
    assert_eq!(state.stage(PUBLISH_NEWS).unwrap().progress, 100);
}

#[test]
fn terminal_stages_do_not_transition_again() {
    init_logging();
    let mut orchestrator = started(PipelineKind::File);
    orchestrator.complete_stage(UPLOAD, None).unwrap();

    let err = orchestrator.set_stage_error(UPLOAD, "late failure").unwrap_err();
    assert_eq!(
        err,
        OrchestratorError::InvalidTransition {
            stage_id: UPLOAD.to_string(),
            from: StageStatus::Completed,
            to: StageStatus::Error,
        }
    );
    let err = orchestrator.complete_stage(EXTRACT, None).unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
}

#[test]
fn restart_reenters_failed_stage() {
    init_logging();
    let mut orchestrator = started(PipelineKind::File);
    orchestrator.set_stage_error(UPLOAD, "disk full").unwrap();

    orchestrator.restart_stage(UPLOAD).unwrap();
    let state = orchestrator.state().unwrap();
    assert_eq!(state.stage(UPLOAD).unwrap().status, StageStatus::Processing);
    assert_eq!(state.stage(UPLOAD).unwrap().message, None);
    assert_eq!(state.overall.status, OverallStatus::Processing);

    let err = orchestrator.restart_stage(EXTRACT).unwrap_err();
    assert_eq!(
        err,
        OrchestratorError::StageBusy {
            active: UPLOAD.to_string()
        }
    );
}

#[test]
fn unknown_stage_and_missing_run_are_errors() {
    init_logging();
    let mut orchestrator = Orchestrator::new();
    assert_eq!(
        orchestrator.update_stage_progress(UPLOAD, 10, None),
        Err(OrchestratorError::NoActiveRun)
    );

    orchestrator.start(PipelineKind::File, Metadata::new()).unwrap();
    assert_eq!(
        orchestrator.complete_stage("cover-image", None),
        Err(OrchestratorError::UnknownStage("cover-image".to_string()))
    );
}

#[test]
fn saved_results_get_a_result_key() {
    init_logging();
    let mut orchestrator = started(PipelineKind::File);
    orchestrator
        .save_stage_result(UPLOAD, json!({ "fileId": "abc" }))
        .unwrap();

    assert_eq!(orchestrator.stage_result(UPLOAD), Some(&json!({ "fileId": "abc" })));
    let state = orchestrator.state().unwrap();
    assert_eq!(
        state.stage(UPLOAD).unwrap().result_key.as_deref(),
        Some("file-1-upload")
    );
    assert!(orchestrator.view().stages[0].has_result);
}

#[test]
fn reset_discards_state() {
    init_logging();
    let mut orchestrator = started(PipelineKind::File);
    let discarded = orchestrator.reset().expect("state");
    assert_eq!(discarded.id, "file-1");
    assert!(orchestrator.state().is_none());
    assert_eq!(orchestrator.view().status, OverallStatus::Idle);
}
