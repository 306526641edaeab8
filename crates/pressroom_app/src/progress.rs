//! Terminal rendering of pipeline progress from view snapshots.

use pressroom_core::{ProcessView, StageRowView, StageStatus};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Prints one line per stage change until `done` is cancelled, then flushes
/// whatever changed since the last snapshot.
pub async fn print_progress(mut views: watch::Receiver<ProcessView>, done: CancellationToken) {
    let mut last = views.borrow_and_update().clone();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = done.cancelled() => break,
        }
        let next = views.borrow_and_update().clone();
        for line in describe_changes(&last, &next) {
            println!("{line}");
        }
        last = next;
    }
    let next = views.borrow().clone();
    for line in describe_changes(&last, &next) {
        println!("{line}");
    }
}

/// Lines for stages whose status or message differ between two views.
pub fn describe_changes(previous: &ProcessView, next: &ProcessView) -> Vec<String> {
    next.stages
        .iter()
        .filter(|row| {
            previous
                .stages
                .iter()
                .find(|old| old.id == row.id)
                .is_none_or(|old| old.status != row.status || old.message != row.message)
        })
        .filter(|row| row.status != StageStatus::Pending)
        .map(|row| format_row(next.progress, row))
        .collect()
}

fn format_row(overall: u8, row: &StageRowView) -> String {
    let status = match row.status {
        StageStatus::Pending => "pending",
        StageStatus::Processing => "running",
        StageStatus::Completed => "done",
        StageStatus::Error => "FAILED",
    };
    match &row.message {
        Some(message) => format!("[{overall:>3}%] {:<22} {status:<7} {message}", row.name),
        None => format!("[{overall:>3}%] {:<22} {status}", row.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pressroom_core::{update, Msg, Orchestrator, PipelineKind, EXTRACT, UPLOAD};
    use pretty_assertions::assert_eq;

    fn dispatch(orchestrator: Orchestrator, msg: Msg) -> Orchestrator {
        update(orchestrator, msg).0
    }

    #[test]
    fn only_changed_stages_are_printed() {
        let started = dispatch(
            Orchestrator::new(),
            Msg::Start {
                kind: PipelineKind::Url,
                metadata: Default::default(),
            },
        );
        let before = started.view();
        let completed = dispatch(
            started,
            Msg::StageCompleted {
                stage_id: UPLOAD.to_string(),
                message: Some("resolved".to_string()),
            },
        );
        let advanced = dispatch(completed, Msg::Advance);

        let lines = describe_changes(&before, &advanced.view());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Resolve URL"));
        assert!(lines[0].ends_with("done    resolved"));
        assert!(lines[1].contains("Extract content"));
        assert!(lines[1].ends_with("running"));
        assert_eq!(advanced.view().current_stage_id.as_deref(), Some(EXTRACT));
    }

    #[test]
    fn identical_views_print_nothing() {
        let view = Orchestrator::new().view();
        assert!(describe_changes(&view, &view).is_empty());
    }
}
