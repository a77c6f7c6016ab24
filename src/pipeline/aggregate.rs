use opentelemetry::KeyValue;

use super::ledger::{FinalizedRun, RunSummary};
use super::state::{ExecutionState, RunStatus, Step, StepStatus, StepStatuses};
use crate::telemetry::metrics::{PIPELINE_RUN_OUTCOMES, PIPELINE_STEP_OUTCOMES};

const COMPONENT: &str = "system_coordinator_final";

const AI_AGENTS: [Step; 3] = [
    Step::Classification,
    Step::GovernmentReport,
    Step::CitizenGuide,
];
const DATA_TOOLS: [Step; 2] = [Step::Weather, Step::DisasterHistory];

/// Accepted exactly when the critical step completed.
pub fn decide_run_status(statuses: &StepStatuses) -> RunStatus {
    if statuses.get(Step::CRITICAL) == StepStatus::Completed {
        RunStatus::Accepted
    } else {
        RunStatus::Rejected
    }
}

/// Final stage of the graph: logs the per-step picture and sets the run status.
#[tracing::instrument(name = "pipeline_stage final", skip_all, fields(pipeline.stage = "final", pipeline.run_status))]
pub fn aggregate(state: &mut ExecutionState) -> RunStatus {
    let summary = RunSummary::from_statuses(&state.statuses);
    state.ledger.info(
        COMPONENT,
        format!(
            "Processing summary: {}/{} components completed successfully",
            summary.completed_components, summary.total_components
        ),
    );

    for (heading, group) in [("AI agents", &AI_AGENTS[..]), ("Data collection tools", &DATA_TOOLS[..])] {
        let line = group
            .iter()
            .map(|step| format!("{step}={}", state.statuses.get(*step).as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        state.ledger.info(COMPONENT, format!("{heading}: {line}"));
    }

    for (step, status) in state.statuses.iter() {
        PIPELINE_STEP_OUTCOMES.add(
            1,
            &[
                KeyValue::new("pipeline.step", step.as_str()),
                KeyValue::new("pipeline.step.status", status.as_str()),
            ],
        );
    }

    let status = decide_run_status(&state.statuses);
    state.set_run_status(status);
    match status {
        RunStatus::Accepted => state
            .ledger
            .success(COMPONENT, "Emergency response ACCEPTED"),
        _ => state.ledger.error(
            COMPONENT,
            "Emergency response REJECTED: scene classification did not complete",
        ),
    }

    PIPELINE_RUN_OUTCOMES.add(1, &[KeyValue::new("pipeline.run_status", status.as_str())]);
    tracing::Span::current().record("pipeline.run_status", status.as_str());
    status
}

/// Produces the hand-off record. Summary statistics are recomputed from the
/// final status map so they always agree with it.
pub fn finalize(state: ExecutionState) -> FinalizedRun {
    FinalizedRun {
        run_status: state.run_status(),
        summary: RunSummary::from_statuses(&state.statuses),
        components_status: state.statuses.clone(),
        log: state.ledger.into_entries(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_state;

    fn statuses(entries: &[(Step, StepStatus)]) -> StepStatuses {
        let mut statuses = StepStatuses::new();
        for (step, status) in entries {
            statuses.record(*step, *status).unwrap();
        }
        statuses
    }

    #[test]
    fn test_failed_classification_always_rejects() {
        let all_others_ok = statuses(&[
            (Step::Classification, StepStatus::Failed),
            (Step::Weather, StepStatus::Completed),
            (Step::DisasterHistory, StepStatus::Completed),
            (Step::GovernmentReport, StepStatus::Completed),
            (Step::CitizenGuide, StepStatus::Completed),
        ]);
        assert_eq!(decide_run_status(&all_others_ok), RunStatus::Rejected);
    }

    #[test]
    fn test_classification_and_one_report_accepts() {
        let partial = statuses(&[
            (Step::Classification, StepStatus::Completed),
            (Step::Weather, StepStatus::Failed),
            (Step::DisasterHistory, StepStatus::Failed),
            (Step::GovernmentReport, StepStatus::Failed),
            (Step::CitizenGuide, StepStatus::Completed),
        ]);
        assert_eq!(decide_run_status(&partial), RunStatus::Accepted);
    }

    #[test]
    fn test_pending_classification_rejects() {
        assert_eq!(decide_run_status(&StepStatuses::new()), RunStatus::Rejected);
    }

    #[test]
    fn test_aggregate_sets_status_and_finalize_reports_stats() {
        let mut state = sample_state();
        for (step, status) in [
            (Step::Classification, StepStatus::Completed),
            (Step::Weather, StepStatus::Failed),
            (Step::DisasterHistory, StepStatus::Completed),
            (Step::GovernmentReport, StepStatus::Completed),
            (Step::CitizenGuide, StepStatus::Completed),
        ] {
            state.statuses.record(step, status).unwrap();
        }

        assert_eq!(aggregate(&mut state), RunStatus::Accepted);
        assert_eq!(state.run_status(), RunStatus::Accepted);
        let logged = state.ledger.len();

        let finalized = finalize(state);
        assert_eq!(finalized.run_status, RunStatus::Accepted);
        assert_eq!(finalized.summary.total_components, 5);
        assert_eq!(finalized.summary.completed_components, 4);
        assert_eq!(finalized.summary.failed_components, 1);
        assert_eq!(finalized.summary.success_rate, 80.0);
        assert_eq!(finalized.log.len(), logged);
    }
}
