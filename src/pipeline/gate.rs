use super::state::{ExecutionState, Step, StepStatus};

const COMPONENT: &str = "system_coordinator_validation";

/// Decides whether report generation may run: only the classification step
/// counts. The lookups are reported but never block.
#[tracing::instrument(name = "pipeline_stage readiness_gate", skip_all, fields(pipeline.stage = "readiness_gate", pipeline.ready))]
pub fn readiness_gate(state: &mut ExecutionState) -> bool {
    let classification = state.statuses.get(Step::CRITICAL) == StepStatus::Completed;
    let weather = lookup_ok(state, Step::Weather);
    let history = lookup_ok(state, Step::DisasterHistory);

    if let Err(err) = state.set_ready(classification) {
        state.ledger.error(COMPONENT, format!("Readiness not re-evaluated: {err}"));
        return state.is_ready();
    }

    let message = format!(
        "Validation complete. Ready for AI analysis: {classification} \
         ({}: {}, {}: {}, {}: {})",
        Step::Classification,
        verdict(classification),
        Step::Weather,
        verdict(weather),
        Step::DisasterHistory,
        verdict(history),
    );
    if classification {
        state.ledger.success(COMPONENT, message);
    } else {
        state.ledger.warn(COMPONENT, message);
    }

    tracing::Span::current().record("pipeline.ready", classification);
    classification
}

fn lookup_ok(state: &ExecutionState, step: Step) -> bool {
    let payload = match step {
        Step::Weather => state.outputs.weather.as_ref(),
        Step::DisasterHistory => state.outputs.disaster_history.as_ref(),
        _ => None,
    };
    state.statuses.get(step) == StepStatus::Completed
        && payload.is_some_and(|v| v.get("error").is_none())
}

fn verdict(ok: bool) -> &'static str {
    if ok { "ok" } else { "failed" }
}
