pub mod aggregate;
pub mod fanout;
pub mod gate;
pub mod ledger;
pub mod orchestrator;
pub mod state;
pub mod steps;

pub use aggregate::{decide_run_status, finalize};
pub use ledger::{ExecutionLedger, FinalizedRun, LogEntry, RunSummary, Severity};
pub use orchestrator::{Collaborators, Orchestrator, PipelineSettings};
pub use state::{ExecutionState, ReportInput, RunStatus, Step, StepStatus, StepStatuses};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::steps::{INSUFFICIENT_DATA_GUIDE, INSUFFICIENT_DATA_REPORT};
    use super::*;
    use crate::llm::LlmClient;
    use crate::lookup::LookupError;
    use crate::testing::{FakeClassifier, FakeLookup, FakeProvider, sample_state};
    use crate::vision::ClassificationError;

    fn orchestrator(
        classifier: FakeClassifier,
        weather: FakeLookup,
        history: FakeLookup,
        provider: Arc<FakeProvider>,
    ) -> Orchestrator {
        Orchestrator::new(
            Collaborators {
                classifier: Arc::new(classifier),
                weather: Arc::new(weather),
                disaster_feed: Arc::new(history),
                llm: Arc::new(LlmClient::new(provider)),
            },
            PipelineSettings {
                model: "test-model".to_string(),
                max_workers: 3,
            },
        )
    }

    #[tokio::test]
    async fn test_weather_timeout_still_accepts() {
        let provider = Arc::new(FakeProvider::replying("report text"));
        let pipeline = orchestrator(
            FakeClassifier::fire(2),
            FakeLookup::failing("open-meteo", LookupError::Timeout),
            FakeLookup::replying("gdacs", json!({"features": [{"eventtype": "WF"}]})),
            provider.clone(),
        );

        let state = pipeline.run(sample_state()).await;

        assert!(
            state
                .outputs
                .classification
                .as_deref()
                .unwrap()
                .contains("FIRE scene with 2 people detected")
        );
        assert_eq!(state.outputs.weather, Some(json!({"error": "timeout"})));
        assert_eq!(state.statuses.get(Step::DisasterHistory), StepStatus::Completed);
        assert_eq!(state.readiness(), Some(true));
        assert_eq!(provider.calls(), 2);

        let run = finalize(state);
        assert_eq!(run.run_status, RunStatus::Accepted);
        assert_eq!(run.summary.total_components, 5);
        assert_eq!(run.summary.completed_components, 4);
        assert_eq!(run.summary.failed_components, 1);
        assert_eq!(run.summary.success_rate, 80.0);
    }

    #[tokio::test]
    async fn test_classification_failure_rejects_without_llm_calls() {
        let provider = Arc::new(FakeProvider::replying("unused"));
        let pipeline = orchestrator(
            FakeClassifier::failing(ClassificationError::Service("model exception".into())),
            FakeLookup::replying("open-meteo", json!({"current_weather": {"temperature": 31.0}})),
            FakeLookup::replying("gdacs", json!({"features": []})),
            provider.clone(),
        );

        let state = pipeline.run(sample_state()).await;

        assert_eq!(state.readiness(), Some(false));
        assert_eq!(provider.calls(), 0);
        assert_eq!(state.statuses.get(Step::GovernmentReport), StepStatus::Failed);
        assert_eq!(state.statuses.get(Step::CitizenGuide), StepStatus::Failed);
        assert_eq!(
            state.outputs.government_report.as_deref(),
            Some(INSUFFICIENT_DATA_REPORT)
        );
        assert_eq!(state.outputs.citizen_guide.as_deref(), Some(INSUFFICIENT_DATA_GUIDE));
        assert_eq!(state.run_status(), RunStatus::Rejected);
    }

    #[tokio::test]
    async fn test_every_step_ends_terminal_and_ledger_only_grows() {
        let pipeline = orchestrator(
            FakeClassifier::fire(1),
            FakeLookup::failing("open-meteo", LookupError::Status(503)),
            FakeLookup::failing("gdacs", LookupError::Network("refused".into())),
            Arc::new(FakeProvider::failing("connection reset")),
        );
        let mut state = sample_state();
        state.ledger.info("system", "Emergency submitted");
        let before = state.ledger.entries().to_vec();

        let state = pipeline.run(state).await;

        assert!(state.statuses.all_terminal());
        assert_eq!(&state.ledger.entries()[..before.len()], before.as_slice());
        assert!(state.ledger.len() > before.len());
        // Classification alone decides acceptance.
        assert_eq!(state.run_status(), RunStatus::Accepted);
        assert!(
            state
                .outputs
                .citizen_guide
                .as_deref()
                .unwrap()
                .starts_with("Error generating citizen guide:")
        );
    }

    #[tokio::test]
    async fn test_branch_log_entries_stay_contiguous() {
        let pipeline = orchestrator(
            FakeClassifier::fire(2),
            FakeLookup::replying("open-meteo", json!({})).delayed(30),
            FakeLookup::replying("gdacs", json!({})),
            Arc::new(FakeProvider::replying("ok")),
        );

        let state = pipeline.run(sample_state()).await;

        let components: Vec<&str> = state
            .ledger
            .entries()
            .iter()
            .map(|e| e.component.as_str())
            .collect();
        let weather: Vec<usize> = components
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == "data_tool_weather")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(weather.len(), 2);
        assert_eq!(weather[1], weather[0] + 1);
    }
}
