use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;

use super::aggregate::aggregate;
use super::fanout::{StepRunner, run_parallel};
use super::gate::readiness_gate;
use super::state::ExecutionState;
use super::steps::{ClassificationStep, LookupStep, ReportKind, ReportStep};
use crate::llm::LlmClient;
use crate::lookup::GeoLookup;
use crate::telemetry::metrics::PIPELINE_RUN_DURATION;
use crate::vision::Classifier;

/// External services the graph calls into. Built once by the process entry
/// point and shared across runs.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn Classifier>,
    pub weather: Arc<dyn GeoLookup>,
    pub disaster_feed: Arc<dyn GeoLookup>,
    pub llm: Arc<LlmClient>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    pub max_workers: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_workers: 3,
        }
    }
}

/// data collection -> readiness gate -> analysis -> final aggregation.
pub struct Orchestrator {
    data_collection: Vec<Arc<dyn StepRunner>>,
    analysis: Vec<Arc<dyn StepRunner>>,
    max_workers: usize,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        let data_collection: Vec<Arc<dyn StepRunner>> = vec![
            Arc::new(ClassificationStep::new(collaborators.classifier)),
            Arc::new(LookupStep::weather(collaborators.weather)),
            Arc::new(LookupStep::disaster_history(collaborators.disaster_feed)),
        ];
        let analysis: Vec<Arc<dyn StepRunner>> = vec![
            Arc::new(ReportStep::new(
                ReportKind::Government,
                Arc::clone(&collaborators.llm),
                &settings.model,
            )),
            Arc::new(ReportStep::new(
                ReportKind::Citizen,
                collaborators.llm,
                &settings.model,
            )),
        ];
        Self {
            data_collection,
            analysis,
            max_workers: settings.max_workers,
        }
    }

    /// Runs the whole graph once. Step failures end up in the returned state,
    /// never as an error.
    #[tracing::instrument(
        name = "pipeline emergency_analysis",
        skip_all,
        fields(pipeline.run_status, pipeline.duration_ms)
    )]
    pub async fn run(&self, mut state: ExecutionState) -> ExecutionState {
        let start = Instant::now();

        state
            .ledger
            .info("system_coordinator_data", "Starting parallel data collection");
        run_parallel(&mut state, &self.data_collection, self.max_workers).await;
        state
            .ledger
            .info("system_coordinator_data", "Data collection finished");

        readiness_gate(&mut state);

        state
            .ledger
            .info("system_coordinator_ai_analysis", "Starting parallel AI analysis");
        run_parallel(&mut state, &self.analysis, self.max_workers).await;
        state
            .ledger
            .info("system_coordinator_ai_analysis", "AI analysis finished");

        let status = aggregate(&mut state);

        let elapsed = start.elapsed();
        PIPELINE_RUN_DURATION.record(
            elapsed.as_secs_f64(),
            &[KeyValue::new("pipeline.run_status", status.as_str())],
        );
        let span = tracing::Span::current();
        span.record("pipeline.run_status", status.as_str());
        span.record("pipeline.duration_ms", elapsed.as_millis() as u64);

        state
    }
}
