//! The record threaded through every step of one run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::ledger::ExecutionLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    #[serde(rename = "computer_vision_ai")]
    Classification,
    #[serde(rename = "weather_data_tool")]
    Weather,
    #[serde(rename = "disaster_history_tool")]
    DisasterHistory,
    #[serde(rename = "government_analysis_ai")]
    GovernmentReport,
    #[serde(rename = "citizen_survival_ai")]
    CitizenGuide,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Classification,
        Step::Weather,
        Step::DisasterHistory,
        Step::GovernmentReport,
        Step::CitizenGuide,
    ];

    /// The one step whose success decides readiness and acceptance.
    pub const CRITICAL: Step = Step::Classification;

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Classification => "computer_vision_ai",
            Step::Weather => "weather_data_tool",
            Step::DisasterHistory => "disaster_history_tool",
            Step::GovernmentReport => "government_analysis_ai",
            Step::CitizenGuide => "citizen_survival_ai",
        }
    }

    /// Component name used on ledger entries written by this step.
    pub fn component(self) -> &'static str {
        match self {
            Step::Classification => "ai_agent_computer_vision",
            Step::Weather => "data_tool_weather",
            Step::DisasterHistory => "data_tool_disaster_history",
            Step::GovernmentReport => "ai_agent_government",
            Step::CitizenGuide => "ai_agent_citizen",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StepStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Accepted => "accepted",
            RunStatus::Rejected => "rejected",
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("step {step} already {current}, refusing {attempted}")]
    StatusConflict {
        step: Step,
        current: &'static str,
        attempted: &'static str,
    },

    #[error("step {0} may only record a terminal status")]
    NotTerminal(Step),

    #[error("output of {0} was already written with a different value")]
    OutputConflict(Step),

    #[error("readiness was already decided")]
    ReadinessAlreadySet,
}

/// Step name to status. Entries only ever move from `pending` to a terminal
/// status; re-recording the same terminal status is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StepStatuses(BTreeMap<Step, StepStatus>);

impl StepStatuses {
    pub fn new() -> Self {
        Self(Step::ALL.iter().map(|s| (*s, StepStatus::Pending)).collect())
    }

    pub fn get(&self, step: Step) -> StepStatus {
        self.0.get(&step).copied().unwrap_or(StepStatus::Pending)
    }

    pub fn record(&mut self, step: Step, status: StepStatus) -> Result<(), StateError> {
        if !status.is_terminal() {
            return Err(StateError::NotTerminal(step));
        }
        let current = self.get(step);
        if current == status {
            return Ok(());
        }
        if current.is_terminal() {
            return Err(StateError::StatusConflict {
                step,
                current: current.as_str(),
                attempted: status.as_str(),
            });
        }
        self.0.insert(step, status);
        Ok(())
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.0.values().filter(|s| **s == status).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn all_terminal(&self) -> bool {
        self.0.values().all(|s| s.is_terminal())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Step, StepStatus)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl Default for StepStatuses {
    fn default() -> Self {
        Self::new()
    }
}

/// What the submitter sent; never modified after the run starts.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub image: Arc<[u8]>,
    pub emergency_type: String,
    pub urgency_level: String,
    pub situation: String,
    pub people_count: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub submitter_id: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Classification(String),
    Weather(Value),
    DisasterHistory(Value),
    GovernmentReport(String),
    CitizenGuide(String),
}

impl StepOutput {
    pub fn step(&self) -> Step {
        match self {
            StepOutput::Classification(_) => Step::Classification,
            StepOutput::Weather(_) => Step::Weather,
            StepOutput::DisasterHistory(_) => Step::DisasterHistory,
            StepOutput::GovernmentReport(_) => Step::GovernmentReport,
            StepOutput::CitizenGuide(_) => Step::CitizenGuide,
        }
    }

    /// Stand-in value for a step that failed without producing its own output.
    pub fn error_placeholder(step: Step, message: &str) -> Option<StepOutput> {
        match step {
            Step::Classification => None,
            Step::Weather => Some(StepOutput::Weather(error_payload(message))),
            Step::DisasterHistory => Some(StepOutput::DisasterHistory(error_payload(message))),
            Step::GovernmentReport => Some(StepOutput::GovernmentReport(format!(
                "Error generating government report: {message}"
            ))),
            Step::CitizenGuide => Some(StepOutput::CitizenGuide(format!(
                "Error generating citizen guide: {message}"
            ))),
        }
    }
}

pub fn error_payload(message: &str) -> Value {
    serde_json::json!({ "error": message })
}

/// One slot per step; each slot is written by its owning step only, once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutputs {
    pub classification: Option<String>,
    pub weather: Option<Value>,
    pub disaster_history: Option<Value>,
    pub government_report: Option<String>,
    pub citizen_guide: Option<String>,
}

fn write_once<T: PartialEq>(slot: &mut Option<T>, value: T, step: Step) -> Result<(), StateError> {
    match slot {
        Some(existing) if *existing == value => Ok(()),
        Some(_) => Err(StateError::OutputConflict(step)),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}

impl StepOutputs {
    pub fn put(&mut self, output: StepOutput) -> Result<(), StateError> {
        let step = output.step();
        match output {
            StepOutput::Classification(v) => write_once(&mut self.classification, v, step),
            StepOutput::Weather(v) => write_once(&mut self.weather, v, step),
            StepOutput::DisasterHistory(v) => write_once(&mut self.disaster_history, v, step),
            StepOutput::GovernmentReport(v) => write_once(&mut self.government_report, v, step),
            StepOutput::CitizenGuide(v) => write_once(&mut self.citizen_guide, v, step),
        }
    }

    pub fn get(&self, step: Step) -> Option<StepOutput> {
        match step {
            Step::Classification => self.classification.clone().map(StepOutput::Classification),
            Step::Weather => self.weather.clone().map(StepOutput::Weather),
            Step::DisasterHistory => self.disaster_history.clone().map(StepOutput::DisasterHistory),
            Step::GovernmentReport => {
                self.government_report.clone().map(StepOutput::GovernmentReport)
            }
            Step::CitizenGuide => self.citizen_guide.clone().map(StepOutput::CitizenGuide),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub input: Arc<ReportInput>,
    pub outputs: StepOutputs,
    pub statuses: StepStatuses,
    pub ledger: ExecutionLedger,
    ready: Option<bool>,
    run_status: RunStatus,
}

impl ExecutionState {
    pub fn new(input: ReportInput) -> Self {
        Self {
            input: Arc::new(input),
            outputs: StepOutputs::default(),
            statuses: StepStatuses::new(),
            ledger: ExecutionLedger::new(),
            ready: None,
            run_status: RunStatus::Pending,
        }
    }

    /// Registers a step's terminal status together with its output.
    pub fn finish(
        &mut self,
        step: Step,
        status: StepStatus,
        output: Option<StepOutput>,
    ) -> Result<(), StateError> {
        if let Some(output) = output {
            debug_assert_eq!(output.step(), step);
            self.outputs.put(output)?;
        }
        self.statuses.record(step, status)
    }

    pub fn readiness(&self) -> Option<bool> {
        self.ready
    }

    pub fn is_ready(&self) -> bool {
        self.ready.unwrap_or(false)
    }

    pub fn set_ready(&mut self, ready: bool) -> Result<(), StateError> {
        if self.ready.is_some() {
            return Err(StateError::ReadinessAlreadySet);
        }
        self.ready = Some(ready);
        Ok(())
    }

    pub fn run_status(&self) -> RunStatus {
        self.run_status
    }

    pub(super) fn set_run_status(&mut self, status: RunStatus) {
        self.run_status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_input;

    #[test]
    fn test_statuses_start_pending_for_every_step() {
        let statuses = StepStatuses::new();
        assert_eq!(statuses.len(), 5);
        assert_eq!(statuses.count(StepStatus::Pending), 5);
        assert!(!statuses.all_terminal());
    }

    #[test]
    fn test_status_is_write_once() {
        let mut statuses = StepStatuses::new();
        statuses.record(Step::Weather, StepStatus::Failed).unwrap();
        statuses.record(Step::Weather, StepStatus::Failed).unwrap();

        let err = statuses
            .record(Step::Weather, StepStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, StateError::StatusConflict { step: Step::Weather, .. }));
        assert_eq!(statuses.get(Step::Weather), StepStatus::Failed);

        assert_eq!(
            statuses.record(Step::Weather, StepStatus::Pending),
            Err(StateError::NotTerminal(Step::Weather))
        );
    }

    #[test]
    fn test_statuses_serialize_with_component_names() {
        let mut statuses = StepStatuses::new();
        statuses.record(Step::Classification, StepStatus::Completed).unwrap();
        let json = serde_json::to_value(&statuses).unwrap();
        assert_eq!(json["computer_vision_ai"], "completed");
        assert_eq!(json["citizen_survival_ai"], "pending");
    }

    #[test]
    fn test_outputs_are_write_once() {
        let mut outputs = StepOutputs::default();
        outputs
            .put(StepOutput::Classification("FIRE".to_string()))
            .unwrap();
        outputs
            .put(StepOutput::Classification("FIRE".to_string()))
            .unwrap();
        assert_eq!(
            outputs.put(StepOutput::Classification("FLOOD".to_string())),
            Err(StateError::OutputConflict(Step::Classification))
        );
        assert_eq!(outputs.classification.as_deref(), Some("FIRE"));
    }

    #[test]
    fn test_readiness_is_set_once() {
        let mut state = ExecutionState::new(sample_input());
        assert_eq!(state.readiness(), None);
        assert!(!state.is_ready());

        state.set_ready(true).unwrap();
        assert_eq!(state.set_ready(false), Err(StateError::ReadinessAlreadySet));
        assert!(state.is_ready());
    }

    #[test]
    fn test_error_placeholders() {
        assert_eq!(StepOutput::error_placeholder(Step::Classification, "boom"), None);
        assert_eq!(
            StepOutput::error_placeholder(Step::Weather, "timeout"),
            Some(StepOutput::Weather(serde_json::json!({"error": "timeout"})))
        );
        match StepOutput::error_placeholder(Step::CitizenGuide, "boom") {
            Some(StepOutput::CitizenGuide(text)) => assert!(text.starts_with("Error")),
            other => panic!("unexpected placeholder {other:?}"),
        }
    }
}
