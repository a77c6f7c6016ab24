//! The five branch implementations. Each one writes only its own output slot
//! and status entry and never returns an error: failures become data.

use std::sync::Arc;

use serde_json::Value;

use super::fanout::StepRunner;
use super::state::{ExecutionState, ReportInput, Step, StepOutput, StepStatus, error_payload};
use crate::llm::{GenerateRequest, ImageAttachment, LlmClient};
use crate::lookup::GeoLookup;
use crate::vision::Classifier;

pub const INSUFFICIENT_DATA_REPORT: &str = "Error: Insufficient data for analysis";
pub const INSUFFICIENT_DATA_GUIDE: &str = "Error: Insufficient data for guidance";

/// Records the terminal status, logging instead of failing if the slot was
/// somehow already taken on this copy.
fn settle(state: &mut ExecutionState, step: Step, status: StepStatus, output: Option<StepOutput>) {
    if let Err(err) = state.finish(step, status, output) {
        state.ledger.error(step.component(), format!("Could not record result: {err}"));
    }
}

pub struct ClassificationStep {
    classifier: Arc<dyn Classifier>,
}

impl ClassificationStep {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait::async_trait]
impl StepRunner for ClassificationStep {
    fn step(&self) -> Step {
        Step::Classification
    }

    #[tracing::instrument(name = "pipeline_stage classify", skip_all, fields(pipeline.stage = "classify"))]
    async fn run(&self, mut state: ExecutionState) -> ExecutionState {
        let component = Step::Classification.component();
        state
            .ledger
            .info(component, "Classifying scene and counting people");

        let result = self.classifier.classify(&state.input.image).await;
        match result {
            Ok(classification) => {
                let summary = classification.summary();
                state.ledger.success(
                    component,
                    format!("Analysis completed: {}", preview(&summary, 100)),
                );
                settle(
                    &mut state,
                    Step::Classification,
                    StepStatus::Completed,
                    Some(StepOutput::Classification(summary)),
                );
            }
            Err(err) => {
                state.ledger.error(component, format!("Failed: {err}"));
                settle(&mut state, Step::Classification, StepStatus::Failed, None);
            }
        }
        state
    }
}

/// Weather or historical-disaster lookup. A failed call stores
/// `{"error": <message>}` in place of the payload.
pub struct LookupStep {
    step: Step,
    source: Arc<dyn GeoLookup>,
}

impl LookupStep {
    pub fn weather(source: Arc<dyn GeoLookup>) -> Self {
        Self {
            step: Step::Weather,
            source,
        }
    }

    pub fn disaster_history(source: Arc<dyn GeoLookup>) -> Self {
        Self {
            step: Step::DisasterHistory,
            source,
        }
    }

    fn wrap(&self, payload: Value) -> StepOutput {
        match self.step {
            Step::DisasterHistory => StepOutput::DisasterHistory(payload),
            _ => StepOutput::Weather(payload),
        }
    }
}

#[async_trait::async_trait]
impl StepRunner for LookupStep {
    fn step(&self) -> Step {
        self.step
    }

    #[tracing::instrument(
        name = "pipeline_stage lookup",
        skip_all,
        fields(pipeline.stage = %self.step, lookup.source = self.source.name())
    )]
    async fn run(&self, mut state: ExecutionState) -> ExecutionState {
        let component = self.step.component();
        let (lat, lon) = (state.input.latitude, state.input.longitude);
        state.ledger.info(
            component,
            format!("Fetching data from {} for ({lat}, {lon})", self.source.name()),
        );

        match self.source.fetch(lat, lon).await {
            Ok(payload) => {
                state
                    .ledger
                    .success(component, "Data collected successfully");
                settle(&mut state, self.step, StepStatus::Completed, Some(self.wrap(payload)));
            }
            Err(err) => {
                let message = err.to_string();
                state.ledger.error(component, format!("Failed: {message}"));
                let output = self.wrap(error_payload(&message));
                settle(&mut state, self.step, StepStatus::Failed, Some(output));
            }
        }
        state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Government,
    Citizen,
}

impl ReportKind {
    fn step(self) -> Step {
        match self {
            ReportKind::Government => Step::GovernmentReport,
            ReportKind::Citizen => Step::CitizenGuide,
        }
    }

    fn output(self, text: String) -> StepOutput {
        match self {
            ReportKind::Government => StepOutput::GovernmentReport(text),
            ReportKind::Citizen => StepOutput::CitizenGuide(text),
        }
    }

    fn insufficient_data(self) -> &'static str {
        match self {
            ReportKind::Government => INSUFFICIENT_DATA_REPORT,
            ReportKind::Citizen => INSUFFICIENT_DATA_GUIDE,
        }
    }
}

/// Text-plus-image report generation, gated on readiness.
pub struct ReportStep {
    kind: ReportKind,
    llm: Arc<LlmClient>,
    model: String,
}

impl ReportStep {
    pub fn new(kind: ReportKind, llm: Arc<LlmClient>, model: &str) -> Self {
        Self {
            kind,
            llm,
            model: model.to_string(),
        }
    }

    fn request(&self, state: &ExecutionState) -> GenerateRequest {
        let (system, prompt, stage) = match self.kind {
            ReportKind::Government => (
                GOVERNMENT_SYSTEM,
                government_prompt(state),
                "government_report",
            ),
            ReportKind::Citizen => (CITIZEN_SYSTEM, citizen_prompt(state), "citizen_guide"),
        };
        GenerateRequest {
            model: self.model.clone(),
            system: system.to_string(),
            prompt,
            image: Some(ImageAttachment::from_bytes(&state.input.image)),
            temperature: 0.4,
            max_tokens: 4096,
            stage: stage.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl StepRunner for ReportStep {
    fn step(&self) -> Step {
        self.kind.step()
    }

    #[tracing::instrument(
        name = "pipeline_stage report",
        skip_all,
        fields(pipeline.stage = %self.kind.step(), report.chars)
    )]
    async fn run(&self, mut state: ExecutionState) -> ExecutionState {
        let step = self.kind.step();
        let component = step.component();

        if !state.is_ready() {
            state
                .ledger
                .error(component, "Cannot proceed: insufficient data");
            let output = self.kind.output(self.kind.insufficient_data().to_string());
            settle(&mut state, step, StepStatus::Failed, Some(output));
            return state;
        }

        state
            .ledger
            .info(component, format!("Generating report with {}", self.model));

        match self.llm.generate_text(&self.request(&state)).await {
            Ok(text) => {
                tracing::Span::current().record("report.chars", text.len());
                state.ledger.success(component, "Report generated successfully");
                settle(&mut state, step, StepStatus::Completed, Some(self.kind.output(text)));
            }
            Err(err) => {
                let message = err.to_string();
                state.ledger.error(component, format!("Failed: {message}"));
                settle(
                    &mut state,
                    step,
                    StepStatus::Failed,
                    StepOutput::error_placeholder(step, &message),
                );
            }
        }
        state
    }
}

const GOVERNMENT_SYSTEM: &str = "You are an emergency management analyst supporting a \
    government response team. Write formal, specific and actionable reports.";

const CITIZEN_SYSTEM: &str = "You are a calm emergency advisor speaking directly to people \
    caught in a disaster. Use simple, clear language.";

fn render(value: Option<&Value>) -> String {
    value.map_or_else(|| "unavailable".to_string(), Value::to_string)
}

fn incident_lines(input: &ReportInput) -> String {
    format!(
        "- Emergency Type: {}\n\
         - Urgency Level: {}\n\
         - Situation Description: {}\n\
         - People Affected: {}\n\
         - GPS Coordinates: {}, {}",
        input.emergency_type,
        input.urgency_level,
        input.situation,
        input.people_count,
        input.latitude,
        input.longitude,
    )
}

fn government_prompt(state: &ExecutionState) -> String {
    format!(
        "EMERGENCY SITUATION REPORT FOR GOVERNMENT RESPONSE TEAM\n\n\
         Basic Information:\n{}\n\n\
         Image Analysis: {}\n\
         Weather Data: {}\n\
         Historical Disasters (GDACS): {}\n\n\
         Create a government emergency response report with these sections:\n\
         1. THREAT ASSESSMENT: severity on a 1-10 scale, and whether the threat is genuine or a \
         false alarm judged from the image analysis and weather data.\n\
         2. FUTURE PROJECTIONS: likely evolution over the next 24-72 hours, weather impact on \
         operations, and risk of escalation given the historical disasters.\n\
         3. RESOURCE REQUIREMENTS: personnel, equipment, medical supplies, shelter and logistics.\n\
         4. DEPLOYMENT DECISION: whether reinforcements should be sent (YES/NO with reasoning), \
         allocation priority and response timeline.\n\
         5. COORDINATION: agencies to involve, evacuation zones and public safety measures.\n\n\
         Format it as a formal government emergency response report.",
        incident_lines(&state.input),
        state.outputs.classification.as_deref().unwrap_or("unavailable"),
        render(state.outputs.weather.as_ref()),
        render(state.outputs.disaster_history.as_ref()),
    )
}

fn citizen_prompt(state: &ExecutionState) -> String {
    let current_weather = state
        .outputs
        .weather
        .as_ref()
        .and_then(|w| w.get("current_weather"));
    format!(
        "CITIZEN SITUATION:\n\
         - Emergency Type: {}\n\
         - Your Location: {}, {}\n\
         - Current Weather: {}\n\
         - Number of People with You: {}\n\
         - Recent Disasters Nearby: {}\n\n\
         Write a practical survival guide with these sections:\n\
         1. IMMEDIATE SAFETY ACTIONS for the next 30 minutes: what to do now, where to \
         position yourself, what to avoid.\n\
         2. WHAT TO EXPECT: how conditions may change given the weather and recent disasters, \
         signs that help is coming, what rescue teams will do.\n\
         3. SHELTER AND PROTECTION: finding safe shelter, protection from the weather, basic \
         first aid for injuries common in this disaster, warning signs needing attention.\n\
         4. COMMUNICATION AND SIGNALING: signalling for help, conserving phone battery, \
         visible distress signals.\n\n\
         Focus on practical actions, not technical analysis.",
        state.input.emergency_type,
        state.input.latitude,
        state.input.longitude,
        render(current_weather),
        state.input.people_count,
        render(state.outputs.disaster_history.as_ref()),
    )
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}
