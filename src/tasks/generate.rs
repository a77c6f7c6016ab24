use std::sync::Arc;

use opentelemetry::KeyValue;
use serde::Serialize;

use super::{HelpRequest, ResponseTask, TaskSource, Urgency};
use crate::geo::planar_distance;
use crate::llm::{GenerateRequest, LlmClient};
use crate::store::{DisasterRecord, Resource};
use crate::telemetry::metrics::TASKS_GENERATED;

const MAX_NEARBY_RESOURCES: usize = 5;
const RESOURCES_IN_PROMPT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResource {
    #[serde(flatten)]
    pub resource: Resource,
    pub distance: f64,
}

/// Closest resources first, at most five.
pub fn rank_resources(resources: Vec<Resource>, latitude: f64, longitude: f64) -> Vec<RankedResource> {
    let mut ranked: Vec<RankedResource> = resources
        .into_iter()
        .map(|resource| {
            let distance = planar_distance(
                (latitude, longitude),
                (resource.latitude, resource.longitude),
            );
            RankedResource { resource, distance }
        })
        .collect();
    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    ranked.truncate(MAX_NEARBY_RESOURCES);
    ranked
}

/// Writes task descriptions with the LLM, falling back to a fixed template
/// whenever the model fails or answers with nothing.
pub struct TaskGenerator {
    llm: Arc<LlmClient>,
    model: String,
}

impl TaskGenerator {
    pub fn new(llm: Arc<LlmClient>, model: &str) -> Self {
        Self {
            llm,
            model: model.to_string(),
        }
    }

    #[tracing::instrument(name = "tasks.generate disaster", skip_all, fields(disaster.id = %disaster.disaster_id, task.source))]
    pub async fn for_disaster(&self, disaster: &DisasterRecord) -> ResponseTask {
        let urgency = Urgency::normalise(&disaster.urgency_level);
        let prompt = format!(
            "A disaster has occurred with the following details. Generate a short emergency \
             response task: direct (1-2 sentences), focused on saving lives or delivering aid, \
             naming the most relevant types of aid.\n\n\
             Emergency Type: {}\n\
             Urgency: {}\n\
             Coordinates: Latitude {}, Longitude {}\n\
             People Affected: {}\n\
             Situation: {}\n\n\
             Example output: \"Rescue {} people affected by {} at coordinates ({}, {}). \
             Provide immediate shelter and water.\"",
            disaster.emergency_type,
            urgency.as_str(),
            disaster.latitude,
            disaster.longitude,
            disaster.people_count,
            disaster.situation,
            disaster.people_count,
            disaster.emergency_type,
            disaster.latitude,
            disaster.longitude,
        );
        let fallback = format!(
            "Rescue {} people affected by {} at coordinates ({}, {}). Situation: {}",
            disaster.people_count,
            disaster.emergency_type,
            disaster.latitude,
            disaster.longitude,
            disaster.situation,
        );

        let (description, source) = self.describe(prompt, fallback, "disaster_task").await;
        let mut task = ResponseTask::pending(
            &disaster.disaster_id,
            description,
            source,
            urgency,
            &disaster.emergency_type,
            disaster.latitude,
            disaster.longitude,
        );
        task.people_count = Some(disaster.people_count);
        task
    }

    #[tracing::instrument(
        name = "tasks.generate help_request",
        skip_all,
        fields(disaster.id = %request.disaster_id, resources = resources.len(), task.source)
    )]
    pub async fn for_help_request(
        &self,
        request: &HelpRequest,
        emergency_type: &str,
        resources: &[RankedResource],
    ) -> ResponseTask {
        let urgency = Urgency::normalise(&request.urgency_type);

        let mut resource_info = String::new();
        if !resources.is_empty() {
            resource_info.push_str("Nearby available resources:\n");
            for ranked in resources.iter().take(RESOURCES_IN_PROMPT) {
                let r = &ranked.resource;
                resource_info.push_str(&format!(
                    "- {}: {} at ({}, {})\n  Description: {}\n  Contact: {}\n  Status: {}\n\n",
                    r.name,
                    r.resource_type,
                    r.latitude,
                    r.longitude,
                    r.description.as_deref().unwrap_or("No description"),
                    r.contact.as_deref().unwrap_or("No contact"),
                    r.status.as_deref().unwrap_or("unknown"),
                ));
            }
        }

        let prompt = format!(
            "An emergency request requires first responder and volunteer action. Generate a \
             short, direct task (maximum 2 sentences) telling responders what to do for this \
             person.\n\n\
             Emergency Type: {emergency_type}\n\
             Help Needed: {}\n\
             Urgency: {}\n\
             Location: ({}, {})\n\n\
             {resource_info}\
             If a suitable nearby resource exists, include instructions to coordinate with it. \
             Describe what the responders should DO, not what the person in need should do.",
            request.help,
            urgency.as_str(),
            request.latitude,
            request.longitude,
        );
        let mut fallback = format!(
            "Assist person needing {} at location ({}, {}).",
            request.help, request.latitude, request.longitude
        );
        if let Some(closest) = resources.first() {
            fallback.push_str(&format!(
                " Direct to {} for assistance.",
                closest.resource.name
            ));
        }

        let (description, source) = self.describe(prompt, fallback, "help_request_task").await;
        let mut task = ResponseTask::pending(
            &request.disaster_id,
            description,
            source,
            urgency,
            emergency_type,
            request.latitude,
            request.longitude,
        );
        task.help_needed = Some(request.help.clone());
        task.user_id = Some(request.user_id.clone());
        task
    }

    async fn describe(&self, prompt: String, fallback: String, stage: &str) -> (String, TaskSource) {
        let request = GenerateRequest {
            model: self.model.clone(),
            system: "You write concise field instructions for emergency responders.".to_string(),
            prompt,
            image: None,
            temperature: 0.3,
            max_tokens: 256,
            stage: stage.to_string(),
        };

        let (description, source) = match self.llm.generate_text(&request).await {
            Ok(text) => (text, TaskSource::Llm),
            Err(err) => {
                tracing::warn!(error = %err, "Task generation failed, using template");
                (fallback, TaskSource::Fallback)
            }
        };

        TASKS_GENERATED.add(1, &[KeyValue::new("task.source", source.as_str())]);
        tracing::Span::current().record("task.source", source.as_str());
        (description, source)
    }
}
