//! Response tasks: turning a disaster or a single help request into an
//! actionable instruction for volunteers and first responders.

pub mod generate;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use generate::{RankedResource, TaskGenerator, rank_resources};
pub use service::{HelpRequestOutcome, TaskError, TaskService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    /// Maps the free-form urgency labels used by the submission forms.
    pub fn normalise(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "urgent" | "high" => Urgency::High,
            "medium" | "moderate" => Urgency::Medium,
            _ => Urgency::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        }
    }

    pub fn roles(self) -> Vec<ResponderRole> {
        match self {
            Urgency::High => vec![ResponderRole::Volunteer, ResponderRole::FirstResponder],
            Urgency::Medium => vec![ResponderRole::FirstResponder],
            Urgency::Low => vec![ResponderRole::Volunteer],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponderRole {
    #[serde(rename = "vol")]
    Volunteer,
    #[serde(rename = "fr")]
    FirstResponder,
}

impl ResponderRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponderRole::Volunteer => "vol",
            ResponderRole::FirstResponder => "fr",
        }
    }
}

/// Where a task description came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    Llm,
    Fallback,
}

impl TaskSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskSource::Llm => "llm",
            TaskSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTask {
    pub task_id: Uuid,
    pub disaster_id: String,
    pub description: String,
    pub status: String,
    pub complete_by: String,
    pub roles: Vec<ResponderRole>,
    pub emergency_type: String,
    pub urgency_level: Urgency,
    pub latitude: f64,
    pub longitude: f64,
    pub people_count: Option<i32>,
    pub help_needed: Option<String>,
    pub user_id: Option<String>,
    pub source: TaskSource,
    pub created_at: DateTime<Utc>,
}

impl ResponseTask {
    pub(crate) fn pending(
        disaster_id: &str,
        description: String,
        source: TaskSource,
        urgency: Urgency,
        emergency_type: &str,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            disaster_id: disaster_id.to_string(),
            description,
            status: "pending".to_string(),
            complete_by: String::new(),
            roles: urgency.roles(),
            emergency_type: emergency_type.to_string(),
            urgency_level: urgency,
            latitude,
            longitude,
            people_count: None,
            help_needed: None,
            user_id: None,
            source,
            created_at: Utc::now(),
        }
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.as_str().to_string()).collect()
    }
}

/// A person at a disaster asking for a specific kind of help.
#[derive(Debug, Clone, Deserialize)]
pub struct HelpRequest {
    #[serde(default)]
    pub disaster_id: String,
    pub user_id: String,
    pub help: String,
    pub urgency_type: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelpRequestRecord {
    pub disaster_id: String,
    pub user_id: String,
    pub help: String,
    pub urgency_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub emergency_type: String,
    pub task_id: Uuid,
    pub status: String,
    pub feedback: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}
