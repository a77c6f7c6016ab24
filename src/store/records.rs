use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of `disasters`: the submitted report plus every pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DisasterRecord {
    pub disaster_id: String,
    pub emergency_type: String,
    pub urgency_level: String,
    pub situation: String,
    pub people_count: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub geohash: String,
    pub classification: Option<String>,
    pub weather: Option<serde_json::Value>,
    pub disaster_history: Option<serde_json::Value>,
    pub government_report: Option<String>,
    pub citizen_survival_guide: Option<String>,
    pub user_id: String,
    pub submitted_time: DateTime<Utc>,
    pub ai_processing_time: f64,
    pub status: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Shape of `nearby_disasters` results: the record without reports and
/// external payloads.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct NearbyDisaster {
    pub disaster_id: String,
    pub emergency_type: String,
    pub urgency_level: String,
    pub situation: String,
    pub people_count: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub geohash: String,
    pub status: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&DisasterRecord> for NearbyDisaster {
    fn from(r: &DisasterRecord) -> Self {
        Self {
            disaster_id: r.disaster_id.clone(),
            emergency_type: r.emergency_type.clone(),
            urgency_level: r.urgency_level.clone(),
            situation: r.situation.clone(),
            people_count: r.people_count,
            latitude: r.latitude,
            longitude: r.longitude,
            geohash: r.geohash.clone(),
            status: r.status.clone(),
            image_url: r.image_url.clone(),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContext {
    pub emergency_type: String,
    pub urgency_level: String,
    pub people_count: i32,
    pub latitude: f64,
    pub longitude: f64,
}

/// One row of `execution_ledgers`. The JSON columns hold the serialized
/// summary, status map, log and context.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LedgerRecord {
    pub disaster_id: String,
    pub processing_start_time: DateTime<Utc>,
    pub processing_end_time: DateTime<Utc>,
    pub total_processing_time: f64,
    pub components_summary: serde_json::Value,
    pub components_status: serde_json::Value,
    pub final_status: String,
    pub logs: serde_json::Value,
    pub emergency_context: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A resource (shelter, hospital, depot) registered against a disaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resource {
    pub resource_id: String,
    pub disaster_id: String,
    pub name: String,
    pub resource_type: String,
    pub description: Option<String>,
    pub contact: Option<String>,
    pub status: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}
