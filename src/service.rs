//! Report submission: precondition checks, the analysis run, and hand-off of
//! the finished run to storage.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::geo::{DISASTER_GEOHASH_PRECISION, geohash, valid_coordinates};
use crate::pipeline::{
    ExecutionState, FinalizedRun, Orchestrator, ReportInput, RunStatus, StepStatuses, finalize,
};
use crate::store::{
    DisasterRecord, EmergencyContext, ImageStore, LedgerRecord, NearbyDisaster, RecordStore,
    StoreError,
};

const NEARBY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct SubmitReport {
    pub emergency_type: String,
    pub urgency_level: String,
    pub situation: String,
    pub people_count: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub image: Option<Vec<u8>>,
    pub submitter_id: String,
}

/// What the submitter gets back once the run is stored.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub disaster_id: String,
    pub government_report: String,
    pub citizen_survival_guide: String,
    /// Seconds.
    pub processing_time: f64,
    pub image_url: String,
    pub status: RunStatus,
    pub agents_status: StepStatuses,
    pub ledger_saved: bool,
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("an image is required")]
    MissingImage,

    #[error("invalid report: {0}")]
    InvalidInput(String),

    /// The analysis ran but its result could not be stored.
    #[error("failed to store disaster {disaster_id}: {source}")]
    Persistence {
        disaster_id: String,
        #[source]
        source: StoreError,
    },
}

/// `{geohash4}_{unix_seconds}_{8 hex}`. Unique enough for report ids, not a
/// guarantee.
pub fn disaster_id(latitude: f64, longitude: f64, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{:08x}",
        geohash(latitude, longitude, DISASTER_GEOHASH_PRECISION),
        at.timestamp(),
        fastrand::u32(..)
    )
}

#[derive(Clone)]
pub struct EmergencyService {
    orchestrator: Arc<Orchestrator>,
    records: Arc<dyn RecordStore>,
    images: Arc<dyn ImageStore>,
}

impl EmergencyService {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        records: Arc<dyn RecordStore>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            orchestrator,
            records,
            images,
        }
    }

    #[tracing::instrument(
        name = "emergency.submit",
        skip_all,
        fields(emergency.type = %report.emergency_type, disaster.id, run.status)
    )]
    pub async fn submit_report(&self, report: SubmitReport) -> Result<SubmitOutcome, SubmitError> {
        let image = match report.image {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(SubmitError::MissingImage),
        };
        if !valid_coordinates(report.latitude, report.longitude) {
            return Err(SubmitError::InvalidInput(format!(
                "coordinates ({}, {}) are out of range",
                report.latitude, report.longitude
            )));
        }
        let people_count = i32::try_from(report.people_count).map_err(|_| {
            SubmitError::InvalidInput(format!("people count {} is too large", report.people_count))
        })?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let id = disaster_id(report.latitude, report.longitude, started_at);
        let span = tracing::Span::current();
        span.record("disaster.id", id.as_str());

        let mut state = ExecutionState::new(ReportInput {
            image: Arc::from(image),
            emergency_type: report.emergency_type,
            urgency_level: report.urgency_level,
            situation: report.situation,
            people_count: report.people_count,
            latitude: report.latitude,
            longitude: report.longitude,
            submitter_id: report.submitter_id,
            submitted_at: started_at,
        });
        state.ledger.info(
            "system",
            format!(
                "Emergency report received: {} ({}), disaster id {id}",
                state.input.emergency_type, state.input.urgency_level
            ),
        );

        let upload = self.images.put(&id, &state.input.image).await;
        let image_url = match upload {
            Ok(url) => {
                state.ledger.info("system", "Image stored");
                url
            }
            Err(err) => {
                state
                    .ledger
                    .warn("system", format!("Image upload failed, continuing without it: {err}"));
                String::new()
            }
        };

        let mut state = self.orchestrator.run(state).await;
        let processing_time = clock.elapsed().as_secs_f64();
        let finished_at = Utc::now();
        state.ledger.info(
            "system",
            format!(
                "Processing finished in {processing_time:.2}s with status {}",
                state.run_status().as_str()
            ),
        );

        let disaster = disaster_record(
            &id,
            &state,
            people_count,
            processing_time,
            &image_url,
            finished_at,
        );
        let run = finalize(state);
        span.record("run.status", run.run_status.as_str());

        self.records
            .save_disaster(&disaster)
            .await
            .map_err(|source| SubmitError::Persistence {
                disaster_id: id.clone(),
                source,
            })?;

        let ledger_saved = match ledger_record(&id, &disaster, &run, started_at, finished_at) {
            Ok(record) => match self.records.save_ledger(&record).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::error!(error = %err, disaster.id = %id, "Failed to store execution ledger");
                    false
                }
            },
            Err(err) => {
                tracing::error!(error = %err, disaster.id = %id, "Failed to serialize execution ledger");
                false
            }
        };

        tracing::info!(
            disaster.id = %id,
            run.status = run.run_status.as_str(),
            processing_time,
            "Emergency report processed"
        );

        Ok(SubmitOutcome {
            disaster_id: id,
            government_report: disaster.government_report.unwrap_or_default(),
            citizen_survival_guide: disaster.citizen_survival_guide.unwrap_or_default(),
            processing_time,
            image_url,
            status: run.run_status,
            agents_status: run.components_status,
            ledger_saved,
        })
    }

    /// Recent disasters in the same geohash cell as the point.
    #[tracing::instrument(name = "emergency.nearby", skip(self))]
    pub async fn nearby_disasters(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<NearbyDisaster>, StoreError> {
        let prefix = geohash(latitude, longitude, DISASTER_GEOHASH_PRECISION);
        let since = Utc::now() - Duration::days(NEARBY_WINDOW_DAYS);
        self.records.nearby_disasters(&prefix, since).await
    }
}

fn disaster_record(
    id: &str,
    state: &ExecutionState,
    people_count: i32,
    processing_time: f64,
    image_url: &str,
    created_at: DateTime<Utc>,
) -> DisasterRecord {
    let input = &state.input;
    DisasterRecord {
        disaster_id: id.to_string(),
        emergency_type: input.emergency_type.clone(),
        urgency_level: input.urgency_level.clone(),
        situation: input.situation.clone(),
        people_count,
        latitude: input.latitude,
        longitude: input.longitude,
        geohash: geohash(input.latitude, input.longitude, DISASTER_GEOHASH_PRECISION),
        classification: state.outputs.classification.clone(),
        weather: state.outputs.weather.clone(),
        disaster_history: state.outputs.disaster_history.clone(),
        government_report: state.outputs.government_report.clone(),
        citizen_survival_guide: state.outputs.citizen_guide.clone(),
        user_id: input.submitter_id.clone(),
        submitted_time: input.submitted_at,
        ai_processing_time: processing_time,
        status: state.run_status().as_str().to_string(),
        image_url: image_url.to_string(),
        created_at,
    }
}

fn ledger_record(
    id: &str,
    disaster: &DisasterRecord,
    run: &FinalizedRun,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> Result<LedgerRecord, serde_json::Error> {
    let context = EmergencyContext {
        emergency_type: disaster.emergency_type.clone(),
        urgency_level: disaster.urgency_level.clone(),
        people_count: disaster.people_count,
        latitude: disaster.latitude,
        longitude: disaster.longitude,
    };
    Ok(LedgerRecord {
        disaster_id: id.to_string(),
        processing_start_time: started_at,
        processing_end_time: finished_at,
        total_processing_time: (finished_at - started_at).num_milliseconds() as f64 / 1000.0,
        components_summary: serde_json::to_value(run.summary)?,
        components_status: serde_json::to_value(&run.components_status)?,
        final_status: run.run_status.as_str().to_string(),
        logs: serde_json::to_value(&run.log)?,
        emergency_context: serde_json::to_value(context)?,
        created_at: finished_at,
    })
}
