//! In-crate fakes for the collaborator traits.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::llm::{GenerateRequest, GenerateResponse, Provider};
use crate::lookup::{GeoLookup, LookupError};
use crate::pipeline::{ExecutionState, ReportInput};
use crate::store::{
    DisasterRecord, ImageStore, LedgerRecord, NearbyDisaster, RecordStore, Resource, StoreError,
};
use crate::tasks::{HelpRequestRecord, ResponseTask};
use crate::vision::{Classification, ClassificationError, Classifier};

pub struct FakeProvider {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for FakeProvider {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(GenerateResponse {
                content: text.clone(),
                model: req.model.clone(),
                input_tokens: 10,
                output_tokens: 5,
                finish_reason: "stop".to_string(),
                provider: "fake".to_string(),
            }),
            Err(message) => Err(anyhow::anyhow!("{message}")),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn text_request(prompt: &str) -> GenerateRequest {
    GenerateRequest {
        model: "test-model".to_string(),
        system: "You are terse.".to_string(),
        prompt: prompt.to_string(),
        image: None,
        temperature: 0.0,
        max_tokens: 64,
        stage: "test".to_string(),
    }
}

/// A few bytes that sniff as JPEG.
pub fn sample_image() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00]
}

pub fn sample_input() -> ReportInput {
    ReportInput {
        image: sample_image().into(),
        emergency_type: "fire".to_string(),
        urgency_level: "urgent".to_string(),
        situation: "Warehouse on fire, two people trapped".to_string(),
        people_count: 2,
        latitude: 57.64911,
        longitude: 10.40744,
        submitter_id: "user-42".to_string(),
        submitted_at: Utc::now(),
    }
}

pub fn sample_state() -> ExecutionState {
    ExecutionState::new(sample_input())
}

pub fn sample_disaster(created_at: DateTime<Utc>) -> DisasterRecord {
    DisasterRecord {
        disaster_id: "u4pr_1700000000_ab12cd34".to_string(),
        emergency_type: "fire".to_string(),
        urgency_level: "urgent".to_string(),
        situation: "Warehouse on fire".to_string(),
        people_count: 4,
        latitude: 57.64911,
        longitude: 10.40744,
        geohash: "u4pr".to_string(),
        classification: Some("The image likely shows a FIRE scene".to_string()),
        weather: None,
        disaster_history: None,
        government_report: Some("report".to_string()),
        citizen_survival_guide: Some("guide".to_string()),
        user_id: "user-42".to_string(),
        submitted_time: created_at,
        ai_processing_time: 1.5,
        status: "accepted".to_string(),
        image_url: String::new(),
        created_at,
    }
}

pub struct FakeClassifier {
    outcome: Result<Classification, ClassificationError>,
}

impl FakeClassifier {
    pub fn fire(people_count: u32) -> Self {
        Self {
            outcome: Ok(Classification {
                label: "fire".to_string(),
                confidence: 0.93,
                people_count,
            }),
        }
    }

    pub fn failing(err: ClassificationError) -> Self {
        Self { outcome: Err(err) }
    }
}

#[async_trait::async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, _image: &[u8]) -> Result<Classification, ClassificationError> {
        self.outcome.clone()
    }
}

pub struct FakeLookup {
    name: String,
    outcome: Result<Value, LookupError>,
    delay: Duration,
}

impl FakeLookup {
    pub fn replying(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(payload),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(name: &str, err: LookupError) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err(err),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

#[async_trait::async_trait]
impl GeoLookup for FakeLookup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _latitude: f64, _longitude: f64) -> Result<Value, LookupError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

#[derive(Default)]
struct MemoryTables {
    disasters: Vec<DisasterRecord>,
    ledgers: Vec<LedgerRecord>,
    resources: Vec<Resource>,
    tasks: Vec<ResponseTask>,
    help_requests: Vec<HelpRequestRecord>,
    fail_disaster_writes: bool,
    fail_ledger_writes: bool,
    fail_resources: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
}

fn unavailable() -> StoreError {
    StoreError::Io(std::io::Error::other("store unavailable"))
}

impl MemoryStore {
    pub fn insert_disaster(&self, record: DisasterRecord) {
        self.tables.lock().unwrap().disasters.push(record);
    }

    pub fn insert_resource(&self, resource: Resource) {
        self.tables.lock().unwrap().resources.push(resource);
    }

    pub fn fail_disaster_writes(&self) {
        self.tables.lock().unwrap().fail_disaster_writes = true;
    }

    pub fn fail_ledger_writes(&self) {
        self.tables.lock().unwrap().fail_ledger_writes = true;
    }

    pub fn fail_resources(&self) {
        self.tables.lock().unwrap().fail_resources = true;
    }

    pub fn disasters(&self) -> Vec<DisasterRecord> {
        self.tables.lock().unwrap().disasters.clone()
    }

    pub fn ledgers(&self) -> Vec<LedgerRecord> {
        self.tables.lock().unwrap().ledgers.clone()
    }

    pub fn tasks(&self) -> Vec<ResponseTask> {
        self.tables.lock().unwrap().tasks.clone()
    }

    pub fn help_requests(&self) -> Vec<HelpRequestRecord> {
        self.tables.lock().unwrap().help_requests.clone()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn save_disaster(&self, record: &DisasterRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.fail_disaster_writes {
            return Err(unavailable());
        }
        tables.disasters.push(record.clone());
        Ok(())
    }

    async fn save_ledger(&self, record: &LedgerRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.fail_ledger_writes {
            return Err(unavailable());
        }
        tables.ledgers.push(record.clone());
        Ok(())
    }

    async fn get_disaster(&self, disaster_id: &str) -> Result<Option<DisasterRecord>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .disasters
            .iter()
            .find(|d| d.disaster_id == disaster_id)
            .cloned())
    }

    async fn get_ledger(&self, disaster_id: &str) -> Result<Option<LedgerRecord>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .ledgers
            .iter()
            .find(|l| l.disaster_id == disaster_id)
            .cloned())
    }

    async fn nearby_disasters(
        &self,
        geohash_prefix: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<NearbyDisaster>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let mut found: Vec<NearbyDisaster> = tables
            .disasters
            .iter()
            .filter(|d| d.geohash.starts_with(geohash_prefix) && d.created_at >= since)
            .map(NearbyDisaster::from)
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn disaster_resources(&self, disaster_id: &str) -> Result<Vec<Resource>, StoreError> {
        let tables = self.tables.lock().unwrap();
        if tables.fail_resources {
            return Err(unavailable());
        }
        Ok(tables
            .resources
            .iter()
            .filter(|r| r.disaster_id == disaster_id)
            .cloned()
            .collect())
    }

    async fn save_task(&self, task: &ResponseTask) -> Result<(), StoreError> {
        self.tables.lock().unwrap().tasks.push(task.clone());
        Ok(())
    }

    async fn save_help_request(&self, request: &HelpRequestRecord) -> Result<(), StoreError> {
        self.tables.lock().unwrap().help_requests.push(request.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryImages {
    fail: bool,
}

impl MemoryImages {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait::async_trait]
impl ImageStore for MemoryImages {
    async fn put(&self, disaster_id: &str, _image: &[u8]) -> Result<String, StoreError> {
        if self.fail {
            return Err(unavailable());
        }
        Ok(format!("memory://disaster_images/{disaster_id}.jpg"))
    }
}
