//! Persistence seams: where finished runs, tasks and images end up.

pub mod images;
pub mod records;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use images::FsImageStore;
pub use records::{DisasterRecord, EmergencyContext, LedgerRecord, NearbyDisaster, Resource};

use crate::tasks::{HelpRequestRecord, ResponseTask};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("blob storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn save_disaster(&self, record: &DisasterRecord) -> Result<(), StoreError>;
    async fn save_ledger(&self, record: &LedgerRecord) -> Result<(), StoreError>;
    async fn get_disaster(&self, disaster_id: &str) -> Result<Option<DisasterRecord>, StoreError>;
    async fn get_ledger(&self, disaster_id: &str) -> Result<Option<LedgerRecord>, StoreError>;

    /// Disasters whose geohash starts with `geohash_prefix`, created at or
    /// after `since`, newest first.
    async fn nearby_disasters(
        &self,
        geohash_prefix: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<NearbyDisaster>, StoreError>;

    async fn disaster_resources(&self, disaster_id: &str) -> Result<Vec<Resource>, StoreError>;
    async fn save_task(&self, task: &ResponseTask) -> Result<(), StoreError>;
    async fn save_help_request(&self, request: &HelpRequestRecord) -> Result<(), StoreError>;
}

/// Blob storage for the submitted image. Returns the public URL.
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(&self, disaster_id: &str, image: &[u8]) -> Result<String, StoreError>;
}
