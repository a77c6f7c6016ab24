pub mod disasters;
pub mod ledgers;
pub mod pool;
pub mod tasks;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::store::{
    DisasterRecord, LedgerRecord, NearbyDisaster, RecordStore, Resource, StoreError,
};
use crate::tasks::{HelpRequestRecord, ResponseTask};

/// PostgreSQL-backed record store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordStore for PgStore {
    async fn save_disaster(&self, record: &DisasterRecord) -> Result<(), StoreError> {
        Ok(disasters::insert_disaster(&self.pool, record).await?)
    }

    async fn save_ledger(&self, record: &LedgerRecord) -> Result<(), StoreError> {
        Ok(ledgers::insert_ledger(&self.pool, record).await?)
    }

    async fn get_disaster(&self, disaster_id: &str) -> Result<Option<DisasterRecord>, StoreError> {
        Ok(disasters::get_disaster(&self.pool, disaster_id).await?)
    }

    async fn get_ledger(&self, disaster_id: &str) -> Result<Option<LedgerRecord>, StoreError> {
        Ok(ledgers::get_ledger(&self.pool, disaster_id).await?)
    }

    async fn nearby_disasters(
        &self,
        geohash_prefix: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<NearbyDisaster>, StoreError> {
        Ok(disasters::nearby_disasters(&self.pool, geohash_prefix, since).await?)
    }

    async fn disaster_resources(&self, disaster_id: &str) -> Result<Vec<Resource>, StoreError> {
        Ok(tasks::list_resources(&self.pool, disaster_id).await?)
    }

    async fn save_task(&self, task: &ResponseTask) -> Result<(), StoreError> {
        Ok(tasks::insert_task(&self.pool, task).await?)
    }

    async fn save_help_request(&self, request: &HelpRequestRecord) -> Result<(), StoreError> {
        Ok(tasks::upsert_help_request(&self.pool, request).await?)
    }
}
