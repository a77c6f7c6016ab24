use sqlx::PgPool;

use crate::store::LedgerRecord;

#[tracing::instrument(name = "db.ledgers.insert", skip_all, fields(disaster.id = %record.disaster_id))]
pub async fn insert_ledger(pool: &PgPool, record: &LedgerRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO execution_ledgers \
         (disaster_id, processing_start_time, processing_end_time, total_processing_time, \
          components_summary, components_status, final_status, logs, emergency_context, \
          created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(&record.disaster_id)
    .bind(record.processing_start_time)
    .bind(record.processing_end_time)
    .bind(record.total_processing_time)
    .bind(&record.components_summary)
    .bind(&record.components_status)
    .bind(&record.final_status)
    .bind(&record.logs)
    .bind(&record.emergency_context)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

#[tracing::instrument(name = "db.ledgers.get", skip(pool))]
pub async fn get_ledger(pool: &PgPool, disaster_id: &str) -> Result<Option<LedgerRecord>, sqlx::Error> {
    sqlx::query_as::<_, LedgerRecord>(
        "SELECT disaster_id, processing_start_time, processing_end_time, total_processing_time, \
         components_summary, components_status, final_status, logs, emergency_context, created_at \
         FROM execution_ledgers WHERE disaster_id = $1",
    )
    .bind(disaster_id)
    .fetch_optional(pool)
    .await
}
