use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::store::{DisasterRecord, NearbyDisaster};

#[tracing::instrument(name = "db.disasters.insert", skip_all, fields(disaster.id = %record.disaster_id))]
pub async fn insert_disaster(pool: &PgPool, record: &DisasterRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO disasters \
         (disaster_id, emergency_type, urgency_level, situation, people_count, \
          latitude, longitude, geohash, classification, weather, disaster_history, \
          government_report, citizen_survival_guide, user_id, submitted_time, \
          ai_processing_time, status, image_url, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
    )
    .bind(&record.disaster_id)
    .bind(&record.emergency_type)
    .bind(&record.urgency_level)
    .bind(&record.situation)
    .bind(record.people_count)
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(&record.geohash)
    .bind(&record.classification)
    .bind(&record.weather)
    .bind(&record.disaster_history)
    .bind(&record.government_report)
    .bind(&record.citizen_survival_guide)
    .bind(&record.user_id)
    .bind(record.submitted_time)
    .bind(record.ai_processing_time)
    .bind(&record.status)
    .bind(&record.image_url)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

#[tracing::instrument(name = "db.disasters.get", skip(pool))]
pub async fn get_disaster(
    pool: &PgPool,
    disaster_id: &str,
) -> Result<Option<DisasterRecord>, sqlx::Error> {
    sqlx::query_as::<_, DisasterRecord>(
        "SELECT disaster_id, emergency_type, urgency_level, situation, people_count, \
         latitude, longitude, geohash, classification, weather, disaster_history, \
         government_report, citizen_survival_guide, user_id, submitted_time, \
         ai_processing_time, status, image_url, created_at \
         FROM disasters WHERE disaster_id = $1",
    )
    .bind(disaster_id)
    .fetch_optional(pool)
    .await
}

#[tracing::instrument(name = "db.disasters.nearby", skip(pool))]
pub async fn nearby_disasters(
    pool: &PgPool,
    geohash_prefix: &str,
    since: DateTime<Utc>,
) -> Result<Vec<NearbyDisaster>, sqlx::Error> {
    sqlx::query_as::<_, NearbyDisaster>(
        "SELECT disaster_id, emergency_type, urgency_level, situation, people_count, \
         latitude, longitude, geohash, status, image_url, created_at \
         FROM disasters \
         WHERE geohash LIKE $1 || '%' AND created_at >= $2 \
         ORDER BY created_at DESC",
    )
    .bind(geohash_prefix)
    .bind(since)
    .fetch_all(pool)
    .await
}
