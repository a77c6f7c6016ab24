use sqlx::PgPool;

use crate::store::Resource;
use crate::tasks::{HelpRequestRecord, ResponseTask};

#[tracing::instrument(name = "db.resources.list", skip(pool))]
pub async fn list_resources(pool: &PgPool, disaster_id: &str) -> Result<Vec<Resource>, sqlx::Error> {
    sqlx::query_as::<_, Resource>(
        "SELECT resource_id, disaster_id, name, resource_type, description, contact, status, \
         latitude, longitude \
         FROM resources WHERE disaster_id = $1",
    )
    .bind(disaster_id)
    .fetch_all(pool)
    .await
}

#[tracing::instrument(name = "db.tasks.insert", skip_all, fields(task.id = %task.task_id))]
pub async fn insert_task(pool: &PgPool, task: &ResponseTask) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO response_tasks \
         (task_id, disaster_id, description, status, complete_by, roles, emergency_type, \
          urgency_level, latitude, longitude, people_count, help_needed, user_id, source, \
          created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(task.task_id)
    .bind(&task.disaster_id)
    .bind(&task.description)
    .bind(&task.status)
    .bind(&task.complete_by)
    .bind(task.role_names())
    .bind(&task.emergency_type)
    .bind(task.urgency_level.as_str())
    .bind(task.latitude)
    .bind(task.longitude)
    .bind(task.people_count)
    .bind(&task.help_needed)
    .bind(&task.user_id)
    .bind(task.source.as_str())
    .bind(task.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upserts by user: a user has at most one open request.
#[tracing::instrument(name = "db.help_requests.upsert", skip_all, fields(task.id = %request.task_id))]
pub async fn upsert_help_request(
    pool: &PgPool,
    request: &HelpRequestRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO help_requests \
         (user_id, disaster_id, help, urgency_type, latitude, longitude, emergency_type, \
          task_id, status, feedback, timestamp_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (user_id) DO UPDATE SET \
          disaster_id = EXCLUDED.disaster_id, help = EXCLUDED.help, \
          urgency_type = EXCLUDED.urgency_type, latitude = EXCLUDED.latitude, \
          longitude = EXCLUDED.longitude, emergency_type = EXCLUDED.emergency_type, \
          task_id = EXCLUDED.task_id, status = EXCLUDED.status, \
          feedback = EXCLUDED.feedback, timestamp_ms = EXCLUDED.timestamp_ms",
    )
    .bind(&request.user_id)
    .bind(&request.disaster_id)
    .bind(&request.help)
    .bind(&request.urgency_type)
    .bind(request.latitude)
    .bind(request.longitude)
    .bind(&request.emergency_type)
    .bind(request.task_id)
    .bind(&request.status)
    .bind(&request.feedback)
    .bind(request.timestamp)
    .execute(pool)
    .await?;

    Ok(())
}
