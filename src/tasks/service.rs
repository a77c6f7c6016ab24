use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use super::generate::{TaskGenerator, rank_resources};
use super::{HelpRequest, HelpRequestRecord, ResponseTask, Urgency};
use crate::store::{RecordStore, StoreError};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("disaster {0} not found")]
    DisasterNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct HelpRequestOutcome {
    pub task: ResponseTask,
    pub request: HelpRequestRecord,
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn RecordStore>,
    generator: Arc<TaskGenerator>,
}

impl TaskService {
    pub fn new(store: Arc<dyn RecordStore>, generator: TaskGenerator) -> Self {
        Self {
            store,
            generator: Arc::new(generator),
        }
    }

    /// fetch disaster -> generate -> save.
    #[tracing::instrument(name = "tasks.service generate_for_disaster", skip(self))]
    pub async fn generate_for_disaster(&self, disaster_id: &str) -> Result<ResponseTask, TaskError> {
        let disaster = self
            .store
            .get_disaster(disaster_id)
            .await?
            .ok_or_else(|| TaskError::DisasterNotFound(disaster_id.to_string()))?;

        let task = self.generator.for_disaster(&disaster).await;
        self.store.save_task(&task).await?;

        tracing::info!(task_id = %task.task_id, "Response task created");
        Ok(task)
    }

    /// fetch disaster type -> nearby resources -> generate -> save task ->
    /// save the request itself.
    #[tracing::instrument(
        name = "tasks.service submit_help_request",
        skip_all,
        fields(disaster.id = %request.disaster_id)
    )]
    pub async fn submit_help_request(
        &self,
        request: HelpRequest,
    ) -> Result<HelpRequestOutcome, TaskError> {
        let disaster = self
            .store
            .get_disaster(&request.disaster_id)
            .await?
            .ok_or_else(|| TaskError::DisasterNotFound(request.disaster_id.clone()))?;
        let emergency_type = if disaster.emergency_type.is_empty() {
            "general emergency".to_string()
        } else {
            disaster.emergency_type
        };

        let resources = match self.store.disaster_resources(&request.disaster_id).await {
            Ok(resources) => rank_resources(resources, request.latitude, request.longitude),
            Err(err) => {
                tracing::warn!(error = %err, "Resource lookup failed, continuing without resources");
                Vec::new()
            }
        };

        let task = self
            .generator
            .for_help_request(&request, &emergency_type, &resources)
            .await;
        self.store.save_task(&task).await?;

        let record = HelpRequestRecord {
            disaster_id: request.disaster_id,
            user_id: request.user_id,
            help: request.help,
            urgency_type: Urgency::normalise(&request.urgency_type).as_str().to_string(),
            latitude: request.latitude,
            longitude: request.longitude,
            emergency_type,
            task_id: task.task_id,
            status: "submitted".to_string(),
            feedback: None,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.store.save_help_request(&record).await?;

        Ok(HelpRequestOutcome {
            task,
            request: record,
        })
    }
}
