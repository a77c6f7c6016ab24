pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod llm;
pub mod lookup;
pub mod pipeline;
pub mod routes;
pub mod service;
pub mod store;
pub mod tasks;
pub mod telemetry;
pub mod vision;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use config::Config;

use service::EmergencyService;
use store::RecordStore;
use tasks::TaskService;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub emergency: EmergencyService,
    pub tasks: TaskService,
    pub records: Arc<dyn RecordStore>,
}
