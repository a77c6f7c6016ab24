//! Append-only execution ledger and the end-of-run summary.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::state::{RunStatus, StepStatus, StepStatuses};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub severity: Severity,
    pub message: String,
}

/// Ordered log for one run. Entries carry an id so that absorbing a branch's
/// copy of the ledger only appends what the shared ledger has not seen yet.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLedger {
    entries: Vec<LogEntry>,
    seen: HashSet<Uuid>,
}

impl ExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, component: &str, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => tracing::error!(component, "{message}"),
            Severity::Warning => tracing::warn!(component, "{message}"),
            Severity::Info | Severity::Success => tracing::info!(component, "{message}"),
        }

        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            component: component.to_string(),
            severity,
            message,
        };
        self.seen.insert(entry.id);
        self.entries.push(entry);
    }

    pub fn info(&mut self, component: &str, message: impl Into<String>) {
        self.record(component, Severity::Info, message);
    }

    pub fn success(&mut self, component: &str, message: impl Into<String>) {
        self.record(component, Severity::Success, message);
    }

    pub fn warn(&mut self, component: &str, message: impl Into<String>) {
        self.record(component, Severity::Warning, message);
    }

    pub fn error(&mut self, component: &str, message: impl Into<String>) {
        self.record(component, Severity::Error, message);
    }

    /// Appends, in order, every entry of `other` not already present.
    /// Returns how many entries were added.
    pub fn absorb(&mut self, other: &ExecutionLedger) -> usize {
        let mut added = 0;
        for entry in &other.entries {
            if self.seen.insert(entry.id) {
                self.entries.push(entry.clone());
                added += 1;
            }
        }
        added
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

impl Serialize for ExecutionLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_components: usize,
    pub completed_components: usize,
    pub failed_components: usize,
    /// Percentage, 0.0..=100.0.
    pub success_rate: f64,
}

impl RunSummary {
    pub fn from_statuses(statuses: &StepStatuses) -> Self {
        let total = statuses.len();
        let completed = statuses.count(StepStatus::Completed);
        let failed = statuses.count(StepStatus::Failed);
        let success_rate = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_components: total,
            completed_components: completed,
            failed_components: failed,
            success_rate,
        }
    }
}

/// Hand-off record for the persistence collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizedRun {
    pub run_status: RunStatus,
    pub summary: RunSummary,
    pub components_status: StepStatuses,
    pub log: Vec<LogEntry>,
}
