//! Human-readable import log.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Error,
    Pending,
    Info,
}

impl LogStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LogStatus::Success => "SUCCESS",
            LogStatus::Error => "ERROR",
            LogStatus::Pending => "PENDING",
            LogStatus::Info => "INFO",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub status: LogStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(status: LogStatus, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            timestamp: Local::now(),
            status,
            message: message.into(),
            details,
        }
    }
}

/// `[HH:MM:SS] STATUS: message`, with details indented on the next line.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.status.as_str(),
            self.message
        )?;
        if let Some(details) = &self.details {
            write!(f, "\n    {details}")?;
        }
        Ok(())
    }
}

/// Append-only list of log entries, mirrored to `tracing`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ImportLog {
    entries: Vec<LogEntry>,
}

impl ImportLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry and return a copy for event delivery.
    pub fn push(
        &mut self,
        status: LogStatus,
        message: impl Into<String>,
        details: Option<String>,
    ) -> LogEntry {
        let entry = LogEntry::new(status, message, details);
        let details = entry.details.as_deref().unwrap_or("");
        match status {
            LogStatus::Error => tracing::warn!(message = %entry.message, details, "Import error"),
            _ => tracing::info!(status = status.as_str(), message = %entry.message, details, "Import log"),
        }
        self.entries.push(entry.clone());
        entry
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: LogStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}
