//! Fire-and-forget audit event logging.
//!
//! Events are pushed onto a bounded channel and appended as JSON lines by a
//! background task. Losing an event under pressure is acceptable; audit
//! logging must never block or fail a request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

/// A single audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub role: String,
    pub event: String,
    pub level: AuditLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Handle for emitting audit events.
#[derive(Clone)]
pub struct AuditLog {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditLog {
    /// Spawn the writer task appending to `audit.log` under `log_dir`.
    pub fn spawn(log_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let path = log_dir.join("audit.log");
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(256);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let line = match serde_json::to_string(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to serialize audit event: {}", e);
                        continue;
                    }
                };
                let result = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .and_then(|mut f| writeln!(f, "{line}"));
                if let Err(e) = result {
                    warn!("Failed to append audit event: {}", e);
                }
            }
        });

        Ok(Self { tx })
    }

    /// Emit an event. Non-blocking; dropped if the queue is full.
    pub fn log_event(
        &self,
        username: &str,
        role: &str,
        event: &str,
        level: AuditLevel,
        details: Option<serde_json::Value>,
    ) {
        let event = AuditEvent {
            timestamp: Utc::now(),
            username: username.to_string(),
            role: role.to_string(),
            event: event.to_string(),
            level,
            details,
        };
        if self.tx.try_send(event).is_err() {
            debug!("Audit queue full, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_events_are_appended() {
        let temp = TempDir::new().unwrap();
        let audit = AuditLog::spawn(temp.path()).unwrap();

        audit.log_event("alice", "admin", "login", AuditLevel::Info, None);
        audit.log_event(
            "alice",
            "admin",
            "file_create",
            AuditLevel::Info,
            Some(serde_json::json!({"name": "notes.txt"})),
        );

        // Give the writer task a moment to drain the channel.
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if let Ok(content) = std::fs::read_to_string(temp.path().join("audit.log")) {
                if content.lines().count() == 2 {
                    assert!(content.contains("\"event\":\"login\""));
                    assert!(content.contains("notes.txt"));
                    return;
                }
            }
        }
        panic!("audit events were not written");
    }
}
