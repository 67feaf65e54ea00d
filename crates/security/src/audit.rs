//! Audit logging: a structured record of every tool call.
//!
//! Each entry carries the call's correlation key, input, output or error and
//! trace id. Sinks may fail; the logger reports the failure through tracing
//! and carries on, so auditing never breaks a call.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Correlation key of the call
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub trace_id: String,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub outcome: AuditOutcome,
    pub duration_ms: u64,
}

impl AuditEntry {
    pub fn tool_call(
        id: impl Into<String>,
        group: impl Into<String>,
        tool_name: impl Into<String>,
        trace_id: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            event: AuditEvent::ToolCall {
                group: group.into(),
                tool_name: tool_name.into(),
            },
            trace_id: trace_id.into(),
            input,
            output: None,
            error: None,
            outcome: AuditOutcome::Success,
            duration_ms: 0,
        }
    }

    pub fn succeeded(mut self, output: impl Into<String>, duration_ms: u64) -> Self {
        self.output = Some(output.into());
        self.outcome = AuditOutcome::Success;
        self.duration_ms = duration_ms;
        self
    }

    pub fn failed(mut self, error: impl Into<String>, duration_ms: u64) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self.duration_ms = duration_ms;
        self
    }

    pub fn denied(mut self, reason: impl Into<String>) -> Self {
        self.error = Some(reason.into());
        self.outcome = AuditOutcome::Denied;
        self
    }
}

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A remote tool was called
    ToolCall { group: String, tool_name: String },
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("Audit write failed: {0}")]
    WriteFailed(String),
}

/// Trait for audit log sinks (where entries are written).
pub trait AuditSink: Send + Sync {
    fn name(&self) -> &str;

    fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Entries kept in memory unless configured otherwise.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Audit logger that keeps the most recent entries in memory and forwards
/// every entry to its sinks.
pub struct AuditLogger {
    entries: std::sync::Mutex<VecDeque<AuditEntry>>,
    max_entries: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("max_entries", &self.max_entries)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: std::sync::Mutex::new(VecDeque::new()),
            max_entries: DEFAULT_MAX_ENTRIES,
            sinks,
        }
    }

    /// Keep at most `max_entries` in memory, dropping the oldest first.
    /// Zero keeps nothing; sinks still see every entry.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Record an entry. Sink failures are logged and swallowed.
    pub fn log(&self, entry: AuditEntry) {
        for sink in &self.sinks {
            if let Err(e) = sink.record(&entry) {
                tracing::warn!(sink = sink.name(), call_id = %entry.id, error = %e, "Audit sink failed");
            }
        }

        if self.max_entries == 0 {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            while entries.len() >= self.max_entries {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Get all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get entries with the given outcome.
    pub fn entries_by_outcome(&self, outcome: &AuditOutcome) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| &e.outcome == outcome)
            .collect()
    }

    /// Clear all stored entries.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Count of stored entries.
    pub fn count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// A tracing-based audit sink that logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            call_id = %entry.id,
            event = ?entry.event,
            trace_id = %entry.trace_id,
            outcome = ?entry.outcome,
            duration_ms = entry.duration_ms,
            error = ?entry.error,
            "AUDIT"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn entry(id: &str) -> AuditEntry {
        AuditEntry::tool_call(id, "search", "web_search", "trace-1", serde_json::json!({"q": "rust"}))
    }

    #[test]
    fn log_and_retrieve_entries() {
        let logger = AuditLogger::new();
        logger.log(entry("a").succeeded("ok", 12));
        logger.log(entry("b").failed("boom", 3));

        assert_eq!(logger.count(), 2);
        let entries = logger.entries();
        assert_eq!(entries[0].output.as_deref(), Some("ok"));
        assert_eq!(entries[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn filter_by_outcome() {
        let logger = AuditLogger::new();
        logger.log(entry("a").succeeded("ok", 1));
        logger.log(entry("b").denied("not allowed"));
        logger.log(entry("c").succeeded("ok", 1));

        assert_eq!(logger.entries_by_outcome(&AuditOutcome::Success).len(), 2);
        let denied = logger.entries_by_outcome(&AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].id, "b");
    }

    #[test]
    fn retention_drops_oldest_entries() {
        let logger = AuditLogger::new().with_max_entries(2);
        for id in ["a", "b", "c"] {
            logger.log(entry(id).succeeded("ok", 1));
        }
        let ids: Vec<String> = logger.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn zero_retention_still_feeds_sinks() {
        struct Counting(Arc<Mutex<usize>>);

        impl AuditSink for Counting {
            fn name(&self) -> &str {
                "counting"
            }

            fn record(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
                *self.0.lock().unwrap() += 1;
                Ok(())
            }
        }

        let seen = Arc::new(Mutex::new(0));
        let logger = AuditLogger::with_sinks(vec![Box::new(Counting(seen.clone()))]).with_max_entries(0);
        logger.log(entry("a"));
        logger.log(entry("b"));
        assert_eq!(logger.count(), 0);
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn default_retention_is_bounded() {
        let logger = AuditLogger::new();
        for i in 0..DEFAULT_MAX_ENTRIES + 5 {
            logger.log(entry(&i.to_string()));
        }
        assert_eq!(logger.count(), DEFAULT_MAX_ENTRIES);
        assert_eq!(logger.entries()[0].id, "5");
    }

    #[test]
    fn clear_entries() {
        let logger = AuditLogger::new();
        logger.log(entry("a"));
        assert_eq!(logger.count(), 1);
        logger.clear();
        assert_eq!(logger.count(), 0);
    }

    #[test]
    fn audit_entry_serialization() {
        let json = serde_json::to_string(&entry("a").succeeded("42", 5)).unwrap();
        let deserialized: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, "a");
        assert_eq!(deserialized.trace_id, "trace-1");
        assert_eq!(deserialized.outcome, AuditOutcome::Success);
        assert!(json.contains("\"type\":\"tool_call\""));
    }

    #[test]
    fn custom_sink_receives_entries() {
        struct TestSink {
            received: Arc<Mutex<Vec<String>>>,
        }

        impl AuditSink for TestSink {
            fn name(&self) -> &str {
                "test"
            }

            fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
                self.received.lock().unwrap().push(entry.id.clone());
                Ok(())
            }
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let logger = AuditLogger::with_sinks(vec![Box::new(TestSink { received: received.clone() })]);
        logger.log(entry("call-1"));

        assert_eq!(*received.lock().unwrap(), vec!["call-1".to_string()]);
    }

    #[test]
    fn failing_sink_is_swallowed() {
        struct BrokenSink;

        impl AuditSink for BrokenSink {
            fn name(&self) -> &str {
                "broken"
            }

            fn record(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
                Err(AuditError::Unavailable("disk full".into()))
            }
        }

        let logger = AuditLogger::with_sinks(vec![Box::new(BrokenSink), Box::new(TracingSink)]);
        logger.log(entry("a"));
        assert_eq!(logger.count(), 1);
    }

    #[test]
    fn debug_format() {
        let debug_str = format!("{:?}", AuditLogger::new());
        assert!(debug_str.contains("AuditLogger"));
        assert!(debug_str.contains("entry_count"));
    }
}
