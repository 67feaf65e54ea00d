//! Security module for agentweave: tool allowlists and audit logging.
//!
//! Provides:
//! - **Allowlists**: which remote tools a host may list and call
//! - **Audit logging**: a structured record of every tool call

pub mod allowlist;
pub mod audit;

pub use allowlist::{AllowCheck, ToolAllowlist};
pub use audit::{AuditEntry, AuditError, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
