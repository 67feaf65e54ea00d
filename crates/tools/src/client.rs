//! Tool invocation client: list and call tools exposed by remote groups.
//!
//! - Tool lists are cached per group and refreshed only when their TTL runs out.
//! - Every call carries the trace id, a child span id and a fresh correlation key.
//! - A call that misses its deadline fails with [`ToolError::Timeout`], distinct
//!   from a remote application error. Only transport failures are retried.
//! - Every call is audited from a spawned task; audit problems never reach the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentweave_core::error::ToolError;
use agentweave_core::tool::{ToolCall, ToolDefinition, ToolResult};
use agentweave_core::trace::TraceContext;
use agentweave_security::{AllowCheck, AuditEntry, AuditLogger, ToolAllowlist};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const SPAN_ID_HEADER: &str = "x-span-id";
pub const CALL_ID_HEADER: &str = "x-call-id";

/// Wire protocol spoken with a tool group.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn list(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<ToolDefinition>, ToolError>;

    async fn call(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
        call: &ToolCall,
    ) -> Result<ToolResult, ToolError>;
}

/// Where a tool group lives and which of its tools may be used.
#[derive(Clone, Default)]
pub struct ToolEndpoint {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub allow_list: ToolAllowlist,
}

impl ToolEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_allow_list(mut self, allow_list: ToolAllowlist) -> Self {
        self.allow_list = allow_list;
        self
    }
}

impl std::fmt::Debug for ToolEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEndpoint")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("allow_list", &self.allow_list)
            .finish()
    }
}

struct CachedTools {
    tools: Vec<ToolDefinition>,
    fetched_at: Instant,
}

pub struct ToolInvocationClient {
    transport: Arc<dyn ToolTransport>,
    audit: Arc<AuditLogger>,
    metadata: RwLock<HashMap<String, CachedTools>>,
    metadata_ttl: Duration,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl ToolInvocationClient {
    pub fn new(transport: Arc<dyn ToolTransport>, audit: Arc<AuditLogger>) -> Self {
        Self {
            transport,
            audit,
            metadata: RwLock::new(HashMap::new()),
            metadata_ttl: Duration::from_secs(300),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
        }
    }

    pub fn with_metadata_ttl(mut self, ttl: Duration) -> Self {
        self.metadata_ttl = ttl;
        self
    }

    /// Attempts for calls failing at the transport level (at least one).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Base delay between transport retries; grows linearly per attempt.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Tools of a group that pass the endpoint's allow list.
    ///
    /// Served from cache while fresh. If a refresh fails and a stale list is
    /// cached, the stale list is returned and the failure only logged.
    pub async fn list_tools(&self, group: &str, endpoint: &ToolEndpoint) -> Result<Vec<ToolDefinition>, ToolError> {
        {
            let cache = self.metadata.read().await;
            if let Some(cached) = cache.get(group) {
                if cached.fetched_at.elapsed() < self.metadata_ttl {
                    debug!(group, count = cached.tools.len(), "Tool list cache hit");
                    return Ok(endpoint.allow_list.filter(cached.tools.clone()));
                }
            }
        }

        match self.transport.list(&endpoint.url, &endpoint.headers).await {
            Ok(tools) => {
                info!(group, count = tools.len(), "Fetched tool list");
                let filtered = endpoint.allow_list.filter(tools.clone());
                self.metadata.write().await.insert(
                    group.to_string(),
                    CachedTools {
                        tools,
                        fetched_at: Instant::now(),
                    },
                );
                Ok(filtered)
            }
            Err(e) => {
                let cache = self.metadata.read().await;
                match cache.get(group) {
                    Some(stale) => {
                        warn!(group, error = %e, "Tool list refresh failed, serving stale list");
                        Ok(endpoint.allow_list.filter(stale.tools.clone()))
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Drop the cached tool list of a group.
    pub async fn invalidate(&self, group: &str) {
        self.metadata.write().await.remove(group);
    }

    /// Call one tool.
    pub async fn call(
        &self,
        group: &str,
        tool: &str,
        endpoint: &ToolEndpoint,
        arguments: serde_json::Value,
        timeout: Duration,
        trace: &TraceContext,
    ) -> Result<ToolResult, ToolError> {
        let call_id = uuid::Uuid::new_v4().to_string();
        let span = trace.child();
        let entry = AuditEntry::tool_call(&call_id, group, tool, &trace.trace_id, arguments.clone());

        if let AllowCheck::Denied { reason, .. } = endpoint.allow_list.check(tool) {
            warn!(group, tool, "Tool call denied by allow list");
            self.record(entry.denied(reason.clone()));
            return Err(ToolError::PermissionDenied {
                tool_name: tool.to_string(),
                reason,
            });
        }

        let mut headers = endpoint.headers.clone();
        headers.insert(TRACE_ID_HEADER.into(), span.trace_id.clone());
        headers.insert(SPAN_ID_HEADER.into(), span.span_id.clone());
        headers.insert(CALL_ID_HEADER.into(), call_id.clone());

        let call = ToolCall {
            id: call_id.clone(),
            name: tool.to_string(),
            arguments,
        };

        let started = Instant::now();
        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, self.transport.call(&endpoint.url, &headers, &call)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    tool_name: tool.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };

            match result {
                Err(ToolError::Transport(reason)) if attempt < self.max_attempts => {
                    warn!(group, tool, attempt, error = %reason, "Tool transport failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                other => break other,
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => {
                debug!(group, tool, call_id = %call_id, success = result.success, duration_ms, "Tool call finished");
                self.record(entry.succeeded(result.output.clone(), duration_ms));
            }
            Err(e) => {
                warn!(group, tool, call_id = %call_id, attempts = attempt, error = %e, "Tool call failed");
                self.record(entry.failed(e.to_string(), duration_ms));
            }
        }
        outcome
    }

    fn record(&self, entry: AuditEntry) {
        let audit = self.audit.clone();
        tokio::spawn(async move {
            audit.log(entry);
        });
    }
}
