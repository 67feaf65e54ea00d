//! Exposes remote tool groups to agents as a [`Resource`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentweave_core::error::ToolError;
use agentweave_core::message::ActionReport;
use agentweave_core::plan::ActionKind;
use agentweave_core::resource::{ActionContext, ActionRequest, Resource};
use async_trait::async_trait;
use tracing::warn;

use crate::client::{ToolEndpoint, ToolInvocationClient};

pub struct ToolResource {
    name: String,
    client: Arc<ToolInvocationClient>,
    groups: HashMap<String, ToolEndpoint>,
    default_group: Option<String>,
    timeout: Duration,
}

impl ToolResource {
    pub fn new(name: impl Into<String>, client: Arc<ToolInvocationClient>) -> Self {
        Self {
            name: name.into(),
            client,
            groups: HashMap::new(),
            default_group: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Register a group. The first registered group becomes the default.
    pub fn with_group(mut self, group: impl Into<String>, endpoint: ToolEndpoint) -> Self {
        let group = group.into();
        if self.default_group.is_none() {
            self.default_group = Some(group.clone());
        }
        self.groups.insert(group, endpoint);
        self
    }

    pub fn with_default_group(mut self, group: impl Into<String>) -> Self {
        self.default_group = Some(group.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call_tool(
        &self,
        group: Option<&str>,
        tool: &str,
        arguments: &serde_json::Value,
        ctx: &ActionContext,
    ) -> ActionReport {
        let Some(group) = group.or(self.default_group.as_deref()) else {
            return ActionReport::failed(format!("No tool group configured for '{tool}'"), false);
        };
        let Some(endpoint) = self.groups.get(group) else {
            return ActionReport::failed(format!("Unknown tool group '{group}'"), false);
        };

        let mut arguments = arguments.clone();
        if let Some(previous) = &ctx.previous_output {
            match &mut arguments {
                serde_json::Value::Object(map) => {
                    map.entry("input").or_insert_with(|| previous.clone().into());
                }
                serde_json::Value::Null => {
                    arguments = serde_json::json!({ "input": previous });
                }
                _ => {}
            }
        }

        match self
            .client
            .call(group, tool, endpoint, arguments, self.timeout, &ctx.trace)
            .await
        {
            Ok(result) if result.success => ActionReport {
                resource_value: result.data,
                ..ActionReport::ok(result.output)
            },
            Ok(result) => ActionReport {
                resource_value: result.data,
                ..ActionReport::failed(result.output, true)
            },
            Err(e) => {
                warn!(group, tool, conversation_id = %ctx.conversation_id, error = %e, "Tool action failed");
                ActionReport::failed(e.to_string(), is_retryable(&e))
            }
        }
    }
}

fn is_retryable(error: &ToolError) -> bool {
    match error {
        ToolError::Timeout { .. } | ToolError::Remote { .. } | ToolError::Transport(_) => true,
        ToolError::NotFound(_) | ToolError::PermissionDenied { .. } | ToolError::InvalidArguments(_) => false,
    }
}

#[async_trait]
impl Resource for ToolResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Tool
    }

    /// Lists each group with the tools its allow list lets through. A group
    /// whose listing fails is shown by name only.
    async fn describe(&self) -> String {
        let mut groups: Vec<(&String, &ToolEndpoint)> = self.groups.iter().collect();
        groups.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut listed = Vec::with_capacity(groups.len());
        for (group, endpoint) in groups {
            match self.client.list_tools(group, endpoint).await {
                Ok(tools) => {
                    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                    listed.push(format!("{group}: [{}]", names.join(", ")));
                }
                Err(e) => {
                    warn!(group = %group, error = %e, "Could not list tools for prompt");
                    listed.push(group.clone());
                }
            }
        }
        format!("{} (remote tools; groups: {})", self.name, listed.join("; "))
    }

    async fn execute(&self, request: &ActionRequest, ctx: &ActionContext) -> ActionReport {
        match request {
            ActionRequest::Tool { group, name, arguments } => {
                self.call_tool(group.as_deref(), name, arguments, ctx).await
            }
            other => ActionReport::failed(
                format!("{} cannot serve {:?} actions", self.name, other.kind()),
                false,
            ),
        }
    }
}
