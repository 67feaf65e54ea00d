//! JSON-RPC transport over HTTP.
//!
//! Speaks the `tools/list` and `tools/call` methods. Anything that prevents a
//! well-formed JSON-RPC answer is a [`ToolError::Transport`]; a JSON-RPC
//! `error` object is a [`ToolError::Remote`]; a result flagged `isError`
//! becomes an unsuccessful [`ToolResult`].

use std::collections::HashMap;

use agentweave_core::error::ToolError;
use agentweave_core::tool::{ToolCall, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::client::ToolTransport;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn rpc(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
        id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<RpcResponse, ToolError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!(endpoint, method, "Sending JSON-RPC request");

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ToolError::Transport(format!("HTTP {}: {}", status.as_u16(), error_body)));
        }

        response
            .json::<RpcResponse>()
            .await
            .map_err(|e| ToolError::Transport(format!("Failed to parse response: {e}")))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTransport for HttpTransport {
    async fn list(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<ToolDefinition>, ToolError> {
        let response = self
            .rpc(endpoint, headers, "list", "tools/list", serde_json::json!({}))
            .await?;
        let result = response.into_result("tools/list")?;
        let listed: ListResult = serde_json::from_value(result)
            .map_err(|e| ToolError::Transport(format!("Malformed tools/list result: {e}")))?;
        Ok(listed.tools)
    }

    async fn call(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
        call: &ToolCall,
    ) -> Result<ToolResult, ToolError> {
        let params = serde_json::json!({
            "name": call.name,
            "arguments": call.arguments,
        });
        let response = self.rpc(endpoint, headers, &call.id, "tools/call", params).await?;
        let result = response.into_result(&call.name)?;
        Ok(call_result_to_tool_result(&call.id, result))
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_result(self, tool_name: &str) -> Result<serde_json::Value, ToolError> {
        if let Some(error) = self.error {
            return Err(ToolError::Remote {
                tool_name: tool_name.to_string(),
                message: format!("{} (code {})", error.message, error.code),
            });
        }
        self.result
            .ok_or_else(|| ToolError::Transport("JSON-RPC response without result".into()))
    }
}

#[derive(Debug, Deserialize)]
struct ListResult {
    #[serde(default)]
    tools: Vec<ToolDefinition>,
}

#[derive(Debug, Deserialize)]
struct CallResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default, rename = "isError")]
    is_error: bool,
    #[serde(default, rename = "structuredContent")]
    structured: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(default)]
    text: Option<String>,
}

fn call_result_to_tool_result(call_id: &str, result: serde_json::Value) -> ToolResult {
    match serde_json::from_value::<CallResult>(result.clone()) {
        Ok(parsed) => {
            let output = parsed
                .content
                .iter()
                .filter_map(|c| c.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n");
            ToolResult {
                call_id: call_id.to_string(),
                success: !parsed.is_error,
                output,
                data: parsed.structured,
            }
        }
        // Servers that answer with a bare value
        Err(_) => ToolResult {
            call_id: call_id.to_string(),
            success: true,
            output: match &result {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            data: Some(result),
        },
    }
}
