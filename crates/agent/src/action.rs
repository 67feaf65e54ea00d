//! Parsing actions and reviewer verdicts out of model replies.
//!
//! A reply that is (or contains a fenced block holding) a JSON object or an
//! array of objects is read as actions:
//!
//! ```text
//! {"tool": "web_search", "group": "search", "arguments": {"q": "rust"}}
//! {"agent": "coder", "content": "write the parser"}
//! {"knowledge": "release notes 1.0"}
//! [{"tool": "fetch", ...}, {"tool": "summarize"}]
//! ```
//!
//! Anything else is plain text and passes through unchanged.

use agentweave_core::message::ReviewInfo;
use agentweave_core::resource::ActionRequest;
use serde_json::Value;
use tracing::debug;

/// Actions requested by a reply, in chain order. Empty means pass-through.
pub fn parse_actions(content: &str) -> Vec<ActionRequest> {
    let Some(value) = json_payload(content) else {
        return Vec::new();
    };

    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => return Vec::new(),
    };

    let mut actions = Vec::with_capacity(items.len());
    for item in &items {
        match parse_one(item) {
            Some(action) => actions.push(action),
            None => {
                debug!(item = %item, "Reply JSON is not an action, treating reply as text");
                return Vec::new();
            }
        }
    }
    actions
}

/// A reviewer verdict: `{"approve": false, "comments": "..."}`.
pub fn parse_review(content: &str) -> Option<ReviewInfo> {
    let value = json_payload(content)?;
    let approve = value.get("approve")?.as_bool()?;
    let comments = value
        .get("comments")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(ReviewInfo { approve, comments })
}

fn parse_one(item: &Value) -> Option<ActionRequest> {
    let object = item.as_object()?;

    if object.contains_key("type") {
        return serde_json::from_value(item.clone()).ok();
    }
    if let Some(name) = object.get("tool").and_then(Value::as_str) {
        return Some(ActionRequest::Tool {
            group: object.get("group").and_then(Value::as_str).map(String::from),
            name: name.to_string(),
            arguments: object.get("arguments").cloned().unwrap_or(Value::Null),
        });
    }
    if let Some(agent) = object.get("agent").and_then(Value::as_str) {
        return Some(ActionRequest::AgentDelegation {
            agent: agent.to_string(),
            content: object
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    if let Some(query) = object.get("knowledge").and_then(Value::as_str) {
        return Some(ActionRequest::Knowledge {
            query: query.to_string(),
        });
    }
    None
}

/// The JSON object or array in a reply, bare or inside a ``` fence.
fn json_payload(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    let candidate = match fenced(trimmed) {
        Some(inner) => inner,
        None => trimmed,
    };
    if !(candidate.starts_with('{') || candidate.starts_with('[')) {
        return None;
    }
    serde_json::from_str(candidate).ok()
}

fn fenced(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n')?;
    let body = &after[body_start + 1..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert!(parse_actions("4").is_empty());
        assert!(parse_actions("The answer is 4.").is_empty());
        assert!(parse_actions("").is_empty());
    }

    #[test]
    fn tool_action() {
        let actions = parse_actions(r#"{"tool": "calculator", "arguments": {"expr": "2+2"}}"#);
        assert_eq!(
            actions,
            vec![ActionRequest::Tool {
                group: None,
                name: "calculator".into(),
                arguments: serde_json::json!({"expr": "2+2"}),
            }]
        );
    }

    #[test]
    fn delegation_and_knowledge_actions() {
        let actions = parse_actions(r#"[{"agent": "coder", "content": "write it"}, {"knowledge": "docs"}]"#);
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], ActionRequest::AgentDelegation { agent, .. } if agent == "coder"));
        assert!(matches!(&actions[1], ActionRequest::Knowledge { query } if query == "docs"));
    }

    #[test]
    fn fenced_block_is_read() {
        let reply = "I will search.\n```json\n{\"tool\": \"web_search\", \"group\": \"search\"}\n```";
        let actions = parse_actions(reply);
        assert!(matches!(&actions[0], ActionRequest::Tool { group: Some(g), .. } if g == "search"));
    }

    #[test]
    fn tagged_form_is_accepted() {
        let actions = parse_actions(r#"{"type": "knowledge", "query": "q"}"#);
        assert_eq!(actions, vec![ActionRequest::Knowledge { query: "q".into() }]);
    }

    #[test]
    fn unrelated_json_is_text() {
        assert!(parse_actions(r#"{"answer": 4}"#).is_empty());
        assert!(parse_actions(r#"[{"tool": "a"}, {"answer": 4}]"#).is_empty());
    }

    #[test]
    fn review_verdicts() {
        let review = parse_review(r#"{"approve": false, "comments": "wrong unit"}"#).unwrap();
        assert!(!review.approve);
        assert_eq!(review.comments, "wrong unit");
        assert!(parse_review("looks fine").is_none());
        assert!(parse_review(r#"{"tool": "x"}"#).is_none());
    }
}
