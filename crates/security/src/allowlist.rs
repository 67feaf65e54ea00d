//! Tool allowlists.
//!
//! A pattern is an exact tool name, `*`, or a prefix ending in `*`
//! (`web_*`). An empty allowlist allows every tool.

use agentweave_core::tool::ToolDefinition;

/// Result of checking a tool against the allowlist.
#[derive(Debug, Clone, PartialEq)]
pub enum AllowCheck {
    Allowed,
    Denied { tool_name: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolAllowlist {
    patterns: Vec<String>,
}

impl ToolAllowlist {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// An allowlist that allows everything.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p == "*")
    }

    pub fn allows(&self, tool_name: &str) -> bool {
        self.is_open()
            || self.patterns.iter().any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => tool_name.starts_with(prefix),
                None => pattern == tool_name,
            })
    }

    pub fn check(&self, tool_name: &str) -> AllowCheck {
        if self.allows(tool_name) {
            AllowCheck::Allowed
        } else {
            AllowCheck::Denied {
                tool_name: tool_name.into(),
                reason: format!(
                    "Tool '{}' not in allowlist ({} patterns configured)",
                    tool_name,
                    self.patterns.len()
                ),
            }
        }
    }

    /// Keep only the allowed tools.
    pub fn filter(&self, tools: Vec<ToolDefinition>) -> Vec<ToolDefinition> {
        tools.into_iter().filter(|t| self.allows(&t.name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: String::new(),
            parameters: serde_json::json!({}),
        }
    }

    #[test]
    fn empty_allowlist_allows_all() {
        assert_eq!(ToolAllowlist::open().check("anything"), AllowCheck::Allowed);
    }

    #[test]
    fn wildcard_allows_all() {
        assert!(ToolAllowlist::new(["*"]).allows("shell"));
    }

    #[test]
    fn exact_and_prefix_patterns() {
        let list = ToolAllowlist::new(["calculator", "web_*"]);
        assert!(list.allows("calculator"));
        assert!(list.allows("web_search"));
        assert!(list.allows("web_fetch"));
        assert!(!list.allows("calculator_v2"));
        assert!(!list.allows("shell"));
    }

    #[test]
    fn denied_check_names_tool() {
        let list = ToolAllowlist::new(["calculator"]);
        match list.check("shell") {
            AllowCheck::Denied { tool_name, reason } => {
                assert_eq!(tool_name, "shell");
                assert!(reason.contains("1 patterns"));
            }
            AllowCheck::Allowed => panic!("Expected denied"),
        }
    }

    #[test]
    fn filter_drops_disallowed_tools() {
        let list = ToolAllowlist::new(["web_*"]);
        let kept = list.filter(vec![def("web_search"), def("shell"), def("web_fetch")]);
        let names: Vec<&str> = kept.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["web_search", "web_fetch"]);
    }
}
