//! Display merge for conversation views.
//!
//! Hidden messages (from silent hand-off agents) are spliced out. Their goal
//! and resource metadata move forward onto the next visible message, filling
//! only what that message does not already carry.

use agentweave_core::message::Message;

/// Merge the newest `max_chat_round` messages for display.
///
/// `messages` must already be in round order. Runs in a single pass.
pub fn merge_for_display(messages: &[Message], max_chat_round: usize) -> Vec<Message> {
    let start = messages.len().saturating_sub(max_chat_round);
    let window = &messages[start..];

    let mut merged = Vec::with_capacity(window.len());
    let mut carried_goal: Option<String> = None;
    let mut carried_resource: Option<serde_json::Value> = None;

    for message in window {
        if !message.visible {
            if message.current_goal.is_some() {
                carried_goal = message.current_goal.clone();
            }
            if message.resource_info.is_some() {
                carried_resource = message.resource_info.clone();
            }
            continue;
        }

        let mut shown = message.clone();
        if shown.current_goal.is_none() {
            shown.current_goal = carried_goal.take();
        }
        if shown.resource_info.is_none() {
            shown.resource_info = carried_resource.take();
        }
        carried_goal = None;
        carried_resource = None;
        merged.push(shown);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentweave_core::message::{AgentRef, ConversationId};

    fn msg(rounds: u64, content: &str) -> Message {
        Message::new(
            ConversationId::from("c1"),
            AgentRef::new("a", "Assistant"),
            AgentRef::new("b", "Assistant"),
            content,
        )
        .with_rounds(rounds)
    }

    #[test]
    fn hidden_middle_message_is_spliced_out() {
        let messages = vec![
            msg(1, "question"),
            msg(2, "routing").with_visible(false).with_goal("solve arithmetic"),
            msg(3, "4"),
        ];
        let merged = merge_for_display(&messages, 50);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content, "question");
        assert_eq!(merged[1].content, "4");
        assert_eq!(merged[1].current_goal.as_deref(), Some("solve arithmetic"));
        assert!(merged[0].current_goal.is_none());
    }

    #[test]
    fn successor_keeps_its_own_metadata() {
        let messages = vec![
            msg(1, "hand-off")
                .with_visible(false)
                .with_goal("old goal")
                .with_resource_info(serde_json::json!({"tool": "search"})),
            msg(2, "answer").with_goal("own goal"),
        ];
        let merged = merge_for_display(&messages, 50);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].current_goal.as_deref(), Some("own goal"));
        assert_eq!(merged[0].resource_info.as_ref().unwrap()["tool"], "search");
    }

    #[test]
    fn carried_metadata_does_not_leak_past_successor() {
        let messages = vec![
            msg(1, "hidden").with_visible(false).with_goal("g"),
            msg(2, "first"),
            msg(3, "second"),
        ];
        let merged = merge_for_display(&messages, 50);
        assert_eq!(merged[0].current_goal.as_deref(), Some("g"));
        assert!(merged[1].current_goal.is_none());
    }

    #[test]
    fn window_bounds_the_merge() {
        let messages: Vec<Message> = (1..=10).map(|i| msg(i, &i.to_string())).collect();
        let merged = merge_for_display(&messages, 3);
        let contents: Vec<&str> = merged.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["8", "9", "10"]);
    }

    #[test]
    fn trailing_hidden_message_is_dropped() {
        let messages = vec![msg(1, "shown"), msg(2, "pending").with_visible(false)];
        assert_eq!(merge_for_display(&messages, 50).len(), 1);
    }
}
