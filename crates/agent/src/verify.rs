//! Verification of candidate replies.

use agentweave_core::message::Message;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Rejected, with the reason fed back into the next attempt.
    Reject(String),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Domain-specific correctness check run after the built-in checks pass.
#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &str;

    async fn verify(&self, received: &Message, candidate: &Message) -> Verdict;
}

/// Accepts every candidate.
pub struct AcceptAll;

#[async_trait]
impl Verifier for AcceptAll {
    fn name(&self) -> &str {
        "accept_all"
    }

    async fn verify(&self, _received: &Message, _candidate: &Message) -> Verdict {
        Verdict::Accept
    }
}

/// Built-in checks: reviewer disapproval, failed action, empty output.
pub(crate) fn precheck(candidate: &Message) -> Option<Verdict> {
    if let Some(review) = &candidate.review_info {
        if !review.approve {
            let reason = if review.comments.is_empty() {
                "Reviewer disapproved".to_string()
            } else {
                format!("Reviewer disapproved: {}", review.comments)
            };
            return Some(Verdict::Reject(reason));
        }
    }
    if let Some(report) = &candidate.action_report {
        if !report.success {
            return Some(Verdict::Reject(format!("Action failed: {}", report.content)));
        }
    }
    if candidate.content.trim().is_empty() {
        return Some(Verdict::Reject("Empty output".into()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentweave_core::message::{ActionReport, AgentRef, ConversationId, ReviewInfo};

    fn candidate(content: &str) -> Message {
        Message::new(ConversationId::from("c1"), AgentRef::new("solver", "assistant"), AgentRef::user(), content)
    }

    #[test]
    fn good_candidate_passes_precheck() {
        assert_eq!(precheck(&candidate("4")), None);
    }

    #[test]
    fn whitespace_is_rejected() {
        assert_eq!(precheck(&candidate("  \n")), Some(Verdict::Reject("Empty output".into())));
    }

    #[test]
    fn failed_action_is_rejected() {
        let mut msg = candidate("timeout");
        msg.action_report = Some(ActionReport::failed("timeout", true));
        assert!(matches!(precheck(&msg), Some(Verdict::Reject(r)) if r.contains("timeout")));
    }

    #[test]
    fn reviewer_disapproval_is_rejected() {
        let msg = candidate("4").with_review(ReviewInfo { approve: false, comments: "show work".into() });
        assert!(matches!(precheck(&msg), Some(Verdict::Reject(r)) if r.contains("show work")));

        let approved = candidate("4").with_review(ReviewInfo { approve: true, comments: String::new() });
        assert_eq!(precheck(&approved), None);
    }

    #[tokio::test]
    async fn accept_all_accepts() {
        let msg = candidate("anything");
        assert!(AcceptAll.verify(&msg, &msg).await.is_accept());
    }
}
