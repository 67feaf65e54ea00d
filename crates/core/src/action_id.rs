//! Hierarchical task/step/action identifiers.
//!
//! Three shapes are recognised:
//!
//! | Shape      | Example  | Meaning                      |
//! |------------|----------|------------------------------|
//! | `T`        | `3`      | task                         |
//! | `T-S`      | `3-1`    | step `S` of task `T`         |
//! | `T-N.M`    | `3-1.2`  | action `M` under step `T-N`  |
//!
//! `T` and `N` are numerals. Anything else is an opaque leaf: [`decompose`]
//! returns an empty [`Decomposed`] for it instead of failing.
//!
//! [`compare`] orders ids so that a plan tree renders correctly from a flat
//! sorted list: parents before children, siblings in numeric order.

use std::cmp::Ordering;

/// The ancestry of an identifier, from the task down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposed {
    pub task: Option<String>,
    pub step: Option<String>,
    pub action: Option<String>,
}

impl Decomposed {
    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.step.is_none() && self.action.is_none()
    }
}

fn is_numeral(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Split an identifier into its task, step and action components.
pub fn decompose(id: &str) -> Decomposed {
    let pieces: Vec<&str> = id.split('-').collect();
    match pieces.as_slice() {
        [task] if is_numeral(task) => Decomposed {
            task: Some(task.to_string()),
            ..Default::default()
        },
        [task, rest] if is_numeral(task) => {
            let parts: Vec<&str> = rest.split('.').collect();
            match parts.as_slice() {
                [step] if !step.is_empty() => Decomposed {
                    task: Some(task.to_string()),
                    step: Some(id.to_string()),
                    action: None,
                },
                [step, action] if is_numeral(step) && !action.is_empty() => Decomposed {
                    task: Some(task.to_string()),
                    step: Some(format!("{task}-{step}")),
                    action: Some(id.to_string()),
                },
                _ => Decomposed::default(),
            }
        }
        _ => Decomposed::default(),
    }
}

fn compare_token(a: &str, b: &str) -> Ordering {
    match (is_numeral(a), is_numeral(b)) {
        (true, true) => {
            // Compare by magnitude without parsing, so arbitrarily long numerals work.
            let a_trim = a.trim_start_matches('0');
            let b_trim = b.trim_start_matches('0');
            a_trim
                .len()
                .cmp(&b_trim.len())
                .then_with(|| a_trim.cmp(b_trim))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

/// Total order over identifiers.
///
/// Tokens are compared position by position; when one id is a prefix of the
/// other, the shorter (the ancestor) sorts first.
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-']);
    let mut right = b.split(['.', '-']);
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => match compare_token(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Sort identifiers in tree order.
pub fn sort_ids<S: AsRef<str>>(ids: &mut [S]) {
    ids.sort_by(|a, b| compare(a.as_ref(), b.as_ref()));
}

pub fn task_id(task: u32) -> String {
    task.to_string()
}

pub fn step_id(task: &str, step: u32) -> String {
    format!("{task}-{step}")
}

pub fn action_id(step: &str, action: u32) -> String {
    format!("{step}.{action}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_task() {
        let d = decompose("12");
        assert_eq!(d.task.as_deref(), Some("12"));
        assert!(d.step.is_none());
        assert!(d.action.is_none());
    }

    #[test]
    fn decompose_step() {
        let d = decompose("1-3");
        assert_eq!(d.task.as_deref(), Some("1"));
        assert_eq!(d.step.as_deref(), Some("1-3"));
        assert!(d.action.is_none());

        let named = decompose("2-review");
        assert_eq!(named.step.as_deref(), Some("2-review"));
    }

    #[test]
    fn decompose_action() {
        let d = decompose("1-3.2");
        assert_eq!(d.task.as_deref(), Some("1"));
        assert_eq!(d.step.as_deref(), Some("1-3"));
        assert_eq!(d.action.as_deref(), Some("1-3.2"));
    }

    #[test]
    fn decompose_is_total() {
        for bad in ["", "-", "abc", "a-1", "1-", "1-2-3", "1-2.3.4", "1-x.2", "1-2.", ".", "1.2", "💥-1"] {
            assert!(decompose(bad).is_empty(), "expected opaque leaf for {bad:?}");
        }
    }

    #[test]
    fn compare_parents_before_children() {
        assert_eq!(compare("1", "1-0"), Ordering::Less);
        assert_eq!(compare("1-0", "1-1"), Ordering::Less);
        assert_eq!(compare("1-0.0", "1-0.1"), Ordering::Less);
        assert_eq!(compare("1-0", "1-0.0"), Ordering::Less);
        assert_eq!(compare("1-1", "1"), Ordering::Greater);
    }

    #[test]
    fn compare_numeric_tokens_by_value() {
        assert_eq!(compare("2", "10"), Ordering::Less);
        assert_eq!(compare("1-9", "1-10"), Ordering::Less);
        assert_eq!(compare("007", "7"), Ordering::Equal);
        assert_eq!(compare("99999999999999999999999", "100000000000000000000000"), Ordering::Less);
    }

    #[test]
    fn compare_mixed_tokens() {
        assert_eq!(compare("1-2", "1-review"), Ordering::Less);
        assert_eq!(compare("1-alpha", "1-beta"), Ordering::Less);
        assert_eq!(compare("x", "x"), Ordering::Equal);
    }

    #[test]
    fn sort_renders_tree_order() {
        let mut ids = vec!["2", "1-10", "1-2.1", "1", "1-2", "10", "1-2.0"];
        sort_ids(&mut ids);
        assert_eq!(ids, vec!["1", "1-2", "1-2.0", "1-2.1", "1-10", "2", "10"]);
    }

    #[test]
    fn encoders_produce_decodable_ids() {
        let task = task_id(4);
        let step = step_id(&task, 2);
        let action = action_id(&step, 1);
        assert_eq!(action, "4-2.1");
        let d = decompose(&action);
        assert_eq!(d.task.as_deref(), Some("4"));
        assert_eq!(d.step.as_deref(), Some("4-2"));
    }
}
