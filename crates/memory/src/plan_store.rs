//! Per-conversation plan table.

use std::collections::HashMap;
use agentweave_core::action_id;
use agentweave_core::error::MemoryError;
use agentweave_core::plan::{Plan, PlanPatch};

/// Plans of one conversation keyed by task uid.
///
/// Upserts keep the position of the first insertion, so re-emitting a
/// corrected plan never duplicates or reorders rows.
#[derive(Debug, Default, Clone)]
pub struct PlanStore {
    plans: HashMap<String, Plan>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite plans by task uid.
    pub fn append(&mut self, plans: impl IntoIterator<Item = Plan>) {
        for plan in plans {
            self.plans.insert(plan.task_uid.clone(), plan);
        }
    }

    /// Patch state, retry count, and optionally model and result of one plan.
    ///
    /// Returns the updated plan. An unknown uid yields
    /// [`MemoryError::PlanNotFound`]; a move that breaks the lifecycle yields
    /// [`MemoryError::InvalidTransition`] and leaves the plan untouched.
    pub fn update(&mut self, task_uid: &str, patch: &PlanPatch) -> Result<Plan, MemoryError> {
        let plan = self
            .plans
            .get_mut(task_uid)
            .ok_or_else(|| MemoryError::PlanNotFound(task_uid.to_string()))?;

        if !plan.state.can_transition_to(patch.state) {
            return Err(MemoryError::InvalidTransition {
                from: plan.state.to_string(),
                to: patch.state.to_string(),
            });
        }

        plan.apply(patch);
        Ok(plan.clone())
    }

    pub fn get(&self, task_uid: &str) -> Option<&Plan> {
        self.plans.get(task_uid)
    }

    /// Plans emitted by one planning step, in tree order.
    pub fn list_by_round(&self, round_id: &str) -> Vec<&Plan> {
        self.sorted(|p| p.round_id == round_id)
    }

    /// Plans created by one planner agent, in tree order.
    pub fn list_by_planner(&self, planner_agent: &str) -> Vec<&Plan> {
        self.sorted(|p| p.planner_agent == planner_agent)
    }

    /// Every plan, in tree order.
    pub fn all(&self) -> Vec<&Plan> {
        self.sorted(|_| true)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn sorted(&self, keep: impl Fn(&Plan) -> bool) -> Vec<&Plan> {
        let mut plans: Vec<&Plan> = self.plans.values().filter(|p| keep(p)).collect();
        plans.sort_by(|a, b| action_id::compare(&a.task_uid, &b.task_uid));
        plans
    }
}
