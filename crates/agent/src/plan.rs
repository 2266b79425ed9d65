//! Execution plans and their lifecycle.
//!
//! ```text
//! draft ─► pending_approval ─► approved ─► executing ─► completed | failed
//! draft ─► approved                      (agent does not require approval)
//! pending_approval | approved ─► pending_approval              (modify)
//! any non-terminal state ─► cancelled
//! ```

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    PendingApproval,
    Approved,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the lifecycle allows `self → to`.
    pub fn can_transition_to(self, to: PlanStatus) -> bool {
        use PlanStatus::*;
        match (self, to) {
            (from, Cancelled) => !from.is_terminal(),
            (Draft, PendingApproval | Approved) => true,
            (PendingApproval, Approved) => true,
            // A modification sends the plan back for approval.
            (PendingApproval | Approved, PendingApproval) => true,
            (Approved, Executing) => true,
            (Executing, Completed | Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One tool invocation in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(rename = "toolName", alias = "tool_name", alias = "tool")]
    pub tool_name: String,

    #[serde(default)]
    pub description: String,

    /// Free-text input, used when `parameters` is empty.
    #[serde(default)]
    pub input: String,

    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl PlanStep {
    pub fn new(tool_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            description: description.into(),
            input: String::new(),
            parameters: serde_json::Map::new(),
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// The argument text handed to the tool: the parameter map as JSON if it
    /// has entries, else the free-text input verbatim, else `{}`.
    pub fn arguments(&self) -> Result<String, serde_json::Error> {
        if !self.parameters.is_empty() {
            return serde_json::to_string(&self.parameters);
        }
        if !self.input.is_empty() {
            return Ok(self.input.clone());
        }
        Ok("{}".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub task_id: String,
    pub description: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
    /// Set only by an explicit approval. The executor checks this flag on
    /// its own, whatever `status` says.
    pub user_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionPlan {
    /// A fresh `draft` plan with a new task id.
    pub fn new(description: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4().to_string(),
            description: description.into(),
            steps,
            status: PlanStatus::Draft,
            user_approved: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `to`, or fail if the lifecycle forbids it.
    pub fn transition(&mut self, to: PlanStatus) -> Result<(), PlanError> {
        if !self.status.can_transition_to(to) {
            return Err(PlanError::InvalidTransition {
                task_id: self.task_id.clone(),
                from: self.status,
                to,
            });
        }
        debug!(task_id = %self.task_id, from = %self.status, to = %to, "Plan transition");
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Leave `draft`: wait for approval, or approve on the agent's behalf
    /// when it does not require one.
    pub fn submit(&mut self, requires_approval: bool) -> Result<(), PlanError> {
        if requires_approval {
            self.transition(PlanStatus::PendingApproval)
        } else {
            self.transition(PlanStatus::Approved)?;
            self.user_approved = true;
            Ok(())
        }
    }

    /// Record the user's approval.
    pub fn approve(&mut self) -> Result<(), PlanError> {
        self.transition(PlanStatus::Approved)?;
        self.user_approved = true;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), PlanError> {
        self.transition(PlanStatus::Cancelled)
    }

    /// Replace the steps with a regenerated version. The task id is kept and
    /// the plan goes back to `pending_approval`.
    pub fn revise(&mut self, description: String, steps: Vec<PlanStep>) -> Result<(), PlanError> {
        self.transition(PlanStatus::PendingApproval)?;
        self.description = description;
        self.steps = steps;
        self.user_approved = false;
        Ok(())
    }

    /// Markdown rendering, with approval instructions while pending.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("## Execution Plan\n\n");
        out.push_str(&format!("**Task ID:** `{}`\n", self.task_id));
        out.push_str(&format!("**Status:** {}\n", self.status));
        if !self.description.is_empty() {
            out.push_str(&format!("**Description:** {}\n", self.description));
        }
        out.push_str("\n### Steps\n");
        if self.steps.is_empty() {
            out.push_str("(no steps)\n");
        }
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{}. **{}**", i + 1, step.tool_name));
            if !step.description.is_empty() {
                out.push_str(&format!(": {}", step.description));
            }
            out.push('\n');
            if let Ok(args) = step.arguments() {
                if args != "{}" {
                    out.push_str(&format!("   Arguments: `{args}`\n"));
                }
            }
        }
        if self.status == PlanStatus::PendingApproval {
            out.push_str(&format!(
                "\nReply `approve {id}` to run this plan, `modify {id} <changes>` to revise it, \
                 or `cancel {id}` to discard it.\n",
                id = self.task_id
            ));
        }
        out
    }
}

impl std::fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Plans keyed by task id. Safe for concurrent insert and lookup.
#[derive(Debug, Default)]
pub struct PlanStore {
    plans: RwLock<HashMap<String, ExecutionPlan>>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ExecutionPlan>> {
        self.plans.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ExecutionPlan>> {
        self.plans.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Insert or replace a plan.
    pub fn insert(&self, plan: ExecutionPlan) {
        self.write().insert(plan.task_id.clone(), plan);
    }

    /// A copy of the plan with this task id.
    pub fn get(&self, task_id: &str) -> Result<ExecutionPlan, PlanError> {
        self.read()
            .get(task_id)
            .cloned()
            .ok_or_else(|| PlanError::NotFound(task_id.to_string()))
    }

    /// Mutate a stored plan in place.
    pub fn update<R>(
        &self,
        task_id: &str,
        f: impl FnOnce(&mut ExecutionPlan) -> Result<R, PlanError>,
    ) -> Result<R, PlanError> {
        let mut plans = self.write();
        let plan = plans
            .get_mut(task_id)
            .ok_or_else(|| PlanError::NotFound(task_id.to_string()))?;
        f(plan)
    }

    pub fn remove(&self, task_id: &str) -> Option<ExecutionPlan> {
        self.write().remove(task_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }
}
