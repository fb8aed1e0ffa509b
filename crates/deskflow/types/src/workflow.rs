//! Workflows, steps, and transitions: the persisted process graph
//!
//! A Workflow owns its Steps and Transitions. The graph is replaced as
//! a whole when edited (partial edits on a live topology would leave
//! dangling references); only presentational step metadata may change
//! in place.

use crate::{RoleId, SlaTargets, StepId, TransitionId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A helpdesk business process: classification, lifecycle status, and
/// the four per-priority SLA budgets
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    /// Unique per owner; enforced at the store.
    pub name: String,
    pub category: String,
    pub sub_category: String,
    pub department: String,
    pub status: WorkflowStatus,
    pub sla: SlaTargets,
    /// Role that receives work escalated off this workflow's steps.
    pub escalation_role: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, sla: SlaTargets) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            category: String::new(),
            sub_category: String::new(),
            department: String::new(),
            status: WorkflowStatus::Draft,
            sla,
            escalation_role: RoleId::system(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_sub_category(mut self, sub_category: impl Into<String>) -> Self {
        self.sub_category = sub_category.into();
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }

    pub fn with_escalation_role(mut self, role: RoleId) -> Self {
        self.escalation_role = role;
        self
    }

    /// Only deployed workflows accept new tickets.
    pub fn can_accept_tickets(&self) -> bool {
        self.status == WorkflowStatus::Deployed
    }
}

/// Lifecycle status of a workflow
///
/// Workflows are never deleted while tickets reference them; they are
/// paused instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Deployed,
    Paused,
}

/// One node of a workflow graph — a unit of work owned by a role
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub workflow_id: WorkflowId,
    pub name: String,
    pub description: String,
    pub instruction: String,
    /// Who may act on this step. Start and end markers carry the
    /// implicit system role.
    pub role: RoleId,
    pub display_order: u32,
    /// Relative share of the SLA budget. Not a probability.
    pub weight: f64,
    pub is_start: bool,
    pub is_end: bool,
    pub created_at: DateTime<Utc>,
}

impl Step {
    pub const DEFAULT_WEIGHT: f64 = 0.5;

    pub fn new(workflow_id: WorkflowId, name: impl Into<String>, role: RoleId) -> Self {
        Self {
            id: StepId::generate(),
            workflow_id,
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            role,
            display_order: 0,
            weight: Self::DEFAULT_WEIGHT,
            is_start: false,
            is_end: false,
            created_at: Utc::now(),
        }
    }

    /// The start marker. Tickets are created past it, on its outgoing
    /// transition's target.
    pub fn start(workflow_id: WorkflowId) -> Self {
        let mut step = Self::new(workflow_id, "Start", RoleId::system());
        step.is_start = true;
        step
    }

    /// The end marker. Reaching it closes the ticket.
    pub fn end(workflow_id: WorkflowId) -> Self {
        let mut step = Self::new(workflow_id, "End", RoleId::system());
        step.is_end = true;
        step
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.display_order = order;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Whether this step takes part in SLA apportionment.
    pub fn is_weighted(&self) -> bool {
        !self.is_start && !self.is_end
    }
}

/// A directed, labeled edge between two steps of the same workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub workflow_id: WorkflowId,
    pub source: StepId,
    pub target: StepId,
    /// The action name shown to the actor, e.g. "Approve".
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl Transition {
    pub fn new(
        workflow_id: WorkflowId,
        source: StepId,
        target: StepId,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: TransitionId::generate(),
            workflow_id,
            source,
            target,
            label: label.into(),
            created_at: Utc::now(),
        }
    }
}
