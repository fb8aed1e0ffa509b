//! Task items: the assignable unit of work
//!
//! A TaskItem binds one ticket, one step, and one assignee. A step
//! transition closes the active items for the outgoing step and opens
//! new ones for the incoming step. Superseded items (escalated,
//! reassigned) are kept as rows for audit, never deleted.

use crate::{StepId, TaskItemId, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (ticket, step, assignee) binding with its own lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: TaskItemId,
    pub ticket_id: TicketId,
    pub step_id: StepId,
    pub assignee: UserId,
    pub status: TaskStatus,
    /// How this item came to exist.
    pub origin: TaskOrigin,
    pub assigned_at: DateTime<Utc>,
    /// When the assignee first acted on the item.
    pub acted_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Copy of the ticket's step deadline at assignment time; the
    /// escalation sweep scans against it.
    pub deadline: Option<DateTime<Utc>>,
    /// Comment attached when the item was closed.
    pub resolution_note: Option<String>,
}

impl TaskItem {
    pub fn new(ticket_id: TicketId, step_id: StepId, assignee: UserId, origin: TaskOrigin) -> Self {
        Self {
            id: TaskItemId::generate(),
            ticket_id,
            step_id,
            assignee,
            status: TaskStatus::Pending,
            origin,
            assigned_at: Utc::now(),
            acted_at: None,
            resolved_at: None,
            deadline: None,
            resolution_note: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// Lifecycle status of a task item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
    /// Superseded by an escalation item after an SLA breach.
    Escalated,
    /// Superseded by a transfer to another role member.
    Reassigned,
    Cancelled,
}

impl TaskStatus {
    /// Open items are the ones the escalation sweep considers.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

/// How a task item was created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    /// An actor explicitly named the assignee.
    Direct,
    /// Reassigned by the previous holder.
    Transfer,
    /// Created by the SLA-breach sweep.
    Escalation,
    /// Selected by the rotation.
    RoundRobin,
}
