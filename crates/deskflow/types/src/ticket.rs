//! Tickets: live instantiations of a workflow
//!
//! A ticket references its workflow by identity (many tickets share
//! one workflow) and carries a single current-step pointer plus the
//! deadline derived for that step. Tickets are archived on reaching
//! the end step, never deleted.

use crate::{Priority, StepId, TicketId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request moving through a workflow graph
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub workflow_id: WorkflowId,
    /// Selects which of the workflow's four SLA budgets applies.
    pub priority: Priority,
    pub status: TicketStatus,
    pub current_step: Option<StepId>,
    pub step_entered_at: Option<DateTime<Utc>>,
    /// Deadline for the current step, anchored at the moment the step
    /// was entered. None once the ticket is closed.
    pub step_deadline: Option<DateTime<Utc>>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn new(workflow_id: WorkflowId, priority: Priority) -> Self {
        Self {
            id: TicketId::generate(),
            workflow_id,
            priority,
            status: TicketStatus::Open,
            current_step: None,
            step_entered_at: None,
            step_deadline: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    /// Move the current-step pointer and re-anchor the deadline.
    pub fn enter_step(
        &mut self,
        step: StepId,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        self.current_step = Some(step);
        self.step_entered_at = Some(now);
        self.step_deadline = deadline;
    }

    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = TicketStatus::Closed;
        self.step_deadline = None;
        self.closed_at = Some(now);
    }

    pub fn archive(&mut self) {
        self.status = TicketStatus::Archived;
    }

    /// Terminal tickets reject every further action.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TicketStatus::Closed | TicketStatus::Archived)
    }
}

/// Lifecycle status of a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Open,
    /// Reached the end step.
    Closed,
    /// Closed and moved out of active listings, kept for audit.
    Archived,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_ticket_lifecycle() {
        let mut ticket = Ticket::new(WorkflowId::generate(), Priority::High);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(!ticket.is_terminal());
        assert!(ticket.current_step.is_none());

        let now = Utc::now();
        let step = StepId::generate();
        ticket.enter_step(step.clone(), Some(now + Duration::hours(1)), now);
        assert_eq!(ticket.current_step, Some(step));
        assert!(ticket.step_deadline.is_some());

        ticket.close(now);
        assert!(ticket.is_terminal());
        assert!(ticket.step_deadline.is_none());
        assert_eq!(ticket.closed_at, Some(now));

        ticket.archive();
        assert_eq!(ticket.status, TicketStatus::Archived);
        assert!(ticket.is_terminal());
    }
}
