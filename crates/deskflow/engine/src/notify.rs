//! Notification contract
//!
//! Notifications are fire-and-forget: a failing or slow notifier is
//! logged and never rolls back the mutation that triggered it. The
//! transport (email, chat, webhooks) lives behind the trait.

use async_trait::async_trait;
use deskflow_types::{StepId, TaskItemId, TaskOrigin, TicketId, UserId, WorkflowId};
use std::sync::Mutex;

/// Something observable happened to a ticket or task.
#[derive(Clone, Debug)]
pub enum Event {
    TicketTransitioned {
        ticket_id: TicketId,
        workflow_id: WorkflowId,
        from: Option<StepId>,
        to: StepId,
        closed: bool,
    },
    TaskAssigned {
        task_id: TaskItemId,
        ticket_id: TicketId,
        step_id: StepId,
        assignee: UserId,
        origin: TaskOrigin,
    },
    TaskEscalated {
        superseded: TaskItemId,
        replacement: TaskItemId,
        ticket_id: TicketId,
        step_id: StepId,
        assignee: UserId,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TicketTransitioned { .. } => "ticket_transitioned",
            Self::TaskAssigned { .. } => "task_assigned",
            Self::TaskEscalated { .. } => "task_escalated",
        }
    }
}

/// Outbound notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: Event) -> anyhow::Result<()>;
}

/// Discards every event. The default when no transport is wired up.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _event: Event) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Captures events in memory so tests can assert on what was emitted.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.recorded().iter().map(|e| e.kind()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: Event) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("event log poisoned"))?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_notifier_captures_in_order() {
        let notifier = RecordingNotifier::new();
        notifier
            .notify(Event::TaskAssigned {
                task_id: TaskItemId::generate(),
                ticket_id: TicketId::generate(),
                step_id: StepId::generate(),
                assignee: UserId::new("a"),
                origin: TaskOrigin::Direct,
            })
            .await
            .unwrap();
        notifier
            .notify(Event::TicketTransitioned {
                ticket_id: TicketId::generate(),
                workflow_id: WorkflowId::generate(),
                from: None,
                to: StepId::generate(),
                closed: false,
            })
            .await
            .unwrap();

        assert_eq!(notifier.kinds(), vec!["task_assigned", "ticket_transitioned"]);
    }
}
