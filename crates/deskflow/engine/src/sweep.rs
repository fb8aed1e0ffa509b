//! SLA-breach escalation sweep
//!
//! The sweep is a periodic job: scan open task items past their
//! deadline, supersede each with an escalation item assigned from the
//! workflow's escalation role. The supersession is a status
//! compare-and-swap, so overlapping sweeps (or a sweep racing a
//! transition) settle on exactly one winner per item and the sweep is
//! safe to re-run at any time.

use crate::engine::{store_err, DeskflowEngine};
use crate::notify::Event;
use chrono::{DateTime, Utc};
use deskflow_store::{RotationStore, StoreError, TaskStore, TicketStore, WorkflowStore};
use deskflow_types::{DeskflowResult, TaskItem, TaskItemId, TaskOrigin, TaskStatus};

/// Outcome of one sweep run
#[derive(Clone, Debug, Default)]
pub struct SweepReport {
    /// Open items found past their deadline.
    pub scanned: usize,
    /// Replacement items created, one per escalated original.
    pub escalated: Vec<TaskItemId>,
    /// Items left alone: lost the status race to a concurrent actor,
    /// or their escalation role could not be resolved right now.
    pub skipped: usize,
}

impl DeskflowEngine {
    /// Escalate every open task item whose deadline has passed as of
    /// `now`.
    ///
    /// Each original is kept with status escalated; the replacement
    /// carries the escalation origin and no deadline of its own, so it
    /// is not itself swept. Items whose escalation role is empty or
    /// unreachable stay open and are retried on the next run.
    pub async fn run_escalation_sweep(&self, now: DateTime<Utc>) -> DeskflowResult<SweepReport> {
        let overdue = self
            .store
            .open_tasks_past_deadline(now)
            .await
            .map_err(store_err)?;

        let mut report = SweepReport {
            scanned: overdue.len(),
            ..Default::default()
        };

        for task in overdue {
            match self.escalate_one(&task, now).await {
                Ok(Some(replacement_id)) => report.escalated.push(replacement_id),
                Ok(None) => report.skipped += 1,
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            scanned = report.scanned,
            escalated = report.escalated.len(),
            skipped = report.skipped,
            "escalation sweep finished"
        );
        Ok(report)
    }

    /// Escalate a single overdue item. `Ok(None)` means the item was
    /// deliberately left alone this run.
    async fn escalate_one(
        &self,
        task: &TaskItem,
        now: DateTime<Utc>,
    ) -> DeskflowResult<Option<TaskItemId>> {
        let ticket = self.store.get_ticket(&task.ticket_id).await.map_err(store_err)?;
        if ticket.is_terminal() {
            // Closed since the scan; nothing to escalate.
            return Ok(None);
        }
        let workflow = self
            .store
            .get_workflow(&ticket.workflow_id)
            .await
            .map_err(store_err)?;
        let role = workflow.escalation_role.clone();

        // Resolve membership before touching the item, so a directory
        // outage leaves the original open for the next run.
        let members = match self.members_of(&role).await {
            Ok(members) => members,
            Err(err) => {
                tracing::warn!(task_id = %task.id, role = %role, error = %err, "escalation deferred");
                return Ok(None);
            }
        };
        if members.is_empty() {
            tracing::warn!(task_id = %task.id, role = %role, "escalation role has no members");
            return Ok(None);
        }

        match self
            .store
            .mark_task(&task.id, task.status, TaskStatus::Escalated, now)
            .await
        {
            Ok(_) => {}
            // Another sweep or a transition got there first.
            Err(StoreError::Conflict(_)) => return Ok(None),
            Err(err) => return Err(store_err(err)),
        }

        let assignee = self
            .store
            .next_in_rotation(&task.step_id, &role, &members)
            .await
            .map_err(store_err)?;
        let replacement = TaskItem::new(
            task.ticket_id.clone(),
            task.step_id.clone(),
            assignee.clone(),
            TaskOrigin::Escalation,
        );
        self.store
            .insert_task(replacement.clone())
            .await
            .map_err(store_err)?;

        tracing::info!(
            task_id = %task.id,
            replacement_id = %replacement.id,
            ticket_id = %task.ticket_id,
            assignee = %assignee,
            "task escalated past SLA deadline"
        );
        self.emit(Event::TaskEscalated {
            superseded: task.id.clone(),
            replacement: replacement.id.clone(),
            ticket_id: task.ticket_id.clone(),
            step_id: task.step_id.clone(),
            assignee,
        })
        .await;

        Ok(Some(replacement.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Event, RecordingNotifier};
    use crate::{DeskflowEngine, EngineConfig, StaticDirectory};
    use chrono::Duration;
    use deskflow_graph::{EdgeSpec, GraphSubmission, NodeSpec};
    use deskflow_store::InMemoryStore;
    use deskflow_types::{Priority, RoleId, SlaTargets, Ticket, UserId, Workflow};
    use std::sync::Arc;

    struct Harness {
        engine: DeskflowEngine,
        notifier: Arc<RecordingNotifier>,
        directory: Arc<StaticDirectory>,
    }

    fn make_harness() -> Harness {
        let directory = Arc::new(
            StaticDirectory::new()
                .with_role(RoleId::new("l1"), vec![UserId::new("ann")])
                .with_role(RoleId::new("managers"), vec![UserId::new("mia"), UserId::new("niko")]),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = DeskflowEngine::new(
            Arc::new(InMemoryStore::new()),
            directory.clone(),
            notifier.clone(),
            EngineConfig::default(),
        );
        Harness {
            engine,
            notifier,
            directory,
        }
    }

    /// One-step workflow escalating to the managers role, with a
    /// one-second urgent budget so deadlines are trivially breachable.
    async fn make_overdue_ticket(h: &Harness) -> Ticket {
        let workflow = h
            .engine
            .create_workflow(
                Workflow::new("Incident", SlaTargets::new(1, 2, 3, 4))
                    .with_escalation_role(RoleId::new("managers")),
            )
            .await
            .unwrap();
        let submission = GraphSubmission::new()
            .node(NodeSpec::start("s"))
            .node(NodeSpec::task("work", "Work", RoleId::new("l1")))
            .node(NodeSpec::end("e"))
            .edge(EdgeSpec::new("s", "work"))
            .edge(EdgeSpec::new("work", "e").with_label("Done"));
        h.engine.submit_graph(&workflow.id, &submission).await.unwrap();
        h.engine.deploy(&workflow.id).await.unwrap();
        h.engine.open_ticket(&workflow.id, Priority::Urgent).await.unwrap()
    }

    #[tokio::test]
    async fn test_sweep_escalates_overdue_and_keeps_both_rows() {
        let h = make_harness();
        let ticket = make_overdue_ticket(&h).await;
        let later = Utc::now() + Duration::minutes(5);

        let report = h.engine.run_escalation_sweep(later).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.escalated.len(), 1);
        assert_eq!(report.skipped, 0);

        let tasks = h.engine.ticket_tasks(&ticket.id).await.unwrap();
        assert_eq!(tasks.len(), 2);
        let original = tasks.iter().find(|t| t.origin == TaskOrigin::RoundRobin).unwrap();
        let escalation = tasks.iter().find(|t| t.origin == TaskOrigin::Escalation).unwrap();
        assert_eq!(original.status, TaskStatus::Escalated);
        assert!(escalation.is_open());
        assert_eq!(escalation.assignee, UserId::new("mia"));

        let escalation_event = h
            .notifier
            .recorded()
            .into_iter()
            .find_map(|e| match e {
                Event::TaskEscalated {
                    superseded,
                    step_id,
                    ..
                } => Some((superseded, step_id)),
                _ => None,
            })
            .unwrap();
        assert_eq!(escalation_event.0, original.id);
        assert_eq!(escalation_event.1, original.step_id);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let h = make_harness();
        let ticket = make_overdue_ticket(&h).await;
        let later = Utc::now() + Duration::minutes(5);

        h.engine.run_escalation_sweep(later).await.unwrap();
        let second = h.engine.run_escalation_sweep(later).await.unwrap();

        // The original is no longer open and the escalation item
        // carries no deadline, so the second run finds nothing.
        assert_eq!(second.scanned, 0);
        assert!(second.escalated.is_empty());

        let tasks = h.engine.ticket_tasks(&ticket.id).await.unwrap();
        assert_eq!(tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_before_deadline_does_nothing() {
        let h = make_harness();
        let ticket = make_overdue_ticket(&h).await;

        let report = h
            .engine
            .run_escalation_sweep(Utc::now() - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(report.scanned, 0);

        let tasks = h.engine.ticket_tasks(&ticket.id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].is_open());
    }

    #[tokio::test]
    async fn test_empty_escalation_role_defers_the_item() {
        let h = make_harness();
        h.directory.set_members(RoleId::new("managers"), Vec::new());
        let ticket = make_overdue_ticket(&h).await;
        let later = Utc::now() + Duration::minutes(5);

        let report = h.engine.run_escalation_sweep(later).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.escalated.is_empty());

        // The original stays open for the next run.
        let tasks = h.engine.ticket_tasks(&ticket.id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].is_open());

        // Membership restored: the retry succeeds.
        h.directory
            .set_members(RoleId::new("managers"), vec![UserId::new("mia")]);
        let retry = h.engine.run_escalation_sweep(later).await.unwrap();
        assert_eq!(retry.escalated.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_ticket_is_not_escalated() {
        let h = make_harness();
        let ticket = make_overdue_ticket(&h).await;
        let later = Utc::now() + Duration::minutes(5);

        // Close the ticket between the breach and the sweep.
        let (_, transitions) = h.engine.graph(&ticket.workflow_id).await.unwrap();
        let done = transitions.iter().find(|t| t.label == "Done").unwrap();
        h.engine
            .transition(&ticket.id, &done.id, &UserId::new("ann"), None)
            .await
            .unwrap();

        let report = h.engine.run_escalation_sweep(later).await.unwrap();
        assert!(report.escalated.is_empty());
    }
}
