//! Task assignment: direct picks, rotation, transfer, escalation
//!
//! Assignment always goes through the role directory, so a member who
//! left the role since the graph was authored can never be handed
//! work. The rotation cursor lives in the store and advances in the
//! same atomic unit as the selection, which is what keeps concurrent
//! assignments fair.

use crate::engine::{store_err, DeskflowEngine};
use crate::notify::Event;
use chrono::Utc;
use deskflow_store::{GraphStore, RotationStore, TaskStore, TicketStore};
use deskflow_types::{
    DeskflowError, DeskflowResult, RoleId, StepId, TaskItem, TaskItemId, TaskOrigin, TaskStatus,
    TicketId, UserId,
};
use serde::{Deserialize, Serialize};

/// How to choose the assignee for a new task item
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AssignmentPolicy {
    /// An explicitly named assignee, who must be an active member of
    /// the step's role.
    Direct { assignee: UserId },
    /// The next member in the step's stored rotation.
    RoundRobin,
}

impl DeskflowEngine {
    /// Create a task item binding the ticket's current step to an
    /// assignee chosen by `policy`.
    ///
    /// The ticket must be open and sitting on `step_id`. A role with
    /// no active members, or a direct pick outside the role, surfaces
    /// as [`DeskflowError::NoEligibleAssignee`].
    pub async fn assign(
        &self,
        ticket_id: &TicketId,
        step_id: &StepId,
        policy: AssignmentPolicy,
    ) -> DeskflowResult<TaskItem> {
        let ticket = self.store.get_ticket(ticket_id).await.map_err(store_err)?;
        if ticket.is_terminal() {
            return Err(DeskflowError::TerminalState(ticket_id.clone()));
        }
        if ticket.current_step.as_ref() != Some(step_id) {
            return Err(DeskflowError::InvalidTransition(format!(
                "ticket {} is not on step {}",
                ticket_id, step_id
            )));
        }

        let step = self.store.get_step(step_id).await.map_err(store_err)?;
        let members = self.members_of(&step.role).await?;
        if members.is_empty() {
            return Err(DeskflowError::NoEligibleAssignee {
                role: step.role.clone(),
            });
        }

        let (assignee, origin) = match policy {
            AssignmentPolicy::Direct { assignee } => {
                if !members.contains(&assignee) {
                    return Err(DeskflowError::NoEligibleAssignee {
                        role: step.role.clone(),
                    });
                }
                (assignee, TaskOrigin::Direct)
            }
            AssignmentPolicy::RoundRobin => {
                let pick = self
                    .store
                    .next_in_rotation(step_id, &step.role, &members)
                    .await
                    .map_err(store_err)?;
                (pick, TaskOrigin::RoundRobin)
            }
        };

        let task = TaskItem::new(
            ticket_id.clone(),
            step_id.clone(),
            assignee.clone(),
            origin,
        )
        .with_deadline(ticket.step_deadline);
        self.store.insert_task(task.clone()).await.map_err(store_err)?;

        tracing::info!(
            task_id = %task.id,
            ticket_id = %ticket_id,
            step_id = %step_id,
            assignee = %assignee,
            origin = ?origin,
            "task assigned"
        );
        self.emit(Event::TaskAssigned {
            task_id: task.id.clone(),
            ticket_id: ticket_id.clone(),
            step_id: step_id.clone(),
            assignee,
            origin,
        })
        .await;

        Ok(task)
    }

    /// Hand an open task to another active member of the same role.
    ///
    /// The prior item is marked reassigned and kept; the replacement
    /// carries the transfer origin and inherits the deadline.
    pub async fn transfer(&self, task_id: &TaskItemId, to: UserId) -> DeskflowResult<TaskItem> {
        let task = self.store.get_task(task_id).await.map_err(store_err)?;
        if !task.is_open() {
            return Err(DeskflowError::InvalidTransition(format!(
                "task {} is not open",
                task_id
            )));
        }

        let step = self.store.get_step(&task.step_id).await.map_err(store_err)?;
        let members = self.members_of(&step.role).await?;
        if !members.contains(&to) {
            return Err(DeskflowError::NoEligibleAssignee {
                role: step.role.clone(),
            });
        }

        let now = Utc::now();
        self.store
            .mark_task(task_id, task.status, TaskStatus::Reassigned, now)
            .await
            .map_err(store_err)?;

        let replacement = TaskItem::new(
            task.ticket_id.clone(),
            task.step_id.clone(),
            to.clone(),
            TaskOrigin::Transfer,
        )
        .with_deadline(task.deadline);
        self.store
            .insert_task(replacement.clone())
            .await
            .map_err(store_err)?;

        tracing::info!(
            task_id = %task_id,
            replacement_id = %replacement.id,
            from = %task.assignee,
            to = %to,
            "task transferred"
        );
        self.emit(Event::TaskAssigned {
            task_id: replacement.id.clone(),
            ticket_id: replacement.ticket_id.clone(),
            step_id: replacement.step_id.clone(),
            assignee: to,
            origin: TaskOrigin::Transfer,
        })
        .await;

        Ok(replacement)
    }

    /// Escalate an open task to a caller-supplied role, outside the
    /// periodic sweep — for when a supervisor pulls a task up before
    /// its deadline breaches.
    ///
    /// The prior item is marked escalated and kept for audit; the
    /// replacement carries the escalation origin and is assigned from
    /// `escalation_role` by rotation. The status change is a
    /// compare-and-swap, so racing a sweep over the same item settles
    /// on one winner.
    pub async fn escalate(
        &self,
        task_id: &TaskItemId,
        escalation_role: &RoleId,
    ) -> DeskflowResult<TaskItem> {
        let task = self.store.get_task(task_id).await.map_err(store_err)?;
        if !task.is_open() {
            return Err(DeskflowError::InvalidTransition(format!(
                "task {} is not open",
                task_id
            )));
        }

        let members = self.members_of(escalation_role).await?;
        if members.is_empty() {
            return Err(DeskflowError::NoEligibleAssignee {
                role: escalation_role.clone(),
            });
        }

        let now = Utc::now();
        self.store
            .mark_task(task_id, task.status, TaskStatus::Escalated, now)
            .await
            .map_err(store_err)?;

        let assignee = self
            .store
            .next_in_rotation(&task.step_id, escalation_role, &members)
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
            task_id = %task_id,
            replacement_id = %replacement.id,
            role = %escalation_role,
            assignee = %assignee,
            "task escalated by request"
        );
        self.emit(Event::TaskEscalated {
            superseded: task_id.clone(),
            replacement: replacement.id.clone(),
            ticket_id: replacement.ticket_id.clone(),
            step_id: replacement.step_id.clone(),
            assignee,
        })
        .await;

        Ok(replacement)
    }
}
