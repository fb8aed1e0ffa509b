use crate::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deskflow_types::{
    RoleId, SlaTargets, Step, StepId, TaskItem, TaskItemId, TaskStatus, Ticket, TicketId,
    Transition, TransitionId, UserId, Workflow, WorkflowId, WorkflowStatus,
};
use serde::{Deserialize, Serialize};

/// Presentational step fields that may change without replacing the
/// graph. A `None` leaves the field untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StepPresentation {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub display_order: Option<u32>,
}

/// Storage interface for workflow records.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new workflow. The name is unique; a clash is a `Conflict`.
    async fn create_workflow(&self, workflow: Workflow) -> StoreResult<()>;

    async fn get_workflow(&self, id: &WorkflowId) -> StoreResult<Workflow>;

    async fn list_workflows(&self) -> StoreResult<Vec<Workflow>>;

    async fn set_workflow_status(
        &self,
        id: &WorkflowId,
        status: WorkflowStatus,
    ) -> StoreResult<()>;

    /// Retune the per-tier budgets. Step allocations are derived on
    /// read, so no recompute pass is needed.
    async fn update_sla(&self, id: &WorkflowId, sla: SlaTargets) -> StoreResult<()>;
}

/// Storage interface for the persisted process graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Replace the whole graph for a workflow in one atomic swap.
    ///
    /// On failure the prior graph remains fully intact and queryable;
    /// a reader never observes an empty or half-written graph.
    async fn replace_graph(
        &self,
        workflow_id: &WorkflowId,
        steps: Vec<Step>,
        transitions: Vec<Transition>,
    ) -> StoreResult<()>;

    /// The current steps and transitions of a workflow. Empty vectors
    /// for a workflow whose graph was never compiled.
    async fn graph_for(&self, workflow_id: &WorkflowId)
        -> StoreResult<(Vec<Step>, Vec<Transition>)>;

    async fn get_step(&self, id: &StepId) -> StoreResult<Step>;

    async fn get_transition(&self, id: &TransitionId) -> StoreResult<Transition>;

    /// Update presentational metadata in place. Graph shape is never
    /// affected by this call.
    async fn update_presentation(
        &self,
        step_id: &StepId,
        update: StepPresentation,
    ) -> StoreResult<Step>;
}

/// Storage interface for ticket records.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create_ticket(&self, ticket: Ticket) -> StoreResult<()>;

    async fn get_ticket(&self, id: &TicketId) -> StoreResult<Ticket>;

    /// Compare-and-swap move of the current-step pointer.
    ///
    /// Fails with `Conflict` when the ticket is no longer on
    /// `expected_step`, which is how two racing transitions for the
    /// same ticket serialize.
    async fn move_ticket(
        &self,
        id: &TicketId,
        expected_step: &StepId,
        target: StepId,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<Ticket>;

    async fn close_ticket(&self, id: &TicketId, now: DateTime<Utc>) -> StoreResult<()>;

    async fn archive_ticket(&self, id: &TicketId) -> StoreResult<()>;

    async fn list_open_tickets(&self, workflow_id: &WorkflowId) -> StoreResult<Vec<Ticket>>;
}

/// Storage interface for task items.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: TaskItem) -> StoreResult<()>;

    async fn get_task(&self, id: &TaskItemId) -> StoreResult<TaskItem>;

    async fn tasks_for_ticket(&self, ticket_id: &TicketId) -> StoreResult<Vec<TaskItem>>;

    async fn open_tasks_for_step(
        &self,
        ticket_id: &TicketId,
        step_id: &StepId,
    ) -> StoreResult<Vec<TaskItem>>;

    /// Close every open item for (ticket, step) with the given status
    /// and optional note. Returns the items as closed.
    async fn close_tasks_for_step(
        &self,
        ticket_id: &TicketId,
        step_id: &StepId,
        status: TaskStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TaskItem>>;

    /// Compare-and-swap on the item's status. A mismatch is a
    /// `Conflict`; this is what makes the escalation sweep idempotent
    /// and safe to run concurrently with itself.
    async fn mark_task(
        &self,
        id: &TaskItemId,
        expected: TaskStatus,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<TaskItem>;

    /// Open items whose deadline has passed, for the breach sweep.
    async fn open_tasks_past_deadline(&self, now: DateTime<Utc>) -> StoreResult<Vec<TaskItem>>;
}

/// Storage interface for round-robin rotation cursors.
#[async_trait]
pub trait RotationStore: Send + Sync {
    /// Pick the next member of the rotation for (step, role) and
    /// advance the cursor, as one atomic unit — two concurrent calls
    /// never select the same next member.
    ///
    /// The cursor is keyed to the last assigned member rather than an
    /// index, so membership churn re-slots the rotation instead of
    /// resetting it.
    async fn next_in_rotation(
        &self,
        step_id: &StepId,
        role: &RoleId,
        members: &[UserId],
    ) -> StoreResult<UserId>;
}
