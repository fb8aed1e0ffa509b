//! In-memory reference implementation of the Deskflow storage traits.
//!
//! Deterministic and test-friendly. Every mutation happens under a
//! single write guard, which is what gives graph replacement and the
//! compare-and-swap operations their atomicity here; a transactional
//! backend provides the same guarantees with database transactions.

use crate::traits::{
    GraphStore, RotationStore, StepPresentation, TaskStore, TicketStore, WorkflowStore,
};
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deskflow_types::{
    RoleId, SlaTargets, Step, StepId, TaskItem, TaskItemId, TaskStatus, Ticket, TicketId,
    Transition, TransitionId, UserId, Workflow, WorkflowId, WorkflowStatus,
};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Clone, Debug, Default)]
struct GraphRecord {
    steps: Vec<Step>,
    transitions: Vec<Transition>,
}

/// In-memory Deskflow storage adapter.
#[derive(Default)]
pub struct InMemoryStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    graphs: RwLock<HashMap<WorkflowId, GraphRecord>>,
    tickets: RwLock<HashMap<TicketId, Ticket>>,
    tasks: RwLock<HashMap<TaskItemId, TaskItem>>,
    cursors: RwLock<HashMap<(StepId, RoleId), UserId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Next rotation pick given the persisted cursor and the role's
/// current membership.
///
/// The cursor names the last assigned member. If that member is still
/// present, the pick is the one after them in membership order; if
/// they left, the rotation restarts at the head rather than guessing.
/// New members are simply part of the order — they get no priority.
pub(crate) fn next_pick(cursor: Option<&UserId>, members: &[UserId]) -> Option<UserId> {
    if members.is_empty() {
        return None;
    }
    let pick = match cursor.and_then(|c| members.iter().position(|m| m == c)) {
        Some(pos) => members[(pos + 1) % members.len()].clone(),
        None => members[0].clone(),
    };
    Some(pick)
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn create_workflow(&self, workflow: Workflow) -> StoreResult<()> {
        let mut guard = self
            .workflows
            .write()
            .map_err(|_| StoreError::Backend("workflows lock poisoned".to_string()))?;

        if guard.contains_key(&workflow.id) {
            return Err(StoreError::Conflict(format!(
                "workflow {} already exists",
                workflow.id
            )));
        }
        if guard.values().any(|w| w.name == workflow.name) {
            return Err(StoreError::Conflict(format!(
                "workflow name '{}' already in use",
                workflow.name
            )));
        }

        guard.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn get_workflow(&self, id: &WorkflowId) -> StoreResult<Workflow> {
        let guard = self
            .workflows
            .read()
            .map_err(|_| StoreError::Backend("workflows lock poisoned".to_string()))?;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("workflow {} not found", id)))
    }

    async fn list_workflows(&self) -> StoreResult<Vec<Workflow>> {
        let guard = self
            .workflows
            .read()
            .map_err(|_| StoreError::Backend("workflows lock poisoned".to_string()))?;
        let mut workflows = guard.values().cloned().collect::<Vec<_>>();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(workflows)
    }

    async fn set_workflow_status(
        &self,
        id: &WorkflowId,
        status: WorkflowStatus,
    ) -> StoreResult<()> {
        let mut guard = self
            .workflows
            .write()
            .map_err(|_| StoreError::Backend("workflows lock poisoned".to_string()))?;
        let workflow = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("workflow {} not found", id)))?;
        workflow.status = status;
        workflow.updated_at = Utc::now();
        Ok(())
    }

    async fn update_sla(&self, id: &WorkflowId, sla: SlaTargets) -> StoreResult<()> {
        let mut guard = self
            .workflows
            .write()
            .map_err(|_| StoreError::Backend("workflows lock poisoned".to_string()))?;
        let workflow = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("workflow {} not found", id)))?;
        workflow.sla = sla;
        workflow.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn replace_graph(
        &self,
        workflow_id: &WorkflowId,
        steps: Vec<Step>,
        transitions: Vec<Transition>,
    ) -> StoreResult<()> {
        for step in &steps {
            if &step.workflow_id != workflow_id {
                return Err(StoreError::InvariantViolation(format!(
                    "step {} belongs to workflow {}",
                    step.id, step.workflow_id
                )));
            }
        }
        for transition in &transitions {
            let resolves = |id: &StepId| steps.iter().any(|s| &s.id == id);
            if !resolves(&transition.source) || !resolves(&transition.target) {
                return Err(StoreError::InvariantViolation(format!(
                    "transition {} references a step outside the new graph",
                    transition.id
                )));
            }
        }

        // One guard for the whole swap: readers see the prior graph
        // until this insert, and the complete new graph after it.
        let mut guard = self
            .graphs
            .write()
            .map_err(|_| StoreError::Backend("graphs lock poisoned".to_string()))?;
        guard.insert(workflow_id.clone(), GraphRecord { steps, transitions });
        Ok(())
    }

    async fn graph_for(
        &self,
        workflow_id: &WorkflowId,
    ) -> StoreResult<(Vec<Step>, Vec<Transition>)> {
        let guard = self
            .graphs
            .read()
            .map_err(|_| StoreError::Backend("graphs lock poisoned".to_string()))?;
        Ok(guard
            .get(workflow_id)
            .map(|record| (record.steps.clone(), record.transitions.clone()))
            .unwrap_or_default())
    }

    async fn get_step(&self, id: &StepId) -> StoreResult<Step> {
        let guard = self
            .graphs
            .read()
            .map_err(|_| StoreError::Backend("graphs lock poisoned".to_string()))?;
        guard
            .values()
            .flat_map(|record| record.steps.iter())
            .find(|step| &step.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("step {} not found", id)))
    }

    async fn get_transition(&self, id: &TransitionId) -> StoreResult<Transition> {
        let guard = self
            .graphs
            .read()
            .map_err(|_| StoreError::Backend("graphs lock poisoned".to_string()))?;
        guard
            .values()
            .flat_map(|record| record.transitions.iter())
            .find(|transition| &transition.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("transition {} not found", id)))
    }

    async fn update_presentation(
        &self,
        step_id: &StepId,
        update: StepPresentation,
    ) -> StoreResult<Step> {
        let mut guard = self
            .graphs
            .write()
            .map_err(|_| StoreError::Backend("graphs lock poisoned".to_string()))?;
        let step = guard
            .values_mut()
            .flat_map(|record| record.steps.iter_mut())
            .find(|step| &step.id == step_id)
            .ok_or_else(|| StoreError::NotFound(format!("step {} not found", step_id)))?;

        if let Some(name) = update.name {
            step.name = name;
        }
        if let Some(description) = update.description {
            step.description = description;
        }
        if let Some(instruction) = update.instruction {
            step.instruction = instruction;
        }
        if let Some(order) = update.display_order {
            step.display_order = order;
        }
        Ok(step.clone())
    }
}

#[async_trait]
impl TicketStore for InMemoryStore {
    async fn create_ticket(&self, ticket: Ticket) -> StoreResult<()> {
        let mut guard = self
            .tickets
            .write()
            .map_err(|_| StoreError::Backend("tickets lock poisoned".to_string()))?;
        if guard.contains_key(&ticket.id) {
            return Err(StoreError::Conflict(format!(
                "ticket {} already exists",
                ticket.id
            )));
        }
        guard.insert(ticket.id.clone(), ticket);
        Ok(())
    }

    async fn get_ticket(&self, id: &TicketId) -> StoreResult<Ticket> {
        let guard = self
            .tickets
            .read()
            .map_err(|_| StoreError::Backend("tickets lock poisoned".to_string()))?;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("ticket {} not found", id)))
    }

    async fn move_ticket(
        &self,
        id: &TicketId,
        expected_step: &StepId,
        target: StepId,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<Ticket> {
        let mut guard = self
            .tickets
            .write()
            .map_err(|_| StoreError::Backend("tickets lock poisoned".to_string()))?;
        let ticket = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {} not found", id)))?;

        if ticket.is_terminal() {
            return Err(StoreError::InvariantViolation(format!(
                "ticket {} is closed",
                id
            )));
        }
        if ticket.current_step.as_ref() != Some(expected_step) {
            return Err(StoreError::Conflict(format!(
                "ticket {} is no longer on step {}",
                id, expected_step
            )));
        }

        ticket.enter_step(target, deadline, now);
        Ok(ticket.clone())
    }

    async fn close_ticket(&self, id: &TicketId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut guard = self
            .tickets
            .write()
            .map_err(|_| StoreError::Backend("tickets lock poisoned".to_string()))?;
        let ticket = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {} not found", id)))?;
        if ticket.is_terminal() {
            return Err(StoreError::InvariantViolation(format!(
                "ticket {} already closed",
                id
            )));
        }
        ticket.close(now);
        Ok(())
    }

    async fn archive_ticket(&self, id: &TicketId) -> StoreResult<()> {
        let mut guard = self
            .tickets
            .write()
            .map_err(|_| StoreError::Backend("tickets lock poisoned".to_string()))?;
        let ticket = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {} not found", id)))?;
        if ticket.status != deskflow_types::TicketStatus::Closed {
            return Err(StoreError::InvariantViolation(format!(
                "ticket {} must be closed before archiving",
                id
            )));
        }
        ticket.archive();
        Ok(())
    }

    async fn list_open_tickets(&self, workflow_id: &WorkflowId) -> StoreResult<Vec<Ticket>> {
        let guard = self
            .tickets
            .read()
            .map_err(|_| StoreError::Backend("tickets lock poisoned".to_string()))?;
        let mut open = guard
            .values()
            .filter(|t| &t.workflow_id == workflow_id && !t.is_terminal())
            .cloned()
            .collect::<Vec<_>>();
        open.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        Ok(open)
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn insert_task(&self, task: TaskItem) -> StoreResult<()> {
        let mut guard = self
            .tasks
            .write()
            .map_err(|_| StoreError::Backend("tasks lock poisoned".to_string()))?;
        if guard.contains_key(&task.id) {
            return Err(StoreError::Conflict(format!(
                "task {} already exists",
                task.id
            )));
        }
        guard.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get_task(&self, id: &TaskItemId) -> StoreResult<TaskItem> {
        let guard = self
            .tasks
            .read()
            .map_err(|_| StoreError::Backend("tasks lock poisoned".to_string()))?;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("task {} not found", id)))
    }

    async fn tasks_for_ticket(&self, ticket_id: &TicketId) -> StoreResult<Vec<TaskItem>> {
        let guard = self
            .tasks
            .read()
            .map_err(|_| StoreError::Backend("tasks lock poisoned".to_string()))?;
        let mut tasks = guard
            .values()
            .filter(|t| &t.ticket_id == ticket_id)
            .cloned()
            .collect::<Vec<_>>();
        tasks.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at));
        Ok(tasks)
    }

    async fn open_tasks_for_step(
        &self,
        ticket_id: &TicketId,
        step_id: &StepId,
    ) -> StoreResult<Vec<TaskItem>> {
        let guard = self
            .tasks
            .read()
            .map_err(|_| StoreError::Backend("tasks lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .filter(|t| &t.ticket_id == ticket_id && &t.step_id == step_id && t.is_open())
            .cloned()
            .collect())
    }

    async fn close_tasks_for_step(
        &self,
        ticket_id: &TicketId,
        step_id: &StepId,
        status: TaskStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TaskItem>> {
        if status.is_open() {
            return Err(StoreError::InvalidInput(format!(
                "{:?} is not a closing status",
                status
            )));
        }
        let mut guard = self
            .tasks
            .write()
            .map_err(|_| StoreError::Backend("tasks lock poisoned".to_string()))?;
        let mut closed = Vec::new();
        for task in guard.values_mut() {
            if &task.ticket_id == ticket_id && &task.step_id == step_id && task.is_open() {
                task.status = status;
                task.resolved_at = Some(now);
                task.resolution_note = note.clone();
                closed.push(task.clone());
            }
        }
        Ok(closed)
    }

    async fn mark_task(
        &self,
        id: &TaskItemId,
        expected: TaskStatus,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<TaskItem> {
        let mut guard = self
            .tasks
            .write()
            .map_err(|_| StoreError::Backend("tasks lock poisoned".to_string()))?;
        let task = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("task {} not found", id)))?;

        if task.status != expected {
            return Err(StoreError::Conflict(format!(
                "task {} is {:?}, expected {:?}",
                id, task.status, expected
            )));
        }

        task.status = status;
        if status == TaskStatus::InProgress {
            task.acted_at = Some(now);
        } else if !status.is_open() {
            task.resolved_at = Some(now);
        }
        Ok(task.clone())
    }

    async fn open_tasks_past_deadline(&self, now: DateTime<Utc>) -> StoreResult<Vec<TaskItem>> {
        let guard = self
            .tasks
            .read()
            .map_err(|_| StoreError::Backend("tasks lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .filter(|t| t.is_open() && t.is_past_deadline(now))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RotationStore for InMemoryStore {
    async fn next_in_rotation(
        &self,
        step_id: &StepId,
        role: &RoleId,
        members: &[UserId],
    ) -> StoreResult<UserId> {
        let mut guard = self
            .cursors
            .write()
            .map_err(|_| StoreError::Backend("cursors lock poisoned".to_string()))?;
        let key = (step_id.clone(), role.clone());
        let pick = next_pick(guard.get(&key), members).ok_or_else(|| {
            StoreError::InvalidInput(format!("role '{}' has no members to rotate", role))
        })?;
        guard.insert(key, pick.clone());
        Ok(pick)
    }
}
