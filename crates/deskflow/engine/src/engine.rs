//! The Deskflow engine facade
//!
//! Key Concepts:
//!
//! - **Workflows** are versioned processes; only deployed ones accept
//!   tickets, and their graph is swapped atomically as a whole.
//! - **Tickets** hold a single current-step pointer. Every move is a
//!   compare-and-swap against that pointer, which serializes racing
//!   actors per ticket without any engine-side locking.
//! - **Deadlines** are derived, not stored as truth: the step weight
//!   and the workflow's tier budgets are the ground truth, and the
//!   concrete timestamp is anchored when a ticket enters a step.
//!
//! Design Principles:
//!
//! - Reject before write. Validation (graph structure, tier ordering,
//!   transition legality) happens before the first store call.
//! - Collaborator failures after a committed mutation are logged and
//!   surfaced, never rolled back.

use crate::compiler::{compile, CompiledGraph};
use crate::config::EngineConfig;
use crate::directory::RoleDirectory;
use crate::notify::{Event, Notifier};
use crate::sla::{derive_status, SlaReport};
use chrono::{Duration, Utc};
use deskflow_graph::{allocation_for, GraphSubmission};
use deskflow_store::{
    GraphStore, RotationStore, StepPresentation, StoreError, TaskStore, TicketStore, WorkflowStore,
};
use deskflow_types::{
    DeskflowError, DeskflowResult, Priority, RoleId, SlaTargets, Step, StepId, TaskItem,
    TaskStatus, Ticket, TicketId, TransitionId, UserId, Workflow, WorkflowId, WorkflowStatus,
};
use std::sync::Arc;

/// Everything the engine needs from persistence, as one object-safe
/// bound.
pub trait EngineStore:
    WorkflowStore + GraphStore + TicketStore + TaskStore + RotationStore
{
}

impl<T: WorkflowStore + GraphStore + TicketStore + TaskStore + RotationStore> EngineStore for T {}

/// Orchestrates workflows, tickets, and task assignment over the
/// storage and collaborator contracts.
pub struct DeskflowEngine {
    pub(crate) store: Arc<dyn EngineStore>,
    pub(crate) directory: Arc<dyn RoleDirectory>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: EngineConfig,
}

impl DeskflowEngine {
    pub fn new(
        store: Arc<dyn EngineStore>,
        directory: Arc<dyn RoleDirectory>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            config,
        }
    }

    // ---- workflow lifecycle ----

    /// Persist a new workflow after checking its SLA tier ordering.
    pub async fn create_workflow(&self, workflow: Workflow) -> DeskflowResult<Workflow> {
        workflow
            .sla
            .validate()
            .map_err(DeskflowError::OrderingConstraint)?;

        self.store
            .create_workflow(workflow.clone())
            .await
            .map_err(store_err)?;
        tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "workflow created");
        Ok(workflow)
    }

    pub async fn workflow(&self, id: &WorkflowId) -> DeskflowResult<Workflow> {
        self.store.get_workflow(id).await.map_err(store_err)
    }

    pub async fn workflows(&self) -> DeskflowResult<Vec<Workflow>> {
        self.store.list_workflows().await.map_err(store_err)
    }

    /// Deploy a draft or paused workflow. Requires a persisted graph.
    pub async fn deploy(&self, id: &WorkflowId) -> DeskflowResult<()> {
        let workflow = self.store.get_workflow(id).await.map_err(store_err)?;
        if workflow.status == WorkflowStatus::Deployed {
            return Err(DeskflowError::InvalidTransition(format!(
                "workflow {} is already deployed",
                id
            )));
        }

        let (steps, _) = self.store.graph_for(id).await.map_err(store_err)?;
        if steps.is_empty() {
            return Err(DeskflowError::InvalidTransition(format!(
                "workflow {} has no graph to deploy",
                id
            )));
        }

        self.store
            .set_workflow_status(id, WorkflowStatus::Deployed)
            .await
            .map_err(store_err)?;
        tracing::info!(workflow_id = %id, "workflow deployed");
        Ok(())
    }

    /// Pause a deployed workflow. Existing tickets continue to run;
    /// only new ticket intake stops.
    pub async fn pause(&self, id: &WorkflowId) -> DeskflowResult<()> {
        let workflow = self.store.get_workflow(id).await.map_err(store_err)?;
        if workflow.status != WorkflowStatus::Deployed {
            return Err(DeskflowError::InvalidTransition(format!(
                "workflow {} is not deployed",
                id
            )));
        }

        self.store
            .set_workflow_status(id, WorkflowStatus::Paused)
            .await
            .map_err(store_err)?;
        tracing::info!(workflow_id = %id, "workflow paused");
        Ok(())
    }

    /// Retune the per-tier SLA budgets. Deadlines of steps entered
    /// after the retune use the new budgets; anchored deadlines stand.
    pub async fn retune_sla(&self, id: &WorkflowId, sla: SlaTargets) -> DeskflowResult<()> {
        sla.validate().map_err(DeskflowError::OrderingConstraint)?;
        self.store.update_sla(id, sla).await.map_err(store_err)?;
        tracing::info!(workflow_id = %id, "SLA budgets retuned");
        Ok(())
    }

    // ---- graph ----

    /// Validate, compile, and atomically persist a graph submission,
    /// replacing the workflow's current graph as a whole.
    pub async fn submit_graph(
        &self,
        workflow_id: &WorkflowId,
        submission: &GraphSubmission,
    ) -> DeskflowResult<CompiledGraph> {
        self.store.get_workflow(workflow_id).await.map_err(store_err)?;

        let compiled = compile(workflow_id, submission)?;
        self.store
            .replace_graph(
                workflow_id,
                compiled.steps.clone(),
                compiled.transitions.clone(),
            )
            .await
            .map_err(store_err)?;

        tracing::info!(
            workflow_id = %workflow_id,
            steps = compiled.steps.len(),
            transitions = compiled.transitions.len(),
            "graph replaced"
        );
        Ok(compiled)
    }

    pub async fn graph(&self, workflow_id: &WorkflowId) -> DeskflowResult<(Vec<Step>, Vec<deskflow_types::Transition>)> {
        self.store.graph_for(workflow_id).await.map_err(store_err)
    }

    /// Edit a step's presentational metadata in place. The graph shape
    /// is not touchable this way; topology changes go through
    /// [`submit_graph`](Self::submit_graph).
    pub async fn update_step_presentation(
        &self,
        step_id: &StepId,
        update: StepPresentation,
    ) -> DeskflowResult<Step> {
        self.store
            .update_presentation(step_id, update)
            .await
            .map_err(store_err)
    }

    // ---- tickets ----

    /// Open a ticket on a deployed workflow. The ticket starts on the
    /// start marker's sole outgoing target, with a deadline derived
    /// from that step's share of the priority tier budget, and its
    /// first task assigned by rotation.
    ///
    /// If the first step's role has nobody active, the error surfaces
    /// but the ticket stays open and unassigned; assignment can be
    /// retried without reopening.
    pub async fn open_ticket(
        &self,
        workflow_id: &WorkflowId,
        priority: Priority,
    ) -> DeskflowResult<Ticket> {
        let workflow = self.store.get_workflow(workflow_id).await.map_err(store_err)?;
        if !workflow.can_accept_tickets() {
            return Err(DeskflowError::InvalidTransition(format!(
                "workflow {} is not deployed and cannot accept tickets",
                workflow_id
            )));
        }

        let (steps, transitions) = self.store.graph_for(workflow_id).await.map_err(store_err)?;
        let start = steps
            .iter()
            .find(|s| s.is_start)
            .ok_or_else(|| DeskflowError::NotFound(format!("workflow {} has no start step", workflow_id)))?;

        let mut outgoing = transitions.iter().filter(|t| t.source == start.id);
        let first = outgoing.next().ok_or_else(|| {
            DeskflowError::InvalidTransition(format!(
                "workflow {} start step has no outgoing transition",
                workflow_id
            ))
        })?;
        if outgoing.next().is_some() {
            return Err(DeskflowError::InvalidTransition(format!(
                "workflow {} start step has more than one outgoing transition",
                workflow_id
            )));
        }
        let initial = steps
            .iter()
            .find(|s| s.id == first.target)
            .ok_or_else(|| DeskflowError::NotFound(format!("step {} not found", first.target)))?;

        let now = Utc::now();
        let deadline = step_deadline(&workflow, &steps, initial, priority, now);

        let mut ticket = Ticket::new(workflow_id.clone(), priority);
        ticket.enter_step(initial.id.clone(), deadline, now);
        self.store.create_ticket(ticket.clone()).await.map_err(store_err)?;

        tracing::info!(
            ticket_id = %ticket.id,
            workflow_id = %workflow_id,
            priority = %priority,
            step_id = %initial.id,
            "ticket opened"
        );
        self.emit(Event::TicketTransitioned {
            ticket_id: ticket.id.clone(),
            workflow_id: workflow_id.clone(),
            from: None,
            to: initial.id.clone(),
            closed: false,
        })
        .await;

        self.assign(
            &ticket.id,
            &initial.id,
            crate::assignment::AssignmentPolicy::RoundRobin,
        )
        .await?;

        self.store.get_ticket(&ticket.id).await.map_err(store_err)
    }

    /// Fire a transition on a ticket.
    ///
    /// The transition must originate at the ticket's current step.
    /// Open tasks of the outgoing step are resolved with `comment`,
    /// the pointer moves with a compare-and-swap (a lost race surfaces
    /// as a retryable conflict), and either the ticket closes (end
    /// step) or the target step is assigned by rotation.
    pub async fn transition(
        &self,
        ticket_id: &TicketId,
        transition_id: &TransitionId,
        actor: &UserId,
        comment: Option<String>,
    ) -> DeskflowResult<Ticket> {
        let ticket = self.store.get_ticket(ticket_id).await.map_err(store_err)?;
        if ticket.is_terminal() {
            return Err(DeskflowError::TerminalState(ticket_id.clone()));
        }
        let current = ticket.current_step.clone().ok_or_else(|| {
            DeskflowError::InvalidTransition(format!("ticket {} has no current step", ticket_id))
        })?;

        let transition = self.store.get_transition(transition_id).await.map_err(store_err)?;
        if transition.workflow_id != ticket.workflow_id {
            return Err(DeskflowError::InvalidTransition(format!(
                "transition {} belongs to another workflow",
                transition_id
            )));
        }
        if transition.source != current {
            return Err(DeskflowError::InvalidTransition(format!(
                "transition '{}' does not originate at the ticket's current step",
                transition.label
            )));
        }

        let workflow = self
            .store
            .get_workflow(&ticket.workflow_id)
            .await
            .map_err(store_err)?;
        let (steps, _) = self.store.graph_for(&ticket.workflow_id).await.map_err(store_err)?;
        let target = steps
            .iter()
            .find(|s| s.id == transition.target)
            .ok_or_else(|| DeskflowError::NotFound(format!("step {} not found", transition.target)))?;

        let now = Utc::now();
        self.store
            .close_tasks_for_step(ticket_id, &current, TaskStatus::Resolved, comment, now)
            .await
            .map_err(store_err)?;

        let deadline = if target.is_end {
            None
        } else {
            step_deadline(&workflow, &steps, target, ticket.priority, now)
        };

        // Lost race against a concurrent mover surfaces here.
        self.store
            .move_ticket(ticket_id, &current, target.id.clone(), deadline, now)
            .await
            .map_err(store_err)?;

        let closed = target.is_end;
        if closed {
            self.store.close_ticket(ticket_id, now).await.map_err(store_err)?;
        }

        tracing::info!(
            ticket_id = %ticket_id,
            from = %current,
            to = %target.id,
            actor = %actor,
            closed,
            "ticket transitioned"
        );
        self.emit(Event::TicketTransitioned {
            ticket_id: ticket_id.clone(),
            workflow_id: ticket.workflow_id.clone(),
            from: Some(current),
            to: target.id.clone(),
            closed,
        })
        .await;

        if !closed {
            self.assign(
                ticket_id,
                &target.id,
                crate::assignment::AssignmentPolicy::RoundRobin,
            )
            .await?;
        }

        self.store.get_ticket(ticket_id).await.map_err(store_err)
    }

    /// Archive a closed ticket, taking it out of active listings.
    pub async fn archive_ticket(&self, ticket_id: &TicketId) -> DeskflowResult<()> {
        self.store.archive_ticket(ticket_id).await.map_err(store_err)?;
        tracing::info!(ticket_id = %ticket_id, "ticket archived");
        Ok(())
    }

    pub async fn ticket(&self, ticket_id: &TicketId) -> DeskflowResult<Ticket> {
        self.store.get_ticket(ticket_id).await.map_err(store_err)
    }

    pub async fn open_tickets(&self, workflow_id: &WorkflowId) -> DeskflowResult<Vec<Ticket>> {
        self.store.list_open_tickets(workflow_id).await.map_err(store_err)
    }

    pub async fn ticket_tasks(&self, ticket_id: &TicketId) -> DeskflowResult<Vec<TaskItem>> {
        self.store.tasks_for_ticket(ticket_id).await.map_err(store_err)
    }

    /// Current SLA posture of a ticket. Read-only; derives from the
    /// anchored deadline and the configured at-risk window.
    pub async fn sla_status(&self, ticket_id: &TicketId) -> DeskflowResult<SlaReport> {
        let ticket = self.store.get_ticket(ticket_id).await.map_err(store_err)?;
        Ok(SlaReport {
            ticket_id: ticket.id,
            current_step: ticket.current_step,
            deadline: ticket.step_deadline,
            status: derive_status(
                ticket.step_deadline,
                Utc::now(),
                self.config.at_risk_window_secs,
            ),
        })
    }

    // ---- collaborators ----

    /// Resolve role membership, bounded by the collaborator timeout.
    pub(crate) async fn members_of(&self, role: &RoleId) -> DeskflowResult<Vec<UserId>> {
        match tokio::time::timeout(
            self.config.collaborator_timeout,
            self.directory.active_members(role),
        )
        .await
        {
            Ok(Ok(members)) => Ok(members),
            Ok(Err(err)) => Err(DeskflowError::CollaboratorUnavailable(format!(
                "directory failed resolving role '{}': {}",
                role, err
            ))),
            Err(_) => Err(DeskflowError::CollaboratorUnavailable(format!(
                "directory timed out resolving role '{}'",
                role
            ))),
        }
    }

    /// Fire-and-forget notification. Failures are logged, never
    /// propagated into the mutation that triggered them.
    pub(crate) async fn emit(&self, event: Event) {
        let kind = event.kind();
        if let Err(err) = self.notifier.notify(event).await {
            tracing::warn!(%kind, error = %err, "notifier failed; continuing");
        }
    }
}

/// Deadline for entering `step` now: the step's share of the priority
/// tier budget, anchored at `now`. Start/end markers carry none.
fn step_deadline(
    workflow: &Workflow,
    steps: &[Step],
    step: &Step,
    priority: Priority,
    now: chrono::DateTime<Utc>,
) -> Option<chrono::DateTime<Utc>> {
    if !step.is_weighted() {
        return None;
    }
    let weighted: Vec<(StepId, f64)> = steps
        .iter()
        .filter(|s| s.is_weighted())
        .map(|s| (s.id.clone(), s.weight))
        .collect();
    let total = workflow.sla.for_priority(priority);
    allocation_for(total, &weighted, &step.id).map(|secs| now + Duration::seconds(secs as i64))
}

pub(crate) fn store_err(err: StoreError) -> DeskflowError {
    match err {
        StoreError::NotFound(msg) => DeskflowError::NotFound(msg),
        StoreError::Conflict(msg) => DeskflowError::ConcurrencyConflict(msg),
        StoreError::InvariantViolation(msg) | StoreError::InvalidInput(msg) => {
            DeskflowError::InvalidTransition(msg)
        }
        StoreError::Backend(msg) => DeskflowError::Storage(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::StaticDirectory;
    use deskflow_graph::{EdgeSpec, NodeSpec};
    use deskflow_store::InMemoryStore;
    use deskflow_types::TicketStatus;

    struct Harness {
        engine: DeskflowEngine,
        notifier: Arc<RecordingNotifier>,
        directory: Arc<StaticDirectory>,
    }

    fn make_harness() -> Harness {
        let directory = Arc::new(
            StaticDirectory::new()
                .with_role(
                    RoleId::new("l1"),
                    vec![UserId::new("ann"), UserId::new("bo"), UserId::new("cy")],
                )
                .with_role(RoleId::new("l2"), vec![UserId::new("dev")]),
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

    fn make_submission() -> GraphSubmission {
        GraphSubmission::new()
            .node(NodeSpec::start("s"))
            .node(NodeSpec::task("triage", "Triage", RoleId::new("l1")).with_weight(1.0))
            .node(NodeSpec::task("fix", "Fix", RoleId::new("l2")).with_weight(3.0))
            .node(NodeSpec::end("e"))
            .edge(EdgeSpec::new("s", "triage"))
            .edge(EdgeSpec::new("triage", "fix").with_label("Escalate"))
            .edge(EdgeSpec::new("fix", "e").with_label("Resolve"))
    }

    /// Create, graph, deploy; returns the workflow and compiled graph.
    async fn make_deployed(engine: &DeskflowEngine) -> (Workflow, CompiledGraph) {
        let workflow = engine
            .create_workflow(Workflow::new(
                "Hardware Request",
                SlaTargets::new(4 * 3600, 8 * 3600, 16 * 3600, 32 * 3600),
            ))
            .await
            .unwrap();
        let compiled = engine
            .submit_graph(&workflow.id, &make_submission())
            .await
            .unwrap();
        engine.deploy(&workflow.id).await.unwrap();
        (workflow, compiled)
    }

    #[tokio::test]
    async fn test_create_workflow_rejects_bad_tier_ordering() {
        let h = make_harness();
        let result = h
            .engine
            .create_workflow(Workflow::new("Broken", SlaTargets::new(100, 100, 50, 200)))
            .await;
        assert!(matches!(result, Err(DeskflowError::OrderingConstraint(v)) if v.len() == 2));
    }

    #[tokio::test]
    async fn test_deploy_requires_a_graph() {
        let h = make_harness();
        let workflow = h
            .engine
            .create_workflow(Workflow::new("Empty", SlaTargets::new(1, 2, 3, 4)))
            .await
            .unwrap();

        let result = h.engine.deploy(&workflow.id).await;
        assert!(matches!(result, Err(DeskflowError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_pause_stops_intake_only() {
        let h = make_harness();
        let (workflow, _) = make_deployed(&h.engine).await;
        let ticket = h
            .engine
            .open_ticket(&workflow.id, Priority::Medium)
            .await
            .unwrap();

        h.engine.pause(&workflow.id).await.unwrap();

        let result = h.engine.open_ticket(&workflow.id, Priority::Low).await;
        assert!(matches!(result, Err(DeskflowError::InvalidTransition(_))));

        // The in-flight ticket still answers reads.
        assert_eq!(h.engine.ticket(&ticket.id).await.unwrap().status, TicketStatus::Open);
    }

    #[tokio::test]
    async fn test_open_ticket_lands_past_start_with_weighted_deadline() {
        let h = make_harness();
        let (workflow, compiled) = make_deployed(&h.engine).await;

        let before = Utc::now();
        let ticket = h
            .engine
            .open_ticket(&workflow.id, Priority::Urgent)
            .await
            .unwrap();

        let triage = compiled.id_map["triage"].clone();
        assert_eq!(ticket.current_step, Some(triage));

        // Urgent budget 4h, triage weight 1 of 4: one hour.
        let deadline = ticket.step_deadline.unwrap();
        let secs = (deadline - before).num_seconds();
        assert!((3598..=3602).contains(&secs), "got {secs}");

        // Rotation starts at the first member.
        let tasks = h.engine.ticket_tasks(&ticket.id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].assignee, UserId::new("ann"));
        assert_eq!(tasks[0].deadline, ticket.step_deadline);
    }

    #[tokio::test]
    async fn test_transition_resolves_old_tasks_and_assigns_new() {
        let h = make_harness();
        let (workflow, compiled) = make_deployed(&h.engine).await;
        let ticket = h
            .engine
            .open_ticket(&workflow.id, Priority::High)
            .await
            .unwrap();

        let escalate = compiled
            .transitions
            .iter()
            .find(|t| t.label == "Escalate")
            .unwrap();
        let moved = h
            .engine
            .transition(
                &ticket.id,
                &escalate.id,
                &UserId::new("ann"),
                Some("needs l2".into()),
            )
            .await
            .unwrap();

        assert_eq!(moved.current_step, Some(compiled.id_map["fix"].clone()));
        assert_eq!(moved.status, TicketStatus::Open);

        let tasks = h.engine.ticket_tasks(&ticket.id).await.unwrap();
        assert_eq!(tasks.len(), 2);
        let triage_task = &tasks[0];
        assert_eq!(triage_task.status, TaskStatus::Resolved);
        assert_eq!(triage_task.resolution_note.as_deref(), Some("needs l2"));
        let fix_task = &tasks[1];
        assert!(fix_task.is_open());
        assert_eq!(fix_task.assignee, UserId::new("dev"));
    }

    #[tokio::test]
    async fn test_reaching_end_closes_the_ticket() {
        let h = make_harness();
        let (workflow, compiled) = make_deployed(&h.engine).await;
        let ticket = h
            .engine
            .open_ticket(&workflow.id, Priority::Low)
            .await
            .unwrap();

        let escalate = compiled.transitions.iter().find(|t| t.label == "Escalate").unwrap();
        let resolve = compiled.transitions.iter().find(|t| t.label == "Resolve").unwrap();
        let actor = UserId::new("dev");

        h.engine.transition(&ticket.id, &escalate.id, &actor, None).await.unwrap();
        let closed = h
            .engine
            .transition(&ticket.id, &resolve.id, &actor, Some("done".into()))
            .await
            .unwrap();

        assert_eq!(closed.status, TicketStatus::Closed);
        assert!(closed.step_deadline.is_none());
        assert!(closed.closed_at.is_some());

        // No task opened on the end marker.
        let tasks = h.engine.ticket_tasks(&ticket.id).await.unwrap();
        assert!(tasks.iter().all(|t| !t.is_open()));

        h.engine.archive_ticket(&ticket.id).await.unwrap();
        assert_eq!(h.engine.ticket(&ticket.id).await.unwrap().status, TicketStatus::Archived);
    }

    #[tokio::test]
    async fn test_terminal_ticket_rejects_transitions() {
        let h = make_harness();
        let (workflow, compiled) = make_deployed(&h.engine).await;
        let ticket = h.engine.open_ticket(&workflow.id, Priority::Low).await.unwrap();

        let escalate = compiled.transitions.iter().find(|t| t.label == "Escalate").unwrap();
        let resolve = compiled.transitions.iter().find(|t| t.label == "Resolve").unwrap();
        let actor = UserId::new("dev");
        h.engine.transition(&ticket.id, &escalate.id, &actor, None).await.unwrap();
        h.engine.transition(&ticket.id, &resolve.id, &actor, None).await.unwrap();

        let result = h.engine.transition(&ticket.id, &escalate.id, &actor, None).await;
        match result {
            Err(err @ DeskflowError::TerminalState(_)) => assert!(!err.retryable()),
            other => panic!("expected terminal-state rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transition_must_originate_at_current_step() {
        let h = make_harness();
        let (workflow, compiled) = make_deployed(&h.engine).await;
        let ticket = h.engine.open_ticket(&workflow.id, Priority::Medium).await.unwrap();

        // Ticket sits on triage; "Resolve" starts at fix.
        let resolve = compiled.transitions.iter().find(|t| t.label == "Resolve").unwrap();
        let result = h
            .engine
            .transition(&ticket.id, &resolve.id, &UserId::new("ann"), None)
            .await;
        assert!(matches!(result, Err(DeskflowError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_sla_report_tracks_the_deadline() {
        let h = make_harness();
        let (workflow, _) = make_deployed(&h.engine).await;
        let ticket = h.engine.open_ticket(&workflow.id, Priority::Urgent).await.unwrap();

        let report = h.engine.sla_status(&ticket.id).await.unwrap();
        assert_eq!(report.current_step, ticket.current_step);
        assert_eq!(report.deadline, ticket.step_deadline);
        // One-hour budget, fifteen-minute window: comfortably on track.
        assert_eq!(report.status, crate::sla::SlaStatus::OnTrack);
    }

    #[tokio::test]
    async fn test_retune_applies_to_later_entries_only() {
        let h = make_harness();
        let (workflow, _) = make_deployed(&h.engine).await;
        let ticket = h.engine.open_ticket(&workflow.id, Priority::Urgent).await.unwrap();
        let anchored = ticket.step_deadline;

        h.engine
            .retune_sla(&workflow.id, SlaTargets::new(8 * 3600, 16 * 3600, 32 * 3600, 64 * 3600))
            .await
            .unwrap();

        // The anchored deadline stands.
        assert_eq!(h.engine.ticket(&ticket.id).await.unwrap().step_deadline, anchored);

        // A ticket entering the step after the retune uses the new
        // budget: triage now gets 2h of the 8h urgent tier.
        let before = Utc::now();
        let fresh = h.engine.open_ticket(&workflow.id, Priority::Urgent).await.unwrap();
        let secs = (fresh.step_deadline.unwrap() - before).num_seconds();
        assert!((7198..=7202).contains(&secs), "got {secs}");

        let bad = h
            .engine
            .retune_sla(&workflow.id, SlaTargets::new(10, 10, 10, 10))
            .await;
        assert!(matches!(bad, Err(DeskflowError::OrderingConstraint(_))));
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let h = make_harness();
        let (workflow, compiled) = make_deployed(&h.engine).await;
        let ticket = h.engine.open_ticket(&workflow.id, Priority::Medium).await.unwrap();
        let escalate = compiled.transitions.iter().find(|t| t.label == "Escalate").unwrap();
        h.engine
            .transition(&ticket.id, &escalate.id, &UserId::new("ann"), None)
            .await
            .unwrap();

        assert_eq!(
            h.notifier.kinds(),
            vec![
                "ticket_transitioned",
                "task_assigned",
                "ticket_transitioned",
                "task_assigned",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_role_surfaces_no_eligible_assignee() {
        let h = make_harness();
        let (workflow, _) = make_deployed(&h.engine).await;
        h.directory.set_members(RoleId::new("l1"), Vec::new());

        let result = h.engine.open_ticket(&workflow.id, Priority::High).await;
        match result {
            Err(DeskflowError::NoEligibleAssignee { role }) => {
                assert_eq!(role, RoleId::new("l1"));
            }
            other => panic!("expected no-eligible-assignee, got {other:?}"),
        }
    }

    /// Directory that never answers within any reasonable timeout.
    struct SlowDirectory;

    #[async_trait::async_trait]
    impl RoleDirectory for SlowDirectory {
        async fn active_members(&self, _role: &RoleId) -> anyhow::Result<Vec<UserId>> {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    struct FailingDirectory;

    #[async_trait::async_trait]
    impl RoleDirectory for FailingDirectory {
        async fn active_members(&self, _role: &RoleId) -> anyhow::Result<Vec<UserId>> {
            Err(anyhow::anyhow!("identity platform returned 503"))
        }
    }

    struct FailingNotifier;

    #[async_trait::async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _event: Event) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("transport down"))
        }
    }

    #[tokio::test]
    async fn test_directory_timeout_surfaces_collaborator_outage() {
        let engine = DeskflowEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(SlowDirectory),
            Arc::new(RecordingNotifier::new()),
            EngineConfig::default()
                .with_collaborator_timeout(std::time::Duration::from_millis(20)),
        );
        let workflow = engine
            .create_workflow(Workflow::new("Slow", SlaTargets::new(1, 2, 3, 4)))
            .await
            .unwrap();
        engine.submit_graph(&workflow.id, &make_submission()).await.unwrap();
        engine.deploy(&workflow.id).await.unwrap();

        let err = engine.open_ticket(&workflow.id, Priority::Low).await.unwrap_err();
        match err {
            DeskflowError::CollaboratorUnavailable(_) => assert!(err.retryable()),
            other => panic!("expected collaborator outage, got {other:?}"),
        }

        // The committed ticket is not rolled back; it just has no
        // assignee yet.
        let tickets = engine.open_tickets(&workflow.id).await.unwrap();
        assert_eq!(tickets.len(), 1);
        assert!(engine.ticket_tasks(&tickets[0].id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_error_surfaces_collaborator_outage() {
        let engine = DeskflowEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(FailingDirectory),
            Arc::new(RecordingNotifier::new()),
            EngineConfig::default(),
        );
        let workflow = engine
            .create_workflow(Workflow::new("Down", SlaTargets::new(1, 2, 3, 4)))
            .await
            .unwrap();
        engine.submit_graph(&workflow.id, &make_submission()).await.unwrap();
        engine.deploy(&workflow.id).await.unwrap();

        let err = engine.open_ticket(&workflow.id, Priority::Low).await.unwrap_err();
        assert!(matches!(err, DeskflowError::CollaboratorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failing_notifier_never_rolls_back_a_transition() {
        let directory = StaticDirectory::new()
            .with_role(RoleId::new("l1"), vec![UserId::new("ann")])
            .with_role(RoleId::new("l2"), vec![UserId::new("dev")]);
        let engine = DeskflowEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(directory),
            Arc::new(FailingNotifier),
            EngineConfig::default(),
        );
        let workflow = engine
            .create_workflow(Workflow::new("Deaf", SlaTargets::new(1, 2, 3, 4)))
            .await
            .unwrap();
        let compiled = engine.submit_graph(&workflow.id, &make_submission()).await.unwrap();
        engine.deploy(&workflow.id).await.unwrap();

        // Every emit fails, every mutation sticks.
        let ticket = engine.open_ticket(&workflow.id, Priority::Medium).await.unwrap();
        let escalate = compiled.transitions.iter().find(|t| t.label == "Escalate").unwrap();
        let moved = engine
            .transition(&ticket.id, &escalate.id, &UserId::new("ann"), None)
            .await
            .unwrap();

        assert_eq!(moved.current_step, Some(compiled.id_map["fix"].clone()));
        let tasks = engine.ticket_tasks(&ticket.id).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().any(|t| t.is_open()));
    }

    #[tokio::test]
    async fn test_update_presentation_through_facade() {
        let h = make_harness();
        let (_, compiled) = make_deployed(&h.engine).await;
        let step_id = compiled.id_map["triage"].clone();

        let step = h
            .engine
            .update_step_presentation(
                &step_id,
                StepPresentation {
                    instruction: Some("Check the asset tag first".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(step.instruction, "Check the asset tag first");
    }
}
