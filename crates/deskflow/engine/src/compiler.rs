//! Graph compilation: submission shape to durable steps and transitions
//!
//! Compilation validates first and mints durable identifiers second,
//! so a rejected submission never allocates anything. The temp→durable
//! map is part of the result and exists only for the response cycle;
//! temporary ids are never persisted.

use deskflow_graph::{validate, GraphSubmission, NodeKind};
use deskflow_types::{
    DeskflowError, DeskflowResult, RoleId, Step, StepId, Transition, WorkflowId,
};
use std::collections::HashMap;

/// The durable form of a validated submission, ready for an atomic
/// graph swap.
#[derive(Clone, Debug)]
pub struct CompiledGraph {
    pub workflow_id: WorkflowId,
    pub steps: Vec<Step>,
    pub transitions: Vec<Transition>,
    /// Submission temp id → minted durable id.
    pub id_map: HashMap<String, StepId>,
}

impl CompiledGraph {
    pub fn step_for(&self, temp_id: &str) -> Option<&Step> {
        let id = self.id_map.get(temp_id)?;
        self.steps.iter().find(|s| &s.id == id)
    }
}

/// Validate and compile a submission against a workflow.
///
/// Structural rejection carries every violation found. Start and end
/// markers receive the implicit system role regardless of what the
/// submission carried; task roles pass through as submitted.
pub fn compile(
    workflow_id: &WorkflowId,
    submission: &GraphSubmission,
) -> DeskflowResult<CompiledGraph> {
    validate(submission).map_err(DeskflowError::StructuralGraph)?;

    let mut id_map = HashMap::with_capacity(submission.nodes.len());
    let mut steps = Vec::with_capacity(submission.nodes.len());
    for node in &submission.nodes {
        let role = match node.kind {
            NodeKind::Start | NodeKind::End => RoleId::system(),
            // Validation guarantees task nodes carry a role.
            NodeKind::Task => node.role.clone().unwrap_or_else(RoleId::system),
        };

        let mut step = Step::new(workflow_id.clone(), node.name.clone(), role)
            .with_description(node.description.clone())
            .with_instruction(node.instruction.clone())
            .with_order(node.display_order)
            .with_weight(node.weight.unwrap_or(Step::DEFAULT_WEIGHT));
        step.is_start = node.kind == NodeKind::Start;
        step.is_end = node.kind == NodeKind::End;

        id_map.insert(node.temp_id.clone(), step.id.clone());
        steps.push(step);
    }

    let transitions = submission
        .edges
        .iter()
        .map(|edge| {
            // Endpoints resolved during validation.
            Transition::new(
                workflow_id.clone(),
                id_map[&edge.from].clone(),
                id_map[&edge.to].clone(),
                edge.label.clone(),
            )
        })
        .collect();

    Ok(CompiledGraph {
        workflow_id: workflow_id.clone(),
        steps,
        transitions,
        id_map,
    })
}
