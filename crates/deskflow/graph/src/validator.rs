//! Structural validation of graph submissions
//!
//! The validator is a pure function: no storage, no mutation, safe to
//! call speculatively. It accumulates every violation rather than
//! stopping at the first, so an operator can fix a graph in one pass.

use crate::{GraphSubmission, NodeKind};
use deskflow_types::GraphViolation;
use std::collections::{HashMap, HashSet, VecDeque};

/// Check a candidate graph for structural soundness.
///
/// Checks, in order: exactly one start and one end node; unique node
/// ids; a role on every task node; no self-loops; no edges out of the
/// end node or into the start node; every edge endpoint resolvable;
/// and breadth-first reachability of every node from start. The
/// reachability checks are skipped when an earlier failure (no unique
/// start, unresolvable endpoint) leaves the traversal ill-defined.
pub fn validate(submission: &GraphSubmission) -> Result<(), Vec<GraphViolation>> {
    let mut violations = Vec::new();

    let start_count = submission
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .count();
    let end_count = submission
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::End)
        .count();

    if start_count != 1 {
        violations.push(GraphViolation::StartCount(start_count));
    }
    if end_count != 1 {
        violations.push(GraphViolation::EndCount(end_count));
    }

    let mut seen = HashSet::new();
    for node in &submission.nodes {
        if !seen.insert(node.temp_id.as_str()) {
            violations.push(GraphViolation::DuplicateNode(node.temp_id.clone()));
        }
    }

    for node in &submission.nodes {
        if node.kind == NodeKind::Task {
            let missing = match &node.role {
                Some(role) => role.as_str().trim().is_empty(),
                None => true,
            };
            if missing {
                violations.push(GraphViolation::MissingRole(node.temp_id.clone()));
            }
        }
    }

    let kind_of: HashMap<&str, NodeKind> = submission
        .nodes
        .iter()
        .map(|n| (n.temp_id.as_str(), n.kind))
        .collect();

    let mut endpoints_ok = true;
    for edge in &submission.edges {
        if edge.from == edge.to {
            violations.push(GraphViolation::SelfLoop(edge.from.clone()));
        }
        for endpoint in [&edge.from, &edge.to] {
            if !kind_of.contains_key(endpoint.as_str()) {
                violations.push(GraphViolation::UnknownEndpoint(endpoint.clone()));
                endpoints_ok = false;
            }
        }
        if kind_of.get(edge.from.as_str()) == Some(&NodeKind::End) {
            violations.push(GraphViolation::EdgeFromEnd(edge.from.clone()));
        }
        if kind_of.get(edge.to.as_str()) == Some(&NodeKind::Start) {
            violations.push(GraphViolation::EdgeIntoStart(edge.to.clone()));
        }
    }

    if start_count == 1 && endpoints_ok {
        let reachable = reachable_from_start(submission);
        for node in &submission.nodes {
            if !reachable.contains(node.temp_id.as_str()) {
                violations.push(GraphViolation::Unreachable(node.temp_id.clone()));
                // Surfaced separately so callers can distinguish "the
                // terminal is cut off" from an orphaned side branch.
                if node.kind == NodeKind::End {
                    violations.push(GraphViolation::EndUnreachable);
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Breadth-first traversal of the submission from its start node.
fn reachable_from_start(submission: &GraphSubmission) -> HashSet<&str> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &submission.edges {
        adjacency
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    if let Some(start) = submission.nodes.iter().find(|n| n.kind == NodeKind::Start) {
        queue.push_back(start.temp_id.as_str());
    }

    while let Some(current) = queue.pop_front() {
        if visited.insert(current) {
            if let Some(targets) = adjacency.get(current) {
                for target in targets {
                    if !visited.contains(target) {
                        queue.push_back(target);
                    }
                }
            }
        }
    }

    visited
}
