//! Error taxonomy for Deskflow operations
//!
//! The taxonomy encodes the retry policy: structural, ordering, and
//! terminal-state errors require the caller to change something;
//! concurrency conflicts are safe to retry after refetching state;
//! collaborator outages are retried with backoff and never roll back
//! a committed mutation.

use crate::{OrderingViolation, RoleId, TicketId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Deskflow operations
pub type DeskflowResult<T> = Result<T, DeskflowError>;

/// Errors surfaced by Deskflow operations
#[derive(Debug, Error)]
pub enum DeskflowError {
    /// Graph submission rejected by the validator. Every violation is
    /// listed; never retried unchanged.
    #[error("graph submission rejected: {}", join_display(.0))]
    StructuralGraph(Vec<GraphViolation>),

    /// SLA tier ordering or unique-name violation. Never retried
    /// unchanged.
    #[error("SLA tier ordering violated: {}", join_display(.0))]
    OrderingConstraint(Vec<OrderingViolation>),

    /// Lost a serialization race. Safe to retry after refetching.
    #[error("concurrent modification: {0}")]
    ConcurrencyConflict(String),

    /// The role has no active members to assign.
    #[error("no eligible assignee in role '{role}'")]
    NoEligibleAssignee { role: RoleId },

    /// Action attempted on a closed ticket. Never retried.
    #[error("ticket {0} is closed; no further actions are permitted")]
    TerminalState(TicketId),

    /// Identity or notification dependency failed or timed out. The
    /// caller retries with backoff.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// The requested transition does not apply to the ticket's state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Infrastructure failure at the persistence boundary.
    #[error("storage error: {0}")]
    Storage(String),
}

impl DeskflowError {
    /// Whether the caller may retry the operation without changing it.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict(_) | Self::CollaboratorUnavailable(_)
        )
    }
}

/// One structural violation found in a graph submission
///
/// Violations reference the caller-supplied temporary node ids, since
/// durable ids do not exist until the submission is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum GraphViolation {
    #[error("expected exactly one start node, found {0}")]
    StartCount(usize),

    #[error("expected exactly one end node, found {0}")]
    EndCount(usize),

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("task node '{0}' has no role")]
    MissingRole(String),

    #[error("edge from '{0}' to itself")]
    SelfLoop(String),

    #[error("edge references unknown node '{0}'")]
    UnknownEndpoint(String),

    #[error("edge originates at end node '{0}'")]
    EdgeFromEnd(String),

    #[error("edge terminates at start node '{0}'")]
    EdgeIntoStart(String),

    #[error("node '{0}' is unreachable from start")]
    Unreachable(String),

    #[error("end node is unreachable from start")]
    EndUnreachable,
}

fn join_display<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
