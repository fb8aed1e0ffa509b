//! Domain types for Deskflow
//!
//! Deskflow models a helpdesk process as a directed graph of steps.
//! An administrator defines the graph once; tickets are then driven
//! through it step by step, with work items assigned to role members
//! and SLA budgets apportioned across steps by weight.
//!
//! # Key Concepts
//!
//! - **Workflow**: the owning record for one business process — name,
//!   classification, lifecycle status, and the four per-priority SLA
//!   budgets.
//! - **Step / Transition**: the nodes and labeled edges of the process
//!   graph. A workflow has exactly one start and one end step.
//! - **Ticket**: a live instantiation of a workflow, holding the
//!   current-step pointer and the deadline derived for that step.
//! - **TaskItem**: the assignable unit — one (ticket, step, assignee)
//!   binding with its own lifecycle status and origin.
//! - **Priority / SlaTargets**: the four priority-linked total-time
//!   budgets, strictly ordered urgent < high < medium < low.
//!
//! # Design Principles
//!
//! 1. Business-rule violations are structured results, never panics.
//! 2. Structural and ordering errors report every violation found, so
//!    an operator can fix a submission in one pass.
//! 3. Derived values (SLA status, per-step allocations) are computed
//!    on read, never stored as ground truth.

#![deny(unsafe_code)]

mod errors;
mod ids;
mod priority;
mod task;
mod ticket;
mod workflow;

pub use errors::*;
pub use ids::*;
pub use priority::*;
pub use task::*;
pub use ticket::*;
pub use workflow::*;
