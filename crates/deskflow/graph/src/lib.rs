//! Graph validation and SLA distribution for Deskflow
//!
//! Both components here are pure functions over in-memory input:
//!
//! - [`validate`] checks a candidate graph submission for structural
//!   soundness and returns every violation found, making it safe to
//!   call speculatively (e.g. for a UI preview) without persisting
//!   anything.
//! - [`distribute`] apportions one priority tier's total SLA budget
//!   across steps proportionally to their weights. Allocations are
//!   derived values — the persisted ground truth is the weight, and
//!   figures are recomputed whenever totals or weights change.
//!
//! Neither component touches storage or shares mutable state; both are
//! safe to invoke from any number of concurrent callers.

#![deny(unsafe_code)]

mod distributor;
mod submission;
mod validator;

pub use distributor::*;
pub use submission::*;
pub use validator::*;
