//! Storage abstractions for Deskflow
//!
//! The engine talks to persistence through the traits in this crate;
//! the shipped adapter is a deterministic in-memory implementation.
//! Production deployments substitute a transactional backend behind
//! the same traits.
//!
//! The traits carry the core's consistency contract:
//!
//! - graph replacement is a single all-or-nothing swap per workflow —
//!   readers observe the prior graph until the new one commits;
//! - ticket moves and task status changes are compare-and-swap
//!   operations, so lost races surface as [`StoreError::Conflict`]
//!   instead of corrupting state;
//! - round-robin selection and cursor advance are one atomic unit,
//!   with the cursor persisted per (step, role).

#![deny(unsafe_code)]

mod error;
mod memory;
mod traits;

pub use error::*;
pub use memory::*;
pub use traits::*;
