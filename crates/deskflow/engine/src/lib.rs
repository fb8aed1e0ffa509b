//! Deskflow engine: workflow orchestration and ticket execution
//!
//! This crate ties the pure graph layer and the storage contracts into
//! the operational core of a helpdesk platform:
//!
//! - [`compile`] turns a validated graph submission into durable steps
//!   and transitions, persisted with one atomic swap.
//! - [`DeskflowEngine`] runs the ticket state machine: opening tickets
//!   on deployed workflows, firing transitions with per-ticket
//!   compare-and-swap serialization, and deriving SLA posture.
//! - The assignment engine places task items directly or by stored
//!   round-robin rotation, and the escalation sweep supersedes items
//!   that breached their deadline.
//! - External collaborators (role directory, notifications) sit behind
//!   [`RoleDirectory`] and [`Notifier`]; directory calls are bounded
//!   by a timeout, notifications are fire-and-forget.
//!
//! ## Example
//!
//! ```no_run
//! use deskflow_engine::{DeskflowEngine, EngineConfig, NullNotifier, StaticDirectory};
//! use deskflow_store::InMemoryStore;
//! use std::sync::Arc;
//!
//! let engine = DeskflowEngine::new(
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(StaticDirectory::new()),
//!     Arc::new(NullNotifier),
//!     EngineConfig::default(),
//! );
//! ```

#![deny(unsafe_code)]

mod assignment;
mod compiler;
mod config;
mod directory;
mod engine;
mod notify;
mod sla;
mod sweep;

pub use assignment::AssignmentPolicy;
pub use compiler::{compile, CompiledGraph};
pub use config::EngineConfig;
pub use directory::{RoleDirectory, StaticDirectory};
pub use engine::{DeskflowEngine, EngineStore};
pub use notify::{Event, Notifier, NullNotifier, RecordingNotifier};
pub use sla::{derive_status, SlaReport, SlaStatus};
pub use sweep::SweepReport;
