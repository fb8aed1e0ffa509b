//! SLA posture derivation
//!
//! Posture is a pure function of the clock, the current step deadline,
//! and the configured at-risk window. Nothing is stored; retuning SLA
//! budgets or step weights changes future derivations only.

use chrono::{DateTime, Duration, Utc};
use deskflow_types::{StepId, TicketId};
use serde::{Deserialize, Serialize};

/// Where a ticket stands against its current step deadline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    OnTrack,
    /// Inside the trailing window before the deadline.
    AtRisk,
    Breached,
}

/// Read-only SLA snapshot for one ticket
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlaReport {
    pub ticket_id: TicketId,
    pub current_step: Option<StepId>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: SlaStatus,
}

/// Derive the posture. No deadline (closed ticket, or a step with no
/// budget) reports on-track.
pub fn derive_status(
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    at_risk_window_secs: u64,
) -> SlaStatus {
    let Some(deadline) = deadline else {
        return SlaStatus::OnTrack;
    };
    if now >= deadline {
        return SlaStatus::Breached;
    }
    if now + Duration::seconds(at_risk_window_secs as i64) >= deadline {
        return SlaStatus::AtRisk;
    }
    SlaStatus::OnTrack
}
