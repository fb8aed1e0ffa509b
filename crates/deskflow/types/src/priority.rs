//! Priority tiers and per-tier SLA budgets
//!
//! Each workflow carries four end-to-end time budgets, one per
//! priority tier. The tiers are strictly ordered: an urgent ticket
//! must always be faster than a high one, and so on down the chain.

use serde::{Deserialize, Serialize};

/// The priority tier assigned to a ticket, selecting its SLA budget
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All tiers, fastest first.
    pub const ALL: [Priority; 4] = [Self::Urgent, Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-tier end-to-end SLA budgets for a workflow, in whole seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaTargets {
    pub urgent_secs: u64,
    pub high_secs: u64,
    pub medium_secs: u64,
    pub low_secs: u64,
}

impl SlaTargets {
    pub fn new(urgent_secs: u64, high_secs: u64, medium_secs: u64, low_secs: u64) -> Self {
        Self {
            urgent_secs,
            high_secs,
            medium_secs,
            low_secs,
        }
    }

    /// The total budget for one tier.
    pub fn for_priority(&self, priority: Priority) -> u64 {
        match priority {
            Priority::Urgent => self.urgent_secs,
            Priority::High => self.high_secs,
            Priority::Medium => self.medium_secs,
            Priority::Low => self.low_secs,
        }
    }

    /// Check the strict tier ordering `urgent < high < medium < low`.
    ///
    /// Every breached adjacent pair is reported, so an operator can fix
    /// all of them in one pass.
    pub fn validate(&self) -> Result<(), Vec<OrderingViolation>> {
        let chain = [
            (Priority::Urgent, self.urgent_secs, Priority::High, self.high_secs),
            (Priority::High, self.high_secs, Priority::Medium, self.medium_secs),
            (Priority::Medium, self.medium_secs, Priority::Low, self.low_secs),
        ];

        let mut violations = Vec::new();
        for (faster, faster_secs, slower, slower_secs) in chain {
            if faster_secs >= slower_secs {
                violations.push(OrderingViolation {
                    faster,
                    faster_secs,
                    slower,
                    slower_secs,
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// A breached adjacent pair in the SLA tier ordering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{faster} SLA ({faster_secs}s) must be strictly below {slower} SLA ({slower_secs}s)")]
pub struct OrderingViolation {
    pub faster: Priority,
    pub faster_secs: u64,
    pub slower: Priority,
    pub slower_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_lookup() {
        let sla = SlaTargets::new(3600, 7200, 14400, 28800);
        assert_eq!(sla.for_priority(Priority::Urgent), 3600);
        assert_eq!(sla.for_priority(Priority::Low), 28800);
    }

    #[test]
    fn test_valid_ordering() {
        let sla = SlaTargets::new(1, 2, 3, 4);
        assert!(sla.validate().is_ok());
    }

    #[test]
    fn test_equal_tiers_rejected() {
        let sla = SlaTargets::new(3600, 3600, 14400, 28800);
        let violations = sla.validate().unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].faster, Priority::Urgent);
        assert_eq!(violations[0].slower, Priority::High);
    }

    #[test]
    fn test_all_violations_reported() {
        // Fully inverted ordering breaks all three adjacent pairs.
        let sla = SlaTargets::new(28800, 14400, 7200, 3600);
        let violations = sla.validate().unwrap_err();
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_priority_serde_lowercase() {
        let json = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        let back: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(back, Priority::Low);
    }
}
