//! SLA weight distribution
//!
//! Converts a priority tier's total budget into per-step allocations:
//! `step_secs = tier_total * step_weight / Σ weights`. When the weight
//! sum is zero every step gets an equal share. Allocations are derived
//! on demand — retuning a weight or a tier total needs no recompute
//! pass over stored figures.

use deskflow_types::StepId;
use serde::{Deserialize, Serialize};

/// One step's share of a tier's SLA budget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAllocation {
    pub step_id: StepId,
    pub secs: u64,
}

/// Apportion `total_secs` across `steps` proportionally to weight.
///
/// Weights that are negative or non-finite are treated as zero. The
/// final step absorbs the integer rounding remainder, so allocations
/// sum to exactly `total_secs` for any total within f64's exact
/// integer range (every realistic SLA budget). A zero-weight step
/// alongside positive weights receives zero seconds; there is no
/// minimum floor.
pub fn distribute(total_secs: u64, steps: &[(StepId, f64)]) -> Vec<StepAllocation> {
    if steps.is_empty() {
        return Vec::new();
    }

    let weight_sum: f64 = steps.iter().map(|(_, w)| sanitize(*w)).sum();
    let count = steps.len() as u64;

    let mut allocations = Vec::with_capacity(steps.len());
    let mut allocated = 0u64;
    for (index, (step_id, weight)) in steps.iter().enumerate() {
        let secs = if index + 1 == steps.len() {
            // Saturating: with totals near u64::MAX the f64 floors of
            // earlier steps can land a few seconds past the total.
            total_secs.saturating_sub(allocated)
        } else if weight_sum == 0.0 {
            total_secs / count
        } else {
            (total_secs as f64 * sanitize(*weight) / weight_sum) as u64
        };
        allocated += secs;
        allocations.push(StepAllocation {
            step_id: step_id.clone(),
            secs,
        });
    }

    allocations
}

/// The allocation for a single step, or None if it is not in the list.
pub fn allocation_for(total_secs: u64, steps: &[(StepId, f64)], step_id: &StepId) -> Option<u64> {
    distribute(total_secs, steps)
        .into_iter()
        .find(|a| &a.step_id == step_id)
        .map(|a| a.secs)
}

fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}
