//! Engine configuration

use std::time::Duration;

/// Tunables for the Deskflow engine
///
/// Every field has a sensible default; construct with `Default` and
/// override with the `with_*` setters.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Trailing window before a step deadline during which a ticket
    /// reports as at-risk rather than on-track.
    pub at_risk_window_secs: u64,
    /// Upper bound on a single call into the role directory. Elapsed
    /// calls surface as a collaborator outage, not as a hang.
    pub collaborator_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            at_risk_window_secs: 900,
            collaborator_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    pub fn with_at_risk_window_secs(mut self, secs: u64) -> Self {
        self.at_risk_window_secs = secs;
        self
    }

    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }
}
