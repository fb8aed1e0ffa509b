//! Role directory contract
//!
//! The identity platform owns role membership; the engine only reads
//! it. Calls are bounded by the configured collaborator timeout at the
//! engine, so implementations may block on the network freely.

use async_trait::async_trait;
use deskflow_types::{RoleId, UserId};
use std::collections::HashMap;
use std::sync::RwLock;

/// Read-side contract onto the external identity platform.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Members of `role` currently eligible for assignment. An unknown
    /// role resolves to an empty membership, not an error.
    async fn active_members(&self, role: &RoleId) -> anyhow::Result<Vec<UserId>>;
}

/// Fixed in-process directory.
///
/// Membership can be edited between calls, which is how tests exercise
/// rotation behavior under churn.
#[derive(Default)]
pub struct StaticDirectory {
    roles: RwLock<HashMap<RoleId, Vec<UserId>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(self, role: RoleId, members: Vec<UserId>) -> Self {
        self.set_members(role, members);
        self
    }

    pub fn set_members(&self, role: RoleId, members: Vec<UserId>) {
        if let Ok(mut guard) = self.roles.write() {
            guard.insert(role, members);
        }
    }
}

#[async_trait]
impl RoleDirectory for StaticDirectory {
    async fn active_members(&self, role: &RoleId) -> anyhow::Result<Vec<UserId>> {
        let guard = self
            .roles
            .read()
            .map_err(|_| anyhow::anyhow!("directory lock poisoned"))?;
        Ok(guard.get(role).cloned().unwrap_or_default())
    }
}
