use async_trait::async_trait;
use serenity::model::id::UserId;
use std::collections::{HashMap, HashSet};

use crate::error::Result;

/// Resolves the permission tokens granted to a user.
#[async_trait]
pub trait PermissionResolver: Send + Sync {
    /// Unknown users resolve to an empty set.
    async fn lookup_permissions(&self, user_id: UserId) -> Result<HashSet<String>>;
}

/// A fixed permission table, mostly useful for small deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    grants: HashMap<UserId, HashSet<String>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant<I, S>(mut self, user_id: UserId, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants
            .entry(user_id)
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl PermissionResolver for StaticPermissions {
    async fn lookup_permissions(&self, user_id: UserId) -> Result<HashSet<String>> {
        Ok(self.grants.get(&user_id).cloned().unwrap_or_default())
    }
}
