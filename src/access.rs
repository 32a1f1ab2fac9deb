//! Organization membership lookups.
//!
//! Identity is resolved by a hosted provider outside this crate. The engine
//! only needs to know whether a caller belongs to the organization that owns
//! a sprint, and with which role.

use crate::error::{BoardError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};
use tokio::sync::RwLock;

/// Organization identifier issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User identifier issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a member within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "org:admin")]
    Admin,
    #[serde(rename = "org:member")]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "org:admin",
            Self::Member => "org:member",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for Role {
    type Err = BoardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "org:admin" | "admin" => Ok(Self::Admin),
            "org:member" | "member" => Ok(Self::Member),
            _ => Err(BoardError::Other(format!("Unknown organization role '{}'", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization check consumed by the board engine
#[async_trait]
pub trait Membership: Send + Sync {
    /// Returns the caller's role, or `None` when they are not a member
    async fn role(&self, org: &OrgId, user: &UserId) -> Result<Option<Role>>;

    /// Checks whether the caller belongs to the organization
    async fn is_member(&self, org: &OrgId, user: &UserId) -> Result<bool> {
        Ok(self.role(org, user).await?.is_some())
    }
}

/// Fails with `NotAMember` unless the caller belongs to the organization
pub async fn require_member(
    membership: &dyn Membership,
    org: &OrgId,
    user: &UserId,
) -> Result<Role> {
    membership
        .role(org, user)
        .await?
        .ok_or_else(|| BoardError::NotAMember {
            org: org.to_string(),
            user: user.to_string(),
        })
}

/// In-process membership directory.
///
/// Useful for embedding the engine where membership is already known, and
/// for tests.
#[derive(Debug, Default)]
pub struct StaticMembership {
    members: RwLock<HashMap<(OrgId, UserId), Role>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, org: OrgId, user: UserId, role: Role) {
        self.members.write().await.insert((org, user), role);
    }

    pub async fn revoke(&self, org: &OrgId, user: &UserId) -> bool {
        self.members
            .write()
            .await
            .remove(&(org.clone(), user.clone()))
            .is_some()
    }
}

#[async_trait]
impl Membership for StaticMembership {
    async fn role(&self, org: &OrgId, user: &UserId) -> Result<Option<Role>> {
        Ok(self
            .members
            .read()
            .await
            .get(&(org.clone(), user.clone()))
            .copied())
    }
}
