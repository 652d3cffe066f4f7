use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct GroupId(pub uuid::Uuid);

impl GroupId {
    pub fn new() -> Self {
        GroupId(uuid::Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named set of the owner's friends. The owner is not listed in `members`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FriendGroup {
    pub id: GroupId,
    pub name: String,
    pub owner: UserId,
    pub members: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl FriendGroup {
    pub fn involves(&self, uid: &UserId) -> bool {
        &self.owner == uid || self.members.contains(uid)
    }
}
