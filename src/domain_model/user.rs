use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque uid issued by the authentication provider.
#[derive(
    Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_owned())
    }
}

#[derive(
    Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct InvitationCode(pub String);

impl InvitationCode {
    /// Trims surrounding whitespace; blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(InvitationCode(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvitationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: UserId,
    pub display_name: String,
    pub friends: BTreeSet<UserId>,
    pub invitation_code: InvitationCode,
    pub score: i64,
}

impl UserRecord {
    pub fn is_friend_of(&self, other: &UserId) -> bool {
        self.friends.contains(other)
    }
}

/// Unordered pair of users; `min`/`max` give a stable lock order.
pub struct UserPair(UserId, UserId);

impl UserPair {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a < b { Self(a, b) } else { Self(b, a) }
    }

    pub fn min(&self) -> &UserId {
        &self.0
    }

    pub fn max(&self) -> &UserId {
        &self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitation_code_rejects_blank_input() {
        assert_eq!(InvitationCode::parse("   "), None);
        assert_eq!(
            InvitationCode::parse(" XJ42K\n"),
            Some(InvitationCode("XJ42K".to_owned()))
        );
    }

    #[test]
    fn user_pair_orders_members() {
        let pair = UserPair::new(UserId::from("zed"), UserId::from("amy"));
        assert_eq!(pair.min(), &UserId::from("amy"));
        assert_eq!(pair.max(), &UserId::from("zed"));
    }
}
