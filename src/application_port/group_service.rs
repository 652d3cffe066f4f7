use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not authenticated")]
    Unauthenticated,
    #[error("{0} is not a friend")]
    NotFriends(UserId),
    #[error("store error: {0}")]
    Store(String),
}

/// Friend groups: named subsets of the caller's friends.
#[async_trait::async_trait]
pub trait GroupService: Send + Sync {
    /// Every member must be a current friend of the caller.
    async fn create_group(
        &self,
        session: Option<&Session>,
        name: &str,
        member_uids: &[UserId],
    ) -> Result<GroupId, GroupError>;

    async fn list_groups(&self, session: Option<&Session>) -> Vec<FriendGroup>;
}
