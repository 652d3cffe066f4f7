use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum FriendshipError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("user not found")]
    NotFound,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("friendship already established")]
    AlreadyFriends,
    #[error("friend request already pending")]
    DuplicateRequest,
    #[error("store error: {0}")]
    Store(String),
}

/// Friend-graph workflow.
///
/// Write operations fail hard; read operations log and degrade to an empty
/// result instead of failing.
#[async_trait::async_trait]
pub trait FriendshipService: Send + Sync {
    async fn send_friend_request(
        &self,
        session: Option<&Session>,
        invitation_code: Option<&str>,
    ) -> Result<FriendRequestId, FriendshipError>;

    async fn get_friend_requests(&self, session: Option<&Session>) -> Vec<FriendRequest>;

    async fn accept_friend_request(
        &self,
        session: Option<&Session>,
        from: &UserId,
    ) -> Result<RequestResolution, FriendshipError>;

    async fn decline_friend_request(
        &self,
        session: Option<&Session>,
        from: &UserId,
    ) -> Result<RequestResolution, FriendshipError>;

    async fn unfriend(
        &self,
        session: Option<&Session>,
        friend: &UserId,
    ) -> Result<UnfriendOutcome, FriendshipError>;

    async fn get_all_friends(&self, session: Option<&Session>) -> Vec<UserRecord>;

    async fn get_invitation_code(&self, session: Option<&Session>) -> Option<InvitationCode>;
}
