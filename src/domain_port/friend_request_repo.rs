use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;

pub enum PendingInsert {
    Inserted(FriendRequestId),
    /// A pending request for the same ordered pair already exists.
    Duplicate,
}

/// The `friendRequests` collection.
#[async_trait::async_trait]
pub trait FriendRequestRepo: Send + Sync {
    async fn insert_pending_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        from: &UserId,
        to: &UserId,
    ) -> anyhow::Result<PendingInsert>;

    /// Locks the matching request until the transaction ends.
    async fn find_pending_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        from: &UserId,
        to: &UserId,
    ) -> anyhow::Result<Option<FriendRequest>>;

    /// Pending requests addressed to `to`, oldest first.
    async fn list_pending_to(&self, to: &UserId) -> anyhow::Result<Vec<FriendRequest>>;

    /// Moves a pending request to `next`. Returns `false` when the request is
    /// no longer pending.
    async fn transition_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        id: FriendRequestId,
        next: FriendRequestStatus,
    ) -> anyhow::Result<bool>;
}
