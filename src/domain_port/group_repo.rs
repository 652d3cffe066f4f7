use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;

/// The `groups` collection.
#[async_trait::async_trait]
pub trait GroupRepo: Send + Sync {
    async fn insert_group_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        group: &FriendGroup,
    ) -> anyhow::Result<()>;

    /// Groups `uid` owns or belongs to, oldest first.
    async fn list_groups_for(&self, uid: &UserId) -> anyhow::Result<Vec<FriendGroup>>;
}
