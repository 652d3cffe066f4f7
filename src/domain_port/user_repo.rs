use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;

pub enum UserInsert {
    Inserted,
    UidTaken,
    CodeTaken,
}

/// The `users` collection.
///
/// Friend-set updates have set semantics: adding a present uid or removing an
/// absent one is a no-op.
#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user: &UserRecord,
    ) -> anyhow::Result<UserInsert>;

    async fn find_by_uid(&self, uid: &UserId) -> anyhow::Result<Option<UserRecord>>;

    /// Locks the row until the transaction ends.
    async fn find_by_uid_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
    ) -> anyhow::Result<Option<UserRecord>>;

    async fn find_by_invitation_code_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        code: &InvitationCode,
    ) -> anyhow::Result<Option<UserRecord>>;

    /// Unknown uids are skipped.
    async fn list_by_uids(&self, uids: &[UserId]) -> anyhow::Result<Vec<UserRecord>>;

    async fn add_friend_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
        friend: &UserId,
    ) -> anyhow::Result<()>;

    async fn remove_friend_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
        friend: &UserId,
    ) -> anyhow::Result<()>;

    async fn get_invitation_code(&self, uid: &UserId) -> anyhow::Result<Option<InvitationCode>>;
}
