use super::repo_tx_memory::{MemoryStore, MemoryTx};
use crate::domain_model::*;
use crate::domain_port::*;

pub struct MemoryUserRepo {
    store: MemoryStore,
}

impl MemoryUserRepo {
    pub fn new(store: MemoryStore) -> Self {
        MemoryUserRepo { store }
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user: &UserRecord,
    ) -> anyhow::Result<UserInsert> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();

        if state.user(&user.uid).is_some() {
            return Ok(UserInsert::UidTaken);
        }
        if state
            .users
            .iter()
            .any(|u| u.invitation_code == user.invitation_code)
        {
            return Ok(UserInsert::CodeTaken);
        }
        state.users.push(user.clone());

        Ok(UserInsert::Inserted)
    }

    async fn find_by_uid(&self, uid: &UserId) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.store.lock().await.user(uid).cloned())
    }

    async fn find_by_uid_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
    ) -> anyhow::Result<Option<UserRecord>> {
        Ok(downcast_tx::<MemoryTx>(tx)?.state().user(uid).cloned())
    }

    async fn find_by_invitation_code_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        code: &InvitationCode,
    ) -> anyhow::Result<Option<UserRecord>> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        Ok(state
            .users
            .iter()
            .find(|u| &u.invitation_code == code)
            .cloned())
    }

    async fn list_by_uids(&self, uids: &[UserId]) -> anyhow::Result<Vec<UserRecord>> {
        let state = self.store.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| uids.contains(&u.uid))
            .cloned()
            .collect())
    }

    async fn add_friend_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
        friend: &UserId,
    ) -> anyhow::Result<()> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        let user = state
            .user_mut(uid)
            .ok_or_else(|| anyhow::anyhow!("no user document for {uid}"))?;
        user.friends.insert(friend.clone());
        Ok(())
    }

    async fn remove_friend_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
        friend: &UserId,
    ) -> anyhow::Result<()> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        let user = state
            .user_mut(uid)
            .ok_or_else(|| anyhow::anyhow!("no user document for {uid}"))?;
        user.friends.remove(friend);
        Ok(())
    }

    async fn get_invitation_code(&self, uid: &UserId) -> anyhow::Result<Option<InvitationCode>> {
        Ok(self
            .store
            .lock()
            .await
            .user(uid)
            .map(|u| u.invitation_code.clone()))
    }
}
