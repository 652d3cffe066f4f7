use super::repo_tx_memory::{MemoryStore, MemoryTx};
use crate::domain_model::*;
use crate::domain_port::*;

pub struct MemoryGroupRepo {
    store: MemoryStore,
}

impl MemoryGroupRepo {
    pub fn new(store: MemoryStore) -> Self {
        MemoryGroupRepo { store }
    }
}

#[async_trait::async_trait]
impl GroupRepo for MemoryGroupRepo {
    async fn insert_group_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        group: &FriendGroup,
    ) -> anyhow::Result<()> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        if state.groups.iter().any(|g| g.id == group.id) {
            anyhow::bail!("group {} already exists", group.id);
        }
        state.groups.push(group.clone());
        Ok(())
    }

    async fn list_groups_for(&self, uid: &UserId) -> anyhow::Result<Vec<FriendGroup>> {
        let state = self.store.lock().await;
        Ok(state
            .groups
            .iter()
            .filter(|g| g.involves(uid))
            .cloned()
            .collect())
    }
}
