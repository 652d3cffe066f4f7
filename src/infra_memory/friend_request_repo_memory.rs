use super::repo_tx_memory::{MemoryStore, MemoryTx};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;

pub struct MemoryFriendRequestRepo {
    store: MemoryStore,
}

impl MemoryFriendRequestRepo {
    pub fn new(store: MemoryStore) -> Self {
        MemoryFriendRequestRepo { store }
    }
}

#[async_trait::async_trait]
impl FriendRequestRepo for MemoryFriendRequestRepo {
    async fn insert_pending_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        from: &UserId,
        to: &UserId,
    ) -> anyhow::Result<PendingInsert> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        if state.pending_request(from, to).is_some() {
            return Ok(PendingInsert::Duplicate);
        }

        let id = FriendRequestId::new();
        state.friend_requests.push(FriendRequest {
            id,
            from: from.clone(),
            to: to.clone(),
            status: FriendRequestStatus::Pending,
            created_at: Utc::now(),
        });
        Ok(PendingInsert::Inserted(id))
    }

    async fn find_pending_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        from: &UserId,
        to: &UserId,
    ) -> anyhow::Result<Option<FriendRequest>> {
        Ok(downcast_tx::<MemoryTx>(tx)?
            .state()
            .pending_request(from, to)
            .cloned())
    }

    async fn list_pending_to(&self, to: &UserId) -> anyhow::Result<Vec<FriendRequest>> {
        let state = self.store.lock().await;
        Ok(state
            .friend_requests
            .iter()
            .filter(|r| &r.to == to && r.status == FriendRequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn transition_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        id: FriendRequestId,
        next: FriendRequestStatus,
    ) -> anyhow::Result<bool> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        match state.friend_requests.iter_mut().find(|r| r.id == id) {
            Some(request) if request.status.can_transition_to(next) => {
                request.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
