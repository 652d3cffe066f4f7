use crate::domain_model::*;
use crate::domain_port::{OutboxEvent, StorageTx, TxManager};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

/// An undelivered outbox event. Delivered rows are removed.
#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub event: OutboxEvent,
    pub attempt_count: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// Whole-store contents. Vectors keep insertion order, like the document
/// store's default query order.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub users: Vec<UserRecord>,
    pub friend_requests: Vec<FriendRequest>,
    pub groups: Vec<FriendGroup>,
    pub outbox: Vec<OutboxRow>,
}

impl MemoryState {
    pub fn user(&self, uid: &UserId) -> Option<&UserRecord> {
        self.users.iter().find(|u| &u.uid == uid)
    }

    pub fn user_mut(&mut self, uid: &UserId) -> Option<&mut UserRecord> {
        self.users.iter_mut().find(|u| &u.uid == uid)
    }

    pub fn pending_request(&self, from: &UserId, to: &UserId) -> Option<&FriendRequest> {
        self.friend_requests.iter().find(|r| {
            &r.from == from && &r.to == to && r.status == FriendRequestStatus::Pending
        })
    }
}

/// In-process store shared by the memory repos.
///
/// A transaction holds the store-wide lock, so transactions are serialized.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().await
    }

    /// Copy of the current contents; waits for running transactions.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

pub struct MemoryTxManager {
    store: MemoryStore,
}

impl MemoryTxManager {
    pub fn new(store: MemoryStore) -> Self {
        MemoryTxManager { store }
    }
}

#[async_trait::async_trait]
impl TxManager for MemoryTxManager {
    async fn begin(&self) -> anyhow::Result<Box<dyn StorageTx>> {
        let guard = self.store.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTx::new(guard)))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    backup: Option<MemoryState>,
}

impl MemoryTx {
    fn new(guard: OwnedMutexGuard<MemoryState>) -> Self {
        let backup = Some(guard.clone());
        MemoryTx { guard, backup }
    }

    pub fn state(&mut self) -> &mut MemoryState {
        &mut self.guard
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(backup) = self.backup.take() {
            *self.guard = backup;
        }
    }
}

#[async_trait::async_trait]
impl StorageTx for MemoryTx {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let mut tx = self;
        tx.backup = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        // restored by Drop
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
