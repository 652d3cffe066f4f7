use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryInvitationCodeCache {
    entries: RwLock<HashMap<String, InvitationCode>>,
}

impl MemoryInvitationCodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(uid: &UserId) -> String {
        format!("{}:{}", INVITATION_CODE_CACHE_KEY, uid)
    }
}

#[async_trait::async_trait]
impl InvitationCodeCache for MemoryInvitationCodeCache {
    async fn get(&self, uid: &UserId) -> Result<Option<InvitationCode>, CacheError> {
        Ok(self.entries.read().await.get(&Self::key(uid)).cloned())
    }

    async fn put(&self, uid: &UserId, code: &InvitationCode) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(Self::key(uid), code.clone());
        Ok(())
    }
}
