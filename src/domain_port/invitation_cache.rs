use crate::domain_model::{InvitationCode, UserId};

/// Fixed key name invitation codes are cached under.
pub const INVITATION_CODE_CACHE_KEY: &str = "invitationCode";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache error: {0}")]
    Store(String),
}

/// Invitation codes never change once issued, so entries carry no TTL.
#[async_trait::async_trait]
pub trait InvitationCodeCache: Send + Sync {
    async fn get(&self, uid: &UserId) -> Result<Option<InvitationCode>, CacheError>;
    async fn put(&self, uid: &UserId, code: &InvitationCode) -> Result<(), CacheError>;
}
