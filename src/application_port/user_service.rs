use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("user already exists")]
    UserExists,
    #[error("no free invitation code after {0} attempt(s)")]
    InvitationCodeExhausted(u32),
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Creates the user record for a freshly authenticated uid and issues its
    /// invitation code.
    async fn register(&self, uid: UserId, display_name: &str) -> Result<UserRecord, UserError>;

    /// `None` when the uid has no user record.
    async fn load_session(&self, uid: &UserId) -> Result<Option<Session>, UserError>;
}
