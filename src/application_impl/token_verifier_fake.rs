use crate::application_port::{AuthError, TokenVerifier};
use crate::domain_model::UserId;

pub const FAKE_ACCESS_TOKEN_PREFIX: &str = "fake-access-token:";

/// Accepts `fake-access-token:<uid>` and nothing else.
#[derive(Debug, Default)]
pub struct FakeTokenVerifier;

impl FakeTokenVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn token_for(uid: &UserId) -> String {
        format!("{FAKE_ACCESS_TOKEN_PREFIX}{uid}")
    }
}

#[async_trait::async_trait]
impl TokenVerifier for FakeTokenVerifier {
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        match token.strip_prefix(FAKE_ACCESS_TOKEN_PREFIX) {
            Some(uid) if !uid.trim().is_empty() => Ok(UserId::from(uid)),
            _ => Err(AuthError::TokenInvalid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_tokens_carry_the_uid() {
        let verifier = FakeTokenVerifier::new();
        let token = FakeTokenVerifier::token_for(&UserId::from("amy"));
        assert_eq!(
            verifier.verify_token(&token).await.unwrap(),
            UserId::from("amy")
        );
        assert!(matches!(
            verifier.verify_token("fake-access-token:").await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            verifier.verify_token("Bearer amy").await,
            Err(AuthError::TokenInvalid)
        ));
    }
}
