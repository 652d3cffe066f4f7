use crate::application_port::{AuthError, TokenVerifier};
use crate::domain_model::UserId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String, // user id
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
}

fn decode_access(token: &str, cfg: &JwtConfig) -> Result<AccessClaims, AuthError> {
    let mut v = Validation::new(Algorithm::HS256);
    v.validate_exp = true;
    v.set_audience(&[cfg.audience.clone()]);
    v.set_issuer(&[cfg.issuer.clone()]);
    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(&cfg.signing_key), &v)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        })?;
    Ok(data.claims)
}

/// Verifies HS256 access tokens issued by the identity provider.
pub struct JwtHs256Verifier {
    cfg: JwtConfig,
}

impl JwtHs256Verifier {
    pub fn new(cfg: JwtConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait::async_trait]
impl TokenVerifier for JwtHs256Verifier {
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        let claims = decode_access(token, &self.cfg)?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        Ok(UserId(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn cfg() -> JwtConfig {
        JwtConfig {
            issuer: "waymark-test".to_owned(),
            audience: "waymark".to_owned(),
            signing_key: b"test-signing-key".to_vec(),
        }
    }

    fn mint(sub: &str, ttl: Duration, cfg: &JwtConfig) -> String {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: sub.to_owned(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&cfg.signing_key),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_token_yields_subject() {
        let verifier = JwtHs256Verifier::new(cfg());
        let token = mint("amy", Duration::minutes(5), &cfg());
        assert_eq!(
            verifier.verify_token(&token).await.unwrap(),
            UserId::from("amy")
        );
    }

    #[tokio::test]
    async fn expired_and_foreign_tokens_are_rejected() {
        let verifier = JwtHs256Verifier::new(cfg());

        let expired = mint("amy", Duration::minutes(-10), &cfg());
        assert!(matches!(
            verifier.verify_token(&expired).await,
            Err(AuthError::TokenExpired)
        ));

        let other = JwtConfig {
            signing_key: b"someone-else".to_vec(),
            ..cfg()
        };
        let forged = mint("amy", Duration::minutes(5), &other);
        assert!(matches!(
            verifier.verify_token(&forged).await,
            Err(AuthError::TokenInvalid)
        ));

        assert!(matches!(
            verifier.verify_token("not-a-jwt").await,
            Err(AuthError::TokenInvalid)
        ));
    }
}
