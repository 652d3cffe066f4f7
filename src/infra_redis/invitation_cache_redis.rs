use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisWrite, ToRedisArgs};

pub struct RedisInvitationCodeCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisInvitationCodeCache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisInvitationCodeCache {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, uid: &UserId) -> String {
        format!("{}:{}:{}", self.prefix, INVITATION_CODE_CACHE_KEY, uid)
    }
}

impl ToRedisArgs for InvitationCode {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.as_str().as_bytes())
    }
}

#[async_trait::async_trait]
impl InvitationCodeCache for RedisInvitationCodeCache {
    async fn get(&self, uid: &UserId) -> Result<Option<InvitationCode>, CacheError> {
        let key = self.key(uid);
        let mut conn = self.conn.clone();
        let val: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(val.and_then(|s| InvitationCode::parse(&s)))
    }

    async fn put(&self, uid: &UserId, code: &InvitationCode) -> Result<(), CacheError> {
        let key = self.key(uid);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(&key, code)
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(())
    }
}
