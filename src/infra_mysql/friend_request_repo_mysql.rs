use super::util::{is_dup_key, mysql_tx};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlFriendRequestRepo {
    pool: MySqlPool,
}

impl MySqlFriendRequestRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlFriendRequestRepo { pool }
    }

    fn row_to_request(r: &MySqlRow) -> anyhow::Result<FriendRequest> {
        Ok(FriendRequest {
            id: r.try_get::<FriendRequestId, _>("request_id")?,
            from: r.try_get::<UserId, _>("from_uid")?,
            to: r.try_get::<UserId, _>("to_uid")?,
            status: r.try_get::<&str, _>("status")?.parse()?,
            created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait::async_trait]
impl FriendRequestRepo for MySqlFriendRequestRepo {
    async fn insert_pending_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        from: &UserId,
        to: &UserId,
    ) -> anyhow::Result<PendingInsert> {
        let tx = mysql_tx(tx)?;
        let id = FriendRequestId::new();

        // uq_friend_request_pending_pair admits one pending row per (from, to)
        let res = sqlx::query(
            r#"
INSERT INTO friend_request (request_id, from_uid, to_uid, status)
VALUES (?, ?, ?, 'pending')
"#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(tx.conn())
        .await;

        match res {
            Ok(_) => Ok(PendingInsert::Inserted(id)),
            Err(e) if is_dup_key(&e) => Ok(PendingInsert::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_pending_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        from: &UserId,
        to: &UserId,
    ) -> anyhow::Result<Option<FriendRequest>> {
        let tx = mysql_tx(tx)?;

        let row = sqlx::query(
            r#"
SELECT request_id, from_uid, to_uid, status, created_at
FROM friend_request
WHERE from_uid = ? AND to_uid = ? AND status = 'pending'
ORDER BY created_at ASC
LIMIT 1
FOR UPDATE
"#,
        )
        .bind(from)
        .bind(to)
        .fetch_optional(tx.conn())
        .await?;

        row.as_ref().map(Self::row_to_request).transpose()
    }

    async fn list_pending_to(&self, to: &UserId) -> anyhow::Result<Vec<FriendRequest>> {
        let rows = sqlx::query(
            r#"
SELECT request_id, from_uid, to_uid, status, created_at
FROM friend_request
WHERE to_uid = ? AND status = 'pending'
ORDER BY created_at ASC
"#,
        )
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_request).collect()
    }

    async fn transition_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        id: FriendRequestId,
        next: FriendRequestStatus,
    ) -> anyhow::Result<bool> {
        if !FriendRequestStatus::Pending.can_transition_to(next) {
            return Ok(false);
        }
        let tx = mysql_tx(tx)?;

        let res = sqlx::query(
            r#"
UPDATE friend_request
SET status = ?
WHERE request_id = ? AND status = 'pending'
"#,
        )
        .bind(next.as_str())
        .bind(id)
        .execute(tx.conn())
        .await?;

        Ok(res.rows_affected() == 1)
    }
}
