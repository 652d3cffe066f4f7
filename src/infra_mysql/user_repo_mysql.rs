use super::util::{is_dup_key, is_dup_key_on, mysql_tx};
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlConnection, MySqlPool, QueryBuilder, Row};
use std::collections::{BTreeSet, HashMap};

const USER_COLUMNS: &str = "uid, display_name, invitation_code, score";

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_user(r: &MySqlRow) -> anyhow::Result<UserRecord> {
        Ok(UserRecord {
            uid: r.try_get::<UserId, _>("uid")?,
            display_name: r.try_get::<String, _>("display_name")?,
            friends: BTreeSet::new(),
            invitation_code: r.try_get::<InvitationCode, _>("invitation_code")?,
            score: r.try_get::<i64, _>("score")?,
        })
    }

    /// Fills `friends` for every user from `user_friend`.
    async fn attach_friends(
        conn: &mut MySqlConnection,
        users: &mut [UserRecord],
    ) -> anyhow::Result<()> {
        if users.is_empty() {
            return Ok(());
        }

        let mut qb = QueryBuilder::<MySql>::new("SELECT uid, friend_uid FROM user_friend WHERE uid IN (");
        let mut separated = qb.separated(", ");
        for user in users.iter() {
            separated.push_bind(user.uid.clone());
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(&mut *conn).await?;
        let mut by_uid: HashMap<UserId, BTreeSet<UserId>> = HashMap::new();
        for r in rows {
            let uid = r.try_get::<UserId, _>("uid")?;
            let friend = r.try_get::<UserId, _>("friend_uid")?;
            by_uid.entry(uid).or_default().insert(friend);
        }

        for user in users.iter_mut() {
            user.friends = by_uid.remove(&user.uid).unwrap_or_default();
        }
        Ok(())
    }

    async fn find_one(
        conn: &mut MySqlConnection,
        sql: &str,
        key: &str,
    ) -> anyhow::Result<Option<UserRecord>> {
        let row = sqlx::query(sql).bind(key).fetch_optional(&mut *conn).await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut users = [Self::row_to_user(&row)?];
        Self::attach_friends(conn, &mut users).await?;
        let [user] = users;
        Ok(Some(user))
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user: &UserRecord,
    ) -> anyhow::Result<UserInsert> {
        let tx = mysql_tx(tx)?;

        let res = sqlx::query(
            r#"
INSERT INTO user (uid, display_name, invitation_code, score)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(&user.uid)
        .bind(&user.display_name)
        .bind(&user.invitation_code)
        .bind(user.score)
        .execute(tx.conn())
        .await;

        match res {
            Ok(_) => {}
            Err(e) if is_dup_key_on(&e, "uq_user_invitation_code") => {
                return Ok(UserInsert::CodeTaken);
            }
            Err(e) if is_dup_key(&e) => return Ok(UserInsert::UidTaken),
            Err(e) => return Err(e.into()),
        }

        for friend in &user.friends {
            self.add_friend_in_tx(&mut *tx, &user.uid, friend).await?;
        }

        Ok(UserInsert::Inserted)
    }

    async fn find_by_uid(&self, uid: &UserId) -> anyhow::Result<Option<UserRecord>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_one(
            &mut conn,
            &format!("SELECT {USER_COLUMNS} FROM user WHERE uid = ?"),
            &uid.0,
        )
        .await
    }

    async fn find_by_uid_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
    ) -> anyhow::Result<Option<UserRecord>> {
        let tx = mysql_tx(tx)?;
        Self::find_one(
            tx.conn(),
            &format!("SELECT {USER_COLUMNS} FROM user WHERE uid = ? FOR UPDATE"),
            &uid.0,
        )
        .await
    }

    async fn find_by_invitation_code_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        code: &InvitationCode,
    ) -> anyhow::Result<Option<UserRecord>> {
        let tx = mysql_tx(tx)?;
        Self::find_one(
            tx.conn(),
            &format!("SELECT {USER_COLUMNS} FROM user WHERE invitation_code = ?"),
            code.as_str(),
        )
        .await
    }

    async fn list_by_uids(&self, uids: &[UserId]) -> anyhow::Result<Vec<UserRecord>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.acquire().await?;

        let mut qb = QueryBuilder::<MySql>::new(format!("SELECT {USER_COLUMNS} FROM user WHERE uid IN ("));
        let mut separated = qb.separated(", ");
        for uid in uids {
            separated.push_bind(uid.clone());
        }
        separated.push_unseparated(") ORDER BY created_at ASC");

        let rows = qb.build().fetch_all(&mut *conn).await?;
        let mut users = rows
            .iter()
            .map(Self::row_to_user)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::attach_friends(&mut conn, &mut users).await?;

        Ok(users)
    }

    async fn add_friend_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
        friend: &UserId,
    ) -> anyhow::Result<()> {
        let tx = mysql_tx(tx)?;

        sqlx::query(
            r#"
INSERT INTO user_friend (uid, friend_uid)
VALUES (?, ?)
ON DUPLICATE KEY UPDATE uid = uid
"#,
        )
        .bind(uid)
        .bind(friend)
        .execute(tx.conn())
        .await?;

        Ok(())
    }

    async fn remove_friend_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        uid: &UserId,
        friend: &UserId,
    ) -> anyhow::Result<()> {
        let tx = mysql_tx(tx)?;

        sqlx::query("DELETE FROM user_friend WHERE uid = ? AND friend_uid = ?")
            .bind(uid)
            .bind(friend)
            .execute(tx.conn())
            .await?;

        Ok(())
    }

    async fn get_invitation_code(&self, uid: &UserId) -> anyhow::Result<Option<InvitationCode>> {
        let code = sqlx::query_scalar::<_, InvitationCode>(
            "SELECT invitation_code FROM user WHERE uid = ?",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }
}
