use super::util::mysql_tx;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use std::collections::{BTreeSet, HashMap};

pub struct MySqlGroupRepo {
    pool: MySqlPool,
}

impl MySqlGroupRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlGroupRepo { pool }
    }

    fn row_to_group(r: &MySqlRow) -> anyhow::Result<FriendGroup> {
        Ok(FriendGroup {
            id: r.try_get::<GroupId, _>("group_id")?,
            name: r.try_get::<String, _>("name")?,
            owner: r.try_get::<UserId, _>("owner_uid")?,
            members: BTreeSet::new(),
            created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait::async_trait]
impl GroupRepo for MySqlGroupRepo {
    async fn insert_group_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        group: &FriendGroup,
    ) -> anyhow::Result<()> {
        let tx = mysql_tx(tx)?;

        sqlx::query(
            r#"
INSERT INTO friend_group (group_id, name, owner_uid, created_at)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.owner)
        .bind(group.created_at)
        .execute(tx.conn())
        .await?;

        if group.members.is_empty() {
            return Ok(());
        }

        let mut qb = QueryBuilder::<MySql>::new("INSERT INTO friend_group_member (group_id, member_uid) ");
        qb.push_values(&group.members, |mut b, member| {
            b.push_bind(group.id).push_bind(member.clone());
        });
        qb.build().execute(tx.conn()).await?;

        Ok(())
    }

    async fn list_groups_for(&self, uid: &UserId) -> anyhow::Result<Vec<FriendGroup>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query(
            r#"
SELECT g.group_id, g.name, g.owner_uid, g.created_at
FROM friend_group g
WHERE g.owner_uid = ?
   OR EXISTS (
       SELECT 1 FROM friend_group_member m
       WHERE m.group_id = g.group_id AND m.member_uid = ?
   )
ORDER BY g.created_at ASC, g.group_id ASC
"#,
        )
        .bind(uid)
        .bind(uid)
        .fetch_all(&mut *conn)
        .await?;

        let mut groups = rows
            .iter()
            .map(Self::row_to_group)
            .collect::<anyhow::Result<Vec<_>>>()?;
        if groups.is_empty() {
            return Ok(groups);
        }

        let mut qb = QueryBuilder::<MySql>::new("SELECT group_id, member_uid FROM friend_group_member WHERE group_id IN (");
        let mut separated = qb.separated(", ");
        for group in &groups {
            separated.push_bind(group.id);
        }
        separated.push_unseparated(")");

        let mut members: HashMap<GroupId, BTreeSet<UserId>> = HashMap::new();
        for row in qb.build().fetch_all(&mut *conn).await? {
            members
                .entry(row.try_get::<GroupId, _>("group_id")?)
                .or_default()
                .insert(row.try_get::<UserId, _>("member_uid")?);
        }
        for group in &mut groups {
            group.members = members.remove(&group.id).unwrap_or_default();
        }

        Ok(groups)
    }
}
