use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct EventId(pub uuid::Uuid);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "friend_request.new")]
    FriendRequestNew,
    #[serde(rename = "friendship.new")]
    FriendshipNew,
    #[serde(rename = "friendship.removed")]
    FriendshipRemoved,
    #[serde(rename = "group.new")]
    GroupNew,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::FriendRequestNew => "friend_request.new",
            EventType::FriendshipNew => "friendship.new",
            EventType::FriendshipRemoved => "friendship.removed",
            EventType::GroupNew => "group.new",
        };
        f.write_str(s)
    }
}

impl FromStr for EventType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "friend_request.new" => Ok(Self::FriendRequestNew),
            "friendship.new" => Ok(Self::FriendshipNew),
            "friendship.removed" => Ok(Self::FriendshipRemoved),
            "group.new" => Ok(Self::GroupNew),
            _ => anyhow::bail!("unknown event type: {}", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub event_id: EventId,
    pub event_type: EventType,
    pub partition_key: Option<String>,

    pub receivers_json: serde_json::Value,
    pub payload_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    pub fn new(
        partition_key: Option<String>,
        receivers: Vec<UserId>,
        payload: &S2CEvent,
    ) -> anyhow::Result<Self> {
        let event_type = match payload {
            S2CEvent::FriendRequestNew(_) => EventType::FriendRequestNew,
            S2CEvent::FriendshipNew(_) => EventType::FriendshipNew,
            S2CEvent::FriendshipRemoved(_) => EventType::FriendshipRemoved,
            S2CEvent::GroupNew(_) => EventType::GroupNew,
        };
        Ok(Self {
            event_id: EventId(uuid::Uuid::new_v4()),
            event_type,
            partition_key,
            receivers_json: serde_json::to_value(receivers)?,
            payload_json: serde_json::to_value(payload)?,
            created_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
pub trait OutboxRepo: Send + Sync {
    async fn enqueue_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        event: &OutboxEvent,
    ) -> anyhow::Result<()>;

    async fn claim_ready_batch_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        now: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<OutboxEvent>>;

    async fn mark_delivered_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        event_id: EventId,
        delivered_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn reschedule_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        event_id: EventId,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> anyhow::Result<()>;
}
