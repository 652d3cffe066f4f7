use crate::domain_model::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct S2CEnvelope {
    pub receivers: Vec<UserId>,
    pub body: S2CEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum S2CEvent {
    FriendRequestNew(FriendRequestNew),
    FriendshipNew(FriendshipNew),
    /// Receivers drop friend-derived state (friend markers, cached friend lists).
    FriendshipRemoved(FriendshipRemoved),
    GroupNew(GroupNew),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequestNew {
    pub request_id: FriendRequestId,
    pub from: UserId,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendshipNew {
    pub users: [UserId; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendshipRemoved {
    pub removed_by: UserId,
    pub users: [UserId; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNew {
    pub group_id: GroupId,
    pub group_name: String,
    pub owner: UserId,
}
