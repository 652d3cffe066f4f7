use crate::application_port::{GroupError, GroupService};
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const MAX_GROUP_NAME_CHARS: usize = 64;

fn store_error(e: anyhow::Error) -> GroupError {
    GroupError::Store(format!("{e:#}"))
}

pub struct RealGroupService {
    user_repo: Arc<dyn UserRepo>,
    group_repo: Arc<dyn GroupRepo>,
    outbox_repo: Arc<dyn OutboxRepo>,
    tx_manager: Arc<dyn TxManager>,
}

impl RealGroupService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        group_repo: Arc<dyn GroupRepo>,
        outbox_repo: Arc<dyn OutboxRepo>,
        tx_manager: Arc<dyn TxManager>,
    ) -> Self {
        Self {
            user_repo,
            group_repo,
            outbox_repo,
            tx_manager,
        }
    }
}

#[async_trait::async_trait]
impl GroupService for RealGroupService {
    async fn create_group(
        &self,
        session: Option<&Session>,
        name: &str,
        member_uids: &[UserId],
    ) -> Result<GroupId, GroupError> {
        let session = session.ok_or(GroupError::Unauthenticated)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(GroupError::InvalidInput("group name is empty".to_owned()));
        }
        if name.chars().count() > MAX_GROUP_NAME_CHARS {
            return Err(GroupError::InvalidInput(format!(
                "group name exceeds {MAX_GROUP_NAME_CHARS} characters"
            )));
        }

        let members: BTreeSet<UserId> = member_uids.iter().cloned().collect();
        if members.is_empty() {
            return Err(GroupError::InvalidInput("no members selected".to_owned()));
        }
        if members.contains(&session.uid) {
            return Err(GroupError::InvalidInput(
                "the owner cannot be listed as a member".to_owned(),
            ));
        }

        let mut tx = self.tx_manager.begin().await.map_err(store_error)?;

        // unfriend locks this row too, so the friend set cannot shrink under us
        let owner = self
            .user_repo
            .find_by_uid_in_tx(&mut *tx, &session.uid)
            .await
            .map_err(store_error)?
            .ok_or(GroupError::Unauthenticated)?;

        if let Some(stranger) = members.iter().find(|uid| !owner.is_friend_of(uid)) {
            return Err(GroupError::NotFriends(stranger.clone()));
        }

        let group = FriendGroup {
            id: GroupId::new(),
            name: name.to_owned(),
            owner: owner.uid.clone(),
            members,
            created_at: Utc::now(),
        };
        self.group_repo
            .insert_group_in_tx(&mut *tx, &group)
            .await
            .map_err(store_error)?;

        let receivers: Vec<UserId> = std::iter::once(group.owner.clone())
            .chain(group.members.iter().cloned())
            .collect();
        let event = OutboxEvent::new(
            Some(group.id.to_string()),
            receivers,
            &S2CEvent::GroupNew(GroupNew {
                group_id: group.id,
                group_name: group.name.clone(),
                owner: group.owner.clone(),
            }),
        )
        .map_err(|e| GroupError::Store(format!("compose group.new event: {e}")))?;
        self.outbox_repo
            .enqueue_in_tx(&mut *tx, &event)
            .await
            .map_err(|e| GroupError::Store(format!("enqueue group.new event: {e}")))?;

        tx.commit().await.map_err(store_error)?;
        info!(group_id = %group.id, owner = %group.owner, members = group.members.len(), "group created");

        Ok(group.id)
    }

    async fn list_groups(&self, session: Option<&Session>) -> Vec<FriendGroup> {
        let Some(session) = session else {
            warn!("listing groups without a session");
            return Vec::new();
        };

        match self.group_repo.list_groups_for(&session.uid).await {
            Ok(groups) => groups,
            Err(e) => {
                error!(uid = %session.uid, "fetching groups: {e:#}");
                Vec::new()
            }
        }
    }
}
