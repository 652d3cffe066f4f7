use crate::application_port::{FriendshipError, FriendshipService};
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

fn store_error(e: anyhow::Error) -> FriendshipError {
    FriendshipError::Store(format!("{e:#}"))
}

pub struct RealFriendshipService {
    user_repo: Arc<dyn UserRepo>,
    friend_request_repo: Arc<dyn FriendRequestRepo>,
    outbox_repo: Arc<dyn OutboxRepo>,
    invitation_cache: Arc<dyn InvitationCodeCache>,
    tx_manager: Arc<dyn TxManager>,
}

impl RealFriendshipService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        friend_request_repo: Arc<dyn FriendRequestRepo>,
        outbox_repo: Arc<dyn OutboxRepo>,
        invitation_cache: Arc<dyn InvitationCodeCache>,
        tx_manager: Arc<dyn TxManager>,
    ) -> Self {
        Self {
            user_repo,
            friend_request_repo,
            outbox_repo,
            invitation_cache,
            tx_manager,
        }
    }

    /// Locks both user rows, smaller uid first, and returns them as `(a, b)`.
    /// `None` if either is missing.
    ///
    /// Every workflow takes these locks before touching `friend_request`, so
    /// concurrent sends and resolutions agree on lock order.
    async fn lock_pair(
        &self,
        tx: &mut dyn StorageTx,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<(UserRecord, UserRecord)>, FriendshipError> {
        let pair = UserPair::new(a.clone(), b.clone());
        let mut locked = Vec::with_capacity(2);
        for uid in [pair.min(), pair.max()] {
            match self
                .user_repo
                .find_by_uid_in_tx(tx, uid)
                .await
                .map_err(store_error)?
            {
                Some(user) => locked.push(user),
                None => {
                    warn!(%uid, "no user document");
                    return Ok(None);
                }
            }
        }

        let (Some(second), Some(first)) = (locked.pop(), locked.pop()) else {
            return Ok(None);
        };
        if &first.uid == a {
            Ok(Some((first, second)))
        } else {
            Ok(Some((second, first)))
        }
    }

    async fn enqueue(
        &self,
        tx: &mut dyn StorageTx,
        receivers: Vec<UserId>,
        event: &S2CEvent,
    ) -> Result<(), FriendshipError> {
        let partition_key = receivers.first().map(|uid| uid.0.clone());
        let event = OutboxEvent::new(partition_key, receivers, event)
            .map_err(|e| FriendshipError::Store(format!("compose outbox event: {e}")))?;
        self.outbox_repo
            .enqueue_in_tx(tx, &event)
            .await
            .map_err(|e| FriendshipError::Store(format!("enqueue {} event: {e}", event.event_type)))
    }

    /// Shared accept/decline path. Status change, friend links and the
    /// notification commit together or not at all.
    async fn resolve(
        &self,
        session: Option<&Session>,
        from: &UserId,
        next: FriendRequestStatus,
    ) -> Result<RequestResolution, FriendshipError> {
        let Some(session) = session else {
            warn!(%from, %next, "resolving friend request without a session");
            return Ok(RequestResolution::NoSession);
        };
        let me = &session.uid;

        let mut tx = self.tx_manager.begin().await.map_err(store_error)?;

        let users_present = self.lock_pair(&mut *tx, from, me).await?.is_some();

        let Some(request) = self
            .friend_request_repo
            .find_pending_in_tx(&mut *tx, from, me)
            .await
            .map_err(store_error)?
        else {
            tx.rollback().await.map_err(store_error)?;
            warn!(%from, to = %me, "no pending friend request, treating as already resolved");
            return Ok(RequestResolution::AlreadyResolved);
        };

        let accepting = next == FriendRequestStatus::Accepted;
        if accepting && !users_present {
            tx.rollback().await.map_err(store_error)?;
            return Err(FriendshipError::NotFound);
        }

        if !self
            .friend_request_repo
            .transition_in_tx(&mut *tx, request.id, next)
            .await
            .map_err(store_error)?
        {
            tx.rollback().await.map_err(store_error)?;
            warn!(request_id = %request.id, "friend request resolved concurrently");
            return Ok(RequestResolution::AlreadyResolved);
        }

        if accepting {
            self.user_repo
                .add_friend_in_tx(&mut *tx, me, from)
                .await
                .map_err(store_error)?;
            self.user_repo
                .add_friend_in_tx(&mut *tx, from, me)
                .await
                .map_err(store_error)?;

            let event = S2CEvent::FriendshipNew(FriendshipNew {
                users: [from.clone(), me.clone()],
            });
            self.enqueue(&mut *tx, vec![from.clone(), me.clone()], &event)
                .await?;
        }

        tx.commit().await.map_err(store_error)?;
        info!(request_id = %request.id, %from, to = %me, status = %next, "friend request resolved");

        Ok(match next {
            FriendRequestStatus::Accepted => RequestResolution::Accepted(request.id),
            _ => RequestResolution::Declined(request.id),
        })
    }
}

#[async_trait::async_trait]
impl FriendshipService for RealFriendshipService {
    async fn send_friend_request(
        &self,
        session: Option<&Session>,
        invitation_code: Option<&str>,
    ) -> Result<FriendRequestId, FriendshipError> {
        let code = invitation_code
            .and_then(InvitationCode::parse)
            .ok_or_else(|| FriendshipError::InvalidInput("invitation code not provided".to_owned()))?;

        let mut tx = self.tx_manager.begin().await.map_err(store_error)?;

        let target = self
            .user_repo
            .find_by_invitation_code_in_tx(&mut *tx, &code)
            .await
            .map_err(store_error)?
            .ok_or(FriendshipError::NotFound)?;

        let session = session.ok_or(FriendshipError::Unauthenticated)?;
        if target.uid == session.uid {
            return Err(FriendshipError::InvalidInput(
                "cannot send a friend request to yourself".to_owned(),
            ));
        }

        // known friends are refused before any row lock
        if session.friends.contains(&target.uid) {
            return Err(FriendshipError::AlreadyFriends);
        }

        let Some((me, _)) = self.lock_pair(&mut *tx, &session.uid, &target.uid).await? else {
            return Err(FriendshipError::Unauthenticated);
        };

        // already-friends wins over duplicate-request
        if me.is_friend_of(&target.uid) {
            return Err(FriendshipError::AlreadyFriends);
        }

        if self
            .friend_request_repo
            .find_pending_in_tx(&mut *tx, &me.uid, &target.uid)
            .await
            .map_err(store_error)?
            .is_some()
        {
            return Err(FriendshipError::DuplicateRequest);
        }

        let request_id = match self
            .friend_request_repo
            .insert_pending_in_tx(&mut *tx, &me.uid, &target.uid)
            .await
            .map_err(store_error)?
        {
            PendingInsert::Inserted(id) => id,
            PendingInsert::Duplicate => return Err(FriendshipError::DuplicateRequest),
        };

        let event = S2CEvent::FriendRequestNew(FriendRequestNew {
            request_id,
            from: me.uid.clone(),
            display_name: me.display_name.clone(),
        });
        self.enqueue(&mut *tx, vec![target.uid.clone()], &event)
            .await?;

        tx.commit().await.map_err(store_error)?;
        info!(%request_id, from = %me.uid, to = %target.uid, "friend request sent");

        Ok(request_id)
    }

    async fn get_friend_requests(&self, session: Option<&Session>) -> Vec<FriendRequest> {
        let Some(session) = session else {
            warn!("listing friend requests without a session");
            return Vec::new();
        };

        match self.friend_request_repo.list_pending_to(&session.uid).await {
            Ok(requests) => requests,
            Err(e) => {
                error!(uid = %session.uid, "fetching friend requests: {e:#}");
                Vec::new()
            }
        }
    }

    async fn accept_friend_request(
        &self,
        session: Option<&Session>,
        from: &UserId,
    ) -> Result<RequestResolution, FriendshipError> {
        self.resolve(session, from, FriendRequestStatus::Accepted)
            .await
    }

    async fn decline_friend_request(
        &self,
        session: Option<&Session>,
        from: &UserId,
    ) -> Result<RequestResolution, FriendshipError> {
        self.resolve(session, from, FriendRequestStatus::Declined)
            .await
    }

    async fn unfriend(
        &self,
        session: Option<&Session>,
        friend: &UserId,
    ) -> Result<UnfriendOutcome, FriendshipError> {
        let Some(session) = session else {
            warn!(%friend, "unfriend without a session");
            return Ok(UnfriendOutcome::NoSession);
        };
        let me = &session.uid;

        let mut tx = self.tx_manager.begin().await.map_err(store_error)?;

        if self.lock_pair(&mut *tx, me, friend).await?.is_none() {
            tx.rollback().await.map_err(store_error)?;
            return Ok(UnfriendOutcome::UserMissing);
        }

        self.user_repo
            .remove_friend_in_tx(&mut *tx, me, friend)
            .await
            .map_err(store_error)?;
        self.user_repo
            .remove_friend_in_tx(&mut *tx, friend, me)
            .await
            .map_err(store_error)?;

        let event = S2CEvent::FriendshipRemoved(FriendshipRemoved {
            removed_by: me.clone(),
            users: [me.clone(), friend.clone()],
        });
        self.enqueue(&mut *tx, vec![me.clone(), friend.clone()], &event)
            .await?;

        tx.commit().await.map_err(store_error)?;
        info!(uid = %me, %friend, "friendship removed");

        Ok(UnfriendOutcome::Removed)
    }

    async fn get_all_friends(&self, session: Option<&Session>) -> Vec<UserRecord> {
        let Some(session) = session else {
            warn!("listing friends without a session");
            return Vec::new();
        };

        let user = match self.user_repo.find_by_uid(&session.uid).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(uid = %session.uid, "user not found");
                return Vec::new();
            }
            Err(e) => {
                error!(uid = %session.uid, "fetching user: {e:#}");
                return Vec::new();
            }
        };

        if user.friends.is_empty() {
            warn!(uid = %user.uid, "no friends found");
            return Vec::new();
        }

        let uids: Vec<UserId> = user.friends.into_iter().collect();
        match self.user_repo.list_by_uids(&uids).await {
            Ok(friends) => friends,
            Err(e) => {
                error!(uid = %session.uid, "fetching friends: {e:#}");
                Vec::new()
            }
        }
    }

    async fn get_invitation_code(&self, session: Option<&Session>) -> Option<InvitationCode> {
        let Some(session) = session else {
            warn!("reading invitation code without a session");
            return None;
        };

        // codes never change once issued
        if let Some(code) = &session.invitation_code {
            return Some(code.clone());
        }

        match self.invitation_cache.get(&session.uid).await {
            Ok(Some(code)) => return Some(code),
            Ok(None) => {}
            Err(e) => warn!(uid = %session.uid, "invitation code cache read: {e}"),
        }

        let code = match self.user_repo.get_invitation_code(&session.uid).await {
            Ok(Some(code)) => code,
            Ok(None) => {
                warn!(uid = %session.uid, "user not found");
                return None;
            }
            Err(e) => {
                error!(uid = %session.uid, "fetching invitation code: {e:#}");
                return None;
            }
        };

        if let Err(e) = self.invitation_cache.put(&session.uid, &code).await {
            warn!(uid = %session.uid, "invitation code cache write: {e}");
        }

        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::*;
    use std::collections::BTreeSet;

    struct Harness {
        store: MemoryStore,
        cache: Arc<MemoryInvitationCodeCache>,
        service: Arc<RealFriendshipService>,
    }

    impl Harness {
        fn new() -> Self {
            let store = MemoryStore::new();
            let cache = Arc::new(MemoryInvitationCodeCache::new());
            let service = Arc::new(RealFriendshipService::new(
                Arc::new(MemoryUserRepo::new(store.clone())),
                Arc::new(MemoryFriendRequestRepo::new(store.clone())),
                Arc::new(MemoryOutboxRepo::new()),
                cache.clone(),
                Arc::new(MemoryTxManager::new(store.clone())),
            ));
            Harness {
                store,
                cache,
                service,
            }
        }

        async fn seed_user(&self, uid: &str, code: &str) -> Session {
            let repo = MemoryUserRepo::new(self.store.clone());
            let mut tx = MemoryTxManager::new(self.store.clone())
                .begin()
                .await
                .unwrap();
            let user = UserRecord {
                uid: UserId::from(uid),
                display_name: uid.to_uppercase(),
                friends: BTreeSet::new(),
                invitation_code: InvitationCode(code.to_owned()),
                score: 0,
            };
            assert!(matches!(
                repo.insert_in_tx(&mut *tx, &user).await.unwrap(),
                UserInsert::Inserted
            ));
            tx.commit().await.unwrap();
            Session::from(&user)
        }

        async fn friends_of(&self, uid: &str) -> BTreeSet<UserId> {
            self.store
                .snapshot()
                .await
                .user(&UserId::from(uid))
                .map(|u| u.friends.clone())
                .unwrap_or_default()
        }

        async fn requests(&self) -> Vec<FriendRequest> {
            self.store.snapshot().await.friend_requests
        }

        async fn event_types(&self) -> Vec<EventType> {
            self.store
                .snapshot()
                .await
                .outbox
                .iter()
                .map(|r| r.event.event_type)
                .collect()
        }
    }

    fn uids(list: &[&str]) -> BTreeSet<UserId> {
        list.iter().map(|s| UserId::from(*s)).collect()
    }

    #[tokio::test]
    async fn send_creates_one_pending_request_and_rejects_a_duplicate() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        h.seed_user("b", "XJ42K").await;

        let id = h
            .service
            .send_friend_request(Some(&a), Some("XJ42K"))
            .await
            .unwrap();

        let requests = h.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, id);
        assert_eq!(requests[0].from, UserId::from("a"));
        assert_eq!(requests[0].to, UserId::from("b"));
        assert_eq!(requests[0].status, FriendRequestStatus::Pending);

        let again = h
            .service
            .send_friend_request(Some(&a), Some("XJ42K"))
            .await;
        assert!(matches!(again, Err(FriendshipError::DuplicateRequest)));
        assert_eq!(h.requests().await.len(), 1);
        assert_eq!(h.event_types().await, vec![EventType::FriendRequestNew]);
    }

    #[tokio::test]
    async fn send_validates_in_order() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        h.seed_user("b", "XJ42K").await;
        let svc = &h.service;

        assert!(matches!(
            svc.send_friend_request(Some(&a), None).await,
            Err(FriendshipError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.send_friend_request(Some(&a), Some("  ")).await,
            Err(FriendshipError::InvalidInput(_))
        ));
        // unknown code is reported before the missing session
        assert!(matches!(
            svc.send_friend_request(None, Some("NOPE1")).await,
            Err(FriendshipError::NotFound)
        ));
        assert!(matches!(
            svc.send_friend_request(None, Some("XJ42K")).await,
            Err(FriendshipError::Unauthenticated)
        ));
        assert!(matches!(
            svc.send_friend_request(Some(&a), Some("AAAAA")).await,
            Err(FriendshipError::InvalidInput(_))
        ));
        assert!(h.requests().await.is_empty());
        assert!(h.event_types().await.is_empty());
    }

    #[tokio::test]
    async fn accepted_request_links_both_users() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let b = h.seed_user("b", "XJ42K").await;
        let svc = &h.service;

        let id = svc
            .send_friend_request(Some(&a), Some("XJ42K"))
            .await
            .unwrap();

        let pending = svc.get_friend_requests(Some(&b)).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].from, a.uid);
        assert_eq!(pending[0].status, FriendRequestStatus::Pending);
        assert!(svc.get_friend_requests(Some(&a)).await.is_empty());

        let resolution = svc.accept_friend_request(Some(&b), &a.uid).await.unwrap();
        assert_eq!(resolution, RequestResolution::Accepted(id));

        assert_eq!(h.friends_of("a").await, uids(&["b"]));
        assert_eq!(h.friends_of("b").await, uids(&["a"]));
        assert_eq!(h.requests().await[0].status, FriendRequestStatus::Accepted);
        assert!(svc.get_friend_requests(Some(&b)).await.is_empty());

        // a's session snapshot predates the acceptance
        assert!(matches!(
            svc.send_friend_request(Some(&a), Some("XJ42K")).await,
            Err(FriendshipError::AlreadyFriends)
        ));
        assert_eq!(
            h.event_types().await,
            vec![EventType::FriendRequestNew, EventType::FriendshipNew]
        );
    }

    #[tokio::test]
    async fn accepting_twice_is_a_noop() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let b = h.seed_user("b", "XJ42K").await;
        let svc = &h.service;

        svc.send_friend_request(Some(&a), Some("XJ42K"))
            .await
            .unwrap();
        svc.accept_friend_request(Some(&b), &a.uid).await.unwrap();

        let second = svc.accept_friend_request(Some(&b), &a.uid).await.unwrap();
        assert_eq!(second, RequestResolution::AlreadyResolved);
        assert_eq!(h.friends_of("a").await, uids(&["b"]));
        assert_eq!(h.friends_of("b").await, uids(&["a"]));
        assert_eq!(h.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn already_friends_is_checked_before_duplicates() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let b = h.seed_user("b", "XJ42K").await;
        let svc = &h.service;

        // b's own request to a stays pending after a's request is accepted
        svc.send_friend_request(Some(&a), Some("XJ42K"))
            .await
            .unwrap();
        svc.send_friend_request(Some(&b), Some("AAAAA"))
            .await
            .unwrap();
        svc.accept_friend_request(Some(&b), &a.uid).await.unwrap();

        assert!(matches!(
            svc.send_friend_request(Some(&b), Some("AAAAA")).await,
            Err(FriendshipError::AlreadyFriends)
        ));
    }

    #[tokio::test]
    async fn declined_request_leaves_friends_untouched_and_allows_a_retry() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let b = h.seed_user("b", "XJ42K").await;
        let svc = &h.service;

        let first = svc
            .send_friend_request(Some(&a), Some("XJ42K"))
            .await
            .unwrap();
        let resolution = svc.decline_friend_request(Some(&b), &a.uid).await.unwrap();
        assert_eq!(resolution, RequestResolution::Declined(first));

        assert_eq!(h.requests().await[0].status, FriendRequestStatus::Declined);
        assert!(h.friends_of("a").await.is_empty());
        assert!(h.friends_of("b").await.is_empty());

        let second = svc
            .send_friend_request(Some(&a), Some("XJ42K"))
            .await
            .unwrap();
        assert_ne!(first, second);

        let requests = h.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].status, FriendRequestStatus::Pending);

        assert_eq!(
            svc.decline_friend_request(Some(&a), &b.uid).await.unwrap(),
            RequestResolution::AlreadyResolved
        );
    }

    #[tokio::test]
    async fn unfriend_undoes_acceptance() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let b = h.seed_user("b", "XJ42K").await;
        let c = h.seed_user("c", "CCCCC").await;
        let svc = &h.service;

        svc.send_friend_request(Some(&a), Some("CCCCC"))
            .await
            .unwrap();
        svc.accept_friend_request(Some(&c), &a.uid).await.unwrap();
        let before_a = h.friends_of("a").await;
        let before_b = h.friends_of("b").await;

        svc.send_friend_request(Some(&a), Some("XJ42K"))
            .await
            .unwrap();
        svc.accept_friend_request(Some(&b), &a.uid).await.unwrap();
        assert_eq!(h.friends_of("a").await, uids(&["b", "c"]));

        let outcome = svc.unfriend(Some(&a), &b.uid).await.unwrap();
        assert_eq!(outcome, UnfriendOutcome::Removed);
        assert_eq!(h.friends_of("a").await, before_a);
        assert_eq!(h.friends_of("b").await, before_b);
        assert_eq!(h.friends_of("c").await, uids(&["a"]));
        assert_eq!(h.event_types().await.last(), Some(&EventType::FriendshipRemoved));

        // idempotent removal
        assert_eq!(
            svc.unfriend(Some(&a), &b.uid).await.unwrap(),
            UnfriendOutcome::Removed
        );
        assert_eq!(
            svc.unfriend(Some(&a), &UserId::from("ghost")).await.unwrap(),
            UnfriendOutcome::UserMissing
        );
    }

    #[tokio::test]
    async fn writes_without_session_are_noops_and_reads_degrade() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let svc = &h.service;

        assert_eq!(
            svc.accept_friend_request(None, &a.uid).await.unwrap(),
            RequestResolution::NoSession
        );
        assert_eq!(
            svc.decline_friend_request(None, &a.uid).await.unwrap(),
            RequestResolution::NoSession
        );
        assert_eq!(
            svc.unfriend(None, &a.uid).await.unwrap(),
            UnfriendOutcome::NoSession
        );
        assert!(svc.get_friend_requests(None).await.is_empty());
        assert!(svc.get_all_friends(None).await.is_empty());
        assert_eq!(svc.get_invitation_code(None).await, None);
    }

    #[tokio::test]
    async fn all_friends_resolves_records() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let b = h.seed_user("b", "XJ42K").await;
        let c = h.seed_user("c", "CCCCC").await;
        let svc = &h.service;

        assert!(svc.get_all_friends(Some(&a)).await.is_empty());

        for (target, code) in [(&b, "XJ42K"), (&c, "CCCCC")] {
            svc.send_friend_request(Some(&a), Some(code))
                .await
                .unwrap();
            svc.accept_friend_request(Some(target), &a.uid)
                .await
                .unwrap();
        }

        let friends = svc.get_all_friends(Some(&a)).await;
        let names: Vec<&str> = friends.iter().map(|u| u.display_name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert!(friends.iter().all(|u| u.friends.contains(&a.uid)));

        let unknown = Session {
            uid: UserId::from("ghost"),
            friends: BTreeSet::new(),
            invitation_code: None,
        };
        assert!(svc.get_all_friends(Some(&unknown)).await.is_empty());
    }

    #[tokio::test]
    async fn invitation_code_comes_from_the_session_first() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;

        // a stale or foreign session still answers from its own snapshot
        let detached = Session {
            uid: UserId::from("detached"),
            friends: BTreeSet::new(),
            invitation_code: Some(InvitationCode("SESS1".to_owned())),
        };
        assert_eq!(
            h.service.get_invitation_code(Some(&detached)).await,
            Some(InvitationCode("SESS1".to_owned()))
        );
        assert_eq!(
            h.service.get_invitation_code(Some(&a)).await,
            Some(InvitationCode("AAAAA".to_owned()))
        );
        assert_eq!(h.cache.get(&a.uid).await.unwrap(), None);
        assert_eq!(h.cache.get(&detached.uid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invitation_code_is_cached_after_first_read() {
        let h = Harness::new();
        let seeded = h.seed_user("a", "AAAAA").await;
        let a = Session {
            invitation_code: None,
            ..seeded
        };

        assert_eq!(h.cache.get(&a.uid).await.unwrap(), None);
        assert_eq!(
            h.service.get_invitation_code(Some(&a)).await,
            Some(InvitationCode("AAAAA".to_owned()))
        );
        assert_eq!(
            h.cache.get(&a.uid).await.unwrap(),
            Some(InvitationCode("AAAAA".to_owned()))
        );

        let unknown = Session {
            uid: UserId::from("ghost"),
            friends: BTreeSet::new(),
            invitation_code: None,
        };
        assert_eq!(h.service.get_invitation_code(Some(&unknown)).await, None);
    }

    #[tokio::test]
    async fn accept_with_missing_requester_rolls_back() {
        let h = Harness::new();
        let b = h.seed_user("b", "XJ42K").await;

        let ghost = UserId::from("ghost");
        let mut tx = MemoryTxManager::new(h.store.clone())
            .begin()
            .await
            .unwrap();
        let inserted = MemoryFriendRequestRepo::new(h.store.clone())
            .insert_pending_in_tx(&mut *tx, &ghost, &b.uid)
            .await
            .unwrap();
        assert!(matches!(inserted, PendingInsert::Inserted(_)));
        tx.commit().await.unwrap();

        assert!(matches!(
            h.service.accept_friend_request(Some(&b), &ghost).await,
            Err(FriendshipError::NotFound)
        ));
        assert_eq!(h.requests().await[0].status, FriendRequestStatus::Pending);
        assert!(h.friends_of("b").await.is_empty());
        assert!(h.event_types().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_accept_and_decline_resolve_once() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let b = h.seed_user("b", "XJ42K").await;
        h.service
            .send_friend_request(Some(&a), Some("XJ42K"))
            .await
            .unwrap();

        let accept = {
            let svc = h.service.clone();
            let (b, from) = (b.clone(), a.uid.clone());
            tokio::spawn(async move { svc.accept_friend_request(Some(&b), &from).await })
        };
        let decline = {
            let svc = h.service.clone();
            let (b, from) = (b.clone(), a.uid.clone());
            tokio::spawn(async move { svc.decline_friend_request(Some(&b), &from).await })
        };

        let accept = accept.await.unwrap().unwrap();
        let decline = decline.await.unwrap().unwrap();
        let already = [accept, decline]
            .iter()
            .filter(|r| **r == RequestResolution::AlreadyResolved)
            .count();
        assert_eq!(already, 1);

        let status = h.requests().await[0].status;
        match accept {
            RequestResolution::Accepted(_) => {
                assert_eq!(status, FriendRequestStatus::Accepted);
                assert_eq!(h.friends_of("b").await, uids(&["a"]));
            }
            _ => {
                assert_eq!(status, FriendRequestStatus::Declined);
                assert!(h.friends_of("b").await.is_empty());
            }
        }
    }

    /// Records the order in which rows are touched inside transactions.
    #[derive(Clone, Default)]
    struct AccessLog(Arc<std::sync::Mutex<Vec<String>>>);

    impl AccessLog {
        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    struct LoggedUserRepo {
        inner: MemoryUserRepo,
        log: AccessLog,
    }

    #[async_trait::async_trait]
    impl UserRepo for LoggedUserRepo {
        async fn insert_in_tx(
            &self,
            tx: &mut dyn StorageTx,
            user: &UserRecord,
        ) -> anyhow::Result<UserInsert> {
            self.inner.insert_in_tx(tx, user).await
        }

        async fn find_by_uid(&self, uid: &UserId) -> anyhow::Result<Option<UserRecord>> {
            self.inner.find_by_uid(uid).await
        }

        async fn find_by_uid_in_tx(
            &self,
            tx: &mut dyn StorageTx,
            uid: &UserId,
        ) -> anyhow::Result<Option<UserRecord>> {
            self.log.push(format!("user:{uid}"));
            self.inner.find_by_uid_in_tx(tx, uid).await
        }

        async fn find_by_invitation_code_in_tx(
            &self,
            tx: &mut dyn StorageTx,
            code: &InvitationCode,
        ) -> anyhow::Result<Option<UserRecord>> {
            self.inner.find_by_invitation_code_in_tx(tx, code).await
        }

        async fn list_by_uids(&self, uids: &[UserId]) -> anyhow::Result<Vec<UserRecord>> {
            self.inner.list_by_uids(uids).await
        }

        async fn add_friend_in_tx(
            &self,
            tx: &mut dyn StorageTx,
            uid: &UserId,
            friend: &UserId,
        ) -> anyhow::Result<()> {
            self.inner.add_friend_in_tx(tx, uid, friend).await
        }

        async fn remove_friend_in_tx(
            &self,
            tx: &mut dyn StorageTx,
            uid: &UserId,
            friend: &UserId,
        ) -> anyhow::Result<()> {
            self.inner.remove_friend_in_tx(tx, uid, friend).await
        }

        async fn get_invitation_code(
            &self,
            uid: &UserId,
        ) -> anyhow::Result<Option<InvitationCode>> {
            self.inner.get_invitation_code(uid).await
        }
    }

    struct LoggedFriendRequestRepo {
        inner: MemoryFriendRequestRepo,
        log: AccessLog,
    }

    #[async_trait::async_trait]
    impl FriendRequestRepo for LoggedFriendRequestRepo {
        async fn insert_pending_in_tx(
            &self,
            tx: &mut dyn StorageTx,
            from: &UserId,
            to: &UserId,
        ) -> anyhow::Result<PendingInsert> {
            self.log.push("request".to_owned());
            self.inner.insert_pending_in_tx(tx, from, to).await
        }

        async fn find_pending_in_tx(
            &self,
            tx: &mut dyn StorageTx,
            from: &UserId,
            to: &UserId,
        ) -> anyhow::Result<Option<FriendRequest>> {
            self.log.push("request".to_owned());
            self.inner.find_pending_in_tx(tx, from, to).await
        }

        async fn list_pending_to(&self, to: &UserId) -> anyhow::Result<Vec<FriendRequest>> {
            self.inner.list_pending_to(to).await
        }

        async fn transition_in_tx(
            &self,
            tx: &mut dyn StorageTx,
            id: FriendRequestId,
            next: FriendRequestStatus,
        ) -> anyhow::Result<bool> {
            self.log.push("request".to_owned());
            self.inner.transition_in_tx(tx, id, next).await
        }
    }

    fn user_locks_then_requests(log: &[String]) -> Vec<&str> {
        let first_request = log
            .iter()
            .position(|e| e == "request")
            .unwrap_or(log.len());
        assert!(
            log[first_request..].iter().all(|e| e == "request"),
            "user row locked after a request row: {log:?}"
        );
        log[..first_request].iter().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn user_rows_are_locked_in_pair_order_before_request_rows() {
        let h = Harness::new();
        let a = h.seed_user("a", "AAAAA").await;
        let b = h.seed_user("b", "XJ42K").await;
        let c = h.seed_user("c", "CCCCC").await;

        let log = AccessLog::default();
        let svc = RealFriendshipService::new(
            Arc::new(LoggedUserRepo {
                inner: MemoryUserRepo::new(h.store.clone()),
                log: log.clone(),
            }),
            Arc::new(LoggedFriendRequestRepo {
                inner: MemoryFriendRequestRepo::new(h.store.clone()),
                log: log.clone(),
            }),
            Arc::new(MemoryOutboxRepo::new()),
            h.cache.clone(),
            Arc::new(MemoryTxManager::new(h.store.clone())),
        );

        // b sends to a: the larger uid is the caller
        svc.send_friend_request(Some(&b), Some("AAAAA"))
            .await
            .unwrap();
        assert_eq!(user_locks_then_requests(&log.take()), vec!["user:a", "user:b"]);

        svc.accept_friend_request(Some(&a), &b.uid).await.unwrap();
        assert_eq!(user_locks_then_requests(&log.take()), vec!["user:a", "user:b"]);

        svc.send_friend_request(Some(&c), Some("AAAAA"))
            .await
            .unwrap();
        assert_eq!(user_locks_then_requests(&log.take()), vec!["user:a", "user:c"]);

        svc.decline_friend_request(Some(&a), &c.uid).await.unwrap();
        assert_eq!(user_locks_then_requests(&log.take()), vec!["user:a", "user:c"]);

        // nothing pending: still users first
        assert_eq!(
            svc.decline_friend_request(Some(&a), &c.uid).await.unwrap(),
            RequestResolution::AlreadyResolved
        );
        assert_eq!(user_locks_then_requests(&log.take()), vec!["user:a", "user:c"]);

        // b's fresh session already lists a
        let b_now = Session::from(&h.store.snapshot().await.user(&b.uid).cloned().unwrap());
        assert!(matches!(
            svc.send_friend_request(Some(&b_now), Some("AAAAA")).await,
            Err(FriendshipError::AlreadyFriends)
        ));
        assert!(log.take().is_empty());
    }
}
