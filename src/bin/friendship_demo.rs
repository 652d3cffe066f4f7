//! Walks the friendship workflow against the in-memory backends.
//!
//! $ cargo run --bin friendship_demo

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use waymark::application_impl::*;
use waymark::application_port::*;
use waymark::domain_model::UserId;
use waymark::domain_port::*;
use waymark::infra_memory::*;
use waymark::logger::*;
use waymark::server::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_from_config(&LogConfig {
        filter: "waymark=debug".to_owned(),
    })?;

    let store = MemoryStore::new();
    let user_repo: Arc<dyn UserRepo> = Arc::new(MemoryUserRepo::new(store.clone()));
    let outbox_repo: Arc<dyn OutboxRepo> = Arc::new(MemoryOutboxRepo::new());
    let tx_manager: Arc<dyn TxManager> = Arc::new(MemoryTxManager::new(store.clone()));

    let users = RealUserService::new(
        user_repo.clone(),
        tx_manager.clone(),
        InvitationCodeGenerator::new(6),
        8,
    );
    let friendship = RealFriendshipService::new(
        user_repo.clone(),
        Arc::new(MemoryFriendRequestRepo::new(store.clone())),
        outbox_repo.clone(),
        Arc::new(MemoryInvitationCodeCache::new()),
        tx_manager.clone(),
    );
    let groups = RealGroupService::new(
        user_repo,
        Arc::new(MemoryGroupRepo::new(store.clone())),
        outbox_repo.clone(),
        tx_manager.clone(),
    );

    let cancel = CancellationToken::new();
    let notifier = Notifier::new(
        tx_manager,
        outbox_repo,
        Arc::new(LogPublisher::new()),
        NotifierConfig {
            topic: "waymark.friendship.demo".to_owned(),
            batch_size: 64,
            poll_interval: Duration::from_millis(50),
            retry_backoff: chrono::Duration::seconds(1),
        },
        cancel.clone(),
    );
    let notifier_handle = tokio::spawn(async move { notifier.run().await });

    let amy = users.register(UserId::from("amy"), "Amy").await?;
    let bob = users.register(UserId::from("bob"), "Bob").await?;
    let amy_session = users.load_session(&amy.uid).await?;
    let bob_session = users.load_session(&bob.uid).await?;

    let code = friendship.get_invitation_code(bob_session.as_ref()).await;
    info!(?code, "bob's invitation code");

    let request_id = friendship
        .send_friend_request(amy_session.as_ref(), code.as_ref().map(|c| c.as_str()))
        .await?;
    info!(%request_id, "amy asked bob");

    let pending = friendship.get_friend_requests(bob_session.as_ref()).await;
    info!(count = pending.len(), "bob's inbox");

    let resolution = friendship
        .accept_friend_request(bob_session.as_ref(), &amy.uid)
        .await?;
    info!(?resolution, "bob answered");

    for friend in friendship.get_all_friends(amy_session.as_ref()).await {
        info!(uid = %friend.uid, name = %friend.display_name, "amy's friend");
    }

    let group_id = groups
        .create_group(amy_session.as_ref(), "demo crew", &[bob.uid.clone()])
        .await?;
    info!(%group_id, "amy grouped bob");

    let outcome = friendship.unfriend(amy_session.as_ref(), &bob.uid).await?;
    info!(?outcome, "amy unfriended bob");

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    notifier_handle.await??;

    Ok(())
}
