use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::Settings;
use anyhow::anyhow;
use nanoid::nanoid;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct StoreBackend {
    user_repo: Arc<dyn UserRepo>,
    friend_request_repo: Arc<dyn FriendRequestRepo>,
    group_repo: Arc<dyn GroupRepo>,
    outbox_repo: Arc<dyn OutboxRepo>,
    tx_manager: Arc<dyn TxManager>,
    pool: Option<Pool<MySql>>,
}

impl StoreBackend {
    async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        match settings.store.backend.as_str() {
            "memory" => {
                let store = MemoryStore::new();
                Ok(Self {
                    user_repo: Arc::new(MemoryUserRepo::new(store.clone())),
                    friend_request_repo: Arc::new(MemoryFriendRequestRepo::new(store.clone())),
                    group_repo: Arc::new(MemoryGroupRepo::new(store.clone())),
                    outbox_repo: Arc::new(MemoryOutboxRepo::new()),
                    tx_manager: Arc::new(MemoryTxManager::new(store)),
                    pool: None,
                })
            }
            "mysql" => {
                let dsn = settings
                    .store
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.mysql_dsn is required for the mysql backend"))?;
                let pool = Pool::<MySql>::connect(dsn).await?;
                Ok(Self {
                    user_repo: Arc::new(MySqlUserRepo::new(pool.clone())),
                    friend_request_repo: Arc::new(MySqlFriendRequestRepo::new(pool.clone())),
                    group_repo: Arc::new(MySqlGroupRepo::new(pool.clone())),
                    outbox_repo: Arc::new(MySqlOutboxRepo::new()),
                    tx_manager: Arc::new(MySqlTxManager::new(pool.clone())),
                    pool: Some(pool),
                })
            }
            other => Err(anyhow!("Unknown store backend: {}", other)),
        }
    }
}

pub struct Server {
    pub user_service: Arc<dyn UserService>,
    pub friendship_service: Arc<dyn FriendshipService>,
    pub group_service: Arc<dyn GroupService>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    notifier_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let run_id = nanoid!(10, &alphabet);

        let store = StoreBackend::try_new(settings).await?;

        let invitation_cache: Arc<dyn InvitationCodeCache> =
            match settings.cache.backend.as_str() {
                "memory" => Arc::new(MemoryInvitationCodeCache::new()),
                "redis" => {
                    let dsn = settings.cache.redis_dsn.as_deref().ok_or_else(|| {
                        anyhow!("cache.redis_dsn is required for the redis backend")
                    })?;
                    let redis_manager = redis::Client::open(dsn)?
                        .get_connection_manager()
                        .await?;
                    Arc::new(RedisInvitationCodeCache::new(
                        redis_manager,
                        settings.cache.prefix.clone(),
                    ))
                }
                other => return Err(anyhow!("Unknown cache backend: {}", other)),
            };

        let token_verifier: Arc<dyn TokenVerifier> = match settings.auth.backend.as_str() {
            "fake" => Arc::new(FakeTokenVerifier::new()),
            "jwt" => {
                let key = match &settings.auth.signing_key {
                    Some(key) => key.clone(),
                    None => std::env::var("JWT_SIGNING_KEY")
                        .map_err(|_| anyhow!("auth.signing_key or JWT_SIGNING_KEY is required"))?,
                };
                Arc::new(JwtHs256Verifier::new(JwtConfig {
                    issuer: settings
                        .auth
                        .issuer
                        .clone()
                        .unwrap_or_else(|| "waymark.auth".to_owned()),
                    audience: settings
                        .auth
                        .audience
                        .clone()
                        .unwrap_or_else(|| "waymark-client".to_owned()),
                    signing_key: key.into_bytes(),
                }))
            }
            other => return Err(anyhow!("Unknown auth backend: {}", other)),
        };

        let user_service: Arc<dyn UserService> = Arc::new(RealUserService::new(
            store.user_repo.clone(),
            store.tx_manager.clone(),
            InvitationCodeGenerator::new(settings.invitation.code_length),
            settings.invitation.max_attempts,
        ));

        let friendship_service: Arc<dyn FriendshipService> =
            Arc::new(RealFriendshipService::new(
                store.user_repo.clone(),
                store.friend_request_repo.clone(),
                store.outbox_repo.clone(),
                invitation_cache,
                store.tx_manager.clone(),
            ));

        let group_service: Arc<dyn GroupService> = Arc::new(RealGroupService::new(
            store.user_repo.clone(),
            store.group_repo.clone(),
            store.outbox_repo.clone(),
            store.tx_manager.clone(),
        ));

        // region runtime infra
        let cancel = CancellationToken::new();

        let publisher: Arc<dyn EventPublisher> = match settings.notifier.backend.as_str() {
            "log" => Arc::new(LogPublisher::new()),
            "kafka" => {
                let servers = settings.notifier.bootstrap_servers.as_deref().ok_or_else(|| {
                    anyhow!("notifier.bootstrap_servers is required for the kafka backend")
                })?;
                Arc::new(KafkaPublisher::new(
                    servers,
                    &format!("waymark-pub-{}", run_id),
                )?)
            }
            other => return Err(anyhow!("Unknown notifier backend: {}", other)),
        };

        let notifier = Notifier::new(
            store.tx_manager.clone(),
            store.outbox_repo.clone(),
            publisher,
            NotifierConfig {
                topic: settings.notifier.topic.clone(),
                batch_size: settings.notifier.batch_size,
                poll_interval: Duration::from_millis(settings.notifier.poll_interval_ms),
                retry_backoff: chrono::Duration::seconds(settings.notifier.retry_backoff_secs),
            },
            cancel.clone(),
        );
        let notifier_handle = tokio::spawn(async move {
            if let Err(e) = notifier.run().await {
                error!("notifier stopped: {e:#}");
            }
        });

        // endregion

        info!(%run_id, store = %settings.store.backend, "server started");

        Ok(Self {
            user_service,
            friendship_service,
            group_service,
            token_verifier,
            notifier_handle: Mutex::new(Some(notifier_handle)),
            cancel,
            pool: store.pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.notifier_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("notifier handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
