use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub topic: String,
    pub batch_size: u32,
    pub poll_interval: Duration,
    pub retry_backoff: chrono::Duration,
}

/// Relays committed outbox rows to the event publisher.
pub struct Notifier {
    tx_manager: Arc<dyn TxManager>,
    outbox_repo: Arc<dyn OutboxRepo>,
    event_publisher: Arc<dyn super::EventPublisher>,
    config: NotifierConfig,
    cancellation_token: CancellationToken,
}

impl Notifier {
    pub fn new(
        tx_manager: Arc<dyn TxManager>,
        outbox_repo: Arc<dyn OutboxRepo>,
        event_publisher: Arc<dyn super::EventPublisher>,
        config: NotifierConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            tx_manager,
            outbox_repo,
            event_publisher,
            config,
            cancellation_token,
        }
    }

    fn build_envelope(
        receivers_json: &serde_json::Value,
        payload_json: &serde_json::Value,
    ) -> anyhow::Result<Vec<u8>> {
        let envelope = json!({
            "receivers": receivers_json,
            "body": payload_json,
        });

        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Claims one batch and tries each event once. Returns the number claimed.
    pub async fn tick_once(&self) -> anyhow::Result<usize> {
        let mut tx = self.tx_manager.begin().await?;

        let batch = self
            .outbox_repo
            .claim_ready_batch_in_tx(&mut *tx, Utc::now(), self.config.batch_size)
            .await?;

        for event in &batch {
            let key = match &event.partition_key {
                Some(key) => key.clone(),
                None => event.event_id.0.to_string(),
            };

            let published = match Self::build_envelope(&event.receivers_json, &event.payload_json)
            {
                Ok(payload) => {
                    self.event_publisher
                        .publish(&self.config.topic, key.as_bytes(), &payload)
                        .await
                }
                Err(e) => Err(e),
            };

            match published {
                Ok(()) => {
                    self.outbox_repo
                        .mark_delivered_in_tx(&mut *tx, event.event_id, Utc::now())
                        .await?;
                    debug!(event_id = %event.event_id.0, event_type = %event.event_type, "event delivered");
                }
                Err(e) => {
                    let next = Utc::now() + self.config.retry_backoff;
                    warn!(event_id = %event.event_id.0, "event delivery failed, retrying later: {e:#}");
                    self.outbox_repo
                        .reschedule_in_tx(&mut *tx, event.event_id, next, &format!("{e:#}"))
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(batch.len())
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("notifier shutting down...");
                    break;
                }
                result = self.tick_once() => {
                    match result {
                        Ok(0) => tokio::time::sleep(self.config.poll_interval).await,
                        Ok(_) => {}
                        Err(e) => {
                            error!("notifier error: {e:#}");
                            tokio::time::sleep(self.config.poll_interval).await;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::*;
    use crate::infra_memory::*;
    use crate::server::EventPublisher;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingPublisher {
        fail: AtomicBool,
        sent: Mutex<Vec<(String, String, serde_json::Value)>>,
    }

    #[async_trait::async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, key: &[u8], payload: &[u8]) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("broker unavailable");
            }
            self.sent.lock().unwrap().push((
                topic.to_owned(),
                String::from_utf8(key.to_vec())?,
                serde_json::from_slice(payload)?,
            ));
            Ok(())
        }
    }

    fn notifier(store: &MemoryStore, publisher: Arc<RecordingPublisher>) -> Notifier {
        Notifier::new(
            Arc::new(MemoryTxManager::new(store.clone())),
            Arc::new(MemoryOutboxRepo::new()),
            publisher,
            NotifierConfig {
                topic: "friendship.test".to_owned(),
                batch_size: 16,
                poll_interval: Duration::from_millis(10),
                retry_backoff: chrono::Duration::zero(),
            },
            CancellationToken::new(),
        )
    }

    async fn enqueue(store: &MemoryStore) -> EventId {
        let event = OutboxEvent::new(
            Some("b".to_owned()),
            vec![UserId::from("a"), UserId::from("b")],
            &S2CEvent::FriendshipNew(FriendshipNew {
                users: [UserId::from("a"), UserId::from("b")],
            }),
        )
        .unwrap();
        let mut tx = MemoryTxManager::new(store.clone()).begin().await.unwrap();
        MemoryOutboxRepo::new()
            .enqueue_in_tx(&mut *tx, &event)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        event.event_id
    }

    #[tokio::test]
    async fn delivers_envelope_once() {
        let store = MemoryStore::new();
        let publisher = Arc::new(RecordingPublisher::default());
        let notifier = notifier(&store, publisher.clone());
        let id = enqueue(&store).await;

        assert_eq!(notifier.tick_once().await.unwrap(), 1);
        assert_eq!(notifier.tick_once().await.unwrap(), 0);

        let sent = publisher.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        let (topic, key, envelope) = &sent[0];
        assert_eq!(topic, "friendship.test");
        assert_eq!(key, "b");
        let envelope: S2CEnvelope = serde_json::from_value(envelope.clone()).unwrap();
        assert_eq!(envelope.receivers, vec![UserId::from("a"), UserId::from("b")]);
        assert!(matches!(envelope.body, S2CEvent::FriendshipNew(_)));

        let state = store.snapshot().await;
        assert!(state.outbox.is_empty(), "{id:?} still queued");
    }

    #[tokio::test]
    async fn failed_delivery_is_retried() {
        let store = MemoryStore::new();
        let publisher = Arc::new(RecordingPublisher::default());
        publisher.fail.store(true, Ordering::SeqCst);
        let notifier = notifier(&store, publisher.clone());
        enqueue(&store).await;

        assert_eq!(notifier.tick_once().await.unwrap(), 1);
        {
            let state = store.snapshot().await;
            assert_eq!(state.outbox[0].attempt_count, 1);
            assert_eq!(state.outbox.len(), 1);
            assert!(state.outbox[0].last_error.is_some());
        }

        publisher.fail.store(false, Ordering::SeqCst);
        assert_eq!(notifier.tick_once().await.unwrap(), 1);
        assert_eq!(publisher.sent.lock().unwrap().len(), 1);
        assert!(store.snapshot().await.outbox.is_empty());
    }
}
