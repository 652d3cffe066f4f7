use super::repo_tx_memory::{MemoryTx, OutboxRow};
use crate::domain_port::*;
use chrono::{DateTime, Utc};

#[derive(Default)]
pub struct MemoryOutboxRepo;

impl MemoryOutboxRepo {
    pub fn new() -> Self {
        MemoryOutboxRepo
    }
}

#[async_trait::async_trait]
impl OutboxRepo for MemoryOutboxRepo {
    async fn enqueue_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        event: &OutboxEvent,
    ) -> anyhow::Result<()> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        if state.outbox.iter().any(|r| r.event.event_id == event.event_id) {
            return Ok(());
        }
        state.outbox.push(OutboxRow {
            event: event.clone(),
            attempt_count: 0,
            next_attempt_at: event.created_at,
            last_error: None,
        });
        Ok(())
    }

    async fn claim_ready_batch_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        now: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<OutboxEvent>> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        let mut ready: Vec<&OutboxRow> = state
            .outbox
            .iter()
            .filter(|r| r.next_attempt_at <= now)
            .collect();
        ready.sort_by_key(|r| r.event.created_at);

        Ok(ready
            .into_iter()
            .take(limit as usize)
            .map(|r| r.event.clone())
            .collect())
    }

    async fn mark_delivered_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        event_id: EventId,
        delivered_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        let before = state.outbox.len();
        state.outbox.retain(|r| r.event.event_id != event_id);
        if state.outbox.len() < before {
            tracing::trace!(event_id = %event_id.0, %delivered_at, "outbox row dropped");
        }
        Ok(())
    }

    async fn reschedule_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        event_id: EventId,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> anyhow::Result<()> {
        let state = downcast_tx::<MemoryTx>(tx)?.state();
        if let Some(row) = state.outbox.iter_mut().find(|r| r.event.event_id == event_id) {
            row.attempt_count += 1;
            row.next_attempt_at = next_attempt_at;
            row.last_error = Some(last_error.chars().take(1024).collect());
        }
        Ok(())
    }
}
