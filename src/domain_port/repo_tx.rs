use std::any::Any;

#[async_trait::async_trait]
pub trait TxManager: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn StorageTx>>;
}

/// A unit of work against one store. Dropping it without `commit` rolls back.
#[async_trait::async_trait]
pub trait StorageTx: Send + Any {
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;

    /// Lets a backend recover its concrete transaction type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Downcasts to the backend's transaction type, failing on a foreign one.
pub fn downcast_tx<T: StorageTx>(tx: &mut dyn StorageTx) -> anyhow::Result<&mut T> {
    tx.as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| anyhow::anyhow!("transaction belongs to another store backend"))
}
