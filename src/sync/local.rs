use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{sync::broadcast, task::JoinHandle};
use uuid::Uuid;

use crate::{
    sync::HandlerRegistry,
    usecase::contracts::{SubscriptionId, SyncChannel, SyncHandler},
};

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
struct SyncNotice {
    origin: Uuid,
}

/// In-process bus shared by every context of one process.
#[derive(Clone)]
pub struct LocalSyncBus {
    sender: broadcast::Sender<SyncNotice>,
}

impl Default for LocalSyncBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LocalSyncBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Attaches a new context to the bus. Must be called inside a Tokio runtime.
    pub fn channel(&self) -> LocalSyncChannel {
        LocalSyncChannel::attach(self.sender.clone())
    }
}

/// One context's handle on a [`LocalSyncBus`].
pub struct LocalSyncChannel {
    origin: Uuid,
    sender: broadcast::Sender<SyncNotice>,
    registry: Arc<HandlerRegistry>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl LocalSyncChannel {
    fn attach(sender: broadcast::Sender<SyncNotice>) -> Self {
        let origin = Uuid::new_v4();
        let registry = Arc::new(HandlerRegistry::default());
        let receiver = sender.subscribe();
        let listener = tokio::spawn(listen(origin, receiver, registry.clone()));

        tracing::debug!(%origin, "attached to local sync bus");
        Self {
            origin,
            sender,
            registry,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Stops receiving notices and drops every registered handler.
    pub fn close(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
            self.registry.clear();
            tracing::debug!(origin = %self.origin, "detached from local sync bus");
        }
    }
}

impl Drop for LocalSyncChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl SyncChannel for LocalSyncChannel {
    fn notify(&self) {
        // Only fails when no receiver is attached, and our own listener always is while open.
        if self.sender.send(SyncNotice { origin: self.origin }).is_err() {
            tracing::debug!(origin = %self.origin, "no live contexts to notify");
        }
    }

    fn subscribe(&self, handler: SyncHandler) -> SubscriptionId {
        self.registry.insert(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if !self.registry.remove(id) {
            tracing::debug!(subscription = id.0, "unsubscribe for unknown handler");
        }
    }
}

async fn listen(origin: Uuid, mut receiver: broadcast::Receiver<SyncNotice>, registry: Arc<HandlerRegistry>) {
    loop {
        match receiver.recv().await {
            Ok(notice) if notice.origin == origin => {}
            Ok(_) => registry.dispatch(),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(%origin, skipped, "sync listener lagged, reloading once");
                registry.dispatch();
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!(%origin, "local sync bus closed");
                break;
            }
        }
    }
}
