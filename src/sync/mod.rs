//! Cross-context "comments changed" notices.

pub mod local;
pub mod nats;

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::usecase::contracts::{SubscriptionId, SyncChannel, SyncHandler};

pub const DEFAULT_SYNC_SUBJECT: &str = "comments-sync";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync connection error: {0}")]
    ConnectionError(String),
    #[error("Sync subscription error: {0}")]
    SubscriptionError(String),
}

/// Handlers registered on one channel handle.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<SubscriptionId, SyncHandler>>,
}

impl HandlerRegistry {
    pub(crate) fn insert(&self, handler: SyncHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().insert(id, handler);
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        self.handlers.lock().remove(&id).is_some()
    }

    pub(crate) fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Runs every handler once. Handlers are called outside the lock so they may
    /// subscribe or unsubscribe themselves.
    pub(crate) fn dispatch(&self) {
        let handlers: Vec<SyncHandler> = self.handlers.lock().values().cloned().collect();
        tracing::debug!(handlers = handlers.len(), "dispatching sync notice");
        for handler in handlers {
            handler();
        }
    }
}

impl<T: SyncChannel + ?Sized> SyncChannel for Box<T> {
    fn notify(&self) {
        (**self).notify()
    }

    fn subscribe(&self, handler: SyncHandler) -> SubscriptionId {
        (**self).subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }
}
