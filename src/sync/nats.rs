use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    sync::{HandlerRegistry, SyncError},
    usecase::contracts::{SubscriptionId, SyncChannel, SyncHandler},
};

/// Cross-process sync over NATS core pub/sub. Every process attached to the same subject
/// is one context; the payload is only the sender's origin id.
pub struct NatsSyncChannel {
    client: async_nats::Client,
    subject: String,
    origin: Uuid,
    registry: Arc<HandlerRegistry>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl NatsSyncChannel {
    pub async fn connect(nats_url: &str, subject: &str) -> Result<Self, SyncError> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| SyncError::ConnectionError(e.to_string()))?;
        tracing::info!(%nats_url, "connected to NATS");

        Self::attach(client, subject).await
    }

    pub async fn attach(client: async_nats::Client, subject: &str) -> Result<Self, SyncError> {
        let origin = Uuid::new_v4();
        let registry = Arc::new(HandlerRegistry::default());

        let mut subscriber = client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| SyncError::SubscriptionError(e.to_string()))?;

        let listener = {
            let registry = registry.clone();
            let subject = subject.to_string();
            tokio::spawn(async move {
                while let Some(message) = subscriber.next().await {
                    if message.payload[..] == origin.as_bytes()[..] {
                        continue;
                    }
                    tracing::debug!(%subject, "sync notice received");
                    registry.dispatch();
                }
                tracing::debug!(%subject, "NATS sync subscription ended");
            })
        };

        tracing::info!(%subject, %origin, "subscribed to sync subject");
        Ok(Self {
            client,
            subject: subject.to_string(),
            origin,
            registry,
            listener: Mutex::new(Some(listener)),
        })
    }

    pub fn close(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
            self.registry.clear();
            tracing::debug!(subject = %self.subject, origin = %self.origin, "detached from NATS sync");
        }
    }
}

impl Drop for NatsSyncChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl SyncChannel for NatsSyncChannel {
    fn notify(&self) {
        let client = self.client.clone();
        let subject = self.subject.clone();
        let payload = self.origin.as_bytes().to_vec();

        tokio::spawn(async move {
            match client.publish(subject.clone(), payload.into()).await {
                Ok(()) => tracing::debug!(%subject, "published sync notice"),
                Err(e) => tracing::warn!(%subject, error = %e, "failed to publish sync notice"),
            }
        });
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
