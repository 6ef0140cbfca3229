use std::sync::Arc;

use async_trait::async_trait;

use crate::{domain::comment::CommentRecord, repository::errors::RepositoryError};

/// Durable storage of flat comment records.
///
/// `replace_all` must be atomic: after it returns `Ok`, the next `load_all` sees exactly the
/// new records; after it returns `Err`, the previous contents are still in place.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<CommentRecord>, RepositoryError>;
    async fn replace_all(&self, records: Vec<CommentRecord>) -> Result<(), RepositoryError>;
}

pub type SyncHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Payload-free "comments changed" broadcast between contexts sharing one store.
///
/// `notify` reaches every other live context but never the sender. Delivery is best-effort;
/// receivers re-read storage instead of trusting any carried state.
#[cfg_attr(test, mockall::automock)]
pub trait SyncChannel: Send + Sync {
    fn notify(&self);
    fn subscribe(&self, handler: SyncHandler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}
