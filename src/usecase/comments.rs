use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::{
    sync::{Mutex as AsyncMutex, Notify},
    task::JoinHandle,
};

use crate::domain::builder::build_tree;
use crate::domain::comment::{Comment, CommentId};
use crate::domain::tree;
use crate::usecase::contracts::{CommentRepository, SubscriptionId, SyncChannel, SyncHandler};
use crate::usecase::error::{StoreError, LOAD_FAILED, SAVE_FAILED};

/// Called with the full tree after every successful load, add or delete.
pub type ChangeListener = Arc<dyn Fn(&[Comment]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Error(String),
}

struct TreeState {
    comments: Vec<Comment>,
    status: LoadState,
}

struct SyncAttachment {
    subscription: SubscriptionId,
    task: JoinHandle<()>,
}

struct StoreInner<R, C> {
    repository: R,
    channel: C,
    listener: Option<ChangeListener>,
    // Held for a whole refresh, add or delete so they never interleave.
    turn: AsyncMutex<()>,
    state: RwLock<TreeState>,
    sync: Mutex<Option<SyncAttachment>>,
}

/// Owns one context's in-memory comment tree and keeps it in step with storage and with
/// other contexts.
///
/// Refreshes and mutations of one store run one at a time, each to completion.
/// Mutations are applied in memory first and then persisted. A failed save is reported
/// through [`LoadState::Error`] and the returned error, but the in-memory change stays, so
/// memory and storage can diverge until the next successful save or refresh. Concurrent
/// writers are last-writer-wins at the storage layer.
pub struct CommentStore<R, C>
where
    R: CommentRepository,
    C: SyncChannel,
{
    inner: Arc<StoreInner<R, C>>,
}

impl<R, C> CommentStore<R, C>
where
    R: CommentRepository + 'static,
    C: SyncChannel + 'static,
{
    /// Builds a store in the `Loading` state without touching storage or the channel.
    pub fn new(repository: R, channel: C, listener: Option<ChangeListener>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                repository,
                channel,
                listener,
                turn: AsyncMutex::new(()),
                state: RwLock::new(TreeState {
                    comments: Vec::new(),
                    status: LoadState::Loading,
                }),
                sync: Mutex::new(None),
            }),
        }
    }

    /// Builds a store, subscribes it to sync notices and performs the initial load.
    ///
    /// A failed initial load is not fatal: it leaves the store in [`LoadState::Error`]
    /// with an empty tree.
    pub async fn open(repository: R, channel: C, listener: Option<ChangeListener>) -> Self {
        let store = Self::new(repository, channel, listener);
        store.attach_sync();
        if let Err(e) = store.refresh().await {
            tracing::warn!(error = %e, "initial comment load failed");
        }
        store
    }

    fn attach_sync(&self) {
        let notify = Arc::new(Notify::new());
        let handler: SyncHandler = {
            let notify = notify.clone();
            Arc::new(move || notify.notify_one())
        };
        let subscription = self.inner.channel.subscribe(handler);

        let weak: Weak<StoreInner<R, C>> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            loop {
                notify.notified().await;
                let Some(inner) = weak.upgrade() else { break };
                tracing::debug!("sync notice received, reloading comments");
                // Failures are already recorded in the store status.
                let _ = inner.refresh().await;
            }
        });

        let previous = self.inner.sync.lock().replace(SyncAttachment { subscription, task });
        if let Some(previous) = previous {
            self.inner.channel.unsubscribe(previous.subscription);
            previous.task.abort();
        }
    }

    /// Re-reads storage and replaces the in-memory tree wholesale.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.inner.refresh().await
    }

    /// Adds a top-level comment, or a reply when `parent_id` is given.
    ///
    /// Returns `Ok(None)` without touching storage when the trimmed text is empty or the
    /// parent is not in the current tree.
    #[tracing::instrument(skip(self, text))]
    pub async fn add(&self, text: &str, parent_id: Option<CommentId>) -> Result<Option<Comment>, StoreError> {
        if text.trim().is_empty() {
            tracing::debug!("ignoring empty comment");
            return Ok(None);
        }

        let _turn = self.inner.turn.lock().await;
        let comment = Comment::new(text, parent_id);
        let updated = {
            let mut state = self.inner.state.write();
            let updated = match parent_id {
                Some(parent_id) => {
                    if !tree::contains(&state.comments, parent_id) {
                        tracing::warn!(%parent_id, "reply target not found, ignoring");
                        return Ok(None);
                    }
                    tree::insert_reply(&state.comments, parent_id, comment.clone())
                }
                None => std::iter::once(comment.clone())
                    .chain(state.comments.iter().cloned())
                    .collect(),
            };
            state.comments = updated.clone();
            updated
        };

        self.inner.persist(updated).await?;

        metrics::counter!("comments_added_total").increment(1);
        tracing::info!(comment_id = %comment.id, "comment added successfully");
        Ok(Some(comment))
    }

    /// Removes a comment together with all of its replies.
    #[tracing::instrument(skip(self), fields(comment_id = %id))]
    pub async fn delete(&self, id: CommentId) -> Result<(), StoreError> {
        tracing::debug!("deleting comment");
        let _turn = self.inner.turn.lock().await;

        let (updated, removed) = {
            let mut state = self.inner.state.write();
            let updated = tree::remove_by_id(&state.comments, id);
            let removed = tree::count(&state.comments) - tree::count(&updated);
            state.comments = updated.clone();
            (updated, removed)
        };

        self.inner.persist(updated).await?;

        if removed == 0 {
            tracing::debug!("comment was not in the tree");
        } else {
            metrics::counter!("comments_deleted_total").increment(removed as u64);
            tracing::info!(removed, "comment deleted successfully");
        }
        Ok(())
    }

    /// Snapshot of the current in-memory tree.
    pub fn comments(&self) -> Vec<Comment> {
        self.inner.state.read().comments.clone()
    }

    pub fn total_count(&self) -> usize {
        tree::count(&self.inner.state.read().comments)
    }

    pub fn status(&self) -> LoadState {
        self.inner.state.read().status.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.status() == LoadState::Loading
    }

    pub fn error(&self) -> Option<String> {
        match self.status() {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl<R, C> CommentStore<R, C>
where
    R: CommentRepository,
    C: SyncChannel,
{
    /// Unsubscribes from the sync channel and stops reacting to notices.
    pub fn close(&self) {
        if let Some(attachment) = self.inner.sync.lock().take() {
            self.inner.channel.unsubscribe(attachment.subscription);
            attachment.task.abort();
            tracing::debug!("comment store detached from sync channel");
        }
    }
}

impl<R, C> Drop for CommentStore<R, C>
where
    R: CommentRepository,
    C: SyncChannel,
{
    fn drop(&mut self) {
        self.close();
    }
}

impl<R, C> StoreInner<R, C>
where
    R: CommentRepository,
    C: SyncChannel,
{
    #[tracing::instrument(skip(self))]
    async fn refresh(&self) -> Result<(), StoreError> {
        let _turn = self.turn.lock().await;
        tracing::debug!("loading comments");
        self.state.write().status = LoadState::Loading;

        let records = match self.repository.load_all().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "failed to load comments");
                metrics::counter!("comment_store_load_failures_total").increment(1);
                self.state.write().status = LoadState::Error(LOAD_FAILED.to_string());
                return Err(StoreError::load(e));
            }
        };

        let record_count = records.len();
        let comments = build_tree(records);
        {
            let mut state = self.state.write();
            state.comments = comments.clone();
            state.status = LoadState::Ready;
        }

        metrics::gauge!("comments_total").set(record_count as f64);
        self.publish(&comments);
        tracing::debug!(count = record_count, "comments loaded");
        Ok(())
    }

    /// Flattens and saves `comments`, then tells other contexts and the listener.
    async fn persist(&self, comments: Vec<Comment>) -> Result<(), StoreError> {
        let records = tree::flatten(&comments);
        let record_count = records.len();

        if let Err(e) = self.repository.replace_all(records).await {
            tracing::error!(error = %e, "failed to save comments");
            metrics::counter!("comment_store_save_failures_total").increment(1);
            self.state.write().status = LoadState::Error(SAVE_FAILED.to_string());
            return Err(StoreError::save(e));
        }

        self.state.write().status = LoadState::Ready;
        metrics::gauge!("comments_total").set(record_count as f64);
        self.channel.notify();
        self.publish(&comments);
        Ok(())
    }

    fn publish(&self, comments: &[Comment]) {
        if let Some(listener) = &self.listener {
            listener(comments);
        }
    }
}
