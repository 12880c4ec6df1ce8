//! Remote store adapters.
//!
//! A remote store exposes one document per user per list kind as a merge
//! upsert target and as a push subscription. Subscriptions deliver the full
//! item array on every change, including echoes of the client's own
//! writes; filtering those is the controller's job.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tote_engine::{ItemList, LineItem, ListDocument, ListWrite, RemoteSnapshot, Revision, UserId};

use crate::error::{ClientError, Result};

/// Buffer size of a subscription channel.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 16;

/// Document store for one list kind.
#[async_trait]
pub trait RemoteStore<T: LineItem>: Send + Sync {
    /// Merge-upsert the user's document and return its new revision.
    async fn upsert(&self, user_id: &str, write: ListWrite<T>) -> Result<Revision>;

    /// Subscribe to the user's document.
    ///
    /// The first delivery is the current document (empty with revision 0 if
    /// it does not exist).
    async fn subscribe(&self, user_id: &str) -> Result<Subscription<T>>;
}

/// A standing subscription to one document.
///
/// Dropping it stops the delivery task.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<RemoteSnapshot<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    /// Wrap a channel fed by `task`.
    pub fn new(rx: mpsc::Receiver<RemoteSnapshot<T>>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Wait for the next snapshot. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<RemoteSnapshot<T>> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// In-process document store.
///
/// Each document sits in a `watch` channel, so every subscriber sees the
/// latest state after each write. Useful for embedding and for tests.
pub struct MemoryRemoteStore<T> {
    documents: DashMap<UserId, watch::Sender<ListDocument<T>>>,
    writes: AtomicU64,
    offline: AtomicBool,
    _items: PhantomData<fn() -> T>,
}

impl<T: LineItem> Default for MemoryRemoteStore<T> {
    fn default() -> Self {
        Self {
            documents: DashMap::new(),
            writes: AtomicU64::new(0),
            offline: AtomicBool::new(false),
            _items: PhantomData,
        }
    }
}

impl<T: LineItem> MemoryRemoteStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn channel(&self, user_id: &str) -> watch::Sender<ListDocument<T>> {
        self.documents
            .entry(user_id.to_string())
            .or_insert_with(|| watch::channel(ListDocument::empty(user_id)).0)
            .clone()
    }

    /// Current document of a user.
    pub fn document(&self, user_id: &str) -> ListDocument<T> {
        match self.documents.get(user_id) {
            Some(sender) => sender.borrow().clone(),
            None => ListDocument::empty(user_id),
        }
    }

    /// Number of successful upserts so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every upsert fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T: LineItem> RemoteStore<T> for MemoryRemoteStore<T> {
    async fn upsert(&self, user_id: &str, write: ListWrite<T>) -> Result<Revision> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                status: 503,
                body: "store offline".to_string(),
            });
        }

        // Stored items are normalized the same way the document service does.
        let mut write = write;
        write.items = ItemList::from_items(write.items).items().to_vec();

        let sender = self.channel(user_id);
        let mut revision = 0;
        sender.send_modify(|doc| {
            *doc = write.apply_to(Some(&*doc));
            revision = doc.revision;
        });
        self.writes.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(user_id = %user_id, revision, "Stored list document");
        Ok(revision)
    }

    async fn subscribe(&self, user_id: &str) -> Result<Subscription<T>> {
        let mut documents = self.channel(user_id).subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let task = tokio::spawn(async move {
            loop {
                let snapshot = documents.borrow_and_update().to_snapshot();
                if tx.send(snapshot).await.is_err() {
                    break;
                }
                if documents.changed().await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}
