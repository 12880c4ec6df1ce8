//! Per-document change channels.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use tote_engine::{ListDocument, ListKind, UserId};

/// A document as published to watchers.
pub type SharedDocument = Arc<ListDocument<Value>>;

/// Receives every new revision of one document. `None` until the first
/// write seen by this process.
pub type DocumentReceiver = watch::Receiver<Option<SharedDocument>>;

type DocumentKey = (ListKind, UserId);

/// Fan-out of document writes to interested watchers.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct SubscriptionHub {
    channels: DashMap<DocumentKey, watch::Sender<Option<SharedDocument>>>,
    connections: AtomicUsize,
}

impl SubscriptionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new hub wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Watch a document.
    pub fn subscribe(&self, kind: ListKind, user_id: &str) -> DocumentReceiver {
        self.channels
            .entry((kind, user_id.to_string()))
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    /// Watch a document for the lifetime of the returned guard. The
    /// channel is removed when the guard holds its last receiver.
    pub fn watch(&self, kind: ListKind, user_id: &str) -> DocumentWatch<'_> {
        DocumentWatch {
            receiver: self.subscribe(kind, user_id),
            key: (kind, user_id.to_string()),
            hub: self,
        }
    }

    /// Publish a new revision of a document.
    ///
    /// Returns the number of watchers notified. Older revisions than the one
    /// already published are ignored.
    pub fn publish(&self, kind: ListKind, document: ListDocument<Value>) -> usize {
        let key = (kind, document.user_id.clone());
        let Some(sender) = self.channels.get(&key) else {
            return 0;
        };

        let revision = document.revision;
        let document = Arc::new(document);
        let replaced = sender.send_if_modified(|current| {
            if current
                .as_ref()
                .is_some_and(|existing| existing.revision >= revision)
            {
                return false;
            }
            *current = Some(document);
            true
        });
        let receivers = sender.receiver_count();
        drop(sender);

        if receivers == 0 {
            self.channels
                .remove_if(&key, |_, sender| sender.receiver_count() == 0);
        }

        tracing::debug!(
            collection = kind.collection(),
            user_id = %key.1,
            revision,
            receivers,
            replaced,
            "Published document revision"
        );

        if replaced {
            receivers
        } else {
            0
        }
    }

    /// Drop channels nobody is watching any more.
    pub fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels
            .retain(|_, sender| sender.receiver_count() > 0);
        before - self.channels.len()
    }

    /// Number of documents with a live channel.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Record an opened WebSocket connection.
    pub fn register_connection(&self) -> usize {
        self.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a closed WebSocket connection.
    pub fn unregister_connection(&self) -> usize {
        self.connections.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    /// Get the number of active WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

/// A receiver that cleans up its hub channel on drop.
#[derive(Debug)]
pub struct DocumentWatch<'a> {
    receiver: DocumentReceiver,
    key: DocumentKey,
    hub: &'a SubscriptionHub,
}

impl Deref for DocumentWatch<'_> {
    type Target = DocumentReceiver;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}

impl DerefMut for DocumentWatch<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.receiver
    }
}

impl Drop for DocumentWatch<'_> {
    fn drop(&mut self) {
        // Our own receiver is still alive here.
        self.hub
            .channels
            .remove_if(&self.key, |_, sender| sender.receiver_count() <= 1);
    }
}
