//! The list controller.
//!
//! [`ListController`] drives one [`ListState`] on a tokio runtime. Every
//! public mutation runs in a short synchronous critical section that updates
//! the in-memory list, writes the local cache and publishes the new snapshot
//! to watchers. While an identity is bound, each effective mutation
//! (re)starts a debounce timer; when it fires, the whole list is written to
//! the remote store. A subscription pump feeds remote snapshots back into
//! the state, which decides whether they may overwrite local state. A feed
//! the store ends while the list is still bound is resubscribed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tote_engine::{
    CartItem, Epoch, FlushCompletion, IdentityChange, LineItem, ListState, Phase, RemoteSnapshot,
    SnapshotOutcome, UserId,
};

use crate::cache::ListCache;
use crate::config::SyncConfig;
use crate::error::ClientError;
use crate::remote::RemoteStore;

/// Local-first controller for one cart or wishlist.
///
/// Cloning is cheap; clones share the same list.
pub struct ListController<T: LineItem> {
    inner: Arc<Inner<T>>,
}

impl<T: LineItem> Clone for ListController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: LineItem> {
    state: Mutex<ListState<T>>,
    cache: ListCache<T>,
    remote: Arc<dyn RemoteStore<T>>,
    debounce: Duration,
    resubscribe_delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    flush_gate: tokio::sync::Mutex<()>,
    items_tx: watch::Sender<Arc<Vec<T>>>,
    disposed: AtomicBool,
}

impl<T: LineItem> ListController<T> {
    /// Create a controller and bootstrap it from the local cache.
    pub fn new(cache: ListCache<T>, remote: Arc<dyn RemoteStore<T>>, config: &SyncConfig) -> Self {
        let mut state = ListState::new(config.login_policy);
        state.bootstrap(cache.load());
        let (items_tx, _) = watch::channel(state.items());

        tracing::debug!(
            collection = T::KIND.collection(),
            items = state.list().len(),
            "Bootstrapped list from local cache"
        );

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                cache,
                remote,
                debounce: config.debounce,
                resubscribe_delay: config.watch_retry,
                timer: Mutex::new(None),
                pump: Mutex::new(None),
                flush_gate: tokio::sync::Mutex::new(()),
                items_tx,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase()
    }

    /// Bound identity, if any.
    pub fn user(&self) -> Option<UserId> {
        self.inner.state.lock().user().map(str::to_string)
    }

    /// Snapshot of the current items.
    ///
    /// Every effective mutation produces a new `Arc`, so `Arc::ptr_eq`
    /// between two snapshots tells whether the list changed.
    pub fn items(&self) -> Arc<Vec<T>> {
        self.inner.state.lock().items()
    }

    /// Stream of list snapshots, starting with the current one.
    pub fn watch(&self) -> watch::Receiver<Arc<Vec<T>>> {
        self.inner.items_tx.subscribe()
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.state.lock().list().get(id).cloned()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.state.lock().list().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().list().is_empty()
    }

    /// True if any entry refers to `product_id`.
    pub fn contains(&self, product_id: &str) -> bool {
        self.inner.state.lock().contains(product_id)
    }

    /// Add an item. Returns `true` if the list changed.
    pub fn add(&self, item: T) -> bool {
        self.mutate(|state| state.add(item))
    }

    /// Remove an entry by id. Returns `true` if the list changed.
    pub fn remove(&self, id: &str) -> bool {
        self.mutate(|state| state.remove(id))
    }

    /// Empty the list. Returns `true` if the list changed.
    pub fn clear(&self) -> bool {
        self.mutate(|state| state.clear())
    }

    fn mutate(&self, op: impl FnOnce(&mut ListState<T>) -> bool) -> bool {
        let (changed, authenticated) = {
            let mut state = self.inner.state.lock();
            let changed = op(&mut state);
            if changed {
                self.inner.persist(&state);
            }
            (changed, state.phase().is_authenticated())
        };

        if changed && authenticated {
            self.inner.schedule_flush();
        }
        changed
    }

    /// Bind an identity and subscribe to its remote document.
    ///
    /// Binding a different identity than the bound one clears the list and
    /// purges the local cache first.
    pub fn bind_identity(&self, user_id: &str) {
        let change = {
            let mut state = self.inner.state.lock();
            let change = state.bind_identity(user_id);
            if let IdentityChange::Rebound { .. } = change {
                self.inner.cache.purge();
                self.inner.items_tx.send_replace(state.items());
            }
            change
        };

        match change {
            IdentityChange::Unchanged => {}
            IdentityChange::Bound { epoch } => {
                tracing::info!(user_id = %user_id, collection = T::KIND.collection(), epoch, "Identity bound");
                self.inner.cancel_timer();
                self.inner.start_subscription(user_id.to_string(), epoch);
            }
            IdentityChange::Rebound { epoch, previous } => {
                tracing::info!(
                    user_id = %user_id,
                    previous = %previous,
                    collection = T::KIND.collection(),
                    epoch,
                    "Identity switched"
                );
                self.inner.cancel_timer();
                self.inner.start_subscription(user_id.to_string(), epoch);
            }
        }
    }

    /// Drop the bound identity.
    ///
    /// Empties the list, purges the local cache, stops the subscription and
    /// cancels any pending write. A write already in flight finishes but its
    /// result is ignored.
    pub fn clear_identity(&self) {
        let cleared = {
            let mut state = self.inner.state.lock();
            let cleared = state.clear_identity();
            if cleared {
                self.inner.cache.purge();
                self.inner.items_tx.send_replace(state.items());
            }
            cleared
        };

        if cleared {
            self.inner.cancel_timer();
            self.inner.stop_subscription();
            tracing::info!(collection = T::KIND.collection(), "Identity cleared");
        }
    }

    /// Write any pending changes now and wait for the result.
    pub async fn flush(&self) {
        self.inner.cancel_timer();
        self.inner.flush_pending().await;
    }

    /// Flush, then stop the subscription and timers.
    pub async fn dispose(&self) {
        self.flush().await;
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.cancel_timer();
        self.inner.stop_subscription();
        tracing::debug!(collection = T::KIND.collection(), "Controller disposed");
    }
}

impl ListController<CartItem> {
    /// Set an entry's quantity; zero removes. Returns `true` if the list
    /// changed.
    pub fn set_quantity(&self, id: &str, quantity: i64) -> bool {
        self.mutate(|state| state.set_quantity(id, quantity))
    }

    /// Sum of price times quantity.
    pub fn subtotal(&self) -> f64 {
        self.inner.state.lock().subtotal()
    }
}

impl<T: LineItem> Inner<T> {
    /// Write the list to the cache and publish it. Called with the state
    /// lock held so cache writes keep mutation order.
    fn persist(&self, state: &ListState<T>) {
        let items = state.items();
        self.cache.save(&items);
        self.items_tx.send_replace(items);
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
    }

    fn stop_subscription(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }

    fn schedule_flush(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let weak = Arc::downgrade(self);
        let delay = self.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The write runs in its own task so a later reschedule, which
            // aborts this timer, cannot cancel it half way.
            if let Some(inner) = weak.upgrade() {
                tokio::spawn(async move { inner.flush_pending().await });
            }
        });

        if let Some(previous) = self.timer.lock().replace(timer) {
            previous.abort();
        }
    }

    async fn flush_pending(&self) {
        let _gate = self.flush_gate.lock().await;

        let request = { self.state.lock().begin_flush(Utc::now()) };
        let Some(request) = request else {
            return;
        };
        let ticket = request.ticket;
        let user_id = request.write.user_id.clone();
        let count = request.write.items.len();

        let result = self.remote.upsert(&user_id, request.write).await;
        let revision = result.as_ref().ok().copied();
        let (completion, deferred) = {
            let mut state = self.state.lock();
            let completion = state.complete_flush(ticket, revision);
            let deferred = state.apply_deferred();
            if deferred.is_some_and(|outcome| outcome.changed_list()) {
                self.persist(&state);
            }
            (completion, deferred)
        };

        match (result, completion) {
            (_, FlushCompletion::Stale) => {
                tracing::debug!(
                    user_id = %user_id,
                    collection = T::KIND.collection(),
                    "Ignoring completion of a write from an earlier session"
                );
            }
            (Ok(_), FlushCompletion::Acknowledged { revision }) => {
                tracing::debug!(
                    user_id = %user_id,
                    collection = T::KIND.collection(),
                    revision,
                    items = count,
                    "Remote write acknowledged"
                );
            }
            (Err(e), _) => {
                tracing::warn!(
                    user_id = %user_id,
                    collection = T::KIND.collection(),
                    error = %e,
                    "Remote write failed; local state kept"
                );
            }
            (Ok(_), FlushCompletion::Failed) => {}
        }

        if let Some(outcome) = deferred {
            tracing::debug!(
                user_id = %user_id,
                collection = T::KIND.collection(),
                outcome = ?outcome,
                "Offered remote snapshot held back by the write"
            );
        }
    }

    fn start_subscription(self: &Arc<Self>, user_id: UserId, epoch: Epoch) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let weak = Arc::downgrade(self);
        let remote = Arc::clone(&self.remote);
        let retry = self.resubscribe_delay;

        let pump = tokio::spawn(async move {
            loop {
                let mut subscription = loop {
                    match remote.subscribe(&user_id).await {
                        Ok(subscription) => break subscription,
                        Err(e) => {
                            tracing::warn!(
                                user_id = %user_id,
                                collection = T::KIND.collection(),
                                error = %e,
                                "Failed to subscribe to remote list"
                            );
                            tokio::time::sleep(retry).await;
                        }
                    }
                };

                while let Some(snapshot) = subscription.next().await {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    inner.receive_snapshot(epoch, snapshot);
                }
                if weak.strong_count() == 0 {
                    break;
                }

                // The store ended the feed while the list is still bound.
                tracing::warn!(
                    user_id = %user_id,
                    collection = T::KIND.collection(),
                    error = %ClientError::SubscriptionClosed,
                    "Resubscribing to remote list"
                );
                tokio::time::sleep(retry).await;
            }
            tracing::debug!(user_id = %user_id, collection = T::KIND.collection(), "Subscription ended");
        });

        if let Some(previous) = self.pump.lock().replace(pump) {
            previous.abort();
        }
    }

    fn receive_snapshot(self: &Arc<Self>, epoch: Epoch, snapshot: RemoteSnapshot<T>) {
        let revision = snapshot.revision;
        let outcome = {
            let mut state = self.state.lock();
            let outcome = state.apply_snapshot(epoch, snapshot);
            if outcome.changed_list() {
                self.persist(&state);
            }
            outcome
        };

        match outcome {
            SnapshotOutcome::Applied { changed } => {
                tracing::debug!(collection = T::KIND.collection(), revision, changed, "Applied remote snapshot");
            }
            SnapshotOutcome::Merged { needs_write } => {
                tracing::debug!(
                    collection = T::KIND.collection(),
                    revision,
                    needs_write,
                    "Merged anonymous list into remote snapshot"
                );
                if needs_write {
                    self.schedule_flush();
                }
            }
            SnapshotOutcome::Suppressed(reason) => {
                tracing::debug!(
                    collection = T::KIND.collection(),
                    revision,
                    reason = %reason,
                    "Ignored remote snapshot"
                );
            }
        }
    }
}

impl<T: LineItem> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}
