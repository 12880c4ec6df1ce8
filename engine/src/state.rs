//! Per-list reconciliation state machine.
//!
//! [`ListState`] owns the authoritative in-memory list of one kind and
//! decides, without doing any IO itself, when the list must be written to
//! the remote store and whether a remote snapshot may overwrite it. The
//! runtime around it performs the cache writes, timers and network calls
//! and reports back.
//!
//! # Phases
//!
//! ```text
//! Bootstrapping --bootstrap--> Anonymous --bind--> AuthenticatedIdle
//!                                  ^                  |        ^
//!                                  |               mutate   write done
//!                                  |                  v        |
//!                                  +----clear---- AuthenticatedSyncing
//! ```
//!
//! # Echo suppression
//!
//! A snapshot overwrites local state only if it belongs to the current
//! identity epoch, no write is in flight, no mutation is newer than the last
//! flushed generation, and its revision is not older than the last
//! acknowledged write.
//!
//! The newest snapshot suppressed while a write is in flight is kept. Once
//! the write completes, [`ListState::apply_deferred`] offers it again, so a
//! write from another device landing between our write and its
//! acknowledgement is not lost.

use crate::generation::{Counter, WriteTicket};
use crate::reconcile::{merge_lists, LoginPolicy, SnapshotOutcome, Suppression};
use crate::{
    CartItem, Epoch, Generation, ItemList, LineItem, ListWrite, RemoteSnapshot, Revision, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle phase of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// The local cache has not been read yet
    Bootstrapping,
    /// No identity; changes reach only the local cache
    Anonymous,
    /// Identity bound, nothing waiting to be written
    AuthenticatedIdle,
    /// Identity bound, a write is pending or in flight
    AuthenticatedSyncing,
}

impl Phase {
    /// Whether an identity is bound.
    pub fn is_authenticated(self) -> bool {
        matches!(self, Phase::AuthenticatedIdle | Phase::AuthenticatedSyncing)
    }
}

/// Result of binding an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    /// The same identity was already bound
    Unchanged,
    /// An identity was bound; subscribe with this epoch
    Bound { epoch: Epoch },
    /// A different identity was replaced; the local cache must be purged
    /// before subscribing with this epoch
    Rebound { epoch: Epoch, previous: UserId },
}

/// A remote write the runtime should perform.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushRequest<T> {
    /// Report this back through [`ListState::complete_flush`]
    pub ticket: WriteTicket,
    /// Merge upsert body
    pub write: ListWrite<T>,
}

/// Result of reporting a finished write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlushCompletion {
    /// The store accepted the write
    Acknowledged { revision: Revision },
    /// The write failed; nothing is rolled back or retried
    Failed,
    /// The write belonged to an earlier identity session or was superseded
    Stale,
}

/// The state of one cart or wishlist.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    phase: Phase,
    policy: LoginPolicy,
    list: ItemList<T>,
    user: Option<UserId>,
    /// Ticks on every identity change
    epoch: Counter,
    /// Ticks on every effective local mutation
    generation: Counter,
    /// Highest generation handed to a write (or adopted from the store)
    flushed: Generation,
    in_flight: Option<WriteTicket>,
    acked_revision: Revision,
    awaiting_first_snapshot: bool,
    /// Newest snapshot that arrived while a write was in flight
    deferred: Option<RemoteSnapshot<T>>,
}

impl<T: LineItem> ListState<T> {
    /// Create a list waiting to be bootstrapped.
    pub fn new(policy: LoginPolicy) -> Self {
        Self {
            phase: Phase::Bootstrapping,
            policy,
            list: ItemList::new(),
            user: None,
            epoch: Counter::new(),
            generation: Counter::new(),
            flushed: 0,
            in_flight: None,
            acked_revision: 0,
            awaiting_first_snapshot: false,
            deferred: None,
        }
    }

    /// Adopt the cached list, if any.
    ///
    /// Runs once; later calls return `false` and change nothing.
    pub fn bootstrap(&mut self, cached: Option<ItemList<T>>) -> bool {
        if self.phase != Phase::Bootstrapping {
            return false;
        }
        if let Some(cached) = cached {
            self.list = cached;
        }
        self.phase = Phase::Anonymous;
        true
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Guest-to-member policy.
    pub fn policy(&self) -> LoginPolicy {
        self.policy
    }

    /// Bound identity, if any.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Current identity epoch.
    pub fn epoch(&self) -> Epoch {
        self.epoch.get()
    }

    /// Current local generation.
    pub fn generation(&self) -> Generation {
        self.generation.get()
    }

    /// The write currently on its way to the store.
    pub fn in_flight(&self) -> Option<WriteTicket> {
        self.in_flight
    }

    /// Highest revision the store acknowledged in this session.
    pub fn acked_revision(&self) -> Revision {
        self.acked_revision
    }

    /// Revision of the snapshot held back by an in-flight write, if any.
    pub fn deferred_revision(&self) -> Option<Revision> {
        self.deferred.as_ref().map(|snapshot| snapshot.revision)
    }

    /// Whether the first snapshot of this session is still outstanding.
    pub fn awaiting_first_snapshot(&self) -> bool {
        self.awaiting_first_snapshot
    }

    /// The list.
    pub fn list(&self) -> &ItemList<T> {
        &self.list
    }

    /// Shared snapshot of the current items.
    pub fn items(&self) -> Arc<Vec<T>> {
        self.list.snapshot()
    }

    /// True if any entry refers to `product_id`.
    pub fn contains(&self, product_id: &str) -> bool {
        self.list.contains(product_id)
    }

    /// Whether local mutations exist that no write has carried yet.
    pub fn is_dirty(&self) -> bool {
        self.phase.is_authenticated() && self.generation.get() > self.flushed
    }

    /// Whether a write should be started now.
    pub fn needs_flush(&self) -> bool {
        self.is_dirty() && self.in_flight.is_none() && !self.awaiting_first_snapshot
    }

    /// Bind an identity.
    ///
    /// Binding a different identity than the current one first performs
    /// the clear transition.
    pub fn bind_identity(&mut self, user: impl Into<UserId>) -> IdentityChange {
        let user = user.into();
        if self.user.as_deref() == Some(user.as_str()) {
            return IdentityChange::Unchanged;
        }

        let previous = self.user.take();
        if previous.is_some() {
            self.clear_identity();
        }

        self.user = Some(user);
        let epoch = self.epoch.tick();
        // Anonymous edits are not owed to the store; the first snapshot
        // decides what happens to them.
        self.flushed = self.generation.get();
        self.in_flight = None;
        self.acked_revision = 0;
        self.awaiting_first_snapshot = true;
        self.deferred = None;
        self.phase = Phase::AuthenticatedIdle;

        match previous {
            Some(previous) => IdentityChange::Rebound { epoch, previous },
            None => IdentityChange::Bound { epoch },
        }
    }

    /// Clear the bound identity and empty the list.
    ///
    /// Returns `false` if no identity was bound.
    pub fn clear_identity(&mut self) -> bool {
        if !self.phase.is_authenticated() && self.user.is_none() {
            return false;
        }
        self.user = None;
        self.epoch.tick();
        self.list.clear();
        self.generation.tick();
        self.flushed = self.generation.get();
        self.in_flight = None;
        self.acked_revision = 0;
        self.awaiting_first_snapshot = false;
        self.deferred = None;
        self.phase = Phase::Anonymous;
        true
    }

    /// Add an item. Returns `true` if the list changed.
    pub fn add(&mut self, item: T) -> bool {
        let changed = self.list.add(item);
        self.record_mutation(changed)
    }

    /// Remove an item by id. Returns `true` if the list changed.
    pub fn remove(&mut self, id: &str) -> bool {
        let changed = self.list.remove(id);
        self.record_mutation(changed)
    }

    /// Empty the list. Returns `true` if the list changed.
    pub fn clear(&mut self) -> bool {
        let changed = self.list.clear();
        self.record_mutation(changed)
    }

    fn record_mutation(&mut self, changed: bool) -> bool {
        if changed {
            self.generation.tick();
            self.refresh_phase();
        }
        changed
    }

    fn refresh_phase(&mut self) {
        if !self.phase.is_authenticated() {
            return;
        }
        self.phase = if self.in_flight.is_some() || self.is_dirty() {
            Phase::AuthenticatedSyncing
        } else {
            Phase::AuthenticatedIdle
        };
    }

    /// Start a remote write of the whole list, if one is due.
    pub fn begin_flush(&mut self, now: DateTime<Utc>) -> Option<FlushRequest<T>> {
        if !self.needs_flush() {
            return None;
        }
        let user = self.user.clone()?;

        let ticket = WriteTicket::new(self.epoch.get(), self.generation.get());
        self.flushed = ticket.generation;
        self.in_flight = Some(ticket);
        self.phase = Phase::AuthenticatedSyncing;

        Some(FlushRequest {
            ticket,
            write: ListWrite::new(user, self.list.items().to_vec(), now),
        })
    }

    /// Report the result of a write started by [`begin_flush`](Self::begin_flush).
    pub fn complete_flush(
        &mut self,
        ticket: WriteTicket,
        revision: Option<Revision>,
    ) -> FlushCompletion {
        if ticket.is_stale(self.epoch.get()) || self.in_flight != Some(ticket) {
            return FlushCompletion::Stale;
        }

        self.in_flight = None;
        self.refresh_phase();

        match revision {
            Some(revision) => {
                self.acked_revision = self.acked_revision.max(revision);
                FlushCompletion::Acknowledged { revision }
            }
            None => FlushCompletion::Failed,
        }
    }

    /// Offer a remote snapshot delivered for `epoch`.
    pub fn apply_snapshot(&mut self, epoch: Epoch, snapshot: RemoteSnapshot<T>) -> SnapshotOutcome {
        if !self.phase.is_authenticated() || epoch != self.epoch.get() {
            return SnapshotOutcome::Suppressed(Suppression::StaleSession);
        }

        if self.awaiting_first_snapshot {
            return self.apply_first_snapshot(snapshot);
        }

        if self.in_flight.is_some() {
            let newer = self
                .deferred
                .as_ref()
                .map_or(true, |held| snapshot.revision >= held.revision);
            if newer {
                self.deferred = Some(snapshot);
            }
            return SnapshotOutcome::Suppressed(Suppression::WriteInFlight);
        }
        if self.is_dirty() {
            return SnapshotOutcome::Suppressed(Suppression::PendingLocalChanges);
        }
        if snapshot.revision < self.acked_revision {
            return SnapshotOutcome::Suppressed(Suppression::OutdatedRevision);
        }

        self.acked_revision = self.acked_revision.max(snapshot.revision);
        self.deferred = None;
        let changed = self.list.replace(snapshot.items);
        if changed {
            // Remote content counts as already flushed.
            self.generation.tick();
            self.flushed = self.generation.get();
        }
        self.refresh_phase();
        SnapshotOutcome::Applied { changed }
    }

    /// Offer the snapshot held back by the last in-flight write.
    ///
    /// Call after [`complete_flush`](Self::complete_flush). Returns `None`
    /// if nothing was held back; otherwise the held snapshot goes through
    /// the usual checks, so it is dropped again if it is older than the
    /// acknowledged write or local changes are pending.
    pub fn apply_deferred(&mut self) -> Option<SnapshotOutcome> {
        if self.in_flight.is_some() {
            return None;
        }
        let snapshot = self.deferred.take()?;
        Some(self.apply_snapshot(self.epoch.get(), snapshot))
    }

    fn apply_first_snapshot(&mut self, snapshot: RemoteSnapshot<T>) -> SnapshotOutcome {
        self.awaiting_first_snapshot = false;
        self.acked_revision = snapshot.revision;

        let outcome = match self.policy {
            LoginPolicy::Discard => {
                let changed = self.list.replace(snapshot.items);
                self.generation.tick();
                self.flushed = self.generation.get();
                SnapshotOutcome::Applied { changed }
            }
            LoginPolicy::Merge => {
                let remote = ItemList::from_items(snapshot.items);
                let merged = merge_lists(remote.items(), self.list.items());
                let needs_write = merged.items() != remote.items();
                self.list.replace(merged.items().iter().cloned());
                self.generation.tick();
                if !needs_write {
                    self.flushed = self.generation.get();
                }
                SnapshotOutcome::Merged { needs_write }
            }
        };
        self.refresh_phase();
        outcome
    }
}

impl ListState<CartItem> {
    /// Set a cart quantity; zero removes. Returns `true` if the list changed.
    pub fn set_quantity(&mut self, id: &str, quantity: i64) -> bool {
        let changed = self.list.set_quantity(id, quantity);
        self.record_mutation(changed)
    }

    /// Sum of price times quantity.
    pub fn subtotal(&self) -> f64 {
        self.list.subtotal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProductSnapshot, WishlistItem};

    fn item(product_id: &str, size: &str, quantity: i64) -> CartItem {
        CartItem::new(
            ProductSnapshot::new(product_id, "Item", 10.0, ""),
            size,
            quantity,
        )
    }

    fn anonymous() -> ListState<CartItem> {
        let mut state = ListState::new(LoginPolicy::Discard);
        state.bootstrap(None);
        state
    }

    fn signed_in(user: &str) -> (ListState<CartItem>, Epoch) {
        let mut state = anonymous();
        let IdentityChange::Bound { epoch } = state.bind_identity(user) else {
            panic!("expected a fresh binding");
        };
        let outcome = state.apply_snapshot(epoch, RemoteSnapshot::new(Vec::new(), 0));
        assert_eq!(outcome, SnapshotOutcome::Applied { changed: false });
        (state, epoch)
    }

    #[test]
    fn bootstrap_runs_once() {
        let mut state: ListState<CartItem> = ListState::new(LoginPolicy::Discard);
        assert_eq!(state.phase(), Phase::Bootstrapping);

        let cached = ItemList::from_items(vec![item("p1", "M", 2)]);
        assert!(state.bootstrap(Some(cached)));
        assert_eq!(state.phase(), Phase::Anonymous);
        assert_eq!(state.list().len(), 1);

        assert!(!state.bootstrap(Some(ItemList::new())));
        assert_eq!(state.list().len(), 1);
    }

    #[test]
    fn anonymous_mutations_never_flush() {
        let mut state = anonymous();
        assert!(state.add(item("p1", "M", 1)));
        assert!(!state.is_dirty());
        assert!(state.begin_flush(Utc::now()).is_none());
        assert_eq!(state.phase(), Phase::Anonymous);
    }

    #[test]
    fn mutation_moves_to_syncing_and_flush_returns_to_idle() {
        let (mut state, _) = signed_in("u1");
        assert_eq!(state.phase(), Phase::AuthenticatedIdle);

        state.add(item("p1", "M", 1));
        assert_eq!(state.phase(), Phase::AuthenticatedSyncing);

        let request = state.begin_flush(Utc::now()).unwrap();
        assert_eq!(request.write.user_id, "u1");
        assert_eq!(request.write.items.len(), 1);
        assert_eq!(state.phase(), Phase::AuthenticatedSyncing);

        let done = state.complete_flush(request.ticket, Some(1));
        assert_eq!(done, FlushCompletion::Acknowledged { revision: 1 });
        assert_eq!(state.phase(), Phase::AuthenticatedIdle);
    }

    #[test]
    fn failed_write_returns_to_idle_without_rollback() {
        let (mut state, _) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let request = state.begin_flush(Utc::now()).unwrap();

        assert_eq!(
            state.complete_flush(request.ticket, None),
            FlushCompletion::Failed
        );
        assert_eq!(state.phase(), Phase::AuthenticatedIdle);
        assert_eq!(state.list().len(), 1);
        assert!(!state.needs_flush());
    }

    #[test]
    fn noop_mutation_does_not_dirty() {
        let (mut state, _) = signed_in("u1");
        assert!(!state.remove("ghost"));
        assert!(!state.set_quantity("ghost", 3));
        assert!(!state.is_dirty());
        assert_eq!(state.phase(), Phase::AuthenticatedIdle);
    }

    #[test]
    fn only_one_write_in_flight() {
        let (mut state, _) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let first = state.begin_flush(Utc::now()).unwrap();

        state.add(item("p2", "M", 1));
        assert!(state.is_dirty());
        assert!(state.begin_flush(Utc::now()).is_none());

        state.complete_flush(first.ticket, Some(1));
        assert_eq!(state.phase(), Phase::AuthenticatedSyncing);
        let second = state.begin_flush(Utc::now()).unwrap();
        assert_eq!(second.write.items.len(), 2);
    }

    #[test]
    fn snapshot_during_write_is_suppressed() {
        let (mut state, epoch) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let request = state.begin_flush(Utc::now()).unwrap();

        let outcome = state.apply_snapshot(epoch, RemoteSnapshot::new(Vec::new(), 7));
        assert_eq!(
            outcome,
            SnapshotOutcome::Suppressed(Suppression::WriteInFlight)
        );
        assert_eq!(state.list().len(), 1);

        state.complete_flush(request.ticket, Some(8));
        let remote = vec![item("p9", "S", 2)];
        let outcome = state.apply_snapshot(epoch, RemoteSnapshot::new(remote.clone(), 9));
        assert_eq!(outcome, SnapshotOutcome::Applied { changed: true });
        assert_eq!(state.list().items(), remote.as_slice());
    }

    #[test]
    fn remote_write_behind_our_write_is_applied_after_ack() {
        let (mut state, epoch) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let request = state.begin_flush(Utc::now()).unwrap();

        // Our write lands as revision 1, another device writes revision 2,
        // then our acknowledgement arrives.
        let ours = RemoteSnapshot::new(request.write.items.clone(), 1);
        let theirs = RemoteSnapshot::new(vec![item("p2", "S", 1)], 2);
        state.apply_snapshot(epoch, theirs.clone());
        state.apply_snapshot(epoch, ours);
        assert_eq!(state.deferred_revision(), Some(2));

        state.complete_flush(request.ticket, Some(1));
        assert_eq!(
            state.apply_deferred(),
            Some(SnapshotOutcome::Applied { changed: true })
        );
        assert_eq!(state.list().items(), theirs.items.as_slice());
        assert_eq!(state.acked_revision(), 2);
        assert!(!state.needs_flush());
        assert_eq!(state.apply_deferred(), None);
    }

    #[test]
    fn deferred_echo_of_own_write_changes_nothing() {
        let (mut state, epoch) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let request = state.begin_flush(Utc::now()).unwrap();

        state.apply_snapshot(epoch, RemoteSnapshot::new(Vec::new(), 3));
        state.complete_flush(request.ticket, Some(4));
        assert_eq!(
            state.apply_deferred(),
            Some(SnapshotOutcome::Suppressed(Suppression::OutdatedRevision))
        );
        assert_eq!(state.list().len(), 1);
    }

    #[test]
    fn deferred_snapshot_yields_to_newer_local_changes() {
        let (mut state, epoch) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let request = state.begin_flush(Utc::now()).unwrap();

        state.apply_snapshot(epoch, RemoteSnapshot::new(vec![item("p2", "S", 1)], 2));
        state.add(item("p3", "L", 1));
        state.complete_flush(request.ticket, Some(1));

        assert_eq!(
            state.apply_deferred(),
            Some(SnapshotOutcome::Suppressed(Suppression::PendingLocalChanges))
        );
        assert_eq!(state.list().len(), 2);
        assert!(state.needs_flush());
    }

    #[test]
    fn identity_change_drops_deferred_snapshot() {
        let (mut state, epoch) = signed_in("u1");
        state.add(item("p1", "M", 1));
        state.begin_flush(Utc::now()).unwrap();
        state.apply_snapshot(epoch, RemoteSnapshot::new(vec![item("p2", "S", 1)], 2));

        state.clear_identity();
        assert_eq!(state.deferred_revision(), None);
        assert_eq!(state.apply_deferred(), None);
    }

    #[test]
    fn snapshot_with_pending_changes_is_suppressed() {
        let (mut state, epoch) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let outcome = state.apply_snapshot(epoch, RemoteSnapshot::new(Vec::new(), 3));
        assert_eq!(
            outcome,
            SnapshotOutcome::Suppressed(Suppression::PendingLocalChanges)
        );
    }

    #[test]
    fn outdated_snapshot_is_suppressed() {
        let (mut state, epoch) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let request = state.begin_flush(Utc::now()).unwrap();
        state.complete_flush(request.ticket, Some(5));

        let outcome = state.apply_snapshot(epoch, RemoteSnapshot::new(Vec::new(), 4));
        assert_eq!(
            outcome,
            SnapshotOutcome::Suppressed(Suppression::OutdatedRevision)
        );

        // The echo of our own write is accepted and changes nothing.
        let echo = RemoteSnapshot::new(state.list().items().to_vec(), 5);
        assert_eq!(
            state.apply_snapshot(epoch, echo),
            SnapshotOutcome::Applied { changed: false }
        );
    }

    #[test]
    fn clear_identity_empties_and_resets() {
        let (mut state, _) = signed_in("u1");
        state.add(item("p1", "M", 1));
        assert!(state.clear_identity());
        assert_eq!(state.phase(), Phase::Anonymous);
        assert!(state.list().is_empty());
        assert!(state.user().is_none());
        assert!(!state.clear_identity());
    }

    #[test]
    fn stale_completion_after_relogin_is_ignored() {
        let (mut state, old_epoch) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let request = state.begin_flush(Utc::now()).unwrap();

        state.clear_identity();
        let IdentityChange::Bound { epoch } = state.bind_identity("u1") else {
            panic!("expected a fresh binding");
        };
        assert_ne!(epoch, old_epoch);

        assert_eq!(
            state.complete_flush(request.ticket, Some(1)),
            FlushCompletion::Stale
        );
        assert_eq!(
            state.apply_snapshot(old_epoch, RemoteSnapshot::new(vec![item("p1", "M", 1)], 1)),
            SnapshotOutcome::Suppressed(Suppression::StaleSession)
        );
        assert!(state.list().is_empty());
        assert!(state.awaiting_first_snapshot());
    }

    #[test]
    fn rebinding_other_user_clears_first() {
        let (mut state, _) = signed_in("u1");
        state.add(item("p1", "M", 1));
        let change = state.bind_identity("u2");
        assert!(matches!(
            change,
            IdentityChange::Rebound { ref previous, .. } if previous == "u1"
        ));
        assert!(state.list().is_empty());
        assert_eq!(state.user(), Some("u2"));
        assert_eq!(state.bind_identity("u2"), IdentityChange::Unchanged);
    }

    #[test]
    fn discard_policy_replaces_anonymous_list() {
        let mut state = anonymous();
        state.add(item("p1", "M", 1));
        state.add(item("p2", "L", 1));

        let IdentityChange::Bound { epoch } = state.bind_identity("u1") else {
            panic!("expected a fresh binding");
        };
        // No write goes out before the store has spoken.
        assert!(state.begin_flush(Utc::now()).is_none());

        let outcome = state.apply_snapshot(epoch, RemoteSnapshot::new(Vec::new(), 0));
        assert_eq!(outcome, SnapshotOutcome::Applied { changed: true });
        assert!(state.list().is_empty());
        assert_eq!(state.phase(), Phase::AuthenticatedIdle);
    }

    #[test]
    fn merge_policy_folds_anonymous_list() {
        let mut state = ListState::new(LoginPolicy::Merge);
        state.bootstrap(None);
        state.add(item("p1", "M", 2));

        let IdentityChange::Bound { epoch } = state.bind_identity("u1") else {
            panic!("expected a fresh binding");
        };
        let remote = vec![item("p1", "M", 1), item("p7", "S", 1)];
        let outcome = state.apply_snapshot(epoch, RemoteSnapshot::new(remote, 4));
        assert_eq!(outcome, SnapshotOutcome::Merged { needs_write: true });
        assert_eq!(state.list().get("p1-M").unwrap().quantity, 3);
        assert_eq!(state.list().len(), 2);

        let request = state.begin_flush(Utc::now()).unwrap();
        assert_eq!(request.write.items.len(), 2);
    }

    #[test]
    fn merge_policy_without_local_items_needs_no_write() {
        let mut state: ListState<WishlistItem> = ListState::new(LoginPolicy::Merge);
        state.bootstrap(None);
        let IdentityChange::Bound { epoch } = state.bind_identity("u1") else {
            panic!("expected a fresh binding");
        };
        let remote = vec![WishlistItem::new(ProductSnapshot::new("p1", "A", 1.0, ""))];
        let outcome = state.apply_snapshot(epoch, RemoteSnapshot::new(remote, 2));
        assert_eq!(outcome, SnapshotOutcome::Merged { needs_write: false });
        assert!(!state.needs_flush());
        assert_eq!(state.phase(), Phase::AuthenticatedIdle);
    }

    #[test]
    fn snapshot_while_anonymous_is_ignored() {
        let mut state = anonymous();
        let outcome = state.apply_snapshot(0, RemoteSnapshot::new(vec![item("p1", "M", 1)], 1));
        assert_eq!(
            outcome,
            SnapshotOutcome::Suppressed(Suppression::StaleSession)
        );
        assert!(state.list().is_empty());
    }
}
