//! Reconciliation between the local list and remote snapshots.
//!
//! Two decisions live here:
//!
//! 1. What to do with the anonymous list when an identity is bound
//!    ([`LoginPolicy`]).
//! 2. Whether an incoming snapshot may overwrite local state
//!    ([`SnapshotOutcome`]). The rules themselves are applied by
//!    [`ListState::apply_snapshot`](crate::ListState::apply_snapshot).

use crate::{Error, ItemList, LineItem};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happens to the anonymous list when a user signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginPolicy {
    /// The first remote snapshot replaces the anonymous list (default)
    #[default]
    Discard,
    /// The anonymous list is folded into the first remote snapshot
    Merge,
}

impl FromStr for LoginPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discard" => Ok(LoginPolicy::Discard),
            "merge" => Ok(LoginPolicy::Merge),
            _ => Err(Error::UnknownLoginPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for LoginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginPolicy::Discard => f.write_str("discard"),
            LoginPolicy::Merge => f.write_str("merge"),
        }
    }
}

/// Why a snapshot was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Suppression {
    /// Delivered for an identity session that has since ended
    StaleSession,
    /// A local write is on its way to the store
    WriteInFlight,
    /// Local mutations happened that no write has carried yet
    PendingLocalChanges,
    /// Older than a write the store already acknowledged
    OutdatedRevision,
}

impl fmt::Display for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Suppression::StaleSession => "stale session",
            Suppression::WriteInFlight => "write in flight",
            Suppression::PendingLocalChanges => "pending local changes",
            Suppression::OutdatedRevision => "outdated revision",
        };
        f.write_str(reason)
    }
}

/// Result of offering a remote snapshot to a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotOutcome {
    /// The snapshot replaced the local list
    Applied { changed: bool },
    /// The first snapshot after sign-in was merged with the anonymous list
    Merged { needs_write: bool },
    /// The snapshot was ignored
    Suppressed(Suppression),
}

impl SnapshotOutcome {
    /// Whether the local list may have changed.
    pub fn changed_list(&self) -> bool {
        match self {
            SnapshotOutcome::Applied { changed } => *changed,
            SnapshotOutcome::Merged { .. } => true,
            SnapshotOutcome::Suppressed(_) => false,
        }
    }
}

/// Merge a local list into a remote one.
///
/// Remote entries keep their order and come first; local entries follow.
/// Entries with the same id are folded with the item's add rule, so cart
/// quantities are summed and clamped and wishlist entries are unioned.
pub fn merge_lists<T: LineItem>(remote: &[T], local: &[T]) -> ItemList<T> {
    ItemList::from_items(remote.iter().chain(local.iter()).cloned())
}
