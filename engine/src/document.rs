//! Remote document types.
//!
//! The remote store holds one document per user per list kind. Writes
//! replace `items`, `userId` and `updatedAt` as a whole (last writer wins);
//! the store assigns a monotonically increasing `revision` per document.

use crate::{error::Result, Error, Revision, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two kinds of per-user list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Cart,
    Wishlist,
}

impl ListKind {
    /// All list kinds.
    pub const ALL: [ListKind; 2] = [ListKind::Cart, ListKind::Wishlist];

    /// Name of the remote collection holding documents of this kind.
    pub fn collection(self) -> &'static str {
        match self {
            ListKind::Cart => "carts",
            ListKind::Wishlist => "wishlists",
        }
    }

    /// Key of the local cache slot for this kind.
    pub fn cache_key(self) -> &'static str {
        match self {
            ListKind::Cart => "cart",
            ListKind::Wishlist => "wishlist",
        }
    }

    /// Look a kind up by its remote collection name.
    pub fn from_collection(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.collection() == name)
            .ok_or_else(|| Error::UnknownListKind(name.to_string()))
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_key())
    }
}

impl FromStr for ListKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cart" => Ok(ListKind::Cart),
            "wishlist" => Ok(ListKind::Wishlist),
            other => Err(Error::UnknownListKind(other.to_string())),
        }
    }
}

/// A list document as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocument<T> {
    pub items: Vec<T>,
    pub user_id: UserId,
    pub updated_at: DateTime<Utc>,
    /// 0 for a document that has never been written.
    #[serde(default)]
    pub revision: Revision,
}

impl<T> ListDocument<T> {
    /// The placeholder for a user who has no document yet.
    pub fn empty(user_id: impl Into<UserId>) -> Self {
        Self {
            items: Vec::new(),
            user_id: user_id.into(),
            updated_at: DateTime::<Utc>::default(),
            revision: 0,
        }
    }

    /// Whether this document has ever been written.
    pub fn exists(&self) -> bool {
        self.revision > 0
    }

    /// The snapshot a subscriber receives for this document.
    pub fn to_snapshot(&self) -> RemoteSnapshot<T>
    where
        T: Clone,
    {
        RemoteSnapshot {
            items: self.items.clone(),
            revision: self.revision,
        }
    }
}

/// The body of a merge upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWrite<T> {
    pub items: Vec<T>,
    pub user_id: UserId,
    pub updated_at: DateTime<Utc>,
}

impl<T> ListWrite<T> {
    /// Build a write for a user.
    pub fn new(user_id: impl Into<UserId>, items: Vec<T>, updated_at: DateTime<Utc>) -> Self {
        Self {
            items,
            user_id: user_id.into(),
            updated_at,
        }
    }

    /// Apply this write on top of an existing document (or none).
    ///
    /// Fields carried by the write replace the stored ones; the revision is
    /// bumped.
    pub fn apply_to(self, existing: Option<&ListDocument<T>>) -> ListDocument<T> {
        let revision = existing.map_or(0, |doc| doc.revision) + 1;
        ListDocument {
            items: self.items,
            user_id: self.user_id,
            updated_at: self.updated_at,
            revision,
        }
    }
}

/// A push notification from a remote subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot<T> {
    pub items: Vec<T>,
    pub revision: Revision,
}

impl<T> RemoteSnapshot<T> {
    /// Create a snapshot.
    pub fn new(items: Vec<T>, revision: Revision) -> Self {
        Self { items, revision }
    }
}
