//! # Tote Engine
//!
//! Deterministic reconciliation logic for local-first carts and wishlists.
//!
//! A storefront keeps each user's cart and wishlist in three places: an
//! in-memory list, a durable local cache, and a remote document store. This
//! crate holds the logic that keeps them consistent; the runtime that
//! performs the actual cache writes, timers and network calls lives in
//! `tote-client`.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches files, network or clocks; time is
//!   passed in
//! - **Deterministic**: the same calls always produce the same state
//! - **Never fails on mutation**: invalid quantities are clamped, unknown
//!   ids are no-ops
//!
//! ## Core Concepts
//!
//! ### Line items
//!
//! [`CartItem`] and [`WishlistItem`] both implement [`LineItem`]. An item's
//! id is derived from its product id and variant, so adding the same
//! product twice folds into one entry. Cart quantities stay within
//! `[MIN_QUANTITY, MAX_QUANTITY]`.
//!
//! ### Lists
//!
//! [`ItemList`] is an ordered, deduplicated, copy-on-write list. Every
//! change installs a new `Arc`, so holders of an older snapshot are never
//! affected and change detection is a pointer comparison.
//!
//! ### State machine
//!
//! [`ListState`] tracks the [`Phase`] of a list, decides when a remote write
//! is due ([`FlushRequest`]) and whether a remote snapshot may overwrite
//! local state ([`SnapshotOutcome`]). Echoes of in-flight writes are
//! suppressed by comparing write generations and identity epochs.
//!
//! ## Quick Start
//!
//! ```rust
//! use tote_engine::{
//!     CartItem, IdentityChange, ListState, LoginPolicy, ProductSnapshot, RemoteSnapshot,
//! };
//!
//! let mut cart: ListState<CartItem> = ListState::new(LoginPolicy::Discard);
//! cart.bootstrap(None);
//!
//! let shirt = ProductSnapshot::new("p1", "Linen Shirt", 49.0, "/img/p1.jpg");
//! cart.add(CartItem::new(shirt.clone(), "M", 1));
//! cart.add(CartItem::new(shirt, "M", 20));
//! assert_eq!(cart.list().get("p1-M").unwrap().quantity, 15);
//!
//! // Sign in; the first snapshot from the store decides the contents.
//! let IdentityChange::Bound { epoch } = cart.bind_identity("user-1") else {
//!     unreachable!()
//! };
//! cart.apply_snapshot(epoch, RemoteSnapshot::new(Vec::new(), 0));
//! assert!(cart.list().is_empty());
//! ```

pub mod codec;
pub mod document;
pub mod error;
pub mod generation;
pub mod item;
pub mod list;
pub mod order;
pub mod reconcile;
pub mod state;

// Re-export main types at crate root
pub use codec::{decode_items, encode_items, normalize_items_value};
pub use document::{ListDocument, ListKind, ListWrite, RemoteSnapshot};
pub use error::Error;
pub use generation::{Counter, WriteTicket};
pub use item::{
    clamp_quantity, line_item_id, CartItem, LineItem, ProductSnapshot, WishlistItem,
    ID_SEPARATOR, MAX_QUANTITY, MIN_QUANTITY,
};
pub use list::ItemList;
pub use order::{Order, OrderDraft, OrderStatus};
pub use reconcile::{merge_lists, LoginPolicy, SnapshotOutcome, Suppression};
pub use state::{FlushCompletion, FlushRequest, IdentityChange, ListState, Phase};

/// Type aliases for clarity
pub type UserId = String;
pub type ItemId = String;
pub type ProductId = String;
pub type Revision = u64;
pub type Generation = u64;
pub type Epoch = u64;
