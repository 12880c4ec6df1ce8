//! # Tote Client
//!
//! Local-first cart and wishlist controllers for storefront clients.
//!
//! Reads and writes hit an in-memory list and a local cache synchronously.
//! Once a user is signed in, changes are written to a remote document store
//! after a quiet period, and remote changes made on other devices flow back
//! in through a subscription. The reconciliation rules come from
//! [`tote_engine`]; this crate supplies the runtime around them.
//!
//! ## Components
//!
//! - [`ListController`]: one cart or wishlist
//! - [`StorefrontSession`]: both lists bound to one [`IdentitySignal`], plus
//!   checkout
//! - [`LocalCache`]: [`MemoryCache`] or [`FileCache`]
//! - [`RemoteStore`]: [`MemoryRemoteStore`] or [`HttpRemoteStore`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tote_client::{
//!     ListCache, ListController, MemoryCache, MemoryRemoteStore, SyncConfig,
//! };
//! use tote_engine::{CartItem, ProductSnapshot};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = SyncConfig::default();
//! let cart: ListController<CartItem> = ListController::new(
//!     ListCache::new(MemoryCache::new_shared()),
//!     MemoryRemoteStore::<CartItem>::new_shared(),
//!     &config,
//! );
//!
//! let tee = ProductSnapshot::new("p1", "Tee", 20.0, "/img/p1.jpg");
//! cart.add(CartItem::new(tee, "M", 2));
//! assert_eq!(cart.subtotal(), 40.0);
//!
//! cart.bind_identity("user-1");
//! cart.dispose().await;
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod identity;
pub mod remote;
pub mod session;

pub use cache::{FileCache, ListCache, LocalCache, MemoryCache};
pub use config::{ConfigError, SyncConfig};
pub use controller::ListController;
pub use error::{ClientError, Result};
pub use http::HttpRemoteStore;
pub use identity::IdentitySignal;
pub use remote::{MemoryRemoteStore, RemoteStore, Subscription};
pub use session::StorefrontSession;
