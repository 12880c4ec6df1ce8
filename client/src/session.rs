//! Storefront session context.
//!
//! A [`StorefrontSession`] is built once at application start and passed
//! to whatever needs the cart or the wishlist. It keeps both lists bound to
//! the same identity and implements checkout on top of the cart.

use std::future::Future;
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tote_engine::{CartItem, Order, OrderDraft, UserId, WishlistItem};

use crate::cache::{FileCache, ListCache, LocalCache, MemoryCache};
use crate::config::SyncConfig;
use crate::controller::ListController;
use crate::error::{ClientError, Result};
use crate::http::HttpRemoteStore;
use crate::identity::IdentitySignal;
use crate::remote::{MemoryRemoteStore, RemoteStore};

/// Cart and wishlist of one storefront client.
pub struct StorefrontSession {
    inner: Arc<SessionInner>,
    follower: Mutex<Option<JoinHandle<()>>>,
}

struct SessionInner {
    cart: ListController<CartItem>,
    wishlist: ListController<WishlistItem>,
    identity: IdentitySignal,
    /// Serializes identity transitions across both lists.
    transition: Mutex<()>,
}

impl SessionInner {
    /// Bring both lists in line with the latest identity.
    fn sync_identity(&self) {
        let _transition = self.transition.lock();
        match self.identity.current() {
            Some(user) => {
                self.cart.bind_identity(&user);
                self.wishlist.bind_identity(&user);
            }
            None => {
                self.cart.clear_identity();
                self.wishlist.clear_identity();
            }
        }
    }
}

impl StorefrontSession {
    /// Assemble a session and start following `identity`.
    pub fn new(
        cart: ListController<CartItem>,
        wishlist: ListController<WishlistItem>,
        identity: IdentitySignal,
    ) -> Self {
        let inner = Arc::new(SessionInner {
            cart,
            wishlist,
            identity,
            transition: Mutex::new(()),
        });

        let weak: Weak<SessionInner> = Arc::downgrade(&inner);
        let follower = inner.identity.follow(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.sync_identity();
            }
        });

        Self {
            inner,
            follower: Mutex::new(Some(follower)),
        }
    }

    /// Build a session from configuration.
    ///
    /// Uses a file cache when a cache directory is configured and the HTTP
    /// document service when a remote URL is; in-process stores otherwise.
    pub fn from_config(config: &SyncConfig, identity: IdentitySignal) -> Result<Self> {
        let cache: Arc<dyn LocalCache> = match &config.cache_dir {
            Some(dir) => Arc::new(FileCache::open(dir)?),
            None => MemoryCache::new_shared(),
        };

        let (carts, wishlists): (
            Arc<dyn RemoteStore<CartItem>>,
            Arc<dyn RemoteStore<WishlistItem>>,
        ) = match &config.remote_url {
            Some(url) => {
                let store = HttpRemoteStore::new(url)?
                    .with_retry(config.watch_retry)
                    .with_identity(identity.clone(), config.auth_secret.clone());
                (Arc::new(store.clone()), Arc::new(store))
            }
            None => {
                tracing::warn!("No remote URL configured; lists sync with an in-process store");
                (
                    MemoryRemoteStore::<CartItem>::new_shared(),
                    MemoryRemoteStore::<WishlistItem>::new_shared(),
                )
            }
        };

        let cart = ListController::new(ListCache::new(Arc::clone(&cache)), carts, config);
        let wishlist = ListController::new(ListCache::new(cache), wishlists, config);
        Ok(Self::new(cart, wishlist, identity))
    }

    /// The cart.
    pub fn cart(&self) -> &ListController<CartItem> {
        &self.inner.cart
    }

    /// The wishlist.
    pub fn wishlist(&self) -> &ListController<WishlistItem> {
        &self.inner.wishlist
    }

    /// The identity signal this session follows.
    pub fn identity(&self) -> &IdentitySignal {
        &self.inner.identity
    }

    /// Bind both lists to `user`.
    pub fn sign_in(&self, user: impl Into<UserId>) {
        self.inner.identity.set(Some(user.into()));
        self.inner.sync_identity();
    }

    /// Clear the identity of both lists and purge their caches.
    pub fn sign_out(&self) {
        self.inner.identity.set(None);
        self.inner.sync_identity();
    }

    /// Turn the cart into an order.
    ///
    /// Requires a signed-in user and a non-empty cart. The draft is handed
    /// to `submit`; the cart is emptied only if submission succeeds.
    pub async fn checkout<F, Fut>(&self, address: &str, submit: F) -> Result<Order>
    where
        F: FnOnce(OrderDraft) -> Fut,
        Fut: Future<Output = Result<Order>>,
    {
        let user = self.inner.cart.user().ok_or(ClientError::NotSignedIn)?;
        let items = self.inner.cart.items();
        let draft = OrderDraft::from_cart(user.as_str(), &items, address, Utc::now())?;

        let order = match submit(draft).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Order submission failed; cart kept");
                return Err(e);
            }
        };

        tracing::info!(user_id = %user, order_id = %order.id, "Order placed");
        self.inner.cart.clear();
        self.inner.cart.flush().await;
        Ok(order)
    }

    /// Flush both lists and stop all background work.
    pub async fn dispose(&self) {
        if let Some(follower) = self.follower.lock().take() {
            follower.abort();
        }
        self.inner.cart.dispose().await;
        self.inner.wishlist.dispose().await;
    }
}

impl Drop for StorefrontSession {
    fn drop(&mut self) {
        if let Some(follower) = self.follower.get_mut().take() {
            follower.abort();
        }
    }
}
