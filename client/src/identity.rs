//! Identity signal.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tote_engine::UserId;

/// The signed-in user as published by the identity provider.
///
/// `None` means anonymous. Clones share the same signal.
#[derive(Debug, Clone)]
pub struct IdentitySignal {
    tx: Arc<watch::Sender<Option<UserId>>>,
}

impl Default for IdentitySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySignal {
    /// Create an anonymous signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The current identity.
    pub fn current(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    /// Publish an identity. Returns `false` if it was already current.
    pub fn set(&self, user: Option<UserId>) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == user {
                return false;
            }
            *current = user;
            true
        })
    }

    /// Receiver for identity changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }

    /// Call `on_change` with the current identity and again after every
    /// change.
    ///
    /// Changes published in quick succession may be coalesced; the latest
    /// value is always delivered.
    pub fn follow<F>(&self, mut on_change: F) -> JoinHandle<()>
    where
        F: FnMut(Option<UserId>) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        tokio::spawn(async move {
            loop {
                let user = rx.borrow_and_update().clone();
                on_change(user);
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
