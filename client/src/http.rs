//! HTTP adapter for the Tote document service.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::mpsc;
use tote_engine::{
    LineItem, ListDocument, ListKind, ListWrite, Order, OrderDraft, RemoteSnapshot, Revision,
};

use crate::error::{ClientError, Result};
use crate::identity::IdentitySignal;
use crate::remote::{RemoteStore, Subscription, SUBSCRIPTION_BUFFER};

/// Default pause between failed watch requests.
pub const DEFAULT_WATCH_RETRY: Duration = Duration::from_millis(2000);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertAck {
    revision: Revision,
}

/// Where the bearer token comes from.
#[derive(Clone, Default)]
enum Credentials {
    #[default]
    Anonymous,
    Token(String),
    /// `<user id>` or `<user id>:<secret>` for whoever is signed in now
    Identity {
        identity: IdentitySignal,
        secret: Option<String>,
    },
}

impl Credentials {
    fn bearer(&self) -> Option<String> {
        match self {
            Credentials::Anonymous => None,
            Credentials::Token(token) => Some(token.clone()),
            Credentials::Identity { identity, secret } => {
                let user = identity.current()?;
                Some(match secret {
                    Some(secret) => format!("{user}:{secret}"),
                    None => user,
                })
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::Token(_) => f.write_str("Token(..)"),
            Credentials::Identity { identity, secret } => f
                .debug_struct("Identity")
                .field("user", &identity.current())
                .field("secret", &secret.as_ref().map(|_| ".."))
                .finish(),
        }
    }
}

/// Remote store reached over HTTP.
///
/// Subscriptions are long-poll loops on the document's watch endpoint; a
/// failed poll is logged and retried after a fixed pause.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    retry: Duration,
}

impl HttpRemoteStore {
    /// Create a store for the service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            credentials: Credentials::Anonymous,
            retry: DEFAULT_WATCH_RETRY,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Credentials::Token(token.into());
        self
    }

    /// Authenticate every request as the user currently signed in on
    /// `identity`, as `<user id>:<secret>` when a secret is given. Requests
    /// made while nobody is signed in carry no token.
    pub fn with_identity(mut self, identity: IdentitySignal, secret: Option<String>) -> Self {
        self.credentials = Credentials::Identity { identity, secret };
        self
    }

    /// The bearer token the next request will carry.
    pub fn bearer_token(&self) -> Option<String> {
        self.credentials.bearer()
    }

    /// Pause between failed watch requests.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn list_url(&self, kind: ListKind, user_id: &str, watch: bool) -> Result<Url> {
        let mut segments = vec!["v1", "lists", kind.collection(), user_id];
        if watch {
            segments.push("watch");
        }
        self.endpoint(&segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn checked(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch a user's current document.
    pub async fn fetch<T: LineItem>(&self, user_id: &str) -> Result<ListDocument<T>> {
        let url = self.list_url(T::KIND, user_id, false)?;
        let response = self.authorized(self.client.get(url)).send().await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    /// Wait for a revision newer than `since`. `None` if the server timed
    /// the poll out first.
    async fn watch_once<T: LineItem>(
        &self,
        user_id: &str,
        since: Revision,
    ) -> Result<Option<ListDocument<T>>> {
        let url = self.list_url(T::KIND, user_id, true)?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("since", since)])
            .send()
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(Self::checked(response).await?.json().await?))
    }

    /// Submit an order.
    pub async fn place_order(&self, draft: &OrderDraft) -> Result<Order> {
        draft.validate()?;
        let url = self.endpoint(&["v1", "orders"])?;
        let response = self
            .authorized(self.client.post(url))
            .json(draft)
            .send()
            .await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    /// A user's orders, newest first.
    pub async fn orders(&self, user_id: &str) -> Result<Vec<Order>> {
        let url = self.endpoint(&["v1", "orders", user_id])?;
        let response = self.authorized(self.client.get(url)).send().await?;
        Ok(Self::checked(response).await?.json().await?)
    }
}

#[async_trait]
impl<T: LineItem> RemoteStore<T> for HttpRemoteStore {
    async fn upsert(&self, user_id: &str, write: ListWrite<T>) -> Result<Revision> {
        let url = self.list_url(T::KIND, user_id, false)?;
        let response = self
            .authorized(self.client.put(url))
            .json(&write)
            .send()
            .await?;
        let ack: UpsertAck = Self::checked(response).await?.json().await?;
        Ok(ack.revision)
    }

    async fn subscribe(&self, user_id: &str) -> Result<Subscription<T>> {
        let initial: ListDocument<T> = self.fetch(user_id).await?;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let store = self.clone();
        let user_id = user_id.to_string();

        let task = tokio::spawn(async move {
            let mut since = initial.revision;
            if tx
                .send(RemoteSnapshot::new(initial.items, initial.revision))
                .await
                .is_err()
            {
                return;
            }

            loop {
                match store.watch_once::<T>(&user_id, since).await {
                    Ok(Some(doc)) => {
                        since = doc.revision;
                        if tx
                            .send(RemoteSnapshot::new(doc.items, doc.revision))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            user_id = %user_id,
                            collection = T::KIND.collection(),
                            error = %e,
                            "Watch request failed, retrying"
                        );
                        tokio::time::sleep(store.retry).await;
                    }
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_urls() {
        let store = HttpRemoteStore::new("http://localhost:3000/").unwrap();
        assert_eq!(
            store.list_url(ListKind::Cart, "u1", false).unwrap().as_str(),
            "http://localhost:3000/v1/lists/carts/u1"
        );
        assert_eq!(
            store
                .list_url(ListKind::Wishlist, "u1", true)
                .unwrap()
                .as_str(),
            "http://localhost:3000/v1/lists/wishlists/u1/watch"
        );
    }

    #[test]
    fn user_ids_are_escaped() {
        let store = HttpRemoteStore::new("http://localhost:3000/api").unwrap();
        let url = store.list_url(ListKind::Cart, "a/b c", false).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/v1/lists/carts/a%2Fb%20c");
    }

    fn authorization(store: &HttpRemoteStore) -> Option<String> {
        let request = store
            .authorized(store.client.get("http://localhost:3000/v1/orders/u1"))
            .build()
            .unwrap();
        request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .map(|value| value.to_str().unwrap().to_string())
    }

    #[test]
    fn token_follows_identity() {
        let identity = IdentitySignal::new();
        let store = HttpRemoteStore::new("http://localhost:3000")
            .unwrap()
            .with_identity(identity.clone(), Some("s3cret".to_string()));
        assert_eq!(authorization(&store), None);

        identity.set(Some("u1".to_string()));
        assert_eq!(authorization(&store).as_deref(), Some("Bearer u1:s3cret"));

        identity.set(Some("u2".to_string()));
        assert_eq!(authorization(&store).as_deref(), Some("Bearer u2:s3cret"));

        identity.set(None);
        assert_eq!(authorization(&store), None);
    }

    #[test]
    fn token_without_secret_is_user_id() {
        let identity = IdentitySignal::new();
        identity.set(Some("u1".to_string()));
        let store = HttpRemoteStore::new("http://localhost:3000")
            .unwrap()
            .with_identity(identity, None);
        assert_eq!(store.bearer_token().as_deref(), Some("u1"));

        let fixed = HttpRemoteStore::new("http://localhost:3000")
            .unwrap()
            .with_token("service");
        assert_eq!(authorization(&fixed).as_deref(), Some("Bearer service"));
        assert!(!format!("{fixed:?}").contains("service"));
    }

    #[test]
    fn rejects_invalid_base() {
        assert!(matches!(
            HttpRemoteStore::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpRemoteStore::new("mailto:someone@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
