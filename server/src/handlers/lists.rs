//! List document handlers: read, merge upsert and long-poll watch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tote_engine::{ListDocument, ListKind, Revision, UserId};

use crate::db;
use crate::error::{AppError, Result};
use crate::websocket::SubscriptionHub;

/// Body of a merge upsert.
///
/// Clients send a whole `ListWrite`; `userId` and `updatedAt` are optional
/// and the path's user wins.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub items: Value,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response for a merge upsert.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    /// Revision assigned to the write
    pub revision: Revision,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for a watch request.
#[derive(Debug, Default, Deserialize)]
pub struct WatchQuery {
    /// Last revision the caller has seen
    #[serde(default)]
    pub since: Revision,
}

/// Resolve a collection name from the URL.
pub fn parse_collection(collection: &str) -> Result<ListKind> {
    ListKind::from_collection(collection)
        .map_err(|_| AppError::NotFound(format!("Unknown collection: {collection}")))
}

/// Read a document, or the empty revision-0 document if it was never written.
pub async fn fetch_document(
    pool: &PgPool,
    kind: ListKind,
    user_id: &str,
) -> Result<ListDocument<Value>> {
    let document = db::get_document(pool, kind, user_id)
        .await?
        .map(|stored| stored.to_document())
        .unwrap_or_else(|| ListDocument::empty(user_id));
    Ok(document)
}

/// Normalize and store a write, then notify watchers.
pub async fn store_document(
    pool: &PgPool,
    hub: &SubscriptionHub,
    kind: ListKind,
    user_id: &str,
    request: UpsertRequest,
) -> Result<UpsertResponse> {
    if let Some(body_user) = request.user_id.as_deref() {
        if body_user != user_id {
            return Err(AppError::BadRequest(format!(
                "userId {body_user} does not match {user_id}"
            )));
        }
    }

    let items = tote_engine::normalize_items_value(kind, request.items)?;
    let updated_at = request.updated_at.unwrap_or_else(Utc::now);

    let stored = db::upsert_document(pool, kind, user_id, &items, updated_at).await?;
    let document = stored.to_document();
    let response = UpsertResponse {
        revision: document.revision,
        updated_at: document.updated_at,
    };

    tracing::info!(
        collection = kind.collection(),
        user_id = %user_id,
        revision = document.revision,
        items = document.items.len(),
        "Stored document"
    );

    hub.publish(kind, document);
    Ok(response)
}

/// Wait until the document's revision exceeds `since`.
///
/// Returns `None` if nothing newer arrived within `timeout`.
pub async fn watch_document(
    pool: &PgPool,
    hub: &SubscriptionHub,
    kind: ListKind,
    user_id: &str,
    since: Revision,
    timeout: Duration,
) -> Result<Option<ListDocument<Value>>> {
    // Subscribe before reading so a write landing in between is not missed.
    let mut rx = hub.watch(kind, user_id);

    let current = fetch_document(pool, kind, user_id).await?;
    if current.revision > since {
        return Ok(Some(current));
    }

    let newer = async {
        loop {
            if rx.changed().await.is_err() {
                return None;
            }
            let published = rx.borrow_and_update().clone();
            if let Some(document) = published {
                if document.revision > since {
                    return Some(document);
                }
            }
        }
    };

    match tokio::time::timeout(timeout, newer).await {
        Ok(Some(document)) => Ok(Some((*document).clone())),
        Ok(None) | Err(_) => {
            tracing::trace!(
                collection = kind.collection(),
                user_id = %user_id,
                since,
                "Watch timed out"
            );
            Ok(None)
        }
    }
}
