//! Database operations for the list_documents table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use tote_engine::{ListDocument, ListKind};

/// A stored list document row from the database.
#[derive(Debug)]
pub struct StoredDocument {
    pub collection: String,
    pub user_id: String,
    pub items: Value,
    pub revision: i64,
    #[allow(dead_code)]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            collection: row.try_get("collection")?,
            user_id: row.try_get("user_id")?,
            items: row.try_get("items")?,
            revision: row.try_get("revision")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredDocument {
    /// Convert the row to the wire document.
    pub fn to_document(&self) -> ListDocument<Value> {
        let items = match &self.items {
            Value::Array(items) => items.clone(),
            other => {
                tracing::warn!(
                    collection = %self.collection,
                    user_id = %self.user_id,
                    "Stored items are not an array: {}",
                    other
                );
                Vec::new()
            }
        };

        ListDocument {
            items,
            user_id: self.user_id.clone(),
            updated_at: self.updated_at,
            revision: self.revision.max(0) as u64,
        }
    }
}

/// Get a user's document of one kind.
pub async fn get_document(
    pool: &PgPool,
    kind: ListKind,
    user_id: &str,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(
        r#"
        SELECT collection, user_id, items, revision, created_at, updated_at
        FROM list_documents
        WHERE collection = $1 AND user_id = $2
        "#,
    )
    .bind(kind.collection())
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Merge-upsert a document: `items` and `updated_at` are replaced, the
/// revision is incremented and `created_at` is preserved.
pub async fn upsert_document(
    pool: &PgPool,
    kind: ListKind,
    user_id: &str,
    items: &Value,
    updated_at: DateTime<Utc>,
) -> Result<StoredDocument, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(
        r#"
        INSERT INTO list_documents (collection, user_id, items, revision, created_at, updated_at)
        VALUES ($1, $2, $3, 1, $4, $4)
        ON CONFLICT (collection, user_id) DO UPDATE SET
            items = EXCLUDED.items,
            revision = list_documents.revision + 1,
            updated_at = EXCLUDED.updated_at
        RETURNING collection, user_id, items, revision, created_at, updated_at
        "#,
    )
    .bind(kind.collection())
    .bind(user_id)
    .bind(items)
    .bind(updated_at)
    .fetch_one(pool)
    .await
}
