//! Database operations for the orders table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, PgPool, Row};
use tote_engine::{CartItem, Order, OrderDraft};

/// A stored order row from the database.
#[derive(Debug)]
pub struct StoredOrder {
    pub id: String,
    pub user_id: String,
    pub items: Value,
    pub total: f64,
    pub address: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredOrder {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredOrder {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            items: row.try_get("items")?,
            total: row.try_get("total")?,
            address: row.try_get("address")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredOrder {
    /// Convert database row to an engine order.
    pub fn to_order(&self) -> tote_engine::error::Result<Order> {
        let items: Vec<CartItem> = serde_json::from_value(self.items.clone())
            .map_err(|e| tote_engine::Error::InvalidDocument(e.to_string()))?;

        Ok(Order {
            id: self.id.clone(),
            draft: OrderDraft {
                user_id: self.user_id.clone(),
                items,
                total: self.total,
                address: self.address.clone(),
                status: self.status.parse()?,
                created_at: self.created_at,
            },
        })
    }
}

/// Insert a new order and return the stored row.
pub async fn insert_order(pool: &PgPool, draft: &OrderDraft) -> Result<StoredOrder, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query_as::<_, StoredOrder>(
        r#"
        INSERT INTO orders (id, user_id, items, total, address, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, items, total, address, status, created_at
        "#,
    )
    .bind(&id)
    .bind(&draft.user_id)
    .bind(Json(&draft.items))
    .bind(draft.total)
    .bind(&draft.address)
    .bind(draft.status.as_str())
    .bind(draft.created_at)
    .fetch_one(pool)
    .await
}

/// Get a user's orders, newest first.
pub async fn list_orders(pool: &PgPool, user_id: &str) -> Result<Vec<StoredOrder>, sqlx::Error> {
    sqlx::query_as::<_, StoredOrder>(
        r#"
        SELECT id, user_id, items, total, address, status, created_at
        FROM orders
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
