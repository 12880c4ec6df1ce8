//! Order handlers.

use sqlx::PgPool;
use tote_engine::{Order, OrderDraft};

use crate::db;
use crate::error::Result;

/// Normalize and store an order.
///
/// Lines follow the cart rules and the total is recomputed from them.
pub async fn place_order(pool: &PgPool, draft: OrderDraft) -> Result<Order> {
    let draft = draft.normalized()?;

    let stored = db::insert_order(pool, &draft).await?;
    let order = stored.to_order()?;

    tracing::info!(
        order_id = %order.id,
        user_id = %order.draft.user_id,
        items = order.draft.items.len(),
        total = order.draft.total,
        "Order placed"
    );

    Ok(order)
}

/// A user's orders, newest first. Rows that no longer decode are skipped.
pub async fn list_orders(pool: &PgPool, user_id: &str) -> Result<Vec<Order>> {
    let stored = db::list_orders(pool, user_id).await?;

    let mut orders = Vec::with_capacity(stored.len());
    for row in &stored {
        match row.to_order() {
            Ok(order) => orders.push(order),
            Err(e) => {
                tracing::warn!("Failed to convert stored order {}: {}", row.id, e);
            }
        }
    }
    Ok(orders)
}
