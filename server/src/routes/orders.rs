//! Order routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tote_engine::{Order, OrderDraft};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{list_orders, place_order};
use crate::AppState;

/// Create order routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_handler))
        .route("/v1/orders/{user_id}", get(list_handler))
}

/// POST /v1/orders - Place an order.
async fn create_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<Order>)> {
    auth.authorize(&draft.user_id)?;
    let order = place_order(&state.pool, draft).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/orders/{user_id} - List a user's orders.
async fn list_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Order>>> {
    auth.authorize(&user_id)?;
    let orders = list_orders(&state.pool, &user_id).await?;
    Ok(Json(orders))
}
