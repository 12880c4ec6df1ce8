//! List document routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tote_engine::ListDocument;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    fetch_document, parse_collection, store_document, watch_document, UpsertRequest,
    UpsertResponse, WatchQuery,
};
use crate::AppState;

/// Create list document routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/lists/{collection}/{user_id}",
            get(get_handler).put(put_handler),
        )
        .route("/v1/lists/{collection}/{user_id}/watch", get(watch_handler))
}

/// GET /v1/lists/{collection}/{user_id} - Read a document.
async fn get_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((collection, user_id)): Path<(String, String)>,
) -> Result<Json<ListDocument<Value>>> {
    let kind = parse_collection(&collection)?;
    auth.authorize(&user_id)?;
    let document = fetch_document(&state.pool, kind, &user_id).await?;
    Ok(Json(document))
}

/// PUT /v1/lists/{collection}/{user_id} - Merge upsert a document.
async fn put_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((collection, user_id)): Path<(String, String)>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<UpsertResponse>> {
    let kind = parse_collection(&collection)?;
    auth.authorize(&user_id)?;
    let response = store_document(&state.pool, &state.hub, kind, &user_id, request).await?;
    Ok(Json(response))
}

/// GET /v1/lists/{collection}/{user_id}/watch?since=N - Long poll.
async fn watch_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((collection, user_id)): Path<(String, String)>,
    Query(query): Query<WatchQuery>,
) -> Result<Response> {
    let kind = parse_collection(&collection)?;
    auth.authorize(&user_id)?;

    let document = watch_document(
        &state.pool,
        &state.hub,
        kind,
        &user_id,
        query.since,
        state.config.watch_timeout,
    )
    .await?;

    Ok(match document {
        Some(document) => Json(document).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
