//! Product routes: one handler per verb/path pair, each a thin wrapper
//! around [`ProductGateway::send`](crate::network::ProductGateway::send).
//!
//! Request bodies are parsed here; a body that is not a partial product is
//! answered 400 with the parse error and never reaches the bus.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{middleware, Json, Router};
use catalog_core::{CommandEnvelope, CommandKind, ProductDraft};

use super::AppState;
use crate::network::gateway::GatewayResponse;
use crate::network::middleware::require_passphrase;

/// `GET /products`
pub async fn list_products(State(state): State<AppState>) -> GatewayResponse {
    let _guard = state.shutdown.in_flight_guard();
    state.gateway.send(CommandEnvelope::get_all_products()).await
}

/// `GET /products/{id}`
pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> GatewayResponse {
    let _guard = state.shutdown.in_flight_guard();
    state.gateway.send(CommandEnvelope::get_product(id)).await
}

/// `POST /products`
pub async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<ProductDraft>, JsonRejection>,
) -> GatewayResponse {
    let _guard = state.shutdown.in_flight_guard();
    let draft = match parse_draft(&state, CommandKind::CreateProduct, body) {
        Ok(draft) => draft,
        Err(response) => return response,
    };
    state.gateway.send(CommandEnvelope::create_product(&draft)).await
}

/// `PUT /products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ProductDraft>, JsonRejection>,
) -> GatewayResponse {
    let _guard = state.shutdown.in_flight_guard();
    let draft = match parse_draft(&state, CommandKind::UpdateProduct, body) {
        Ok(draft) => draft,
        Err(response) => return response,
    };
    state
        .gateway
        .send(CommandEnvelope::update_product(id, &draft))
        .await
}

/// `DELETE /products/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> GatewayResponse {
    let _guard = state.shutdown.in_flight_guard();
    state.gateway.send(CommandEnvelope::delete_product(id)).await
}

/// Switched-off operations answer the sentinel before the body is looked at.
fn parse_draft(
    state: &AppState,
    kind: CommandKind,
    body: Result<Json<ProductDraft>, JsonRejection>,
) -> Result<ProductDraft, GatewayResponse> {
    if !state.gateway.is_connected(kind) {
        return Err(GatewayResponse::NotImplemented);
    }
    match body {
        Ok(Json(draft)) => Ok(draft),
        Err(rejection) => Err(GatewayResponse::BadRequest(rejection.body_text())),
    }
}

/// The product sub-router, guarded by the passphrase check.
///
/// Paths are relative; the server nests them under `/api/v1`.
pub fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route_layer(middleware::from_fn_with_state(state, require_passphrase))
}
