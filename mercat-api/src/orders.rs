use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use mercat_order::interceptor::{AddLineInput, AdjustLineInput};
use mercat_order::modify::ModifyOrderInput;
use mercat_order::service::ModifyOrderOutcome;
use mercat_order::{Order, OrderState};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    /// Defaults to the configured shop currency.
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustLineRequest {
    pub quantity: u32,
    pub custom_fields: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub state: OrderState,
}

#[derive(Debug, Deserialize)]
pub struct ModifyRequest {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(flatten)]
    pub input: ModifyOrderInput,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let currency = req
        .currency
        .unwrap_or_else(|| state.business_rules.currency.clone());
    let order = state.orders.create_order(&currency, req.customer_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.get_order(order_id).await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/lines
pub async fn add_line(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<AddLineInput>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.add_item_to_order(order_id, input).await?;
    Ok(Json(order))
}

/// PATCH /v1/orders/{id}/lines/{line_id}
pub async fn adjust_line(
    State(state): State<AppState>,
    Path((order_id, line_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AdjustLineRequest>,
) -> Result<Json<Order>, ApiError> {
    let input = AdjustLineInput {
        line_id,
        quantity: req.quantity,
        custom_fields: req.custom_fields,
    };
    let order = state.orders.adjust_order_line(order_id, input).await?;
    Ok(Json(order))
}

/// DELETE /v1/orders/{id}/lines/{line_id}
pub async fn remove_line(
    State(state): State<AppState>,
    Path((order_id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.remove_order_line(order_id, line_id).await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/state
pub async fn transition_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.transition_order(order_id, req.state).await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/modify
///
/// `dry_run: true` previews the change-set without persisting; a commit
/// must carry the version stamp the preview returned.
pub async fn modify_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<ModifyRequest>,
) -> Result<Json<ModifyOrderOutcome>, ApiError> {
    let outcome = state
        .orders
        .modify_order(order_id, req.input, req.dry_run)
        .await?;
    Ok(Json(outcome))
}
