use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use mercat_order::models::FulfillmentLine;
use mercat_order::{Fulfillment, FulfillmentState};

#[derive(Debug, Deserialize)]
pub struct CreateFulfillmentRequest {
    pub method: String,
    pub lines: Vec<FulfillmentLine>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionFulfillmentRequest {
    pub state: FulfillmentState,
}

/// POST /v1/orders/{id}/fulfillments
pub async fn create_fulfillment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<CreateFulfillmentRequest>,
) -> Result<(StatusCode, Json<Fulfillment>), ApiError> {
    let fulfillment = state
        .orders
        .create_fulfillment(order_id, req.method, req.lines)
        .await?;
    Ok((StatusCode::CREATED, Json(fulfillment)))
}

/// POST /v1/orders/{id}/fulfillments/{fulfillment_id}/transition
pub async fn transition_fulfillment(
    State(state): State<AppState>,
    Path((order_id, fulfillment_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<TransitionFulfillmentRequest>,
) -> Result<Json<Fulfillment>, ApiError> {
    let fulfillment = state
        .orders
        .transition_fulfillment(order_id, fulfillment_id, req.state)
        .await?;
    Ok(Json(fulfillment))
}
