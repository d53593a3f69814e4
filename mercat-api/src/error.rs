use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use mercat_order::fulfillment::FulfillmentError;
use mercat_order::modify::ModifyOrderError;
use mercat_order::OrderServiceError;

/// HTTP surface of the engine's error taxonomy. Vetoes and illegal
/// transitions carry their structured payloads; storage failures are
/// logged and collapsed to a generic 500.
#[derive(Debug)]
pub struct ApiError(pub OrderServiceError);

impl From<OrderServiceError> for ApiError {
    fn from(err: OrderServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            OrderServiceError::NotFound(_) | OrderServiceError::LineNotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({"error": self.0.to_string()}),
            ),
            OrderServiceError::VariantNotFound(_)
            | OrderServiceError::InvalidQuantity
            | OrderServiceError::LinesNotEditable(_) => (
                StatusCode::BAD_REQUEST,
                json!({"error": self.0.to_string()}),
            ),
            OrderServiceError::Veto(v) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": v.interceptor_error,
                    "interceptorError": v.interceptor_error,
                }),
            ),
            OrderServiceError::Transition(e) => (
                StatusCode::CONFLICT,
                json!({
                    "error": e.to_string(),
                    "from": e.from,
                    "to": e.to,
                }),
            ),
            OrderServiceError::Fulfillment(f) => match f {
                FulfillmentError::NotFound(_) | FulfillmentError::LineNotFound(_) => {
                    (StatusCode::NOT_FOUND, json!({"error": f.to_string()}))
                }
                FulfillmentError::Transition(e) => (
                    StatusCode::CONFLICT,
                    json!({
                        "error": e.to_string(),
                        "from": e.from,
                        "to": e.to,
                        "transitionError": e.transition_error,
                    }),
                ),
                other => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({"error": other.to_string()}),
                ),
            },
            OrderServiceError::Modify(m) => match m {
                ModifyOrderError::StaleModification { expected, actual } => (
                    StatusCode::CONFLICT,
                    json!({
                        "error": m.to_string(),
                        "expectedVersion": expected,
                        "actualVersion": actual,
                    }),
                ),
                ModifyOrderError::Transition(ref e) => (
                    StatusCode::CONFLICT,
                    json!({
                        "error": m.to_string(),
                        "from": e.from,
                        "to": e.to,
                    }),
                ),
                ModifyOrderError::NoteRequired
                | ModifyOrderError::MissingDryRunVersion
                | ModifyOrderError::NoChanges => (
                    StatusCode::BAD_REQUEST,
                    json!({"error": m.to_string()}),
                ),
                ModifyOrderError::Collaborator(_) => {
                    tracing::error!("Collaborator failure during modification: {}", m);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({"error": "Internal Server Error"}),
                    )
                }
                other => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({"error": other.to_string()}),
                ),
            },
            OrderServiceError::Storage(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal Server Error"}),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
