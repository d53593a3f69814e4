use axum::{
    http::Method,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod fulfillments;
pub mod orders;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/v1/orders", post(orders::create_order))
        .route("/v1/orders/{id}", get(orders::get_order))
        .route("/v1/orders/{id}/lines", post(orders::add_line))
        .route(
            "/v1/orders/{id}/lines/{line_id}",
            patch(orders::adjust_line).delete(orders::remove_line),
        )
        .route("/v1/orders/{id}/state", post(orders::transition_order))
        .route("/v1/orders/{id}/modify", post(orders::modify_order))
        .route(
            "/v1/orders/{id}/fulfillments",
            post(fulfillments::create_fulfillment),
        )
        .route(
            "/v1/orders/{id}/fulfillments/{fulfillment_id}/transition",
            post(fulfillments::transition_fulfillment),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
