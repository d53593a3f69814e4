use std::net::SocketAddr;
use std::sync::Arc;

use mercat_api::{app, AppState};
use mercat_core::collaborators::{FlatRateShipping, NoopPromotionEngine};
use mercat_order::interceptor::InterceptorChain;
use mercat_order::modify::ModificationEngine;
use mercat_order::OrderService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mercat_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = mercat_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Mercat API on port {}", config.server.port);

    let db = mercat_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.ensure_schema().await.expect("Failed to ensure schema");

    let repo = Arc::new(mercat_store::PgOrderRepository::new(db.pool.clone()));
    let variants = Arc::new(mercat_store::PgVariantCatalog::new(db.pool.clone()));
    let history = Arc::new(mercat_store::PgHistorySink::new(db.pool.clone()));

    let engine = ModificationEngine::new(
        variants.clone(),
        Arc::new(NoopPromotionEngine),
        Arc::new(FlatRateShipping {
            method: config.business_rules.shipping_method.clone(),
            net: config.business_rules.shipping_net,
            tax_rate: config.business_rules.default_tax_rate,
        }),
    );

    // Interceptors are registered here at process start; none ship by
    // default.
    let interceptors = InterceptorChain::default();

    let orders = Arc::new(OrderService::new(
        repo,
        variants,
        interceptors,
        engine,
        history,
    ));

    let app_state = AppState {
        orders,
        business_rules: config.business_rules.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
