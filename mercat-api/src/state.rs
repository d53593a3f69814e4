use mercat_order::OrderService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub business_rules: mercat_store::app_config::BusinessRules,
}
