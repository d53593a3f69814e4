pub mod app_config;
pub mod database;
pub mod history_repo;
pub mod order_repo;
pub mod variant_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use history_repo::PgHistorySink;
pub use order_repo::PgOrderRepository;
pub use variant_repo::PgVariantCatalog;
