use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// ISO 4217 code orders are created in.
    pub currency: String,
    /// Tax rate percentage applied when a variant carries none.
    pub default_tax_rate: f64,
    #[serde(default = "default_shipping_method")]
    pub shipping_method: String,
    /// Flat shipping charge, net, minor units.
    #[serde(default)]
    pub shipping_net: i64,
}

fn default_shipping_method() -> String {
    "standard".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of MERCAT)
            // Eg.. `MERCAT__SERVER__PORT=1` would set the `server.port` key
            .add_source(config::Environment::with_prefix("MERCAT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
