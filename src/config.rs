use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CURRENCY: &str = "LKR";
const CONFIG_DIR: &str = "config";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Gateway operating mode. Sandbox points the buyer redirect at the
/// gateway's test environment; the signature scheme is identical.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Sandbox,
    Live,
}

impl Default for GatewayMode {
    fn default() -> Self {
        GatewayMode::Sandbox
    }
}

/// Merchant credentials and callback URLs for the payment gateway.
///
/// Loaded once at startup and treated as immutable. Absence of this whole
/// section is legal: checkout then rejects GATEWAY orders with a typed
/// `ConfigurationError` instead of failing on a nullable global.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[validate(length(min = 1))]
    pub merchant_id: String,

    #[validate(length(min = 1))]
    pub merchant_secret: String,

    #[serde(default)]
    pub mode: GatewayMode,

    /// Where the gateway redirects the buyer after payment.
    pub return_url: String,

    /// Where the gateway redirects the buyer on cancel.
    pub cancel_url: String,

    /// Public URL of this service's webhook endpoint.
    pub notify_url: String,
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret used to validate bearer tokens issued by the identity
    /// service (session issuance itself is external to this crate).
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to create missing tables on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Currency all orders are priced in
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Comma-separated allowed CORS origins; permissive in development
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Payment gateway credentials; optional so COD-only deployments work
    #[serde(default)]
    #[validate]
    pub gateway: Option<GatewayConfig>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEFAULT_ENV)
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Loads configuration from `config/{default,<env>}` files plus
/// `APP__`-prefixed environment variables (e.g. `APP__GATEWAY__MERCHANT_ID`).
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("currency", DEFAULT_CURRENCY)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // jwt_secret has no default so an unconfigured deployment fails loudly.
    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET with a secure random string (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(gateway: Option<GatewayConfig>) -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            jwt_secret: "test_secret_key_for_testing_purposes_only_32chars".into(),
            host: "127.0.0.1".into(),
            port: 18080,
            environment: "test".into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            currency: default_currency(),
            cors_allowed_origins: None,
            gateway,
        }
    }

    #[test]
    fn config_without_gateway_section_is_valid() {
        let cfg = minimal_config(None);
        assert!(cfg.validate().is_ok());
        assert!(cfg.gateway.is_none());
    }

    #[test]
    fn gateway_section_rejects_blank_credentials() {
        let cfg = minimal_config(Some(GatewayConfig {
            merchant_id: String::new(),
            merchant_secret: "secret".into(),
            mode: GatewayMode::Sandbox,
            return_url: "https://shop.example/return".into(),
            cancel_url: "https://shop.example/cancel".into(),
            notify_url: "https://shop.example/api/v1/payments/webhook".into(),
        }));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut cfg = minimal_config(None);
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }
}
