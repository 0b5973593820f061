use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 9000;
const CONFIG_DIR: &str = "config";
const DEFAULT_SHIPPING_BASE_URL: &str = "https://api.biteship.com";
const DEFAULT_SANDBOX_KEY_MARKER: &str = "biteship_test";
const DEFAULT_PAYMENT_BASE_URL: &str = "https://app.sandbox.midtrans.com";
const DEFAULT_SESSION_COOKIE: &str = "storefront_session";

/// Session cookie configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SessionConfig {
    #[serde(default = "default_session_cookie")]
    #[validate(length(min = 1))]
    pub cookie_name: String,

    /// Idle sessions are dropped after this many seconds; unset keeps them for the process lifetime
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_session_cookie(),
            idle_timeout_secs: None,
        }
    }
}

/// Catalog listing and suggestion limits
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub page_size: u64,

    #[serde(default = "default_suggestion_limit")]
    #[validate(range(min = 1, max = 100))]
    pub suggestion_limit: u64,

    #[serde(default = "default_suggestion_min_chars")]
    pub suggestion_min_chars: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: default_catalog_page_size(),
            suggestion_limit: default_suggestion_limit(),
            suggestion_min_chars: default_suggestion_min_chars(),
        }
    }
}

/// Percentages applied to every cart line
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct CartConfig {
    #[serde(default)]
    #[validate(custom = "validate_percent")]
    pub tax_percent: Decimal,

    #[serde(default)]
    #[validate(custom = "validate_percent")]
    pub discount_percent: Decimal,
}

/// The physical store used as shipper and courier origin
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct StoreConfig {
    #[serde(default = "default_store_name")]
    #[validate(length(min = 1))]
    pub name: String,

    /// Label shown as the origin of shipping previews
    #[serde(default = "default_store_display_name")]
    pub display_name: String,

    #[serde(default = "default_store_contact_name")]
    pub contact_name: String,

    #[serde(default = "default_store_contact_phone")]
    pub contact_phone: String,

    #[serde(default)]
    pub contact_email: String,

    #[serde(default = "default_store_address")]
    pub address: String,

    #[serde(default = "default_store_name")]
    pub note: String,

    #[serde(default = "default_store_postal_code")]
    pub postal_code: u32,

    #[serde(default = "default_store_latitude")]
    pub latitude: f64,

    #[serde(default = "default_store_longitude")]
    pub longitude: f64,

    /// Declared insurance value sent with every courier order
    #[serde(default = "default_insurance_value")]
    pub insurance_value: i64,

    #[serde(default = "default_order_note")]
    pub order_note: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            display_name: default_store_display_name(),
            contact_name: default_store_contact_name(),
            contact_phone: default_store_contact_phone(),
            contact_email: String::new(),
            address: default_store_address(),
            note: default_store_name(),
            postal_code: default_store_postal_code(),
            latitude: default_store_latitude(),
            longitude: default_store_longitude(),
            insurance_value: default_insurance_value(),
            order_note: default_order_note(),
        }
    }
}

/// Courier aggregator settings
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ShippingConfig {
    /// Bearer token for the courier aggregator
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_shipping_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Substring identifying sandbox API keys
    #[serde(default = "default_sandbox_key_marker")]
    #[validate(length(min = 1))]
    pub sandbox_key_marker: String,

    /// Courier area id of the store, also the fallback destination
    #[serde(default)]
    pub default_origin_area_id: String,

    /// Optional TOML file replacing the embedded area table
    #[serde(default)]
    pub area_table_path: Option<String>,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Interval of the pending courier registration worker, 0 disables it
    #[serde(default = "default_registration_retry_interval_secs")]
    pub registration_retry_interval_secs: u64,

    #[serde(default)]
    #[validate]
    pub store: StoreConfig,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_shipping_base_url(),
            sandbox_key_marker: default_sandbox_key_marker(),
            default_origin_area_id: String::new(),
            area_table_path: None,
            request_timeout_secs: None,
            registration_retry_interval_secs: default_registration_retry_interval_secs(),
            store: StoreConfig::default(),
        }
    }
}

impl ShippingConfig {
    /// Sandbox accounts are recognised by a marker inside the API key
    pub fn is_sandbox(&self) -> bool {
        self.api_key.contains(&self.sandbox_key_marker)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Payment gateway settings
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PaymentConfig {
    #[serde(default)]
    pub server_key: String,

    #[serde(default = "default_payment_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Days until an unpaid order is due
    #[serde(default = "default_payment_due_days")]
    #[validate(range(min = 1, max = 90))]
    pub due_days: i64,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            base_url: default_payment_base_url(),
            due_days: default_payment_due_days(),
            request_timeout_secs: None,
        }
    }
}

impl PaymentConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Application environment
    #[validate(custom = "validate_environment")]
    pub environment: String,

    /// Public base URL used when building pagination links
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Run embedded migrations at startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub session: SessionConfig,

    #[serde(default)]
    #[validate]
    pub catalog: CatalogConfig,

    #[serde(default)]
    #[validate]
    pub cart: CartConfig,

    #[serde(default)]
    #[validate]
    pub shipping: ShippingConfig,

    #[serde(default)]
    #[validate]
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            app_url: default_app_url(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            session: SessionConfig::default(),
            catalog: CatalogConfig::default(),
            cart: CartConfig::default(),
            shipping: ShippingConfig::default(),
            payment: PaymentConfig::default(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment.
    /// Webhook signature verification is skipped here.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.payment.server_key.trim().is_empty() {
            let mut err = ValidationError::new("payment_server_key_required");
            err.message = Some(
                "APP__PAYMENT__SERVER_KEY is required outside development; notifications cannot be verified without it".into(),
            );
            errors.add("payment", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_app_url() -> String {
    format!("http://localhost:{}", DEFAULT_PORT)
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_session_cookie() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}

fn default_catalog_page_size() -> u64 {
    100
}
fn default_suggestion_limit() -> u64 {
    10
}
fn default_suggestion_min_chars() -> usize {
    2
}

fn default_shipping_base_url() -> String {
    DEFAULT_SHIPPING_BASE_URL.to_string()
}

fn default_sandbox_key_marker() -> String {
    DEFAULT_SANDBOX_KEY_MARKER.to_string()
}

fn default_registration_retry_interval_secs() -> u64 {
    300
}

fn default_payment_base_url() -> String {
    DEFAULT_PAYMENT_BASE_URL.to_string()
}

fn default_payment_due_days() -> i64 {
    7
}

fn default_store_name() -> String {
    "Toko Shafirda".to_string()
}
fn default_store_display_name() -> String {
    "Toko Shafirda, Samarinda".to_string()
}
fn default_store_contact_name() -> String {
    "Wahyu Bahri Irsandy".to_string()
}
fn default_store_contact_phone() -> String {
    "08115992185".to_string()
}
fn default_store_address() -> String {
    "Jl. KH. Harun Nafsi No.106, RT.22, Rapak Dalam, Kec. Loa Janan Ilir, Kota Samarinda, Kalimantan Timur".to_string()
}
fn default_store_postal_code() -> u32 {
    75131
}
fn default_store_latitude() -> f64 {
    -0.526313085327813
}
fn default_store_longitude() -> f64 {
    117.13666900992393
}
fn default_insurance_value() -> i64 {
    50_000
}
fn default_order_note() -> String {
    "Please be careful".to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_environment(environment: &str) -> Result<(), ValidationError> {
    if environment.trim().is_empty() {
        let mut err = ValidationError::new("environment");
        err.message = Some("environment must not be empty".into());
        return Err(err);
    }
    Ok(())
}

fn validate_percent(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() || *value > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("percent");
        err.message = Some("percentages must be between 0 and 100".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration from the working directory's `config/` folder.
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Loads configuration using an explicit config directory and profile name
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .add_source(
            File::with_name(&config_dir.join("default").to_string_lossy()).required(false),
        )
        .add_source(File::with_name(&config_dir.join(run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
