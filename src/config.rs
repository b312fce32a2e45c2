use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// One step of the volume discount table. A tier applies to every subtotal at
/// or above `min_subtotal` up to the next tier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiscountTier {
    pub min_subtotal: Decimal,
    pub percent: Decimal,
}

/// Order pricing configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Volume discount tiers, any order
    #[serde(default = "default_discount_tiers")]
    #[validate(custom = "validate_discount_tiers")]
    pub discount_tiers: Vec<DiscountTier>,

    /// Share of the total collected up front under the deposit model
    #[serde(default = "default_deposit_percent")]
    pub deposit_percent: Decimal,

    /// Days until the deposit balance is due
    #[serde(default = "default_balance_terms_days")]
    pub balance_terms_days: i64,

    /// Discounted subtotal at which regional shipping is waived
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            discount_tiers: default_discount_tiers(),
            deposit_percent: default_deposit_percent(),
            balance_terms_days: default_balance_terms_days(),
            free_shipping_threshold: default_free_shipping_threshold(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_ttl_secs")]
    #[validate(range(min = 60, max = 86400))]
    pub access_token_ttl_secs: i64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_ttl_secs")]
    #[validate(range(min = 3600, max = 2592000))]
    pub refresh_token_ttl_secs: i64,

    /// JWT issuer name
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// JWT audience
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Login attempts allowed per email+ip inside the window
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
    #[serde(default = "default_login_rate_window_secs")]
    pub login_rate_window_secs: u64,

    /// Consecutive failures before the account is locked
    #[serde(default = "default_max_failed_logins")]
    #[validate(range(min = 1))]
    pub max_failed_logins: i32,

    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,

    /// Audit logger: flush when this many entries are buffered
    #[serde(default = "default_audit_batch_size")]
    #[validate(range(min = 1, max = 10000))]
    pub audit_batch_size: usize,

    /// Audit logger: flush timer
    #[serde(default = "default_audit_flush_interval_ms")]
    #[validate(range(min = 10))]
    pub audit_flush_interval_ms: u64,

    /// Analytics query cache lifetime
    #[serde(default = "default_analytics_cache_ttl_secs")]
    pub analytics_cache_ttl_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Order pricing
    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(database_url: String, jwt_secret: String, environment: String) -> Self {
        Self {
            database_url,
            jwt_secret,
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            login_rate_limit: default_login_rate_limit(),
            login_rate_window_secs: default_login_rate_window_secs(),
            max_failed_logins: default_max_failed_logins(),
            lockout_minutes: default_lockout_minutes(),
            audit_batch_size: default_audit_batch_size(),
            audit_flush_interval_ms: default_audit_flush_interval_ms(),
            analytics_cache_ttl_secs: default_analytics_cache_ttl_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            cors_allowed_origins: None,
            pricing: PricingConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn audit_flush_interval(&self) -> Duration {
        Duration::from_millis(self.audit_flush_interval_ms)
    }

    pub fn analytics_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.analytics_cache_ttl_secs)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }
        if self.refresh_token_ttl_secs <= self.access_token_ttl_secs {
            let mut err = ValidationError::new("refresh_token_ttl_secs");
            err.message = Some("refresh tokens must outlive access tokens".into());
            errors.add("refresh_token_ttl_secs", err);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_access_token_ttl_secs() -> i64 {
    15 * 60
}

fn default_refresh_token_ttl_secs() -> i64 {
    7 * 24 * 3600
}

fn default_auth_issuer() -> String {
    "flexvolt-ops".to_string()
}

fn default_auth_audience() -> String {
    "flexvolt-supplier-portal".to_string()
}

fn default_db_max_connections() -> u32 {
    20
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
fn default_db_acquire_timeout_secs() -> u64 {
    30
}

fn default_login_rate_limit() -> u32 {
    10
}
fn default_login_rate_window_secs() -> u64 {
    60
}
fn default_max_failed_logins() -> i32 {
    5
}
fn default_lockout_minutes() -> i64 {
    30
}

fn default_audit_batch_size() -> usize {
    50
}
fn default_audit_flush_interval_ms() -> u64 {
    5_000
}

fn default_analytics_cache_ttl_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    1024
}

pub fn default_discount_tiers() -> Vec<DiscountTier> {
    vec![
        DiscountTier {
            min_subtotal: dec!(0),
            percent: dec!(0),
        },
        DiscountTier {
            min_subtotal: dec!(1000),
            percent: dec!(10),
        },
        DiscountTier {
            min_subtotal: dec!(2500),
            percent: dec!(15),
        },
        DiscountTier {
            min_subtotal: dec!(5000),
            percent: dec!(20),
        },
    ]
}

fn default_deposit_percent() -> Decimal {
    dec!(10)
}
fn default_balance_terms_days() -> i64 {
    30
}
fn default_free_shipping_threshold() -> Decimal {
    dec!(500)
}

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

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 64 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must be at least 64 characters for adequate security".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

fn validate_discount_tiers(tiers: &Vec<DiscountTier>) -> Result<(), ValidationError> {
    if tiers.is_empty() {
        let mut err = ValidationError::new("discount_tiers");
        err.message = Some("at least one discount tier is required".into());
        return Err(err);
    }
    let out_of_range = tiers
        .iter()
        .any(|t| t.percent < Decimal::ZERO || t.percent > dec!(100) || t.min_subtotal < Decimal::ZERO);
    if out_of_range {
        let mut err = ValidationError::new("discount_tiers");
        err.message = Some("tier percent must be within 0..=100 and thresholds non-negative".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("flexvolt_ops={},tower_http=debug", level);
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

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same layering as [`load_config`] with an explicit config directory.
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    // jwt_secret has no default and must come from a file or APP__JWT_SECRET.
    let config = Config::builder()
        .set_default("database_url", "sqlite://flexvolt.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET (minimum 64 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;
    validate_config(&app_config)?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

pub fn validate_config(config: &AppConfig) -> Result<(), AppConfigError> {
    config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;
    config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str =
        "k3Jd9sLq0PzX7vB2nM5cR8tY1wE4uI6oA9sD2fG5hJ8kL1zX4cV7bN0mQ3wE6rT9yU";

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            SECRET.into(),
            "development".into(),
        )
    }

    #[test]
    fn defaults_validate() {
        let cfg = base_config();
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(cfg.access_token_ttl_secs, 900);
        assert_eq!(cfg.max_failed_logins, 5);
        assert_eq!(cfg.pricing.discount_tiers.len(), 4);
    }

    #[test]
    fn short_secret_is_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, AppConfigError::Validation(e) if e.field_errors().contains_key("jwt_secret")));
    }

    #[test]
    fn refresh_must_outlive_access() {
        let mut cfg = base_config();
        cfg.refresh_token_ttl_secs = 3600;
        cfg.access_token_ttl_secs = 7200;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn empty_discount_table_is_rejected() {
        let mut cfg = base_config();
        cfg.pricing.discount_tiers.clear();
        assert!(validate_config(&cfg).is_err());
    }

    fn config_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().expect("temp dir");
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).expect("write config");
        }
        dir
    }

    #[test]
    fn environment_file_overrides_default_file() {
        let dir = config_dir(&[
            (
                "default.toml",
                &format!("jwt_secret = \"{}\"\nport = 9000\nmax_failed_logins = 7\n", SECRET),
            ),
            ("staging.toml", "port = 9100\n"),
        ]);

        let cfg = load_config_from(dir.path(), "staging").expect("load");

        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.max_failed_logins, 7);
        assert_eq!(cfg.environment, "staging");
    }

    #[test]
    fn discount_table_loads_from_file() {
        let dir = config_dir(&[(
            "default.toml",
            &format!(
                "jwt_secret = \"{}\"\n\n\
                 [[pricing.discount_tiers]]\nmin_subtotal = \"0\"\npercent = \"0\"\n\n\
                 [[pricing.discount_tiers]]\nmin_subtotal = \"750\"\npercent = \"5\"\n",
                SECRET
            ),
        )]);

        let cfg = load_config_from(dir.path(), "development").expect("load");

        assert_eq!(
            cfg.pricing.discount_tiers[1],
            DiscountTier {
                min_subtotal: dec!(750),
                percent: dec!(5),
            }
        );
        let json = serde_json::to_value(&cfg.pricing.discount_tiers).expect("serialize tiers");
        assert_eq!(json[1]["percent"], "5");
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let dir = config_dir(&[(
            "default.toml",
            &format!("jwt_secret = \"{}\"\nlog_level = \"loud\"\n", SECRET),
        )]);

        let result = load_config_from(dir.path(), "development");

        assert!(matches!(result, Err(AppConfigError::Validation(_))));
    }
}
