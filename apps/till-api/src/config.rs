//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::time::Duration;

use chrono::{DateTime, Utc};
use till_core::treasury::BalanceAnchor;

/// Widest offsets in use (UTC-12:00 .. UTC+14:00).
const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP server port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// HS256 secret used to validate bearer tokens
    pub jwt_secret: String,

    /// Where the treasury balance starts counting
    pub balance_anchor: BalanceAnchor,

    /// Offset applied to calendar days in the daily session report
    pub report_utc_offset_minutes: i32,

    /// Credit-note endpoint; no URL means issuance is disabled
    pub fiscal_issuer_url: Option<String>,

    pub fiscal_issuer_timeout: Duration,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let balance_anchor = match lookup("TREASURY_BALANCE_SINCE") {
            Some(raw) if !raw.trim().is_empty() => {
                let since = DateTime::parse_from_rfc3339(raw.trim())
                    .map_err(|_| ConfigError::InvalidValue("TREASURY_BALANCE_SINCE".to_string()))?;
                BalanceAnchor::Since(since.with_timezone(&Utc))
            }
            _ => BalanceAnchor::AllTime,
        };

        let config = ApiConfig {
            http_port: var("HTTP_PORT", "8080")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_PORT".to_string()))?,

            database_path: var("DATABASE_PATH", "./till.db"),

            db_max_connections: var("DB_MAX_CONNECTIONS", "5")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,

            jwt_secret: lookup("JWT_SECRET").unwrap_or_else(|| {
                // In production, this MUST be set via environment variable
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                "till-dev-secret-change-in-production".to_string()
            }),

            balance_anchor,

            report_utc_offset_minutes: var("REPORT_UTC_OFFSET_MINUTES", "0")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REPORT_UTC_OFFSET_MINUTES".to_string()))?,

            fiscal_issuer_url: lookup("FISCAL_ISSUER_URL").filter(|url| !url.trim().is_empty()),

            fiscal_issuer_timeout: Duration::from_secs(
                var("FISCAL_ISSUER_TIMEOUT_SECS", "10")
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("FISCAL_ISSUER_TIMEOUT_SECS".to_string()))?,
            ),
        };

        if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&config.report_utc_offset_minutes) {
            return Err(ConfigError::InvalidValue("REPORT_UTC_OFFSET_MINUTES".to_string()));
        }
        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
