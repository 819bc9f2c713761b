//! # Till API
//!
//! HTTP server for the cash-session and treasury back office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Till API Routes                               │
//! │                                                                         │
//! │  GET /health (no auth)                                                  │
//! │                                                                         │
//! │  ── require_auth (Bearer JWT → AuthContext) ──────────────────────────  │
//! │                                                                         │
//! │  ┌────────────────────┐  ┌─────────────────────┐  ┌──────────────────┐ │
//! │  │  /cash-sessions    │  │  /treasury          │  │ /mp-orphan-orders│ │
//! │  │                    │  │                     │  │                  │ │
//! │  │ • open / list      │  │ • pending (+resolve)│  │ • list / get     │ │
//! │  │ • sales, close     │  │ • summary, balance  │  │ • create-sale    │ │
//! │  │ • counts, movements│  │ • movements         │  │ • link-sale      │ │
//! │  │ • report/daily     │  │                     │  │                  │ │
//! │  └────────────────────┘  └─────────────────────┘  └──────────────────┘ │
//! │                                                                         │
//! │  ┌────────────────────┐                                                 │
//! │  │  /sales            │   Every handler: validate body → tenant-scoped  │
//! │  │ • detail, refunds  │   repository call → success envelope            │
//! │  │ • refund           │                                                 │
//! │  └────────────────────┘                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `HTTP_PORT` - server port (default: 8080)
//! - `DATABASE_PATH` - SQLite file (default: ./till.db)
//! - `DB_MAX_CONNECTIONS` - pool size (default: 5)
//! - `JWT_SECRET` - HS256 secret for bearer tokens
//! - `TREASURY_BALANCE_SINCE` - RFC 3339 balance anchor (default: all time)
//! - `REPORT_UTC_OFFSET_MINUTES` - daily report day boundary (default: 0)
//! - `FISCAL_ISSUER_URL` - credit-note endpoint (default: disabled)
//! - `FISCAL_ISSUER_TIMEOUT_SECS` - issuer timeout (default: 10)

pub mod auth;
pub mod config;
pub mod error;
pub mod fiscal;
pub mod routes;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use till_core::fiscal::{CreditNoteIssuer, DisabledCreditNoteIssuer};
use till_db::Database;
use tracing::{info, warn};

use crate::auth::JwtValidator;
use crate::fiscal::HttpCreditNoteIssuer;

// Re-exports
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtValidator>,
    pub issuer: Arc<dyn CreditNoteIssuer>,
}

impl AppState {
    /// State with the issuer the configuration asks for.
    pub fn new(db: Database, config: ApiConfig) -> Self {
        let issuer: Arc<dyn CreditNoteIssuer> = match &config.fiscal_issuer_url {
            Some(url) => match HttpCreditNoteIssuer::new(url.clone(), config.fiscal_issuer_timeout) {
                Ok(issuer) => {
                    info!(url = %url, "Fiscal issuer enabled");
                    Arc::new(issuer)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to build fiscal issuer client, credit notes disabled");
                    Arc::new(DisabledCreditNoteIssuer)
                }
            },
            None => Arc::new(DisabledCreditNoteIssuer),
        };

        Self::with_issuer(db, config, issuer)
    }

    pub fn with_issuer(db: Database, config: ApiConfig, issuer: Arc<dyn CreditNoteIssuer>) -> Self {
        AppState {
            jwt: Arc::new(JwtValidator::new(&config.jwt_secret)),
            db,
            config: Arc::new(config),
            issuer,
        }
    }
}

/// Builds the full router: `/health` plus every authenticated route.
pub fn build_router(state: AppState) -> Router {
    let protected = routes::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_auth,
    ));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(protected)
        .with_state(state)
}
