//! Route tables. Everything here sits behind [`crate::auth::require_auth`].

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::{Json, Router};
use till_core::validation::validate_id;
use till_db::TenantScope;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::AppState;

pub mod cash_sessions;
pub mod health;
pub mod orphans;
pub mod sales;
pub mod treasury;

/// 200 reply carrying `T` in the success envelope.
pub type Reply<T> = ApiResult<Json<ApiResponse<T>>>;

/// 201 reply carrying `T` in the success envelope.
pub type CreatedReply<T> = ApiResult<(StatusCode, Json<ApiResponse<T>>)>;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/cash-sessions", cash_sessions::router())
        .nest("/treasury", treasury::router())
        .nest("/mp-orphan-orders", orphans::router())
        .nest("/sales", sales::router())
}

/// `{id}` path segment of a session, withdrawal or sale. Must be a UUID.
#[derive(Debug, Clone)]
pub struct EntityId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for EntityId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state).await?;
        Ok(EntityId(validate_id("id", &id)?))
    }
}

/// Repositories bound to the caller's tenant.
fn tenant(state: &AppState, auth: &AuthContext) -> TenantScope {
    state.db.tenant(auth.tenant_id.as_str())
}
