//! `/sales`: sale detail and refunds.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use till_core::commands::RefundSaleRequest;
use till_core::refund::SaleRefund;
use till_db::{RefundOutcome, SaleDetail};

use super::{tenant, CreatedReply, EntityId, Reply};
use crate::auth::AuthContext;
use crate::error::{created, ok};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_sale))
        .route("/{id}/refunds", get(list_refunds))
        .route("/{id}/refund", post(refund_sale))
}

pub async fn get_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
) -> Reply<SaleDetail> {
    let detail = tenant(&state, &auth).sales().detail(&id).await?;
    Ok(ok(detail))
}

pub async fn list_refunds(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
) -> Reply<Vec<SaleRefund>> {
    let refunds = tenant(&state, &auth).refunds().list(&id).await?;
    Ok(ok(refunds))
}

/// Commits the refund, then asks the fiscal issuer for a credit note when
/// requested. An issuer failure shows up as `creditNoteError` on a 201.
pub async fn refund_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
    body: Result<Json<RefundSaleRequest>, JsonRejection>,
) -> CreatedReply<RefundOutcome> {
    let Json(body) = body?;
    let cmd = body.validate()?;
    let outcome = tenant(&state, &auth)
        .refunds()
        .refund(&id, &auth.user_id, cmd, state.issuer.as_ref())
        .await?;
    Ok(created(outcome))
}
