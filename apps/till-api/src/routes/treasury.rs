//! `/treasury`: reconciling withdrawals, the balance and outgoing movements.
//!
//! Resolving withdrawals and recording movements need the `treasury` or
//! `admin` role; reads are open to any authenticated user of the tenant.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use till_core::commands::{
    ConfirmWithdrawalRequest, DateRangeQuery, MovementListQuery, PendingListQuery,
    RecordTreasuryMovementRequest, RejectWithdrawalRequest,
};
use till_core::treasury::{TreasuryBalance, TreasuryMovement, TreasuryPendingWithdrawal, TreasurySummary};
use till_core::Page;
use till_db::RecordedTreasuryMovement;

use super::{tenant, CreatedReply, EntityId, Reply};
use crate::auth::AuthContext;
use crate::error::{created, ok};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(list_pending))
        .route("/pending/{id}", get(get_pending))
        .route("/pending/{id}/confirm", post(confirm_withdrawal))
        .route("/pending/{id}/reject", post(reject_withdrawal))
        .route("/summary", get(summary))
        .route("/balance", get(balance))
        .route("/movements", post(record_movement).get(list_movements))
}

pub async fn list_pending(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<PendingListQuery>, QueryRejection>,
) -> Reply<Page<TreasuryPendingWithdrawal>> {
    let Query(query) = query?;
    let (filter, page) = query.validate()?;
    let pending = tenant(&state, &auth).treasury().list_pending(&filter, page).await?;
    Ok(ok(pending))
}

pub async fn get_pending(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
) -> Reply<TreasuryPendingWithdrawal> {
    let pending = tenant(&state, &auth).treasury().get(&id).await?;
    Ok(ok(pending))
}

pub async fn confirm_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
    body: Result<Json<ConfirmWithdrawalRequest>, JsonRejection>,
) -> Reply<TreasuryPendingWithdrawal> {
    auth.require_treasury()?;
    let Json(body) = body?;
    let cmd = body.validate()?;
    let resolved = tenant(&state, &auth)
        .treasury()
        .confirm(&id, &auth.user_id, cmd)
        .await?;
    Ok(ok(resolved))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
    body: Result<Json<RejectWithdrawalRequest>, JsonRejection>,
) -> Reply<TreasuryPendingWithdrawal> {
    auth.require_treasury()?;
    let Json(body) = body?;
    let cmd = body.validate()?;
    let resolved = tenant(&state, &auth)
        .treasury()
        .reject(&id, &auth.user_id, cmd)
        .await?;
    Ok(ok(resolved))
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<DateRangeQuery>, QueryRejection>,
) -> Reply<TreasurySummary> {
    let Query(query) = query?;
    let range = query.validate()?;
    let summary = tenant(&state, &auth).treasury().summary(range).await?;
    Ok(ok(summary))
}

pub async fn balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Reply<TreasuryBalance> {
    let balance = tenant(&state, &auth)
        .treasury_movements()
        .balance(state.config.balance_anchor)
        .await?;
    Ok(ok(balance))
}

pub async fn record_movement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Result<Json<RecordTreasuryMovementRequest>, JsonRejection>,
) -> CreatedReply<RecordedTreasuryMovement> {
    auth.require_treasury()?;
    let Json(body) = body?;
    let cmd = body.validate()?;
    let recorded = tenant(&state, &auth)
        .treasury_movements()
        .record(&auth.user_id, cmd, state.config.balance_anchor)
        .await?;
    Ok(created(recorded))
}

pub async fn list_movements(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<MovementListQuery>, QueryRejection>,
) -> Reply<Page<TreasuryMovement>> {
    let Query(query) = query?;
    let (filter, page) = query.validate()?;
    let movements = tenant(&state, &auth).treasury_movements().list(&filter, page).await?;
    Ok(ok(movements))
}
