//! `/cash-sessions`: shifts, their sales totals, counts and cash movements.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use till_core::commands::{
    CloseSessionRequest, DailyReportQuery, OpenSessionRequest, RecordCountRequest,
    RecordMovementRequest, RecordSaleRequest, SessionListQuery,
};
use till_core::session::{CashCount, CashMovement, CashSession, DailyReport};
use till_core::validation::validate_id;
use till_core::Page;
use till_db::{ClosedSession, RecordedMovement};

use super::{tenant, CreatedReply, EntityId, Reply};
use crate::auth::AuthContext;
use crate::error::{created, ok};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(open_session).get(list_sessions))
        .route("/current", get(current_session))
        .route("/report/daily", get(daily_report))
        .route("/{id}", get(get_session))
        .route("/{id}/sales", post(record_sale))
        .route("/{id}/close", post(close_session))
        .route("/{id}/counts", post(record_count).get(list_counts))
        .route("/{id}/movements", post(record_movement).get(list_movements))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSessionQuery {
    pub point_of_sale_id: String,
}

pub async fn open_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Result<Json<OpenSessionRequest>, JsonRejection>,
) -> CreatedReply<CashSession> {
    let Json(body) = body?;
    let cmd = body.validate()?;
    let session = tenant(&state, &auth).cash_sessions().open(&auth.user_id, cmd).await?;
    Ok(created(session))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<SessionListQuery>, QueryRejection>,
) -> Reply<Page<CashSession>> {
    let Query(query) = query?;
    let (filter, page) = query.validate()?;
    let sessions = tenant(&state, &auth).cash_sessions().list(&filter, page).await?;
    Ok(ok(sessions))
}

/// The OPEN session of a point of sale, or `null`.
pub async fn current_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<CurrentSessionQuery>, QueryRejection>,
) -> Reply<Option<CashSession>> {
    let Query(query) = query?;
    let pos_id = validate_id("pointOfSaleId", &query.point_of_sale_id)?;
    let session = tenant(&state, &auth)
        .cash_sessions()
        .current_for_point_of_sale(&pos_id)
        .await?;
    Ok(ok(session))
}

pub async fn daily_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<DailyReportQuery>, QueryRejection>,
) -> Reply<DailyReport> {
    let Query(query) = query?;
    let (date, branch_id) = query.validate()?;
    let report = tenant(&state, &auth)
        .cash_sessions()
        .daily_report(date, branch_id, state.config.report_utc_offset_minutes)
        .await?;
    Ok(ok(report))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
) -> Reply<CashSession> {
    let session = tenant(&state, &auth).cash_sessions().get(&id).await?;
    Ok(ok(session))
}

pub async fn record_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
    body: Result<Json<RecordSaleRequest>, JsonRejection>,
) -> Reply<CashSession> {
    let Json(body) = body?;
    let cmd = body.validate()?;
    let session = tenant(&state, &auth).cash_sessions().record_sale(&id, cmd).await?;
    Ok(ok(session))
}

pub async fn close_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
    body: Result<Json<CloseSessionRequest>, JsonRejection>,
) -> Reply<ClosedSession> {
    let Json(body) = body?;
    let cmd = body.validate()?;
    let closed = tenant(&state, &auth)
        .cash_sessions()
        .close(&id, &auth.user_id, cmd)
        .await?;
    Ok(ok(closed))
}

pub async fn record_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
    body: Result<Json<RecordCountRequest>, JsonRejection>,
) -> CreatedReply<CashCount> {
    let Json(body) = body?;
    let cmd = body.validate()?;
    let count = tenant(&state, &auth)
        .cash_sessions()
        .record_count(&id, &auth.user_id, cmd)
        .await?;
    Ok(created(count))
}

pub async fn list_counts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
) -> Reply<Vec<CashCount>> {
    let counts = tenant(&state, &auth).cash_sessions().counts(&id).await?;
    Ok(ok(counts))
}

pub async fn record_movement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
    body: Result<Json<RecordMovementRequest>, JsonRejection>,
) -> CreatedReply<RecordedMovement> {
    let Json(body) = body?;
    let cmd = body.validate()?;
    let recorded = tenant(&state, &auth)
        .cash_movements()
        .record(&id, &auth.user_id, cmd)
        .await?;
    Ok(created(recorded))
}

pub async fn list_movements(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    EntityId(id): EntityId,
) -> Reply<Vec<CashMovement>> {
    let movements = tenant(&state, &auth).cash_movements().list(&id).await?;
    Ok(ok(movements))
}
