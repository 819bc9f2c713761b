//! `/mp-orphan-orders`: processed card-terminal payments with no sale.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use till_core::commands::{CreateSaleFromOrphanRequest, LinkSaleRequest, PageQuery};
use till_core::orphan::OrphanPaymentOrder;
use till_core::Page;
use till_db::{OrphanLinked, OrphanSaleCreated};

use super::{tenant, CreatedReply, Reply};
use crate::auth::AuthContext;
use crate::error::{created, ok};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orphans))
        .route("/{order_id}", get(get_order))
        .route("/{order_id}/create-sale", post(create_sale))
        .route("/{order_id}/link-sale", post(link_sale))
}

pub async fn list_orphans(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Reply<Page<OrphanPaymentOrder>> {
    let Query(query) = query?;
    let page = query.validate()?;
    let orders = tenant(&state, &auth).orphan_orders().list_orphans(page).await?;
    Ok(ok(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<String>,
) -> Reply<OrphanPaymentOrder> {
    let order = tenant(&state, &auth).orphan_orders().get(&order_id).await?;
    Ok(ok(order))
}

pub async fn create_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<String>,
    body: Result<Json<CreateSaleFromOrphanRequest>, JsonRejection>,
) -> CreatedReply<OrphanSaleCreated> {
    let Json(body) = body?;
    let cmd = body.validate()?;
    let result = tenant(&state, &auth)
        .orphan_orders()
        .create_sale(&order_id, &auth.user_id, cmd)
        .await?;
    Ok(created(result))
}

pub async fn link_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<String>,
    body: Result<Json<LinkSaleRequest>, JsonRejection>,
) -> Reply<OrphanLinked> {
    let Json(body) = body?;
    let sale_id = body.validate()?;
    let result = tenant(&state, &auth)
        .orphan_orders()
        .link_sale(&order_id, &sale_id)
        .await?;
    Ok(ok(result))
}
