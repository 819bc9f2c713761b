//! # Orphan Order Repository
//!
//! Resolves processed card-terminal payments that have no sale.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(order, items)                                             │
//! │    BEGIN                                                                │
//! │     ├─ read order: orphan? processed? Σ items ≈ order.amount?           │
//! │     ├─ next sale number ─ INSERT sale, items, MP_POINT payment          │
//! │     └─ UPDATE order SET sale_id WHERE sale_id IS NULL  (0 ─► CONFLICT)  │
//! │    COMMIT                                                               │
//! │                                                                         │
//! │  link_sale(order, sale)  same checks against an existing sale           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use crate::repository::sale::{fetch_sale, insert_sale, NewPayment, NewSale, SaleDetail};
use till_core::commands::CreateSaleFromOrphan;
use till_core::orphan::{ensure_amount_matches, OrphanPaymentOrder, SaleTotals};
use till_core::{Page, PageRequest, PaymentMethod, Sale};

/// Outcome of resolving an orphan by creating a sale.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanSaleCreated {
    pub order: OrphanPaymentOrder,
    #[serde(flatten)]
    pub sale: SaleDetail,
}

/// Outcome of linking an orphan to an existing sale.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanLinked {
    pub order: OrphanPaymentOrder,
    pub sale: Sale,
}

#[derive(Debug, Clone)]
pub struct OrphanOrderRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl OrphanOrderRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        OrphanOrderRepository { pool, tenant_id }
    }

    /// Stores a provider order.
    ///
    /// Orders normally arrive through the provider integration; this is for
    /// seeding and tests.
    pub async fn register(&self, order: &OrphanPaymentOrder) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO mp_orphan_orders (
                order_id, tenant_id, status, amount_cents, payment_id,
                card_brand, card_last_four, installments, processed_at, sale_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&order.order_id)
        .bind(&self.tenant_id)
        .bind(&order.status)
        .bind(order.amount_cents)
        .bind(&order.payment_id)
        .bind(&order.card_brand)
        .bind(&order.card_last_four)
        .bind(order.installments)
        .bind(order.processed_at)
        .bind(&order.sale_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Processed orders without a sale, newest first.
    pub async fn list_orphans(&self, page: PageRequest) -> DbResult<Page<OrphanPaymentOrder>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM mp_orphan_orders
            WHERE tenant_id = ?1 AND LOWER(status) = 'processed' AND sale_id IS NULL
            "#,
        )
        .bind(&self.tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let orders = sqlx::query_as::<_, OrphanPaymentOrder>(
            r#"
            SELECT * FROM mp_orphan_orders
            WHERE tenant_id = ?1 AND LOWER(status) = 'processed' AND sale_id IS NULL
            ORDER BY processed_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&self.tenant_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(orders, total, page))
    }

    pub async fn get(&self, order_id: &str) -> DbResult<OrphanPaymentOrder> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, &self.tenant_id, order_id).await
    }

    /// Creates the missing sale for an orphan order.
    ///
    /// ## Errors
    /// - NOT_FOUND: unknown order, or already linked
    /// - NOT_FOUND: `point_of_sale_id` unknown for this tenant
    /// - BAD_REQUEST: order not processed
    /// - AMOUNT_MISMATCH: item total differs from the order by more than one cent
    /// - CONFLICT: the order was linked concurrently
    pub async fn create_sale(
        &self,
        order_id: &str,
        actor: &str,
        cmd: CreateSaleFromOrphan,
    ) -> DbResult<OrphanSaleCreated> {
        debug!(tenant_id = %self.tenant_id, order_id = %order_id, items = cmd.lines.len(), "Creating sale from orphan order");

        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, &self.tenant_id, order_id).await?;
        order.ensure_resolvable()?;
        let totals = SaleTotals::from_lines(&cmd.lines);
        ensure_amount_matches(order.amount(), totals.total)?;

        if let Some(pos_id) = &cmd.point_of_sale_id {
            let exists: Option<i64> = sqlx::query_scalar(
                "SELECT 1 FROM points_of_sale WHERE id = ?1 AND tenant_id = ?2",
            )
            .bind(pos_id)
            .bind(&self.tenant_id)
            .fetch_optional(&mut *tx)
            .await?;
            if exists.is_none() {
                return Err(DbError::not_found("Point of sale", pos_id));
            }
        }

        let new_sale = NewSale {
            point_of_sale_id: cmd.point_of_sale_id,
            cash_session_id: None,
            customer_id: cmd.customer_id,
            notes: cmd.notes,
            lines: cmd.lines,
            payments: vec![NewPayment {
                method: PaymentMethod::MpPoint,
                amount: order.amount(),
                reference: Some(order.payment_id.clone()),
                card_brand: order.card_brand.clone(),
                card_last_four: order.card_last_four.clone(),
                installments: Some(order.installments),
            }],
        };
        let detail = insert_sale(&mut tx, &self.tenant_id, actor, &new_sale).await?;

        link_order(&mut tx, &self.tenant_id, order_id, &detail.sale.id).await?;
        let order = fetch_order(&mut tx, &self.tenant_id, order_id).await?;
        tx.commit().await?;

        info!(
            tenant_id = %self.tenant_id,
            order_id = %order_id,
            sale_id = %detail.sale.id,
            sale_number = detail.sale.sale_number,
            total_cents = detail.sale.total_cents,
            "Orphan order resolved with new sale"
        );

        Ok(OrphanSaleCreated {
            order,
            sale: detail,
        })
    }

    /// Links an orphan order to an existing sale.
    ///
    /// ## Errors
    /// - NOT_FOUND: unknown order or sale, or order already linked
    /// - BAD_REQUEST: order not processed
    /// - CONFLICT: the sale already backs another order
    /// - AMOUNT_MISMATCH: sale total differs from the order by more than one cent
    pub async fn link_sale(&self, order_id: &str, sale_id: &str) -> DbResult<OrphanLinked> {
        debug!(tenant_id = %self.tenant_id, order_id = %order_id, sale_id = %sale_id, "Linking orphan order to sale");

        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, &self.tenant_id, order_id).await?;
        order.ensure_resolvable()?;
        let sale = fetch_sale(&mut tx, &self.tenant_id, sale_id).await?;

        let linked_elsewhere: Option<String> = sqlx::query_scalar(
            "SELECT order_id FROM mp_orphan_orders WHERE sale_id = ?1 AND tenant_id = ?2",
        )
        .bind(sale_id)
        .bind(&self.tenant_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(other) = linked_elsewhere {
            return Err(DbError::conflict(format!(
                "Sale {} is already linked to order {}",
                sale_id, other
            )));
        }

        ensure_amount_matches(order.amount(), sale.total())?;

        link_order(&mut tx, &self.tenant_id, order_id, sale_id).await?;
        let order = fetch_order(&mut tx, &self.tenant_id, order_id).await?;
        tx.commit().await?;

        info!(tenant_id = %self.tenant_id, order_id = %order_id, sale_id = %sale_id, "Orphan order linked");

        Ok(OrphanLinked { order, sale })
    }
}

async fn fetch_order(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    order_id: &str,
) -> DbResult<OrphanPaymentOrder> {
    sqlx::query_as::<_, OrphanPaymentOrder>(
        "SELECT * FROM mp_orphan_orders WHERE order_id = ?1 AND tenant_id = ?2",
    )
    .bind(order_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Orphan order", order_id))
}

/// Compare-and-set of the order's sale link.
async fn link_order(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    order_id: &str,
    sale_id: &str,
) -> DbResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE mp_orphan_orders SET sale_id = ?1
        WHERE order_id = ?2 AND tenant_id = ?3 AND sale_id IS NULL
        "#,
    )
    .bind(sale_id)
    .bind(order_id)
    .bind(tenant_id)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)
    .map_err(|err| {
        if err.is_unique_violation_on("mp_orphan_orders") {
            DbError::conflict(format!("Sale {} is already linked to another order", sale_id))
        } else {
            err
        }
    })?;

    if updated.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "Order {} was linked concurrently",
            order_id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::Database;
    use chrono::Utc;
    use till_core::orphan::SaleLine;
    use till_core::{CoreError, SaleStatus};

    fn order(order_id: &str, status: &str, amount_cents: i64) -> OrphanPaymentOrder {
        OrphanPaymentOrder {
            order_id: order_id.to_string(),
            tenant_id: "acme".to_string(),
            status: status.to_string(),
            amount_cents,
            payment_id: format!("pay-{}", order_id),
            card_brand: Some("visa".to_string()),
            card_last_four: Some("4242".to_string()),
            installments: 3,
            processed_at: Utc::now(),
            sale_id: None,
        }
    }

    fn create(lines: Vec<SaleLine>) -> CreateSaleFromOrphan {
        CreateSaleFromOrphan {
            lines,
            customer_id: None,
            notes: Some("Recovered from terminal".to_string()),
            point_of_sale_id: None,
        }
    }

    async fn sale_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_matching_items_create_sale_and_link() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        let orphans = db.tenant("acme").orphan_orders();
        orphans.register(&order("ord-1", "processed", 25_000)).await.unwrap();

        let created = orphans
            .create_sale(
                "ord-1",
                "admin-1",
                create(vec![
                    fixtures::line("Shoes", 1, 20_000, 0),
                    fixtures::line("Socks", 2, 2_500, 0),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(created.sale.sale.total_cents, 25_000);
        assert_eq!(created.sale.sale.status, SaleStatus::Completed);
        assert_eq!(created.sale.sale.user_id, "admin-1");
        assert_eq!(created.order.sale_id.as_deref(), Some(created.sale.sale.id.as_str()));

        let payment = &created.sale.payments[0];
        assert_eq!(payment.method, PaymentMethod::MpPoint);
        assert_eq!(payment.reference.as_deref(), Some("pay-ord-1"));
        assert_eq!(payment.installments, Some(3));

        let page = orphans.list_orphans(PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_mismatched_items_create_nothing() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        let orphans = db.tenant("acme").orphan_orders();
        orphans.register(&order("ord-1", "processed", 25_000)).await.unwrap();

        let err = orphans
            .create_sale("ord-1", "admin-1", create(vec![fixtures::line("Shoes", 1, 20_000, 0)]))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::AmountMismatch { .. })));
        assert_eq!(sale_count(&db).await, 0);
        assert!(orphans.get("ord-1").await.unwrap().sale_id.is_none());
    }

    #[tokio::test]
    async fn test_resolution_is_not_repeatable() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        let orphans = db.tenant("acme").orphan_orders();
        orphans.register(&order("ord-1", "processed", 1_000)).await.unwrap();
        let lines = vec![fixtures::line("Tea", 1, 1_000, 0)];

        orphans.create_sale("ord-1", "admin-1", create(lines.clone())).await.unwrap();
        let err = orphans.create_sale("ord-1", "admin-1", create(lines)).await.unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::NotFound { .. })));
        assert_eq!(sale_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_unprocessed_order_is_bad_request() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        let orphans = db.tenant("acme").orphan_orders();
        orphans.register(&order("ord-1", "canceled", 1_000)).await.unwrap();

        let err = orphans
            .create_sale("ord-1", "admin-1", create(vec![fixtures::line("Tea", 1, 1_000, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn test_link_existing_sale() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        let tenant = db.tenant("acme");
        let orphans = tenant.orphan_orders();
        orphans.register(&order("ord-1", "processed", 4_000)).await.unwrap();
        orphans.register(&order("ord-2", "processed", 4_000)).await.unwrap();
        orphans.register(&order("ord-3", "processed", 9_999)).await.unwrap();

        let sale = tenant
            .sales()
            .create_completed(
                "cashier-1",
                &NewSale {
                    lines: vec![fixtures::line("Lamp", 1, 4_000, 0)],
                    ..NewSale::default()
                },
            )
            .await
            .unwrap();

        let mismatch = orphans.link_sale("ord-3", &sale.sale.id).await.unwrap_err();
        assert!(matches!(mismatch, DbError::Domain(CoreError::AmountMismatch { .. })));

        let linked = orphans.link_sale("ord-1", &sale.sale.id).await.unwrap();
        assert_eq!(linked.order.sale_id.as_deref(), Some(sale.sale.id.as_str()));

        let taken = orphans.link_sale("ord-2", &sale.sale.id).await.unwrap_err();
        assert!(matches!(taken, DbError::Domain(CoreError::Conflict(_))));

        let unknown = orphans.link_sale("ord-2", &crate::repository::new_id()).await.unwrap_err();
        assert!(matches!(unknown, DbError::Domain(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_orders_are_tenant_scoped() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        db.tenant("acme")
            .orphan_orders()
            .register(&order("ord-1", "processed", 1_000))
            .await
            .unwrap();

        let other = db.tenant("other").orphan_orders();
        assert!(matches!(
            other.get("ord-1").await,
            Err(DbError::Domain(CoreError::NotFound { .. }))
        ));
        assert_eq!(other.list_orphans(PageRequest::default()).await.unwrap().total, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_create_sale_makes_one_sale() {
        let (_dir, db, _pos) = fixtures::setup_shared("acme").await;

        for round in 0..5 {
            let order_id = format!("ord-race-{}", round);
            db.tenant("acme")
                .orphan_orders()
                .register(&order(&order_id, "processed", 25_000))
                .await
                .unwrap();

            let results = fixtures::race(6, || {
                let db = db.clone();
                let order_id = order_id.clone();
                async move {
                    db.tenant("acme")
                        .orphan_orders()
                        .create_sale(
                            &order_id,
                            "admin-1",
                            create(vec![fixtures::line("Shoes", 1, 25_000, 0)]),
                        )
                        .await
                }
            })
            .await;

            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1, "round {}", round);
            // Losers find the order already linked.
            for err in results.into_iter().filter_map(Result::err) {
                assert!(
                    matches!(err, DbError::Domain(CoreError::NotFound { .. })),
                    "round {}: {}",
                    round,
                    err
                );
            }
            assert_eq!(sale_count(&db).await, round + 1);
        }
    }
}
