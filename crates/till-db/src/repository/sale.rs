//! # Sale Repository
//!
//! Sales, sale items and payments. Sales are owned by the checkout
//! subsystem; this service creates them only when resolving orphan payment
//! orders, and updates their status when refunding.
//!
//! ## Row Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales ─┬─< sale_items        (snapshot of description and price)     │
//! │         └─< payments          (one per tender)                         │
//! │                                                                         │
//! │  sale_number ← sequence_counters[tenant, "sale"]                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{begin_write, new_id};
use crate::repository::sequence::{next_value, SALE_SCOPE};
use till_core::orphan::{SaleLine, SaleTotals};
use till_core::{Money, Payment, PaymentMethod, Sale, SaleItem, SaleStatus};

/// A sale with its items and payments.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
}

/// A tender to attach to a new sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub method: PaymentMethod,
    pub amount: Money,
    pub reference: Option<String>,
    pub card_brand: Option<String>,
    pub card_last_four: Option<String>,
    pub installments: Option<i64>,
}

impl NewPayment {
    pub fn new(method: PaymentMethod, amount: Money) -> Self {
        NewPayment {
            method,
            amount,
            reference: None,
            card_brand: None,
            card_last_four: None,
            installments: None,
        }
    }
}

/// Everything needed to insert a COMPLETED sale.
#[derive(Debug, Clone, Default)]
pub struct NewSale {
    pub point_of_sale_id: Option<String>,
    pub cash_session_id: Option<String>,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<SaleLine>,
    pub payments: Vec<NewPayment>,
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl SaleRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        SaleRepository { pool, tenant_id }
    }

    pub async fn get(&self, id: &str) -> DbResult<Sale> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, &self.tenant_id, id).await
    }

    pub async fn detail(&self, id: &str) -> DbResult<SaleDetail> {
        let mut conn = self.pool.acquire().await?;
        let sale = fetch_sale(&mut conn, &self.tenant_id, id).await?;
        let items = fetch_items(&mut conn, &self.tenant_id, id).await?;
        let payments = fetch_payments(&mut conn, &self.tenant_id, id).await?;

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }

    /// Inserts a COMPLETED sale with a fresh sale number.
    ///
    /// Used by seeding and tests; live sales arrive from checkout.
    pub async fn create_completed(&self, user_id: &str, new_sale: &NewSale) -> DbResult<SaleDetail> {
        let mut tx = begin_write(&self.pool).await?;
        let detail = insert_sale(&mut tx, &self.tenant_id, user_id, new_sale).await?;
        tx.commit().await?;
        Ok(detail)
    }
}

// =============================================================================
// Connection-level helpers (shared with orphan and refund repositories)
// =============================================================================

pub(crate) async fn fetch_sale(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<Sale> {
    sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1 AND tenant_id = ?2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    sale_id: &str,
) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        "SELECT * FROM sale_items WHERE sale_id = ?1 AND tenant_id = ?2 ORDER BY rowid",
    )
    .bind(sale_id)
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

pub(crate) async fn fetch_payments(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    sale_id: &str,
) -> DbResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE sale_id = ?1 AND tenant_id = ?2 ORDER BY rowid",
    )
    .bind(sale_id)
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(payments)
}

/// Inserts a COMPLETED sale, its items and payments on `conn`.
///
/// Totals are derived from the lines. The caller owns the transaction.
pub(crate) async fn insert_sale(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    user_id: &str,
    new_sale: &NewSale,
) -> DbResult<SaleDetail> {
    let now = Utc::now();
    let totals = SaleTotals::from_lines(&new_sale.lines);
    let sale_number = next_value(conn, tenant_id, SALE_SCOPE).await?;

    let sale = Sale {
        id: new_id(),
        tenant_id: tenant_id.to_string(),
        sale_number,
        point_of_sale_id: new_sale.point_of_sale_id.clone(),
        cash_session_id: new_sale.cash_session_id.clone(),
        customer_id: new_sale.customer_id.clone(),
        user_id: user_id.to_string(),
        status: SaleStatus::Completed,
        subtotal_cents: totals.subtotal.cents(),
        discount_cents: totals.discount.cents(),
        total_cents: totals.total.cents(),
        notes: new_sale.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    debug!(tenant_id = %tenant_id, sale_id = %sale.id, sale_number, total = %totals.total, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, tenant_id, sale_number, point_of_sale_id, cash_session_id,
            customer_id, user_id, status,
            subtotal_cents, discount_cents, total_cents, notes,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.tenant_id)
    .bind(sale.sale_number)
    .bind(&sale.point_of_sale_id)
    .bind(&sale.cash_session_id)
    .bind(&sale.customer_id)
    .bind(&sale.user_id)
    .bind(sale.status)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(&sale.notes)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    let mut items = Vec::with_capacity(new_sale.lines.len());
    for line in &new_sale.lines {
        let item = SaleItem {
            id: new_id(),
            sale_id: sale.id.clone(),
            product_id: line.product_id.clone(),
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            discount_cents: line.discount.cents(),
            line_total_cents: line.line_total().cents(),
        };

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, tenant_id, sale_id, product_id, description,
                quantity, unit_price_cents, discount_cents, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(tenant_id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.discount_cents)
        .bind(item.line_total_cents)
        .execute(&mut *conn)
        .await?;

        items.push(item);
    }

    let mut payments = Vec::with_capacity(new_sale.payments.len());
    for tender in &new_sale.payments {
        let payment = Payment {
            id: new_id(),
            sale_id: sale.id.clone(),
            method: tender.method,
            amount_cents: tender.amount.cents(),
            reference: tender.reference.clone(),
            card_brand: tender.card_brand.clone(),
            card_last_four: tender.card_last_four.clone(),
            installments: tender.installments,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, tenant_id, sale_id, method, amount_cents, reference,
                card_brand, card_last_four, installments, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&payment.id)
        .bind(tenant_id)
        .bind(&payment.sale_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(&payment.reference)
        .bind(&payment.card_brand)
        .bind(&payment.card_last_four)
        .bind(payment.installments)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        payments.push(payment);
    }

    Ok(SaleDetail {
        sale,
        items,
        payments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_create_completed_sale_derives_totals() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        let sales = db.tenant("acme").sales();

        let new_sale = NewSale {
            lines: vec![fixtures::line("Coffee", 2, 1_500, 0), fixtures::line("Cake", 1, 3_000, 500)],
            payments: vec![NewPayment::new(PaymentMethod::Cash, Money::from_cents(5_500))],
            ..NewSale::default()
        };
        let detail = sales.create_completed("cashier-1", &new_sale).await.unwrap();

        assert_eq!(detail.sale.subtotal_cents, 6_000);
        assert_eq!(detail.sale.discount_cents, 500);
        assert_eq!(detail.sale.total_cents, 5_500);
        assert_eq!(detail.sale.status, SaleStatus::Completed);
        assert_eq!(detail.items[1].line_total_cents, 2_500);

        let reloaded = sales.detail(&detail.sale.id).await.unwrap();
        assert_eq!(reloaded.items.len(), 2);
        assert_eq!(reloaded.payments[0].method, PaymentMethod::Cash);
    }

    #[tokio::test]
    async fn test_sale_numbers_are_sequential_per_tenant() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        let acme = db.tenant("acme").sales();
        let other = db.tenant("other").sales();
        let new_sale = NewSale {
            lines: vec![fixtures::line("Tea", 1, 1_000, 0)],
            ..NewSale::default()
        };

        let first = acme.create_completed("u", &new_sale).await.unwrap();
        let second = acme.create_completed("u", &new_sale).await.unwrap();
        let foreign = other.create_completed("u", &new_sale).await.unwrap();

        assert_eq!(first.sale.sale_number, 1);
        assert_eq!(second.sale.sale_number, 2);
        assert_eq!(foreign.sale.sale_number, 1);
        assert!(other.get(&first.sale.id).await.is_err());
    }
}
