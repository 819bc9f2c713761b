//! # Refund Repository
//!
//! Full and partial refunds of completed sales, with optional credit notes.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE                            (write lock)                │
//! │   ├─ UPDATE sales SET updated_at            (NOT_FOUND)                 │
//! │   ├─ load sale, items, units already refunded                           │
//! │   ├─ RefundPlan::build                      (all validation)            │
//! │   ├─ INSERT sale_refunds + sale_refund_items                            │
//! │   └─ UPDATE sales SET status                                            │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  issue_credit_note?  ── ok ──► store voucher + CAE on the refund        │
//! │                      └─ err ─► warn!, report credit_note_error          │
//! │                                (refund stays committed)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{begin_write, new_id};
use crate::repository::sale::{fetch_items, fetch_sale};
use till_core::commands::RefundSale;
use till_core::fiscal::{CreditNote, CreditNoteIssuer, CreditNoteLine, CreditNoteRequest};
use till_core::refund::{RefundPlan, SaleRefund, SaleRefundItem};
use till_core::SaleStatus;

/// Result of a committed refund.
///
/// `credit_note_error` is set when issuance was requested and failed; the
/// refund itself succeeded either way.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub refund: SaleRefund,
    pub items: Vec<SaleRefundItem>,
    pub sale_status: SaleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_note: Option<CreditNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_note_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefundRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl RefundRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        RefundRepository { pool, tenant_id }
    }

    /// Refunds items of a sale.
    ///
    /// ## Errors
    /// - NOT_FOUND: unknown sale
    /// - BAD_REQUEST: sale REFUNDED/CANCELLED, or quantity above what remains
    /// - VALIDATION_ERROR: item not in the sale, duplicated, or quantity ≤ 0
    ///
    /// Credit note failures are never errors; see [`RefundOutcome`].
    pub async fn refund(
        &self,
        sale_id: &str,
        actor: &str,
        cmd: RefundSale,
        issuer: &dyn CreditNoteIssuer,
    ) -> DbResult<RefundOutcome> {
        debug!(tenant_id = %self.tenant_id, sale_id = %sale_id, lines = cmd.lines.len(), "Refunding sale");

        let mut tx = begin_write(&self.pool).await?;
        let now = Utc::now();

        let locked = sqlx::query("UPDATE sales SET updated_at = ?1 WHERE id = ?2 AND tenant_id = ?3")
            .bind(now)
            .bind(sale_id)
            .bind(&self.tenant_id)
            .execute(&mut *tx)
            .await?;
        if locked.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        let sale = fetch_sale(&mut tx, &self.tenant_id, sale_id).await?;
        let items = fetch_items(&mut tx, &self.tenant_id, sale_id).await?;

        let refunded_rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT ri.sale_item_id, SUM(ri.quantity)
            FROM sale_refund_items ri
            JOIN sale_refunds r ON r.id = ri.refund_id
            WHERE r.sale_id = ?1 AND r.tenant_id = ?2
            GROUP BY ri.sale_item_id
            "#,
        )
        .bind(sale_id)
        .bind(&self.tenant_id)
        .fetch_all(&mut *tx)
        .await?;
        let already_refunded: HashMap<String, i64> = refunded_rows.into_iter().collect();

        let plan = RefundPlan::build(sale_id, sale.status, &items, &already_refunded, &cmd.lines)?;

        let refund = SaleRefund {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            sale_id: sale_id.to_string(),
            reason: cmd.reason,
            total_cents: plan.total.cents(),
            created_by: actor.to_string(),
            created_at: now,
            credit_note_voucher: None,
            credit_note_cae: None,
        };

        sqlx::query(
            r#"
            INSERT INTO sale_refunds (id, tenant_id, sale_id, reason, total_cents, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.tenant_id)
        .bind(&refund.sale_id)
        .bind(&refund.reason)
        .bind(refund.total_cents)
        .bind(&refund.created_by)
        .bind(refund.created_at)
        .execute(&mut *tx)
        .await?;

        let mut refund_items = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let item = SaleRefundItem {
                id: new_id(),
                refund_id: refund.id.clone(),
                sale_item_id: line.sale_item_id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                amount_cents: line.amount.cents(),
            };

            sqlx::query(
                r#"
                INSERT INTO sale_refund_items (id, refund_id, sale_item_id, quantity, unit_price_cents, amount_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.refund_id)
            .bind(&item.sale_item_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.amount_cents)
            .execute(&mut *tx)
            .await?;

            refund_items.push(item);
        }

        sqlx::query("UPDATE sales SET status = ?1 WHERE id = ?2 AND tenant_id = ?3")
            .bind(plan.resulting_status)
            .bind(sale_id)
            .bind(&self.tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            tenant_id = %self.tenant_id,
            sale_id = %sale_id,
            refund_id = %refund.id,
            total_cents = refund.total_cents,
            sale_status = ?plan.resulting_status,
            "Sale refunded"
        );

        let mut outcome = RefundOutcome {
            refund,
            items: refund_items,
            sale_status: plan.resulting_status,
            credit_note: None,
            credit_note_error: None,
        };

        if cmd.issue_credit_note {
            let request = CreditNoteRequest {
                tenant_id: self.tenant_id.clone(),
                sale_id: sale_id.to_string(),
                refund_id: outcome.refund.id.clone(),
                lines: plan.lines.iter().map(CreditNoteLine::from).collect(),
                total_cents: plan.total.cents(),
            };
            self.attach_credit_note(&mut outcome, issuer, &request).await;
        }

        Ok(outcome)
    }

    /// Refunds of a sale, oldest first.
    pub async fn list(&self, sale_id: &str) -> DbResult<Vec<SaleRefund>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, &self.tenant_id, sale_id).await?;

        let refunds = sqlx::query_as::<_, SaleRefund>(
            "SELECT * FROM sale_refunds WHERE sale_id = ?1 AND tenant_id = ?2 ORDER BY created_at",
        )
        .bind(sale_id)
        .bind(&self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(refunds)
    }

    async fn attach_credit_note(
        &self,
        outcome: &mut RefundOutcome,
        issuer: &dyn CreditNoteIssuer,
        request: &CreditNoteRequest,
    ) {
        let note = match issuer.issue_credit_note(request).await {
            Ok(note) => note,
            Err(err) => {
                warn!(
                    tenant_id = %self.tenant_id,
                    refund_id = %request.refund_id,
                    error = %err,
                    "Credit note issuance failed; refund stays committed"
                );
                outcome.credit_note_error = Some(err.to_string());
                return;
            }
        };

        let stored = sqlx::query(
            "UPDATE sale_refunds SET credit_note_voucher = ?1, credit_note_cae = ?2 WHERE id = ?3 AND tenant_id = ?4",
        )
        .bind(&note.voucher_number)
        .bind(&note.cae)
        .bind(&request.refund_id)
        .bind(&self.tenant_id)
        .execute(&self.pool)
        .await;

        match stored {
            Ok(_) => {
                info!(refund_id = %request.refund_id, voucher = %note.voucher_number, "Credit note issued");
                outcome.refund.credit_note_voucher = Some(note.voucher_number.clone());
                outcome.refund.credit_note_cae = Some(note.cae.clone());
            }
            Err(err) => {
                warn!(
                    refund_id = %request.refund_id,
                    voucher = %note.voucher_number,
                    error = %err,
                    "Credit note issued but could not be stored"
                );
                outcome.credit_note_error = Some(format!(
                    "credit note {} issued but not stored: {}",
                    note.voucher_number, err
                ));
            }
        }
        outcome.credit_note = Some(note);
    }
}
