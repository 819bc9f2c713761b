//! # Treasury Movements and Balance
//!
//! Outgoing treasury movements (bank deposits, supplier payments, expenses)
//! and the balance derived from them.
//!
//! ## Balance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  income   = Σ confirmed_amount_cents   status ∈ {confirmed, partial}    │
//! │             (idx_pending_withdrawals_income)                            │
//! │  expenses = Σ amount_cents             treasury_movements               │
//! │             (idx_treasury_movements_expense)                            │
//! │  balance  = income − expenses                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is cached. Every call recomputes from the ledgers, optionally from
//! a [`BalanceAnchor::Since`] checkpoint.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::DbResult;
use crate::repository::{begin_write, new_id};
use crate::repository::treasury::push_range;
use till_core::commands::{MovementFilter, RecordTreasuryMovement};
use till_core::treasury::{
    BalanceAnchor, ExpenseOutcome, ExpensePolicy, TreasuryBalance, TreasuryMovement,
};
use till_core::{Money, Page, PageRequest};

/// A recorded movement and the balance right after it.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedTreasuryMovement {
    pub movement: TreasuryMovement,
    pub balance: TreasuryBalance,
}

#[derive(Debug, Clone)]
pub struct TreasuryMovementRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl TreasuryMovementRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        TreasuryMovementRepository { pool, tenant_id }
    }

    /// Recomputes the treasury balance.
    pub async fn balance(&self, anchor: BalanceAnchor) -> DbResult<TreasuryBalance> {
        let mut conn = self.pool.acquire().await?;
        compute_balance(&mut conn, &self.tenant_id, anchor).await
    }

    /// Records an outgoing movement.
    ///
    /// Never blocked by the current balance ([`ExpensePolicy::AllowNegative`]);
    /// an overdrawn result is logged.
    pub async fn record(
        &self,
        actor: &str,
        cmd: RecordTreasuryMovement,
        anchor: BalanceAnchor,
    ) -> DbResult<RecordedTreasuryMovement> {
        let movement = TreasuryMovement {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            movement_type: cmd.details.movement_type(),
            amount_cents: cmd.amount.cents(),
            description: cmd.description,
            reference: cmd.reference,
            details: cmd.details,
            created_by: actor.to_string(),
            created_at: Utc::now(),
        };

        debug!(
            tenant_id = %self.tenant_id,
            movement_type = ?movement.movement_type,
            amount = %cmd.amount,
            "Recording treasury movement"
        );

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO treasury_movements (
                id, tenant_id, movement_type, amount_cents, description,
                reference, details, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.tenant_id)
        .bind(movement.movement_type)
        .bind(movement.amount_cents)
        .bind(&movement.description)
        .bind(&movement.reference)
        .bind(sqlx::types::Json(&movement.details))
        .bind(&movement.created_by)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        let balance = compute_balance(&mut tx, &self.tenant_id, anchor).await?;
        tx.commit().await?;

        if ExpensePolicy::default().evaluate(balance.balance()) == ExpenseOutcome::Overdrawn {
            warn!(
                tenant_id = %self.tenant_id,
                movement_id = %movement.id,
                balance_cents = balance.balance_cents,
                "Treasury balance is negative after movement"
            );
        }

        info!(
            tenant_id = %self.tenant_id,
            movement_id = %movement.id,
            amount_cents = movement.amount_cents,
            "Treasury movement recorded"
        );

        Ok(RecordedTreasuryMovement { movement, balance })
    }

    /// Movements matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> DbResult<Page<TreasuryMovement>> {
        let mut count_query = filtered("SELECT COUNT(*) FROM treasury_movements", &self.tenant_id, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = filtered("SELECT * FROM treasury_movements", &self.tenant_id, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let movements = query
            .build_query_as::<TreasuryMovement>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(movements, total, page))
    }
}

/// Income and expense aggregates, both served by covering indexes.
async fn compute_balance(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    anchor: BalanceAnchor,
) -> DbResult<TreasuryBalance> {
    let since = anchor.since();

    let income: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(confirmed_amount_cents), 0)
        FROM treasury_pending_withdrawals
        WHERE tenant_id = ?1
          AND status IN ('confirmed', 'partial')
          AND (?2 IS NULL OR confirmed_at >= ?2)
        "#,
    )
    .bind(tenant_id)
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;

    let expenses: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0)
        FROM treasury_movements
        WHERE tenant_id = ?1
          AND (?2 IS NULL OR created_at >= ?2)
        "#,
    )
    .bind(tenant_id)
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;

    Ok(TreasuryBalance::compute(
        Money::from_cents(income),
        Money::from_cents(expenses),
        anchor,
        Utc::now(),
    ))
}

fn filtered<'a>(
    select: &str,
    tenant_id: &'a str,
    filter: &'a MovementFilter,
) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(select);
    query.push(" WHERE tenant_id = ").push_bind(tenant_id);
    if let Some(movement_type) = filter.movement_type {
        query.push(" AND movement_type = ").push_bind(movement_type);
    }
    push_range(&mut query, "created_at", filter.range);
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::Database;
    use till_core::commands::{ConfirmWithdrawal, RecordMovement};
    use till_core::session::CashMovementType;
    use till_core::treasury::{TreasuryMovementDetails, TreasuryMovementType};

    async fn confirmed_income(db: &Database, cents: i64, received: i64) {
        let (_branch, pos) = fixtures::add_point_of_sale(db, "acme", &format!("POS-{}", new_id())).await;
        let session = fixtures::open_session(db, "acme", &pos).await;
        let pending = db
            .tenant("acme")
            .cash_movements()
            .record(
                &session.id,
                "cashier-1",
                RecordMovement {
                    movement_type: CashMovementType::Withdrawal,
                    amount: Money::from_cents(cents),
                    reason: "Drop".to_string(),
                    authorized_by: None,
                },
            )
            .await
            .unwrap()
            .pending_withdrawal
            .unwrap();
        db.tenant("acme")
            .treasury()
            .confirm(
                &pending.id,
                "treasurer",
                ConfirmWithdrawal {
                    received: Money::from_cents(received),
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    fn expense(cents: i64) -> RecordTreasuryMovement {
        RecordTreasuryMovement {
            amount: Money::from_cents(cents),
            description: "Cleaning supplies".to_string(),
            reference: None,
            details: TreasuryMovementDetails::Expense {
                category: "maintenance".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_partial_confirmation_increases_balance_by_received() {
        let db = Database::new(crate::DbConfig::in_memory()).await.unwrap();
        let movements = db.tenant("acme").treasury_movements();

        let before = movements.balance(BalanceAnchor::AllTime).await.unwrap();
        confirmed_income(&db, 10_000, 9_500).await;
        let after = movements.balance(BalanceAnchor::AllTime).await.unwrap();

        assert_eq!(after.balance_cents - before.balance_cents, 9_500);
    }

    #[tokio::test]
    async fn test_movement_reduces_balance_and_may_go_negative() {
        let db = Database::new(crate::DbConfig::in_memory()).await.unwrap();
        let movements = db.tenant("acme").treasury_movements();
        confirmed_income(&db, 5_000, 5_000).await;

        let first = movements.record("treasurer", expense(3_000), BalanceAnchor::AllTime).await.unwrap();
        assert_eq!(first.balance.balance_cents, 2_000);
        assert_eq!(first.movement.movement_type, TreasuryMovementType::Expense);

        let overdrawn = movements.record("treasurer", expense(4_000), BalanceAnchor::AllTime).await.unwrap();
        assert_eq!(overdrawn.balance.balance_cents, -2_000);
        assert_eq!(overdrawn.balance.expenses_cents, 7_000);
    }

    #[tokio::test]
    async fn test_recomputed_balance_matches_ledgers() {
        let db = Database::new(crate::DbConfig::in_memory()).await.unwrap();
        let movements = db.tenant("acme").treasury_movements();
        confirmed_income(&db, 10_000, 10_000).await;
        confirmed_income(&db, 8_000, 7_000).await;
        movements.record("treasurer", expense(1_500), BalanceAnchor::AllTime).await.unwrap();

        let first = movements.balance(BalanceAnchor::AllTime).await.unwrap();
        let second = movements.balance(BalanceAnchor::AllTime).await.unwrap();
        assert_eq!(first.balance_cents, second.balance_cents);

        let income: i64 = sqlx::query_scalar(
            "SELECT SUM(confirmed_amount_cents) FROM treasury_pending_withdrawals WHERE confirmed_amount_cents IS NOT NULL",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        let expenses: i64 = sqlx::query_scalar("SELECT SUM(amount_cents) FROM treasury_movements")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(first.balance_cents, income - expenses);
        assert_eq!(first.balance_cents, 15_500);
    }

    #[tokio::test]
    async fn test_anchor_excludes_earlier_activity() {
        let db = Database::new(crate::DbConfig::in_memory()).await.unwrap();
        let movements = db.tenant("acme").treasury_movements();
        confirmed_income(&db, 10_000, 10_000).await;
        movements.record("treasurer", expense(2_000), BalanceAnchor::AllTime).await.unwrap();

        let anchor = BalanceAnchor::Since(Utc::now() + chrono::Duration::seconds(1));
        let anchored = movements.balance(anchor).await.unwrap();
        assert_eq!(anchored.balance_cents, 0);
        assert!(anchored.anchor.is_some());

        let all_time = movements.balance(BalanceAnchor::AllTime).await.unwrap();
        assert_eq!(all_time.balance_cents, 8_000);
    }

    #[tokio::test]
    async fn test_list_filters_by_type_and_tenant() {
        let db = Database::new(crate::DbConfig::in_memory()).await.unwrap();
        let movements = db.tenant("acme").treasury_movements();
        movements.record("treasurer", expense(1_000), BalanceAnchor::AllTime).await.unwrap();
        movements
            .record(
                "treasurer",
                RecordTreasuryMovement {
                    amount: Money::from_cents(50_000),
                    description: "Daily deposit".to_string(),
                    reference: Some("SLIP-1".to_string()),
                    details: TreasuryMovementDetails::BankDeposit {
                        bank_name: "Banco Nación".to_string(),
                        account_number: None,
                        deposit_slip: Some("SLIP-1".to_string()),
                    },
                },
                BalanceAnchor::AllTime,
            )
            .await
            .unwrap();

        let deposits = MovementFilter {
            movement_type: Some(TreasuryMovementType::BankDeposit),
            ..MovementFilter::default()
        };
        let page = movements.list(&deposits, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert!(matches!(
            page.items[0].details,
            TreasuryMovementDetails::BankDeposit { .. }
        ));

        let other = db.tenant("other").treasury_movements();
        let page = other.list(&MovementFilter::default(), PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }
}
