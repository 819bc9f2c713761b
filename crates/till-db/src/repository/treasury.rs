//! # Treasury Reconciliation Repository
//!
//! Pending withdrawals created by the cash ledger, and their resolution by
//! treasury staff.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. SELECT row                        NOT_FOUND if missing              │
//! │  2. status.resolve(expected, …)       CONFLICT if already resolved      │
//! │  3. UPDATE … WHERE status='pending'   0 rows ─► CONFLICT (lost a race)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 3 is a compare-and-set. Whoever loses a concurrent confirm/reject
//! gets CONFLICT and the winner's result stays untouched.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{begin_write, new_id};
use till_core::commands::{ConfirmWithdrawal, PendingFilter, RejectWithdrawal};
use till_core::session::{CashMovement, CashSession};
use till_core::treasury::{
    PendingWithdrawalStatus, StatusBucket, TreasuryPendingWithdrawal, TreasurySummary,
    WithdrawalResolution,
};
use till_core::{DateRange, Page, PageRequest};

#[derive(Debug, Clone)]
pub struct TreasuryRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl TreasuryRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        TreasuryRepository { pool, tenant_id }
    }

    pub async fn get(&self, id: &str) -> DbResult<TreasuryPendingWithdrawal> {
        let mut conn = self.pool.acquire().await?;
        fetch_pending(&mut conn, &self.tenant_id, id).await
    }

    /// Pending withdrawals matching `filter`, newest first.
    pub async fn list_pending(
        &self,
        filter: &PendingFilter,
        page: PageRequest,
    ) -> DbResult<Page<TreasuryPendingWithdrawal>> {
        let mut count_query = filtered(
            "SELECT COUNT(*) FROM treasury_pending_withdrawals",
            &self.tenant_id,
            filter,
        );
        let total: i64 = count_query.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = filtered(
            "SELECT * FROM treasury_pending_withdrawals",
            &self.tenant_id,
            filter,
        );
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<TreasuryPendingWithdrawal>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total, page))
    }

    /// Counts and amounts per status for withdrawals created within `range`.
    pub async fn summary(&self, range: DateRange) -> DbResult<TreasurySummary> {
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            r#"
            SELECT status,
                   COUNT(*),
                   COALESCE(SUM(amount_cents), 0),
                   COALESCE(SUM(confirmed_amount_cents), 0)
            FROM treasury_pending_withdrawals
            WHERE tenant_id = "#,
        );
        query.push_bind(&self.tenant_id);
        push_range(&mut query, "created_at", range);
        query.push(" GROUP BY status");

        let rows: Vec<(PendingWithdrawalStatus, i64, i64, i64)> =
            query.build_query_as().fetch_all(&self.pool).await?;

        debug!(tenant_id = %self.tenant_id, statuses = rows.len(), "Built treasury summary");

        Ok(TreasurySummary::from_buckets(rows.into_iter().map(
            |(status, count, amount_cents, confirmed_amount_cents)| {
                (
                    status,
                    StatusBucket {
                        count,
                        amount_cents,
                        confirmed_amount_cents,
                    },
                )
            },
        )))
    }

    /// Confirms receipt of a withdrawal: CONFIRMED within tolerance, PARTIAL otherwise.
    pub async fn confirm(
        &self,
        id: &str,
        actor: &str,
        cmd: ConfirmWithdrawal,
    ) -> DbResult<TreasuryPendingWithdrawal> {
        let resolution = WithdrawalResolution::Confirm {
            received: cmd.received,
        };
        self.resolve(id, actor, resolution, Some(cmd.received.cents()), cmd.notes, None)
            .await
    }

    pub async fn reject(
        &self,
        id: &str,
        actor: &str,
        cmd: RejectWithdrawal,
    ) -> DbResult<TreasuryPendingWithdrawal> {
        self.resolve(id, actor, WithdrawalResolution::Reject, None, None, Some(cmd.reason))
            .await
    }

    async fn resolve(
        &self,
        id: &str,
        actor: &str,
        resolution: WithdrawalResolution,
        confirmed_amount_cents: Option<i64>,
        difference_notes: Option<String>,
        rejection_reason: Option<String>,
    ) -> DbResult<TreasuryPendingWithdrawal> {
        debug!(tenant_id = %self.tenant_id, withdrawal_id = %id, ?resolution, "Resolving pending withdrawal");

        let mut tx = begin_write(&self.pool).await?;

        let current = fetch_pending(&mut tx, &self.tenant_id, id).await?;
        let next = current.status.resolve(id, current.amount(), resolution)?;
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE treasury_pending_withdrawals SET
                status = ?1,
                confirmed_amount_cents = ?2,
                confirmed_by = ?3,
                confirmed_at = ?4,
                difference_notes = ?5,
                rejection_reason = ?6
            WHERE id = ?7 AND tenant_id = ?8 AND status = 'pending'
            "#,
        )
        .bind(next)
        .bind(confirmed_amount_cents)
        .bind(actor)
        .bind(now)
        .bind(&difference_notes)
        .bind(&rejection_reason)
        .bind(id)
        .bind(&self.tenant_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "Pending withdrawal {} was resolved concurrently",
                id
            )));
        }

        let resolved = fetch_pending(&mut tx, &self.tenant_id, id).await?;
        tx.commit().await?;

        info!(
            tenant_id = %self.tenant_id,
            withdrawal_id = %id,
            status = ?resolved.status,
            expected_cents = resolved.amount_cents,
            confirmed_cents = resolved.confirmed_amount_cents,
            "Pending withdrawal resolved"
        );

        Ok(resolved)
    }
}

/// Creates the PENDING record paired with a WITHDRAWAL movement.
///
/// Runs on the ledger's transaction.
pub(crate) async fn insert_pending_withdrawal(
    conn: &mut SqliteConnection,
    session: &CashSession,
    movement: &CashMovement,
) -> DbResult<TreasuryPendingWithdrawal> {
    let pending = TreasuryPendingWithdrawal {
        id: new_id(),
        tenant_id: movement.tenant_id.clone(),
        cash_movement_id: movement.id.clone(),
        cash_session_id: session.id.clone(),
        branch_id: session.branch_id.clone(),
        point_of_sale_id: session.point_of_sale_id.clone(),
        created_by: movement.created_by.clone(),
        amount_cents: movement.amount_cents,
        status: PendingWithdrawalStatus::Pending,
        confirmed_amount_cents: None,
        confirmed_by: None,
        confirmed_at: None,
        difference_notes: None,
        rejection_reason: None,
        created_at: movement.created_at,
    };

    sqlx::query(
        r#"
        INSERT INTO treasury_pending_withdrawals (
            id, tenant_id, cash_movement_id, cash_session_id, branch_id,
            point_of_sale_id, created_by, amount_cents, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&pending.id)
    .bind(&pending.tenant_id)
    .bind(&pending.cash_movement_id)
    .bind(&pending.cash_session_id)
    .bind(&pending.branch_id)
    .bind(&pending.point_of_sale_id)
    .bind(&pending.created_by)
    .bind(pending.amount_cents)
    .bind(pending.status)
    .bind(pending.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(pending)
}

async fn fetch_pending(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<TreasuryPendingWithdrawal> {
    sqlx::query_as::<_, TreasuryPendingWithdrawal>(
        "SELECT * FROM treasury_pending_withdrawals WHERE id = ?1 AND tenant_id = ?2",
    )
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Pending withdrawal", id))
}

fn filtered<'a>(
    select: &str,
    tenant_id: &'a str,
    filter: &'a PendingFilter,
) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(select);
    query.push(" WHERE tenant_id = ").push_bind(tenant_id);

    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(branch_id) = &filter.branch_id {
        query.push(" AND branch_id = ").push_bind(branch_id);
    }
    if let Some(pos_id) = &filter.point_of_sale_id {
        query.push(" AND point_of_sale_id = ").push_bind(pos_id);
    }
    if let Some(user_id) = &filter.user_id {
        query.push(" AND created_by = ").push_bind(user_id);
    }
    push_range(&mut query, "created_at", filter.range);

    query
}

/// Appends inclusive bounds on `column`.
pub(crate) fn push_range(query: &mut QueryBuilder<'_, Sqlite>, column: &str, range: DateRange) {
    if let Some(from) = range.from {
        query.push(format!(" AND {} >= ", column)).push_bind(from);
    }
    if let Some(to) = range.to {
        query.push(format!(" AND {} <= ", column)).push_bind(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::Database;
    use till_core::commands::RecordMovement;
    use till_core::session::CashMovementType;
    use till_core::{CoreError, Money};

    async fn withdraw(db: &Database, session_id: &str, user: &str, cents: i64) -> TreasuryPendingWithdrawal {
        db.tenant("acme")
            .cash_movements()
            .record(
                session_id,
                user,
                RecordMovement {
                    movement_type: CashMovementType::Withdrawal,
                    amount: Money::from_cents(cents),
                    reason: "Drop to safe".to_string(),
                    authorized_by: None,
                },
            )
            .await
            .unwrap()
            .pending_withdrawal
            .unwrap()
    }

    fn confirm(cents: i64) -> ConfirmWithdrawal {
        ConfirmWithdrawal {
            received: Money::from_cents(cents),
            notes: Some("counted".to_string()),
        }
    }

    fn reject() -> RejectWithdrawal {
        RejectWithdrawal {
            reason: "Envelope never arrived".to_string(),
        }
    }

    #[tokio::test]
    async fn test_confirm_exact_and_short_amounts() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let treasury = db.tenant("acme").treasury();

        let exact = withdraw(&db, &session.id, "cashier-1", 10_000).await;
        let short = withdraw(&db, &session.id, "cashier-1", 10_000).await;

        let exact = treasury.confirm(&exact.id, "treasurer", confirm(10_001)).await.unwrap();
        let short = treasury.confirm(&short.id, "treasurer", confirm(9_500)).await.unwrap();

        assert_eq!(exact.status, PendingWithdrawalStatus::Confirmed);
        assert_eq!(short.status, PendingWithdrawalStatus::Partial);
        assert_eq!(short.confirmed_amount_cents, Some(9_500));
        assert_eq!(short.difference().map(|m| m.cents()), Some(-500));
        assert_eq!(short.confirmed_by.as_deref(), Some("treasurer"));
    }

    #[tokio::test]
    async fn test_zero_received_is_partial() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let pending = withdraw(&db, &session.id, "cashier-1", 5_000).await;

        let resolved = db
            .tenant("acme")
            .treasury()
            .confirm(&pending.id, "treasurer", confirm(0))
            .await
            .unwrap();
        assert_eq!(resolved.status, PendingWithdrawalStatus::Partial);
        assert_eq!(resolved.confirmed_amount_cents, Some(0));
    }

    #[tokio::test]
    async fn test_second_resolution_conflicts_and_keeps_status() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let treasury = db.tenant("acme").treasury();
        let pending = withdraw(&db, &session.id, "cashier-1", 10_000).await;

        treasury.confirm(&pending.id, "treasurer", confirm(9_500)).await.unwrap();

        let again = treasury.confirm(&pending.id, "treasurer", confirm(10_000)).await;
        assert!(matches!(again, Err(DbError::Domain(CoreError::Conflict(_)))));
        let rejected = treasury.reject(&pending.id, "treasurer", reject()).await;
        assert!(matches!(rejected, Err(DbError::Domain(CoreError::Conflict(_)))));

        let stored = treasury.get(&pending.id).await.unwrap();
        assert_eq!(stored.status, PendingWithdrawalStatus::Partial);
        assert_eq!(stored.confirmed_amount_cents, Some(9_500));
    }

    #[tokio::test]
    async fn test_reject_records_reason_without_amount() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let pending = withdraw(&db, &session.id, "cashier-1", 3_000).await;

        let rejected = db
            .tenant("acme")
            .treasury()
            .reject(&pending.id, "treasurer", reject())
            .await
            .unwrap();
        assert_eq!(rejected.status, PendingWithdrawalStatus::Rejected);
        assert_eq!(rejected.confirmed_amount_cents, None);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Envelope never arrived"));
        assert!(rejected.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_withdrawal_is_not_found() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let pending = withdraw(&db, &session.id, "cashier-1", 3_000).await;

        let foreign = db.tenant("other").treasury().confirm(&pending.id, "x", confirm(3_000)).await;
        assert!(matches!(foreign, Err(DbError::Domain(CoreError::NotFound { .. }))));
        let missing = db.tenant("acme").treasury().get(&new_id()).await;
        assert!(matches!(missing, Err(DbError::Domain(CoreError::NotFound { .. }))));
    }

    #[tokio::test]
    async fn test_list_pending_filters() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let treasury = db.tenant("acme").treasury();

        let first = withdraw(&db, &session.id, "cashier-1", 1_000).await;
        withdraw(&db, &session.id, "cashier-2", 2_000).await;
        withdraw(&db, &session.id, "cashier-1", 3_000).await;
        treasury.reject(&first.id, "treasurer", reject()).await.unwrap();

        let pending_only = PendingFilter {
            status: Some(PendingWithdrawalStatus::Pending),
            ..PendingFilter::default()
        };
        let page = treasury.list_pending(&pending_only, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);

        let by_user = PendingFilter {
            user_id: Some("cashier-1".to_string()),
            ..PendingFilter::default()
        };
        let page = treasury.list_pending(&by_user, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);

        let small_page = PageRequest::new(Some(2), Some(2)).unwrap();
        let page = treasury
            .list_pending(&PendingFilter::default(), small_page)
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_summary_totals_per_status() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let treasury = db.tenant("acme").treasury();

        let a = withdraw(&db, &session.id, "cashier-1", 10_000).await;
        let b = withdraw(&db, &session.id, "cashier-1", 10_000).await;
        let c = withdraw(&db, &session.id, "cashier-1", 4_000).await;
        withdraw(&db, &session.id, "cashier-1", 1_000).await;

        treasury.confirm(&a.id, "t", confirm(10_000)).await.unwrap();
        treasury.confirm(&b.id, "t", confirm(9_500)).await.unwrap();
        treasury.reject(&c.id, "t", reject()).await.unwrap();

        let summary = treasury.summary(DateRange::unbounded()).await.unwrap();
        assert_eq!(summary.totals.count, 4);
        assert_eq!(summary.totals.total_expected_cents, 25_000);
        assert_eq!(summary.totals.total_confirmed_cents, 19_500);
        assert_eq!(summary.totals.total_difference_cents, -500);
        assert_eq!(summary.pending.count, 1);
        assert_eq!(summary.partial.confirmed_amount_cents, 9_500);
        assert_eq!(summary.rejected.amount_cents, 4_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_resolutions_have_one_winner() {
        let (_dir, db, pos) = fixtures::setup_shared("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;

        for round in 0..5 {
            let pending = withdraw(&db, &session.id, "cashier-1", 10_000).await;

            let results = fixtures::race(6, || {
                let db = db.clone();
                let id = pending.id.clone();
                async move {
                    db.tenant("acme")
                        .treasury()
                        .confirm(&id, "treasurer", confirm(9_500))
                        .await
                }
            })
            .await;

            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1, "round {}", round);
            for err in results.into_iter().filter_map(Result::err) {
                assert!(
                    matches!(err, DbError::Domain(CoreError::Conflict(_))),
                    "round {}: {}",
                    round,
                    err
                );
            }

            let stored = db.tenant("acme").treasury().get(&pending.id).await.unwrap();
            assert_eq!(stored.confirmed_amount_cents, Some(9_500));
        }
    }
}
