//! # Cash Session Repository
//!
//! Opening, running and closing cashier shifts.
//!
//! ## Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open    BEGIN                                                          │
//! │           ├─ SELECT point of sale           (NOT_FOUND)                 │
//! │           ├─ bump cash_session:<pos> counter                            │
//! │           └─ INSERT session ── idx_cash_sessions_one_open ─► CONFLICT   │
//! │          COMMIT            (counter bump rolls back on conflict)        │
//! │                                                                         │
//! │  sale    UPDATE ... += amounts WHERE status = 'open'                    │
//! │          0 rows ─► NOT_FOUND or BAD_REQUEST                             │
//! │                                                                         │
//! │  close   UPDATE ... SET status = 'closed' WHERE status = 'open'         │
//! │          (+ INSERT cash_counts from the frozen totals, same tx)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{begin_write, new_id};
use crate::repository::sequence::{cash_session_scope, next_value};
use till_core::commands::{CloseSession, OpenSession, RecordCount, RecordSale, SessionFilter};
use till_core::session::{
    report_window, CashCount, CashSession, CashSessionStatus, CountSnapshot, DailyReport,
};
use till_core::{MethodAmounts, Page, PageRequest, PointOfSale};

/// Result of closing a session.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedSession {
    pub session: CashSession,
    /// Count taken at close, when amounts were declared.
    pub count: Option<CashCount>,
}

#[derive(Debug, Clone)]
pub struct CashSessionRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl CashSessionRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        CashSessionRepository { pool, tenant_id }
    }

    /// Opens a session on a point of sale.
    ///
    /// ## Errors
    /// - NOT_FOUND: point of sale unknown for this tenant
    /// - BAD_REQUEST: point of sale inactive
    /// - CONFLICT: the point of sale already has an OPEN session
    pub async fn open(&self, actor: &str, cmd: OpenSession) -> DbResult<CashSession> {
        debug!(tenant_id = %self.tenant_id, pos_id = %cmd.point_of_sale_id, "Opening cash session");

        let mut tx = begin_write(&self.pool).await?;

        let pos = sqlx::query_as::<_, PointOfSale>(
            "SELECT * FROM points_of_sale WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(&cmd.point_of_sale_id)
        .bind(&self.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Point of sale", &cmd.point_of_sale_id))?;

        if !pos.is_active {
            return Err(till_core::CoreError::precondition(format!(
                "Point of sale {} is inactive",
                pos.code
            ))
            .into());
        }

        let session_number =
            next_value(&mut tx, &self.tenant_id, &cash_session_scope(&pos.id)).await?;
        let now = Utc::now();

        let session = CashSession {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            point_of_sale_id: pos.id.clone(),
            branch_id: pos.branch_id.clone(),
            cashier_id: cmd.cashier_id.unwrap_or_else(|| actor.to_string()),
            status: CashSessionStatus::Open,
            session_number,
            opened_at: now,
            opened_by: actor.to_string(),
            closed_at: None,
            closed_by: None,
            cash_total_cents: 0,
            debit_total_cents: 0,
            credit_total_cents: 0,
            qr_total_cents: 0,
            mp_point_total_cents: 0,
            transfer_total_cents: 0,
            other_total_cents: 0,
            sales_total_cents: 0,
            withdrawals_total_cents: 0,
            deposits_total_cents: 0,
            closing_notes: None,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, tenant_id, point_of_sale_id, branch_id, cashier_id,
                status, session_number, opened_at, opened_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(&session.point_of_sale_id)
        .bind(&session.branch_id)
        .bind(&session.cashier_id)
        .bind(session.status)
        .bind(session.session_number)
        .bind(session.opened_at)
        .bind(&session.opened_by)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from);

        if let Err(err) = inserted {
            if err.is_unique_violation_on("cash_sessions") {
                return Err(DbError::conflict(format!(
                    "Point of sale {} already has an open cash session",
                    pos.code
                )));
            }
            return Err(err);
        }

        tx.commit().await?;

        info!(
            tenant_id = %self.tenant_id,
            session_id = %session.id,
            pos = %pos.code,
            session_number,
            "Cash session opened"
        );

        Ok(session)
    }

    /// Adds a sale's payments to the running per-method totals.
    pub async fn record_sale(&self, session_id: &str, cmd: RecordSale) -> DbResult<CashSession> {
        let by_method = cmd.by_method();
        let total = cmd.total();

        debug!(tenant_id = %self.tenant_id, session_id = %session_id, total = %total, "Recording sale on session");

        let mut tx = begin_write(&self.pool).await?;

        let updated = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                cash_total_cents = cash_total_cents + ?1,
                debit_total_cents = debit_total_cents + ?2,
                credit_total_cents = credit_total_cents + ?3,
                qr_total_cents = qr_total_cents + ?4,
                mp_point_total_cents = mp_point_total_cents + ?5,
                transfer_total_cents = transfer_total_cents + ?6,
                other_total_cents = other_total_cents + ?7,
                sales_total_cents = sales_total_cents + ?8
            WHERE id = ?9 AND tenant_id = ?10 AND status = 'open'
            "#,
        )
        .bind(by_method.cash_cents)
        .bind(by_method.debit_cents)
        .bind(by_method.credit_cents)
        .bind(by_method.qr_cents)
        .bind(by_method.mp_point_cents)
        .bind(by_method.transfer_cents)
        .bind(by_method.other_cents)
        .bind(total.cents())
        .bind(session_id)
        .bind(&self.tenant_id)
        .execute(&mut *tx)
        .await?;

        let session = fetch_session(&mut tx, &self.tenant_id, session_id).await?;
        if updated.rows_affected() == 0 {
            session.status.ensure_open(session_id)?;
        }

        tx.commit().await?;
        Ok(session)
    }

    /// Closes an OPEN session, optionally recording the final count.
    ///
    /// ## Errors
    /// - NOT_FOUND: unknown session
    /// - BAD_REQUEST: session already CLOSED
    pub async fn close(
        &self,
        session_id: &str,
        actor: &str,
        cmd: CloseSession,
    ) -> DbResult<ClosedSession> {
        debug!(tenant_id = %self.tenant_id, session_id = %session_id, counted = cmd.counted.is_some(), "Closing cash session");

        let mut tx = begin_write(&self.pool).await?;
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = 'closed', closed_at = ?1, closed_by = ?2, closing_notes = ?3
            WHERE id = ?4 AND tenant_id = ?5 AND status = 'open'
            "#,
        )
        .bind(now)
        .bind(actor)
        .bind(&cmd.notes)
        .bind(session_id)
        .bind(&self.tenant_id)
        .execute(&mut *tx)
        .await?;

        let session = fetch_session(&mut tx, &self.tenant_id, session_id).await?;
        if updated.rows_affected() == 0 {
            // The row exists, so it was not OPEN.
            session.status.close(session_id)?;
        }

        let count = match &cmd.counted {
            Some(declared) => Some(
                insert_count(
                    &mut tx,
                    &session,
                    actor,
                    declared,
                    cmd.verified_by.clone(),
                    cmd.notes.clone(),
                )
                .await?,
            ),
            None => None,
        };

        tx.commit().await?;

        info!(
            tenant_id = %self.tenant_id,
            session_id = %session_id,
            sales_total = session.sales_total_cents,
            variance = count.as_ref().map(|c| c.variance_cents),
            "Cash session closed"
        );

        Ok(ClosedSession { session, count })
    }

    /// Records an intermediate count on an OPEN session.
    pub async fn record_count(
        &self,
        session_id: &str,
        actor: &str,
        cmd: RecordCount,
    ) -> DbResult<CashCount> {
        let mut tx = begin_write(&self.pool).await?;

        let session = fetch_session(&mut tx, &self.tenant_id, session_id).await?;
        session.status.ensure_open(session_id)?;

        let count = insert_count(&mut tx, &session, actor, &cmd.declared, cmd.verified_by, cmd.notes)
            .await?;
        tx.commit().await?;

        info!(tenant_id = %self.tenant_id, session_id = %session_id, variance = count.variance_cents, "Cash count recorded");
        Ok(count)
    }

    pub async fn get(&self, session_id: &str) -> DbResult<CashSession> {
        let mut conn = self.pool.acquire().await?;
        fetch_session(&mut conn, &self.tenant_id, session_id).await
    }

    /// The OPEN session of a point of sale, if any.
    pub async fn current_for_point_of_sale(&self, pos_id: &str) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(
            r#"
            SELECT * FROM cash_sessions
            WHERE tenant_id = ?1 AND point_of_sale_id = ?2 AND status = 'open'
            "#,
        )
        .bind(&self.tenant_id)
        .bind(pos_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Sessions matching `filter`, newest first.
    pub async fn list(&self, filter: &SessionFilter, page: PageRequest) -> DbResult<Page<CashSession>> {
        let mut count_query = filtered("SELECT COUNT(*) FROM cash_sessions", &self.tenant_id, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = filtered("SELECT * FROM cash_sessions", &self.tenant_id, filter);
        query
            .push(" ORDER BY opened_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let sessions = query
            .build_query_as::<CashSession>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(sessions, total, page))
    }

    /// Counts of a session, oldest first.
    pub async fn counts(&self, session_id: &str) -> DbResult<Vec<CashCount>> {
        // NOT_FOUND for foreign sessions rather than an empty list.
        self.get(session_id).await?;

        let counts = sqlx::query_as::<_, CashCount>(
            r#"
            SELECT * FROM cash_counts
            WHERE cash_session_id = ?1 AND tenant_id = ?2
            ORDER BY counted_at
            "#,
        )
        .bind(session_id)
        .bind(&self.tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    /// Aggregates the sessions opened on `date` (local day at `utc_offset_minutes`).
    pub async fn daily_report(
        &self,
        date: NaiveDate,
        branch_id: Option<String>,
        utc_offset_minutes: i32,
    ) -> DbResult<DailyReport> {
        let (start, end) = report_window(date, utc_offset_minutes)?;

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM cash_sessions WHERE tenant_id = ");
        query
            .push_bind(&self.tenant_id)
            .push(" AND opened_at >= ")
            .push_bind(start)
            .push(" AND opened_at < ")
            .push_bind(end);
        if let Some(branch_id) = branch_id.clone() {
            query.push(" AND branch_id = ").push_bind(branch_id);
        }

        let sessions = query
            .build_query_as::<CashSession>()
            .fetch_all(&self.pool)
            .await?;

        debug!(tenant_id = %self.tenant_id, %date, sessions = sessions.len(), "Built daily report");

        Ok(DailyReport::from_sessions(date, branch_id, &sessions))
    }
}

pub(crate) async fn fetch_session(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    session_id: &str,
) -> DbResult<CashSession> {
    sqlx::query_as::<_, CashSession>("SELECT * FROM cash_sessions WHERE id = ?1 AND tenant_id = ?2")
        .bind(session_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Cash session", session_id))
}

async fn insert_count(
    conn: &mut SqliteConnection,
    session: &CashSession,
    actor: &str,
    declared: &MethodAmounts,
    verified_by: Option<String>,
    notes: Option<String>,
) -> DbResult<CashCount> {
    let snapshot = CountSnapshot::compute(session, declared);
    let count = CashCount {
        id: new_id(),
        tenant_id: session.tenant_id.clone(),
        cash_session_id: session.id.clone(),
        counted_at: Utc::now(),
        counted_by: actor.to_string(),
        verified_by,
        declared: *declared,
        expected: snapshot.expected,
        variance_cents: snapshot.variance.cents(),
        notes,
    };

    sqlx::query(
        r#"
        INSERT INTO cash_counts (
            id, tenant_id, cash_session_id, counted_at, counted_by, verified_by,
            declared, expected, variance_cents, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&count.id)
    .bind(&count.tenant_id)
    .bind(&count.cash_session_id)
    .bind(count.counted_at)
    .bind(&count.counted_by)
    .bind(&count.verified_by)
    .bind(sqlx::types::Json(&count.declared))
    .bind(sqlx::types::Json(&count.expected))
    .bind(count.variance_cents)
    .bind(&count.notes)
    .execute(&mut *conn)
    .await?;

    Ok(count)
}

fn filtered<'a>(
    select: &str,
    tenant_id: &'a str,
    filter: &'a SessionFilter,
) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(select);
    query.push(" WHERE tenant_id = ").push_bind(tenant_id);

    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(pos_id) = &filter.point_of_sale_id {
        query.push(" AND point_of_sale_id = ").push_bind(pos_id);
    }
    if let Some(branch_id) = &filter.branch_id {
        query.push(" AND branch_id = ").push_bind(branch_id);
    }
    if let Some(cashier_id) = &filter.cashier_id {
        query.push(" AND cashier_id = ").push_bind(cashier_id);
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use till_core::commands::SalePayment;
    use till_core::{CoreError, Money, PaymentMethod};

    fn sale(payments: &[(PaymentMethod, i64)]) -> RecordSale {
        RecordSale {
            payments: payments
                .iter()
                .map(|(method, cents)| SalePayment {
                    method: *method,
                    amount: Money::from_cents(*cents),
                })
                .collect(),
        }
    }

    fn close_with(counted: Option<MethodAmounts>) -> CloseSession {
        CloseSession {
            counted,
            verified_by: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_open_takes_branch_from_point_of_sale() {
        let (db, branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;

        assert_eq!(session.branch_id, branch.id);
        assert_eq!(session.cashier_id, "cashier-1");
        assert_eq!(session.session_number, 1);
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn test_second_open_conflicts_and_persists_nothing() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let sessions = db.tenant("acme").cash_sessions();
        fixtures::open_session(&db, "acme", &pos).await;

        let err = sessions
            .open(
                "cashier-2",
                OpenSession {
                    point_of_sale_id: pos.id.clone(),
                    cashier_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Conflict(_))));

        let page = sessions
            .list(&SessionFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_session_numbers_increase_per_point_of_sale() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let (_other_branch, other_pos) = fixtures::add_point_of_sale(&db, "acme", "POS-02").await;
        let sessions = db.tenant("acme").cash_sessions();

        let first = fixtures::open_session(&db, "acme", &pos).await;
        sessions.close(&first.id, "cashier-1", close_with(None)).await.unwrap();
        let second = fixtures::open_session(&db, "acme", &pos).await;
        let elsewhere = fixtures::open_session(&db, "acme", &other_pos).await;

        assert_eq!(first.session_number, 1);
        assert_eq!(second.session_number, 2);
        assert_eq!(elsewhere.session_number, 1);
    }

    #[tokio::test]
    async fn test_open_unknown_point_of_sale_is_not_found() {
        let (db, _branch, _pos) = fixtures::setup("acme").await;
        let err = db
            .tenant("acme")
            .cash_sessions()
            .open(
                "cashier-1",
                OpenSession {
                    point_of_sale_id: new_id(),
                    cashier_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_record_sale_increments_method_totals() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let sessions = db.tenant("acme").cash_sessions();
        let session = fixtures::open_session(&db, "acme", &pos).await;

        sessions
            .record_sale(&session.id, sale(&[(PaymentMethod::Cash, 10_000)]))
            .await
            .unwrap();
        let updated = sessions
            .record_sale(
                &session.id,
                sale(&[(PaymentMethod::Cash, 2_500), (PaymentMethod::MpPoint, 7_000)]),
            )
            .await
            .unwrap();

        assert_eq!(updated.cash_total_cents, 12_500);
        assert_eq!(updated.mp_point_total_cents, 7_000);
        assert_eq!(updated.sales_total_cents, 19_500);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_sales_and_second_close() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let sessions = db.tenant("acme").cash_sessions();
        let session = fixtures::open_session(&db, "acme", &pos).await;
        sessions.close(&session.id, "cashier-1", close_with(None)).await.unwrap();

        let err = sessions
            .record_sale(&session.id, sale(&[(PaymentMethod::Cash, 100)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::PreconditionFailed(_))));

        let err = sessions
            .close(&session.id, "cashier-1", close_with(None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::PreconditionFailed(_))));

        let frozen = sessions.get(&session.id).await.unwrap();
        assert_eq!(frozen.sales_total_cents, 0);
        assert_eq!(frozen.status, CashSessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_close_with_count_records_variance() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let sessions = db.tenant("acme").cash_sessions();
        let session = fixtures::open_session(&db, "acme", &pos).await;
        sessions
            .record_sale(&session.id, sale(&[(PaymentMethod::Cash, 10_000), (PaymentMethod::Debit, 4_000)]))
            .await
            .unwrap();

        let declared = MethodAmounts {
            cash_cents: 9_800,
            debit_cents: 4_000,
            ..MethodAmounts::default()
        };
        let closed = sessions
            .close(&session.id, "cashier-1", close_with(Some(declared)))
            .await
            .unwrap();

        let count = closed.count.unwrap();
        assert_eq!(count.expected.cash_cents, 10_000);
        assert_eq!(count.variance_cents, -200);
        assert_eq!(closed.session.status, CashSessionStatus::Closed);
        assert_eq!(sessions.counts(&session.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_intermediate_count_requires_open_session() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let sessions = db.tenant("acme").cash_sessions();
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let count = RecordCount {
            declared: MethodAmounts::default(),
            verified_by: Some("supervisor".to_string()),
            notes: None,
        };

        sessions.record_count(&session.id, "cashier-1", count.clone()).await.unwrap();
        sessions.close(&session.id, "cashier-1", close_with(None)).await.unwrap();

        let err = sessions
            .record_count(&session.id, "cashier-1", count)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn test_sessions_are_tenant_isolated() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let session = fixtures::open_session(&db, "acme", &pos).await;
        let other = db.tenant("other").cash_sessions();

        assert!(matches!(
            other.get(&session.id).await,
            Err(DbError::Domain(CoreError::NotFound { .. }))
        ));
        assert!(matches!(
            other.record_sale(&session.id, sale(&[(PaymentMethod::Cash, 100)])).await,
            Err(DbError::Domain(CoreError::NotFound { .. }))
        ));
        let page = other
            .list(&SessionFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_current_session() {
        let (db, _branch, pos) = fixtures::setup("acme").await;
        let sessions = db.tenant("acme").cash_sessions();
        let first = fixtures::open_session(&db, "acme", &pos).await;
        sessions.close(&first.id, "cashier-1", close_with(None)).await.unwrap();
        let second = fixtures::open_session(&db, "acme", &pos).await;

        let open_only = SessionFilter {
            status: Some(CashSessionStatus::Open),
            ..SessionFilter::default()
        };
        let page = sessions.list(&open_only, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, second.id);

        let current = sessions.current_for_point_of_sale(&pos.id).await.unwrap();
        assert_eq!(current.map(|s| s.id), Some(second.id));
    }

    #[tokio::test]
    async fn test_daily_report_groups_by_status() {
        let (db, branch, pos) = fixtures::setup("acme").await;
        let sessions = db.tenant("acme").cash_sessions();
        let first = fixtures::open_session(&db, "acme", &pos).await;
        sessions
            .record_sale(&first.id, sale(&[(PaymentMethod::Cash, 5_000)]))
            .await
            .unwrap();
        sessions.close(&first.id, "cashier-1", close_with(None)).await.unwrap();
        let second = fixtures::open_session(&db, "acme", &pos).await;
        sessions
            .record_sale(&second.id, sale(&[(PaymentMethod::Qr, 1_000)]))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let report = sessions
            .daily_report(today, Some(branch.id.clone()), 0)
            .await
            .unwrap();

        assert_eq!(report.session_count, 2);
        assert_eq!(report.by_status.closed.count, 1);
        assert_eq!(report.by_status.open.sales_total_cents, 1_000);
        assert_eq!(report.by_method.cash_cents, 5_000);
        assert_eq!(report.grand_totals.sales_total_cents, 6_000);

        let yesterday = today.pred_opt().unwrap();
        let empty = sessions.daily_report(yesterday, None, 0).await.unwrap();
        assert_eq!(empty.session_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_opens_leave_one_open_session() {
        let (_dir, db, pos) = fixtures::setup_shared("acme").await;

        for round in 0..5 {
            let results = fixtures::race(6, || {
                let db = db.clone();
                let pos_id = pos.id.clone();
                async move {
                    db.tenant("acme")
                        .cash_sessions()
                        .open(
                            "cashier-1",
                            OpenSession {
                                point_of_sale_id: pos_id,
                                cashier_id: None,
                            },
                        )
                        .await
                }
            })
            .await;

            let mut winners = Vec::new();
            for result in results {
                match result {
                    Ok(session) => winners.push(session),
                    Err(err) => assert!(
                        matches!(err, DbError::Domain(CoreError::Conflict(_))),
                        "round {}: {}",
                        round,
                        err
                    ),
                }
            }
            assert_eq!(winners.len(), 1, "round {}", round);
            assert_eq!(winners[0].session_number, round + 1);

            let sessions = db.tenant("acme").cash_sessions();
            let current = sessions.current_for_point_of_sale(&pos.id).await.unwrap().unwrap();
            assert_eq!(current.id, winners[0].id);
            sessions.close(&current.id, "cashier-1", close_with(None)).await.unwrap();
        }
    }
}
