//! # Cash Sessions
//!
//! A cash session is one cashier shift on one point of sale. It carries the
//! running totals of everything paid into the drawer and everything moved
//! out of it.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open(pos, cashier)                                                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   ┌─────────┐  recordSale / movement / count   ┌─────────┐             │
//! │   │  OPEN   │ ◄──────────────────────────────► │  OPEN   │             │
//! │   └────┬────┘                                  └─────────┘             │
//! │        │ close(counted?)                                                │
//! │        ▼                                                                │
//! │   ┌─────────┐                                                           │
//! │   │ CLOSED  │  totals frozen, nothing else accepted                     │
//! │   └─────────┘                                                           │
//! │                                                                         │
//! │   At most one OPEN session per point of sale.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Expected cash
//! `expected cash = cash sales − withdrawals + deposits`. Every other
//! method is expected to match its running total directly.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::MethodAmounts;

// =============================================================================
// Session Status
// =============================================================================

/// Session lifecycle status.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashSessionStatus {
    Open,
    Closed,
}

impl CashSessionStatus {
    /// Fails with BAD_REQUEST unless the session is OPEN.
    pub fn ensure_open(self, session_id: &str) -> CoreResult<()> {
        match self {
            CashSessionStatus::Open => Ok(()),
            CashSessionStatus::Closed => Err(CoreError::precondition(format!(
                "Cash session {} is not open",
                session_id
            ))),
        }
    }

    /// The only legal transition: OPEN → CLOSED.
    pub fn close(self, session_id: &str) -> CoreResult<CashSessionStatus> {
        self.ensure_open(session_id)?;
        Ok(CashSessionStatus::Closed)
    }
}

// =============================================================================
// Cash Session
// =============================================================================

/// One shift on one point of sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashSession {
    pub id: String,
    pub tenant_id: String,
    pub point_of_sale_id: String,
    pub branch_id: String,
    pub cashier_id: String,
    pub status: CashSessionStatus,

    /// Strictly increasing per point of sale.
    pub session_number: i64,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub opened_by: String,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,

    pub cash_total_cents: i64,
    pub debit_total_cents: i64,
    pub credit_total_cents: i64,
    pub qr_total_cents: i64,
    pub mp_point_total_cents: i64,
    pub transfer_total_cents: i64,
    pub other_total_cents: i64,

    /// Σ of all sale payments recorded on the session.
    pub sales_total_cents: i64,
    pub withdrawals_total_cents: i64,
    pub deposits_total_cents: i64,

    pub closing_notes: Option<String>,
}

impl CashSession {
    /// Running totals as a [`MethodAmounts`].
    pub fn totals_by_method(&self) -> MethodAmounts {
        MethodAmounts {
            cash_cents: self.cash_total_cents,
            debit_cents: self.debit_total_cents,
            credit_cents: self.credit_total_cents,
            qr_cents: self.qr_total_cents,
            mp_point_cents: self.mp_point_total_cents,
            transfer_cents: self.transfer_total_cents,
            other_cents: self.other_total_cents,
        }
    }

    /// Cash that should be in the drawer right now.
    pub fn expected_cash(&self) -> Money {
        Money::from_cents(self.cash_total_cents) - Money::from_cents(self.withdrawals_total_cents)
            + Money::from_cents(self.deposits_total_cents)
    }

    /// What a count should find, per method.
    pub fn expected_amounts(&self) -> MethodAmounts {
        MethodAmounts {
            cash_cents: self.expected_cash().cents(),
            ..self.totals_by_method()
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == CashSessionStatus::Open
    }
}

// =============================================================================
// Cash Movements (ledger)
// =============================================================================

/// Kind of non-sale drawer movement.
///
/// ## Effect on session totals
/// | Type        | Session column            |
/// |-------------|---------------------------|
/// | WITHDRAWAL  | `withdrawals_total_cents` |
/// | DEPOSIT     | `deposits_total_cents`    |
/// | ADJUSTMENT  | none (ledger only)        |
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashMovementType {
    Withdrawal,
    Deposit,
    Adjustment,
}

impl CashMovementType {
    /// True when the movement must be paired with a pending treasury record.
    #[inline]
    pub fn requires_treasury_record(self) -> bool {
        self == CashMovementType::Withdrawal
    }
}

/// Append-only ledger entry. Never updated or deleted.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashMovement {
    pub id: String,
    pub tenant_id: String,
    pub cash_session_id: String,
    #[serde(rename = "type")]
    pub movement_type: CashMovementType,
    pub amount_cents: i64,
    pub reason: String,
    pub created_by: String,
    pub authorized_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Ensures a movement amount is strictly positive.
///
/// The command layer already rejects non-positive amounts; this re-check
/// keeps the ledger invariant for every caller.
pub fn ensure_positive_movement(amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::precondition("Movement amount must be positive"));
    }
    Ok(())
}

// =============================================================================
// Cash Counts (arqueo)
// =============================================================================

/// Immutable snapshot of a drawer count.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashCount {
    pub id: String,
    pub tenant_id: String,
    pub cash_session_id: String,
    #[ts(as = "String")]
    pub counted_at: DateTime<Utc>,
    pub counted_by: String,
    pub verified_by: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub declared: MethodAmounts,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub expected: MethodAmounts,
    /// Σ declared − Σ expected. Negative means the drawer is short.
    pub variance_cents: i64,
    pub notes: Option<String>,
}

/// Expected amounts and variance for a count taken against `session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountSnapshot {
    pub expected: MethodAmounts,
    pub variance: Money,
}

impl CountSnapshot {
    pub fn compute(session: &CashSession, declared: &MethodAmounts) -> Self {
        let expected = session.expected_amounts();
        CountSnapshot {
            expected,
            variance: declared.total() - expected.total(),
        }
    }
}

// =============================================================================
// Daily Report
// =============================================================================

/// Totals for a group of sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBucket {
    pub count: i64,
    pub sales_total_cents: i64,
    pub withdrawals_total_cents: i64,
    pub deposits_total_cents: i64,
}

impl SessionBucket {
    fn push(&mut self, session: &CashSession) {
        self.count += 1;
        self.sales_total_cents += session.sales_total_cents;
        self.withdrawals_total_cents += session.withdrawals_total_cents;
        self.deposits_total_cents += session.deposits_total_cents;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub open: SessionBucket,
    pub closed: SessionBucket,
}

/// Aggregate of every session opened on one calendar day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub date: NaiveDate,
    pub branch_id: Option<String>,
    pub session_count: i64,
    pub by_status: StatusBreakdown,
    pub by_method: MethodAmounts,
    pub grand_totals: SessionBucket,
}

impl DailyReport {
    /// Folds the sessions of one day into a report.
    pub fn from_sessions(date: NaiveDate, branch_id: Option<String>, sessions: &[CashSession]) -> Self {
        let mut by_status = StatusBreakdown::default();
        let mut grand_totals = SessionBucket::default();
        let mut by_method = MethodAmounts::default();

        for session in sessions {
            match session.status {
                CashSessionStatus::Open => by_status.open.push(session),
                CashSessionStatus::Closed => by_status.closed.push(session),
            }
            grand_totals.push(session);
            by_method = by_method.merged(&session.totals_by_method());
        }

        DailyReport {
            date,
            branch_id,
            session_count: grand_totals.count,
            by_status,
            by_method,
            grand_totals,
        }
    }
}

/// UTC bounds `[start, end)` of a local calendar day at a fixed offset.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use till_core::session::report_window;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let (start, end) = report_window(day, -180).unwrap();
/// assert_eq!(start.to_rfc3339(), "2024-03-01T03:00:00+00:00");
/// assert_eq!(end.to_rfc3339(), "2024-03-02T03:00:00+00:00");
/// ```
pub fn report_window(
    date: NaiveDate,
    utc_offset_minutes: i32,
) -> CoreResult<(DateTime<Utc>, DateTime<Utc>)> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        CoreError::precondition(format!("Invalid UTC offset: {} minutes", utc_offset_minutes))
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CoreError::precondition("Invalid report date"))?;
    let start = offset
        .from_local_datetime(&midnight)
        .single()
        .ok_or_else(|| CoreError::precondition("Ambiguous report date"))?
        .with_timezone(&Utc);

    Ok((start, start + Duration::days(1)))
}

// =============================================================================
// Unit Tests
// =============================================================================
