//! # Treasury
//!
//! Treasury receives the cash that cashiers withdraw from their drawers,
//! verifies it, and spends it (bank deposits, supplier payments, expenses).
//!
//! ## Reconciliation State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  WITHDRAWAL movement ──(same transaction)──► PENDING                    │
//! │                                                 │                       │
//! │               ┌─────────────────────────────────┼──────────────┐        │
//! │               │ confirm(received)               │ confirm      │ reject │
//! │               │ |received − amount| ≤ 0.01      │ otherwise    │ (≥5ch) │
//! │               ▼                                 ▼              ▼        │
//! │          CONFIRMED                          PARTIAL        REJECTED     │
//! │                                                                         │
//! │  All three outcomes are terminal. A second resolution is a CONFLICT.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Balance
//! ```text
//! balance = Σ confirmed_amount (CONFIRMED ∪ PARTIAL) − Σ treasury movement amount
//! ```
//! The balance is derived on demand and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Pending Withdrawal Status
// =============================================================================

/// Reconciliation status of a withdrawal.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingWithdrawalStatus {
    Pending,
    Confirmed,
    Partial,
    Rejected,
}

/// What treasury decided about a pending withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalResolution {
    /// Treasury counted `received`.
    Confirm { received: Money },
    Reject,
}

impl PendingWithdrawalStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        self != PendingWithdrawalStatus::Pending
    }

    /// True for statuses whose `confirmed_amount` counts as treasury income.
    #[inline]
    pub fn counts_as_income(self) -> bool {
        matches!(
            self,
            PendingWithdrawalStatus::Confirmed | PendingWithdrawalStatus::Partial
        )
    }

    /// The single transition function of the reconciliation state machine.
    ///
    /// ## Rules
    /// - Only PENDING may be resolved; anything else is a CONFLICT
    /// - Confirm within [`crate::money::AMOUNT_TOLERANCE`] of `expected` → CONFIRMED
    /// - Confirm outside the tolerance (including zero received) → PARTIAL
    /// - Reject → REJECTED
    pub fn resolve(
        self,
        withdrawal_id: &str,
        expected: Money,
        resolution: WithdrawalResolution,
    ) -> CoreResult<PendingWithdrawalStatus> {
        if self.is_terminal() {
            return Err(CoreError::conflict(format!(
                "Pending withdrawal {} is already resolved ({:?})",
                withdrawal_id, self
            )));
        }

        Ok(match resolution {
            WithdrawalResolution::Confirm { received } if expected.within_tolerance(received) => {
                PendingWithdrawalStatus::Confirmed
            }
            WithdrawalResolution::Confirm { .. } => PendingWithdrawalStatus::Partial,
            WithdrawalResolution::Reject => PendingWithdrawalStatus::Rejected,
        })
    }
}

// =============================================================================
// Pending Withdrawal
// =============================================================================

/// Treasury-side record created 1:1 with every WITHDRAWAL movement.
///
/// `confirmed_amount_cents` is set iff status ∈ {CONFIRMED, PARTIAL}.
/// `confirmed_by`/`confirmed_at` record who resolved it, including rejections.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryPendingWithdrawal {
    pub id: String,
    pub tenant_id: String,
    pub cash_movement_id: String,
    pub cash_session_id: String,
    pub branch_id: String,
    pub point_of_sale_id: String,
    /// Cashier who recorded the withdrawal.
    pub created_by: String,
    /// Amount the cashier reported.
    pub amount_cents: i64,
    pub status: PendingWithdrawalStatus,
    pub confirmed_amount_cents: Option<i64>,
    pub confirmed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub confirmed_at: Option<DateTime<Utc>>,
    pub difference_notes: Option<String>,
    pub rejection_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl TreasuryPendingWithdrawal {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Received minus expected, once confirmed.
    pub fn difference(&self) -> Option<Money> {
        self.confirmed_amount_cents
            .map(|confirmed| Money::from_cents(confirmed) - self.amount())
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Count and amounts for one status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StatusBucket {
    pub count: i64,
    pub amount_cents: i64,
    pub confirmed_amount_cents: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTotals {
    pub count: i64,
    /// Σ amount over every status.
    pub total_expected_cents: i64,
    /// Σ confirmed amount over CONFIRMED ∪ PARTIAL.
    pub total_confirmed_cents: i64,
    /// Σ confirmed − Σ amount over CONFIRMED ∪ PARTIAL.
    pub total_difference_cents: i64,
}

/// Per-status counts and totals of pending withdrawals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TreasurySummary {
    pub pending: StatusBucket,
    pub confirmed: StatusBucket,
    pub partial: StatusBucket,
    pub rejected: StatusBucket,
    pub totals: SummaryTotals,
}

impl TreasurySummary {
    /// Builds the summary from per-status aggregates.
    pub fn from_buckets<I>(buckets: I) -> Self
    where
        I: IntoIterator<Item = (PendingWithdrawalStatus, StatusBucket)>,
    {
        let mut summary = TreasurySummary::default();

        for (status, bucket) in buckets {
            let slot = match status {
                PendingWithdrawalStatus::Pending => &mut summary.pending,
                PendingWithdrawalStatus::Confirmed => &mut summary.confirmed,
                PendingWithdrawalStatus::Partial => &mut summary.partial,
                PendingWithdrawalStatus::Rejected => &mut summary.rejected,
            };
            slot.count += bucket.count;
            slot.amount_cents += bucket.amount_cents;
            slot.confirmed_amount_cents += bucket.confirmed_amount_cents;

            summary.totals.count += bucket.count;
            summary.totals.total_expected_cents += bucket.amount_cents;
            if status.counts_as_income() {
                summary.totals.total_confirmed_cents += bucket.confirmed_amount_cents;
                summary.totals.total_difference_cents +=
                    bucket.confirmed_amount_cents - bucket.amount_cents;
            }
        }

        summary
    }
}

// =============================================================================
// Treasury Movements
// =============================================================================

/// Kind of outgoing treasury movement.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreasuryMovementType {
    BankDeposit,
    SupplierPayment,
    Expense,
    Transfer,
    Other,
}

/// Type-specific fields; the variant determines the movement type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreasuryMovementDetails {
    #[serde(rename_all = "camelCase")]
    BankDeposit {
        bank_name: String,
        #[serde(default)]
        account_number: Option<String>,
        #[serde(default)]
        deposit_slip: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SupplierPayment {
        supplier_name: String,
        #[serde(default)]
        invoice_number: Option<String>,
    },
    Expense {
        category: String,
    },
    Transfer {
        destination: String,
    },
    Other,
}

impl TreasuryMovementDetails {
    pub fn movement_type(&self) -> TreasuryMovementType {
        match self {
            TreasuryMovementDetails::BankDeposit { .. } => TreasuryMovementType::BankDeposit,
            TreasuryMovementDetails::SupplierPayment { .. } => {
                TreasuryMovementType::SupplierPayment
            }
            TreasuryMovementDetails::Expense { .. } => TreasuryMovementType::Expense,
            TreasuryMovementDetails::Transfer { .. } => TreasuryMovementType::Transfer,
            TreasuryMovementDetails::Other => TreasuryMovementType::Other,
        }
    }
}

/// Append-only outgoing movement.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryMovement {
    pub id: String,
    pub tenant_id: String,
    pub movement_type: TreasuryMovementType,
    pub amount_cents: i64,
    pub description: String,
    pub reference: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub details: TreasuryMovementDetails,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Balance
// =============================================================================

/// Point from which the treasury balance is accumulated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BalanceAnchor {
    /// Everything ever confirmed minus everything ever spent.
    #[default]
    AllTime,
    /// Only income confirmed and movements created at/after the timestamp.
    Since(DateTime<Utc>),
}

impl BalanceAnchor {
    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            BalanceAnchor::AllTime => None,
            BalanceAnchor::Since(at) => Some(*at),
        }
    }
}

/// Derived treasury cash position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryBalance {
    pub income_cents: i64,
    pub expenses_cents: i64,
    pub balance_cents: i64,
    #[ts(as = "Option<String>")]
    pub anchor: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub computed_at: DateTime<Utc>,
}

impl TreasuryBalance {
    pub fn compute(
        income: Money,
        expenses: Money,
        anchor: BalanceAnchor,
        computed_at: DateTime<Utc>,
    ) -> Self {
        TreasuryBalance {
            income_cents: income.cents(),
            expenses_cents: expenses.cents(),
            balance_cents: (income - expenses).cents(),
            anchor: anchor.since(),
            computed_at,
        }
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// What happens when a movement exceeds the current balance.
///
/// Recording is never blocked, so expenses known in advance can be entered
/// before the matching income is confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpensePolicy {
    #[default]
    AllowNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseOutcome {
    WithinBalance,
    /// Recorded, but the balance is now below zero.
    Overdrawn,
}

impl ExpensePolicy {
    pub fn evaluate(self, balance_after: Money) -> ExpenseOutcome {
        match self {
            ExpensePolicy::AllowNegative if balance_after.is_negative() => {
                ExpenseOutcome::Overdrawn
            }
            ExpensePolicy::AllowNegative => ExpenseOutcome::WithinBalance,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: Money = Money::from_cents(10_000);

    #[test]
    fn test_confirm_within_tolerance() {
        let status = PendingWithdrawalStatus::Pending
            .resolve(
                "w1",
                EXPECTED,
                WithdrawalResolution::Confirm {
                    received: Money::from_cents(9_999),
                },
            )
            .unwrap();
        assert_eq!(status, PendingWithdrawalStatus::Confirmed);
    }

    #[test]
    fn test_confirm_short_is_partial() {
        let status = PendingWithdrawalStatus::Pending
            .resolve(
                "w1",
                EXPECTED,
                WithdrawalResolution::Confirm {
                    received: Money::from_cents(9_500),
                },
            )
            .unwrap();
        assert_eq!(status, PendingWithdrawalStatus::Partial);

        let status = PendingWithdrawalStatus::Pending
            .resolve(
                "w1",
                EXPECTED,
                WithdrawalResolution::Confirm {
                    received: Money::zero(),
                },
            )
            .unwrap();
        assert_eq!(status, PendingWithdrawalStatus::Partial);
    }

    #[test]
    fn test_reject() {
        let status = PendingWithdrawalStatus::Pending
            .resolve("w1", EXPECTED, WithdrawalResolution::Reject)
            .unwrap();
        assert_eq!(status, PendingWithdrawalStatus::Rejected);
    }

    #[test]
    fn test_terminal_statuses_cannot_be_resolved_again() {
        for status in [
            PendingWithdrawalStatus::Confirmed,
            PendingWithdrawalStatus::Partial,
            PendingWithdrawalStatus::Rejected,
        ] {
            assert!(matches!(
                status.resolve("w1", EXPECTED, WithdrawalResolution::Reject),
                Err(CoreError::Conflict(_))
            ));
            assert!(matches!(
                status.resolve(
                    "w1",
                    EXPECTED,
                    WithdrawalResolution::Confirm { received: EXPECTED }
                ),
                Err(CoreError::Conflict(_))
            ));
        }
    }

    #[test]
    fn test_summary_totals() {
        let summary = TreasurySummary::from_buckets([
            (
                PendingWithdrawalStatus::Pending,
                StatusBucket {
                    count: 2,
                    amount_cents: 5_000,
                    confirmed_amount_cents: 0,
                },
            ),
            (
                PendingWithdrawalStatus::Confirmed,
                StatusBucket {
                    count: 1,
                    amount_cents: 10_000,
                    confirmed_amount_cents: 10_000,
                },
            ),
            (
                PendingWithdrawalStatus::Partial,
                StatusBucket {
                    count: 1,
                    amount_cents: 10_000,
                    confirmed_amount_cents: 9_500,
                },
            ),
            (
                PendingWithdrawalStatus::Rejected,
                StatusBucket {
                    count: 1,
                    amount_cents: 3_000,
                    confirmed_amount_cents: 0,
                },
            ),
        ]);

        assert_eq!(summary.pending.count, 2);
        assert_eq!(summary.totals.count, 5);
        assert_eq!(summary.totals.total_expected_cents, 28_000);
        assert_eq!(summary.totals.total_confirmed_cents, 19_500);
        assert_eq!(summary.totals.total_difference_cents, -500);
    }

    #[test]
    fn test_details_wire_format() {
        let details: TreasuryMovementDetails = serde_json::from_str(
            r#"{"type":"BANK_DEPOSIT","bankName":"Banco Norte","depositSlip":"A-12"}"#,
        )
        .unwrap();
        assert_eq!(details.movement_type(), TreasuryMovementType::BankDeposit);

        let other: TreasuryMovementDetails = serde_json::from_str(r#"{"type":"OTHER"}"#).unwrap();
        assert_eq!(other.movement_type(), TreasuryMovementType::Other);

        let json = serde_json::to_value(TreasuryMovementDetails::Expense {
            category: "cleaning".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "EXPENSE");
        assert_eq!(json["category"], "cleaning");
    }

    #[test]
    fn test_balance_and_policy() {
        let now = Utc::now();
        let balance = TreasuryBalance::compute(
            Money::from_cents(9_500),
            Money::from_cents(12_000),
            BalanceAnchor::AllTime,
            now,
        );
        assert_eq!(balance.balance_cents, -2_500);
        assert_eq!(balance.anchor, None);
        assert_eq!(
            ExpensePolicy::AllowNegative.evaluate(balance.balance()),
            ExpenseOutcome::Overdrawn
        );
        assert_eq!(
            ExpensePolicy::AllowNegative.evaluate(Money::zero()),
            ExpenseOutcome::WithinBalance
        );
    }
}
