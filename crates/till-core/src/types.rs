//! # Shared Domain Types
//!
//! Types used by more than one component: payment methods, per-method
//! amounts, pagination, date ranges and the sales read models.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OWNED by the reconciliation core      CONSUMED (read models)           │
//! │  ───────────────────────────────      ─────────────────────────        │
//! │  session::CashSession                 Branch                            │
//! │  session::CashMovement                PointOfSale                       │
//! │  session::CashCount                   Sale / SaleItem / Payment         │
//! │  treasury::TreasuryPendingWithdrawal                                    │
//! │  treasury::TreasuryMovement           orphan::OrphanPaymentOrder        │
//! │  refund::SaleRefund                   (only `sale_id` is written)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sale status transitions (PARTIAL_REFUND, REFUNDED) are the one place the
//! core writes to a read model besides the orphan link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::ValidationResult;
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// =============================================================================
// Payment Methods
// =============================================================================

/// How a customer paid. Every method has its own running total on the
/// cash session.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Debit,
    Credit,
    Qr,
    /// Card terminal of the payment provider.
    MpPoint,
    Transfer,
    Other,
}

impl PaymentMethod {
    /// Every method, in display order.
    pub const ALL: [PaymentMethod; 7] = [
        PaymentMethod::Cash,
        PaymentMethod::Debit,
        PaymentMethod::Credit,
        PaymentMethod::Qr,
        PaymentMethod::MpPoint,
        PaymentMethod::Transfer,
        PaymentMethod::Other,
    ];
}

/// One amount per payment method.
///
/// Used for session running totals, declared counts and expected counts.
/// Missing fields deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodAmounts {
    pub cash_cents: i64,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub qr_cents: i64,
    pub mp_point_cents: i64,
    pub transfer_cents: i64,
    pub other_cents: i64,
}

impl MethodAmounts {
    /// Amount recorded for one method.
    pub fn get(&self, method: PaymentMethod) -> Money {
        let cents = match method {
            PaymentMethod::Cash => self.cash_cents,
            PaymentMethod::Debit => self.debit_cents,
            PaymentMethod::Credit => self.credit_cents,
            PaymentMethod::Qr => self.qr_cents,
            PaymentMethod::MpPoint => self.mp_point_cents,
            PaymentMethod::Transfer => self.transfer_cents,
            PaymentMethod::Other => self.other_cents,
        };
        Money::from_cents(cents)
    }

    /// Adds `amount` to the slot of `method`.
    pub fn add(&mut self, method: PaymentMethod, amount: Money) {
        let slot = match method {
            PaymentMethod::Cash => &mut self.cash_cents,
            PaymentMethod::Debit => &mut self.debit_cents,
            PaymentMethod::Credit => &mut self.credit_cents,
            PaymentMethod::Qr => &mut self.qr_cents,
            PaymentMethod::MpPoint => &mut self.mp_point_cents,
            PaymentMethod::Transfer => &mut self.transfer_cents,
            PaymentMethod::Other => &mut self.other_cents,
        };
        *slot += amount.cents();
    }

    /// Element-wise sum.
    pub fn merged(mut self, other: &MethodAmounts) -> MethodAmounts {
        for method in PaymentMethod::ALL {
            self.add(method, other.get(method));
        }
        self
    }

    /// Sum over all methods.
    pub fn total(&self) -> Money {
        PaymentMethod::ALL.iter().map(|m| self.get(*m)).sum()
    }

    /// Iterates `(method, amount)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (PaymentMethod, Money)> + '_ {
        PaymentMethod::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

// =============================================================================
// Pagination & Ranges
// =============================================================================

/// Validated page request (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Builds a page request, applying defaults for missing values.
    ///
    /// ## Rules
    /// - `page` ≥ 1 (default 1)
    /// - `page_size` in 1..=MAX_PAGE_SIZE (default DEFAULT_PAGE_SIZE)
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> ValidationResult<Self> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page == 0 {
            return Err(ValidationError::MustBePositive {
                field: "page".to_string(),
            });
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::OutOfRange {
                field: "pageSize".to_string(),
                min: 1,
                max: MAX_PAGE_SIZE as i64,
            });
        }

        Ok(PageRequest { page, page_size })
    }

    /// SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    /// SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Page {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }
}

/// Inclusive timestamp range; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Builds a range, rejecting `from > to`.
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> ValidationResult<Self> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ValidationError::InvalidFormat {
                    field: "from".to_string(),
                    reason: "must not be after 'to'".to_string(),
                });
            }
        }
        Ok(DateRange { from, to })
    }

    /// A range with no bounds.
    pub fn unbounded() -> Self {
        DateRange::default()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

// =============================================================================
// Branch & Point of Sale (read models)
// =============================================================================

/// A store location.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A physical register/terminal inside a branch.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PointOfSale {
    pub id: String,
    pub tenant_id: String,
    pub branch_id: String,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales (read models)
// =============================================================================

/// Status of a sale.
///
/// ## Refund transitions
/// ```text
///   COMPLETED ──refund(subset)──► PARTIAL_REFUND ──refund(rest)──► REFUNDED
///       │                                                             ▲
///       └──────────────────refund(everything)─────────────────────────┘
///
///   REFUNDED, CANCELLED: no further refunds
/// ```
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Pending,
    Completed,
    PartialRefund,
    Refunded,
    Cancelled,
}

impl SaleStatus {
    /// Fails with BAD_REQUEST when the sale can no longer be refunded.
    pub fn ensure_refundable(self, sale_id: &str) -> CoreResult<()> {
        match self {
            SaleStatus::Refunded => Err(CoreError::precondition(format!(
                "Sale {} is already fully refunded",
                sale_id
            ))),
            SaleStatus::Cancelled => Err(CoreError::precondition(format!(
                "Sale {} is cancelled",
                sale_id
            ))),
            _ => Ok(()),
        }
    }
}

/// A completed (or otherwise) sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    /// Per-tenant sequential number allocated atomically.
    pub sale_number: i64,
    pub point_of_sale_id: Option<String>,
    pub cash_session_id: Option<String>,
    pub customer_id: Option<String>,
    pub user_id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A sale line item.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

/// A payment applied to a sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Provider reference (e.g. external payment id).
    pub reference: Option<String>,
    pub card_brand: Option<String>,
    pub card_last_four: Option<String>,
    pub installments: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
