//! # Orphan Payment Orders
//!
//! The card terminal provider notifies us of processed payments. Sometimes
//! the matching sale never gets created (terminal offline, app crashed
//! mid-checkout). Those orders are "orphans": processed, but `sale_id` is
//! null.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Orphan ⇔ status = PROCESSED ∧ sale_id = null                           │
//! │                                                                         │
//! │  createSaleFromOrphan(items)   items total must match order amount     │
//! │      └─► new Sale + SaleItems + MP_POINT Payment, order.sale_id set    │
//! │                                                                         │
//! │  linkSaleToOrphan(sale_id)     sale total must match order amount      │
//! │      └─► order.sale_id set                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Provider status of a fully processed payment.
pub const ORDER_STATUS_PROCESSED: &str = "processed";

/// A payment order as persisted by the provider integration.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrphanPaymentOrder {
    pub order_id: String,
    pub tenant_id: String,
    /// Provider-defined status string.
    pub status: String,
    pub amount_cents: i64,
    pub payment_id: String,
    pub card_brand: Option<String>,
    pub card_last_four: Option<String>,
    pub installments: i64,
    #[ts(as = "String")]
    pub processed_at: DateTime<Utc>,
    pub sale_id: Option<String>,
}

impl OrphanPaymentOrder {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_processed(&self) -> bool {
        self.status.eq_ignore_ascii_case(ORDER_STATUS_PROCESSED)
    }

    #[inline]
    pub fn is_orphan(&self) -> bool {
        self.is_processed() && self.sale_id.is_none()
    }

    /// Checks the order can be resolved into a sale.
    ///
    /// ## Errors
    /// - NOT_FOUND when already linked (it is no longer an orphan)
    /// - BAD_REQUEST when the provider has not processed it
    pub fn ensure_resolvable(&self) -> CoreResult<()> {
        if self.sale_id.is_some() {
            return Err(CoreError::not_found("Orphan order", &self.order_id));
        }
        if !self.is_processed() {
            return Err(CoreError::precondition(format!(
                "Order {} is not processed (status: {})",
                self.order_id, self.status
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Synthesized Sale Lines
// =============================================================================

/// A validated sale line (product, quantity, price, discount).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleLine {
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
}

impl SaleLine {
    /// quantity × unit price
    pub fn gross(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// gross − discount
    pub fn line_total(&self) -> Money {
        self.gross() - self.discount
    }
}

/// Sale totals derived from its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

impl SaleTotals {
    pub fn from_lines(lines: &[SaleLine]) -> Self {
        let subtotal: Money = lines.iter().map(SaleLine::gross).sum();
        let discount: Money = lines.iter().map(|l| l.discount).sum();
        SaleTotals {
            subtotal,
            discount,
            total: subtotal - discount,
        }
    }
}

/// Fails with AMOUNT_MISMATCH when `actual` is outside the tolerance of `expected`.
pub fn ensure_amount_matches(expected: Money, actual: Money) -> CoreResult<()> {
    if expected.within_tolerance(actual) {
        Ok(())
    } else {
        Err(CoreError::AmountMismatch { expected, actual })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: &str, sale_id: Option<&str>) -> OrphanPaymentOrder {
        OrphanPaymentOrder {
            order_id: "o1".to_string(),
            tenant_id: "t1".to_string(),
            status: status.to_string(),
            amount_cents: 25_000,
            payment_id: "pay-1".to_string(),
            card_brand: Some("visa".to_string()),
            card_last_four: Some("4242".to_string()),
            installments: 1,
            processed_at: Utc::now(),
            sale_id: sale_id.map(str::to_string),
        }
    }

    fn line(quantity: i64, unit: i64, discount: i64) -> SaleLine {
        SaleLine {
            product_id: None,
            description: "Item".to_string(),
            quantity,
            unit_price: Money::from_cents(unit),
            discount: Money::from_cents(discount),
        }
    }

    #[test]
    fn test_orphan_detection() {
        assert!(order("processed", None).is_orphan());
        assert!(order("PROCESSED", None).is_orphan());
        assert!(!order("processed", Some("sale")).is_orphan());
        assert!(!order("pending", None).is_orphan());
    }

    #[test]
    fn test_ensure_resolvable() {
        assert!(order("processed", None).ensure_resolvable().is_ok());
        assert!(matches!(
            order("processed", Some("sale")).ensure_resolvable(),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            order("canceled", None).ensure_resolvable(),
            Err(CoreError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_sale_totals() {
        let totals = SaleTotals::from_lines(&[line(2, 10_000, 0), line(1, 6_000, 1_000)]);
        assert_eq!(totals.subtotal.cents(), 26_000);
        assert_eq!(totals.discount.cents(), 1_000);
        assert_eq!(totals.total.cents(), 25_000);
    }

    #[test]
    fn test_amount_match_tolerance() {
        let expected = Money::from_cents(25_000);
        assert!(ensure_amount_matches(expected, Money::from_cents(25_000)).is_ok());
        assert!(ensure_amount_matches(expected, Money::from_cents(25_001)).is_ok());
        assert!(matches!(
            ensure_amount_matches(expected, Money::from_cents(20_000)),
            Err(CoreError::AmountMismatch { .. })
        ));
    }
}
