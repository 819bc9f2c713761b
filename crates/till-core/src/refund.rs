//! # Refunds
//!
//! Refunds never edit the original sale lines. Each refund is a new record
//! listing which items and how many units went back; the sale status moves
//! to PARTIAL_REFUND or REFUNDED.
//!
//! ## Remaining Quantity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sold 3 × Coffee                                                        │
//! │    refund #1: 1   → remaining 2   sale → PARTIAL_REFUND                 │
//! │    refund #2: 3   → rejected (3 > 2), nothing recorded                  │
//! │    refund #2: 2   → remaining 0   sale → REFUNDED (if every item is 0)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{SaleItem, SaleStatus};
use crate::validation::validate_total;

/// A committed refund.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleRefund {
    pub id: String,
    pub tenant_id: String,
    pub sale_id: String,
    pub reason: String,
    pub total_cents: i64,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Set after the fiscal issuer accepted the credit note.
    pub credit_note_voucher: Option<String>,
    pub credit_note_cae: Option<String>,
}

/// One refunded line.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleRefundItem {
    pub id: String,
    pub refund_id: String,
    pub sale_item_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub amount_cents: i64,
}

/// A requested refund line (validated shape, not yet checked against the sale).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundLine {
    pub sale_item_id: String,
    pub quantity: i64,
}

/// A refund line checked against the sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRefundLine {
    pub sale_item_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub amount: Money,
}

/// Everything needed to persist a refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPlan {
    pub lines: Vec<PlannedRefundLine>,
    pub total: Money,
    pub resulting_status: SaleStatus,
}

impl RefundPlan {
    /// Checks a refund request against the sale and its refund history.
    ///
    /// `already_refunded` maps sale item id → units refunded by earlier refunds.
    ///
    /// ## Errors
    /// - BAD_REQUEST: sale is REFUNDED/CANCELLED, or quantity exceeds remaining
    /// - VALIDATION_ERROR: item not part of the sale, duplicate item, quantity ≤ 0
    pub fn build(
        sale_id: &str,
        status: SaleStatus,
        items: &[SaleItem],
        already_refunded: &HashMap<String, i64>,
        requested: &[RefundLine],
    ) -> CoreResult<RefundPlan> {
        status.ensure_refundable(sale_id)?;

        if requested.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }

        let by_id: HashMap<&str, &SaleItem> = items.iter().map(|i| (i.id.as_str(), i)).collect();
        let remaining_of = |item: &SaleItem| {
            item.quantity - already_refunded.get(&item.id).copied().unwrap_or(0)
        };

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(requested.len());

        for line in requested {
            if !seen.insert(line.sale_item_id.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: "saleItemId".to_string(),
                    value: line.sale_item_id.clone(),
                }
                .into());
            }
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }

            let item = by_id.get(line.sale_item_id.as_str()).ok_or_else(|| {
                ValidationError::InvalidFormat {
                    field: "saleItemId".to_string(),
                    reason: format!("{} is not an item of sale {}", line.sale_item_id, sale_id),
                }
            })?;

            let remaining = remaining_of(item);
            if line.quantity > remaining {
                return Err(CoreError::precondition(format!(
                    "Cannot refund {} units of item {}: only {} remaining",
                    line.quantity, item.id, remaining
                )));
            }

            let unit_price = item.unit_price();
            let amount = unit_price
                .checked_multiply_quantity(line.quantity)
                .ok_or_else(|| ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 1,
                    max: remaining,
                })?;
            lines.push(PlannedRefundLine {
                sale_item_id: item.id.clone(),
                description: item.description.clone(),
                quantity: line.quantity,
                unit_price,
                amount,
            });
        }

        let fully_refunded = items.iter().all(|item| {
            let now = lines
                .iter()
                .find(|l| l.sale_item_id == item.id)
                .map_or(0, |l| l.quantity);
            remaining_of(item) - now <= 0
        });

        let total = validate_total("items", lines.iter().map(|l| l.amount))?;

        Ok(RefundPlan {
            total,
            lines,
            resulting_status: if fully_refunded {
                SaleStatus::Refunded
            } else {
                SaleStatus::PartialRefund
            },
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
