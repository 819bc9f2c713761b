//! # Commands
//!
//! Raw request bodies and query strings, and the typed commands they
//! validate into. Domain logic only ever receives the validated command.
//!
//! ```text
//!   JSON body ──serde──► *Request ──validate()──► command ──► repository
//!                                       │
//!                                       └──► ValidationError (VALIDATION_ERROR)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::ValidationError;
use crate::money::Money;
use crate::orphan::SaleLine;
use crate::refund::RefundLine;
use crate::session::{CashMovementType, CashSessionStatus};
use crate::treasury::{PendingWithdrawalStatus, TreasuryMovementDetails, TreasuryMovementType};
use crate::types::{DateRange, MethodAmounts, PageRequest, PaymentMethod};
use crate::validation::{
    validate_id, validate_method_amounts, validate_non_negative_amount, validate_optional_id,
    validate_optional_text, validate_positive_amount, validate_quantity, validate_text,
    validate_total, ValidationResult,
};
use crate::{MAX_AMOUNT_CENTS, MAX_TEXT_LEN, MIN_REJECTION_REASON_LEN};

/// User ids come from the identity provider and are not required to be UUIDs.
fn validate_user_ref(field: &str, value: Option<String>) -> ValidationResult<Option<String>> {
    validate_optional_text(field, value, 100)
}

// =============================================================================
// Cash Sessions
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub point_of_sale_id: String,
    #[serde(default)]
    pub cashier_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub point_of_sale_id: String,
    /// Defaults to the acting user.
    pub cashier_id: Option<String>,
}

impl OpenSessionRequest {
    pub fn validate(self) -> ValidationResult<OpenSession> {
        Ok(OpenSession {
            point_of_sale_id: validate_id("pointOfSaleId", &self.point_of_sale_id)?,
            cashier_id: validate_user_ref("cashierId", self.cashier_id)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLineRequest {
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSaleRequest {
    pub payments: Vec<PaymentLineRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalePayment {
    pub method: PaymentMethod,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSale {
    pub payments: Vec<SalePayment>,
}

impl RecordSale {
    pub fn total(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn by_method(&self) -> MethodAmounts {
        let mut amounts = MethodAmounts::default();
        for payment in &self.payments {
            amounts.add(payment.method, payment.amount);
        }
        amounts
    }
}

impl RecordSaleRequest {
    pub fn validate(self) -> ValidationResult<RecordSale> {
        if self.payments.is_empty() {
            return Err(ValidationError::Required {
                field: "payments".to_string(),
            });
        }

        let payments = self
            .payments
            .into_iter()
            .map(|p| {
                Ok(SalePayment {
                    method: p.method,
                    amount: validate_positive_amount("amountCents", p.amount_cents)?,
                })
            })
            .collect::<ValidationResult<Vec<_>>>()?;
        validate_total("payments", payments.iter().map(|p| p.amount))?;

        Ok(RecordSale { payments })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionRequest {
    #[serde(default)]
    pub counted_amounts: Option<MethodAmounts>,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSession {
    /// When present, a count is recorded against the frozen totals.
    pub counted: Option<MethodAmounts>,
    pub verified_by: Option<String>,
    pub notes: Option<String>,
}

impl CloseSessionRequest {
    pub fn validate(self) -> ValidationResult<CloseSession> {
        if let Some(counted) = &self.counted_amounts {
            validate_method_amounts("countedAmounts", counted)?;
        }
        Ok(CloseSession {
            counted: self.counted_amounts,
            verified_by: validate_user_ref("verifiedBy", self.verified_by)?,
            notes: validate_optional_text("notes", self.notes, MAX_TEXT_LEN)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCountRequest {
    pub declared: MethodAmounts,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCount {
    pub declared: MethodAmounts,
    pub verified_by: Option<String>,
    pub notes: Option<String>,
}

impl RecordCountRequest {
    pub fn validate(self) -> ValidationResult<RecordCount> {
        validate_method_amounts("declared", &self.declared)?;
        Ok(RecordCount {
            declared: self.declared,
            verified_by: validate_user_ref("verifiedBy", self.verified_by)?,
            notes: validate_optional_text("notes", self.notes, MAX_TEXT_LEN)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListQuery {
    pub status: Option<CashSessionStatus>,
    pub point_of_sale_id: Option<String>,
    pub branch_id: Option<String>,
    pub cashier_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub status: Option<CashSessionStatus>,
    pub point_of_sale_id: Option<String>,
    pub branch_id: Option<String>,
    pub cashier_id: Option<String>,
}

impl SessionListQuery {
    pub fn validate(self) -> ValidationResult<(SessionFilter, PageRequest)> {
        let filter = SessionFilter {
            status: self.status,
            point_of_sale_id: validate_optional_id("pointOfSaleId", self.point_of_sale_id)?,
            branch_id: validate_optional_id("branchId", self.branch_id)?,
            cashier_id: validate_user_ref("cashierId", self.cashier_id)?,
        };
        Ok((filter, PageRequest::new(self.page, self.page_size)?))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportQuery {
    pub date: NaiveDate,
    pub branch_id: Option<String>,
}

impl DailyReportQuery {
    pub fn validate(self) -> ValidationResult<(NaiveDate, Option<String>)> {
        Ok((self.date, validate_optional_id("branchId", self.branch_id)?))
    }
}

// =============================================================================
// Cash Movements
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovementRequest {
    #[serde(rename = "type")]
    pub movement_type: CashMovementType,
    pub amount_cents: i64,
    pub reason: String,
    #[serde(default)]
    pub authorized_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMovement {
    pub movement_type: CashMovementType,
    pub amount: Money,
    pub reason: String,
    pub authorized_by: Option<String>,
}

impl RecordMovementRequest {
    pub fn validate(self) -> ValidationResult<RecordMovement> {
        Ok(RecordMovement {
            movement_type: self.movement_type,
            amount: validate_positive_amount("amountCents", self.amount_cents)?,
            reason: validate_text("reason", &self.reason, 1, MAX_TEXT_LEN)?,
            authorized_by: validate_user_ref("authorizedBy", self.authorized_by)?,
        })
    }
}

// =============================================================================
// Treasury
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmWithdrawalRequest {
    pub received_amount_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmWithdrawal {
    pub received: Money,
    pub notes: Option<String>,
}

impl ConfirmWithdrawalRequest {
    pub fn validate(self) -> ValidationResult<ConfirmWithdrawal> {
        Ok(ConfirmWithdrawal {
            received: validate_non_negative_amount("receivedAmountCents", self.received_amount_cents)?,
            notes: validate_optional_text("notes", self.notes, MAX_TEXT_LEN)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectWithdrawalRequest {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectWithdrawal {
    pub reason: String,
}

impl RejectWithdrawalRequest {
    pub fn validate(self) -> ValidationResult<RejectWithdrawal> {
        Ok(RejectWithdrawal {
            reason: validate_text("reason", &self.reason, MIN_REJECTION_REASON_LEN, MAX_TEXT_LEN)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingListQuery {
    pub status: Option<PendingWithdrawalStatus>,
    pub branch_id: Option<String>,
    pub point_of_sale_id: Option<String>,
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFilter {
    pub status: Option<PendingWithdrawalStatus>,
    pub branch_id: Option<String>,
    pub point_of_sale_id: Option<String>,
    /// Cashier who recorded the withdrawal.
    pub user_id: Option<String>,
    pub range: DateRange,
}

impl PendingListQuery {
    pub fn validate(self) -> ValidationResult<(PendingFilter, PageRequest)> {
        let filter = PendingFilter {
            status: self.status,
            branch_id: validate_optional_id("branchId", self.branch_id)?,
            point_of_sale_id: validate_optional_id("pointOfSaleId", self.point_of_sale_id)?,
            user_id: validate_user_ref("userId", self.user_id)?,
            range: DateRange::new(self.from, self.to)?,
        };
        Ok((filter, PageRequest::new(self.page, self.page_size)?))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRangeQuery {
    pub fn validate(self) -> ValidationResult<DateRange> {
        DateRange::new(self.from, self.to)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTreasuryMovementRequest {
    pub amount_cents: i64,
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
    pub details: TreasuryMovementDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTreasuryMovement {
    pub amount: Money,
    pub description: String,
    pub reference: Option<String>,
    pub details: TreasuryMovementDetails,
}

impl RecordTreasuryMovementRequest {
    pub fn validate(self) -> ValidationResult<RecordTreasuryMovement> {
        let details = match self.details {
            TreasuryMovementDetails::BankDeposit {
                bank_name,
                account_number,
                deposit_slip,
            } => TreasuryMovementDetails::BankDeposit {
                bank_name: validate_text("details.bankName", &bank_name, 1, 100)?,
                account_number: validate_optional_text("details.accountNumber", account_number, 100)?,
                deposit_slip: validate_optional_text("details.depositSlip", deposit_slip, 100)?,
            },
            TreasuryMovementDetails::SupplierPayment {
                supplier_name,
                invoice_number,
            } => TreasuryMovementDetails::SupplierPayment {
                supplier_name: validate_text("details.supplierName", &supplier_name, 1, 200)?,
                invoice_number: validate_optional_text("details.invoiceNumber", invoice_number, 100)?,
            },
            TreasuryMovementDetails::Expense { category } => TreasuryMovementDetails::Expense {
                category: validate_text("details.category", &category, 1, 100)?,
            },
            TreasuryMovementDetails::Transfer { destination } => TreasuryMovementDetails::Transfer {
                destination: validate_text("details.destination", &destination, 1, 200)?,
            },
            TreasuryMovementDetails::Other => TreasuryMovementDetails::Other,
        };

        Ok(RecordTreasuryMovement {
            amount: validate_positive_amount("amountCents", self.amount_cents)?,
            description: validate_text("description", &self.description, 1, MAX_TEXT_LEN)?,
            reference: validate_optional_text("reference", self.reference, 100)?,
            details,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementListQuery {
    #[serde(rename = "type")]
    pub movement_type: Option<TreasuryMovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub movement_type: Option<TreasuryMovementType>,
    pub range: DateRange,
}

impl MovementListQuery {
    pub fn validate(self) -> ValidationResult<(MovementFilter, PageRequest)> {
        let filter = MovementFilter {
            movement_type: self.movement_type,
            range: DateRange::new(self.from, self.to)?,
        };
        Ok((filter, PageRequest::new(self.page, self.page_size)?))
    }
}

// =============================================================================
// Orphan Orders
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanItemRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleFromOrphanRequest {
    pub items: Vec<OrphanItemRequest>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub point_of_sale_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSaleFromOrphan {
    pub lines: Vec<SaleLine>,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
    pub point_of_sale_id: Option<String>,
}

impl OrphanItemRequest {
    fn validate(self) -> ValidationResult<SaleLine> {
        validate_quantity(self.quantity)?;
        let unit_price = validate_non_negative_amount("unitPriceCents", self.unit_price_cents)?;
        let discount = validate_non_negative_amount("discountCents", self.discount_cents)?;
        let gross = unit_price
            .checked_multiply_quantity(self.quantity)
            .filter(|gross| gross.cents() <= MAX_AMOUNT_CENTS)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "unitPriceCents".to_string(),
                min: 0,
                max: MAX_AMOUNT_CENTS / self.quantity,
            })?;
        if discount > gross {
            return Err(ValidationError::OutOfRange {
                field: "discountCents".to_string(),
                min: 0,
                max: gross.cents(),
            });
        }

        Ok(SaleLine {
            product_id: validate_optional_id("productId", self.product_id)?,
            description: validate_text("description", &self.description, 1, 200)?,
            quantity: self.quantity,
            unit_price,
            discount,
        })
    }
}

impl CreateSaleFromOrphanRequest {
    pub fn validate(self) -> ValidationResult<CreateSaleFromOrphan> {
        if self.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            });
        }

        let lines = self
            .items
            .into_iter()
            .map(OrphanItemRequest::validate)
            .collect::<ValidationResult<Vec<_>>>()?;
        validate_total("items", lines.iter().map(SaleLine::gross))?;

        Ok(CreateSaleFromOrphan {
            lines,
            customer_id: validate_optional_id("customerId", self.customer_id)?,
            notes: validate_optional_text("notes", self.notes, MAX_TEXT_LEN)?,
            point_of_sale_id: validate_optional_id("pointOfSaleId", self.point_of_sale_id)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSaleRequest {
    pub sale_id: String,
}

impl LinkSaleRequest {
    /// Returns the validated sale id.
    pub fn validate(self) -> ValidationResult<String> {
        validate_id("saleId", &self.sale_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn validate(self) -> ValidationResult<PageRequest> {
        PageRequest::new(self.page, self.page_size)
    }
}

// =============================================================================
// Refunds
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundItemRequest {
    pub sale_item_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundSaleRequest {
    pub reason: String,
    pub items: Vec<RefundItemRequest>,
    #[serde(default)]
    pub issue_credit_note: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundSale {
    pub reason: String,
    pub lines: Vec<RefundLine>,
    pub issue_credit_note: bool,
}

impl RefundSaleRequest {
    pub fn validate(self) -> ValidationResult<RefundSale> {
        if self.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            });
        }

        let mut lines: Vec<RefundLine> = Vec::with_capacity(self.items.len());
        for item in self.items {
            let sale_item_id = validate_id("saleItemId", &item.sale_item_id)?;
            validate_quantity(item.quantity)?;
            if lines.iter().any(|l| l.sale_item_id == sale_item_id) {
                return Err(ValidationError::Duplicate {
                    field: "saleItemId".to_string(),
                    value: sale_item_id,
                });
            }
            lines.push(RefundLine {
                sale_item_id,
                quantity: item.quantity,
            });
        }

        Ok(RefundSale {
            reason: validate_text("reason", &self.reason, 1, MAX_TEXT_LEN)?,
            lines,
            issue_credit_note: self.issue_credit_note,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
