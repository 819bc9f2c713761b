//! # Fiscal Document Issuer
//!
//! Interface to the external service that issues credit notes for refunds.
//! Only the interface lives here; the HTTP client lives in the API crate.
//!
//! A failed issuance never undoes a committed refund. The caller reports it
//! next to the successful result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::refund::PlannedRefundLine;

/// One line of a credit note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditNoteLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub amount_cents: i64,
}

impl From<&PlannedRefundLine> for CreditNoteLine {
    fn from(line: &PlannedRefundLine) -> Self {
        CreditNoteLine {
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            amount_cents: line.amount.cents(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditNoteRequest {
    pub tenant_id: String,
    pub sale_id: String,
    pub refund_id: String,
    pub lines: Vec<CreditNoteLine>,
    pub total_cents: i64,
}

/// Identifiers of an issued credit note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditNote {
    pub voucher_number: String,
    /// Electronic authorization code returned by the tax authority.
    pub cae: String,
}

#[derive(Debug, Error)]
pub enum FiscalError {
    #[error("fiscal issuer not configured")]
    NotConfigured,

    /// The issuer answered but refused the document.
    #[error("fiscal issuer rejected the credit note: {0}")]
    Rejected(String),

    #[error("fiscal issuer unavailable: {0}")]
    Unavailable(String),
}

/// Issues credit notes.
#[async_trait]
pub trait CreditNoteIssuer: Send + Sync {
    async fn issue_credit_note(&self, request: &CreditNoteRequest) -> Result<CreditNote, FiscalError>;
}

/// Issuer used when no fiscal endpoint is configured. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCreditNoteIssuer;

#[async_trait]
impl CreditNoteIssuer for DisabledCreditNoteIssuer {
    async fn issue_credit_note(&self, _request: &CreditNoteRequest) -> Result<CreditNote, FiscalError> {
        Err(FiscalError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    #[tokio::test]
    async fn test_disabled_issuer_always_fails() {
        let request = CreditNoteRequest {
            tenant_id: "t1".to_string(),
            sale_id: "s1".to_string(),
            refund_id: "r1".to_string(),
            lines: vec![CreditNoteLine::from(&PlannedRefundLine {
                sale_item_id: "i1".to_string(),
                description: "Coffee".to_string(),
                quantity: 2,
                unit_price: Money::from_cents(1_000),
                amount: Money::from_cents(2_000),
            })],
            total_cents: 2_000,
        };

        let err = DisabledCreditNoteIssuer
            .issue_credit_note(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, FiscalError::NotConfigured));
        assert_eq!(request.lines[0].amount_cents, 2_000);
    }
}
