//! HTTP client for the fiscal document issuer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use till_core::fiscal::{CreditNote, CreditNoteIssuer, CreditNoteRequest, FiscalError};
use tracing::debug;

/// POSTs the credit-note request as JSON and expects
/// `{"voucherNumber": "...", "cae": "..."}` back.
pub struct HttpCreditNoteIssuer {
    client: Client,
    url: String,
}

impl HttpCreditNoteIssuer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FiscalError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FiscalError::Unavailable(e.to_string()))?;

        Ok(HttpCreditNoteIssuer {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CreditNoteIssuer for HttpCreditNoteIssuer {
    async fn issue_credit_note(&self, request: &CreditNoteRequest) -> Result<CreditNote, FiscalError> {
        debug!(sale_id = %request.sale_id, refund_id = %request.refund_id, "Requesting credit note");

        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| FiscalError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<CreditNote>()
                .await
                .map_err(|e| FiscalError::Unavailable(format!("invalid response: {}", e)));
        }

        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
            Err(FiscalError::Rejected(format!("{}: {}", status, body)))
        } else {
            Err(FiscalError::Unavailable(format!("{}: {}", status, body)))
        }
    }
}
