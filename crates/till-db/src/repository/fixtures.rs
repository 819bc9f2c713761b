//! Shared setup for repository tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::{Database, DbConfig};
use till_core::commands::OpenSession;
use till_core::fiscal::{CreditNote, CreditNoteIssuer, CreditNoteRequest, FiscalError};
use till_core::orphan::SaleLine;
use till_core::session::CashSession;
use till_core::{Branch, Money, PointOfSale};

/// Fresh in-memory database with one branch and one point of sale for `tenant`.
pub async fn setup(tenant: &str) -> (Database, Branch, PointOfSale) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let (branch, pos) = add_point_of_sale(&db, tenant, "POS-01").await;
    (db, branch, pos)
}

/// File-backed database with a real connection pool, for races.
///
/// Keep the returned directory alive for the duration of the test.
pub async fn setup_shared(tenant: &str) -> (TempDir, Database, PointOfSale) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("till.db")).max_connections(8);
    let db = Database::new(config).await.unwrap();
    let (_, pos) = add_point_of_sale(&db, tenant, "POS-01").await;
    (dir, db, pos)
}

/// Runs `racers` copies of `op` concurrently and returns every result.
pub async fn race<T, F, Fut>(racers: usize, op: F) -> Vec<crate::DbResult<T>>
where
    T: Send + 'static,
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = crate::DbResult<T>> + Send + 'static,
{
    let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(racers));
    let handles: Vec<_> = (0..racers)
        .map(|_| {
            let barrier = barrier.clone();
            let fut = op();
            tokio::spawn(async move {
                barrier.wait().await;
                fut.await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(racers);
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

pub async fn add_point_of_sale(db: &Database, tenant: &str, code: &str) -> (Branch, PointOfSale) {
    let locations = db.tenant(tenant).locations();
    let branch = locations.create_branch("Centro").await.unwrap();
    let pos = locations
        .create_point_of_sale(&branch.id, code, "Caja")
        .await
        .unwrap();
    (branch, pos)
}

pub async fn open_session(db: &Database, tenant: &str, pos: &PointOfSale) -> CashSession {
    db.tenant(tenant)
        .cash_sessions()
        .open(
            "cashier-1",
            OpenSession {
                point_of_sale_id: pos.id.clone(),
                cashier_id: None,
            },
        )
        .await
        .unwrap()
}

pub fn line(description: &str, quantity: i64, unit_cents: i64, discount_cents: i64) -> SaleLine {
    SaleLine {
        product_id: None,
        description: description.to_string(),
        quantity,
        unit_price: Money::from_cents(unit_cents),
        discount: Money::from_cents(discount_cents),
    }
}

/// Issuer double that counts calls and either succeeds or fails.
pub struct FakeIssuer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeIssuer {
    pub fn succeeding() -> Self {
        FakeIssuer {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        FakeIssuer {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CreditNoteIssuer for FakeIssuer {
    async fn issue_credit_note(&self, request: &CreditNoteRequest) -> Result<CreditNote, FiscalError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(FiscalError::Unavailable("authority timeout".to_string()));
        }
        Ok(CreditNote {
            voucher_number: format!("NC-0001-{:08}", n),
            cae: format!("CAE-{}", request.refund_id),
        })
    }
}
