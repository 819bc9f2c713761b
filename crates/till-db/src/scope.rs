//! # Tenant Scope
//!
//! The only way to obtain a repository. Every repository built here carries
//! the tenant id and binds it into every statement it runs.
//!
//! ```text
//!   Database ──tenant("acme")──► TenantScope { pool, tenant_id: "acme" }
//!                                    │
//!                                    ├── cash_sessions()   ── WHERE tenant_id = 'acme'
//!                                    ├── cash_movements()  ── WHERE tenant_id = 'acme'
//!                                    ├── treasury()        ── ...
//!                                    └── ...
//! ```

use sqlx::SqlitePool;

use crate::repository::cash_movement::CashMovementRepository;
use crate::repository::cash_session::CashSessionRepository;
use crate::repository::location::LocationRepository;
use crate::repository::orphan::OrphanOrderRepository;
use crate::repository::refund::RefundRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::treasury::TreasuryRepository;
use crate::repository::treasury_movement::TreasuryMovementRepository;

/// Repository factory bound to one tenant.
#[derive(Debug, Clone)]
pub struct TenantScope {
    pool: SqlitePool,
    tenant_id: String,
}

impl TenantScope {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        TenantScope { pool, tenant_id }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn locations(&self) -> LocationRepository {
        LocationRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn cash_sessions(&self) -> CashSessionRepository {
        CashSessionRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn cash_movements(&self) -> CashMovementRepository {
        CashMovementRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    /// Withdrawal reconciliation.
    pub fn treasury(&self) -> TreasuryRepository {
        TreasuryRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    /// Outgoing treasury movements and the derived balance.
    pub fn treasury_movements(&self) -> TreasuryMovementRepository {
        TreasuryMovementRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn orphan_orders(&self) -> OrphanOrderRepository {
        OrphanOrderRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    pub fn refunds(&self) -> RefundRepository {
        RefundRepository::new(self.pool.clone(), self.tenant_id.clone())
    }
}
