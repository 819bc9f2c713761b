//! # till-db: Database Layer for the Till Back Office
//!
//! Persistence for cash sessions, treasury reconciliation, orphan card
//! orders and refunds. SQLite through sqlx, every query scoped to a tenant.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Back Office Data Flow                       │
//! │                                                                         │
//! │  HTTP handler (POST /treasury/pending/{id}/confirm)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  TenantScope  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │───►│  (scope.rs)   │    │  (embedded)  │  │   │
//! │  │   │               │    │       │       │    │              │  │   │
//! │  │   │ SqlitePool    │    │       ▼       │    │ 001_schema   │  │   │
//! │  │   │ WAL, FKs on   │    │ Repositories  │    │ 002_...      │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (till.db)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`scope`] - Tenant-bound repository factory
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//!
//! let pending = db
//!     .tenant("acme")
//!     .treasury()
//!     .list_pending(&filter, page)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod scope;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use scope::TenantScope;

// Repository re-exports for convenience
pub use repository::cash_movement::{CashMovementRepository, RecordedMovement};
pub use repository::cash_session::{CashSessionRepository, ClosedSession};
pub use repository::location::LocationRepository;
pub use repository::orphan::{OrphanLinked, OrphanOrderRepository, OrphanSaleCreated};
pub use repository::refund::{RefundOutcome, RefundRepository};
pub use repository::sale::{NewPayment, NewSale, SaleDetail, SaleRepository};
pub use repository::treasury::TreasuryRepository;
pub use repository::treasury_movement::{RecordedTreasuryMovement, TreasuryMovementRepository};
