//! # Repository Module
//!
//! Tenant-scoped repositories. Each one owns the SQL for one component and
//! the transaction boundaries of its multi-row operations.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CashSessionRepository ──────────► cash_sessions, cash_counts           │
//! │        │ (totals)                                                       │
//! │  CashMovementRepository ─────────► cash_movements                       │
//! │        │ WITHDRAWAL (same tx)                                           │
//! │        ▼                                                                │
//! │  TreasuryRepository ─────────────► treasury_pending_withdrawals         │
//! │        │ confirmed amounts                                              │
//! │        ▼                                                                │
//! │  TreasuryMovementRepository ─────► treasury_movements, balance          │
//! │                                                                         │
//! │  OrphanOrderRepository ──────────► mp_orphan_orders (+ sale rows)       │
//! │  RefundRepository ───────────────► sale_refunds (+ sale status)         │
//! │  SaleRepository / LocationRepository ── read models                     │
//! │                                                                         │
//! │  sequence::next_value ── atomic counters used inside transactions      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write transaction starts with [`begin_write`] (`BEGIN IMMEDIATE`).
//! Inside a transaction every statement runs on `&mut *tx`; the pool is
//! never touched until commit. In-memory test databases have a single
//! connection, so mixing the two would deadlock.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

pub mod cash_movement;
pub mod cash_session;
pub mod location;
pub mod orphan;
pub mod refund;
pub mod sale;
pub mod sequence;
pub mod treasury;
pub mod treasury_movement;

#[cfg(test)]
pub(crate) mod fixtures;

/// Opens a transaction that holds SQLite's write lock from the start.
///
/// A deferred transaction that reads first cannot upgrade to a writer while
/// another writer commits (SQLITE_BUSY, no retry). Taking the lock at
/// `BEGIN` makes racing writers queue on `busy_timeout`, so the loser reaches
/// the domain checks and fails with CONFLICT.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Generates a new UUID v4 primary key.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
