//! # till-core: Pure Business Logic for the Till Back Office
//!
//! Everything that decides *what* happens to money lives here, as pure
//! functions and types with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Till Back Office Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    till-api (axum)                              │   │
//! │  │    auth ──► JSON body ──► command ──► repository ──► envelope   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │   │ session  │ │ treasury │ │  orphan  │ │ refund │ │commands│ │   │
//! │  │   │ lifecycle│ │ state    │ │ amount   │ │ plan   │ │validate│ │   │
//! │  │   │ counts   │ │ machine  │ │ matching │ │        │ │        │ │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (Database Layer)                     │   │
//! │  │      SQLite, migrations, tenant-scoped transactional repos      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer-cent money and the 1 cent tolerance
//! - [`types`] - Payment methods, pagination, sales read models
//! - [`session`] - Cash sessions, ledger movements, counts, daily report
//! - [`treasury`] - Withdrawal reconciliation, movements, balance
//! - [`orphan`] - Orphan payment orders and amount matching
//! - [`refund`] - Refund planning against sale history
//! - [`fiscal`] - Credit note issuer interface
//! - [`commands`] - Request → validated command
//! - [`validation`] - Field validators
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::Money;
//! use till_core::treasury::{PendingWithdrawalStatus, WithdrawalResolution};
//!
//! let expected = Money::from_cents(10_000);
//! let outcome = PendingWithdrawalStatus::Pending
//!     .resolve("w-1", expected, WithdrawalResolution::Confirm {
//!         received: Money::from_cents(9_500),
//!     })
//!     .unwrap();
//!
//! assert_eq!(outcome, PendingWithdrawalStatus::Partial);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod commands;
pub mod error;
pub mod fiscal;
pub mod money;
pub mod orphan;
pub mod refund;
pub mod session;
pub mod treasury;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, AMOUNT_TOLERANCE};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default page size for list operations.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound for `pageSize`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Maximum units of one item on a synthesized sale or refund line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Upper bound for any single amount, and for the total of one request.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

/// Minimum length of a withdrawal rejection reason (after trimming).
pub const MIN_REJECTION_REASON_LEN: usize = 5;

/// Maximum length of free-text fields (reasons, notes, descriptions).
pub const MAX_TEXT_LEN: usize = 500;
