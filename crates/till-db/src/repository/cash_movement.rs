//! # Cash Movement Ledger
//!
//! Append-only record of cash moved in or out of a drawer outside of sales.
//!
//! ## Withdrawal pairing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   ├─ UPDATE cash_sessions += withdrawals/deposits WHERE status='open'   │
//! │   │     0 rows ─► NOT_FOUND / BAD_REQUEST, nothing written              │
//! │   ├─ INSERT cash_movements                                              │
//! │   └─ WITHDRAWAL only: INSERT treasury_pending_withdrawals (PENDING)     │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transaction holds SQLite's write lock from BEGIN, so a concurrent
//! close either happens entirely before (and the update matches no row) or
//! waits.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::cash_session::fetch_session;
use crate::repository::{begin_write, new_id};
use crate::repository::treasury::insert_pending_withdrawal;
use till_core::commands::RecordMovement;
use till_core::session::{ensure_positive_movement, CashMovement, CashMovementType};
use till_core::treasury::TreasuryPendingWithdrawal;

/// A recorded movement and, for withdrawals, its treasury counterpart.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedMovement {
    pub movement: CashMovement,
    pub pending_withdrawal: Option<TreasuryPendingWithdrawal>,
}

#[derive(Debug, Clone)]
pub struct CashMovementRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl CashMovementRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        CashMovementRepository { pool, tenant_id }
    }

    /// Records a movement on an OPEN session.
    ///
    /// ## Errors
    /// - NOT_FOUND: unknown session
    /// - BAD_REQUEST: session CLOSED, or amount ≤ 0
    pub async fn record(
        &self,
        session_id: &str,
        actor: &str,
        cmd: RecordMovement,
    ) -> DbResult<RecordedMovement> {
        ensure_positive_movement(cmd.amount)?;

        let (withdrawn, deposited) = match cmd.movement_type {
            CashMovementType::Withdrawal => (cmd.amount.cents(), 0),
            CashMovementType::Deposit => (0, cmd.amount.cents()),
            CashMovementType::Adjustment => (0, 0),
        };

        debug!(
            tenant_id = %self.tenant_id,
            session_id = %session_id,
            movement_type = ?cmd.movement_type,
            amount = %cmd.amount,
            "Recording cash movement"
        );

        let mut tx = begin_write(&self.pool).await?;

        let updated = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                withdrawals_total_cents = withdrawals_total_cents + ?1,
                deposits_total_cents = deposits_total_cents + ?2
            WHERE id = ?3 AND tenant_id = ?4 AND status = 'open'
            "#,
        )
        .bind(withdrawn)
        .bind(deposited)
        .bind(session_id)
        .bind(&self.tenant_id)
        .execute(&mut *tx)
        .await?;

        let session = fetch_session(&mut tx, &self.tenant_id, session_id).await?;
        if updated.rows_affected() == 0 {
            session.status.ensure_open(session_id)?;
        }

        let movement = CashMovement {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            cash_session_id: session.id.clone(),
            movement_type: cmd.movement_type,
            amount_cents: cmd.amount.cents(),
            reason: cmd.reason,
            created_by: actor.to_string(),
            authorized_by: cmd.authorized_by,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_movements (
                id, tenant_id, cash_session_id, movement_type, amount_cents,
                reason, created_by, authorized_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.tenant_id)
        .bind(&movement.cash_session_id)
        .bind(movement.movement_type)
        .bind(movement.amount_cents)
        .bind(&movement.reason)
        .bind(&movement.created_by)
        .bind(&movement.authorized_by)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        let pending_withdrawal = if movement.movement_type.requires_treasury_record() {
            Some(insert_pending_withdrawal(&mut tx, &session, &movement).await?)
        } else {
            None
        };

        tx.commit().await?;

        info!(
            tenant_id = %self.tenant_id,
            movement_id = %movement.id,
            session_id = %session_id,
            movement_type = ?movement.movement_type,
            amount_cents = movement.amount_cents,
            pending_withdrawal_id = pending_withdrawal.as_ref().map(|p| p.id.as_str()),
            "Cash movement recorded"
        );

        Ok(RecordedMovement {
            movement,
            pending_withdrawal,
        })
    }

    /// Movements of a session in creation order.
    pub async fn list(&self, session_id: &str) -> DbResult<Vec<CashMovement>> {
        let mut conn = self.pool.acquire().await?;
        fetch_session(&mut conn, &self.tenant_id, session_id).await?;

        let movements = sqlx::query_as::<_, CashMovement>(
            r#"
            SELECT * FROM cash_movements
            WHERE cash_session_id = ?1 AND tenant_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(session_id)
        .bind(&self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(movements)
    }
}
