//! # Sequence Counters
//!
//! Atomic per-tenant counters for human-facing numbers (sale numbers,
//! session numbers per point of sale).
//!
//! ```text
//!   INSERT ... VALUES (tenant, scope, 1)
//!   ON CONFLICT (tenant, scope) DO UPDATE SET value = value + 1
//!   RETURNING value
//! ```
//!
//! A single statement both reads and increments, so two writers can never
//! observe the same value. The bump runs on the caller's transaction and is
//! rolled back with it.

use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Counter scope for sale numbers.
pub const SALE_SCOPE: &str = "sale";

/// Counter scope for session numbers of one point of sale.
pub fn cash_session_scope(point_of_sale_id: &str) -> String {
    format!("cash_session:{}", point_of_sale_id)
}

/// Allocates the next value of `scope` (first value is 1).
pub async fn next_value(conn: &mut SqliteConnection, tenant_id: &str, scope: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sequence_counters (tenant_id, scope, value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (tenant_id, scope) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(tenant_id)
    .bind(scope)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_counters_increment_per_scope_and_tenant() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(next_value(&mut conn, "t1", SALE_SCOPE).await.unwrap(), 1);
        assert_eq!(next_value(&mut conn, "t1", SALE_SCOPE).await.unwrap(), 2);
        assert_eq!(next_value(&mut conn, "t2", SALE_SCOPE).await.unwrap(), 1);
        assert_eq!(
            next_value(&mut conn, "t1", &cash_session_scope("pos-1")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_rolled_back_bump_is_not_consumed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.pool().begin().await.unwrap();
            assert_eq!(next_value(&mut tx, "t1", SALE_SCOPE).await.unwrap(), 1);
            tx.rollback().await.unwrap();
        }

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(next_value(&mut conn, "t1", SALE_SCOPE).await.unwrap(), 1);
    }
}
