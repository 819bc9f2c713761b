//! # Location Repository
//!
//! Branches and points of sale. These belong to the tenant administration
//! subsystem; the reconciliation core only reads them, so writes here exist
//! for seeding and tests.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use till_core::{Branch, PointOfSale};

#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl LocationRepository {
    pub(crate) fn new(pool: SqlitePool, tenant_id: String) -> Self {
        LocationRepository { pool, tenant_id }
    }

    pub async fn create_branch(&self, name: &str) -> DbResult<Branch> {
        let branch = Branch {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        debug!(tenant_id = %self.tenant_id, branch_id = %branch.id, "Creating branch");

        sqlx::query("INSERT INTO branches (id, tenant_id, name, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&branch.id)
            .bind(&branch.tenant_id)
            .bind(&branch.name)
            .bind(branch.created_at)
            .execute(&self.pool)
            .await?;

        Ok(branch)
    }

    pub async fn list_branches(&self) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            "SELECT * FROM branches WHERE tenant_id = ?1 ORDER BY name",
        )
        .bind(&self.tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }

    /// Creates a point of sale inside a branch of this tenant.
    ///
    /// ## Errors
    /// - NOT_FOUND when the branch belongs to another tenant or doesn't exist
    /// - `UniqueViolation` when `code` is taken
    pub async fn create_point_of_sale(
        &self,
        branch_id: &str,
        code: &str,
        name: &str,
    ) -> DbResult<PointOfSale> {
        let branch_exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM branches WHERE id = ?1 AND tenant_id = ?2")
                .bind(branch_id)
                .bind(&self.tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        if branch_exists.is_none() {
            return Err(DbError::not_found("Branch", branch_id));
        }

        let pos = PointOfSale {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            branch_id: branch_id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(tenant_id = %self.tenant_id, pos_id = %pos.id, code = %pos.code, "Creating point of sale");

        sqlx::query(
            r#"
            INSERT INTO points_of_sale (id, tenant_id, branch_id, code, name, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&pos.id)
        .bind(&pos.tenant_id)
        .bind(&pos.branch_id)
        .bind(&pos.code)
        .bind(&pos.name)
        .bind(pos.is_active)
        .bind(pos.created_at)
        .execute(&self.pool)
        .await?;

        Ok(pos)
    }

    pub async fn get_point_of_sale(&self, id: &str) -> DbResult<PointOfSale> {
        sqlx::query_as::<_, PointOfSale>(
            "SELECT * FROM points_of_sale WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Point of sale", id))
    }

    pub async fn list_points_of_sale(&self) -> DbResult<Vec<PointOfSale>> {
        let points = sqlx::query_as::<_, PointOfSale>(
            "SELECT * FROM points_of_sale WHERE tenant_id = ?1 ORDER BY code",
        )
        .bind(&self.tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(points)
    }
}
