//! Permission grants

use sqlx::SqlitePool;

use super::{bounded, StoreError};
use crate::models::Permissions;

pub struct PermissionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PermissionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Every code granted to `user_id`; empty for unknown users
    pub async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        let codes = bounded(
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT permissions.code
                FROM permissions
                INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                WHERE users_permissions.user_id = ?
                "#,
            )
            .bind(user_id)
            .fetch_all(self.pool),
        )
        .await?;

        Ok(codes.into_iter().collect())
    }

    /// Grant `codes` to `user_id`. Unknown codes are ignored, repeats are no-ops.
    pub async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        let mut tx = bounded(self.pool.begin()).await?;
        for code in codes {
            bounded(
                sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO users_permissions (user_id, permission_id)
                    SELECT ?, permissions.id FROM permissions WHERE permissions.code = ?
                    "#,
                )
                .bind(user_id)
                .bind(*code)
                .execute(&mut *tx),
            )
            .await?;
        }
        bounded(tx.commit()).await?;
        Ok(())
    }
}
