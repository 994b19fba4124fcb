//! User repository

use sqlx::SqlitePool;

use super::{bounded, format_timestamp, parse_timestamp, StoreError};
use crate::models::User;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    created_at: String,
    name: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            created_at: parse_timestamp(&row.created_at)?,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            activated: row.activated,
            version: row.version,
        })
    }
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert `user`, filling in its `id` and `version`
    pub async fn insert(&self, user: &mut User) -> Result<(), StoreError> {
        let result = bounded(
            sqlx::query_as::<_, (i64, i32)>(
                r#"
                INSERT INTO users (created_at, name, email, password_hash, activated)
                VALUES (?, ?, ?, ?, ?)
                RETURNING id, version
                "#,
            )
            .bind(format_timestamp(&user.created_at))
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .fetch_one(self.pool),
        )
        .await;

        let (id, version) = result.map_err(map_unique_email)?;
        user.id = id;
        user.version = version;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        let row = bounded(
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, created_at, name, email, password_hash, activated, version
                FROM users
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(self.pool),
        )
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    /// Case-insensitive lookup
    pub async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let row = bounded(
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, created_at, name, email, password_hash, activated, version
                FROM users
                WHERE email = ?
                "#,
            )
            .bind(email)
            .fetch_optional(self.pool),
        )
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    /// Optimistic-locking update; bumps `user.version` on success
    pub async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        let result = bounded(
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE users
                SET name = ?, email = ?, password_hash = ?, activated = ?, version = version + 1
                WHERE id = ? AND version = ?
                RETURNING version
                "#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(self.pool),
        )
        .await;

        match result.map_err(map_unique_email)? {
            Some(version) => {
                user.version = version;
                Ok(())
            }
            None => Err(StoreError::EditConflict),
        }
    }
}

fn map_unique_email(err: StoreError) -> StoreError {
    match err {
        StoreError::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            StoreError::DuplicateEmail
        }
        other => other,
    }
}
