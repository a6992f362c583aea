//! User store boundary and its SQLite implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, instrument};

use super::models::{NewUser, User, UserRow};
use crate::auth::{Role, Status};

/// Failures reading from the user store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or the query failed.
    #[error("user store unavailable: {0}")]
    Unavailable(String),

    /// The stored role or status is outside the known enumerations.
    /// Fields that did map are carried so callers can keep them.
    #[error("user {id} has an unrecognized role or status")]
    InvalidRecord {
        id: String,
        role: Option<Role>,
        status: Option<Status>,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Read-only user lookups consumed by the auth layer.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by ID.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Look up a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

const USER_COLUMNS: &str = "id, email, password_hash, name, first_name, last_name, role, status, created_at, updated_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        format!("usr_{}", suffix.to_lowercase())
    }

    /// Create a new user.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create(&self, request: NewUser) -> Result<User> {
        let id = Self::generate_id();

        debug!("Creating user: {} ({})", request.email, id);

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, first_name, last_name, role, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(&request.name)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.role.as_str())
        .bind(request.status.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Change a user's status. Returns `false` when no such user exists.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: &str, status: Status) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET status = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update user status")?;

        Ok(result.rows_affected() > 0)
    }

    /// Change a user's role. Returns `false` when no such user exists.
    #[instrument(skip(self))]
    pub async fn set_role(&self, id: &str, role: Role) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET role = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(role.as_str())
                .bind(id)
                .execute(&self.pool)
                .await
                .context("Failed to update user role")?;

        Ok(result.rows_affected() > 0)
    }

    /// List all users, oldest first. Rows that fail to map are skipped.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| User::try_from(row).ok())
            .collect())
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserStore for UserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_by("id", id).await
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_by("email", email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn repo() -> UserRepository {
        let db = Database::in_memory().await.unwrap();
        UserRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = repo().await;
        let created = repo
            .create(
                NewUser::new("kim@example.org")
                    .with_name("Kim")
                    .with_role(Role::Staff)
                    .with_status(Status::Active),
            )
            .await
            .unwrap();

        assert!(created.id.starts_with("usr_"));

        let by_email = repo.find_by_email("kim@example.org").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.role, Role::Staff);

        let by_id = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "kim@example.org");

        assert!(repo.find_by_id("usr_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = repo().await;
        repo.create(NewUser::new("dup@example.org")).await.unwrap();
        assert!(repo.create(NewUser::new("dup@example.org")).await.is_err());
    }

    #[tokio::test]
    async fn test_set_status_and_role() {
        let repo = repo().await;
        let user = repo.create(NewUser::new("p@example.org")).await.unwrap();
        assert_eq!(user.status, Status::Pending);

        assert!(repo.set_status(&user.id, Status::Active).await.unwrap());
        assert!(repo.set_role(&user.id, Role::Admin).await.unwrap());
        assert!(!repo.set_status("usr_nobody", Status::Active).await.unwrap());

        let user = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(user.status, Status::Active);
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_unknown_stored_role_is_invalid_record() {
        let repo = repo().await;
        let user = repo.create(NewUser::new("odd@example.org")).await.unwrap();
        sqlx::query("UPDATE users SET role = 'OWNER' WHERE id = ?")
            .bind(&user.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        match repo.find_by_id(&user.id).await {
            Err(StoreError::InvalidRecord { role, status, .. }) => {
                assert_eq!(role, None);
                assert_eq!(status, Some(Status::Pending));
            }
            other => panic!("expected InvalidRecord, got {other:?}"),
        }

        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let repo = repo().await;
        repo.pool.close().await;
        assert!(matches!(
            repo.find_by_email("x@example.org").await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
