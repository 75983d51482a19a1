//! PostgreSQL account store

use super::UserStore;
use crate::error::AppError;
use crate::models::{Account, NewAccount};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the accounts table if it does not exist
    pub async fn migrate(db: &PgPool) -> Result<(), AppError> {
        tracing::info!("Running account migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL,
                username TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                avatar TEXT,
                wishlist TEXT[] NOT NULL DEFAULT '{}',
                refresh_token TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(db)
        .await?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email);")
            .execute(db)
            .await?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users(username);")
            .execute(db)
            .await?;

        tracing::info!("Account migrations completed");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(account)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(account)
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        let account =
            sqlx::query_as("SELECT * FROM users WHERE email = $1 OR username = $2 LIMIT 1")
                .bind(email)
                .bind(username)
                .fetch_optional(&self.db)
                .await?;
        Ok(account)
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO users (id, email, username, password_hash, avatar)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(&account.avatar)
        .fetch_one(&self.db)
        .await?;

        Ok(account)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.db)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_details(
        &self,
        id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<&str>) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(avatar)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn set_wishlist(
        &self,
        id: Uuid,
        wishlist: &[String],
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as(
            "UPDATE users SET wishlist = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(wishlist)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }
}
