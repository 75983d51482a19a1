//! Credential store
//!
//! `UserStore` is the only path to persisted accounts. `PgUserStore` backs
//! the server; `MemoryUserStore` keeps the same uniqueness rules in a map.

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use crate::error::AppError;
use crate::models::{Account, NewAccount};

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AppError>;

    /// First account matching either the email or the username
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Account>, AppError>;

    /// Insert a new account; duplicate email or username is a conflict
    async fn insert(&self, account: NewAccount) -> Result<Account, AppError>;

    /// Overwrite (or clear) the stored refresh token. Returns false when the
    /// account does not exist.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool, AppError>;

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError>;

    /// Update username and/or email; `None` keeps the stored value
    async fn update_details(
        &self,
        id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, AppError>;

    async fn set_avatar(&self, id: Uuid, avatar: Option<&str>) -> Result<Option<Account>, AppError>;

    async fn set_wishlist(&self, id: Uuid, wishlist: &[String])
        -> Result<Option<Account>, AppError>;
}
