//! In-memory account store

use super::UserStore;
use crate::error::AppError;
use crate::models::{Account, NewAccount};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

fn duplicate() -> AppError {
    AppError::Conflict("User with email or username already exists".to_string())
}

/// Map-backed store enforcing the same unique email/username rules as the
/// database schema
#[derive(Default)]
pub struct MemoryUserStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    async fn update<F>(&self, id: Uuid, f: F) -> Option<Account>
    where
        F: FnOnce(&mut Account),
    {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id)?;
        f(account);
        account.updated_at = Utc::now();
        Some(account.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == email || a.username == username)
            .cloned())
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, AppError> {
        let mut accounts = self.accounts.write().await;

        if accounts
            .values()
            .any(|a| a.email == account.email || a.username == account.username)
        {
            return Err(duplicate());
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: account.email,
            username: account.username,
            password_hash: account.password_hash,
            avatar: account.avatar,
            wishlist: Vec::new(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };

        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool, AppError> {
        let mut accounts = self.accounts.write().await;
        Ok(match accounts.get_mut(&id) {
            Some(account) => {
                account.refresh_token = token.map(str::to_string);
                true
            }
            None => false,
        })
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        Ok(self
            .update(id, |a| a.password_hash = password_hash.to_string())
            .await
            .is_some())
    }

    async fn update_details(
        &self,
        id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, AppError> {
        let mut accounts = self.accounts.write().await;

        let taken = accounts.values().any(|a| {
            a.id != id
                && (username.is_some_and(|u| a.username == u)
                    || email.is_some_and(|e| a.email == e))
        });
        if taken {
            return Err(duplicate());
        }

        let Some(account) = accounts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = username {
            account.username = username.to_string();
        }
        if let Some(email) = email {
            account.email = email.to_string();
        }
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<&str>) -> Result<Option<Account>, AppError> {
        Ok(self.update(id, |a| a.avatar = avatar.map(str::to_string)).await)
    }

    async fn set_wishlist(
        &self,
        id: Uuid,
        wishlist: &[String],
    ) -> Result<Option<Account>, AppError> {
        Ok(self.update(id, |a| a.wishlist = wishlist.to_vec()).await)
    }
}
