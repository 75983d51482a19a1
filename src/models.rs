//! Account Models
//!
//! Data structures for requests, responses, and database entities.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

// ============================================
// Database Entities
// ============================================

/// Account entity from database
///
/// Deliberately not `Serialize`: only [`UserResponse`] leaves the process.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub wishlist: Vec<String>,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// True when `token` is the refresh token currently on record
    pub fn holds_refresh_token(&self, token: &str) -> bool {
        self.refresh_token.as_deref() == Some(token)
    }
}

/// Values needed to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

// ============================================
// Wishlist
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WishlistAction {
    Add,
    Delete,
}

impl FromStr for WishlistAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(WishlistAction::Add),
            "delete" => Ok(WishlistAction::Delete),
            _ => Err(AppError::Validation("invalid action".to_string())),
        }
    }
}

impl WishlistAction {
    /// Returns the wishlist that results from applying this action
    pub fn apply(self, wishlist: &[String], coin: &str) -> Vec<String> {
        match self {
            WishlistAction::Add => {
                let mut next = wishlist.to_vec();
                next.push(coin.to_string());
                next
            }
            WishlistAction::Delete => wishlist
                .iter()
                .filter(|item| item.as_str() != coin)
                .cloned()
                .collect(),
        }
    }
}

// ============================================
// Request DTOs
// ============================================

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Please enter your email"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Please enter your password"))]
    pub password: String,
}

/// Registration form, assembled from multipart text fields
#[derive(Debug, Clone, Default, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "All fields are required"))]
    pub user_name: String,

    #[validate(length(min = 1, message = "All fields are required"))]
    pub password: String,
}

/// Refresh token request (body fallback when the cookie is absent)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Change password request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Both fields are required"))]
    pub old_password: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Both fields are required"))]
    pub new_password: String,
}

/// Account details update; an empty field leaves the stored value untouched
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    #[validate(length(max = 50, message = "Username must be at most 50 characters"))]
    pub user_name: String,

    #[serde(default)]
    pub email: String,
}

/// Wishlist update request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WishlistRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "coin or action is invalid"))]
    pub coin: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "coin or action is invalid"))]
    pub action: String,
}

// ============================================
// Response DTOs
// ============================================

/// Public account data (no password hash, no refresh token)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "userName")]
    pub username: String,
    pub avatar: Option<String>,
    pub wishlist: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            username: account.username,
            avatar: account.avatar,
            wishlist: account.wishlist,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

impl From<&Account> for UserResponse {
    fn from(account: &Account) -> Self {
        Self::from(account.clone())
    }
}

/// Access/refresh token pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Success envelope shared by every JSON endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
