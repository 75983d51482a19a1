//! Account Service
//!
//! Business logic for registration, sessions, and profile updates. Handlers
//! stay thin; everything that touches the store or the token issuer lives
//! here.

use crate::error::AppError;
use crate::media::{AvatarUpload, ImageHost};
use crate::models::*;
use crate::password::Argon2Hasher;
use crate::store::UserStore;
use crate::tokens::TokenIssuer;

use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

fn invalid_credentials() -> AppError {
    // Same response for unknown email and wrong password
    AppError::NotFound("Invalid user credentials".to_string())
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Account service
pub struct AccountService {
    store: Arc<dyn UserStore>,
    tokens: TokenIssuer,
    hasher: Argon2Hasher,
    images: Arc<dyn ImageHost>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: TokenIssuer,
        hasher: Argon2Hasher,
        images: Arc<dyn ImageHost>,
    ) -> Self {
        Self {
            store,
            tokens,
            hasher,
            images,
        }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    // ============================================
    // Token Issuance
    // ============================================

    /// Mint a fresh token pair and record the refresh token on the account
    pub async fn issue_session(&self, account_id: Uuid) -> Result<TokenPair, AppError> {
        self.try_issue_session(account_id).await.map_err(|e| {
            tracing::error!(user_id = %account_id, error = %e, "Token issuance failed");
            AppError::Internal(
                "Something went wrong while generating refresh and access token".to_string(),
            )
        })
    }

    async fn try_issue_session(&self, account_id: Uuid) -> Result<TokenPair, AppError> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let access_token = self.tokens.sign_access(&account)?;
        let refresh_token = self.tokens.sign_refresh(account.id)?;

        if !self
            .store
            .set_refresh_token(account.id, Some(&refresh_token))
            .await?
        {
            return Err(AppError::NotFound("Account not found".to_string()));
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    // ============================================
    // Registration
    // ============================================

    /// Create an account and open a session for it
    pub async fn register(
        &self,
        form: RegisterForm,
        avatar: Option<AvatarUpload>,
    ) -> Result<(Account, TokenPair), AppError> {
        let (Some(email), Some(username), Some(_)) = (
            non_empty(&form.email),
            non_empty(&form.user_name),
            non_empty(&form.password),
        ) else {
            return Err(AppError::Validation("All fields are required".to_string()));
        };
        form.validate()?;
        let username = username.to_lowercase();

        if let Some(upload) = &avatar {
            upload.validate()?;
        }

        if self
            .store
            .find_by_email_or_username(email, &username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let avatar_url = match avatar {
            Some(upload) => match self.images.upload(upload).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(error = %e, "Avatar upload failed, registering without avatar");
                    None
                }
            },
            None => None,
        };

        let password_hash = self.hasher.hash(&form.password)?;

        let account = self
            .store
            .insert(NewAccount {
                email: email.to_string(),
                username,
                password_hash,
                avatar: avatar_url,
            })
            .await?;

        tracing::info!(user_id = %account.id, "Account registered");

        let pair = self.issue_session(account.id).await?;
        Ok((account, pair))
    }

    // ============================================
    // Login / Logout / Renewal
    // ============================================

    /// Check credentials and open a session
    pub async fn login(&self, req: LoginRequest) -> Result<(Account, TokenPair), AppError> {
        let account = self
            .store
            .find_by_email(req.email.trim())
            .await?
            .ok_or_else(invalid_credentials)?;

        if !self.hasher.verify(&req.password, &account.password_hash)? {
            tracing::warn!(user_id = %account.id, "Login with wrong password");
            return Err(invalid_credentials());
        }

        let pair = self.issue_session(account.id).await?;
        tracing::info!(user_id = %account.id, "User logged in");

        Ok((account, pair))
    }

    /// Forget the stored refresh token. Outstanding access tokens stay valid
    /// until they expire.
    pub async fn logout(&self, account_id: Uuid) -> Result<(), AppError> {
        self.store.set_refresh_token(account_id, None).await?;
        tracing::info!(user_id = %account_id, "User logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new pair (single use)
    pub async fn refresh(&self, incoming: Option<String>) -> Result<(Account, TokenPair), AppError> {
        let token =
            incoming.ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = self.tokens.verify_refresh(&token)?;

        let account = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

        if !account.holds_refresh_token(&token) {
            tracing::warn!(user_id = %account.id, "Stale or reused refresh token presented");
            return Err(AppError::Unauthorized(
                "Refresh token is expired or used".to_string(),
            ));
        }

        let pair = self.issue_session(account.id).await?;
        Ok((account, pair))
    }

    // ============================================
    // Profile
    // ============================================

    pub async fn change_password(
        &self,
        account_id: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !self.hasher.verify(&req.old_password, &account.password_hash)? {
            return Err(AppError::Validation("Invalid old password".to_string()));
        }

        let password_hash = self.hasher.hash(&req.new_password)?;
        self.store
            .set_password_hash(account_id, &password_hash)
            .await?;

        tracing::info!(user_id = %account_id, "Password changed");
        Ok(())
    }

    pub async fn update_account_details(
        &self,
        account_id: Uuid,
        req: UpdateAccountRequest,
    ) -> Result<Account, AppError> {
        let username = non_empty(&req.user_name).map(str::to_lowercase);
        let email = non_empty(&req.email);

        if username.is_none() && email.is_none() {
            return Err(AppError::Validation(
                "userName or email is required".to_string(),
            ));
        }

        if let Some(email) = email {
            if !String::from(email).validate_email() {
                return Err(AppError::Validation("Invalid email format".to_string()));
            }
            if let Some(existing) = self.store.find_by_email(email).await? {
                if existing.id != account_id {
                    return Err(AppError::Conflict(
                        "User already exists with this email".to_string(),
                    ));
                }
            }
        }

        if let Some(username) = &username {
            if let Some(existing) = self.store.find_by_username(username).await? {
                if existing.id != account_id {
                    return Err(AppError::Conflict("Username is already taken".to_string()));
                }
            }
        }

        self.store
            .update_details(account_id, username.as_deref(), email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update_avatar(
        &self,
        account_id: Uuid,
        upload: AvatarUpload,
    ) -> Result<Account, AppError> {
        upload.validate()?;

        let url = self.images.upload(upload).await.map_err(|e| {
            tracing::error!(user_id = %account_id, error = %e, "Avatar upload failed");
            AppError::Internal("Error while uploading avatar".to_string())
        })?;

        self.store
            .set_avatar(account_id, Some(&url))
            .await?
            .ok_or_else(|| AppError::Internal("Error occurred while updating avatar".to_string()))
    }

    /// Clear the avatar reference; the hosted image itself is left in place
    pub async fn delete_avatar(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.store
            .set_avatar(account_id, None)
            .await?
            .ok_or_else(|| AppError::Internal("Error occurred while deleting avatar".to_string()))
    }

    pub async fn update_wishlist(
        &self,
        account: &Account,
        req: WishlistRequest,
    ) -> Result<Account, AppError> {
        let action: WishlistAction = req.action.trim().parse()?;
        let wishlist = action.apply(&account.wishlist, req.coin.trim());

        self.store
            .set_wishlist(account.id, &wishlist)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
