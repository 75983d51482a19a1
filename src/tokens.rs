//! JWT issuance and verification
//!
//! Access and refresh tokens are signed with separate secrets so neither
//! can stand in for the other.

use crate::error::AppError;
use crate::models::Account;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (account ID)
    pub sub: Uuid,
    pub email: String,
    #[serde(rename = "userName")]
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// JWT claims for refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (account ID)
    pub sub: Uuid,
    /// Unique per issuance, so two tokens minted in the same second differ
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds),
        }
    }
}

/// Signs and verifies session tokens
pub struct TokenIssuer {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(
        access_secret: &str,
        access_ttl_seconds: i64,
        refresh_secret: &str,
        refresh_ttl_seconds: i64,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: KeyPair::new(access_secret, access_ttl_seconds),
            refresh: KeyPair::new(refresh_secret, refresh_ttl_seconds),
            validation,
        }
    }

    /// Generate an access token for an account
    pub fn sign_access(&self, account: &Account) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.access.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.access.encoding).map_err(|e| {
            tracing::error!("Failed to sign access token: {:?}", e);
            AppError::Internal("Failed to sign access token".to_string())
        })
    }

    /// Generate a refresh token for an account ID
    pub fn sign_refresh(&self, account_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: account_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + self.refresh.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh.encoding).map_err(|e| {
            tracing::error!("Failed to sign refresh token: {:?}", e);
            AppError::Internal("Failed to sign refresh token".to_string())
        })
    }

    /// Validate an access token (signature and expiry)
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AppError> {
        let data = decode::<AccessClaims>(token, &self.access.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!("Access token rejected: {:?}", e);
                AppError::Unauthorized("Invalid access token".to_string())
            })?;
        Ok(data.claims)
    }

    /// Validate a refresh token (signature and expiry)
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AppError> {
        let data = decode::<RefreshClaims>(token, &self.refresh.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!("Refresh token rejected: {:?}", e);
                AppError::Unauthorized("Invalid refresh token".to_string())
            })?;
        Ok(data.claims)
    }
}
