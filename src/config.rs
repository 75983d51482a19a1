//! Service Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::error::AppError;
use std::env;

/// Service configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port (from PORT env var)
    pub port: u16,

    /// PostgreSQL connection string (from DATABASE_URL env var)
    pub database_url: String,

    /// Frontend origin allowed by CORS (from CORS_ORIGIN env var)
    pub cors_origin: String,

    /// Secret for signing access tokens (from ACCESS_TOKEN_SECRET env var)
    pub access_token_secret: String,

    /// Access token lifetime in seconds (from ACCESS_TOKEN_EXPIRY env var)
    pub access_token_expiry: i64,

    /// Secret for signing refresh tokens (from REFRESH_TOKEN_SECRET env var)
    pub refresh_token_secret: String,

    /// Refresh token lifetime in seconds (from REFRESH_TOKEN_EXPIRY env var)
    pub refresh_token_expiry: i64,

    /// Session cookie lifetime in seconds (from COOKIE_MAX_AGE env var).
    /// Independent of the token expiries.
    pub cookie_max_age: i64,

    /// Mark session cookies `Secure` (from COOKIE_SECURE env var)
    pub cookie_secure: bool,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,

    /// Upload folder for avatars (from CLOUDINARY_FOLDER env var)
    pub cloudinary_folder: String,

    /// News endpoint (from NEWS_API_URL env var)
    pub news_api_url: String,

    /// News API key (from NEWS_API_KEY env var)
    pub news_api_key: String,
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Config(format!("{name} environment variable must be set")))
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            port: parsed_or("PORT", 8000),

            database_url: required("DATABASE_URL")?,

            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            access_token_secret: required("ACCESS_TOKEN_SECRET")?,

            access_token_expiry: parsed_or("ACCESS_TOKEN_EXPIRY", 86_400), // 1 day

            refresh_token_secret: required("REFRESH_TOKEN_SECRET")?,

            refresh_token_expiry: parsed_or("REFRESH_TOKEN_EXPIRY", 864_000), // 10 days

            cookie_max_age: parsed_or("COOKIE_MAX_AGE", 86_400), // 24 hours

            cookie_secure: env::var("COOKIE_SECURE")
                .ok()
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),

            argon2_memory_cost: parsed_or("ARGON2_MEMORY_COST", 19_456), // 19 MiB

            argon2_time_cost: parsed_or("ARGON2_TIME_COST", 2),

            argon2_parallelism: parsed_or("ARGON2_PARALLELISM", 1),

            cloudinary_cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            cloudinary_api_key: required("CLOUDINARY_API_KEY")?,
            cloudinary_api_secret: required("CLOUDINARY_API_SECRET")?,

            cloudinary_folder: env::var("CLOUDINARY_FOLDER")
                .unwrap_or_else(|_| "avatars".to_string()),

            news_api_url: env::var("NEWS_API_URL")
                .unwrap_or_else(|_| "https://newsapi.org/v2/everything".to_string()),

            news_api_key: required("NEWS_API_KEY")?,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AppError> {
        if self.access_token_secret.len() < 32 {
            return Err(AppError::Config(
                "ACCESS_TOKEN_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.refresh_token_secret.len() < 32 {
            return Err(AppError::Config(
                "REFRESH_TOKEN_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.access_token_secret == self.refresh_token_secret {
            return Err(AppError::Config(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
            ));
        }

        if self.access_token_expiry <= 0 {
            return Err(AppError::Config(
                "ACCESS_TOKEN_EXPIRY must be positive".to_string(),
            ));
        }

        if self.refresh_token_expiry <= self.access_token_expiry {
            return Err(AppError::Config(
                "REFRESH_TOKEN_EXPIRY must be greater than ACCESS_TOKEN_EXPIRY".to_string(),
            ));
        }

        if self.cookie_max_age <= 0 {
            return Err(AppError::Config("COOKIE_MAX_AGE must be positive".to_string()));
        }

        Ok(())
    }
}
