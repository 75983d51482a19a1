//! Coinvault account backend
//!
//! User accounts for a crypto tracking frontend:
//! - Registration and login with Argon2id password hashing
//! - Access/refresh JWT pairs carried in cookies
//! - Single-use refresh token rotation
//! - Profile, avatar (Cloudinary) and coin wishlist updates
//! - Pass-through crypto news feed
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables, see [`Config`]:
//! - `DATABASE_URL` - PostgreSQL connection string (required)
//! - `ACCESS_TOKEN_SECRET` / `REFRESH_TOKEN_SECRET` - signing secrets (required, min 32 chars)
//! - `ACCESS_TOKEN_EXPIRY` / `REFRESH_TOKEN_EXPIRY` - lifetimes in seconds
//! - `CLOUDINARY_*` - image host credentials (required)
//! - `NEWS_API_KEY` - news API key (required)
//!
//! # Usage
//!
//! ```rust,ignore
//! use coinvault::{build_app, Config, PgUserStore, Services};
//!
//! let config = Config::from_env()?;
//! let store = Arc::new(PgUserStore::new(pool));
//! let services = Arc::new(Services::from_config(&config, store)?);
//! let app = build_app(services, &config)?;
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod media;
pub mod middleware;
pub mod models;
pub mod news;
pub mod password;
pub mod service;
pub mod session;
pub mod store;
pub mod tokens;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use extractors::{CurrentUser, ValidatedJson};
pub use models::*;
pub use service::AccountService;
pub use store::{MemoryUserStore, PgUserStore, UserStore};

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use media::{CloudinaryHost, ImageHost};
use news::{NewsApiClient, NewsFeed};
use password::Argon2Hasher;
use session::SessionCookies;
use std::sync::Arc;
use tokens::TokenIssuer;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

/// Aggregated services container
pub struct Services {
    pub accounts: AccountService,
    pub news: Arc<dyn NewsFeed>,
    pub cookies: SessionCookies,
}

/// Shared handler state
pub type SharedState = Arc<Services>;

impl Services {
    pub fn new(accounts: AccountService, news: Arc<dyn NewsFeed>, cookies: SessionCookies) -> Self {
        Self {
            accounts,
            news,
            cookies,
        }
    }

    /// Wire production services from configuration
    pub fn from_config(config: &Config, store: Arc<dyn UserStore>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("coinvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;

        let tokens = TokenIssuer::new(
            &config.access_token_secret,
            config.access_token_expiry,
            &config.refresh_token_secret,
            config.refresh_token_expiry,
        );

        let hasher = Argon2Hasher::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
        )?;

        let images: Arc<dyn ImageHost> = Arc::new(CloudinaryHost::new(
            http.clone(),
            &config.cloudinary_cloud_name,
            config.cloudinary_api_key.clone(),
            config.cloudinary_api_secret.clone(),
            config.cloudinary_folder.clone(),
        ));

        let news: Arc<dyn NewsFeed> = Arc::new(NewsApiClient::new(
            http,
            config.news_api_url.clone(),
            config.news_api_key.clone(),
        ));

        Ok(Self::new(
            AccountService::new(store, tokens, hasher, images),
            news,
            SessionCookies::new(config.cookie_max_age, config.cookie_secure),
        ))
    }
}

/// Routes plus CORS, request tracing, and panic recovery
pub fn build_app(services: SharedState, config: &Config) -> Result<Router, AppError> {
    let origin = HeaderValue::from_str(&config.cors_origin)
        .map_err(|_| AppError::Config("CORS_ORIGIN is not a valid origin".to_string()))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Ok(handlers::create_routes(services)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CatchPanicLayer::custom(error::handle_panic)))
}
