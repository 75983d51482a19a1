//! Crypto news pass-through

use crate::error::AppError;

use async_trait::async_trait;

/// Coins the news query covers
pub const NEWS_QUERY: &str = "cryptocurrencies OR bitcoin OR ethereum OR solana OR tether";

#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Latest articles, exactly as returned by the upstream API
    async fn latest(&self) -> Result<serde_json::Value, AppError>;
}

/// NewsAPI `everything` endpoint client
pub struct NewsApiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    fn query(&self) -> [(&'static str, &str); 5] {
        [
            ("q", NEWS_QUERY),
            ("language", "en"),
            ("excludeDomains", "readwrite.com"),
            ("sortBy", "publishedAt"),
            ("apiKey", self.api_key.as_str()),
        ]
    }
}

#[async_trait]
impl NewsFeed for NewsApiClient {
    async fn latest(&self) -> Result<serde_json::Value, AppError> {
        let response = self.client.get(&self.url).query(&self.query()).send().await?;

        let status = response.status();
        if !status.is_success() {
            // Upstream error bodies are JSON too and are relayed unchanged
            tracing::warn!(%status, "News API returned an error status");
        }

        Ok(response.json().await?)
    }
}
