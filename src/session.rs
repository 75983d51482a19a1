//! Cookie transport for session tokens

use crate::models::TokenPair;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const WISHLIST_COOKIE: &str = "wishlist";

/// Builds and clears the session cookies
///
/// Cookie lifetime is fixed and does not follow the expiry claims inside
/// the tokens themselves.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    max_age: Duration,
    secure: bool,
}

impl SessionCookies {
    pub fn new(max_age_seconds: i64, secure: bool) -> Self {
        Self {
            max_age: Duration::seconds(max_age_seconds),
            secure,
        }
    }

    fn build(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::None)
            .expires(OffsetDateTime::now_utc() + self.max_age)
            .build()
    }

    /// Set both token cookies
    pub fn set_session(&self, jar: CookieJar, pair: &TokenPair) -> CookieJar {
        jar.add(self.build(ACCESS_COOKIE, pair.access_token.clone()))
            .add(self.build(REFRESH_COOKIE, pair.refresh_token.clone()))
    }

    /// Mirror the wishlist into a cookie for the frontend
    pub fn set_wishlist(&self, jar: CookieJar, wishlist: &[String]) -> CookieJar {
        jar.add(self.build(WISHLIST_COOKIE, wishlist.join(",")))
    }

    /// Remove every session cookie
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        [ACCESS_COOKIE, REFRESH_COOKIE, WISHLIST_COOKIE]
            .into_iter()
            .fold(jar, |jar, name| jar.remove(self.build(name, String::new())))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Access token from the `accessToken` cookie, else a bearer header
pub fn access_token_from(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    jar.get(ACCESS_COOKIE)
        .and_then(|c| non_empty(c.value()))
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .and_then(non_empty)
        })
}

/// Refresh token from the `refreshToken` cookie, else the request body
pub fn refresh_token_from(jar: &CookieJar, body: Option<&str>) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .and_then(|c| non_empty(c.value()))
        .or_else(|| body.and_then(non_empty))
}
