//! Authentication Middleware
//!
//! Verifies the access token, loads the account, and stores it in request
//! extensions for [`crate::extractors::CurrentUser`]. Never refreshes.

use crate::error::AppError;
use crate::session;
use crate::SharedState;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

/// Require an authenticated account
pub async fn require_auth(
    State(services): State<SharedState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session::access_token_from(&jar, req.headers())
        .ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

    let claims = services.accounts.tokens().verify_access(&token)?;

    let account = services
        .accounts
        .store()
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid access token".to_string()))?;

    req.extensions_mut().insert(account);

    Ok(next.run(req).await)
}
