//! Account HTTP Handlers
//!
//! REST endpoints mounted under `/api/v1/users`.

use crate::error::AppError;
use crate::extractors::{CurrentUser, ValidatedJson};
use crate::media::{AvatarUpload, MAX_AVATAR_SIZE};
use crate::middleware;
use crate::models::*;
use crate::session;
use crate::SharedState;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::collections::HashMap;

pub const API_PREFIX: &str = "/api/v1/users";

/// Limit for JSON bodies
pub const JSON_BODY_LIMIT: usize = 16 * 1024;

/// Limit for multipart bodies: one avatar plus a few text fields
pub const MULTIPART_BODY_LIMIT: usize = MAX_AVATAR_SIZE + 64 * 1024;

const AVATAR_FIELD: &str = "avatar";

// ============================================
// Route Builder
// ============================================

/// Create account routes
pub fn create_routes(services: SharedState) -> Router {
    let public = Router::new()
        .route(
            "/register",
            post(register).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .route("/login", post(login))
        .route("/refreshToken", post(refresh_token))
        .route("/getnews", get(get_news));

    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/checklogin", post(check_login))
        .route("/currentuser", get(get_current_user))
        .route("/changePassword", post(change_password))
        .route("/updateAccountDetails", post(update_account_details))
        .route(
            "/updateAvatar",
            post(update_avatar).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .route("/deleteAvatar", post(delete_avatar))
        .route("/updateWishlist", post(update_wishlist))
        .route_layer(axum_middleware::from_fn_with_state(
            services.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest(API_PREFIX, public.merge(protected))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(services)
}

// ============================================
// Multipart
// ============================================

#[derive(Default)]
struct MultipartForm {
    fields: HashMap<String, String>,
    avatar: Option<AvatarUpload>,
}

impl MultipartForm {
    fn take(&mut self, name: &str) -> String {
        self.fields.remove(name).unwrap_or_default()
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == AVATAR_FIELD {
            let file_name = field.file_name().unwrap_or("avatar").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await?.to_vec();

            // Browsers send an empty part when no file was picked
            if !bytes.is_empty() {
                form.avatar = Some(AvatarUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

// ============================================
// Registration / Login / Logout
// ============================================

/// POST /register
///
/// Multipart: `email`, `userName`, `password`, optional `avatar` file
pub async fn register(
    State(services): State<SharedState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = read_multipart(multipart).await?;

    let register = RegisterForm {
        email: form.take("email"),
        user_name: form.take("userName"),
        password: form.take("password"),
    };

    let (account, pair) = services
        .accounts
        .register(register, form.avatar)
        .await?;

    let jar = services.cookies.set_session(jar, &pair);

    Ok((
        jar,
        ApiResponse::new(
            StatusCode::CREATED,
            UserResponse::from(account),
            "User registered successfully, you are logged in",
        ),
    ))
}

/// POST /login
pub async fn login(
    State(services): State<SharedState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (account, pair) = services.accounts.login(req).await?;
    let jar = services.cookies.set_session(jar, &pair);

    Ok((
        jar,
        ApiResponse::ok(UserResponse::from(account), "User logged in successfully"),
    ))
}

/// POST /logout
pub async fn logout(
    State(services): State<SharedState>,
    jar: CookieJar,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    services.accounts.logout(user.id).await?;

    Ok((
        services.cookies.clear(jar),
        ApiResponse::ok(serde_json::json!({}), "User logged out"),
    ))
}

/// POST /checklogin
///
/// Re-issue a session for an account that already holds a valid access token
pub async fn check_login(
    State(services): State<SharedState>,
    jar: CookieJar,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let pair = services.accounts.issue_session(user.id).await?;
    let jar = services.cookies.set_session(jar, &pair);

    Ok((
        jar,
        ApiResponse::ok(UserResponse::from(user), "User logged in successfully"),
    ))
}

// ============================================
// Token Refresh
// ============================================

/// POST /refreshToken
///
/// Reads the refresh token from the cookie, falling back to the JSON body
pub async fn refresh_token(
    State(services): State<SharedState>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let body_token = body.and_then(|Json(req)| req.refresh_token);
    let incoming = session::refresh_token_from(&jar, body_token.as_deref());

    let (account, pair) = services.accounts.refresh(incoming).await?;

    let jar = services.cookies.set_session(jar, &pair);
    let jar = services.cookies.set_wishlist(jar, &account.wishlist);

    Ok((jar, ApiResponse::ok(pair, "Access token refreshed")))
}

// ============================================
// Profile
// ============================================

/// GET /currentuser
pub async fn get_current_user(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    ApiResponse::ok(
        UserResponse::from(user),
        "Current user fetched successfully",
    )
}

/// POST /changePassword
pub async fn change_password(
    State(services): State<SharedState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    services.accounts.change_password(user.id, req).await?;

    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Password changed successfully",
    ))
}

/// POST /updateAccountDetails
pub async fn update_account_details(
    State(services): State<SharedState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<UpdateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = services
        .accounts
        .update_account_details(user.id, req)
        .await?;

    Ok(ApiResponse::ok(
        UserResponse::from(account),
        "Account updated successfully",
    ))
}

/// POST /updateAvatar
pub async fn update_avatar(
    State(services): State<SharedState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_multipart(multipart)
        .await?
        .avatar
        .ok_or_else(|| AppError::Validation("Avatar file is missing".to_string()))?;

    let account = services.accounts.update_avatar(user.id, upload).await?;

    Ok(ApiResponse::ok(
        UserResponse::from(account),
        "Avatar updated successfully",
    ))
}

/// POST /deleteAvatar
pub async fn delete_avatar(
    State(services): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let account = services.accounts.delete_avatar(user.id).await?;

    Ok(ApiResponse::ok(
        UserResponse::from(account),
        "Avatar removed successfully",
    ))
}

/// POST /updateWishlist
pub async fn update_wishlist(
    State(services): State<SharedState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<WishlistRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = services.accounts.update_wishlist(&user, req).await?;

    Ok(ApiResponse::ok(
        UserResponse::from(account),
        "Wishlist updated successfully",
    ))
}

// ============================================
// News
// ============================================

/// GET /getnews
///
/// Relays the upstream JSON untouched
pub async fn get_news(State(services): State<SharedState>) -> Response {
    match services.news.latest().await {
        Ok(news) => (StatusCode::OK, Json(news)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "News fetch failed");
            ApiResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::Value::Null,
                "unSuccessful",
            )
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests;
