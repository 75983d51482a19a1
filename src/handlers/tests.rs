use super::*;
use crate::media::ImageHost;
use crate::news::NewsFeed;
use crate::password::Argon2Hasher;
use crate::session::SessionCookies;
use crate::store::{MemoryUserStore, UserStore};
use crate::tokens::TokenIssuer;
use crate::{AccountService, Services};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, request, Request};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ACCESS_SECRET: &str = "access-secret-for-tests-0123456789abcdef";
const REFRESH_SECRET: &str = "refresh-secret-for-tests-0123456789abcdef";
const BOUNDARY: &str = "coinvault-test-boundary";
const PASSWORD: &str = "correct horse battery";

struct StubImages;

#[async_trait]
impl ImageHost for StubImages {
    async fn upload(&self, image: AvatarUpload) -> Result<String, AppError> {
        Ok(format!("https://images.test/{}", image.file_name))
    }
}

struct StubNews {
    fail: bool,
}

#[async_trait]
impl NewsFeed for StubNews {
    async fn latest(&self) -> Result<Value, AppError> {
        if self.fail {
            return Err(AppError::Upstream("news api unreachable".to_string()));
        }
        Ok(json!({ "status": "ok", "totalResults": 1, "articles": [{ "title": "BTC" }] }))
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryUserStore>,
}

fn hasher() -> Argon2Hasher {
    Argon2Hasher::new(1024, 1, 1).unwrap()
}

fn tokens() -> TokenIssuer {
    TokenIssuer::new(ACCESS_SECRET, 3600, REFRESH_SECRET, 86_400)
}

fn test_app_with_news(news_fails: bool) -> TestApp {
    let store = Arc::new(MemoryUserStore::new());
    let accounts = AccountService::new(store.clone(), tokens(), hasher(), Arc::new(StubImages));
    let services = Services::new(
        accounts,
        Arc::new(StubNews { fail: news_fails }),
        SessionCookies::new(86_400, true),
    );

    TestApp {
        router: create_routes(Arc::new(services)),
        store,
    }
}

fn test_app() -> TestApp {
    test_app_with_news(false)
}

async fn seed(app: &TestApp, email: &str, username: &str) -> Account {
    app.store
        .insert(NewAccount {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hasher().hash(PASSWORD).unwrap(),
            avatar: None,
        })
        .await
        .unwrap()
}

struct TestResponse {
    status: StatusCode,
    cookies: Vec<String>,
    body: Value,
}

impl TestResponse {
    fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.cookies
            .iter()
            .find(|c| c.starts_with(&prefix))
            .map(|c| c[prefix.len()..].split(';').next().unwrap_or("").to_string())
    }

    fn cookie_header(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.cookies
            .iter()
            .find(|c| c.starts_with(&prefix))
            .map(String::as_str)
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> TestResponse {
    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        cookies,
        body,
    }
}

fn post(path: &str) -> request::Builder {
    Request::builder()
        .method("POST")
        .uri(format!("{API_PREFIX}{path}"))
}

fn get(path: &str) -> request::Builder {
    Request::builder()
        .method("GET")
        .uri(format!("{API_PREFIX}{path}"))
}

fn json_body(builder: request::Builder, body: Value) -> Request<Body> {
    builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bearer(builder: request::Builder, token: &str) -> request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {token}"))
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart(builder: request::Builder, body: Body) -> Request<Body> {
    builder
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

/// Log in and return (access token, refresh token)
async fn login_as(app: &TestApp, email: &str, password: &str) -> (String, String) {
    let res = send(
        app,
        json_body(post("/login"), json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
    (
        res.cookie("accessToken").unwrap(),
        res.cookie("refreshToken").unwrap(),
    )
}

async fn refresh_with_body(app: &TestApp, token: &str) -> TestResponse {
    send(
        app,
        json_body(post("/refreshToken"), json!({ "refreshToken": token })),
    )
    .await
}

// ============================================
// Login
// ============================================

#[tokio::test]
async fn test_login_sets_session_cookies() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;

    let res = send(
        &app,
        json_body(
            post("/login"),
            json!({ "email": "alice@example.com", "password": PASSWORD }),
        ),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["statusCode"], 200);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["data"]["userName"], "alice");
    assert!(res.body["data"].get("password").is_none());
    assert!(res.body["data"].get("refreshToken").is_none());

    let access = res.cookie_header("accessToken").unwrap();
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("Secure"));
    assert!(access.contains("SameSite=None"));
    assert!(access.contains("Path=/"));

    let refresh = res.cookie("refreshToken").unwrap();
    let stored = app
        .store
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.holds_refresh_token(&refresh));
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;

    let unknown = send(
        &app,
        json_body(
            post("/login"),
            json!({ "email": "nobody@example.com", "password": PASSWORD }),
        ),
    )
    .await;
    let wrong = send(
        &app,
        json_body(
            post("/login"),
            json!({ "email": "alice@example.com", "password": "nope" }),
        ),
    )
    .await;

    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(wrong.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body, wrong.body);
    assert_eq!(unknown.body["success"], false);
    assert!(unknown.cookies.is_empty());
}

#[tokio::test]
async fn test_login_requires_email() {
    let app = test_app();

    let res = send(
        &app,
        json_body(post("/login"), json!({ "password": PASSWORD })),
    )
    .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["statusCode"], 400);
    assert_eq!(res.body["data"], Value::Null);
    assert_eq!(res.body["errors"], json!([]));
}

// ============================================
// Refresh
// ============================================

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;
    let (_, first) = login_as(&app, "alice@example.com", PASSWORD).await;

    let res = refresh_with_body(&app, &first).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Access token refreshed");
    let second = res.body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert_eq!(res.cookie("refreshToken").unwrap(), second);
    assert!(res.body["data"]["accessToken"].is_string());

    let reused = refresh_with_body(&app, &first).await;
    assert_eq!(reused.status, StatusCode::UNAUTHORIZED);

    let again = refresh_with_body(&app, &second).await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_reads_cookie_and_sets_wishlist() {
    let app = test_app();
    let account = seed(&app, "alice@example.com", "alice").await;
    app.store
        .set_wishlist(account.id, &["bitcoin".to_string(), "solana".to_string()])
        .await
        .unwrap();
    let (_, refresh) = login_as(&app, "alice@example.com", PASSWORD).await;

    let res = send(
        &app,
        post("/refreshToken")
            .header(header::COOKIE, format!("refreshToken={refresh}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.cookie("accessToken").is_some());
    // The comma may come back percent-encoded
    let wishlist = res.cookie("wishlist").unwrap();
    assert!(wishlist == "bitcoin,solana" || wishlist == "bitcoin%2Csolana");
}

#[tokio::test]
async fn test_refresh_without_token() {
    let app = test_app();

    let res = send(&app, post("/refreshToken").body(Body::empty()).unwrap()).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Unauthorized request");
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;
    let (access, _) = login_as(&app, "alice@example.com", PASSWORD).await;

    let res = refresh_with_body(&app, &access).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

// ============================================
// Logout / Access Gate
// ============================================

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;
    let (access, refresh) = login_as(&app, "alice@example.com", PASSWORD).await;

    let res = send(
        &app,
        post("/logout")
            .header(
                header::COOKIE,
                format!("accessToken={access}; refreshToken={refresh}; wishlist=bitcoin"),
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"], json!({}));
    for name in ["accessToken", "refreshToken", "wishlist"] {
        assert_eq!(res.cookie(name).as_deref(), Some(""), "{name}");

        // Removal must carry the same cross-site attributes as the original
        let removal = res.cookie_header(name).unwrap();
        assert!(removal.contains("SameSite=None"), "{removal}");
        assert!(removal.contains("Secure"), "{removal}");
        assert!(removal.contains("Path=/"), "{removal}");
    }

    let stored = app
        .store
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.refresh_token.is_none());

    let refreshed = refresh_with_body(&app, &refresh).await;
    assert_eq!(refreshed.status, StatusCode::UNAUTHORIZED);

    // Access tokens are stateless and survive until they expire
    let current = send(
        &app,
        bearer(get("/currentuser"), &access).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(current.status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_access_token() {
    let app = test_app();
    let account = seed(&app, "alice@example.com", "alice").await;
    let (access, refresh) = login_as(&app, "alice@example.com", PASSWORD).await;

    let missing = send(&app, get("/currentuser").body(Body::empty()).unwrap()).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["success"], false);

    let foreign = TokenIssuer::new(
        "some-other-access-secret-0123456789abcdef",
        3600,
        "some-other-refresh-secret-0123456789abcdef",
        86_400,
    )
    .sign_access(&account)
    .unwrap();
    let forged = send(
        &app,
        bearer(get("/currentuser"), &foreign).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let wrong_kind = send(
        &app,
        bearer(get("/currentuser"), &refresh).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(wrong_kind.status, StatusCode::UNAUTHORIZED);

    let expired = TokenIssuer::new(ACCESS_SECRET, -3600, REFRESH_SECRET, 86_400)
        .sign_access(&account)
        .unwrap();
    let stale = send(
        &app,
        bearer(get("/currentuser"), &expired).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
    assert_eq!(stale.body["statusCode"], 401);
    assert_eq!(stale.body["success"], false);
    assert_eq!(stale.body["data"], Value::Null);

    let ok = send(
        &app,
        get("/currentuser")
            .header(header::COOKIE, format!("accessToken={access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["data"]["email"], "alice@example.com");
    assert_eq!(ok.body["message"], "Current user fetched successfully");
}

#[tokio::test]
async fn test_checklogin_rotates_refresh_token() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;
    let (access, first) = login_as(&app, "alice@example.com", PASSWORD).await;

    let res = send(
        &app,
        bearer(post("/checklogin"), &access).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let second = res.cookie("refreshToken").unwrap();
    assert_ne!(first, second);

    assert_eq!(
        refresh_with_body(&app, &first).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        refresh_with_body(&app, &second).await.status,
        StatusCode::OK
    );
}

// ============================================
// Registration
// ============================================

#[tokio::test]
async fn test_register_creates_account_and_session() {
    let app = test_app();

    let body = multipart_body(
        &[
            ("email", "bob@example.com"),
            ("userName", "Bob"),
            ("password", PASSWORD),
        ],
        Some(("me.png", "image/png", &b"\x89PNG fake image"[..])),
    );
    let res = send(&app, multipart(post("/register"), body)).await;

    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["statusCode"], 201);
    assert_eq!(res.body["data"]["userName"], "bob");
    assert_eq!(res.body["data"]["avatar"], "https://images.test/me.png");
    assert_eq!(res.body["data"]["wishlist"], json!([]));
    assert!(res.cookie("accessToken").is_some());
    assert!(res.cookie("refreshToken").is_some());
    assert_eq!(app.store.len().await, 1);

    // The new account can log in straight away
    login_as(&app, "bob@example.com", PASSWORD).await;
}

#[tokio::test]
async fn test_register_without_avatar() {
    let app = test_app();

    let body = multipart_body(
        &[
            ("email", "bob@example.com"),
            ("userName", "bob"),
            ("password", PASSWORD),
        ],
        None,
    );
    let res = send(&app, multipart(post("/register"), body)).await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["avatar"], Value::Null);
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;

    let same_email = multipart_body(
        &[
            ("email", "alice@example.com"),
            ("userName", "someoneelse"),
            ("password", PASSWORD),
        ],
        None,
    );
    let res = send(&app, multipart(post("/register"), same_email)).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    // Usernames are compared after lower-casing
    let same_name = multipart_body(
        &[
            ("email", "other@example.com"),
            ("userName", "ALICE"),
            ("password", PASSWORD),
        ],
        None,
    );
    let res = send(&app, multipart(post("/register"), same_name)).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(
        res.body["message"],
        "User with email or username already exists"
    );

    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn test_register_requires_all_fields() {
    let app = test_app();

    let body = multipart_body(
        &[("email", "bob@example.com"), ("userName", "bob"), ("password", "  ")],
        None,
    );
    let res = send(&app, multipart(post("/register"), body)).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "All fields are required");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_register_rejects_non_image_avatar() {
    let app = test_app();

    let body = multipart_body(
        &[
            ("email", "bob@example.com"),
            ("userName", "bob"),
            ("password", PASSWORD),
        ],
        Some(("cv.pdf", "application/pdf", &b"%PDF-1.4"[..])),
    );
    let res = send(&app, multipart(post("/register"), body)).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.store.is_empty().await);
}

// ============================================
// Profile
// ============================================

#[tokio::test]
async fn test_update_wishlist() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;
    let (access, _) = login_as(&app, "alice@example.com", PASSWORD).await;

    let update = |coin: &str, action: &str| {
        json_body(
            bearer(post("/updateWishlist"), &access),
            json!({ "coin": coin, "action": action }),
        )
    };

    let res = send(&app, update("bitcoin", "add")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["wishlist"], json!(["bitcoin"]));

    let res = send(&app, update("bitcoin", "add")).await;
    assert_eq!(res.body["data"]["wishlist"], json!(["bitcoin", "bitcoin"]));

    let res = send(&app, update("bitcoin", "remove")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "invalid action");

    let stored = app
        .store
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.wishlist, vec!["bitcoin", "bitcoin"]);

    let res = send(&app, update("bitcoin", "delete")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["wishlist"], json!([]));
}

#[tokio::test]
async fn test_change_password() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;
    let (access, _) = login_as(&app, "alice@example.com", PASSWORD).await;

    let wrong = send(
        &app,
        json_body(
            bearer(post("/changePassword"), &access),
            json!({ "oldPassword": "not it", "newPassword": "new-password" }),
        ),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.body["message"], "Invalid old password");

    let ok = send(
        &app,
        json_body(
            bearer(post("/changePassword"), &access),
            json!({ "oldPassword": PASSWORD, "newPassword": "new-password" }),
        ),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);

    let old = send(
        &app,
        json_body(
            post("/login"),
            json!({ "email": "alice@example.com", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(old.status, StatusCode::NOT_FOUND);

    login_as(&app, "alice@example.com", "new-password").await;
}

#[tokio::test]
async fn test_update_account_details() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;
    seed(&app, "carol@example.com", "carol").await;
    let (access, _) = login_as(&app, "alice@example.com", PASSWORD).await;

    let taken = send(
        &app,
        json_body(
            bearer(post("/updateAccountDetails"), &access),
            json!({ "email": "carol@example.com" }),
        ),
    )
    .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);

    let empty = send(
        &app,
        json_body(bearer(post("/updateAccountDetails"), &access), json!({})),
    )
    .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let ok = send(
        &app,
        json_body(
            bearer(post("/updateAccountDetails"), &access),
            json!({ "userName": "Alicia" }),
        ),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["data"]["userName"], "alicia");
    assert_eq!(ok.body["data"]["email"], "alice@example.com");
}

#[tokio::test]
async fn test_avatar_update_and_delete() {
    let app = test_app();
    seed(&app, "alice@example.com", "alice").await;
    let (access, _) = login_as(&app, "alice@example.com", PASSWORD).await;

    let missing = send(
        &app,
        multipart(
            bearer(post("/updateAvatar"), &access),
            multipart_body(&[("note", "no file")], None),
        ),
    )
    .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["message"], "Avatar file is missing");

    let updated = send(
        &app,
        multipart(
            bearer(post("/updateAvatar"), &access),
            multipart_body(&[], Some(("face.webp", "image/webp", &b"RIFF fake webp"[..]))),
        ),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["avatar"], "https://images.test/face.webp");

    let deleted = send(
        &app,
        bearer(post("/deleteAvatar"), &access)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["data"]["avatar"], Value::Null);
}

// ============================================
// News
// ============================================

#[tokio::test]
async fn test_news_passthrough() {
    let app = test_app();

    let res = send(&app, get("/getnews").body(Body::empty()).unwrap()).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
    assert_eq!(res.body["articles"][0]["title"], "BTC");
    assert!(res.body.get("success").is_none());
}

#[tokio::test]
async fn test_news_failure() {
    let app = test_app_with_news(true);

    let res = send(&app, get("/getnews").body(Body::empty()).unwrap()).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["statusCode"], 500);
    assert_eq!(res.body["message"], "unSuccessful");
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["data"], Value::Null);
}
