use axum::{
    Router,
    body::Body,
    extract::FromRequestParts,
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use pitchside_admin::{
    AppConfig, AppError, AppState, MemoryBackend,
    auth::{Claims, Session},
    create_router,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use tower::ServiceExt;

// --- Helpers ---

fn mint(role: &str, exp_offset_secs: i64, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: "user-42".to_string(),
        role: role.to_string(),
        exp: (now + exp_offset_secs) as usize,
        iat: now as usize,
        email: Some("someone@example.com".to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn admin_token() -> String {
    mint("admin", 3600, &AppConfig::default().jwt_secret)
}

fn app() -> Router {
    let backend = Arc::new(MemoryBackend::new());
    create_router(AppState::new(backend, AppConfig::default()))
}

async fn get(uri: &str, auth: Option<(&str, String)>) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some((name, value)) = auth {
        builder = builder.header(name, value);
    }
    app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
}

fn assert_login_redirect(response: &Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

// --- Access Guard ---

#[tokio::test]
async fn test_missing_token_redirects_to_login() {
    for path in ["/", "/dashboard", "/user-management", "/payments", "/panels/rating/p1"] {
        let response = get(path, None).await;
        assert_login_redirect(&response);
    }
}

#[tokio::test]
async fn test_non_admin_role_is_redirected() {
    let token = mint("user", 3600, &AppConfig::default().jwt_secret);
    let response = get(
        "/user-management",
        Some(("authorization", format!("Bearer {token}"))),
    )
    .await;
    assert_login_redirect(&response);
}

#[tokio::test]
async fn test_expired_and_forged_tokens_are_redirected() {
    let expired = mint("admin", -3600, &AppConfig::default().jwt_secret);
    let forged = mint("admin", 3600, "not-the-configured-secret");

    for token in [expired, forged, "garbage".to_string()] {
        let response = get("/dashboard", Some(("authorization", format!("Bearer {token}")))).await;
        assert_login_redirect(&response);
    }
}

#[tokio::test]
async fn test_admin_bearer_token_passes() {
    let response = get(
        "/user-management",
        Some(("authorization", format!("Bearer {}", admin_token()))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_session_cookie_passes() {
    let response = get(
        "/user-management",
        Some(("cookie", format!("session-token={}", admin_token()))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_public_prefixes_need_no_session() {
    let response = get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get("/login", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unknown_paths_outside_allow_list_redirect() {
    assert_login_redirect(&get("/loginx", None).await);
    assert_login_redirect(&get("/does-not-exist", None).await);

    // Allow-listed static prefixes fall through to a plain 404, not a redirect.
    let response = get("/_next/static/app.js", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Session Extractor ---

#[tokio::test]
async fn test_session_extractor_rejects_non_admin_outside_guard() {
    let state = AppState::new(Arc::new(MemoryBackend::new()), AppConfig::default());
    let token = mint("user", 3600, &state.config.jwt_secret);
    let (mut parts, _) = Request::builder()
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(())
        .unwrap()
        .into_parts();

    let result = Session::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_session_extractor_accepts_admin_and_exposes_claims() {
    let state = AppState::new(Arc::new(MemoryBackend::new()), AppConfig::default());
    let token = admin_token();
    let (mut parts, _) = Request::builder()
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(())
        .unwrap()
        .into_parts();

    let session = Session::from_request_parts(&mut parts, &state).await.unwrap();
    assert!(session.is_admin());
    assert_eq!(session.claims().sub, "user-42");
    assert_eq!(session.token(), token);
}

#[test]
fn test_bearer_header_wins_over_cookie() {
    let config = AppConfig::default();
    let user = mint("user", 3600, &config.jwt_secret);
    let (parts, _) = Request::builder()
        .header(header::AUTHORIZATION, format!("Bearer {}", admin_token()))
        .header(header::COOKIE, format!("session-token={user}"))
        .body(())
        .unwrap()
        .into_parts();

    let session = Session::from_headers(&parts.headers, &config).unwrap();
    assert!(session.is_admin());
}
