use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use geo_cms::{
    AppState, InMemoryRepository, NoopCache,
    auth::{AuthUser, Claims, hash_password},
    config::{AppConfig, Env},
    error::ApiError,
    models::{NewUser, User},
    repository::Repository,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "auth-integration-secret";

// --- Test Utilities ---

fn create_token(user_id: Uuid, expires_in_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let claims = Claims {
        sub: user_id,
        exp: (now + expires_in_secs) as usize,
        iat: now as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn seed_user(repo: &InMemoryRepository, email: &str, is_admin: bool, is_active: bool) -> User {
    repo.create_user(NewUser {
        email: email.to_string(),
        name: None,
        password_hash: hash_password("password123").unwrap(),
        is_admin,
        is_active,
    })
    .await
    .unwrap()
}

fn create_app_state(env: Env, repo: Arc<InMemoryRepository>) -> AppState {
    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    AppState {
        repo,
        cache: Arc::new(NoopCache),
        config,
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "editor@example.com", true, true).await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(user.id, 3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.email, "editor@example.com");
    assert!(auth_user.is_admin);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "late@example.com", false, true).await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(user.id, -3600));

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(msg)) if msg == "Token expired"));
}

#[tokio::test]
async fn test_auth_failure_for_unknown_user() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(Uuid::new_v4(), 3600));

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_inactive_account_is_forbidden() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "gone@example.com", true, false).await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(user.id, 3600));

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(result, Err(ApiError::Forbidden(_))));
}

#[tokio::test]
async fn test_local_bypass_success() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "local@dev.com", false, true).await;
    let app_state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        "x-user-id",
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(auth_user.id, user.id);
    assert!(!auth_user.is_admin);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "local@dev.com", true, true).await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        "x-user-id",
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}
