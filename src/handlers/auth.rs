use axum::{Json, extract::State};

use super::Envelope;
use crate::{
    AppState,
    auth::{AuthUser, issue_token, verify_password},
    error::{ApiError, ApiResult},
    models::{LoginRequest, LoginResponse, UserProfile},
};

/// login
///
/// [Public Route] Exchanges email and password for a bearer token.
///
/// Unknown emails and wrong passwords share the same 401 message so the endpoint cannot be
/// used to probe which accounts exist. Disabled accounts get 403.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Envelope> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .repo
        .get_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&payload.password, &user.password_hash) {
        tracing::warn!(user_id = %user.id, "failed login attempt");
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiError::Forbidden("Account is disabled".to_string()));
    }

    state.repo.record_login(user.id).await?;
    let (token, expires_at) = issue_token(user.id, &state.config.jwt_secret, state.config.jwt_ttl_hours)?;

    tracing::info!(user_id = %user.id, "user logged in");
    Envelope::new().with(
        "data",
        &LoginResponse {
            token,
            expires_at,
            user: UserProfile::from(user),
        },
    )
}

/// get_me
///
/// [Authenticated Route] Profile of the caller identified by the bearer token.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(auth_user: AuthUser, State(state): State<AppState>) -> ApiResult<Envelope> {
    let user = state
        .repo
        .get_user(auth_user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Envelope::new().with("user", &UserProfile::from(user))
}
