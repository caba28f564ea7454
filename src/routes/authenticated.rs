use crate::{AppState, handlers::auth};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any signed-in account, admin or not. `create_router` wraps this router in the
/// `auth_middleware` layer so a missing or invalid token is rejected before the handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/auth/me
        // Profile of the current user.
        .route("/api/auth/me", get(auth::get_me))
}
