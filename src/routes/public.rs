use crate::{AppState, handlers::{auth, public}};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints served to anonymous visitors. Every read is filtered by the `user-country`
/// cookie and only published domains and pages are ever returned.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /api/page-context?path=/domains/{slug}/...
        // Header, sidebar, page sidebar and breadcrumbs for one layout URL.
        .route("/api/page-context", get(public::get_page_context))
        // GET /api/domains
        .route("/api/domains", get(public::list_domains))
        // GET /api/domains/{slug}
        // Landing page: the `__main__` page of a direct domain or the root pages of a
        // hierarchical one.
        .route("/api/domains/{slug}", get(public::get_domain))
        // GET /api/domains/{slug}/pages/{*path}
        // Resolves a slug path down the page tree.
        .route("/api/domains/{slug}/pages/{*path}", get(public::get_domain_page))
        // GET /api/domain/tables/by-page/{pageId}?format=&download=&page=&pageSize=
        .route("/api/domain/tables/by-page/{page_id}", get(public::get_public_table))
        // POST /api/auth/login
        .route("/api/auth/login", post(auth::login))
}
