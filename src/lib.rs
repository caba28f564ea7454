use axum::{
    extract::{FromRef, Request},
    http::HeaderName,
    Router,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod cache;
pub mod config;
pub mod country;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod services;

// Routing is split by audience (public, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use cache::{CacheState, MokaQueryCache, NoopCache};
pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json` with a Swagger UI at
/// `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::public::get_page_context, handlers::public::get_public_table,
        handlers::public::list_domains, handlers::public::get_domain,
        handlers::public::get_domain_page,
        handlers::auth::login, handlers::auth::get_me,
        handlers::admin::list_categories, handlers::admin::create_category,
        handlers::admin::get_category, handlers::admin::update_category,
        handlers::admin::delete_category,
        handlers::admin::list_admin_domains, handlers::admin::create_domain,
        handlers::admin::get_admin_domain, handlers::admin::update_domain,
        handlers::admin::delete_domain,
        handlers::admin::list_admin_pages, handlers::admin::create_page,
        handlers::admin::get_admin_page, handlers::admin::update_page,
        handlers::admin::delete_page,
        handlers::admin::get_sections, handlers::admin::update_sections,
        handlers::admin::list_blocks, handlers::admin::create_block,
        handlers::admin::get_block, handlers::admin::update_block,
        handlers::admin::delete_block,
        handlers::admin::get_rich_text, handlers::admin::upsert_rich_text,
        handlers::admin::delete_rich_text,
        handlers::admin::create_table, handlers::admin::get_admin_table,
        handlers::admin::get_admin_table_by_page, handlers::admin::update_table,
        handlers::admin::delete_table, handlers::admin::put_table_data,
        handlers::admin::clear_table_data, handlers::admin::export_table,
        handlers::admin::list_users, handlers::admin::create_user,
        handlers::admin::get_user, handlers::admin::update_user,
        handlers::admin::delete_user
    ),
    components(
        schemas(
            models::PageType, models::ContentType, models::ColumnType, models::Section,
            models::DomainCategory, models::Domain, models::Page, models::ContentBlock,
            models::TableColumn, models::TableMetadata, models::TableSettings, models::DataTable,
            models::RichTextContent, models::UserProfile,
            models::CreateCategoryRequest, models::UpdateCategoryRequest,
            models::CreateDomainRequest, models::UpdateDomainRequest,
            models::CreatePageRequest, models::UpdatePageRequest,
            models::SectionInput, models::UpdateSectionsRequest,
            models::CreateBlockRequest, models::UpdateBlockRequest,
            models::CreateTableRequest, models::UpdateTableRequest, models::DataMode,
            models::TableDataRequest, models::UpsertRichTextRequest,
            models::CreateUserRequest, models::UpdateUserRequest,
            models::LoginRequest, models::LoginResponse,
            models::NavigationContext, models::PageDetail, models::DomainLanding,
            models::SectionsOverview, models::DomainDetail, models::PaginationInfo,
            models::PublicTableView, services::tables::ExportFormat,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "geo-cms", description = "Country-aware content management API")
    )
)]
struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by authenticated paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// Shared, cheaply clonable container of the repository, the query cache and the loaded
/// configuration. Handlers pull the pieces they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    /// Cross-request query cache; `NoopCache` disables it.
    pub cache: CacheState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for CacheState {
    fn from_ref(app_state: &AppState) -> CacheState {
        app_state.cache.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards `authenticated_routes`. Extracting `AuthUser` runs token validation and the user
/// lookup; a failure rejects the request before the handler executes.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Guards the `/api/admin` tree: 401 without valid credentials, 403 for non-admin accounts.
async fn admin_middleware(auth_user: AuthUser, request: Request, next: Next) -> Response {
    match auth_user.require_admin() {
        Ok(()) => next.run(request).await,
        Err(rejection) => rejection.into_response(),
    }
}

/// create_router
///
/// Assembles every route group, applies the access-control layers and the shared
/// observability stack, and binds the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/api/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span with method, URI and the `x-request-id` so every log line of a
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
