use crate::{AppState, handlers::admin};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Content management for categories, domains, pages (with sections, blocks, rich text and
/// tables) and user accounts. Nested under `/api/admin` and guarded by `admin_middleware`,
/// which resolves the `AuthUser` and rejects non-admins with 403.
///
/// Every write invalidates the affected cache tags so public reads see the change at once.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Categories ---
        .route(
            "/categories",
            get(admin::list_categories).post(admin::create_category),
        )
        .route(
            "/categories/{id}",
            get(admin::get_category)
                .put(admin::update_category)
                .delete(admin::delete_category),
        )
        // --- Domains ---
        // GET /domains?search=&category=&page=&pageSize=
        .route(
            "/domains",
            get(admin::list_admin_domains).post(admin::create_domain),
        )
        .route(
            "/domains/{id}",
            get(admin::get_admin_domain)
                .put(admin::update_domain)
                .delete(admin::delete_domain),
        )
        // --- Pages ---
        // GET /pages?domain=&parentId=&search=&page=&pageSize=
        .route("/pages", get(admin::list_admin_pages).post(admin::create_page))
        // DELETE cascades through every descendant and reports `deletedCount`.
        .route(
            "/pages/{id}",
            get(admin::get_admin_page)
                .put(admin::update_page)
                .delete(admin::delete_page),
        )
        .route(
            "/pages/{id}/sections",
            get(admin::get_sections).put(admin::update_sections),
        )
        .route(
            "/pages/{id}/blocks",
            get(admin::list_blocks).post(admin::create_block),
        )
        .route(
            "/blocks/{id}",
            get(admin::get_block)
                .put(admin::update_block)
                .delete(admin::delete_block),
        )
        .route(
            "/pages/{id}/rich-text",
            get(admin::get_rich_text)
                .put(admin::upsert_rich_text)
                .delete(admin::delete_rich_text),
        )
        // --- Tables ---
        .route("/tables", post(admin::create_table))
        .route("/tables/by-page/{page_id}", get(admin::get_admin_table_by_page))
        .route(
            "/tables/{id}",
            get(admin::get_admin_table)
                .put(admin::update_table)
                .delete(admin::delete_table),
        )
        .route(
            "/tables/{id}/data",
            put(admin::put_table_data).delete(admin::clear_table_data),
        )
        // GET /tables/{id}/export?format=csv|json&download=true
        .route("/tables/{id}/export", get(admin::export_table))
        // --- Users ---
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            get(admin::get_user)
                .put(admin::update_user)
                .delete(admin::delete_user),
        )
}
