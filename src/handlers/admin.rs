use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use super::{Envelope, Pagination, public::export_response};
use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    cache::{TAG_CATEGORIES, TAG_DOMAINS, TAG_PAGES, TAG_TABLES, invalidate},
    error::{ApiError, ApiResult},
    models::{
        ContentBlock, CreateBlockRequest, CreateCategoryRequest, CreateDomainRequest,
        CreatePageRequest, CreateTableRequest, CreateUserRequest, DataTable, Domain,
        DomainCategory, DomainDetail, ListFilter, NewUser, Page, RichTextContent,
        SectionsOverview, TableDataRequest, UpdateBlockRequest, UpdateCategoryRequest,
        UpdateDomainRequest, UpdatePageRequest, UpdateSectionsRequest, UpdateTableRequest,
        UpdateUserRequest, UpsertRichTextRequest, UserChanges, UserProfile,
    },
    services::{
        pages::{self, targets_or_all, word_count},
        tables::{self, ExportFormat},
    },
};

// --- Query Structs ---

/// DomainListQuery
///
/// Filters for `GET /api/admin/domains`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DomainListQuery {
    /// Case-insensitive match on name or slug.
    pub search: Option<String>,
    /// Only domains of this category.
    pub category: Option<Uuid>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// PageListQuery
///
/// Filters for `GET /api/admin/pages`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PageListQuery {
    /// Only pages of this domain.
    pub domain: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// ExportQuery
///
/// Format selection for the admin export, which keeps the reserved country column.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExportQuery {
    pub format: Option<ExportFormat>,
    pub download: Option<bool>,
}

fn pagination(page: Option<i64>, page_size: Option<i64>) -> Pagination {
    Pagination { page, page_size }
}

// --- Categories ---

/// list_categories
///
/// [Admin Route] Every category, active or not, in header order.
#[utoipa::path(
    get,
    path = "/api/admin/categories",
    responses((status = 200, description = "Categories", body = [DomainCategory]))
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Envelope> {
    let categories = state.repo.list_categories(false).await?;
    Envelope::new().with("categories", &categories)
}

/// create_category
///
/// [Admin Route] Creates a header category. Duplicate slugs are rejected with 409.
#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = DomainCategory),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Slug already used")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Envelope)> {
    payload.validate()?;
    let category = state.repo.create_category(payload).await?;
    invalidate(state.cache.as_ref(), &[TAG_CATEGORIES]);

    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok((
        StatusCode::CREATED,
        Envelope::new()
            .message("Category created")
            .with("category", &category)?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/categories/{id}",
    responses((status = 200, description = "Category", body = DomainCategory), (status = 404, description = "Not Found"))
)]
pub async fn get_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let category = state
        .repo
        .get_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    Envelope::new().with("category", &category)
}

#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    request_body = UpdateCategoryRequest,
    responses((status = 200, description = "Updated", body = DomainCategory), (status = 404, description = "Not Found"))
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<Envelope> {
    payload.validate()?;
    let category = state
        .repo
        .update_category(id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    invalidate(state.cache.as_ref(), &[TAG_CATEGORIES]);
    Envelope::new().message("Category updated").with("category", &category)
}

/// delete_category
///
/// [Admin Route] Deletes an empty category. A category still holding domains is a 409.
#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Category still has domains")
    )
)]
pub async fn delete_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let in_use = state.repo.count_category_domains(id).await?;
    if in_use > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete category with {} domain(s); move or delete them first",
            in_use
        )));
    }
    if !state.repo.delete_category(id).await? {
        return Err(ApiError::not_found("Category"));
    }
    invalidate(state.cache.as_ref(), &[TAG_CATEGORIES]);
    Ok(Envelope::new().message("Category deleted"))
}

// --- Domains ---

/// list_admin_domains
///
/// [Admin Route] Every domain (published or not), searchable and paginated.
#[utoipa::path(
    get,
    path = "/api/admin/domains",
    params(DomainListQuery),
    responses((status = 200, description = "Domains page", body = [Domain]))
)]
pub async fn list_admin_domains(
    State(state): State<AppState>,
    Query(query): Query<DomainListQuery>,
) -> ApiResult<Envelope> {
    let paging = pagination(query.page, query.page_size);
    let (limit, offset) = paging.limit_offset();
    let filter = ListFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        category_id: query.category,
        limit,
        offset,
        ..Default::default()
    };

    let (domains, total) = state.repo.list_domains(&filter).await?;
    Envelope::new()
        .with("domains", &domains)?
        .with("pagination", &paging.info(total))
}

async fn check_category(state: &AppState, category_id: Option<Uuid>) -> ApiResult<()> {
    if let Some(id) = category_id {
        state
            .repo
            .get_category(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Category"))?;
    }
    Ok(())
}

/// create_domain
///
/// [Admin Route] Creates a domain. Target countries are normalized (empty means `ALL`).
/// The `__main__` page of a direct domain is created lazily on first visit.
#[utoipa::path(
    post,
    path = "/api/admin/domains",
    request_body = CreateDomainRequest,
    responses(
        (status = 201, description = "Created", body = Domain),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Slug already used")
    )
)]
pub async fn create_domain(
    State(state): State<AppState>,
    Json(mut payload): Json<CreateDomainRequest>,
) -> ApiResult<(StatusCode, Envelope)> {
    payload.validate()?;
    check_category(&state, payload.category_id).await?;
    payload.target_countries = Some(targets_or_all(payload.target_countries)?);

    let domain = state.repo.create_domain(payload).await?;
    invalidate(state.cache.as_ref(), &[TAG_DOMAINS]);

    tracing::info!(domain_id = %domain.id, slug = %domain.slug, page_type = %domain.page_type, "domain created");
    Ok((
        StatusCode::CREATED,
        Envelope::new().message("Domain created").with("domain", &domain)?,
    ))
}

/// get_admin_domain
///
/// [Admin Route] Domain with its category and page count (`__main__` excluded).
#[utoipa::path(
    get,
    path = "/api/admin/domains/{id}",
    responses((status = 200, description = "Domain", body = DomainDetail), (status = 404, description = "Not Found"))
)]
pub async fn get_admin_domain(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let domain = state
        .repo
        .get_domain(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Domain"))?;

    let category = match domain.category_id {
        Some(category_id) => state.repo.get_category(category_id).await?,
        None => None,
    };
    let page_count = state.repo.count_domain_pages(domain.id).await?;

    Envelope::new().with(
        "domain",
        &DomainDetail {
            domain,
            category,
            page_count,
        },
    )
}

#[utoipa::path(
    put,
    path = "/api/admin/domains/{id}",
    request_body = UpdateDomainRequest,
    responses(
        (status = 200, description = "Updated", body = Domain),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Slug already used")
    )
)]
pub async fn update_domain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateDomainRequest>,
) -> ApiResult<Envelope> {
    payload.validate()?;
    if payload.clear_category.unwrap_or(false) && payload.category_id.is_some() {
        return Err(ApiError::Validation(
            "categoryId and clearCategory cannot be combined".to_string(),
        ));
    }
    check_category(&state, payload.category_id).await?;
    if let Some(raw) = payload.target_countries.take() {
        payload.target_countries = Some(targets_or_all(Some(raw))?);
    }

    let domain = state
        .repo
        .update_domain(id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Domain"))?;
    invalidate(state.cache.as_ref(), &[TAG_DOMAINS, TAG_PAGES]);
    Envelope::new().message("Domain updated").with("domain", &domain)
}

/// delete_domain
///
/// [Admin Route] Deletes a domain together with all of its pages and their content.
#[utoipa::path(
    delete,
    path = "/api/admin/domains/{id}",
    responses((status = 200, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_domain(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    if !state.repo.delete_domain(id).await? {
        return Err(ApiError::not_found("Domain"));
    }
    invalidate(state.cache.as_ref(), &[TAG_DOMAINS, TAG_PAGES, TAG_TABLES]);
    tracing::info!(domain_id = %id, "domain deleted");
    Ok(Envelope::new().message("Domain deleted"))
}

// --- Pages ---

#[utoipa::path(
    get,
    path = "/api/admin/pages",
    params(PageListQuery),
    responses((status = 200, description = "Pages", body = [Page]))
)]
pub async fn list_admin_pages(
    State(state): State<AppState>,
    Query(query): Query<PageListQuery>,
) -> ApiResult<Envelope> {
    let paging = pagination(query.page, query.page_size);
    let (limit, offset) = paging.limit_offset();
    let filter = ListFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        domain_id: query.domain,
        parent_id: query.parent_id,
        limit,
        offset,
        ..Default::default()
    };

    let (pages, total) = state.repo.list_pages(&filter).await?;
    Envelope::new()
        .with("pages", &pages)?
        .with("pagination", &paging.info(total))
}

/// create_page
///
/// [Admin Route] Creates a page. Without a `parentId` the page becomes top level; in a direct
/// domain that means a child of `__main__`.
#[utoipa::path(
    post,
    path = "/api/admin/pages",
    request_body = CreatePageRequest,
    responses(
        (status = 201, description = "Created", body = Page),
        (status = 404, description = "Domain or parent not found"),
        (status = 409, description = "Slug already used under this parent")
    )
)]
pub async fn create_page(
    State(state): State<AppState>,
    Json(payload): Json<CreatePageRequest>,
) -> ApiResult<(StatusCode, Envelope)> {
    let page = pages::create_page(state.repo.as_ref(), payload).await?;
    invalidate(state.cache.as_ref(), &[TAG_PAGES]);
    Ok((
        StatusCode::CREATED,
        Envelope::new().message("Page created").with("page", &page)?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/pages/{id}",
    responses((status = 200, description = "Page", body = Page), (status = 404, description = "Not Found"))
)]
pub async fn get_admin_page(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let page = state
        .repo
        .get_page(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;
    let children = state.repo.list_children(id, None).await?;
    Envelope::new().with("page", &page)?.with("children", &children)
}

/// update_page
///
/// [Admin Route] Partial update. `parentId` / `moveToRoot` move the page; moves that would put
/// a page under itself or its descendants are rejected (400 circular reference).
#[utoipa::path(
    put,
    path = "/api/admin/pages/{id}",
    request_body = UpdatePageRequest,
    responses(
        (status = 200, description = "Updated", body = Page),
        (status = 400, description = "Invalid move or payload"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Slug already used under the target parent")
    )
)]
pub async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePageRequest>,
) -> ApiResult<Envelope> {
    let page = pages::update_page(state.repo.as_ref(), id, payload).await?;
    invalidate(state.cache.as_ref(), &[TAG_PAGES]);
    Envelope::new().message("Page updated").with("page", &page)
}

/// delete_page
///
/// [Admin Route] Deletes the page and every descendant with their content, atomically.
/// The domain's `__main__` page cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/admin/pages/{id}",
    responses(
        (status = 200, description = "Deleted; body carries deletedCount"),
        (status = 400, description = "Attempt to delete __main__"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_page(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let deleted = pages::delete_page_cascade(state.repo.as_ref(), id).await?;
    invalidate(state.cache.as_ref(), &[TAG_PAGES, TAG_TABLES]);
    Envelope::new()
        .message(format!("Deleted {} page(s)", deleted))
        .with("deletedCount", &deleted)
}

// --- Sections ---

/// get_sections
///
/// [Admin Route] Section layout of a page, its children, and the children no section lists.
#[utoipa::path(
    get,
    path = "/api/admin/pages/{id}/sections",
    responses((status = 200, description = "Sections overview", body = SectionsOverview), (status = 404, description = "Not Found"))
)]
pub async fn get_sections(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let overview = pages::sections_overview(state.repo.as_ref(), id).await?;
    Envelope::new()
        .with("sections", &overview.sections)?
        .with("children", &overview.children)?
        .with("unorganizedPages", &overview.unorganized_pages)
}

/// update_sections
///
/// [Admin Route] Replaces the section layout. The whole list is validated first; any page id
/// that is not a child of this page rejects the request and nothing is stored.
#[utoipa::path(
    put,
    path = "/api/admin/pages/{id}/sections",
    request_body = UpdateSectionsRequest,
    responses(
        (status = 200, description = "Sections saved", body = Page),
        (status = 400, description = "Invalid sections"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_sections(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSectionsRequest>,
) -> ApiResult<Envelope> {
    let page = pages::update_sections(state.repo.as_ref(), id, payload.sections).await?;
    invalidate(state.cache.as_ref(), &[TAG_PAGES]);
    Envelope::new()
        .message("Sections updated")
        .with("sections", &page.sections)
}

// --- Content Blocks ---

#[utoipa::path(
    get,
    path = "/api/admin/pages/{id}/blocks",
    responses((status = 200, description = "Blocks in order", body = [ContentBlock]))
)]
pub async fn list_blocks(State(state): State<AppState>, Path(page_id): Path<Uuid>) -> ApiResult<Envelope> {
    let blocks = state.repo.list_blocks(page_id).await?;
    Envelope::new().with("blocks", &blocks)
}

#[utoipa::path(
    post,
    path = "/api/admin/pages/{id}/blocks",
    request_body = CreateBlockRequest,
    responses((status = 201, description = "Created", body = ContentBlock), (status = 404, description = "Page not found"))
)]
pub async fn create_block(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
    Json(payload): Json<CreateBlockRequest>,
) -> ApiResult<(StatusCode, Envelope)> {
    payload.validate()?;
    state
        .repo
        .get_page(page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;
    let block = state.repo.create_block(page_id, payload).await?;
    invalidate(state.cache.as_ref(), &[TAG_PAGES]);
    Ok((
        StatusCode::CREATED,
        Envelope::new().message("Block created").with("block", &block)?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/blocks/{id}",
    responses((status = 200, description = "Block", body = ContentBlock), (status = 404, description = "Not Found"))
)]
pub async fn get_block(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let block = state
        .repo
        .get_block(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Block"))?;
    Envelope::new().with("block", &block)
}

#[utoipa::path(
    put,
    path = "/api/admin/blocks/{id}",
    request_body = UpdateBlockRequest,
    responses((status = 200, description = "Updated", body = ContentBlock), (status = 404, description = "Not Found"))
)]
pub async fn update_block(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBlockRequest>,
) -> ApiResult<Envelope> {
    payload.validate()?;
    let block = state
        .repo
        .update_block(id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Block"))?;
    invalidate(state.cache.as_ref(), &[TAG_PAGES]);
    Envelope::new().message("Block updated").with("block", &block)
}

#[utoipa::path(
    delete,
    path = "/api/admin/blocks/{id}",
    responses((status = 200, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_block(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    if !state.repo.delete_block(id).await? {
        return Err(ApiError::not_found("Block"));
    }
    invalidate(state.cache.as_ref(), &[TAG_PAGES]);
    Ok(Envelope::new().message("Block deleted"))
}

// --- Rich Text ---

#[utoipa::path(
    get,
    path = "/api/admin/pages/{id}/rich-text",
    responses((status = 200, description = "Rich text document", body = RichTextContent), (status = 404, description = "Not Found"))
)]
pub async fn get_rich_text(State(state): State<AppState>, Path(page_id): Path<Uuid>) -> ApiResult<Envelope> {
    let content = state
        .repo
        .get_rich_text(page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Rich text content"))?;
    Envelope::new().with("content", &content)
}

/// upsert_rich_text
///
/// [Admin Route] Creates or replaces the page's HTML document, recomputes the word count and
/// switches the page to the `rich_text` content type.
#[utoipa::path(
    put,
    path = "/api/admin/pages/{id}/rich-text",
    request_body = UpsertRichTextRequest,
    responses((status = 200, description = "Saved", body = RichTextContent), (status = 404, description = "Page not found"))
)]
pub async fn upsert_rich_text(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
    Json(payload): Json<UpsertRichTextRequest>,
) -> ApiResult<Envelope> {
    state
        .repo
        .get_page(page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;

    let words = word_count(&payload.html);
    let content = state
        .repo
        .upsert_rich_text(page_id, payload.title, payload.html, words)
        .await?;
    invalidate(state.cache.as_ref(), &[TAG_PAGES]);
    Envelope::new().message("Content saved").with("content", &content)
}

#[utoipa::path(
    delete,
    path = "/api/admin/pages/{id}/rich-text",
    responses((status = 200, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_rich_text(State(state): State<AppState>, Path(page_id): Path<Uuid>) -> ApiResult<Envelope> {
    if !state.repo.delete_rich_text(page_id).await? {
        return Err(ApiError::not_found("Rich text content"));
    }
    invalidate(state.cache.as_ref(), &[TAG_PAGES]);
    Ok(Envelope::new().message("Content deleted"))
}

// --- Tables ---

/// create_table
///
/// [Admin Route] Attaches a table to a page and flips the page to the `table` content type in
/// the same transaction. A page holds at most one table (409).
#[utoipa::path(
    post,
    path = "/api/admin/tables",
    request_body = CreateTableRequest,
    responses(
        (status = 201, description = "Created", body = DataTable),
        (status = 400, description = "Empty schema"),
        (status = 404, description = "Page not found"),
        (status = 409, description = "Page already has a table")
    )
)]
pub async fn create_table(
    State(state): State<AppState>,
    Json(payload): Json<CreateTableRequest>,
) -> ApiResult<(StatusCode, Envelope)> {
    let table = tables::create_table(state.repo.as_ref(), payload).await?;
    invalidate(state.cache.as_ref(), &[TAG_TABLES, TAG_PAGES]);
    Ok((
        StatusCode::CREATED,
        Envelope::new().message("Table created").with("table", &table)?,
    ))
}

/// get_admin_table
///
/// [Admin Route] Full table including the reserved `targetCountries` column and every row.
#[utoipa::path(
    get,
    path = "/api/admin/tables/{id}",
    responses((status = 200, description = "Table", body = DataTable), (status = 404, description = "Not Found"))
)]
pub async fn get_admin_table(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let table = state
        .repo
        .get_table(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))?;
    Envelope::new().with("table", &table)
}

#[utoipa::path(
    get,
    path = "/api/admin/tables/by-page/{pageId}",
    params(("pageId" = Uuid, Path, description = "Page owning the table")),
    responses((status = 200, description = "Table", body = DataTable), (status = 404, description = "Not Found"))
)]
pub async fn get_admin_table_by_page(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
) -> ApiResult<Envelope> {
    let table = state
        .repo
        .get_table_by_page(page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))?;
    Envelope::new().with("table", &table)
}

/// update_table
///
/// [Admin Route] Updates name, description, settings or schema. A new schema must keep at
/// least one user column; the reserved column is re-added and backfilled on every row.
#[utoipa::path(
    put,
    path = "/api/admin/tables/{id}",
    request_body = UpdateTableRequest,
    responses((status = 200, description = "Updated", body = DataTable), (status = 400, description = "Empty schema"), (status = 404, description = "Not Found"))
)]
pub async fn update_table(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTableRequest>,
) -> ApiResult<Envelope> {
    let table = tables::update_table(state.repo.as_ref(), id, payload).await?;
    invalidate(state.cache.as_ref(), &[TAG_TABLES]);
    Envelope::new().message("Table updated").with("table", &table)
}

#[utoipa::path(
    delete,
    path = "/api/admin/tables/{id}",
    responses((status = 200, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_table(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    if !state.repo.delete_table(id).await? {
        return Err(ApiError::not_found("Table"));
    }
    invalidate(state.cache.as_ref(), &[TAG_TABLES]);
    Ok(Envelope::new().message("Table deleted"))
}

/// put_table_data
///
/// [Admin Route] Replaces or appends rows. Every row receives an `id` and a `targetCountries`
/// value; `metadata.rowCount` always equals the stored row count afterwards.
#[utoipa::path(
    put,
    path = "/api/admin/tables/{id}/data",
    request_body = TableDataRequest,
    responses((status = 200, description = "Rows written", body = DataTable), (status = 404, description = "Not Found"))
)]
pub async fn put_table_data(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TableDataRequest>,
) -> ApiResult<Envelope> {
    let table = tables::write_rows(state.repo.as_ref(), id, payload).await?;
    invalidate(state.cache.as_ref(), &[TAG_TABLES]);
    Envelope::new()
        .message(format!("Table now has {} row(s)", table.metadata.row_count))
        .with("table", &table)
}

#[utoipa::path(
    delete,
    path = "/api/admin/tables/{id}/data",
    responses((status = 200, description = "Rows cleared", body = DataTable), (status = 404, description = "Not Found"))
)]
pub async fn clear_table_data(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let table = tables::clear_rows(state.repo.as_ref(), id).await?;
    invalidate(state.cache.as_ref(), &[TAG_TABLES]);
    Envelope::new().message("Table data cleared").with("table", &table)
}

/// export_table
///
/// [Admin Route] CSV or JSON export of every row, reserved column included.
#[utoipa::path(
    get,
    path = "/api/admin/tables/{id}/export",
    params(ExportQuery),
    responses((status = 200, description = "Export file"), (status = 404, description = "Not Found"))
)]
pub async fn export_table(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let table = state
        .repo
        .get_table(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))?;
    export_response(
        &table,
        &table.schema,
        &table.data,
        query.format.unwrap_or_default(),
        query.download.unwrap_or(false),
    )
}

// --- Users ---

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses((status = 200, description = "Users", body = [UserProfile]))
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Envelope> {
    let users: Vec<UserProfile> = state
        .repo
        .list_users()
        .await?
        .into_iter()
        .map(UserProfile::from)
        .collect();
    Envelope::new().with("users", &users)
}

/// create_user
///
/// [Admin Route] Creates an account; the password is stored as an argon2 hash.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses((status = 201, description = "Created", body = UserProfile), (status = 409, description = "Email already used"))
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Envelope)> {
    payload.validate()?;
    let user = state
        .repo
        .create_user(NewUser {
            email: payload.email.trim().to_lowercase(),
            name: payload.name,
            password_hash: hash_password(&payload.password)?,
            is_admin: payload.is_admin.unwrap_or(false),
            is_active: payload.is_active.unwrap_or(true),
        })
        .await?;

    tracing::info!(user_id = %user.id, is_admin = user.is_admin, "user created");
    Ok((
        StatusCode::CREATED,
        Envelope::new()
            .message("User created")
            .with("user", &UserProfile::from(user))?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    responses((status = 200, description = "User", body = UserProfile), (status = 404, description = "Not Found"))
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Envelope> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Envelope::new().with("user", &UserProfile::from(user))
}

/// update_user
///
/// [Admin Route] Updates name, password, admin flag or active flag. Admins cannot remove their
/// own admin rights or deactivate themselves.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated", body = UserProfile), (status = 404, description = "Not Found"))
)]
pub async fn update_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Envelope> {
    payload.validate()?;
    if actor.id == id && (payload.is_admin == Some(false) || payload.is_active == Some(false)) {
        return Err(ApiError::Validation(
            "You cannot revoke your own admin access".to_string(),
        ));
    }

    let password_hash = match payload.password.as_deref() {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };
    let user = state
        .repo
        .update_user(
            id,
            UserChanges {
                name: payload.name,
                password_hash,
                is_admin: payload.is_admin,
                is_active: payload.is_active,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Envelope::new()
        .message("User updated")
        .with("user", &UserProfile::from(user))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    responses((status = 200, description = "Deleted"), (status = 400, description = "Self deletion"), (status = 404, description = "Not Found"))
)]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Envelope> {
    if actor.id == id {
        return Err(ApiError::Validation("You cannot delete your own account".to_string()));
    }
    if !state.repo.delete_user(id).await? {
        return Err(ApiError::not_found("User"));
    }
    tracing::info!(user_id = %id, by = %actor.id, "user deleted");
    Ok(Envelope::new().message("User deleted"))
}
