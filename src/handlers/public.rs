use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::collections::HashSet;
use utoipa::IntoParams;
use uuid::Uuid;

use super::Envelope;
use crate::{
    AppState,
    cache::{RequestMemo, TAG_DOMAINS, TAG_PAGES, TAG_TABLES},
    country::is_visible,
    error::{ApiError, ApiResult},
    geo::UserCountry,
    models::{DataTable, Domain, DomainLanding, NavigationContext, Page, PageType, PublicTableView},
    services::{
        navigation::build_page_context,
        pages::{ensure_main_page, page_detail, resolve_page_path},
        tables::{ExportFormat, export_csv, export_json, public_view},
    },
};

// --- Query Structs ---

/// PageContextQuery
///
/// The layout URL the navigation bundle is built for, e.g. `/domains/taxes/india`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PageContextQuery {
    pub path: Option<String>,
}

/// TableQuery
///
/// Optional export and pagination parameters of the public table endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct TableQuery {
    /// `csv` or `json` switches from the table view to an export.
    pub format: Option<ExportFormat>,
    /// Adds `Content-Disposition: attachment` to exports.
    pub download: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Loads a published domain visible in `country`, or 404.
async fn visible_domain(state: &AppState, slug: &str, country: &str) -> ApiResult<Domain> {
    state
        .repo
        .get_domain_by_slug(slug)
        .await?
        .filter(|d| d.is_published && is_visible(&d.target_countries, country))
        .ok_or_else(|| ApiError::not_found("Domain"))
}

/// Loads a page for direct delivery by id. The page, each of its ancestors and the owning
/// domain must all be published and visible in `country`, otherwise 404.
async fn visible_page(state: &AppState, page_id: Uuid, country: &str) -> ApiResult<Page> {
    let repo = state.repo.as_ref();
    let page = repo
        .get_page(page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;

    let mut seen = HashSet::from([page.id]);
    let mut current = Some(page.clone());
    while let Some(p) = current {
        if !p.is_published || !is_visible(&p.target_countries, country) {
            return Err(ApiError::not_found("Page"));
        }
        current = match p.parent_id {
            Some(parent_id) if seen.insert(parent_id) => Some(
                repo.get_page(parent_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Page"))?,
            ),
            _ => None,
        };
    }

    repo.get_domain(page.domain_id)
        .await?
        .filter(|d| d.is_published && is_visible(&d.target_countries, country))
        .ok_or_else(|| ApiError::not_found("Page"))?;
    Ok(page)
}

/// Builds an export response; `download` turns it into an attachment named after the table.
pub fn export_response(
    table: &DataTable,
    schema: &[crate::models::TableColumn],
    rows: &[crate::models::TableRow],
    format: ExportFormat,
    download: bool,
) -> ApiResult<Response> {
    let file_stem: String = table
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    let (content_type, extension, body) = match format {
        ExportFormat::Csv => {
            if !table.settings.export.csv {
                return Err(ApiError::Forbidden("CSV export is disabled for this table".to_string()));
            }
            ("text/csv; charset=utf-8", "csv", export_csv(schema, rows))
        }
        ExportFormat::Json => {
            if !table.settings.export.json {
                return Err(ApiError::Forbidden("JSON export is disabled for this table".to_string()));
            }
            let value = export_json(schema, rows, &table.metadata);
            ("application/json", "json", serde_json::to_string_pretty(&value)?)
        }
    };

    let mut response = ([(header::CONTENT_TYPE, content_type.to_string())], body).into_response();
    if download {
        let disposition = format!("attachment; filename=\"{}.{}\"", file_stem, extension);
        let value = disposition
            .parse()
            .map_err(|_| ApiError::Internal("invalid content disposition".to_string()))?;
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

// --- Handlers ---

/// get_page_context
///
/// [Public Route] Returns the header, sidebar, page sidebar and breadcrumbs for a layout URL
/// in one call. Everything is filtered by the requester's `user-country` cookie.
#[utoipa::path(
    get,
    path = "/api/page-context",
    params(PageContextQuery),
    responses((status = 200, description = "Navigation bundle", body = NavigationContext))
)]
pub async fn get_page_context(
    State(state): State<AppState>,
    country: UserCountry,
    Query(query): Query<PageContextQuery>,
) -> ApiResult<axum::Json<NavigationContext>> {
    let path = query.path.unwrap_or_else(|| "/".to_string());
    let context =
        build_page_context(state.repo.as_ref(), state.cache.clone(), &path, country.as_str()).await?;
    Ok(axum::Json(context))
}

/// get_public_table
///
/// [Public Route] Serves the table attached to a page with rows filtered by country and the
/// reserved `targetCountries` column removed. `format=csv|json` exports the same data.
#[utoipa::path(
    get,
    path = "/api/domain/tables/by-page/{pageId}",
    params(("pageId" = Uuid, Path, description = "Page owning the table"), TableQuery),
    responses(
        (status = 200, description = "Table view or export", body = PublicTableView),
        (status = 404, description = "Page or table not visible")
    )
)]
pub async fn get_public_table(
    State(state): State<AppState>,
    country: UserCountry,
    Path(page_id): Path<Uuid>,
    Query(query): Query<TableQuery>,
) -> ApiResult<Response> {
    let page = visible_page(&state, page_id, country.as_str()).await?;

    let memo = RequestMemo::new(state.cache.clone());
    let table: Option<DataTable> = memo
        .get_or_load(&format!("tables:page:{}", page.id), &[TAG_TABLES], || {
            state.repo.get_table_by_page(page.id)
        })
        .await?;
    let table = table.ok_or_else(|| ApiError::not_found("Table"))?;

    match query.format {
        Some(format) => {
            let view = public_view(table.clone(), country.as_str(), None, None);
            export_response(&table, &view.schema, &view.data, format, query.download.unwrap_or(false))
        }
        None => {
            let view = public_view(table, country.as_str(), query.page, query.page_size);
            Ok(Envelope::new().with("table", &view)?.into_response())
        }
    }
}

/// list_domains
///
/// [Public Route] Published domains visible in the requester's country.
#[utoipa::path(
    get,
    path = "/api/domains",
    responses((status = 200, description = "Visible domains", body = [Domain]))
)]
pub async fn list_domains(State(state): State<AppState>, country: UserCountry) -> ApiResult<Envelope> {
    let memo = RequestMemo::new(state.cache.clone());
    let domains: Vec<Domain> = memo
        .get_or_load(
            &format!("domains:published:{}", country.as_str()),
            &[TAG_DOMAINS],
            || state.repo.list_published_domains(country.as_str()),
        )
        .await?;
    Envelope::new().with("domains", &domains)
}

/// get_domain
///
/// [Public Route] Domain landing page. Direct domains return their `__main__` page (created on
/// first visit); hierarchical domains list their visible top-level pages.
#[utoipa::path(
    get,
    path = "/api/domains/{slug}",
    params(("slug" = String, Path, description = "Domain slug")),
    responses(
        (status = 200, description = "Domain landing", body = DomainLanding),
        (status = 404, description = "Domain not visible")
    )
)]
pub async fn get_domain(
    State(state): State<AppState>,
    country: UserCountry,
    Path(slug): Path<String>,
) -> ApiResult<Envelope> {
    let repo = state.repo.as_ref();
    let domain = visible_domain(&state, &slug, country.as_str()).await?;

    let landing = match domain.page_type {
        PageType::Direct => {
            let main = ensure_main_page(repo, &domain).await?;
            let detail = page_detail(repo, domain.clone(), main, country.as_str()).await?;
            DomainLanding {
                domain,
                main_page: Some(detail),
                root_pages: Vec::new(),
            }
        }
        PageType::Hierarchical => {
            let root_pages = repo.list_root_pages(domain.id, Some(country.as_str())).await?;
            DomainLanding {
                domain,
                main_page: None,
                root_pages,
            }
        }
    };
    Envelope::new().with("domain", &landing)
}

/// get_domain_page
///
/// [Public Route] Resolves `/{slug}/pages/{a}/{b}/...` down the domain's page tree and returns
/// the page with its visible children and content.
#[utoipa::path(
    get,
    path = "/api/domains/{slug}/pages/{path}",
    params(
        ("slug" = String, Path, description = "Domain slug"),
        ("path" = String, Path, description = "Slash separated page slugs")
    ),
    responses(
        (status = 200, description = "Resolved page", body = crate::models::PageDetail),
        (status = 404, description = "No visible page at this path")
    )
)]
pub async fn get_domain_page(
    State(state): State<AppState>,
    country: UserCountry,
    Path((slug, path)): Path<(String, String)>,
) -> ApiResult<Envelope> {
    let repo = state.repo.as_ref();
    let domain = visible_domain(&state, &slug, country.as_str()).await?;
    let slugs: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let memo = RequestMemo::new(state.cache.clone());
    let resolved = memo
        .get_or_load(
            &format!("pages:path:{}:{}:{}", domain.id, country.as_str(), slugs.join("/")),
            &[TAG_PAGES, TAG_DOMAINS],
            || resolve_page_path(repo, &domain, &slugs, country.as_str()),
        )
        .await?;
    let page = resolved
        .and_then(|r| r.page().cloned())
        .ok_or_else(|| ApiError::not_found("Page"))?;

    let detail = page_detail(repo, domain, page, country.as_str()).await?;
    Envelope::new().with("page", &detail)
}
