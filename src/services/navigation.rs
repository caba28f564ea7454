//! Page-context aggregation: header, sidebar, page sidebar and breadcrumbs for one URL,
//! produced by a single call so the layout never issues per-component fetches.

use futures::future::try_join_all;
use uuid::Uuid;

use super::pages::{ResolvedPath, is_section_layout, resolve_page_path};
use crate::cache::{CacheState, RequestMemo, TAG_CATEGORIES, TAG_DOMAINS, TAG_PAGES};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Breadcrumb, ContentType, CrumbType, Domain, DomainCategory, DomainLink, HeaderColumn,
    HeaderGroup, HeaderView, NavigationContext, Page, PageLink, PageSidebarView, PageType,
    SidebarDomain, SidebarPage, SidebarSection, SidebarView,
};
use crate::repository::Repository;

pub const DOMAINS_ROOT_URL: &str = "/domains";
const HEADER_COLUMNS: u8 = 3;
const OTHER_GROUP: &str = "Other";
const ALL_PAGES_SECTION: &str = "All Pages";

/// `/domains/{domain}/{slug}/...` split into its parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PagePath {
    pub domain_slug: Option<String>,
    pub slugs: Vec<String>,
}

/// Parses a layout path. Query strings and empty segments are ignored; paths outside
/// `/domains` carry no domain.
pub fn parse_page_path(path: &str) -> PagePath {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    if segments.next() != Some("domains") {
        return PagePath::default();
    }
    PagePath {
        domain_slug: segments.next().map(str::to_string),
        slugs: segments.map(str::to_string).collect(),
    }
}

pub fn domain_url(slug: &str) -> String {
    format!("{DOMAINS_ROOT_URL}/{slug}")
}

fn page_url(base: &str, slug: &str) -> String {
    format!("{base}/{slug}")
}

fn domain_link(domain: &Domain) -> DomainLink {
    DomainLink {
        id: domain.id,
        name: domain.name.clone(),
        slug: domain.slug.clone(),
        url: domain_url(&domain.slug),
        page_type: domain.page_type,
    }
}

/// Groups domains under their active categories, three fixed columns. Domains without an
/// active category land in an "Other" group in the last column.
pub fn build_header(domains: &[Domain], categories: &[DomainCategory]) -> HeaderView {
    let mut columns: Vec<HeaderColumn> = (1..=HEADER_COLUMNS)
        .map(|column| HeaderColumn { column, groups: Vec::new() })
        .collect();

    let mut sorted: Vec<&DomainCategory> = categories.iter().filter(|c| c.is_active).collect();
    sorted.sort_by_key(|c| (c.column_position, c.category_order));

    for category in &sorted {
        let mut members: Vec<&Domain> = domains
            .iter()
            .filter(|d| d.category_id == Some(category.id))
            .collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by(|a, b| (a.category_order, &a.name).cmp(&(b.category_order, &b.name)));

        let index = (category.column_position.clamp(1, HEADER_COLUMNS as i32) - 1) as usize;
        columns[index].groups.push(HeaderGroup {
            category_id: Some(category.id),
            name: category.name.clone(),
            slug: category.slug.clone(),
            icon: category.icon.clone(),
            domains: members.into_iter().map(domain_link).collect(),
        });
    }

    let mut others: Vec<&Domain> = domains
        .iter()
        .filter(|d| !d.category_id.is_some_and(|id| sorted.iter().any(|c| c.id == id)))
        .collect();
    if !others.is_empty() {
        others.sort_by(|a, b| a.name.cmp(&b.name));
        columns[(HEADER_COLUMNS - 1) as usize].groups.push(HeaderGroup {
            category_id: None,
            name: OTHER_GROUP.to_string(),
            slug: OTHER_GROUP.to_lowercase(),
            icon: None,
            domains: others.into_iter().map(domain_link).collect(),
        });
    }

    HeaderView { columns }
}

/// Flat sidebar in header order; hierarchical domains carry their visible root pages.
pub fn build_sidebar(
    header: &HeaderView,
    domains: &[Domain],
    categories: &[DomainCategory],
    root_pages: &[(Uuid, Vec<Page>)],
    current: Option<&str>,
) -> SidebarView {
    let mut entries = Vec::new();
    for group in header.columns.iter().flat_map(|c| c.groups.iter()) {
        let category_name = group
            .category_id
            .and_then(|id| categories.iter().find(|c| c.id == id))
            .map(|c| c.name.clone());

        for link in &group.domains {
            let Some(domain) = domains.iter().find(|d| d.id == link.id) else {
                continue;
            };
            let pages = root_pages
                .iter()
                .find(|(id, _)| *id == domain.id)
                .map(|(_, pages)| {
                    pages
                        .iter()
                        .map(|p| PageLink {
                            id: p.id,
                            title: p.title.clone(),
                            slug: p.slug.clone(),
                            url: page_url(&link.url, &p.slug),
                        })
                        .collect()
                })
                .unwrap_or_default();

            entries.push(SidebarDomain {
                id: domain.id,
                name: domain.name.clone(),
                slug: domain.slug.clone(),
                url: link.url.clone(),
                page_type: domain.page_type,
                category_name: category_name.clone(),
                pages,
                is_current: current == Some(domain.slug.as_str()),
            });
        }
    }
    SidebarView { domains: entries }
}

/// Trail from the "Domains" root through the domain to each resolved page; `__main__` is skipped.
pub fn build_breadcrumbs(domain: Option<&Domain>, resolved: Option<&ResolvedPath>) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        label: "Domains".to_string(),
        url: DOMAINS_ROOT_URL.to_string(),
        crumb_type: CrumbType::Root,
    }];
    let Some(domain) = domain else {
        return crumbs;
    };

    let mut url = domain_url(&domain.slug);
    crumbs.push(Breadcrumb {
        label: domain.name.clone(),
        url: url.clone(),
        crumb_type: CrumbType::Domain,
    });

    if let Some(resolved) = resolved {
        for page in &resolved.chain {
            url = page_url(&url, &page.slug);
            crumbs.push(Breadcrumb {
                label: page.title.clone(),
                url: url.clone(),
                crumb_type: CrumbType::Page,
            });
        }
    }
    crumbs
}

/// The page whose sections drive the page sidebar, with its URL: the open page if it uses a
/// section layout, else its nearest such ancestor (including `__main__`), else the open page.
fn sidebar_anchor<'a>(domain: &Domain, resolved: &'a ResolvedPath) -> Option<(&'a Page, String)> {
    let base = domain_url(&domain.slug);
    let url_at = |depth: usize| {
        resolved.chain[..depth]
            .iter()
            .fold(base.clone(), |acc, p| page_url(&acc, &p.slug))
    };

    for depth in (1..=resolved.chain.len()).rev() {
        let page = &resolved.chain[depth - 1];
        if is_section_layout(page) {
            return Some((page, url_at(depth)));
        }
    }
    if let Some(root) = resolved.root.as_ref() {
        return Some((root, base.clone()));
    }
    resolved.page().map(|page| (page, url_at(resolved.chain.len())))
}

fn sidebar_page(page: &Page, url: String, grandchildren: &[Page]) -> SidebarPage {
    let children = if page.content_type == ContentType::SubcategoryList {
        grandchildren
            .iter()
            .map(|c| PageLink {
                id: c.id,
                title: c.title.clone(),
                slug: c.slug.clone(),
                url: page_url(&url, &c.slug),
            })
            .collect()
    } else {
        Vec::new()
    };
    SidebarPage {
        id: page.id,
        title: page.title.clone(),
        url,
        content_type: page.content_type,
        children,
    }
}

/// Maps the anchor's section configuration onto its visible children. Without sections every
/// child goes into one "All Pages" section.
pub fn build_page_sidebar(
    anchor: &Page,
    anchor_url: &str,
    children: &[Page],
    grandchildren: &[(Uuid, Vec<Page>)],
) -> PageSidebarView {
    let entry = |page: &Page| {
        let nested = grandchildren
            .iter()
            .find(|(id, _)| *id == page.id)
            .map(|(_, pages)| pages.as_slice())
            .unwrap_or_default();
        sidebar_page(page, page_url(anchor_url, &page.slug), nested)
    };

    let sections = if anchor.sections.is_empty() {
        vec![SidebarSection {
            title: ALL_PAGES_SECTION.to_string(),
            column: 1,
            order: 0,
            pages: children.iter().map(&entry).collect(),
        }]
    } else {
        let mut configured = anchor.sections.clone();
        configured.sort_by_key(|s| (s.column, s.order));
        configured
            .iter()
            .map(|section| SidebarSection {
                title: section.title.clone(),
                column: section.column,
                order: section.order,
                pages: section
                    .page_ids
                    .iter()
                    .filter_map(|id| children.iter().find(|c| c.id == *id))
                    .map(&entry)
                    .collect(),
            })
            .collect()
    };

    PageSidebarView {
        page_id: anchor.id,
        page_title: anchor.title.clone(),
        sections,
    }
}

/// Builds the whole navigation bundle for `path` as seen from `country`.
///
/// Domains and categories load concurrently; every load goes through one `RequestMemo`, so the
/// path is resolved once and shared by the page sidebar and the breadcrumbs.
pub async fn build_page_context(
    repo: &dyn Repository,
    cache: CacheState,
    path: &str,
    country: &str,
) -> ApiResult<NavigationContext> {
    let memo = RequestMemo::new(cache);
    let target = parse_page_path(path);

    let domains_key = format!("domains:published:{country}");
    let (domains, categories) = tokio::try_join!(
        memo.get_or_load::<Vec<Domain>, _, _>(
            &domains_key,
            &[TAG_DOMAINS],
            || repo.list_published_domains(country),
        ),
        memo.get_or_load::<Vec<DomainCategory>, _, _>(
            "categories:active",
            &[TAG_CATEGORIES],
            || repo.list_categories(true),
        ),
    )?;

    let header = build_header(&domains, &categories);

    let hierarchical: Vec<&Domain> = domains
        .iter()
        .filter(|d| d.page_type == PageType::Hierarchical)
        .collect();
    let root_pages = try_join_all(hierarchical.iter().map(|d| {
        let memo = &memo;
        async move {
            let pages: Vec<Page> = memo
                .get_or_load(
                    &format!("pages:roots:{}:{country}", d.id),
                    &[TAG_PAGES],
                    || repo.list_root_pages(d.id, Some(country)),
                )
                .await?;
            Ok::<_, ApiError>((d.id, pages))
        }
    }))
    .await?;

    let current = target
        .domain_slug
        .as_deref()
        .and_then(|slug| domains.iter().find(|d| d.slug == slug));
    let sidebar = build_sidebar(
        &header,
        &domains,
        &categories,
        &root_pages,
        current.map(|d| d.slug.as_str()),
    );

    let resolved: Option<ResolvedPath> = match current {
        Some(domain) => {
            memo.get_or_load(
                &format!("pages:path:{}:{country}:{}", domain.id, target.slugs.join("/")),
                &[TAG_PAGES, TAG_DOMAINS],
                || resolve_page_path(repo, domain, &target.slugs, country),
            )
            .await?
        }
        None => None,
    };

    let page_sidebar = match (current, resolved.as_ref()) {
        (Some(domain), Some(resolved)) => match sidebar_anchor(domain, resolved) {
            Some((anchor, anchor_url)) => {
                let children: Vec<Page> = memo
                    .get_or_load(
                        &format!("pages:children:{}:{country}", anchor.id),
                        &[TAG_PAGES],
                        || repo.list_children(anchor.id, Some(country)),
                    )
                    .await?;
                let subcategories = try_join_all(
                    children
                        .iter()
                        .filter(|c| c.content_type == ContentType::SubcategoryList)
                        .map(|c| {
                            let memo = &memo;
                            async move {
                                let pages: Vec<Page> = memo
                                    .get_or_load(
                                        &format!("pages:children:{}:{country}", c.id),
                                        &[TAG_PAGES],
                                        || repo.list_children(c.id, Some(country)),
                                    )
                                    .await?;
                                Ok::<_, ApiError>((c.id, pages))
                            }
                        }),
                )
                .await?;
                Some(build_page_sidebar(anchor, &anchor_url, &children, &subcategories))
            }
            None => None,
        },
        _ => None,
    };

    let breadcrumbs = build_breadcrumbs(current, resolved.as_ref());

    Ok(NavigationContext {
        header,
        sidebar,
        page_sidebar,
        breadcrumbs,
    })
}
