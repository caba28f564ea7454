//! Page tree operations: `__main__` provisioning, path resolution, section layout and the
//! structural writes (create, move, cascade delete).

use std::collections::{HashMap, HashSet};

use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::tree::PageTree;
use crate::country::normalize_targets;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ContentType, CreatePageRequest, Domain, MAIN_PAGE_SLUG, NewPage, Page, PageChanges,
    PageDetail, PageType, Section, SectionInput, SectionsOverview, UpdatePageRequest,
};
use crate::repository::Repository;

/// A resolved URL path: the synthetic root (direct domains) plus the visible page chain,
/// one entry per slug segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedPath {
    pub root: Option<Page>,
    pub chain: Vec<Page>,
}

impl ResolvedPath {
    /// The page the path points at.
    pub fn page(&self) -> Option<&Page> {
        self.chain.last().or(self.root.as_ref())
    }
}

/// Validates and normalizes a submitted target list, defaulting to `ALL`.
pub fn targets_or_all(raw: Option<Vec<String>>) -> ApiResult<Vec<String>> {
    normalize_targets(&raw.unwrap_or_default()).map_err(ApiError::Validation)
}

/// Returns the domain's `__main__` page, creating it on first access.
pub async fn ensure_main_page(repo: &dyn Repository, domain: &Domain) -> ApiResult<Page> {
    if let Some(main) = repo.find_main_page(domain.id).await? {
        return Ok(main);
    }

    tracing::info!(domain = %domain.slug, "creating __main__ page");
    match repo.create_page(NewPage::main_page(domain)).await {
        Ok(page) => Ok(page),
        // Another request created it concurrently.
        Err(ApiError::Conflict(_)) => repo
            .find_main_page(domain.id)
            .await?
            .ok_or_else(|| ApiError::Internal("__main__ page vanished after conflict".to_string())),
        Err(e) => Err(e),
    }
}

/// Walks `slugs` down the domain's page tree, honoring country visibility at every level.
///
/// Direct domains start below `__main__`, hierarchical ones among parentless pages. All
/// candidate pages are fetched in one query and stitched by `(slug, parent_id)`; if that does
/// not yield a complete chain the walk is repeated with one lookup per level.
pub async fn resolve_page_path(
    repo: &dyn Repository,
    domain: &Domain,
    slugs: &[String],
    country: &str,
) -> ApiResult<Option<ResolvedPath>> {
    if slugs.iter().any(|s| s == MAIN_PAGE_SLUG || s.is_empty()) {
        return Ok(None);
    }

    let root = match domain.page_type {
        PageType::Direct => Some(ensure_main_page(repo, domain).await?),
        PageType::Hierarchical => None,
    };
    if slugs.is_empty() {
        return Ok(root.map(|root| ResolvedPath { root: Some(root), chain: Vec::new() }));
    }

    let root_id = root.as_ref().map(|r| r.id);
    let candidates = repo.find_pages_by_slugs(domain.id, slugs, country).await?;
    if let Some(chain) = stitch_chain(&candidates, root_id, slugs) {
        return Ok(Some(ResolvedPath { root, chain }));
    }

    tracing::debug!(domain = %domain.slug, ?slugs, "batch stitch incomplete, resolving per level");
    let mut chain = Vec::with_capacity(slugs.len());
    let mut parent = root_id;
    for slug in slugs {
        match repo.find_child_page(domain.id, parent, slug, country).await? {
            Some(page) => {
                parent = Some(page.id);
                chain.push(page);
            }
            None => return Ok(None),
        }
    }
    Ok(Some(ResolvedPath { root, chain }))
}

/// In-memory stitch. `None` when any level has zero or several matches.
fn stitch_chain(candidates: &[Page], root_id: Option<Uuid>, slugs: &[String]) -> Option<Vec<Page>> {
    let mut by_key: HashMap<(&str, Option<Uuid>), Vec<&Page>> = HashMap::new();
    for page in candidates {
        by_key.entry((page.slug.as_str(), page.parent_id)).or_default().push(page);
    }

    let mut chain = Vec::with_capacity(slugs.len());
    let mut parent = root_id;
    for slug in slugs {
        match by_key.get(&(slug.as_str(), parent)).map(Vec::as_slice) {
            Some([page]) => {
                parent = Some(page.id);
                chain.push((*page).clone());
            }
            _ => return None,
        }
    }
    Some(chain)
}

/// Loads everything needed to render `page` for a requester in `country`.
pub async fn page_detail(
    repo: &dyn Repository,
    domain: Domain,
    page: Page,
    country: &str,
) -> ApiResult<PageDetail> {
    let (children, blocks, rich_text, table) = tokio::try_join!(
        repo.list_children(page.id, Some(country)),
        repo.list_blocks(page.id),
        repo.get_rich_text(page.id),
        repo.get_table_by_page(page.id),
    )?;

    Ok(PageDetail {
        domain,
        page,
        children,
        blocks,
        rich_text,
        table_id: table.map(|t| t.id),
    })
}

/// Children not referenced by any section, in their original order.
pub fn unorganized_pages(sections: &[Section], children: &[Page]) -> Vec<Page> {
    let organized: HashSet<Uuid> = sections.iter().flat_map(|s| s.page_ids.iter().copied()).collect();
    children
        .iter()
        .filter(|c| !organized.contains(&c.id))
        .cloned()
        .collect()
}

/// Checks a submitted section list against the page's actual children. Nothing is written here;
/// callers persist the returned list only when every section passed.
pub fn validate_sections(inputs: Vec<SectionInput>, child_ids: &HashSet<Uuid>) -> ApiResult<Vec<Section>> {
    let mut problems = Vec::new();
    let mut foreign: Vec<Uuid> = Vec::new();

    for (i, input) in inputs.iter().enumerate() {
        if input.title.trim().is_empty() {
            problems.push(format!("section {} has an empty title", i + 1));
        }
        if !(1..=3).contains(&input.column) {
            problems.push(format!("section {} has invalid column {} (expected 1-3)", i + 1, input.column));
        }
        for id in &input.page_ids {
            if !child_ids.contains(id) && !foreign.contains(id) {
                foreign.push(*id);
            }
        }
    }

    if !foreign.is_empty() {
        let ids: Vec<String> = foreign.iter().map(Uuid::to_string).collect();
        problems.push(format!("pages are not children of this page: {}", ids.join(", ")));
    }
    if !problems.is_empty() {
        return Err(ApiError::Validation(format!("Invalid sections: {}", problems.join("; "))));
    }

    Ok(inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let mut page_ids: Vec<Uuid> = Vec::with_capacity(input.page_ids.len());
            for id in input.page_ids {
                if !page_ids.contains(&id) {
                    page_ids.push(id);
                }
            }
            Section {
                id: input
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                title: input.title.trim().to_string(),
                column: input.column,
                order: input.order.unwrap_or(i as i32),
                page_ids,
            }
        })
        .collect())
}

pub async fn update_sections(
    repo: &dyn Repository,
    page_id: Uuid,
    inputs: Vec<SectionInput>,
) -> ApiResult<Page> {
    repo.get_page(page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;
    let child_ids: HashSet<Uuid> = repo
        .list_children(page_id, None)
        .await?
        .iter()
        .map(|c| c.id)
        .collect();

    let sections = validate_sections(inputs, &child_ids)?;
    repo.update_page_sections(page_id, sections)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))
}

pub async fn sections_overview(repo: &dyn Repository, page_id: Uuid) -> ApiResult<SectionsOverview> {
    let page = repo
        .get_page(page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;
    let children = repo.list_children(page_id, None).await?;
    let unorganized_pages = unorganized_pages(&page.sections, &children);

    Ok(SectionsOverview {
        sections: page.sections,
        children,
        unorganized_pages,
    })
}

/// Drops `removed` from every section of `parent_id`. No-op when nothing references them.
async fn prune_sections(repo: &dyn Repository, parent_id: Uuid, removed: &[Uuid]) -> ApiResult<()> {
    let Some(parent) = repo.get_page(parent_id).await? else {
        return Ok(());
    };
    let referenced = parent
        .sections
        .iter()
        .any(|s| s.page_ids.iter().any(|id| removed.contains(id)));
    if !referenced {
        return Ok(());
    }

    let sections = parent
        .sections
        .into_iter()
        .map(|mut s| {
            s.page_ids.retain(|id| !removed.contains(id));
            s
        })
        .collect();
    repo.update_page_sections(parent_id, sections).await?;
    Ok(())
}

/// Resolves where a new or moved top-level page hangs: under `__main__` for direct domains.
async fn top_level_parent(repo: &dyn Repository, domain: &Domain) -> ApiResult<Option<Uuid>> {
    match domain.page_type {
        PageType::Direct => Ok(Some(ensure_main_page(repo, domain).await?.id)),
        PageType::Hierarchical => Ok(None),
    }
}

pub async fn create_page(repo: &dyn Repository, req: CreatePageRequest) -> ApiResult<Page> {
    req.validate()?;
    let domain = repo
        .get_domain(req.domain_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Domain"))?;

    let parent_id = match req.parent_id {
        Some(parent_id) => {
            let parent = repo
                .get_page(parent_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Parent page"))?;
            if parent.domain_id != domain.id {
                return Err(ApiError::Validation(
                    "Parent page belongs to a different domain".to_string(),
                ));
            }
            Some(parent.id)
        }
        None => top_level_parent(repo, &domain).await?,
    };

    let page = repo
        .create_page(NewPage {
            domain_id: domain.id,
            parent_id,
            title: req.title,
            slug: req.slug,
            description: req.description,
            content_type: req.content_type,
            sections: Vec::new(),
            target_countries: targets_or_all(req.target_countries)?,
            page_order: req.page_order.unwrap_or(0),
            is_published: req.is_published.unwrap_or(true),
        })
        .await?;

    tracing::info!(page_id = %page.id, domain = %domain.slug, "page created");
    Ok(page)
}

/// Applies a partial update. A change of parent is checked for domain membership and cycles,
/// and the page is pruned from its former parent's sections.
pub async fn update_page(repo: &dyn Repository, id: Uuid, req: UpdatePageRequest) -> ApiResult<Page> {
    req.validate()?;
    let page = repo
        .get_page(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;

    let moving = req.parent_id.is_some() || req.move_to_root == Some(true);
    if page.is_main() && (req.slug.is_some() || moving) {
        return Err(ApiError::Validation(
            "The __main__ page cannot be renamed or moved".to_string(),
        ));
    }

    let new_parent = if moving {
        let domain = repo
            .get_domain(page.domain_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Domain"))?;
        let target = match req.parent_id {
            Some(parent_id) => Some(parent_id),
            None => top_level_parent(repo, &domain).await?,
        };

        if let Some(target_id) = target {
            let tree = PageTree::new(repo.list_domain_pages(domain.id).await?);
            if tree.get(target_id).is_none() {
                return Err(ApiError::Validation(
                    "Target parent does not exist in this domain".to_string(),
                ));
            }
            if tree.would_create_cycle(id, target_id) {
                return Err(ApiError::Validation(
                    "Cannot move a page under itself or its descendants (circular reference)".to_string(),
                ));
            }
        }
        Some(target)
    } else {
        None
    };

    let target_countries = match req.target_countries {
        Some(raw) => Some(targets_or_all(Some(raw))?),
        None => None,
    };

    let updated = repo
        .update_page(
            id,
            PageChanges {
                title: req.title,
                slug: req.slug,
                description: req.description,
                content_type: req.content_type,
                target_countries,
                page_order: req.page_order,
                is_published: req.is_published,
                parent_id: new_parent,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;

    if let Some(old_parent) = page.parent_id {
        if updated.parent_id != Some(old_parent) {
            prune_sections(repo, old_parent, &[id]).await?;
        }
    }
    Ok(updated)
}

/// Deletes a page and its whole subtree in one repository transaction.
/// Returns the number of pages removed (descendants + 1).
pub async fn delete_page_cascade(repo: &dyn Repository, id: Uuid) -> ApiResult<u64> {
    let page = repo
        .get_page(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;
    if page.is_main() {
        return Err(ApiError::Validation(
            "The __main__ page of a domain cannot be deleted".to_string(),
        ));
    }

    let tree = PageTree::new(repo.list_domain_pages(page.domain_id).await?);
    let mut ids = tree.descendants_deepest_first(id);
    ids.push(id);

    let deleted = repo.delete_pages(&ids).await?;
    tracing::info!(page_id = %id, deleted, "page subtree deleted");

    if let Some(parent_id) = page.parent_id {
        prune_sections(repo, parent_id, &[id]).await?;
    }
    Ok(deleted)
}

/// Counts words in the text of an HTML fragment. Entities are decoded and `script` / `style`
/// bodies are skipped.
pub fn word_count(html: &str) -> i32 {
    let fragment = Html::parse_fragment(html);
    let words: usize = fragment
        .tree
        .nodes()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let raw = node.ancestors().any(|ancestor| {
                    matches!(ancestor.value(), Node::Element(el) if matches!(el.name(), "script" | "style"))
                });
                (!raw).then(|| text.split_whitespace().count())
            }
            _ => None,
        })
        .sum();
    words as i32
}

/// Content type a page must have for its children to be laid out in sections.
pub fn is_section_layout(page: &Page) -> bool {
    page.content_type == ContentType::SectionBased || !page.sections.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateDomainRequest;
    use crate::repository::InMemoryRepository;

    async fn domain(repo: &InMemoryRepository, slug: &str, page_type: PageType) -> Domain {
        repo.create_domain(CreateDomainRequest {
            name: slug.to_uppercase(),
            slug: slug.into(),
            page_type,
            is_published: Some(true),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    async fn add(repo: &InMemoryRepository, d: &Domain, parent: Option<Uuid>, slug: &str) -> Page {
        create_page(
            repo,
            CreatePageRequest {
                domain_id: d.id,
                parent_id: parent,
                title: slug.to_uppercase(),
                slug: slug.into(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    fn slugs(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn direct_domain_root_is_created_on_demand() {
        let repo = InMemoryRepository::new();
        let d = domain(&repo, "guides", PageType::Direct).await;

        let resolved = resolve_page_path(&repo, &d, &[], "IN").await.unwrap().unwrap();
        let main = resolved.page().unwrap();
        assert_eq!(main.slug, MAIN_PAGE_SLUG);
        assert_eq!(main.content_type, ContentType::SectionBased);
        assert!(main.sections.is_empty());

        let again = ensure_main_page(&repo, &d).await.unwrap();
        assert_eq!(again.id, main.id);
    }

    #[tokio::test]
    async fn same_slug_under_different_parents_resolves_by_path() {
        let repo = InMemoryRepository::new();
        let d = domain(&repo, "taxes", PageType::Hierarchical).await;
        let india = add(&repo, &d, None, "india").await;
        let usa = add(&repo, &d, None, "usa").await;
        let in_rates = add(&repo, &d, Some(india.id), "rates").await;
        let us_rates = add(&repo, &d, Some(usa.id), "rates").await;

        let a = resolve_page_path(&repo, &d, &slugs(&["india", "rates"]), "IN").await.unwrap().unwrap();
        let b = resolve_page_path(&repo, &d, &slugs(&["usa", "rates"]), "IN").await.unwrap().unwrap();
        assert_eq!(a.page().unwrap().id, in_rates.id);
        assert_eq!(b.page().unwrap().id, us_rates.id);

        let again = resolve_page_path(&repo, &d, &slugs(&["india", "rates"]), "IN").await.unwrap().unwrap();
        assert_eq!(again.page().unwrap().id, a.page().unwrap().id);

        assert!(resolve_page_path(&repo, &d, &slugs(&["rates"]), "IN").await.unwrap().is_none());
        assert!(resolve_page_path(&repo, &d, &slugs(&["india", "missing"]), "IN").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolution_honors_country() {
        let repo = InMemoryRepository::new();
        let d = domain(&repo, "visas", PageType::Direct).await;
        let page = add(&repo, &d, None, "work").await;
        update_page(
            &repo,
            page.id,
            UpdatePageRequest { target_countries: Some(vec!["us".into()]), ..Default::default() },
        )
        .await
        .unwrap();

        assert!(resolve_page_path(&repo, &d, &slugs(&["work"]), "IN").await.unwrap().is_none());
        assert!(resolve_page_path(&repo, &d, &slugs(&["work"]), "US").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sections_reject_non_children_without_writing() {
        let repo = InMemoryRepository::new();
        let d = domain(&repo, "guides", PageType::Hierarchical).await;
        let parent = add(&repo, &d, None, "parent").await;
        let child = add(&repo, &d, Some(parent.id), "child").await;
        let stranger = add(&repo, &d, None, "stranger").await;

        let err = update_sections(
            &repo,
            parent.id,
            vec![SectionInput {
                title: "Mixed".into(),
                column: 1,
                page_ids: vec![child.id, stranger.id],
                ..Default::default()
            }],
        )
        .await
        .unwrap_err();
        assert!(matches!(&err, ApiError::Validation(msg) if msg.contains(&stranger.id.to_string())));
        assert!(repo.get_page(parent.id).await.unwrap().unwrap().sections.is_empty());

        let overview = sections_overview(&repo, parent.id).await.unwrap();
        assert_eq!(overview.unorganized_pages.len(), 1);

        update_sections(
            &repo,
            parent.id,
            vec![SectionInput { title: "Main".into(), column: 2, page_ids: vec![child.id], ..Default::default() }],
        )
        .await
        .unwrap();
        let overview = sections_overview(&repo, parent.id).await.unwrap();
        assert!(overview.unorganized_pages.is_empty());
        assert!(!overview.sections[0].id.is_empty());
    }

    #[test]
    fn section_columns_are_bounded() {
        let err = validate_sections(
            vec![SectionInput { title: "Four".into(), column: 4, ..Default::default() }],
            &HashSet::new(),
        );
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn cascade_delete_removes_subtree_and_blocks() {
        let repo = InMemoryRepository::new();
        let d = domain(&repo, "guides", PageType::Direct).await;
        let top = add(&repo, &d, None, "top").await;
        let mid = add(&repo, &d, Some(top.id), "mid").await;
        let leaf = add(&repo, &d, Some(mid.id), "leaf").await;
        add(&repo, &d, Some(top.id), "sibling").await;
        repo.create_block(leaf.id, crate::models::CreateBlockRequest { content: "x".into(), ..Default::default() })
            .await
            .unwrap();

        let deleted = delete_page_cascade(&repo, top.id).await.unwrap();
        assert_eq!(deleted, 4);
        assert!(repo.list_blocks(leaf.id).await.unwrap().is_empty());
        assert!(repo.get_page(mid.id).await.unwrap().is_none());

        let main = ensure_main_page(&repo, &d).await.unwrap();
        assert!(matches!(delete_page_cascade(&repo, main.id).await, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn deleting_a_child_prunes_parent_sections() {
        let repo = InMemoryRepository::new();
        let d = domain(&repo, "guides", PageType::Direct).await;
        let child = add(&repo, &d, None, "child").await;
        let main = ensure_main_page(&repo, &d).await.unwrap();
        update_sections(
            &repo,
            main.id,
            vec![SectionInput { title: "All".into(), column: 1, page_ids: vec![child.id], ..Default::default() }],
        )
        .await
        .unwrap();

        delete_page_cascade(&repo, child.id).await.unwrap();
        let main = repo.get_page(main.id).await.unwrap().unwrap();
        assert!(main.sections[0].page_ids.is_empty());
    }

    #[tokio::test]
    async fn moving_under_a_descendant_is_rejected() {
        let repo = InMemoryRepository::new();
        let d = domain(&repo, "guides", PageType::Hierarchical).await;
        let a = add(&repo, &d, None, "a").await;
        let b = add(&repo, &d, Some(a.id), "b").await;

        let err = update_page(
            &repo,
            a.id,
            UpdatePageRequest { parent_id: Some(b.id), ..Default::default() },
        )
        .await
        .unwrap_err();
        assert!(matches!(&err, ApiError::Validation(msg) if msg.contains("circular reference")));

        let moved = update_page(
            &repo,
            b.id,
            UpdatePageRequest { move_to_root: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
        assert!(moved.parent_id.is_none());
    }

    #[test]
    fn word_count_ignores_markup() {
        assert_eq!(word_count("<p>Hello <b>rich</b> world</p>"), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn word_count_decodes_entities_and_skips_scripts() {
        assert_eq!(
            word_count("<p>Rates below 5 &lt; limit</p><script>var a = 1 < 2;</script>"),
            5
        );
        assert_eq!(word_count("<style>p { color: red }</style><p>Tax&nbsp;rates</p>"), 2);
        assert_eq!(word_count("<p>a < b and c</p>"), 5);
    }
}
