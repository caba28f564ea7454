use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::Repository;
use crate::country::{ALL_COUNTRIES, is_visible};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ContentBlock, ContentType, CreateBlockRequest, CreateCategoryRequest, CreateDomainRequest,
    DataTable, Domain, DomainCategory, ListFilter, MAIN_PAGE_SLUG, NewPage, NewTable, NewUser,
    Page, PageChanges, RichTextContent, Section, TableChanges, TableMetadata, TableRow,
    UpdateBlockRequest, UpdateCategoryRequest, UpdateDomainRequest, User, UserChanges,
};

#[derive(Default)]
struct Store {
    categories: HashMap<Uuid, DomainCategory>,
    domains: HashMap<Uuid, Domain>,
    pages: HashMap<Uuid, Page>,
    blocks: HashMap<Uuid, ContentBlock>,
    tables: HashMap<Uuid, DataTable>,
    rich_texts: HashMap<Uuid, RichTextContent>,
    users: HashMap<Uuid, User>,
}

impl Store {
    fn slug_taken(&self, domain_id: Uuid, parent_id: Option<Uuid>, slug: &str, except: Option<Uuid>) -> bool {
        self.pages.values().any(|p| {
            p.domain_id == domain_id
                && p.parent_id == parent_id
                && p.slug == slug
                && Some(p.id) != except
        })
    }

    fn remove_page_content(&mut self, page_id: Uuid) {
        self.blocks.retain(|_, b| b.page_id != page_id);
        self.tables.retain(|_, t| t.page_id != page_id);
        self.rich_texts.retain(|_, r| r.page_id != page_id);
    }
}

fn publicly_visible(page: &Page, country: &str) -> bool {
    page.is_published && is_visible(&page.target_countries, country)
}

fn by_page_order(pages: &mut [Page]) {
    pages.sort_by(|a, b| a.page_order.cmp(&b.page_order).then_with(|| a.title.cmp(&b.title)));
}

fn matches_search(haystacks: &[&str], search: &Option<String>) -> bool {
    match search {
        Some(term) => {
            let term = term.to_lowercase();
            haystacks.iter().any(|h| h.to_lowercase().contains(&term))
        }
        None => true,
    }
}

fn paginate<T>(items: Vec<T>, filter: &ListFilter) -> Vec<T> {
    items
        .into_iter()
        .skip(filter.offset.max(0) as usize)
        .take(filter.limit.max(0) as usize)
        .collect()
}

fn conflict(what: &str) -> ApiError {
    ApiError::Conflict(format!("{} already exists", what))
}

/// InMemoryRepository
///
/// Process-local implementation of `Repository` used by tests and local tooling. Mirrors the
/// Postgres constraints (unique slugs, restricted deletes) so services see the same errors.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> ApiResult<RwLockReadGuard<'_, Store>> {
        self.store
            .read()
            .map_err(|_| ApiError::Internal("in-memory store poisoned".to_string()))
    }

    fn write(&self) -> ApiResult<RwLockWriteGuard<'_, Store>> {
        self.store
            .write()
            .map_err(|_| ApiError::Internal("in-memory store poisoned".to_string()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- CATEGORIES ---

    async fn list_categories(&self, active_only: bool) -> ApiResult<Vec<DomainCategory>> {
        let store = self.read()?;
        let mut categories: Vec<DomainCategory> = store
            .categories
            .values()
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            (a.column_position, a.category_order, &a.name).cmp(&(b.column_position, b.category_order, &b.name))
        });
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> ApiResult<Option<DomainCategory>> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> ApiResult<DomainCategory> {
        let mut store = self.write()?;
        if store.categories.values().any(|c| c.slug == req.slug) {
            return Err(conflict("Category slug"));
        }
        let next_order = store
            .categories
            .values()
            .filter(|c| c.column_position == req.column_position)
            .map(|c| c.category_order + 1)
            .max()
            .unwrap_or(0);
        let now = Utc::now();
        let category = DomainCategory {
            id: Uuid::new_v4(),
            name: req.name,
            slug: req.slug,
            icon: req.icon,
            column_position: req.column_position,
            category_order: req.category_order.unwrap_or(next_order),
            is_active: req.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        store.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> ApiResult<Option<DomainCategory>> {
        let mut store = self.write()?;
        if let Some(slug) = &req.slug {
            if store.categories.values().any(|c| &c.slug == slug && c.id != id) {
                return Err(conflict("Category slug"));
            }
        }
        let Some(category) = store.categories.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            category.name = name;
        }
        if let Some(slug) = req.slug {
            category.slug = slug;
        }
        if let Some(icon) = req.icon {
            category.icon = Some(icon);
        }
        if let Some(column) = req.column_position {
            category.column_position = column;
        }
        if let Some(order) = req.category_order {
            category.category_order = order;
        }
        if let Some(active) = req.is_active {
            category.is_active = active;
        }
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: Uuid) -> ApiResult<bool> {
        let mut store = self.write()?;
        if store.domains.values().any(|d| d.category_id == Some(id)) {
            return Err(ApiError::Conflict(
                "Category is still referenced by domains".to_string(),
            ));
        }
        Ok(store.categories.remove(&id).is_some())
    }

    async fn count_category_domains(&self, id: Uuid) -> ApiResult<i64> {
        let store = self.read()?;
        Ok(store.domains.values().filter(|d| d.category_id == Some(id)).count() as i64)
    }

    // --- DOMAINS ---

    async fn list_domains(&self, filter: &ListFilter) -> ApiResult<(Vec<Domain>, i64)> {
        let store = self.read()?;
        let mut domains: Vec<Domain> = store
            .domains
            .values()
            .filter(|d| matches_search(&[&d.name, &d.slug], &filter.search))
            .filter(|d| filter.category_id.is_none() || d.category_id == filter.category_id)
            .cloned()
            .collect();
        domains.sort_by(|a, b| a.name.cmp(&b.name));
        let total = domains.len() as i64;
        Ok((paginate(domains, filter), total))
    }

    async fn list_published_domains(&self, country: &str) -> ApiResult<Vec<Domain>> {
        let store = self.read()?;
        let mut domains: Vec<Domain> = store
            .domains
            .values()
            .filter(|d| d.is_published && is_visible(&d.target_countries, country))
            .cloned()
            .collect();
        domains.sort_by(|a, b| (a.category_order, &a.name).cmp(&(b.category_order, &b.name)));
        Ok(domains)
    }

    async fn get_domain(&self, id: Uuid) -> ApiResult<Option<Domain>> {
        Ok(self.read()?.domains.get(&id).cloned())
    }

    async fn get_domain_by_slug(&self, slug: &str) -> ApiResult<Option<Domain>> {
        Ok(self.read()?.domains.values().find(|d| d.slug == slug).cloned())
    }

    async fn create_domain(&self, req: CreateDomainRequest) -> ApiResult<Domain> {
        let mut store = self.write()?;
        if store.domains.values().any(|d| d.slug == req.slug) {
            return Err(conflict("Domain slug"));
        }
        if let Some(category_id) = req.category_id {
            if !store.categories.contains_key(&category_id) {
                return Err(ApiError::Conflict("Referenced category does not exist".to_string()));
            }
        }
        let now = Utc::now();
        let domain = Domain {
            id: Uuid::new_v4(),
            name: req.name,
            slug: req.slug,
            description: req.description,
            page_type: req.page_type,
            is_published: req.is_published.unwrap_or(false),
            target_countries: req
                .target_countries
                .unwrap_or_else(|| vec![ALL_COUNTRIES.to_string()]),
            category_id: req.category_id,
            category_order: req.category_order.unwrap_or(0),
            created_at: now,
            updated_at: now,
        };
        store.domains.insert(domain.id, domain.clone());
        Ok(domain)
    }

    async fn update_domain(&self, id: Uuid, req: UpdateDomainRequest) -> ApiResult<Option<Domain>> {
        let mut store = self.write()?;
        if let Some(slug) = &req.slug {
            if store.domains.values().any(|d| &d.slug == slug && d.id != id) {
                return Err(conflict("Domain slug"));
            }
        }
        if let Some(category_id) = req.category_id {
            if !store.categories.contains_key(&category_id) {
                return Err(ApiError::Conflict("Referenced category does not exist".to_string()));
            }
        }
        let Some(domain) = store.domains.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            domain.name = name;
        }
        if let Some(slug) = req.slug {
            domain.slug = slug;
        }
        if let Some(description) = req.description {
            domain.description = Some(description);
        }
        if let Some(page_type) = req.page_type {
            domain.page_type = page_type;
        }
        if let Some(published) = req.is_published {
            domain.is_published = published;
        }
        if let Some(countries) = req.target_countries {
            domain.target_countries = countries;
        }
        if req.clear_category.unwrap_or(false) {
            domain.category_id = None;
        } else if let Some(category_id) = req.category_id {
            domain.category_id = Some(category_id);
        }
        if let Some(order) = req.category_order {
            domain.category_order = order;
        }
        domain.updated_at = Utc::now();
        Ok(Some(domain.clone()))
    }

    async fn delete_domain(&self, id: Uuid) -> ApiResult<bool> {
        let mut store = self.write()?;
        if store.domains.remove(&id).is_none() {
            return Ok(false);
        }
        let page_ids: Vec<Uuid> = store
            .pages
            .values()
            .filter(|p| p.domain_id == id)
            .map(|p| p.id)
            .collect();
        for page_id in page_ids {
            store.remove_page_content(page_id);
            store.pages.remove(&page_id);
        }
        Ok(true)
    }

    // --- PAGES ---

    async fn get_page(&self, id: Uuid) -> ApiResult<Option<Page>> {
        Ok(self.read()?.pages.get(&id).cloned())
    }

    async fn list_pages(&self, filter: &ListFilter) -> ApiResult<(Vec<Page>, i64)> {
        let store = self.read()?;
        let mut pages: Vec<Page> = store
            .pages
            .values()
            .filter(|p| filter.domain_id.is_none() || Some(p.domain_id) == filter.domain_id)
            .filter(|p| filter.parent_id.is_none() || p.parent_id == filter.parent_id)
            .filter(|p| matches_search(&[&p.title, &p.slug], &filter.search))
            .cloned()
            .collect();
        by_page_order(&mut pages);
        let total = pages.len() as i64;
        Ok((paginate(pages, filter), total))
    }

    async fn list_domain_pages(&self, domain_id: Uuid) -> ApiResult<Vec<Page>> {
        let store = self.read()?;
        let mut pages: Vec<Page> = store
            .pages
            .values()
            .filter(|p| p.domain_id == domain_id)
            .cloned()
            .collect();
        by_page_order(&mut pages);
        Ok(pages)
    }

    async fn count_domain_pages(&self, domain_id: Uuid) -> ApiResult<i64> {
        let store = self.read()?;
        Ok(store
            .pages
            .values()
            .filter(|p| p.domain_id == domain_id && !p.is_main())
            .count() as i64)
    }

    async fn list_children(&self, parent_id: Uuid, country: Option<&str>) -> ApiResult<Vec<Page>> {
        let store = self.read()?;
        let mut pages: Vec<Page> = store
            .pages
            .values()
            .filter(|p| p.parent_id == Some(parent_id))
            .filter(|p| country.is_none_or(|c| publicly_visible(p, c)))
            .cloned()
            .collect();
        by_page_order(&mut pages);
        Ok(pages)
    }

    async fn list_root_pages(&self, domain_id: Uuid, country: Option<&str>) -> ApiResult<Vec<Page>> {
        let store = self.read()?;
        let mut pages: Vec<Page> = store
            .pages
            .values()
            .filter(|p| p.domain_id == domain_id && p.parent_id.is_none() && !p.is_main())
            .filter(|p| country.is_none_or(|c| publicly_visible(p, c)))
            .cloned()
            .collect();
        by_page_order(&mut pages);
        Ok(pages)
    }

    async fn find_main_page(&self, domain_id: Uuid) -> ApiResult<Option<Page>> {
        let store = self.read()?;
        Ok(store
            .pages
            .values()
            .find(|p| p.domain_id == domain_id && p.parent_id.is_none() && p.slug == MAIN_PAGE_SLUG)
            .cloned())
    }

    async fn find_pages_by_slugs(
        &self,
        domain_id: Uuid,
        slugs: &[String],
        country: &str,
    ) -> ApiResult<Vec<Page>> {
        let store = self.read()?;
        Ok(store
            .pages
            .values()
            .filter(|p| p.domain_id == domain_id && slugs.contains(&p.slug))
            .filter(|p| publicly_visible(p, country))
            .cloned()
            .collect())
    }

    async fn find_child_page(
        &self,
        domain_id: Uuid,
        parent_id: Option<Uuid>,
        slug: &str,
        country: &str,
    ) -> ApiResult<Option<Page>> {
        let store = self.read()?;
        Ok(store
            .pages
            .values()
            .find(|p| {
                p.domain_id == domain_id
                    && p.parent_id == parent_id
                    && p.slug == slug
                    && publicly_visible(p, country)
            })
            .cloned())
    }

    async fn create_page(&self, page: NewPage) -> ApiResult<Page> {
        let mut store = self.write()?;
        if !store.domains.contains_key(&page.domain_id) {
            return Err(ApiError::Conflict("Referenced domain does not exist".to_string()));
        }
        if let Some(parent_id) = page.parent_id {
            if !store.pages.contains_key(&parent_id) {
                return Err(ApiError::Conflict("Referenced parent page does not exist".to_string()));
            }
        }
        if store.slug_taken(page.domain_id, page.parent_id, &page.slug, None) {
            return Err(conflict("Page slug"));
        }
        let now = Utc::now();
        let created = Page {
            id: Uuid::new_v4(),
            domain_id: page.domain_id,
            parent_id: page.parent_id,
            title: page.title,
            slug: page.slug,
            description: page.description,
            content_type: page.content_type,
            sections: page.sections,
            target_countries: page.target_countries,
            page_order: page.page_order,
            is_published: page.is_published,
            created_at: now,
            updated_at: now,
        };
        store.pages.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_page(&self, id: Uuid, changes: PageChanges) -> ApiResult<Option<Page>> {
        let mut store = self.write()?;
        let Some(current) = store.pages.get(&id).cloned() else {
            return Ok(None);
        };
        let parent_id = changes.parent_id.unwrap_or(current.parent_id);
        let slug = changes.slug.clone().unwrap_or_else(|| current.slug.clone());
        if store.slug_taken(current.domain_id, parent_id, &slug, Some(id)) {
            return Err(conflict("Page slug"));
        }

        let Some(page) = store.pages.get_mut(&id) else {
            return Ok(None);
        };
        page.parent_id = parent_id;
        page.slug = slug;
        if let Some(title) = changes.title {
            page.title = title;
        }
        if let Some(description) = changes.description {
            page.description = Some(description);
        }
        if let Some(content_type) = changes.content_type {
            page.content_type = content_type;
        }
        if let Some(countries) = changes.target_countries {
            page.target_countries = countries;
        }
        if let Some(order) = changes.page_order {
            page.page_order = order;
        }
        if let Some(published) = changes.is_published {
            page.is_published = published;
        }
        page.updated_at = Utc::now();
        Ok(Some(page.clone()))
    }

    async fn update_page_sections(&self, id: Uuid, sections: Vec<Section>) -> ApiResult<Option<Page>> {
        let mut store = self.write()?;
        let Some(page) = store.pages.get_mut(&id) else {
            return Ok(None);
        };
        page.sections = sections;
        page.updated_at = Utc::now();
        Ok(Some(page.clone()))
    }

    async fn delete_pages(&self, ids: &[Uuid]) -> ApiResult<u64> {
        let mut store = self.write()?;

        // Emulate the parent FK: a page may only go once no surviving page points at it.
        let doomed: std::collections::HashSet<Uuid> = ids.iter().copied().collect();
        let orphaning = store
            .pages
            .values()
            .any(|p| !doomed.contains(&p.id) && p.parent_id.is_some_and(|pid| doomed.contains(&pid)));
        if orphaning {
            return Err(ApiError::Conflict(
                "Page is still referenced by child pages".to_string(),
            ));
        }

        let mut deleted = 0;
        for id in ids {
            store.remove_page_content(*id);
            if store.pages.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    // --- CONTENT BLOCKS ---

    async fn list_blocks(&self, page_id: Uuid) -> ApiResult<Vec<ContentBlock>> {
        let store = self.read()?;
        let mut blocks: Vec<ContentBlock> = store
            .blocks
            .values()
            .filter(|b| b.page_id == page_id)
            .cloned()
            .collect();
        blocks.sort_by(|a, b| (a.block_order, a.created_at).cmp(&(b.block_order, b.created_at)));
        Ok(blocks)
    }

    async fn get_block(&self, id: Uuid) -> ApiResult<Option<ContentBlock>> {
        Ok(self.read()?.blocks.get(&id).cloned())
    }

    async fn create_block(&self, page_id: Uuid, req: CreateBlockRequest) -> ApiResult<ContentBlock> {
        let mut store = self.write()?;
        if !store.pages.contains_key(&page_id) {
            return Err(ApiError::Conflict("Referenced page does not exist".to_string()));
        }
        let next_order = store
            .blocks
            .values()
            .filter(|b| b.page_id == page_id)
            .map(|b| b.block_order + 1)
            .max()
            .unwrap_or(0);
        let now = Utc::now();
        let block = ContentBlock {
            id: Uuid::new_v4(),
            page_id,
            title: req.title,
            content: req.content,
            block_order: req.block_order.unwrap_or(next_order),
            created_at: now,
            updated_at: now,
        };
        store.blocks.insert(block.id, block.clone());
        Ok(block)
    }

    async fn update_block(&self, id: Uuid, req: UpdateBlockRequest) -> ApiResult<Option<ContentBlock>> {
        let mut store = self.write()?;
        let Some(block) = store.blocks.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            block.title = Some(title);
        }
        if let Some(content) = req.content {
            block.content = content;
        }
        if let Some(order) = req.block_order {
            block.block_order = order;
        }
        block.updated_at = Utc::now();
        Ok(Some(block.clone()))
    }

    async fn delete_block(&self, id: Uuid) -> ApiResult<bool> {
        Ok(self.write()?.blocks.remove(&id).is_some())
    }

    // --- TABLES ---

    async fn get_table(&self, id: Uuid) -> ApiResult<Option<DataTable>> {
        Ok(self.read()?.tables.get(&id).cloned())
    }

    async fn get_table_by_page(&self, page_id: Uuid) -> ApiResult<Option<DataTable>> {
        Ok(self.read()?.tables.values().find(|t| t.page_id == page_id).cloned())
    }

    async fn create_table(&self, table: NewTable) -> ApiResult<DataTable> {
        let mut store = self.write()?;
        if store.tables.values().any(|t| t.page_id == table.page_id) {
            return Err(conflict("Table for this page"));
        }
        let Some(page) = store.pages.get_mut(&table.page_id) else {
            return Err(ApiError::Conflict("Referenced page does not exist".to_string()));
        };
        let now = Utc::now();
        page.content_type = ContentType::Table;
        page.updated_at = now;

        let created = DataTable {
            id: Uuid::new_v4(),
            page_id: table.page_id,
            name: table.name,
            description: table.description,
            schema: table.schema,
            data: table.data,
            metadata: table.metadata,
            settings: table.settings,
            created_at: now,
            updated_at: now,
        };
        store.tables.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_table(&self, id: Uuid, changes: TableChanges) -> ApiResult<Option<DataTable>> {
        let mut store = self.write()?;
        let Some(table) = store.tables.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            table.name = name;
        }
        if let Some(description) = changes.description {
            table.description = Some(description);
        }
        if let Some(schema) = changes.schema {
            table.schema = schema;
        }
        if let Some(settings) = changes.settings {
            table.settings = settings;
        }
        if let Some(data) = changes.data {
            table.data = data;
        }
        table.updated_at = Utc::now();
        Ok(Some(table.clone()))
    }

    async fn replace_table_data(
        &self,
        id: Uuid,
        rows: Vec<TableRow>,
        metadata: TableMetadata,
    ) -> ApiResult<Option<DataTable>> {
        let mut store = self.write()?;
        let Some(table) = store.tables.get_mut(&id) else {
            return Ok(None);
        };
        table.data = rows;
        table.metadata = metadata;
        table.updated_at = Utc::now();
        Ok(Some(table.clone()))
    }

    async fn delete_table(&self, id: Uuid) -> ApiResult<bool> {
        Ok(self.write()?.tables.remove(&id).is_some())
    }

    // --- RICH TEXT ---

    async fn get_rich_text(&self, page_id: Uuid) -> ApiResult<Option<RichTextContent>> {
        Ok(self
            .read()?
            .rich_texts
            .values()
            .find(|r| r.page_id == page_id)
            .cloned())
    }

    async fn upsert_rich_text(
        &self,
        page_id: Uuid,
        title: Option<String>,
        html: String,
        word_count: i32,
    ) -> ApiResult<RichTextContent> {
        let mut store = self.write()?;
        let now = Utc::now();
        let Some(page) = store.pages.get_mut(&page_id) else {
            return Err(ApiError::Conflict("Referenced page does not exist".to_string()));
        };
        page.content_type = ContentType::RichText;
        page.updated_at = now;

        let existing = store.rich_texts.values().find(|r| r.page_id == page_id).cloned();
        let saved = match existing {
            Some(current) => RichTextContent {
                title,
                html,
                word_count,
                updated_at: now,
                ..current
            },
            None => RichTextContent {
                id: Uuid::new_v4(),
                page_id,
                title,
                html,
                word_count,
                created_at: now,
                updated_at: now,
            },
        };
        store.rich_texts.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete_rich_text(&self, page_id: Uuid) -> ApiResult<bool> {
        let mut store = self.write()?;
        let before = store.rich_texts.len();
        store.rich_texts.retain(|_, r| r.page_id != page_id);
        Ok(store.rich_texts.len() < before)
    }

    // --- USERS ---

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        let store = self.read()?;
        let mut users: Vec<User> = store.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> ApiResult<User> {
        let mut store = self.write()?;
        if store.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(conflict("User email"));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            is_active: user.is_active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        store.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> ApiResult<Option<User>> {
        let mut store = self.write()?;
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = Some(name);
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(admin) = changes.is_admin {
            user.is_admin = admin;
        }
        if let Some(active) = changes.is_active {
            user.is_active = active;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> ApiResult<bool> {
        Ok(self.write()?.users.remove(&id).is_some())
    }

    async fn record_login(&self, id: Uuid) -> ApiResult<()> {
        if let Some(user) = self.write()?.users.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}
