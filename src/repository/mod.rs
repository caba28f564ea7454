use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{
    ContentBlock, CreateBlockRequest, CreateCategoryRequest, CreateDomainRequest, DataTable,
    Domain, DomainCategory, ListFilter, NewPage, NewTable, NewUser, Page, PageChanges,
    RichTextContent, Section, TableChanges, TableMetadata, TableRow, UpdateBlockRequest,
    UpdateCategoryRequest, UpdateDomainRequest, User, UserChanges,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// Abstract contract for every persistence operation. Handlers and services only see this trait,
/// so the Postgres implementation can be swapped for the in-memory one in tests.
///
/// Country-filtered lookups take the requester's country and apply the visibility predicate
/// (`empty OR 'ALL' OR country`) at the storage level.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Categories ---
    async fn list_categories(&self, active_only: bool) -> ApiResult<Vec<DomainCategory>>;
    async fn get_category(&self, id: Uuid) -> ApiResult<Option<DomainCategory>>;
    async fn create_category(&self, req: CreateCategoryRequest) -> ApiResult<DomainCategory>;
    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> ApiResult<Option<DomainCategory>>;
    async fn delete_category(&self, id: Uuid) -> ApiResult<bool>;
    async fn count_category_domains(&self, id: Uuid) -> ApiResult<i64>;

    // --- Domains ---
    /// Admin listing: every domain, filtered by search/category, paginated. Returns the total too.
    async fn list_domains(&self, filter: &ListFilter) -> ApiResult<(Vec<Domain>, i64)>;
    /// Published domains visible in `country`, ordered by category position.
    async fn list_published_domains(&self, country: &str) -> ApiResult<Vec<Domain>>;
    async fn get_domain(&self, id: Uuid) -> ApiResult<Option<Domain>>;
    async fn get_domain_by_slug(&self, slug: &str) -> ApiResult<Option<Domain>>;
    /// Expects `target_countries` already normalized.
    async fn create_domain(&self, req: CreateDomainRequest) -> ApiResult<Domain>;
    async fn update_domain(&self, id: Uuid, req: UpdateDomainRequest) -> ApiResult<Option<Domain>>;
    /// Cascades to the domain's pages and their content.
    async fn delete_domain(&self, id: Uuid) -> ApiResult<bool>;

    // --- Pages ---
    async fn get_page(&self, id: Uuid) -> ApiResult<Option<Page>>;
    async fn list_pages(&self, filter: &ListFilter) -> ApiResult<(Vec<Page>, i64)>;
    /// Every page of a domain, unfiltered. Used to build the in-memory tree.
    async fn list_domain_pages(&self, domain_id: Uuid) -> ApiResult<Vec<Page>>;
    async fn count_domain_pages(&self, domain_id: Uuid) -> ApiResult<i64>;
    /// Children ordered by `page_order`; `country = None` skips the visibility filter.
    async fn list_children(&self, parent_id: Uuid, country: Option<&str>) -> ApiResult<Vec<Page>>;
    /// Parentless pages of a domain other than `__main__`.
    async fn list_root_pages(&self, domain_id: Uuid, country: Option<&str>) -> ApiResult<Vec<Page>>;
    async fn find_main_page(&self, domain_id: Uuid) -> ApiResult<Option<Page>>;
    /// All visible pages of the domain whose slug is in `slugs`, in one query.
    async fn find_pages_by_slugs(
        &self,
        domain_id: Uuid,
        slugs: &[String],
        country: &str,
    ) -> ApiResult<Vec<Page>>;
    async fn find_child_page(
        &self,
        domain_id: Uuid,
        parent_id: Option<Uuid>,
        slug: &str,
        country: &str,
    ) -> ApiResult<Option<Page>>;
    async fn create_page(&self, page: NewPage) -> ApiResult<Page>;
    async fn update_page(&self, id: Uuid, changes: PageChanges) -> ApiResult<Option<Page>>;
    async fn update_page_sections(&self, id: Uuid, sections: Vec<Section>) -> ApiResult<Option<Page>>;
    /// Atomically removes the content of every listed page, then the pages themselves in the
    /// given order (callers pass descendants deepest-first). Returns the number of pages removed.
    async fn delete_pages(&self, ids: &[Uuid]) -> ApiResult<u64>;

    // --- Content blocks ---
    async fn list_blocks(&self, page_id: Uuid) -> ApiResult<Vec<ContentBlock>>;
    async fn get_block(&self, id: Uuid) -> ApiResult<Option<ContentBlock>>;
    async fn create_block(&self, page_id: Uuid, req: CreateBlockRequest) -> ApiResult<ContentBlock>;
    async fn update_block(&self, id: Uuid, req: UpdateBlockRequest) -> ApiResult<Option<ContentBlock>>;
    async fn delete_block(&self, id: Uuid) -> ApiResult<bool>;

    // --- Tables ---
    async fn get_table(&self, id: Uuid) -> ApiResult<Option<DataTable>>;
    async fn get_table_by_page(&self, page_id: Uuid) -> ApiResult<Option<DataTable>>;
    /// Inserts the table and flips its page's content type to `table` as one unit.
    async fn create_table(&self, table: NewTable) -> ApiResult<DataTable>;
    async fn update_table(&self, id: Uuid, changes: TableChanges) -> ApiResult<Option<DataTable>>;
    async fn replace_table_data(
        &self,
        id: Uuid,
        rows: Vec<TableRow>,
        metadata: TableMetadata,
    ) -> ApiResult<Option<DataTable>>;
    async fn delete_table(&self, id: Uuid) -> ApiResult<bool>;

    // --- Rich text ---
    async fn get_rich_text(&self, page_id: Uuid) -> ApiResult<Option<RichTextContent>>;
    /// Creates or replaces the page's document and marks the page as `rich_text`.
    async fn upsert_rich_text(
        &self,
        page_id: Uuid,
        title: Option<String>,
        html: String,
        word_count: i32,
    ) -> ApiResult<RichTextContent>;
    async fn delete_rich_text(&self, page_id: Uuid) -> ApiResult<bool>;

    // --- Users ---
    async fn list_users(&self) -> ApiResult<Vec<User>>;
    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> ApiResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> ApiResult<User>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> ApiResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> ApiResult<bool>;
    async fn record_login(&self, id: Uuid) -> ApiResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
