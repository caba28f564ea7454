use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder, types::Json};
use uuid::Uuid;

use super::Repository;
use crate::error::ApiResult;
use crate::models::{
    ContentBlock, CreateBlockRequest, CreateCategoryRequest, CreateDomainRequest, DataTable,
    Domain, DomainCategory, ListFilter, MAIN_PAGE_SLUG, NewPage, NewTable, NewUser, Page,
    PageChanges, RichTextContent, Section, TableChanges, TableMetadata, TableRow,
    UpdateBlockRequest, UpdateCategoryRequest, UpdateDomainRequest, User, UserChanges,
};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, icon, column_position, category_order, is_active, created_at, updated_at";
const DOMAIN_COLUMNS: &str = "id, name, slug, description, page_type, is_published, target_countries, category_id, category_order, created_at, updated_at";
const PAGE_COLUMNS: &str = "id, domain_id, parent_id, title, slug, description, content_type, sections, target_countries, page_order, is_published, created_at, updated_at";
const BLOCK_COLUMNS: &str = "id, page_id, title, content, block_order, created_at, updated_at";
const TABLE_COLUMNS: &str =
    "id, page_id, name, description, schema, data, metadata, settings, created_at, updated_at";
const RICH_TEXT_COLUMNS: &str = "id, page_id, title, html, word_count, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, name, password_hash, is_admin, is_active, last_login_at, created_at, updated_at";

/// Appends the country visibility predicate (`empty OR 'ALL' OR country`) for public lookups.
fn push_visible_in(builder: &mut QueryBuilder<'_, Postgres>, country: &str) {
    builder.push(
        " AND is_published = TRUE AND (cardinality(target_countries) = 0 OR 'ALL' = ANY(target_countries) OR ",
    );
    builder.push_bind(country.to_string());
    builder.push(" = ANY(target_countries))");
}

fn push_domain_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ListFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR slug ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(category_id) = filter.category_id {
        builder.push(" AND category_id = ");
        builder.push_bind(category_id);
    }
}

fn push_page_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ListFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(domain_id) = filter.domain_id {
        builder.push(" AND domain_id = ");
        builder.push_bind(domain_id);
    }
    if let Some(parent_id) = filter.parent_id {
        builder.push(" AND parent_id = ");
        builder.push_bind(parent_id);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR slug ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Database errors propagate as `ApiError`; constraint violations surface as conflicts.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- CATEGORIES ---

    async fn list_categories(&self, active_only: bool) -> ApiResult<Vec<DomainCategory>> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM domain_categories WHERE ($1 = FALSE OR is_active = TRUE) ORDER BY column_position, category_order, name"
        );
        Ok(sqlx::query_as::<_, DomainCategory>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: Uuid) -> ApiResult<Option<DomainCategory>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM domain_categories WHERE id = $1");
        Ok(sqlx::query_as::<_, DomainCategory>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> ApiResult<DomainCategory> {
        let sql = format!(
            r#"INSERT INTO domain_categories (id, name, slug, icon, column_position, category_order, is_active)
               VALUES ($1, $2, $3, $4, $5,
                       COALESCE($6, (SELECT COALESCE(MAX(category_order), -1) + 1 FROM domain_categories WHERE column_position = $5)),
                       $7)
               RETURNING {CATEGORY_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, DomainCategory>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name)
            .bind(req.slug)
            .bind(req.icon)
            .bind(req.column_position)
            .bind(req.category_order)
            .bind(req.is_active.unwrap_or(true))
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> ApiResult<Option<DomainCategory>> {
        let sql = format!(
            r#"UPDATE domain_categories
               SET name = COALESCE($2, name),
                   slug = COALESCE($3, slug),
                   icon = COALESCE($4, icon),
                   column_position = COALESCE($5, column_position),
                   category_order = COALESCE($6, category_order),
                   is_active = COALESCE($7, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {CATEGORY_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, DomainCategory>(&sql)
            .bind(id)
            .bind(req.name)
            .bind(req.slug)
            .bind(req.icon)
            .bind(req.column_position)
            .bind(req.category_order)
            .bind(req.is_active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_category(&self, id: Uuid) -> ApiResult<bool> {
        let res = sqlx::query("DELETE FROM domain_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_category_domains(&self, id: Uuid) -> ApiResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM domains WHERE category_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    // --- DOMAINS ---

    /// Flexible admin listing with QueryBuilder for safe parameterization.
    async fn list_domains(&self, filter: &ListFilter) -> ApiResult<(Vec<Domain>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM domains");
        push_domain_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {DOMAIN_COLUMNS} FROM domains"));
        push_domain_filters(&mut builder, filter);
        builder.push(" ORDER BY name ASC LIMIT ");
        builder.push_bind(filter.limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset);
        let domains = builder
            .build_query_as::<Domain>()
            .fetch_all(&self.pool)
            .await?;

        Ok((domains, total))
    }

    async fn list_published_domains(&self, country: &str) -> ApiResult<Vec<Domain>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE 1 = 1"));
        push_visible_in(&mut builder, country);
        builder.push(" ORDER BY category_order ASC, name ASC");
        Ok(builder
            .build_query_as::<Domain>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_domain(&self, id: Uuid) -> ApiResult<Option<Domain>> {
        let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = $1");
        Ok(sqlx::query_as::<_, Domain>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_domain_by_slug(&self, slug: &str) -> ApiResult<Option<Domain>> {
        let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE slug = $1");
        Ok(sqlx::query_as::<_, Domain>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_domain(&self, req: CreateDomainRequest) -> ApiResult<Domain> {
        let sql = format!(
            r#"INSERT INTO domains (id, name, slug, description, page_type, is_published, target_countries, category_id, category_order)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {DOMAIN_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, Domain>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name)
            .bind(req.slug)
            .bind(req.description)
            .bind(req.page_type.as_str())
            .bind(req.is_published.unwrap_or(false))
            .bind(req.target_countries.unwrap_or_else(|| vec!["ALL".to_string()]))
            .bind(req.category_id)
            .bind(req.category_order.unwrap_or(0))
            .fetch_one(&self.pool)
            .await?)
    }

    /// Partial update using `COALESCE`, only touching columns whose field is `Some`.
    /// `clear_category` resets the category to NULL.
    async fn update_domain(&self, id: Uuid, req: UpdateDomainRequest) -> ApiResult<Option<Domain>> {
        let sql = format!(
            r#"UPDATE domains
               SET name = COALESCE($2, name),
                   slug = COALESCE($3, slug),
                   description = COALESCE($4, description),
                   page_type = COALESCE($5, page_type),
                   is_published = COALESCE($6, is_published),
                   target_countries = COALESCE($7, target_countries),
                   category_id = CASE WHEN $10 THEN NULL ELSE COALESCE($8, category_id) END,
                   category_order = COALESCE($9, category_order),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {DOMAIN_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, Domain>(&sql)
            .bind(id)
            .bind(req.name)
            .bind(req.slug)
            .bind(req.description)
            .bind(req.page_type.map(|p| p.as_str()))
            .bind(req.is_published)
            .bind(req.target_countries)
            .bind(req.category_id)
            .bind(req.category_order)
            .bind(req.clear_category.unwrap_or(false))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_domain(&self, id: Uuid) -> ApiResult<bool> {
        let res = sqlx::query("DELETE FROM domains WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- PAGES ---

    async fn get_page(&self, id: Uuid) -> ApiResult<Option<Page>> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1");
        Ok(sqlx::query_as::<_, Page>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_pages(&self, filter: &ListFilter) -> ApiResult<(Vec<Page>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM pages");
        push_page_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PAGE_COLUMNS} FROM pages"));
        push_page_filters(&mut builder, filter);
        builder.push(" ORDER BY page_order ASC, title ASC LIMIT ");
        builder.push_bind(filter.limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset);
        let pages = builder.build_query_as::<Page>().fetch_all(&self.pool).await?;

        Ok((pages, total))
    }

    async fn list_domain_pages(&self, domain_id: Uuid) -> ApiResult<Vec<Page>> {
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE domain_id = $1 ORDER BY page_order ASC, title ASC"
        );
        Ok(sqlx::query_as::<_, Page>(&sql)
            .bind(domain_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_domain_pages(&self, domain_id: Uuid) -> ApiResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pages WHERE domain_id = $1 AND slug <> $2",
        )
        .bind(domain_id)
        .bind(MAIN_PAGE_SLUG)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_children(&self, parent_id: Uuid, country: Option<&str>) -> ApiResult<Vec<Page>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PAGE_COLUMNS} FROM pages WHERE parent_id = "));
        builder.push_bind(parent_id);
        if let Some(country) = country {
            push_visible_in(&mut builder, country);
        }
        builder.push(" ORDER BY page_order ASC, title ASC");
        Ok(builder.build_query_as::<Page>().fetch_all(&self.pool).await?)
    }

    async fn list_root_pages(&self, domain_id: Uuid, country: Option<&str>) -> ApiResult<Vec<Page>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE parent_id IS NULL AND domain_id = "
        ));
        builder.push_bind(domain_id);
        builder.push(" AND slug <> ");
        builder.push_bind(MAIN_PAGE_SLUG);
        if let Some(country) = country {
            push_visible_in(&mut builder, country);
        }
        builder.push(" ORDER BY page_order ASC, title ASC");
        Ok(builder.build_query_as::<Page>().fetch_all(&self.pool).await?)
    }

    async fn find_main_page(&self, domain_id: Uuid) -> ApiResult<Option<Page>> {
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE domain_id = $1 AND parent_id IS NULL AND slug = $2"
        );
        Ok(sqlx::query_as::<_, Page>(&sql)
            .bind(domain_id)
            .bind(MAIN_PAGE_SLUG)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_pages_by_slugs(
        &self,
        domain_id: Uuid,
        slugs: &[String],
        country: &str,
    ) -> ApiResult<Vec<Page>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PAGE_COLUMNS} FROM pages WHERE domain_id = "));
        builder.push_bind(domain_id);
        builder.push(" AND slug = ANY(");
        builder.push_bind(slugs.to_vec());
        builder.push(")");
        push_visible_in(&mut builder, country);
        Ok(builder.build_query_as::<Page>().fetch_all(&self.pool).await?)
    }

    async fn find_child_page(
        &self,
        domain_id: Uuid,
        parent_id: Option<Uuid>,
        slug: &str,
        country: &str,
    ) -> ApiResult<Option<Page>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PAGE_COLUMNS} FROM pages WHERE domain_id = "));
        builder.push_bind(domain_id);
        builder.push(" AND parent_id IS NOT DISTINCT FROM ");
        builder.push_bind(parent_id);
        builder.push(" AND slug = ");
        builder.push_bind(slug.to_string());
        push_visible_in(&mut builder, country);
        builder.push(" LIMIT 1");
        Ok(builder
            .build_query_as::<Page>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_page(&self, page: NewPage) -> ApiResult<Page> {
        let sql = format!(
            r#"INSERT INTO pages (id, domain_id, parent_id, title, slug, description, content_type, sections, target_countries, page_order, is_published)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING {PAGE_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, Page>(&sql)
            .bind(Uuid::new_v4())
            .bind(page.domain_id)
            .bind(page.parent_id)
            .bind(page.title)
            .bind(page.slug)
            .bind(page.description)
            .bind(page.content_type.as_str())
            .bind(Json(page.sections))
            .bind(page.target_countries)
            .bind(page.page_order)
            .bind(page.is_published)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_page(&self, id: Uuid, changes: PageChanges) -> ApiResult<Option<Page>> {
        let sql = format!(
            r#"UPDATE pages
               SET title = COALESCE($2, title),
                   slug = COALESCE($3, slug),
                   description = COALESCE($4, description),
                   content_type = COALESCE($5, content_type),
                   target_countries = COALESCE($6, target_countries),
                   page_order = COALESCE($7, page_order),
                   is_published = COALESCE($8, is_published),
                   parent_id = CASE WHEN $9 THEN $10 ELSE parent_id END,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {PAGE_COLUMNS}"#
        );
        let move_requested = changes.parent_id.is_some();
        Ok(sqlx::query_as::<_, Page>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.slug)
            .bind(changes.description)
            .bind(changes.content_type.map(|c| c.as_str()))
            .bind(changes.target_countries)
            .bind(changes.page_order)
            .bind(changes.is_published)
            .bind(move_requested)
            .bind(changes.parent_id.flatten())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_page_sections(&self, id: Uuid, sections: Vec<Section>) -> ApiResult<Option<Page>> {
        let sql = format!(
            "UPDATE pages SET sections = $2, updated_at = NOW() WHERE id = $1 RETURNING {PAGE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Page>(&sql)
            .bind(id)
            .bind(Json(sections))
            .fetch_optional(&self.pool)
            .await?)
    }

    /// One transaction: content of the whole subtree first, then pages in caller order
    /// (deepest-first) so the parent reference never dangles.
    async fn delete_pages(&self, ids: &[Uuid]) -> ApiResult<u64> {
        let ids = ids.to_vec();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM content_blocks WHERE page_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM rich_text_contents WHERE page_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM data_tables WHERE page_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        let mut deleted = 0;
        for id in &ids {
            deleted += sqlx::query("DELETE FROM pages WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }

    // --- CONTENT BLOCKS ---

    async fn list_blocks(&self, page_id: Uuid) -> ApiResult<Vec<ContentBlock>> {
        let sql = format!(
            "SELECT {BLOCK_COLUMNS} FROM content_blocks WHERE page_id = $1 ORDER BY block_order ASC, created_at ASC"
        );
        Ok(sqlx::query_as::<_, ContentBlock>(&sql)
            .bind(page_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_block(&self, id: Uuid) -> ApiResult<Option<ContentBlock>> {
        let sql = format!("SELECT {BLOCK_COLUMNS} FROM content_blocks WHERE id = $1");
        Ok(sqlx::query_as::<_, ContentBlock>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_block(&self, page_id: Uuid, req: CreateBlockRequest) -> ApiResult<ContentBlock> {
        let sql = format!(
            r#"INSERT INTO content_blocks (id, page_id, title, content, block_order)
               VALUES ($1, $2, $3, $4,
                       COALESCE($5, (SELECT COALESCE(MAX(block_order), -1) + 1 FROM content_blocks WHERE page_id = $2)))
               RETURNING {BLOCK_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, ContentBlock>(&sql)
            .bind(Uuid::new_v4())
            .bind(page_id)
            .bind(req.title)
            .bind(req.content)
            .bind(req.block_order)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_block(&self, id: Uuid, req: UpdateBlockRequest) -> ApiResult<Option<ContentBlock>> {
        let sql = format!(
            r#"UPDATE content_blocks
               SET title = COALESCE($2, title),
                   content = COALESCE($3, content),
                   block_order = COALESCE($4, block_order),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {BLOCK_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, ContentBlock>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.content)
            .bind(req.block_order)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_block(&self, id: Uuid) -> ApiResult<bool> {
        let res = sqlx::query("DELETE FROM content_blocks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- TABLES ---

    async fn get_table(&self, id: Uuid) -> ApiResult<Option<DataTable>> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM data_tables WHERE id = $1");
        Ok(sqlx::query_as::<_, DataTable>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_table_by_page(&self, page_id: Uuid) -> ApiResult<Option<DataTable>> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM data_tables WHERE page_id = $1");
        Ok(sqlx::query_as::<_, DataTable>(&sql)
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_table(&self, table: NewTable) -> ApiResult<DataTable> {
        let sql = format!(
            r#"INSERT INTO data_tables (id, page_id, name, description, schema, data, metadata, settings)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {TABLE_COLUMNS}"#
        );
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, DataTable>(&sql)
            .bind(Uuid::new_v4())
            .bind(table.page_id)
            .bind(table.name)
            .bind(table.description)
            .bind(Json(table.schema))
            .bind(Json(table.data))
            .bind(Json(table.metadata))
            .bind(Json(table.settings))
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE pages SET content_type = 'table', updated_at = NOW() WHERE id = $1")
            .bind(table.page_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_table(&self, id: Uuid, changes: TableChanges) -> ApiResult<Option<DataTable>> {
        let sql = format!(
            r#"UPDATE data_tables
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   schema = COALESCE($4, schema),
                   settings = COALESCE($5, settings),
                   data = COALESCE($6, data),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {TABLE_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, DataTable>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.description)
            .bind(changes.schema.map(Json))
            .bind(changes.settings.map(Json))
            .bind(changes.data.map(Json))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn replace_table_data(
        &self,
        id: Uuid,
        rows: Vec<TableRow>,
        metadata: TableMetadata,
    ) -> ApiResult<Option<DataTable>> {
        let sql = format!(
            "UPDATE data_tables SET data = $2, metadata = $3, updated_at = NOW() WHERE id = $1 RETURNING {TABLE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, DataTable>(&sql)
            .bind(id)
            .bind(Json(rows))
            .bind(Json(metadata))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_table(&self, id: Uuid) -> ApiResult<bool> {
        let res = sqlx::query("DELETE FROM data_tables WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- RICH TEXT ---

    async fn get_rich_text(&self, page_id: Uuid) -> ApiResult<Option<RichTextContent>> {
        let sql = format!("SELECT {RICH_TEXT_COLUMNS} FROM rich_text_contents WHERE page_id = $1");
        Ok(sqlx::query_as::<_, RichTextContent>(&sql)
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn upsert_rich_text(
        &self,
        page_id: Uuid,
        title: Option<String>,
        html: String,
        word_count: i32,
    ) -> ApiResult<RichTextContent> {
        let sql = format!(
            r#"INSERT INTO rich_text_contents (id, page_id, title, html, word_count)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (page_id) DO UPDATE
               SET title = EXCLUDED.title,
                   html = EXCLUDED.html,
                   word_count = EXCLUDED.word_count,
                   updated_at = NOW()
               RETURNING {RICH_TEXT_COLUMNS}"#
        );
        let mut tx = self.pool.begin().await?;

        let saved = sqlx::query_as::<_, RichTextContent>(&sql)
            .bind(Uuid::new_v4())
            .bind(page_id)
            .bind(title)
            .bind(html)
            .bind(word_count)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE pages SET content_type = 'rich_text', updated_at = NOW() WHERE id = $1")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_rich_text(&self, page_id: Uuid) -> ApiResult<bool> {
        let res = sqlx::query("DELETE FROM rich_text_contents WHERE page_id = $1")
            .bind(page_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- USERS ---

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> ApiResult<User> {
        let sql = format!(
            r#"INSERT INTO users (id, email, name, password_hash, is_admin, is_active)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {USER_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.email)
            .bind(user.name)
            .bind(user.password_hash)
            .bind(user.is_admin)
            .bind(user.is_active)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> ApiResult<Option<User>> {
        let sql = format!(
            r#"UPDATE users
               SET name = COALESCE($2, name),
                   password_hash = COALESCE($3, password_hash),
                   is_admin = COALESCE($4, is_admin),
                   is_active = COALESCE($5, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.password_hash)
            .bind(changes.is_admin)
            .bind(changes.is_active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: Uuid) -> ApiResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn record_login(&self, id: Uuid) -> ApiResult<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
