use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::country::{ALL_COUNTRIES, RESERVED_COUNTRY_COLUMN};

/// Slug of the synthetic root page every domain owns.
pub const MAIN_PAGE_SLUG: &str = "__main__";

/// Lower-case words separated by single hyphens.
pub static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("static slug regex"));

/// A single row of table data, keyed by column id.
pub type TableRow = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// --- Enumerations ---

/// How a domain lays out its page tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PageType {
    /// One synthetic `__main__` root page; user pages hang below it.
    #[default]
    Direct,
    /// Several real top-level pages.
    Hierarchical,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Direct => "direct",
            PageType::Hierarchical => "hierarchical",
        }
    }
}

impl TryFrom<String> for PageType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "direct" => Ok(PageType::Direct),
            "hierarchical" => Ok(PageType::Hierarchical),
            _ => Err(UnknownVariant { kind: "page type", value }),
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ContentType {
    #[default]
    Narrative,
    SectionBased,
    SubcategoryList,
    Table,
    RichText,
    MixedContent,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Narrative => "narrative",
            ContentType::SectionBased => "section_based",
            ContentType::SubcategoryList => "subcategory_list",
            ContentType::Table => "table",
            ContentType::RichText => "rich_text",
            ContentType::MixedContent => "mixed_content",
        }
    }
}

impl TryFrom<String> for ContentType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "narrative" => Ok(ContentType::Narrative),
            "section_based" => Ok(ContentType::SectionBased),
            "subcategory_list" => Ok(ContentType::SubcategoryList),
            "table" => Ok(ContentType::Table),
            "rich_text" => Ok(ContentType::RichText),
            "mixed_content" => Ok(ContentType::MixedContent),
            _ => Err(UnknownVariant { kind: "content type", value }),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
    Url,
    Email,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::Url => "url",
            ColumnType::Email => "email",
        }
    }
}

// --- Core Schemas (Mapped to Database) ---

/// DomainCategory
///
/// Display grouping for domains in the three-column header.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DomainCategory {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    /// Header column, 1..=3.
    pub column_position: i32,
    pub category_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Domain
///
/// A top-level content area. Deleting a domain cascades to its pages.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Domain {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub page_type: PageType,
    pub is_published: bool,
    /// ISO codes or the `ALL` sentinel.
    pub target_countries: Vec<String>,
    pub category_id: Option<Uuid>,
    /// Position of the domain inside its category.
    pub category_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Section
///
/// A named, column-positioned grouping of a page's children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Section {
    pub id: String,
    pub title: String,
    /// Layout column, 1..=3.
    pub column: u8,
    pub order: i32,
    pub page_ids: Vec<Uuid>,
}

/// Page
///
/// A node in a domain's page tree (`parent_id` self reference).
/// Slugs are unique only within `(domain_id, parent_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Page {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    #[sqlx(json)]
    pub sections: Vec<Section>,
    pub target_countries: Vec<String>,
    pub page_order: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn is_main(&self) -> bool {
        self.slug == MAIN_PAGE_SLUG
    }
}

/// ContentBlock
///
/// Ordered narrative content belonging to a page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ContentBlock {
    pub id: Uuid,
    pub page_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub block_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// TableColumn
///
/// One entry of a table's ordered column schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TableColumn {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default)]
    pub required: bool,
    /// Hidden from the table UI (used by the reserved country column).
    #[serde(default)]
    pub hidden: bool,
}

fn default_true() -> bool {
    true
}

impl TableColumn {
    pub fn text(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            column_type: ColumnType::Text,
            sortable: true,
            filterable: true,
            required: false,
            hidden: false,
        }
    }

    /// The reserved geo-targeting column.
    pub fn reserved_countries() -> Self {
        Self {
            id: RESERVED_COUNTRY_COLUMN.to_string(),
            name: "Target Countries".to_string(),
            column_type: ColumnType::Text,
            sortable: false,
            filterable: true,
            required: false,
            hidden: true,
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.id == RESERVED_COUNTRY_COLUMN
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TableMetadata {
    pub row_count: i64,
    pub last_updated: DateTime<Utc>,
    /// Where the current data came from ("manual", "csv", "json", ...).
    pub source: Option<String>,
}

impl TableMetadata {
    pub fn for_rows(count: usize, source: Option<String>) -> Self {
        Self {
            row_count: count as i64,
            last_updated: Utc::now(),
            source,
        }
    }
}

impl Default for TableMetadata {
    fn default() -> Self {
        Self::for_rows(0, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct PaginationSettings {
    pub enabled: bool,
    pub page_size: u32,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self { enabled: true, page_size: 25 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct SortingSettings {
    pub enabled: bool,
    pub default_column: Option<String>,
    pub default_direction: SortDirection,
}

impl Default for SortingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_column: None,
            default_direction: SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct FilteringSettings {
    pub enabled: bool,
    pub global_search: bool,
}

impl Default for FilteringSettings {
    fn default() -> Self {
        Self { enabled: true, global_search: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct ExportSettings {
    pub csv: bool,
    pub json: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { csv: true, json: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct UiSettings {
    pub striped: bool,
    pub bordered: bool,
    pub compact: bool,
    pub sticky_header: bool,
    pub show_row_numbers: bool,
}

/// TableSettings
///
/// Presentation toggles for a table. Missing keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct TableSettings {
    pub pagination: PaginationSettings,
    pub sorting: SortingSettings,
    pub filtering: FilteringSettings,
    pub export: ExportSettings,
    pub ui: UiSettings,
}

/// DataTable
///
/// One-to-one with a page of content type `table`. Schema, rows, metadata and settings are
/// stored as JSONB documents.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DataTable {
    pub id: Uuid,
    pub page_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub schema: Vec<TableColumn>,
    #[sqlx(json)]
    #[schema(value_type = Vec<Object>)]
    #[ts(type = "Array<Record<string, unknown>>")]
    pub data: Vec<TableRow>,
    #[sqlx(json)]
    pub metadata: TableMetadata,
    #[sqlx(json)]
    pub settings: TableSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// RichTextContent
///
/// One-to-one with a page; stores an HTML document.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RichTextContent {
    pub id: Uuid,
    pub page_id: Uuid,
    pub title: Option<String>,
    pub html: String,
    pub word_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User
///
/// Admin account record. Internal only: it carries the password hash and is never serialized
/// to clients; `UserProfile` is the outward shape.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// UserProfile
///
/// Output schema for user records.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            is_admin: user.is_admin,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

// --- Repository Inputs ---

/// Fully validated page insert, produced by the page service from a `CreatePageRequest`.
#[derive(Debug, Clone)]
pub struct NewPage {
    pub domain_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub content_type: ContentType,
    pub sections: Vec<Section>,
    pub target_countries: Vec<String>,
    pub page_order: i32,
    pub is_published: bool,
}

impl NewPage {
    /// The synthetic root of a direct domain.
    pub fn main_page(domain: &Domain) -> Self {
        Self {
            domain_id: domain.id,
            parent_id: None,
            title: domain.name.clone(),
            slug: MAIN_PAGE_SLUG.to_string(),
            description: None,
            content_type: ContentType::SectionBased,
            sections: Vec::new(),
            target_countries: vec![ALL_COUNTRIES.to_string()],
            page_order: 0,
            is_published: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTable {
    pub page_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub schema: Vec<TableColumn>,
    pub data: Vec<TableRow>,
    pub metadata: TableMetadata,
    pub settings: TableSettings,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_active: bool,
}

/// Validated partial page update. `parent_id: Some(None)` moves the page to the top level.
#[derive(Debug, Clone, Default)]
pub struct PageChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub content_type: Option<ContentType>,
    pub target_countries: Option<Vec<String>>,
    pub page_order: Option<i32>,
    pub is_published: Option<bool>,
    pub parent_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct TableChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Vec<TableColumn>>,
    pub settings: Option<TableSettings>,
    /// Rows rewritten alongside a schema change (reserved column backfill).
    pub data: Option<Vec<TableRow>>,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

/// Filters shared by the admin listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub domain_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub name: String,
    #[validate(regex(path = "SLUG_RE", message = "must be lowercase words separated by hyphens"))]
    pub slug: String,
    pub icon: Option<String>,
    #[validate(range(min = 1, max = 3, message = "must be 1, 2 or 3"))]
    pub column_position: i32,
    pub category_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = "SLUG_RE", message = "must be lowercase words separated by hyphens"))]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 3, message = "must be 1, 2 or 3"))]
    pub column_position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateDomainRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[validate(regex(path = "SLUG_RE", message = "must be lowercase words separated by hyphens"))]
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub page_type: PageType,
    pub is_published: Option<bool>,
    pub target_countries: Option<Vec<String>>,
    pub category_id: Option<Uuid>,
    pub category_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateDomainRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = "SLUG_RE", message = "must be lowercase words separated by hyphens"))]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_type: Option<PageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_countries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_order: Option<i32>,
    /// Moves the domain back to the uncategorized group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear_category: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePageRequest {
    pub domain_id: Uuid,
    /// Omitted for top-level pages; in a direct domain they attach to `__main__`.
    pub parent_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub title: String,
    #[validate(regex(path = "SLUG_RE", message = "must be lowercase words separated by hyphens"))]
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    pub target_countries: Option<Vec<String>>,
    pub page_order: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = "SLUG_RE", message = "must be lowercase words separated by hyphens"))]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_countries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    /// Moves the page under another page of the same domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Moves the page to the top level of its domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_to_root: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SectionInput {
    /// Generated when missing.
    pub id: Option<String>,
    pub title: String,
    pub column: u8,
    pub order: Option<i32>,
    #[serde(default)]
    pub page_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateSectionsRequest {
    pub sections: Vec<SectionInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateBlockRequest {
    pub title: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub content: String,
    pub block_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateBlockRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateTableRequest {
    pub page_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "must contain at least one column"))]
    pub schema: Vec<TableColumn>,
    pub settings: Option<TableSettings>,
    #[schema(value_type = Option<Vec<Object>>)]
    #[ts(type = "Array<Record<string, unknown>> | null")]
    pub rows: Option<Vec<TableRow>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateTableRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must contain at least one column"))]
    pub schema: Option<Vec<TableColumn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<TableSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DataMode {
    #[default]
    Replace,
    Append,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TableDataRequest {
    #[schema(value_type = Vec<Object>)]
    #[ts(type = "Array<Record<string, unknown>>")]
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub mode: DataMode,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpsertRichTextRequest {
    pub title: Option<String>,
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateUserRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub name: Option<String>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

// --- View Models (Output) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageLink {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DomainLink {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub url: String,
    pub page_type: PageType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HeaderGroup {
    /// `None` for the catch-all group of uncategorized domains.
    pub category_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub domains: Vec<DomainLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HeaderColumn {
    pub column: u8,
    pub groups: Vec<HeaderGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HeaderView {
    pub columns: Vec<HeaderColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SidebarDomain {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub url: String,
    pub page_type: PageType,
    pub category_name: Option<String>,
    /// Root-level pages, populated for hierarchical domains only.
    pub pages: Vec<PageLink>,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SidebarView {
    pub domains: Vec<SidebarDomain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SidebarPage {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub content_type: ContentType,
    /// Filled for subcategory-list pages.
    pub children: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SidebarSection {
    pub title: String,
    pub column: u8,
    pub order: i32,
    pub pages: Vec<SidebarPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageSidebarView {
    pub page_id: Uuid,
    pub page_title: String,
    pub sections: Vec<SidebarSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CrumbType {
    #[default]
    Root,
    Domain,
    Page,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Breadcrumb {
    pub label: String,
    pub url: String,
    #[serde(rename = "type")]
    pub crumb_type: CrumbType,
}

/// NavigationContext
///
/// Everything the public layout needs for one URL, produced by a single aggregation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NavigationContext {
    pub header: HeaderView,
    pub sidebar: SidebarView,
    pub page_sidebar: Option<PageSidebarView>,
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// PageDetail
///
/// A resolved page with everything needed to render it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageDetail {
    pub domain: Domain,
    pub page: Page,
    /// Visible children ordered by `page_order`.
    pub children: Vec<Page>,
    pub blocks: Vec<ContentBlock>,
    pub rich_text: Option<RichTextContent>,
    pub table_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DomainLanding {
    pub domain: Domain,
    /// The `__main__` page of a direct domain.
    pub main_page: Option<PageDetail>,
    /// Top-level pages of a hierarchical domain.
    pub root_pages: Vec<Page>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SectionsOverview {
    pub sections: Vec<Section>,
    pub children: Vec<Page>,
    /// Children not referenced by any section.
    pub unorganized_pages: Vec<Page>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DomainDetail {
    pub domain: Domain,
    pub category: Option<DomainCategory>,
    pub page_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaginationInfo {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PaginationInfo {
    pub fn new(page: i64, page_size: i64, total: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };
        Self { page, page_size, total, total_pages }
    }
}

/// PublicTableView
///
/// Table as served to end users: rows filtered by country, reserved column removed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PublicTableView {
    pub id: Uuid,
    pub page_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub schema: Vec<TableColumn>,
    #[schema(value_type = Vec<Object>)]
    #[ts(type = "Array<Record<string, unknown>>")]
    pub data: Vec<TableRow>,
    pub metadata: TableMetadata,
    pub settings: TableSettings,
    pub pagination: PaginationInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_db_strings() {
        for ct in [
            ContentType::Narrative,
            ContentType::SectionBased,
            ContentType::SubcategoryList,
            ContentType::Table,
            ContentType::RichText,
            ContentType::MixedContent,
        ] {
            assert_eq!(ContentType::try_from(ct.as_str().to_string()).unwrap(), ct);
        }
        assert_eq!(PageType::try_from("direct".to_string()).unwrap(), PageType::Direct);
        assert!(PageType::try_from("flat".to_string()).is_err());
    }

    #[test]
    fn slug_pattern() {
        assert!(SLUG_RE.is_match("tax-rates-2024"));
        assert!(!SLUG_RE.is_match("Tax Rates"));
        assert!(!SLUG_RE.is_match("-leading"));
        assert!(!SLUG_RE.is_match(MAIN_PAGE_SLUG));
    }

    #[test]
    fn section_json_uses_camel_case() {
        let section = Section {
            id: "s1".into(),
            title: "Guides".into(),
            column: 2,
            order: 0,
            page_ids: vec![Uuid::nil()],
        };
        let json = serde_json::to_value(&section).unwrap();
        assert!(json.get("pageIds").is_some());
        assert_eq!(json["column"], 2);
    }

    #[test]
    fn table_settings_fill_missing_keys() {
        let settings: TableSettings =
            serde_json::from_str(r#"{"pagination":{"pageSize":50}}"#).unwrap();
        assert_eq!(settings.pagination.page_size, 50);
        assert!(settings.pagination.enabled);
        assert!(settings.export.csv);
    }

    #[test]
    fn breadcrumb_serializes_type_key() {
        let crumb = Breadcrumb {
            label: "Domains".into(),
            url: "/domains".into(),
            crumb_type: CrumbType::Root,
        };
        let json = serde_json::to_string(&crumb).unwrap();
        assert!(json.contains(r#""type":"root""#));
    }

    #[test]
    fn pagination_rounds_up() {
        assert_eq!(PaginationInfo::new(1, 10, 21).total_pages, 3);
        assert_eq!(PaginationInfo::new(1, 10, 0).total_pages, 0);
    }
}
