//! Table schema and row maintenance, the public (country-filtered) view, and exports.

use std::collections::HashSet;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::country::{ALL_COUNTRIES, RESERVED_COUNTRY_COLUMN, filter_rows, strip_reserved_column};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CreateTableRequest, DataMode, DataTable, NewTable, PaginationInfo, PublicTableView,
    TableChanges, TableColumn, TableDataRequest, TableMetadata, TableRow, UpdateTableRequest,
};
use crate::repository::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// Requires at least one user column and unique, non-empty column ids.
pub fn validate_schema(schema: &[TableColumn]) -> ApiResult<()> {
    if !schema.iter().any(|c| !c.is_reserved()) {
        return Err(ApiError::Validation(
            "Table schema must contain at least one column".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for column in schema {
        if column.id.trim().is_empty() || column.name.trim().is_empty() {
            return Err(ApiError::Validation("Column id and name are required".to_string()));
        }
        if !seen.insert(column.id.as_str()) {
            return Err(ApiError::Validation(format!("Duplicate column id '{}'", column.id)));
        }
    }
    Ok(())
}

/// Puts the reserved country column at the end of the schema, replacing any edited copy.
pub fn ensure_reserved_column(mut schema: Vec<TableColumn>) -> Vec<TableColumn> {
    schema.retain(|c| !c.is_reserved());
    schema.push(TableColumn::reserved_countries());
    schema
}

/// Gives every row an `id` and a `targetCountries` value (default `ALL`).
pub fn prepare_rows(rows: Vec<TableRow>) -> Vec<TableRow> {
    rows.into_iter()
        .map(|mut row| {
            let has_id = row.get("id").is_some_and(|v| !v.is_null());
            if !has_id {
                row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
            }

            let has_targets = match row.get(RESERVED_COUNTRY_COLUMN) {
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(Value::Array(items)) => !items.is_empty(),
                _ => false,
            };
            if !has_targets {
                row.insert(
                    RESERVED_COUNTRY_COLUMN.to_string(),
                    Value::String(ALL_COUNTRIES.to_string()),
                );
            }
            row
        })
        .collect()
}

pub async fn create_table(repo: &dyn Repository, req: CreateTableRequest) -> ApiResult<DataTable> {
    req.validate()?;
    validate_schema(&req.schema)?;

    repo.get_page(req.page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;
    if repo.get_table_by_page(req.page_id).await?.is_some() {
        return Err(ApiError::Conflict("Page already has a table".to_string()));
    }

    let rows = prepare_rows(req.rows.unwrap_or_default());
    let source = (!rows.is_empty()).then(|| "manual".to_string());
    let table = repo
        .create_table(NewTable {
            page_id: req.page_id,
            name: req.name,
            description: req.description,
            schema: ensure_reserved_column(req.schema),
            metadata: TableMetadata::for_rows(rows.len(), source),
            data: rows,
            settings: req.settings.unwrap_or_default(),
        })
        .await?;

    tracing::info!(table_id = %table.id, page_id = %table.page_id, "table created");
    Ok(table)
}

pub async fn update_table(repo: &dyn Repository, id: Uuid, req: UpdateTableRequest) -> ApiResult<DataTable> {
    req.validate()?;
    let table = repo
        .get_table(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))?;

    let (schema, data) = match req.schema {
        Some(schema) => {
            validate_schema(&schema)?;
            (Some(ensure_reserved_column(schema)), Some(prepare_rows(table.data)))
        }
        None => (None, None),
    };

    repo.update_table(
        id,
        TableChanges {
            name: req.name,
            description: req.description,
            schema,
            settings: req.settings,
            data,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Table"))
}

/// Replaces or appends rows; metadata always reflects the final row count.
pub async fn write_rows(repo: &dyn Repository, id: Uuid, req: TableDataRequest) -> ApiResult<DataTable> {
    let table = repo
        .get_table(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))?;

    let incoming = prepare_rows(req.rows);
    let rows = match req.mode {
        DataMode::Replace => incoming,
        DataMode::Append => {
            let mut rows = table.data;
            rows.extend(incoming);
            rows
        }
    };

    let metadata = TableMetadata::for_rows(rows.len(), req.source.or(Some("manual".to_string())));
    tracing::debug!(table_id = %id, mode = ?req.mode, rows = rows.len(), "writing table rows");
    repo.replace_table_data(id, rows, metadata)
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))
}

pub async fn clear_rows(repo: &dyn Repository, id: Uuid) -> ApiResult<DataTable> {
    let table = repo
        .get_table(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))?;
    repo.replace_table_data(id, Vec::new(), TableMetadata::for_rows(0, table.metadata.source))
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))
}

/// Rows visible in `country`, reserved column removed. Paginates only when `page` or
/// `page_size` is requested, otherwise returns every visible row.
pub fn public_view(
    table: DataTable,
    country: &str,
    page: Option<i64>,
    page_size: Option<i64>,
) -> PublicTableView {
    let visible = filter_rows(&table.data, country);
    let (schema, rows) = strip_reserved_column(&table.schema, &visible);
    let total = rows.len() as i64;

    let (data, pagination) = if page.is_some() || page_size.is_some() {
        let size = page_size
            .unwrap_or(table.settings.pagination.page_size as i64)
            .clamp(1, 1000);
        let page = page.unwrap_or(1).max(1);
        let offset = usize::try_from((page - 1).saturating_mul(size)).unwrap_or(usize::MAX);
        let data = rows
            .into_iter()
            .skip(offset)
            .take(size as usize)
            .collect();
        (data, PaginationInfo::new(page, size, total))
    } else {
        (rows, PaginationInfo::new(1, total.max(1), total))
    };

    PublicTableView {
        id: table.id,
        page_id: table.page_id,
        name: table.name,
        description: table.description,
        schema,
        data,
        metadata: TableMetadata {
            row_count: total,
            ..table.metadata
        },
        settings: table.settings,
        pagination,
    }
}

/// Renders a cell for CSV output. Arrays (country lists) are comma-joined.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Header row of column names, then one line per row in schema order.
pub fn export_csv(schema: &[TableColumn], rows: &[TableRow]) -> String {
    let mut out = String::new();
    let header: Vec<String> = schema.iter().map(|c| csv_escape(&c.name)).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in rows {
        let line: Vec<String> = schema
            .iter()
            .map(|c| csv_escape(&cell_text(row.get(&c.id))))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

pub fn export_json(schema: &[TableColumn], rows: &[TableRow], metadata: &TableMetadata) -> Value {
    let columns: Vec<Value> = schema
        .iter()
        .map(|c| json!({ "id": c.id, "name": c.name, "type": c.column_type.as_str() }))
        .collect();
    json!({
        "schema": columns,
        "data": rows,
        "metadata": metadata,
        "exportedAt": Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> TableRow {
        value.as_object().cloned().unwrap()
    }

    fn table_with(rows: Vec<TableRow>) -> DataTable {
        DataTable {
            name: "Rates".into(),
            schema: ensure_reserved_column(vec![TableColumn::text("city", "City")]),
            data: prepare_rows(rows),
            ..Default::default()
        }
    }

    #[test]
    fn schema_needs_a_user_column() {
        assert!(validate_schema(&[]).is_err());
        assert!(validate_schema(&[TableColumn::reserved_countries()]).is_err());
        assert!(validate_schema(&[TableColumn::text("a", "A"), TableColumn::text("a", "B")]).is_err());
        assert!(validate_schema(&[TableColumn::text("a", "A")]).is_ok());
    }

    #[test]
    fn reserved_column_is_unique_and_last() {
        let schema = ensure_reserved_column(vec![
            TableColumn::reserved_countries(),
            TableColumn::text("city", "City"),
        ]);
        assert_eq!(schema.len(), 2);
        assert!(schema[1].is_reserved());
        assert!(schema[1].hidden);
    }

    #[test]
    fn rows_get_defaults() {
        let rows = prepare_rows(vec![row(json!({ "city": "Pune" })), row(json!({ "id": "r2", "targetCountries": "IN" }))]);
        assert_eq!(rows[0][RESERVED_COUNTRY_COLUMN], "ALL");
        assert!(rows[0].contains_key("id"));
        assert_eq!(rows[1]["id"], "r2");
        assert_eq!(rows[1][RESERVED_COUNTRY_COLUMN], "IN");
    }

    #[test]
    fn public_view_filters_then_strips() {
        let table = table_with(vec![
            row(json!({ "city": "Pune", "targetCountries": "IN" })),
            row(json!({ "city": "Austin", "targetCountries": ["US"] })),
            row(json!({ "city": "Anywhere" })),
        ]);

        let us = public_view(table.clone(), "US", None, None);
        let cities: Vec<&str> = us.data.iter().map(|r| r["city"].as_str().unwrap()).collect();
        assert_eq!(cities, vec!["Austin", "Anywhere"]);
        assert!(us.data.iter().all(|r| !r.contains_key(RESERVED_COUNTRY_COLUMN)));
        assert!(us.schema.iter().all(|c| !c.is_reserved()));

        let paged = public_view(table, "IN", Some(2), Some(1));
        assert_eq!(paged.data.len(), 1);
        assert_eq!(paged.data[0]["city"], "Anywhere");
        assert_eq!(paged.pagination.total, 2);
        assert_eq!(paged.pagination.total_pages, 2);
    }

    #[test]
    fn huge_page_returns_empty_slice() {
        let table = table_with(vec![
            row(json!({ "city": "Pune", "targetCountries": "IN" })),
            row(json!({ "city": "Anywhere" })),
        ]);

        let view = public_view(table, "IN", Some(i64::MAX), Some(10));
        assert!(view.data.is_empty());
        assert_eq!(view.pagination.page, i64::MAX);
        assert_eq!(view.pagination.total, 2);
    }

    #[test]
    fn csv_quotes_special_characters() {
        let schema = vec![TableColumn::text("name", "Name"), TableColumn::text("note", "Note, extra")];
        let rows = vec![row(json!({ "name": "Acme \"Ltd\"", "note": "a,b" })), row(json!({ "name": "Plain" }))];
        let csv = export_csv(&schema, &rows);
        assert_eq!(csv, "Name,\"Note, extra\"\n\"Acme \"\"Ltd\"\"\",\"a,b\"\nPlain,\n");
    }

    #[test]
    fn json_export_keeps_only_id_name_type() {
        let schema = vec![TableColumn::text("name", "Name")];
        let exported = export_json(&schema, &[], &TableMetadata::default());
        assert_eq!(exported["schema"][0], json!({ "id": "name", "name": "Name", "type": "text" }));
        assert!(exported.get("exportedAt").is_some());
    }
}
