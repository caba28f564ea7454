//! Country-based visibility.
//!
//! Domains and pages carry a `target_countries` column that is filtered in SQL; table rows carry
//! their targeting inside the JSON data blob, so they are filtered here in memory.

use serde_json::Value;

use crate::models::{TableColumn, TableRow};

/// Sentinel meaning "visible everywhere".
pub const ALL_COUNTRIES: &str = "ALL";

/// Reserved, non-removable column present on every table schema and row.
pub const RESERVED_COUNTRY_COLUMN: &str = "targetCountries";

/// Upper-cases and validates a two-letter country code (or the `ALL` sentinel).
pub fn normalize_country(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code == ALL_COUNTRIES {
        return Some(code);
    }
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code)
    } else {
        None
    }
}

/// True iff the list is empty, contains `ALL`, or contains the user's country.
pub fn is_visible<S: AsRef<str>>(targets: &[S], user_country: &str) -> bool {
    targets.is_empty()
        || targets.iter().any(|t| {
            let t = t.as_ref().trim();
            t.eq_ignore_ascii_case(ALL_COUNTRIES) || t.eq_ignore_ascii_case(user_country)
        })
}

/// Normalizes a submitted target-country list: upper-cased, deduplicated,
/// collapsed to `["ALL"]` when empty or when `ALL` is present.
pub fn normalize_targets(raw: &[String]) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::new();
    for entry in raw {
        let code = normalize_country(entry)
            .ok_or_else(|| format!("Invalid country code '{}'", entry))?;
        if code == ALL_COUNTRIES {
            return Ok(vec![ALL_COUNTRIES.to_string()]);
        }
        if !out.contains(&code) {
            out.push(code);
        }
    }
    if out.is_empty() {
        out.push(ALL_COUNTRIES.to_string());
    }
    Ok(out)
}

/// Extracts the target list stored in a row. Accepts a comma separated string
/// (`"IN,US"`), an array of strings, or nothing at all.
pub fn row_targets(row: &TableRow) -> Vec<String> {
    match row.get(RESERVED_COUNTRY_COLUMN) {
        Some(Value::String(s)) => s
            .split(',')
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn row_is_visible(row: &TableRow, user_country: &str) -> bool {
    is_visible(&row_targets(row), user_country)
}

/// Keeps only rows visible to `user_country`.
pub fn filter_rows(rows: &[TableRow], user_country: &str) -> Vec<TableRow> {
    rows.iter()
        .filter(|row| row_is_visible(row, user_country))
        .cloned()
        .collect()
}

/// Removes the reserved column from a schema and from every row. Must run after filtering.
pub fn strip_reserved_column(schema: &[TableColumn], rows: &[TableRow]) -> (Vec<TableColumn>, Vec<TableRow>) {
    let schema = schema
        .iter()
        .filter(|c| c.id != RESERVED_COUNTRY_COLUMN)
        .cloned()
        .collect();
    let rows = rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.remove(RESERVED_COUNTRY_COLUMN);
            row
        })
        .collect();
    (schema, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> TableRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn visibility_contract() {
        assert!(is_visible(&["ALL"], "IN"));
        assert!(!is_visible(&["US"], "IN"));
        assert!(is_visible::<&str>(&[], "GB"));
        assert!(is_visible(&["US", "IN"], "IN"));
        assert!(is_visible(&["in"], "IN"));
        assert!(is_visible(&["all"], "FR"));
    }

    #[test]
    fn normalize_country_codes() {
        assert_eq!(normalize_country(" us "), Some("US".to_string()));
        assert_eq!(normalize_country("all"), Some("ALL".to_string()));
        assert_eq!(normalize_country("USA"), None);
        assert_eq!(normalize_country("1N"), None);
    }

    #[test]
    fn normalize_targets_collapses_all() {
        let got = normalize_targets(&["in".into(), "US".into(), "IN".into()]).unwrap();
        assert_eq!(got, vec!["IN", "US"]);
        let got = normalize_targets(&["US".into(), "ALL".into()]).unwrap();
        assert_eq!(got, vec!["ALL"]);
        assert_eq!(normalize_targets(&[]).unwrap(), vec!["ALL"]);
        assert!(normalize_targets(&["Narnia".into()]).is_err());
    }

    #[test]
    fn row_filter_accepts_strings_and_arrays() {
        let rows = vec![
            row(json!({"name": "a", "targetCountries": "IN"})),
            row(json!({"name": "b", "targetCountries": "US, GB"})),
            row(json!({"name": "c", "targetCountries": ["ALL"]})),
            row(json!({"name": "d"})),
        ];
        let us: Vec<_> = filter_rows(&rows, "US")
            .into_iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(us, vec!["b", "c", "d"]);
        let india = filter_rows(&rows, "IN");
        assert_eq!(india.len(), 3);
        assert_eq!(india[0]["name"], "a");
    }

    #[test]
    fn strip_removes_reserved_column_everywhere() {
        let schema = vec![
            TableColumn::text("name", "Name"),
            TableColumn::reserved_countries(),
        ];
        let rows = vec![row(json!({"name": "a", "targetCountries": "ALL"}))];
        let (schema, rows) = strip_reserved_column(&schema, &rows);
        assert_eq!(schema.len(), 1);
        assert!(rows[0].get(RESERVED_COUNTRY_COLUMN).is_none());
        assert_eq!(rows[0]["name"], "a");
    }
}
