//! HTTP handlers, split by audience. Successful responses use the `{ success: true, ... }`
//! envelope; failures go through `ApiError` and render as `{ error }`.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::IntoParams;

use crate::error::ApiResult;
use crate::models::PaginationInfo;

pub mod admin;
pub mod auth;
pub mod public;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_PAGE: i64 = 1_000_000;

/// Envelope
///
/// Builder for the standard success body: `{ "success": true, "message"?: ..., <resource>: ... }`.
pub struct Envelope {
    body: Map<String, Value>,
}

impl Envelope {
    pub fn new() -> Self {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(true));
        Self { body }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.body.insert("message".to_string(), Value::String(message.into()));
        self
    }

    pub fn with<T: Serialize>(mut self, key: &str, value: &T) -> ApiResult<Self> {
        self.body.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(Value::Object(self.body)).into_response()
    }
}

/// Pagination
///
/// `page` / `pageSize` query parameters shared by the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number.
    pub page: Option<i64>,
    /// Items per page, capped at 100.
    pub page_size: Option<i64>,
}

impl Pagination {
    /// Clamped `(page, page_size)`.
    pub fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, size)
    }

    pub fn limit_offset(&self) -> (i64, i64) {
        let (page, size) = self.resolve();
        (size, (page - 1).saturating_mul(size))
    }

    pub fn info(&self, total: i64) -> PaginationInfo {
        let (page, size) = self.resolve();
        PaginationInfo::new(page, size, total)
    }
}
