//! Fetch parameters serialized into list-call bodies.

use serde::Serialize;
use serde_json::{Map, Value};

/// Page size used when a store is not configured otherwise.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Parameters of one list fetch.
///
/// `page`/`page_size` drive offset backends, `next_marker` drives cursor
/// backends; filter fields are flattened alongside, so a body reads like
/// `{"page":1,"page_size":20,"keyword":"ubuntu"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchParams {
    /// 1-based page to fetch.
    pub page: u64,
    /// Requested page size.
    pub page_size: u64,
    /// Cursor returned by the previous page, when the backend uses one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_marker: Option<String>,
    /// Caller-supplied filter fields.
    #[serde(flatten)]
    pub filters: Map<String, Value>,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            next_marker: None,
            filters: Map::new(),
        }
    }
}

impl FetchParams {
    /// Parameters for page 1 with the given filters.
    #[must_use]
    pub fn first_page(page_size: u64, filters: Map<String, Value>) -> Self {
        Self {
            page: 1,
            page_size,
            next_marker: None,
            filters,
        }
    }

    /// Add one filter field, builder style.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.filters.insert(key.into(), value);
        self
    }
}
