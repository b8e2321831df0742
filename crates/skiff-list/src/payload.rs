//! Wire shapes accepted from list endpoints and their normalization.

use serde::{Deserialize, Deserializer};

/// Raw page payload covering both backend pagination styles.
///
/// Offset backends fill `page`/`page_size`/`total`; cursor backends fill
/// `next_marker` and optionally `no_more`. `next_marker` distinguishes an
/// explicit `null` (cursor exhausted) from an absent field (not a cursor
/// backend), which rule (c) of the normalization depends on.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PagePayload<T> {
    /// Items of this page.
    #[serde(default)]
    pub list: Vec<T>,
    /// 1-based page index reported by offset backends.
    #[serde(default)]
    pub page: Option<u64>,
    /// Page size reported by offset backends.
    #[serde(default)]
    pub page_size: Option<u64>,
    /// Total item count reported by offset backends.
    #[serde(default)]
    pub total: Option<u64>,
    /// Cursor for the next page; `Some(None)` is an explicit `null`.
    #[serde(default, deserialize_with = "explicit_null")]
    pub next_marker: Option<Option<String>>,
    /// Explicit no-more flag; both snake and camel spellings occur.
    #[serde(default, alias = "noMore")]
    pub no_more: Option<bool>,
}

impl<T> PagePayload<T> {
    /// Payload standing in for a success envelope that carried no data; some
    /// backends answer an empty list that way.
    pub(crate) const fn empty() -> Self {
        Self {
            list: Vec::new(),
            page: None,
            page_size: None,
            total: None,
            next_marker: None,
            no_more: None,
        }
    }
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// One page after normalization, ready to merge into list state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NormalizedPage<T> {
    pub(crate) items: Vec<T>,
    pub(crate) page: u64,
    pub(crate) page_size: u64,
    pub(crate) total: Option<u64>,
    pub(crate) next_marker: Option<String>,
    pub(crate) no_more: bool,
    pub(crate) empty: bool,
}

/// Reduce a raw payload to the unified pagination facts.
///
/// Rules apply in order, later ones overriding earlier ones:
/// (a) a known total at or below `page_size * page` exhausts the list;
/// (b) an explicit no-more flag overrides (a);
/// (c) an explicitly-null cursor exhausts the list regardless of (a)/(b);
/// (d) a zero-length page exhausts the list, and marks it empty when it was
///     page 1.
pub(crate) fn normalize<T>(
    payload: PagePayload<T>,
    requested_page: u64,
    fallback_page_size: u64,
) -> NormalizedPage<T> {
    let page = payload.page.unwrap_or(requested_page);
    let page_size = payload.page_size.unwrap_or(fallback_page_size);

    let mut no_more = false;
    if let Some(total) = payload.total {
        if total <= page_size.saturating_mul(page) {
            no_more = true;
        }
    }
    if let Some(flag) = payload.no_more {
        no_more = flag;
    }
    if payload.next_marker == Some(None) {
        no_more = true;
    }
    let mut empty = false;
    if payload.list.is_empty() {
        no_more = true;
        if page == 1 {
            empty = true;
        }
    }

    NormalizedPage {
        items: payload.list,
        page,
        page_size,
        total: payload.total,
        next_marker: payload.next_marker.flatten(),
        no_more,
        empty,
    }
}
