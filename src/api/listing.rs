//! Query parameters and response envelope for paginated listings.
//!
//! `?page=2&limit=20&sortBy=created_at&desc=true`. Unknown sort columns fall
//! back to the listing's default order.

use serde::{Deserialize, Serialize};

use crate::db::{Page, PageRequest};

#[derive(Debug, Default, Deserialize)]
pub(super) struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(rename = "sortBy")]
    sort_by: Option<String>,
    desc: Option<String>,
}

impl ListQuery {
    pub(super) fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }

    pub(super) fn sort_by(&self) -> Option<&str> {
        self.sort_by.as_deref()
    }

    pub(super) fn descending(&self) -> bool {
        parse_flag(self.desc.as_deref()).unwrap_or(false)
    }
}

/// `true`/`1` and `false`/`0`; anything else is treated as absent.
pub(super) fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value? {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub last_page: u32,
}

impl<T> From<Page<T>> for Paginated<T> {
    fn from(page: Page<T>) -> Self {
        let last_page = page.last_page();
        Self {
            current_page: page.page,
            per_page: page.limit,
            total: page.total,
            last_page,
            data: page.items,
        }
    }
}
