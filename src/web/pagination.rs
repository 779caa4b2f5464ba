use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// `?page=&size=` with a zero-based page index.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageParams {
    #[must_use]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(0).max(0)
    }

    #[must_use]
    pub fn size(&self) -> i64 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.page().saturating_mul(self.size())
    }
}

/// One page of a listing plus totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: PageParams, total_elements: i64) -> Self {
        let size = params.size();
        Self {
            items,
            page: params.page(),
            size,
            total_elements,
            total_pages: (total_elements + size - 1) / size,
        }
    }
}
