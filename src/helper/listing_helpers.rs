use serde::{Deserialize, Serialize};

/// Largest page size any listing will serve.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Number of page links shown around the current page.
const PAGE_WINDOW: i64 = 5;

/// `?page=&pageSize=` as sent by clients. Both are optional.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, page_size: Option<i64>, default_size: i64) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn from_query(query: &PageQuery, default_size: i64) -> Self {
        Self::new(query.page, query.page_size, default_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
    pub total_items: i64,
    pub page_size: i64,
    pub pages: Vec<i64>,
}

impl Pagination {
    pub fn new(request: &PageRequest, total_items: i64) -> Self {
        let total_pages = if total_items <= 0 {
            0
        } else {
            (total_items + request.page_size - 1) / request.page_size
        };
        Pagination {
            current_page: request.page,
            total_pages,
            has_next: request.page < total_pages,
            has_prev: request.page > 1 && total_pages > 0,
            total_items: total_items.max(0),
            page_size: request.page_size,
            pages: page_window(request.page, total_pages),
        }
    }
}

/// Up to five consecutive page numbers, centred on `current` where the
/// range allows.
pub fn page_window(current: i64, total_pages: i64) -> Vec<i64> {
    if total_pages <= 0 {
        return Vec::new();
    }
    let current = current.clamp(1, total_pages);
    let mut start = (current - PAGE_WINDOW / 2).max(1);
    let end = (start + PAGE_WINDOW - 1).min(total_pages);
    start = (end - PAGE_WINDOW + 1).max(1);
    (start..=end).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total_items: i64) -> Self {
        Paginated {
            items,
            pagination: Pagination::new(request, total_items),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_clamps_page_and_size() {
        assert_eq!(PageRequest::new(Some(0), Some(500), 10), PageRequest { page: 1, page_size: 100 });
        assert_eq!(PageRequest::new(Some(-3), Some(0), 10), PageRequest { page: 1, page_size: 1 });
        assert_eq!(PageRequest::new(None, None, 6), PageRequest { page: 1, page_size: 6 });
        assert_eq!(PageRequest::new(Some(3), Some(10), 6).offset(), 20);
    }

    #[test]
    fn empty_result_has_no_pages() {
        let p = Pagination::new(&PageRequest::new(Some(1), Some(10), 10), 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);
        assert!(p.pages.is_empty());
    }

    #[test]
    fn total_pages_is_ceiling() {
        for (total, size, expected) in [(1, 10, 1), (10, 10, 1), (11, 10, 2), (25, 6, 5)] {
            let p = Pagination::new(&PageRequest::new(Some(1), Some(size), size), total);
            assert_eq!(p.total_pages, expected, "total={} size={}", total, size);
        }
    }

    #[test]
    fn middle_and_out_of_range_pages() {
        let middle = Pagination::new(&PageRequest::new(Some(2), Some(10), 10), 25);
        assert!(middle.has_next && middle.has_prev);

        let beyond = Pagination::new(&PageRequest::new(Some(9), Some(10), 10), 25);
        assert_eq!(beyond.current_page, 9);
        assert!(!beyond.has_next);
        assert!(beyond.has_prev);
    }

    #[test]
    fn window_is_centred_and_bounded() {
        assert_eq!(page_window(1, 3), vec![1, 2, 3]);
        assert_eq!(page_window(1, 10), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(6, 10), vec![4, 5, 6, 7, 8]);
        assert_eq!(page_window(10, 10), vec![6, 7, 8, 9, 10]);
        assert_eq!(page_window(50, 10), vec![6, 7, 8, 9, 10]);
    }
}
