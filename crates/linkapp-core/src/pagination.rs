//! Page arithmetic for listings
//!
//! Repositories take inclusive 0-based rank ranges; callers think in
//! 1-based page numbers.

use serde::Serialize;

/// A 1-based page of `per_page` items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// Page numbers below 1 are treated as 1, `per_page` below 1 as 1
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Inclusive `(start, stop)` ranks covered by this page
    pub fn range(&self) -> (i64, i64) {
        let start = (self.page - 1).saturating_mul(self.per_page);
        let stop = start.saturating_add(self.per_page - 1);
        (clamp(start), clamp(stop))
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Navigation info for a page within `count` items
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: u64,
    pub per_page: u64,
    pub count: u64,
    /// Last page number; 1 for an empty listing
    pub last: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
}

impl PageInfo {
    pub fn new(request: PageRequest, count: u64) -> Self {
        let last = count.div_ceil(request.per_page).max(1);
        let page = request.page;
        Self {
            page,
            per_page: request.per_page,
            count,
            last,
            previous: (page > 1).then(|| (page - 1).min(last)),
            next: (page < last).then_some(page + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range() {
        assert_eq!(PageRequest::new(1, 10).range(), (0, 9));
        assert_eq!(PageRequest::new(2, 10).range(), (10, 19));
        assert_eq!(PageRequest::new(0, 0).range(), (0, 0));
    }

    #[test]
    fn test_page_info() {
        let info = PageInfo::new(PageRequest::new(2, 10), 25);
        assert_eq!(info.last, 3);
        assert_eq!(info.previous, Some(1));
        assert_eq!(info.next, Some(3));

        let info = PageInfo::new(PageRequest::new(3, 10), 25);
        assert_eq!(info.next, None);

        let info = PageInfo::new(PageRequest::new(1, 10), 20);
        assert_eq!(info.last, 2);
        assert_eq!(info.previous, None);
    }

    #[test]
    fn test_empty_listing_has_one_page() {
        let info = PageInfo::new(PageRequest::new(1, 10), 0);
        assert_eq!(info.last, 1);
        assert_eq!(info.next, None);
        assert_eq!(info.previous, None);
    }

    #[test]
    fn test_page_past_the_end() {
        let info = PageInfo::new(PageRequest::new(9, 10), 25);
        assert_eq!(info.previous, Some(3));
        assert_eq!(info.next, None);
    }
}
