//! Page windows over listing results

use serde::Serialize;

/// Page size used when the request omits one or asks for an invalid size
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest accepted page size
pub const MAX_PAGE_SIZE: usize = 100;

/// Sanitized page position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    /// Index of the first item on the page
    pub offset: usize,
}

/// Compute the window for `requested_page` of `total_items`
///
/// Pages below 1 become 1; pages past the end clamp to the last page.
/// Page sizes outside [1, MAX_PAGE_SIZE] fall back to the default.
///
/// # Examples
/// ```
/// use matching_service::pagination::calculate_pagination;
///
/// let p = calculate_pagination(45, 3, 20);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 40);
/// ```
pub fn calculate_pagination(total_items: usize, requested_page: usize, requested_size: usize) -> Pagination {
    let page_size = if (1..=MAX_PAGE_SIZE).contains(&requested_size) {
        requested_size
    } else {
        DEFAULT_PAGE_SIZE
    };
    let total_pages = total_items.div_ceil(page_size);
    let page = requested_page.max(1).min(total_pages.max(1));

    Pagination {
        page,
        page_size,
        total_pages,
        offset: (page - 1) * page_size,
    }
}

/// One page of items plus the numbers needed to fetch the others
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn from_items(items: Vec<T>, requested_page: usize, requested_size: usize) -> Self {
        let total_count = items.len();
        let p = calculate_pagination(total_count, requested_page, requested_size);
        let items = items.into_iter().skip(p.offset).take(p.page_size).collect();

        Self {
            items,
            total_count,
            page: p.page,
            page_size: p.page_size,
            total_pages: p.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(250, 2, 100);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_out_of_bounds_pages() {
        let p = calculate_pagination(150, 99, 100);
        assert_eq!(p.page, 2);
        assert_eq!(p.offset, 100);

        let p = calculate_pagination(150, 0, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_invalid_page_size_uses_default() {
        assert_eq!(calculate_pagination(10, 1, 0).page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(calculate_pagination(10, 1, 500).page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(calculate_pagination(10, 1, 100).page_size, 100);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1, 20);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_page_slices_items() {
        let page = Page::from_items((0..45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(page.items, (40..45).collect::<Vec<_>>());
        assert_eq!(page.total_count, 45);
        assert_eq!(page.total_pages, 3);
    }
}
