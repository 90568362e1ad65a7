//! Pagination over filtered, ordered result sets.
//!
//! [`PaginationParams`] describes which page a caller wants; [`Page`] is the slice that
//! comes back, along with the metadata a paginated REST response reports: the total
//! match count and whether more matching items exist past this page.

use serde::{Deserialize, Serialize};
use std::cmp::min;

/// A single page of results.
///
/// # Example
///
/// ```ignore
/// use mockrest::page::PaginationParams;
///
/// let page = PaginationParams::new(2, 2).paginate(vec![1, 2, 3, 4, 5]);
///
/// assert_eq!(page.items, vec![3, 4]);
/// assert_eq!(page.count, 5);
/// assert!(page.has_next);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of matching items across all pages.
    pub count: usize,
    /// The 1-based page number.
    pub page: usize,
    /// Requested page size.
    pub page_size: usize,
    /// Whether matching items exist beyond this page.
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// A page holding every item, as returned when no pagination was requested.
    pub fn whole(items: Vec<T>) -> Self {
        let count = items.len();
        Page::builder(items)
            .with_count(count)
            .with_page_size(count)
            .build()
    }

    /// Transforms the items while keeping the metadata.
    pub fn map_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            has_next: self.has_next,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            page: 1,
            page_size: 0,
            has_next: false,
        }
    }
}

/// Builder for constructing [`Page`] instances.
pub struct PageBuilder<T> {
    items: Vec<T>,
    count: usize,
    page: usize,
    page_size: usize,
    has_next: bool,
}

impl<T> PageBuilder<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            page: 1,
            page_size: 0,
            has_next: false,
        }
    }

    /// Sets the total count of matching items.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_has_next(mut self, has_next: bool) -> Self {
        self.has_next = has_next;
        self
    }

    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            has_next: self.has_next,
        }
    }
}

/// Which page to retrieve and how many items per page.
///
/// Pages are 1-indexed (page 1 is the first page).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub page_size: usize,
}

impl PaginationParams {
    /// Creates new pagination parameters. A page of 0 is read as page 1.
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page: page.max(1), page_size }
    }

    /// Number of items to skip before this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// The page actually served; a deserialized page of 0 reads as 1, like [`PaginationParams::new`].
    fn page_number(&self) -> usize {
        self.page.max(1)
    }

    /// Slices `items` (already filtered and ordered) into this page.
    ///
    /// `has_next` is true iff the total exceeds `page * page_size`.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let count = items.len();
        let start = min(self.offset(), count);
        let end = min(start.saturating_add(self.page_size), count);
        let page = self.page_number();
        let has_next = count > page.saturating_mul(self.page_size);

        let page_items = items
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect();

        Page::builder(page_items)
            .with_count(count)
            .with_page(page)
            .with_page_size(self.page_size)
            .with_has_next(has_next)
            .build()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, page_size: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn middle_page_has_next() {
        let page = PaginationParams::new(2, 2).paginate(vec![1, 2, 3, 4, 5]);

        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.count, 5);
        assert!(page.has_next);
    }

    #[test]
    fn exact_fit_has_no_next() {
        let page = PaginationParams::new(2, 2).paginate(vec![1, 2, 3, 4]);

        assert_eq!(page.items, vec![3, 4]);
        assert!(!page.has_next);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = PaginationParams::new(9, 10).paginate(vec![1, 2, 3]);

        assert!(page.items.is_empty());
        assert_eq!(page.count, 3);
        assert!(!page.has_next);
    }

    #[test]
    fn empty_input() {
        let page = PaginationParams::new(1, 10).paginate(Vec::<i32>::new());

        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn page_zero_reads_as_first() {
        assert_eq!(PaginationParams::new(0, 5).offset(), 0);
    }

    #[test]
    fn deserialized_page_zero_reads_as_first() {
        let params: PaginationParams =
            serde_json::from_value(serde_json::json!({ "page": 0, "pageSize": 2 })).unwrap();

        let page = params.paginate(vec![1, 2, 3]);
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.page, 1);
        assert!(page.has_next);
    }
}
