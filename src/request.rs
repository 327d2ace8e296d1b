//! Filter requests and result pages
//!
//! A `FilterRequest` carries the pagination window and the raw filter and
//! sort text of one call. After parsing and validation it also carries
//! the resulting criteria; it is not changed afterwards. `Page` is what a
//! paginated lookup hands back.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_LIMIT, DEFAULT_OFFSET, FilterConfig};
use crate::types::{FilterCriterion, SortCriterion};

fn default_offset() -> i64 {
    DEFAULT_OFFSET
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// One incoming filter/sort/pagination request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    /// Maximum number of results to return
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Number of results to skip
    #[serde(default = "default_offset")]
    pub offset: i64,
    /// Raw filter text, e.g. `status:eq:OPEN,amount:gte:100`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Raw sort text, e.g. `amount:desc,name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip)]
    filters: Vec<FilterCriterion>,
    #[serde(skip)]
    sorts: Vec<SortCriterion>,
}

impl Default for FilterRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
            filter: None,
            sort: None,
            filters: Vec::new(),
            sorts: Vec::new(),
        }
    }
}

impl FilterRequest {
    /// Create a request with the limit and offset clamped by `config`
    pub fn new(config: &FilterConfig, limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: config.clamp_limit(limit),
            offset: config.clamp_offset(offset),
            ..Self::default()
        }
    }

    /// Re-apply the pagination bounds, e.g. after deserializing
    pub fn clamped(mut self, config: &FilterConfig) -> Self {
        self.limit = config.clamp_limit(Some(self.limit));
        self.offset = config.clamp_offset(Some(self.offset));
        self
    }

    /// Set the raw filter text; blank text means no filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = non_blank(filter.into());
        self
    }

    /// Set the raw sort text; blank text means no sort
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = non_blank(sort.into());
        self
    }

    /// Attach parsed criteria, producing the processed request
    pub fn with_criteria(
        mut self,
        filters: Vec<FilterCriterion>,
        sorts: Vec<SortCriterion>,
    ) -> Self {
        self.filters = filters;
        self.sorts = sorts;
        self
    }

    pub fn filters(&self) -> &[FilterCriterion] {
        &self.filters
    }

    pub fn sorts(&self) -> &[SortCriterion] {
        &self.sorts
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn has_sorts(&self) -> bool {
        !self.sorts.is_empty()
    }

    /// Zero-based page index of this window
    pub fn page(&self) -> i64 {
        if self.limit > 0 {
            self.offset / self.limit
        } else {
            0
        }
    }

    /// Applied filters rendered back to filter text
    pub fn applied_filters(&self) -> Vec<String> {
        self.filters.iter().map(ToString::to_string).collect()
    }

    /// Applied sorts rendered back to sort text
    pub fn applied_sorts(&self) -> Vec<String> {
        self.sorts.iter().map(ToString::to_string).collect()
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() { None } else { Some(text) }
}

/// One page of results plus the totals needed to navigate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    /// Zero-based page index
    pub page: i64,
    /// Requested page size
    pub size: i64,
    pub total_elements: i64,
    pub applied_filters: Vec<String>,
    pub applied_sorts: Vec<String>,
}

impl<T> Page<T> {
    /// Build a page for `request` holding `content` out of `total_elements`
    pub fn new(content: Vec<T>, total_elements: i64, request: &FilterRequest) -> Self {
        Self {
            content,
            page: request.page(),
            size: request.limit,
            total_elements,
            applied_filters: request.applied_filters(),
            applied_sorts: request.applied_sorts(),
        }
    }

    /// A page with no content but a known total
    pub fn empty(total_elements: i64, request: &FilterRequest) -> Self {
        Self::new(Vec::new(), total_elements, request)
    }

    pub fn total_pages(&self) -> i64 {
        if self.size <= 0 {
            return 0;
        }
        (self.total_elements + self.size - 1) / self.size
    }

    pub fn is_first(&self) -> bool {
        self.page == 0
    }

    pub fn is_last(&self) -> bool {
        self.page + 1 >= self.total_pages()
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Convert the content while keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            applied_filters: self.applied_filters,
            applied_sorts: self.applied_sorts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_filters, parse_sorts};

    // =========================================================================
    // FilterRequest Tests
    // =========================================================================

    #[test]
    fn test_new_clamps_pagination() {
        let config = FilterConfig::default();

        let request = FilterRequest::new(&config, None, None);
        assert_eq!((request.limit, request.offset), (20, 0));

        let request = FilterRequest::new(&config, Some(0), Some(-10));
        assert_eq!((request.limit, request.offset), (20, 0));

        let request = FilterRequest::new(&config, Some(500), Some(40));
        assert_eq!((request.limit, request.offset), (100, 40));
    }

    #[test]
    fn test_deserialize_then_clamp() {
        let request: FilterRequest =
            serde_json::from_str(r#"{"limit": 1000, "offset": -3, "filter": "a:eq:1"}"#).unwrap();
        let request = request.clamped(&FilterConfig::default());
        assert_eq!(request.limit, 100);
        assert_eq!(request.offset, 0);
        assert_eq!(request.filter.as_deref(), Some("a:eq:1"));
        assert!(!request.has_filters());
    }

    #[test]
    fn test_blank_text_is_none() {
        let request = FilterRequest::default().with_filter("  ").with_sort("name");
        assert_eq!(request.filter, None);
        assert_eq!(request.sort.as_deref(), Some("name"));
    }

    #[test]
    fn test_page_index() {
        let config = FilterConfig::default();
        assert_eq!(FilterRequest::new(&config, Some(10), Some(0)).page(), 0);
        assert_eq!(FilterRequest::new(&config, Some(10), Some(25)).page(), 2);
    }

    #[test]
    fn test_applied_criteria() {
        let request = FilterRequest::default().with_criteria(
            parse_filters("status:in:( A ,B),name:SW:Jo").unwrap(),
            parse_sorts("amount:DESC").unwrap(),
        );
        assert!(request.has_filters());
        assert!(request.has_sorts());
        assert_eq!(request.applied_filters(), vec!["status:in:(A,B)", "name:sw:Jo"]);
        assert_eq!(request.applied_sorts(), vec!["amount:desc"]);
    }

    // =========================================================================
    // Page Tests
    // =========================================================================

    fn page_at(offset: i64, limit: i64, total: i64, items: usize) -> Page<usize> {
        let request = FilterRequest::new(&FilterConfig::default(), Some(limit), Some(offset));
        Page::new((0..items).collect(), total, &request)
    }

    #[test]
    fn test_page_navigation() {
        let first = page_at(0, 10, 25, 10);
        assert_eq!(first.total_pages(), 3);
        assert!(first.is_first());
        assert!(!first.is_last());
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = page_at(20, 10, 25, 5);
        assert_eq!(last.page, 2);
        assert!(last.is_last());
        assert!(!last.has_next());
        assert!(last.has_previous());
        assert_eq!(last.number_of_elements(), 5);
    }

    #[test]
    fn test_empty_page() {
        let request = FilterRequest::default();
        let page: Page<String> = Page::empty(0, &request);
        assert!(page.is_empty());
        assert_eq!(page.total_pages(), 0);
        assert!(page.is_first());
        assert!(page.is_last());
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = page_at(10, 10, 30, 3).map(|n| n * 2);
        assert_eq!(page.content, vec![0, 2, 4]);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_elements, 30);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let json = serde_json::to_value(page_at(0, 10, 1, 1)).unwrap();
        assert_eq!(json["totalElements"], 1);
        assert_eq!(json["appliedFilters"], serde_json::json!([]));
    }
}
