//! Page requests and navigation links.
//!
//! Pages are 1-based. `page[offset]` names the page number and `page[size]`
//! the number of items per page.
//!
//! ```rust
//! use weave_query::pagination::{PageLinks, PageRequest};
//!
//! let page = PageRequest::new(2, 5);
//! assert_eq!(page.skip(), 5);
//! assert_eq!(page.to_sql(), "LIMIT 5 OFFSET 5");
//!
//! let links = PageLinks::build("/books", 2, 5, 10, 12);
//! assert_eq!(links.last, "/books?page[offset]=3&page[size]=5");
//! assert_eq!(links.prev.as_deref(), Some("/books?page[offset]=1&page[size]=5"));
//! assert_eq!(links.next.as_deref(), Some("/books?page[offset]=3&page[size]=5"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::params::ParamReader;

/// Page size parameter.
pub const PAGE_SIZE_PARAM: &str = "page[size]";
/// Page number parameter.
pub const PAGE_OFFSET_PARAM: &str = "page[offset]";

/// A requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u64,
    /// Items per page.
    pub size: u64,
}

impl PageRequest {
    /// Create a page request. Page 0 is treated as page 1.
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page: page.max(1),
            size,
        }
    }

    /// The first page of the given size.
    pub fn first(size: u64) -> Self {
        Self::new(1, size)
    }

    /// Number of items before this page.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }

    /// Read `page[size]` and `page[offset]`.
    pub fn from_params(
        reader: &mut ParamReader<'_>,
        default_size: u64,
        max_size: u64,
    ) -> QueryResult<Self> {
        let size = match reader
            .single(PAGE_SIZE_PARAM)
            .map_err(|e| QueryError::invalid_pagination(PAGE_SIZE_PARAM, e.message))?
        {
            None => default_size,
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if (1..=max_size).contains(&n) => n,
                _ => {
                    return Err(QueryError::invalid_pagination(
                        PAGE_SIZE_PARAM,
                        format!("'{}' must be an integer between 1 and {}", raw, max_size),
                    ));
                }
            },
        };

        let page = match reader
            .single(PAGE_OFFSET_PARAM)
            .map_err(|e| QueryError::invalid_pagination(PAGE_OFFSET_PARAM, e.message))?
        {
            None => 1,
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(QueryError::invalid_pagination(
                        PAGE_OFFSET_PARAM,
                        format!("'{}' must be an integer of at least 1", raw),
                    ));
                }
            },
        };

        // The last row of the window must still be addressable by the store.
        if page
            .checked_mul(size)
            .and_then(|end| i64::try_from(end).ok())
            .is_none()
        {
            return Err(QueryError::invalid_pagination(
                PAGE_OFFSET_PARAM,
                format!("page {} of size {} is out of range", page, size),
            ));
        }

        Ok(Self { page, size })
    }

    /// Generate the SQL LIMIT/OFFSET clause.
    pub fn to_sql(&self) -> String {
        if self.page == 1 {
            format!("LIMIT {}", self.size)
        } else {
            format!("LIMIT {} OFFSET {}", self.size, self.skip())
        }
    }

    /// Number of items this page holds out of `total`.
    pub fn len_of(&self, total: u64) -> u64 {
        total.saturating_sub(self.skip()).min(self.size)
    }
}

/// Number of the last page; at least 1 even when empty.
pub fn last_page(total: u64, size: u64) -> u64 {
    if size == 0 {
        return 1;
    }
    total.div_ceil(size).max(1)
}

/// Navigation links for a paginated collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    /// The current page.
    #[serde(rename = "self")]
    pub self_link: String,
    /// Page 1.
    pub first: String,
    /// The last page.
    pub last: String,
    /// The previous page, when it exists.
    pub prev: Option<String>,
    /// The next page, when it exists.
    pub next: Option<String>,
}

impl PageLinks {
    /// Build the link set for `page` of `size` items out of `total`.
    ///
    /// `page[size]` is omitted when it equals `default_size`.
    pub fn build(base: &str, page: u64, size: u64, default_size: u64, total: u64) -> Self {
        let page = page.max(1);
        let last = last_page(total, size);
        let link = |n: u64| page_url(base, n, size, default_size);

        Self {
            self_link: link(page),
            first: link(1),
            last: link(last),
            prev: (page > 1 && page - 1 <= last).then(|| link(page - 1)),
            next: (page < last).then(|| link(page + 1)),
        }
    }
}

fn page_url(base: &str, page: u64, size: u64, default_size: u64) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    if size == default_size {
        format!("{}{}{}={}", base, sep, PAGE_OFFSET_PARAM, page)
    } else {
        format!(
            "{}{}{}={}&{}={}",
            base, sep, PAGE_OFFSET_PARAM, page, PAGE_SIZE_PARAM, size
        )
    }
}

/// Totals reported alongside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Items across all pages.
    pub total: u64,
    /// Items on this page.
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::QueryParams;

    #[test]
    fn test_first_page_links() {
        let links = PageLinks::build("/books/1/relationships/tags", 1, 5, 5, 7);
        assert_eq!(links.self_link, "/books/1/relationships/tags?page[offset]=1");
        assert_eq!(links.last, "/books/1/relationships/tags?page[offset]=2");
        assert_eq!(links.prev, None);
        assert_eq!(
            links.next.as_deref(),
            Some("/books/1/relationships/tags?page[offset]=2")
        );
    }

    #[test]
    fn test_empty_collection_has_single_page() {
        let links = PageLinks::build("/books", 1, 10, 10, 0);
        assert_eq!(links.last, "/books?page[offset]=1");
        assert_eq!(links.prev, None);
        assert_eq!(links.next, None);
    }

    #[test]
    fn test_past_the_end() {
        // page 4 of 2: prev would point at page 3, which is out of range too
        let links = PageLinks::build("/books", 4, 5, 5, 7);
        assert_eq!(links.prev, None);
        assert_eq!(links.next, None);

        let links = PageLinks::build("/books", 3, 5, 5, 7);
        assert_eq!(links.prev.as_deref(), Some("/books?page[offset]=2"));
    }

    #[test]
    fn test_page_length_law() {
        for total in 0..12u64 {
            for page in 1..5u64 {
                let request = PageRequest::new(page, 5);
                let expected = (total as i64 - request.skip() as i64).clamp(0, 5) as u64;
                assert_eq!(request.len_of(total), expected);
            }
        }
    }

    #[test]
    fn test_from_params() {
        let params = QueryParams::new().with("page[size]", "3").with("page[offset]", "2");
        let mut reader = ParamReader::new(&params);
        let page = PageRequest::from_params(&mut reader, 10, 100).unwrap();
        assert_eq!(page, PageRequest::new(2, 3));
        assert_eq!(page.skip(), 3);
    }

    #[test]
    fn test_from_params_bounds() {
        for (key, value) in [
            ("page[size]", "0"),
            ("page[size]", "101"),
            ("page[offset]", "0"),
            ("page[offset]", "x"),
        ] {
            let params = QueryParams::new().with(key, value);
            let mut reader = ParamReader::new(&params);
            let err = PageRequest::from_params(&mut reader, 10, 100).unwrap_err();
            assert_eq!(err.code, crate::error::ErrorCode::InvalidPagination);
        }
    }

    #[test]
    fn test_window_past_i64_is_rejected() {
        let params = QueryParams::new().with("page[offset]", "2000000000000000000");
        let mut reader = ParamReader::new(&params);
        let err = PageRequest::from_params(&mut reader, 10, 100).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidPagination);

        let params = QueryParams::new()
            .with("page[offset]", "92233720368547759")
            .with("page[size]", "100");
        let mut reader = ParamReader::new(&params);
        assert!(PageRequest::from_params(&mut reader, 10, 100).is_err());

        // The largest page whose last row still fits.
        let params = QueryParams::new()
            .with("page[offset]", "92233720368547758")
            .with("page[size]", "1");
        let mut reader = ParamReader::new(&params);
        let page = PageRequest::from_params(&mut reader, 10, 100).unwrap();
        assert_eq!(page.skip(), 92233720368547757);
    }

    #[test]
    fn test_defaults() {
        let params = QueryParams::new();
        let mut reader = ParamReader::new(&params);
        let page = PageRequest::from_params(&mut reader, 10, 100).unwrap();
        assert_eq!(page, PageRequest::first(10));
        assert_eq!(page.to_sql(), "LIMIT 10");
    }
}
