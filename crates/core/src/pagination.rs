//! Offset pagination math for list queries.

use serde::{Deserialize, Serialize};

/// Page number used when the client sends none (or garbage).
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when the client sends none (or garbage).
pub const DEFAULT_LIMIT: u64 = 10;

/// A validated page request (`page >= 1`, `limit >= 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Build a request, replacing zero values with the defaults.
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: if page == 0 { DEFAULT_PAGE } else { page },
            limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
        }
    }

    /// Build a request from raw query-string values.
    ///
    /// Parsing is lenient: leading whitespace is skipped and the leading run of
    /// digits is used (`"3abc"` is page 3). Absent, non-numeric, zero or
    /// negative values fall back to the defaults.
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        Self::new(
            page.and_then(parse_leading_positive).unwrap_or(DEFAULT_PAGE),
            limit.and_then(parse_leading_positive).unwrap_or(DEFAULT_LIMIT),
        )
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of records to skip: `(page - 1) * limit`, saturating.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Describe this request against a live total count.
    pub fn describe(&self, total: u64) -> PageInfo {
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            pages: total.div_ceil(self.limit),
        }
    }
}

/// Pagination descriptor returned next to a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

fn parse_leading_positive(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_start();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    match trimmed[..end].parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(v) => Some(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let req = PageRequest::from_raw(None, None);
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), 10);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn non_numeric_and_non_positive_fall_back() {
        let req = PageRequest::from_raw(Some("abc"), Some("-5"));
        assert_eq!(req, PageRequest::default());

        let req = PageRequest::from_raw(Some("0"), Some(""));
        assert_eq!(req, PageRequest::default());
    }

    #[test]
    fn leading_digits_are_used() {
        let req = PageRequest::from_raw(Some(" 3abc"), Some("7.9"));
        assert_eq!(req.page(), 3);
        assert_eq!(req.limit(), 7);
        assert_eq!(req.offset(), 14);
    }

    #[test]
    fn second_page_of_five_over_twelve() {
        let info = PageRequest::from_raw(Some("2"), Some("5")).describe(12);
        assert_eq!(
            info,
            PageInfo {
                page: 2,
                limit: 5,
                total: 12,
                pages: 3
            }
        );
    }

    #[test]
    fn empty_collection_has_zero_pages() {
        assert_eq!(PageRequest::default().describe(0).pages, 0);
    }

    #[test]
    fn huge_page_saturates_offset() {
        let req = PageRequest::new(u64::MAX, u64::MAX);
        assert_eq!(req.offset(), u64::MAX);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn pages_cover_total_exactly(limit in 1u64..1_000, total in 0u64..100_000) {
                let info = PageRequest::new(1, limit).describe(total);
                prop_assert!(info.pages * limit >= total);
                prop_assert!(info.pages == 0 || (info.pages - 1) * limit < total);
            }

            #[test]
            fn offset_is_page_minus_one_times_limit(page in 1u64..10_000, limit in 1u64..10_000) {
                let req = PageRequest::new(page, limit);
                prop_assert_eq!(req.offset(), (page - 1) * limit);
            }
        }
    }
}
