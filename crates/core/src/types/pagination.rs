//! Page/limit pagination shared by every list endpoint.

use serde::{Deserialize, Serialize};

/// Default page size when the client does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;
/// Largest page size a client can request.
pub const MAX_LIMIT: u32 = 100;

/// A clamped page request. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Clamp raw query values: missing or zero page becomes 1, missing limit
    /// becomes [`DEFAULT_LIMIT`], and limit is kept within `1..=MAX_LIMIT`.
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// SQL `LIMIT` value.
    #[must_use]
    pub fn sql_limit(&self) -> i64 {
        i64::from(self.limit)
    }

    /// SQL `OFFSET` value.
    #[must_use]
    pub fn sql_offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    /// Page metadata for a result set of `total` rows.
    #[must_use]
    pub fn meta(&self, total: i64) -> PageMeta {
        let total = total.max(0);
        let limit = i64::from(self.limit);
        PageMeta {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination block returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let p = Pagination::new(None, None);
        assert_eq!((p.page(), p.limit()), (1, DEFAULT_LIMIT));

        let p = Pagination::new(Some(0), Some(0));
        assert_eq!((p.page(), p.limit()), (1, 1));

        let p = Pagination::new(Some(3), Some(500));
        assert_eq!(p.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(Some(1), Some(20)).sql_offset(), 0);
        assert_eq!(Pagination::new(Some(3), Some(20)).sql_offset(), 40);
    }

    #[test]
    fn test_meta_total_pages() {
        let p = Pagination::new(Some(1), Some(20));
        assert_eq!(p.meta(0).total_pages, 0);
        assert_eq!(p.meta(20).total_pages, 1);
        assert_eq!(p.meta(21).total_pages, 2);
        assert_eq!(p.meta(-5).total, 0);
    }
}
