//! Page-size contract shared by the router and the client helpers.

use serde::{Deserialize, Serialize};

/// Records per page. Fixed on both sides of the wire.
pub const PAGE_SIZE: u64 = 100;

/// Query parameter carrying the 1-based page number.
pub const PAGE_PARAM: &str = "page";

/// Skip/take pair for one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageDescriptor {
    pub skip: u64,
    pub take: u64,
}

impl PageDescriptor {
    /// Page descriptor for a 1-based page number. Page 0 has no descriptor.
    pub fn for_page(page: u64) -> Option<Self> {
        if page == 0 {
            return None;
        }
        Some(PageDescriptor {
            skip: (page - 1) * PAGE_SIZE,
            take: PAGE_SIZE,
        })
    }

    /// Parse the raw `page` query value. Absent, non-numeric and non-positive values mean "no paging".
    pub fn from_query(page: Option<&str>) -> Option<Self> {
        page.and_then(|p| p.trim().parse::<u64>().ok())
            .and_then(Self::for_page)
    }
}

/// Body of a collection response: one page of projections plus the unpaged match count.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_arithmetic() {
        for page in 1..=50u64 {
            let d = PageDescriptor::from_query(Some(&page.to_string())).unwrap();
            assert_eq!(d.skip, (page - 1) * 100);
            assert_eq!(d.take, 100);
        }
    }

    #[test]
    fn no_paging_without_a_usable_page() {
        assert_eq!(PageDescriptor::from_query(None), None);
        assert_eq!(PageDescriptor::from_query(Some("")), None);
        assert_eq!(PageDescriptor::from_query(Some("abc")), None);
        assert_eq!(PageDescriptor::from_query(Some("-1")), None);
        assert_eq!(PageDescriptor::from_query(Some("0")), None);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(
            PageDescriptor::from_query(Some(" 3 ")),
            Some(PageDescriptor { skip: 200, take: 100 })
        );
    }
}
