//! Checked page index shared by the `mupdf` (0-based `i32`) and `lopdf`
//! (1-based `u32`) halves of the crate.

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(i32);

impl PageIndex {
    /// Validate a 0-based page number against the document's page count.
    pub fn try_from_page_num(page_num: usize, total_pages: usize) -> Result<Self, Error> {
        let invalid = || Error::PdfInvalidPage {
            page: page_num,
            total: total_pages,
        };
        if page_num >= total_pages {
            return Err(invalid());
        }
        i32::try_from(page_num).map(Self).map_err(|_| invalid())
    }

    /// Index for `mupdf` page loading.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// 1-based page number as used by `lopdf::Document::get_pages`.
    #[must_use]
    pub const fn as_lopdf_page_number(self) -> u32 {
        // Non-negative by construction
        (self.0 + 1).cast_unsigned()
    }
}

impl From<PageIndex> for i32 {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_page() {
        let idx = PageIndex::try_from_page_num(5, 10).unwrap();
        assert_eq!(idx.as_i32(), 5);
        assert_eq!(i32::from(idx), 5);
        assert_eq!(idx.as_lopdf_page_number(), 6);
    }

    #[test]
    fn test_out_of_range() {
        let err = PageIndex::try_from_page_num(10, 10).unwrap_err();
        assert!(matches!(err, Error::PdfInvalidPage { page: 10, total: 10 }));
        assert!(PageIndex::try_from_page_num(0, 0).is_err());
    }
}
