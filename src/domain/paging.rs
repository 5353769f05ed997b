//! Page-boundary arithmetic for the catalogue harvest.
//!
//! The catalogue serves at most one page of records per request, so a
//! harvest of `matched` records is split into requests with 1-based start
//! positions `1, 1+p, 1+2p, ...`. All of that arithmetic lives here; the
//! HTTP side only iterates the cursor.

use std::num::NonZeroU32;

/// Layout of a paged harvest: how many requests are needed and where
/// each of them starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingCursor {
    matched: u64,
    page_size: NonZeroU32,
}

impl PagingCursor {
    pub fn new(matched: u64, page_size: NonZeroU32) -> Self {
        Self { matched, page_size }
    }

    pub fn matched(&self) -> u64 {
        self.matched
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    /// Number of page requests needed to cover every matched record.
    pub fn page_count(&self) -> u64 {
        self.matched.div_ceil(u64::from(self.page_size.get()))
    }

    /// 1-based start positions in request order. Empty when nothing
    /// matched; the final page may be short.
    pub fn start_positions(self) -> impl Iterator<Item = u64> {
        let size = u64::from(self.page_size.get());
        (0..self.page_count()).map(move |page| 1 + page * size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cursor(matched: u64, page_size: u32) -> PagingCursor {
        PagingCursor::new(matched, NonZeroU32::new(page_size).unwrap())
    }

    #[test]
    fn test_start_positions_for_partial_last_page() {
        let starts: Vec<u64> = cursor(250, 100).start_positions().collect();
        assert_eq!(starts, vec![1, 101, 201]);
        assert_eq!(cursor(250, 100).page_count(), 3);
    }

    #[test]
    fn test_exact_multiple_has_no_extra_page() {
        let starts: Vec<u64> = cursor(200, 100).start_positions().collect();
        assert_eq!(starts, vec![1, 101]);
    }

    #[test]
    fn test_zero_matched_yields_no_pages() {
        assert_eq!(cursor(0, 100).page_count(), 0);
        assert_eq!(cursor(0, 100).start_positions().count(), 0);
    }

    #[test]
    fn test_single_record_fits_one_page() {
        let starts: Vec<u64> = cursor(1, 100).start_positions().collect();
        assert_eq!(starts, vec![1]);
    }

    #[test]
    fn test_page_size_one() {
        let starts: Vec<u64> = cursor(3, 1).start_positions().collect();
        assert_eq!(starts, vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn prop_pages_cover_every_record(matched in 0u64..5_000_000, page_size in 1u32..50_000) {
            let cursor = cursor(matched, page_size);
            let size = u64::from(page_size);
            prop_assert_eq!(cursor.page_count(), matched.div_ceil(size));

            let starts: Vec<u64> = cursor.start_positions().collect();
            prop_assert_eq!(starts.len() as u64, cursor.page_count());
            if matched == 0 {
                prop_assert!(starts.is_empty());
            } else {
                prop_assert_eq!(starts[0], 1);
                prop_assert!(starts.windows(2).all(|pair| pair[1] - pair[0] == size));
                let last = starts[starts.len() - 1];
                prop_assert!(last <= matched);
                prop_assert!(last + size > matched);
            }
        }
    }
}
