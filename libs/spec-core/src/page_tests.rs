use async_trait::async_trait;
use thiserror::Error;

use super::*;
use crate::evaluator::QuerySource;
use crate::expr::{Include, Predicate, Selector};
use crate::specification::SortDir;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("store unavailable")]
struct StoreDown;

/// Pre-filtered rows; only paging is supported.
struct Rows {
    rows: Vec<u32>,
    window: Option<(u64, u64)>,
    down: bool,
}

impl Rows {
    fn new(n: u32) -> Self {
        Self {
            rows: (1..=n).collect(),
            window: None,
            down: false,
        }
    }
}

impl QuerySource<u32> for Rows {
    type Error = StoreDown;

    fn apply_filter(self, _: &Predicate<u32>) -> Result<Self, StoreDown> {
        Ok(self)
    }

    fn apply_include(self, _: &Include<u32>) -> Result<Self, StoreDown> {
        Ok(self)
    }

    fn apply_group(self, _: &Selector<u32>) -> Result<Self, StoreDown> {
        Ok(self)
    }

    fn apply_order(self, _: &Selector<u32>, _: SortDir) -> Result<Self, StoreDown> {
        Ok(self)
    }

    fn apply_skip_take(mut self, skip: u64, take: u64) -> Result<Self, StoreDown> {
        self.window = Some((skip, take));
        Ok(self)
    }

    fn as_no_tracking(self) -> Self {
        self
    }
}

#[async_trait]
impl QueryExecutor<u32> for Rows {
    async fn count(&self) -> Result<u64, StoreDown> {
        if self.down {
            return Err(StoreDown);
        }
        Ok(self.rows.len() as u64)
    }

    async fn fetch(self) -> Result<Vec<u32>, StoreDown> {
        if self.down {
            return Err(StoreDown);
        }
        let (skip, take) = self.window.unwrap_or((0, u64::MAX));
        Ok(self
            .rows
            .into_iter()
            .skip(skip as usize)
            .take(take.min(usize::MAX as u64) as usize)
            .collect())
    }
}

#[test]
fn total_pages_is_ceiling() {
    for total in 0..=40u64 {
        for size in 1..=12u64 {
            let page = PageList::<u32>::new(Vec::new(), total, 1, size);
            assert_eq!(page.total_pages(), total.div_ceil(size));
            if total == 0 {
                assert_eq!(page.total_pages(), 0);
            }
        }
    }
}

#[test]
fn clamp_page_size_bounds() {
    let cfg = LimitCfg::default();
    assert_eq!(clamp_page_size(None, cfg), 8);
    assert_eq!(clamp_page_size(Some(0), cfg), 1);
    assert_eq!(clamp_page_size(Some(50), cfg), 50);
    assert_eq!(clamp_page_size(Some(51), cfg), 50);
    let once = clamp_page_size(Some(999), cfg);
    assert_eq!(clamp_page_size(Some(once), cfg), once);
}

#[tokio::test]
async fn second_page_of_seven() {
    let page = create_paged_list(Rows::new(7), 2, 3).await.unwrap();

    assert_eq!(page.items(), &[4, 5, 6]);
    assert_eq!(page.total_pages(), 3);
    assert_eq!(page.current_page(), 2);
    assert_eq!(page.total_count(), 7);
    assert!(page.has_previous());
    assert!(page.has_next());
}

#[tokio::test]
async fn last_page_holds_the_remainder() {
    for total in 1..=20u32 {
        for size in 1..=6u64 {
            let pages = u64::from(total).div_ceil(size);
            let last = create_paged_list(Rows::new(total), pages, size)
                .await
                .unwrap();
            let rem = u64::from(total) % size;
            let expected = if rem == 0 { size } else { rem };
            assert_eq!(last.items().len() as u64, expected, "total {total} size {size}");
            assert!(!last.has_next());
        }
    }
}

#[tokio::test]
async fn page_size_is_clamped_before_use() {
    let page = create_paged_list(Rows::new(120), 1, 500).await.unwrap();
    assert_eq!(page.page_size(), 50);
    assert_eq!(page.items().len(), 50);
    assert_eq!(page.total_pages(), 3);
}

#[tokio::test]
async fn page_index_zero_is_rejected() {
    let err = create_paged_list(Rows::new(3), 0, 3).await.unwrap_err();
    assert!(matches!(err, PageListError::InvalidPageIndex(0)));
}

#[tokio::test]
async fn source_errors_pass_through() {
    let mut rows = Rows::new(3);
    rows.down = true;
    let err = create_paged_list(rows, 1, 3).await.unwrap_err();
    assert!(matches!(err, PageListError::Source(StoreDown)));
    assert_eq!(err.to_string(), "store unavailable");
}

#[test]
fn page_list_serializes_camel_case() {
    let page = PageList::new(vec!["a"], 1, 1, 8);
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["currentPage"], 1);
    assert_eq!(json["pageSize"], 8);
    assert_eq!(json["totalCount"], 1);
    assert_eq!(json["totalPages"], 1);
    assert_eq!(json["items"][0], "a");
}
