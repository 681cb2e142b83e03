//! Offset pagination: page metadata plus the page slice.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evaluator::QueryExecutor;

pub const DEFAULT_PAGE_SIZE: u64 = 8;
pub const MAX_PAGE_SIZE: u64 = 50;

/// One page of results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageList<T> {
    current_page: u64,
    page_size: u64,
    total_count: u64,
    total_pages: u64,
    items: Vec<T>,
}

impl<T> PageList<T> {
    /// `page_size` must be at least 1.
    pub fn new(items: Vec<T>, total_count: u64, current_page: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        Self {
            current_page,
            page_size,
            total_count,
            total_pages: total_count.div_ceil(page_size),
            items,
        }
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageList<U> {
        PageList {
            current_page: self.current_page,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCfg {
    pub default: u64,
    pub max: u64,
}

impl Default for LimitCfg {
    fn default() -> Self {
        Self {
            default: DEFAULT_PAGE_SIZE,
            max: MAX_PAGE_SIZE,
        }
    }
}

/// Clamps a requested page size into `[1, cfg.max]`; `None` means the default.
pub fn clamp_page_size(req: Option<u64>, cfg: LimitCfg) -> u64 {
    let mut l = req.unwrap_or(cfg.default);
    if l == 0 {
        l = 1;
    }
    if l > cfg.max {
        l = cfg.max;
    }
    l
}

#[derive(Debug, Error)]
pub enum PageListError<E> {
    #[error("invalid page index {0}: pages are numbered from 1")]
    InvalidPageIndex(u64),

    #[error(transparent)]
    Source(E),
}

/// [`create_paged_list_with`] using the default limits.
pub async fn create_paged_list<T, S>(
    source: S,
    page_index: u64,
    page_size: u64,
) -> Result<PageList<T>, PageListError<S::Error>>
where
    T: Send,
    S: QueryExecutor<T>,
{
    create_paged_list_with(source, page_index, page_size, LimitCfg::default()).await
}

/// Counts `source`, then fetches page `page_index` (1-based) of it.
///
/// `source` must be filtered and ordered but not yet paged. Count and fetch
/// are separate round trips, so under concurrent writes the total may be
/// slightly off from the page that was read.
pub async fn create_paged_list_with<T, S>(
    source: S,
    page_index: u64,
    page_size: u64,
    cfg: LimitCfg,
) -> Result<PageList<T>, PageListError<S::Error>>
where
    T: Send,
    S: QueryExecutor<T>,
{
    let page_size = clamp_page_size(Some(page_size), cfg);
    if page_index == 0 {
        return Err(PageListError::InvalidPageIndex(page_index));
    }

    let total = source.count().await.map_err(PageListError::Source)?;
    let skip = (page_index - 1).saturating_mul(page_size);

    let items = source
        .apply_skip_take(skip, page_size)
        .map_err(PageListError::Source)?
        .fetch()
        .await
        .map_err(PageListError::Source)?;

    tracing::debug!(
        page_index,
        page_size,
        total,
        fetched = items.len(),
        "page materialized"
    );

    Ok(PageList::new(items, total, page_index, page_size))
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod page_tests;
