//! Query parameters as they arrive from a query string, normalized once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("parameter '{key}' must be a non-negative integer, got '{value}'")]
    InvalidNumber { key: String, value: String },
}

/// Lower-cases and trims a search term; empty input means no search.
pub fn normalize_search(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Paging, sorting and search input for a named specification.
///
/// Setters normalize; getters return what was stored. Out-of-range page
/// index and page size are clamped, never rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecParams {
    page_index: u64,
    page_size: u64,
    max_page_size: u64,
    child_count: Option<u64>,
    sort: Option<String>,
    search: Option<String>,
}

impl Default for SpecParams {
    fn default() -> Self {
        Self::with_config(ParamsConfig::default())
    }
}

impl SpecParams {
    pub fn with_config(cfg: ParamsConfig) -> Self {
        let max_page_size = cfg.max_page_size.max(1);
        Self {
            page_index: 1,
            page_size: cfg.default_page_size.clamp(1, max_page_size),
            max_page_size,
            child_count: None,
            sort: None,
            search: None,
        }
    }

    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    pub fn set_page_index(&mut self, page_index: u64) {
        self.page_index = page_index.max(1);
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: u64) {
        self.page_size = page_size.clamp(1, self.max_page_size);
    }

    pub fn max_page_size(&self) -> u64 {
        self.max_page_size
    }

    pub fn child_count(&self) -> Option<u64> {
        self.child_count
    }

    pub fn set_child_count(&mut self, child_count: Option<u64>) {
        self.child_count = child_count;
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    pub fn set_sort(&mut self, sort: Option<&str>) {
        self.sort = sort
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn set_search(&mut self, search: Option<&str>) {
        self.search = search.and_then(normalize_search);
    }

    pub fn skip(&self) -> u64 {
        (self.page_index - 1).saturating_mul(self.page_size)
    }

    pub fn take(&self) -> u64 {
        self.page_size
    }

    /// Builds parameters from flat key/value pairs (`pageIndex`, `pageSize`,
    /// `search`, `sort`, `childCount`). Keys are case-insensitive and unknown
    /// keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I, cfg: ParamsConfig) -> Result<Self, ParamsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::with_config(cfg);
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key.to_ascii_lowercase().as_str() {
                "pageindex" => params.set_page_index(parse_number(key, value)?),
                "pagesize" => params.set_page_size(parse_number(key, value)?),
                "childcount" => params.set_child_count(Some(parse_number(key, value)?)),
                "sort" => params.set_sort(Some(value)),
                "search" => params.set_search(Some(value)),
                other => tracing::trace!(key = other, "ignoring unknown query parameter"),
            }
        }
        Ok(params)
    }

    /// Parses an `a=1&b=2` query string (leading `?` allowed).
    pub fn from_query_string(query: &str, cfg: ParamsConfig) -> Result<Self, ParamsError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()), cfg)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ParamsError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ParamsError::InvalidNumber {
            key: key.to_string(),
            value: value.to_string(),
        })
}
