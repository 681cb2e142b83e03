//! Query specifications: describe *what* to load (criteria, eager-load paths,
//! ordering, grouping, paging) once, and evaluate it against any queryable
//! source a persistence layer provides.

pub mod ast;
pub mod evaluator;
pub mod expr;
pub mod page;
pub mod params;
pub mod rewrite;
pub mod specification;

pub use evaluator::{evaluate, QueryExecutor, QuerySource, SpecificationExt};
pub use expr::{build_chained_navigation, Field, Include, Navigation, Predicate, Selector};
pub use page::{
    clamp_page_size, create_paged_list, create_paged_list_with, LimitCfg, PageList,
    PageListError,
};
pub use params::{normalize_search, ParamsConfig, ParamsError, SpecParams};
pub use specification::{
    OrderBy, Paging, SortDir, SpecError, SpecResult, Specification, SpecificationBuilder,
};
