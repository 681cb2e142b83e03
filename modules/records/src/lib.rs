//! Visitor, visit, employee and order records queried through named
//! specifications.

pub mod error;
pub mod model;
pub mod service;
pub mod specs;
pub mod store;

pub use error::DomainError;
pub use service::{RecordsService, Summary};
pub use specs::SortToken;
pub use store::{Dataset, MemoryStore, RecordStore};
