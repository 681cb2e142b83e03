//! Query sources that evaluate [`spec_core::Specification`]s.
//!
//! [`memory::MemorySource`] interprets specifications over rows held in
//! process; with the `sea-orm` feature, [`sea::SelectSource`] compiles them
//! onto a SeaORM `Select`.

pub mod interp;
pub mod memory;
#[cfg(feature = "sea-orm")]
pub mod sea;

pub use interp::EvalError;
pub use memory::{MemoryError, MemorySource};
#[cfg(feature = "sea-orm")]
pub use sea::{FieldKind, FieldMap, SelectError, SelectSource, SqlBuildError};
