//! Turns a [`Specification`] into a query against any [`QuerySource`].

use async_trait::async_trait;

use crate::expr::{Include, Predicate, Selector};
use crate::specification::{SortDir, Specification};

/// Composable, not-yet-executed query over `T`, implemented by a persistence
/// layer. Every step consumes the query and returns the refined one.
pub trait QuerySource<T>: Sized {
    type Error;

    fn apply_filter(self, criteria: &Predicate<T>) -> Result<Self, Self::Error>;

    fn apply_include(self, include: &Include<T>) -> Result<Self, Self::Error>;

    fn apply_group(self, key: &Selector<T>) -> Result<Self, Self::Error>;

    fn apply_order(self, key: &Selector<T>, dir: SortDir) -> Result<Self, Self::Error>;

    /// Skips `skip` rows, then keeps at most `take`.
    fn apply_skip_take(self, skip: u64, take: u64) -> Result<Self, Self::Error>;

    /// Marks the results as read-only for the caller.
    fn as_no_tracking(self) -> Self;
}

/// Executes a composed query. These are the only calls that reach the store;
/// cancelling is dropping the returned future.
#[async_trait]
pub trait QueryExecutor<T: Send>: QuerySource<T> + Send {
    async fn count(&self) -> Result<u64, Self::Error>;

    async fn fetch(self) -> Result<Vec<T>, Self::Error>;
}

/// Applies `spec` to `source`: criteria, includes (in order), grouping,
/// ordering, skip/take, then the no-tracking hint.
///
/// Ordering always precedes paging. Errors from the source are returned as-is.
pub fn evaluate<T, S>(spec: &Specification<T>, source: S) -> Result<S, S::Error>
where
    S: QuerySource<T>,
{
    tracing::debug!(
        criteria = spec.criteria().is_some(),
        includes = spec.includes().len(),
        grouped = spec.group_by().is_some(),
        order = ?spec.order().map(|o| o.dir),
        paging = ?spec.paging(),
        no_tracking = spec.as_no_tracking(),
        "evaluating specification"
    );

    let mut query = source;

    if let Some(criteria) = spec.criteria() {
        query = query.apply_filter(criteria)?;
    }

    for include in spec.includes() {
        query = query.apply_include(include)?;
    }

    if let Some(key) = spec.group_by() {
        query = query.apply_group(key)?;
    }

    if let Some(order) = spec.order() {
        query = query.apply_order(&order.key, order.dir)?;
    }

    if let Some(paging) = spec.paging() {
        query = query.apply_skip_take(paging.skip, paging.take)?;
    }

    if spec.as_no_tracking() {
        query = query.as_no_tracking();
    }

    Ok(query)
}

/// `source.apply_specification(&spec)` form of [`evaluate`].
pub trait SpecificationExt<T>: QuerySource<T> {
    fn apply_specification(self, spec: &Specification<T>) -> Result<Self, Self::Error> {
        evaluate(spec, self)
    }
}

impl<T, S: QuerySource<T>> SpecificationExt<T> for S {}
