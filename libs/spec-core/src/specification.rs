use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::{Include, Navigation, Predicate, Selector};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn reverse(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("conflicting ordering: {existing:?} order already set, cannot add {requested:?}")]
    ConflictingOrder {
        existing: SortDir,
        requested: SortDir,
    },

    #[error("paging take must be greater than zero")]
    InvalidTake,

    #[error("grouping and paging cannot be combined")]
    GroupingWithPaging,

    #[error("group-by already set")]
    DuplicateGroupBy,

    #[error("include is not a navigation path: {0}")]
    NotANavigation(String),
}

pub type SpecResult<T> = Result<T, SpecError>;

pub struct OrderBy<T> {
    pub key: Selector<T>,
    pub dir: SortDir,
}

impl<T> Clone for OrderBy<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            dir: self.dir,
        }
    }
}

impl<T> fmt::Debug for OrderBy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderBy")
            .field("key", &self.key)
            .field("dir", &self.dir)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paging {
    pub skip: u64,
    pub take: u64,
}

/// Declarative shape of a query over `T`.
///
/// Only [`SpecificationBuilder::build`] produces one, so every instance has
/// already passed validation: at most one ordering, `take > 0`, and never
/// grouping together with paging.
pub struct Specification<T> {
    criteria: Option<Predicate<T>>,
    includes: Vec<Include<T>>,
    order: Option<OrderBy<T>>,
    group_by: Option<Selector<T>>,
    paging: Option<Paging>,
    as_no_tracking: bool,
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            criteria: self.criteria.clone(),
            includes: self.includes.clone(),
            order: self.order.clone(),
            group_by: self.group_by.clone(),
            paging: self.paging,
            as_no_tracking: self.as_no_tracking,
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("criteria", &self.criteria)
            .field("includes", &self.includes)
            .field("order", &self.order)
            .field("group_by", &self.group_by)
            .field("paging", &self.paging)
            .field("as_no_tracking", &self.as_no_tracking)
            .finish()
    }
}

impl<T> Specification<T> {
    pub fn builder() -> SpecificationBuilder<T> {
        SpecificationBuilder::new()
    }

    pub fn criteria(&self) -> Option<&Predicate<T>> {
        self.criteria.as_ref()
    }

    pub fn includes(&self) -> &[Include<T>] {
        &self.includes
    }

    pub fn order(&self) -> Option<&OrderBy<T>> {
        self.order.as_ref()
    }

    pub fn order_by(&self) -> Option<&Selector<T>> {
        self.order
            .as_ref()
            .filter(|o| o.dir == SortDir::Asc)
            .map(|o| &o.key)
    }

    pub fn order_by_descending(&self) -> Option<&Selector<T>> {
        self.order
            .as_ref()
            .filter(|o| o.dir == SortDir::Desc)
            .map(|o| &o.key)
    }

    pub fn group_by(&self) -> Option<&Selector<T>> {
        self.group_by.as_ref()
    }

    pub fn paging(&self) -> Option<Paging> {
        self.paging
    }

    pub fn is_paging_enabled(&self) -> bool {
        self.paging.is_some()
    }

    pub fn skip(&self) -> u64 {
        self.paging.map_or(0, |p| p.skip)
    }

    pub fn take(&self) -> u64 {
        self.paging.map_or(0, |p| p.take)
    }

    pub fn as_no_tracking(&self) -> bool {
        self.as_no_tracking
    }

    /// Same shape without paging, e.g. for counting the matching rows.
    pub fn without_paging(&self) -> Self {
        Self {
            paging: None,
            ..self.clone()
        }
    }
}

/// Mutators a named specification uses while it is being constructed.
///
/// Errors are recorded rather than returned so calls stay chainable; the
/// first one is reported by [`SpecificationBuilder::build`].
pub struct SpecificationBuilder<T> {
    spec: Specification<T>,
    error: Option<SpecError>,
}

impl<T> Default for SpecificationBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SpecificationBuilder<T> {
    pub fn new() -> Self {
        Self {
            spec: Specification {
                criteria: None,
                includes: Vec::new(),
                order: None,
                group_by: None,
                paging: None,
                as_no_tracking: false,
            },
            error: None,
        }
    }

    fn fail(&mut self, err: SpecError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Replaces the criteria.
    pub fn criteria(mut self, predicate: Predicate<T>) -> Self {
        self.spec.criteria = Some(predicate);
        self
    }

    /// ANDs `predicate` onto the current criteria.
    pub fn and_criteria(mut self, predicate: Predicate<T>) -> Self {
        self.spec.criteria = Some(match self.spec.criteria.take() {
            Some(existing) => existing.and(&predicate),
            None => predicate,
        });
        self
    }

    /// ANDs `predicate` only when it is present.
    pub fn and_criteria_opt(self, predicate: Option<Predicate<T>>) -> Self {
        match predicate {
            Some(p) => self.and_criteria(p),
            None => self,
        }
    }

    pub fn add_include<P>(mut self, nav: &Navigation<T, P>) -> Self {
        match Include::from_navigation(nav) {
            Some(include) => self.spec.includes.push(include),
            None => self.fail(SpecError::NotANavigation(format!("{:?}", nav.lambda()))),
        }
        self
    }

    fn set_order(mut self, key: Selector<T>, dir: SortDir) -> Self {
        if let Some(existing) = &self.spec.order {
            let existing = existing.dir;
            self.fail(SpecError::ConflictingOrder {
                existing,
                requested: dir,
            });
            return self;
        }
        self.spec.order = Some(OrderBy { key, dir });
        self
    }

    pub fn add_order_by<K>(self, key: &Navigation<T, K>) -> Self {
        self.set_order(key.selector(), SortDir::Asc)
    }

    pub fn add_order_by_descending<K>(self, key: &Navigation<T, K>) -> Self {
        self.set_order(key.selector(), SortDir::Desc)
    }

    pub fn add_order<K>(self, key: &Navigation<T, K>, dir: SortDir) -> Self {
        self.set_order(key.selector(), dir)
    }

    pub fn apply_group_by<K>(mut self, key: &Navigation<T, K>) -> Self {
        if self.spec.group_by.is_some() {
            self.fail(SpecError::DuplicateGroupBy);
            return self;
        }
        self.spec.group_by = Some(key.selector());
        self
    }

    pub fn apply_paging(mut self, skip: u64, take: u64) -> Self {
        if take == 0 {
            self.fail(SpecError::InvalidTake);
            return self;
        }
        self.spec.paging = Some(Paging { skip, take });
        self
    }

    pub fn as_no_tracking(mut self) -> Self {
        self.spec.as_no_tracking = true;
        self
    }

    pub fn build(self) -> SpecResult<Specification<T>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.spec.group_by.is_some() && self.spec.paging.is_some() {
            return Err(SpecError::GroupingWithPaging);
        }
        Ok(self.spec)
    }
}
