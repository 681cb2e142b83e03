//! In-process [`QuerySource`] over a shared vector of rows.
//!
//! Steps are recorded lazily and replayed against a JSON projection of the
//! rows on `count`/`fetch`, so a source can be counted and then fetched
//! without the row set changing in between.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as Json;
use spec_core::ast::Lambda;
use spec_core::{Include, Predicate, QueryExecutor, QuerySource, Selector, SortDir};
use thiserror::Error;

use crate::interp::{self, EvalError};

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("row could not be projected: {0}")]
    Project(#[from] serde_json::Error),

    #[error("unknown navigation: {0}")]
    UnknownNavigation(String),

    #[error("include does not reach an entity: {0}")]
    ScalarInclude(String),
}

#[derive(Clone, Debug)]
enum Step {
    Filter(Lambda),
    Include(Vec<String>),
    Group(Lambda),
    Order(Lambda, SortDir),
    SkipTake(u64, u64),
}

pub struct MemorySource<T> {
    rows: Arc<Vec<T>>,
    steps: Vec<Step>,
    includes: Vec<String>,
    tracking: bool,
}

impl<T> Clone for MemorySource<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            steps: self.steps.clone(),
            includes: self.includes.clone(),
            tracking: self.tracking,
        }
    }
}

impl<T> MemorySource<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self::shared(Arc::new(rows))
    }

    pub fn shared(rows: Arc<Vec<T>>) -> Self {
        Self {
            rows,
            steps: Vec::new(),
            includes: Vec::new(),
            tracking: true,
        }
    }

    /// Include paths in the order they were requested.
    pub fn included_paths(&self) -> &[String] {
        &self.includes
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }
}

/// Row under evaluation: index into the backing vector plus its projection.
struct Working {
    index: usize,
    json: Json,
    group: usize,
}

impl<T: Serialize> MemorySource<T> {
    fn run(&self) -> Result<Vec<usize>, MemoryError> {
        let mut set = self
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                Ok(Working {
                    index,
                    json: serde_json::to_value(row)?,
                    group: 0,
                })
            })
            .collect::<Result<Vec<_>, MemoryError>>()?;
        let mut grouped = false;

        for step in &self.steps {
            match step {
                Step::Filter(lambda) => {
                    let mut kept = Vec::with_capacity(set.len());
                    for w in set {
                        if interp::matches(lambda, &w.json)? {
                            kept.push(w);
                        }
                    }
                    set = kept;
                }
                Step::Include(segments) => {
                    for w in &set {
                        check_path(&w.json, segments, segments)?;
                    }
                }
                Step::Group(lambda) => {
                    let mut seen: Vec<Json> = Vec::new();
                    for w in &mut set {
                        let key = interp::eval_lambda(lambda, &w.json)?;
                        w.group = match seen.iter().position(|k| *k == key) {
                            Some(i) => i,
                            None => {
                                seen.push(key);
                                seen.len() - 1
                            }
                        };
                    }
                    set.sort_by_key(|w| w.group);
                    grouped = true;
                }
                Step::Order(lambda, dir) => {
                    let mut keyed = set
                        .into_iter()
                        .map(|w| Ok((interp::eval_lambda(lambda, &w.json)?, w)))
                        .collect::<Result<Vec<_>, MemoryError>>()?;
                    keyed.sort_by(|(ka, a), (kb, b)| {
                        let within = match dir {
                            SortDir::Asc => interp::sort_cmp(ka, kb),
                            SortDir::Desc => interp::sort_cmp(kb, ka),
                        };
                        if grouped {
                            a.group.cmp(&b.group).then(within)
                        } else {
                            within
                        }
                    });
                    set = keyed.into_iter().map(|(_, w)| w).collect();
                }
                Step::SkipTake(skip, take) => {
                    let skip = usize::try_from(*skip).unwrap_or(usize::MAX);
                    let take = usize::try_from(*take).unwrap_or(usize::MAX);
                    set = set.into_iter().skip(skip).take(take).collect();
                }
            }
        }

        tracing::trace!(steps = self.steps.len(), rows = set.len(), "memory query replayed");
        Ok(set.into_iter().map(|w| w.index).collect())
    }
}

/// Every object reached along `segments` must carry the next key; `null`
/// references end the walk. The walk must end on an entity or a collection
/// of entities.
fn check_path(json: &Json, segments: &[String], path: &[String]) -> Result<(), MemoryError> {
    let Some((head, rest)) = segments.split_first() else {
        return match json {
            Json::Null | Json::Object(_) => Ok(()),
            Json::Array(items) => items.iter().try_for_each(|i| check_path(i, segments, path)),
            _ => Err(MemoryError::ScalarInclude(path.join("."))),
        };
    };
    match json {
        Json::Null => Ok(()),
        Json::Array(items) => items.iter().try_for_each(|i| check_path(i, segments, path)),
        Json::Object(map) => match map.get(head) {
            Some(next) => check_path(next, rest, path),
            None => Err(MemoryError::UnknownNavigation(path.join("."))),
        },
        _ => Err(MemoryError::UnknownNavigation(path.join("."))),
    }
}

impl<T> QuerySource<T> for MemorySource<T> {
    type Error = MemoryError;

    fn apply_filter(mut self, criteria: &Predicate<T>) -> Result<Self, MemoryError> {
        self.steps.push(Step::Filter(criteria.lambda().clone()));
        Ok(self)
    }

    fn apply_include(mut self, include: &Include<T>) -> Result<Self, MemoryError> {
        self.steps.push(Step::Include(include.segments().to_vec()));
        self.includes.push(include.path());
        Ok(self)
    }

    fn apply_group(mut self, key: &Selector<T>) -> Result<Self, MemoryError> {
        self.steps.push(Step::Group(key.lambda().clone()));
        Ok(self)
    }

    fn apply_order(mut self, key: &Selector<T>, dir: SortDir) -> Result<Self, MemoryError> {
        self.steps.push(Step::Order(key.lambda().clone(), dir));
        Ok(self)
    }

    fn apply_skip_take(mut self, skip: u64, take: u64) -> Result<Self, MemoryError> {
        self.steps.push(Step::SkipTake(skip, take));
        Ok(self)
    }

    fn as_no_tracking(mut self) -> Self {
        self.tracking = false;
        self
    }
}

#[async_trait]
impl<T> QueryExecutor<T> for MemorySource<T>
where
    T: Serialize + Clone + Send + Sync,
{
    async fn count(&self) -> Result<u64, MemoryError> {
        Ok(self.run()?.len() as u64)
    }

    async fn fetch(self) -> Result<Vec<T>, MemoryError> {
        let picked = self.run()?;
        Ok(picked.into_iter().map(|i| self.rows[i].clone()).collect())
    }
}
