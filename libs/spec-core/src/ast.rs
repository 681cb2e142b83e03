//! Untyped expression tree shared by predicates, navigations and sort keys.
//!
//! Sources consume this tree (SQL compilers, the in-memory interpreter); the
//! typed front-end in [`crate::expr`] is the only thing that builds it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

/// Identity token of a lambda parameter.
///
/// Two parameters are the same variable only if their tokens are equal; the
/// shape of the expression around them never matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId {
    origin: u64,
    depth: u32,
}

impl ParamId {
    /// A parameter no other expression in this process refers to.
    pub fn fresh() -> Self {
        Self {
            origin: NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed),
            depth: 0,
        }
    }

    /// Binder introduced under `self` at `depth` (used for collection elements).
    pub fn nested(self, depth: u32) -> Self {
        Self {
            origin: self.origin,
            depth,
        }
    }

    pub fn origin(self) -> u64 {
        self.origin
    }

    pub fn depth(self) -> u32 {
        self.depth
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.depth == 0 {
            write!(f, "p{}", self.origin)
        } else {
            write!(f, "p{}_{}", self.origin, self.depth)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Param(ParamId),
    Member(Box<Expr>, String),
    /// Projects every element of a collection through the lambda.
    Select(Box<Expr>, Lambda),
    Count(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Box<Expr>, CompareOperator, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Function(String, Vec<Expr>),
    Value(Value),
}

/// One-parameter expression: `param => body`.
#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    pub param: ParamId,
    pub body: Box<Expr>,
}

impl Lambda {
    pub fn new(param: ParamId, body: Expr) -> Self {
        Self {
            param,
            body: Box::new(body),
        }
    }

    /// `x => x.name` with a fresh parameter.
    pub fn member(name: impl Into<String>) -> Self {
        let param = ParamId::fresh();
        Self::new(param, Expr::member(Expr::Param(param), name))
    }

    /// Deepest binder of this lambda's origin, counting the lambda itself.
    pub fn max_depth(&self) -> u32 {
        fn bump(p: ParamId, origin: u64, acc: &mut u32) {
            if p.origin() == origin {
                *acc = (*acc).max(p.depth());
            }
        }

        fn walk(e: &Expr, origin: u64, acc: &mut u32) {
            match e {
                Expr::Param(p) => bump(*p, origin, acc),
                Expr::Value(_) => {}
                Expr::Member(x, _) | Expr::Count(x) | Expr::Not(x) => walk(x, origin, acc),
                Expr::Select(src, l) => {
                    bump(l.param, origin, acc);
                    walk(src, origin, acc);
                    walk(&l.body, origin, acc);
                }
                Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(a, _, b) => {
                    walk(a, origin, acc);
                    walk(b, origin, acc);
                }
                Expr::In(x, list) => {
                    walk(x, origin, acc);
                    list.iter().for_each(|i| walk(i, origin, acc));
                }
                Expr::Function(_, args) => args.iter().for_each(|a| walk(a, origin, acc)),
            }
        }

        let mut acc = self.param.depth();
        walk(&self.body, self.param.origin(), &mut acc);
        acc
    }
}

impl Expr {
    pub fn member(base: Expr, name: impl Into<String>) -> Self {
        Expr::Member(Box::new(base), name.into())
    }

    pub fn value(v: impl Into<Value>) -> Self {
        Expr::Value(v.into())
    }

    /// Dotted navigation path rooted at `root`, if this node is one.
    ///
    /// `x.visits` → `visits`, `x.visits.Select(e => e.host)` → `visits.host`.
    pub fn navigation_path(&self, root: ParamId) -> Option<Vec<String>> {
        match self {
            Expr::Member(base, name) => {
                let mut path = match &**base {
                    Expr::Param(p) if *p == root => Vec::new(),
                    other => other.navigation_path(root)?,
                };
                path.push(name.clone());
                Some(path)
            }
            Expr::Select(src, lambda) => {
                let mut path = src.navigation_path(root)?;
                path.extend(lambda.body.navigation_path(lambda.param)?);
                Some(path)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(BigDecimal),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    String(String),
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(BigDecimal::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(BigDecimal::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(BigDecimal::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(BigDecimal::from(n))
    }
}

impl From<BigDecimal> for Value {
    fn from(n: BigDecimal) -> Self {
        Value::Number(n)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
