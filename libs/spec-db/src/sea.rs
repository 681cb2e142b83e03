//! Specification → SeaORM `Select` compiler (expression tree in, SQL out).
//!
//! Only the criteria shapes a relational WHERE clause can carry are
//! accepted: a whitelisted column (optionally lower-cased) compared with a
//! literal, IN lists, LIKE-style string functions and boolean connectives.
//!
//! String functions compile to `LIKE` with an explicit escape character, so
//! `%` and `_` in a needle match literally. Letter case follows the backend's
//! `LIKE` collation (ASCII case-insensitive on SQLite, case-sensitive on
//! Postgres); lower-case both sides with `to_lower()` for portable matching.
//! Navigation into related entities must be registered as a relation and is
//! honoured as an include only.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr as SqlExpr, Func, LikeExpr, Order},
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use spec_core::ast::{CompareOperator, Expr, ParamId, Value};
use spec_core::{Include, Predicate, QueryExecutor, QuerySource, Selector, SortDir};
use thiserror::Error;

/// Whitelisted field kind → used to coerce literals into `sea_orm::Value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    Uuid,
    DateTimeUtc,
    Date,
    Time,
    Decimal,
}

#[derive(Clone)]
pub struct Field<E: EntityTrait> {
    pub col: E::Column,
    pub kind: FieldKind,
}

/// Member names a specification may use, mapped to columns, plus the
/// relation paths that may be included.
#[derive(Clone)]
pub struct FieldMap<E: EntityTrait> {
    map: HashMap<String, Field<E>>,
    relations: HashSet<String>,
}

impl<E: EntityTrait> Default for FieldMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> FieldMap<E> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            relations: HashSet::new(),
        }
    }

    pub fn insert(mut self, name: impl Into<String>, col: E::Column, kind: FieldKind) -> Self {
        self.map.insert(name.into().to_lowercase(), Field { col, kind });
        self
    }

    /// Registers a dotted include path (`host`, `visits.host`).
    pub fn relation(mut self, path: impl Into<String>) -> Self {
        self.relations.insert(path.into().to_lowercase());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field<E>> {
        self.map.get(&name.to_lowercase())
    }

    pub fn has_relation(&self, path: &str) -> bool {
        self.relations.contains(&path.to_lowercase())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SqlBuildError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    #[error("type mismatch: expected {expected:?}, got {got}")]
    TypeMismatch {
        expected: FieldKind,
        got: &'static str,
    },

    #[error("unsupported operator: {0:?}")]
    UnsupportedOp(CompareOperator),

    #[error("unsupported function or args: {0}()")]
    UnsupportedFn(String),

    #[error("IN() list supports only literals")]
    NonLiteralInList,

    #[error("navigation into related entities is not supported here: {0}")]
    NestedNavigation(String),

    #[error("bare field not allowed: {0}")]
    BareField(String),

    #[error("bare literal not allowed")]
    BareLiteral,

    #[error("{0}")]
    Other(&'static str),
}

pub type SqlBuildResult<T> = Result<T, SqlBuildError>;

/* ---------- coercion helpers ---------- */

fn bigdecimal_to_decimal(bd: &BigDecimal) -> SqlBuildResult<Decimal> {
    let s = bd.normalized().to_string();
    Decimal::from_str_exact(&s)
        .or_else(|_| s.parse::<Decimal>())
        .map_err(|_| SqlBuildError::Other("invalid decimal"))
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::Uuid(_) => "uuid",
        Value::DateTime(_) => "datetime",
        Value::Date(_) => "date",
        Value::Time(_) => "time",
        Value::String(_) => "string",
    }
}

fn coerce(kind: FieldKind, v: &Value) -> SqlBuildResult<sea_orm::Value> {
    let mismatch = || SqlBuildError::TypeMismatch {
        expected: kind,
        got: value_kind(v),
    };

    Ok(match (kind, v) {
        (FieldKind::String, Value::String(s)) => {
            sea_orm::Value::String(Some(Box::new(s.clone())))
        }
        (FieldKind::I64, Value::Number(n)) => {
            sea_orm::Value::BigInt(Some(n.to_i64().ok_or_else(mismatch)?))
        }
        (FieldKind::F64, Value::Number(n)) => {
            sea_orm::Value::Double(Some(n.to_f64().ok_or_else(mismatch)?))
        }
        (FieldKind::Decimal, Value::Number(n)) => {
            sea_orm::Value::Decimal(Some(Box::new(bigdecimal_to_decimal(n)?)))
        }
        (FieldKind::Bool, Value::Bool(b)) => sea_orm::Value::Bool(Some(*b)),
        (FieldKind::Uuid, Value::Uuid(u)) => sea_orm::Value::Uuid(Some(Box::new(*u))),
        (FieldKind::DateTimeUtc, Value::DateTime(dt)) => {
            sea_orm::Value::ChronoDateTimeUtc(Some(Box::new(*dt)))
        }
        (FieldKind::Date, Value::Date(d)) => sea_orm::Value::ChronoDate(Some(Box::new(*d))),
        (FieldKind::Time, Value::Time(t)) => sea_orm::Value::ChronoTime(Some(Box::new(*t))),
        _ => return Err(mismatch()),
    })
}

fn coerce_many(kind: FieldKind, items: &[Expr]) -> SqlBuildResult<Vec<sea_orm::Value>> {
    items
        .iter()
        .map(|e| match e {
            Expr::Value(v) => coerce(kind, v),
            _ => Err(SqlBuildError::NonLiteralInList),
        })
        .collect()
}

/* ---------- LIKE helpers ---------- */

const LIKE_ESCAPE: char = '!';

fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

fn like_expr(pattern: String) -> LikeExpr {
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

/* ---------- operand resolution ---------- */

/// Left-hand side of a comparison: a column, or `lower(column)`.
struct Operand<'a, E: EntityTrait> {
    field: &'a Field<E>,
    lowered: bool,
}

impl<E: EntityTrait> Operand<'_, E>
where
    E::Column: ColumnTrait + Copy,
{
    fn sql(&self) -> SqlExpr {
        if self.lowered {
            SqlExpr::expr(Func::lower(SqlExpr::col(self.field.col)))
        } else {
            SqlExpr::col(self.field.col)
        }
    }

    fn ensure_string(&self) -> SqlBuildResult<()> {
        if self.field.kind != FieldKind::String {
            return Err(SqlBuildError::TypeMismatch {
                expected: FieldKind::String,
                got: "non-string field",
            });
        }
        Ok(())
    }
}

fn operand<'a, E: EntityTrait>(
    expr: &Expr,
    root: ParamId,
    fmap: &'a FieldMap<E>,
) -> SqlBuildResult<Operand<'a, E>>
where
    E::Column: ColumnTrait + Copy,
{
    match expr {
        Expr::Member(base, name) => match &**base {
            Expr::Param(p) if *p == root => {
                let field = fmap
                    .get(name)
                    .ok_or_else(|| SqlBuildError::UnknownField(name.clone()))?;
                Ok(Operand {
                    field,
                    lowered: false,
                })
            }
            _ => Err(SqlBuildError::NestedNavigation(
                expr.navigation_path(root)
                    .map(|p| p.join("."))
                    .unwrap_or_else(|| name.clone()),
            )),
        },
        Expr::Function(f, args) if f.eq_ignore_ascii_case("tolower") => match args.as_slice() {
            [inner] => {
                let op = operand(inner, root, fmap)?;
                op.ensure_string()?;
                Ok(Operand {
                    field: op.field,
                    lowered: true,
                })
            }
            _ => Err(SqlBuildError::UnsupportedFn(f.clone())),
        },
        Expr::Count(_) => Err(SqlBuildError::Other("count() is not supported in criteria")),
        Expr::Value(_) => Err(SqlBuildError::BareLiteral),
        _ => Err(SqlBuildError::Other("unsupported comparison form")),
    }
}

/* ---------- Expr (AST) -> Condition ---------- */

/// Compiles a predicate body whose parameter is `root`.
pub fn expr_to_condition<E: EntityTrait>(
    expr: &Expr,
    root: ParamId,
    fmap: &FieldMap<E>,
) -> SqlBuildResult<Condition>
where
    E::Column: ColumnTrait + Copy,
{
    use CompareOperator as Op;

    Ok(match expr {
        Expr::And(a, b) => {
            let left = expr_to_condition(a, root, fmap)?;
            let right = expr_to_condition(b, root, fmap)?;
            Condition::all().add(left).add(right)
        }
        Expr::Or(a, b) => {
            let left = expr_to_condition(a, root, fmap)?;
            let right = expr_to_condition(b, root, fmap)?;
            Condition::any().add(left).add(right)
        }
        Expr::Not(x) => {
            let inner = expr_to_condition(x, root, fmap)?;
            Condition::all().not().add(inner)
        }

        Expr::Compare(l, op, r) => {
            let lhs = operand(l, root, fmap)?;
            let rhs = match &**r {
                Expr::Value(v) => v,
                _ => {
                    return Err(SqlBuildError::Other(
                        "right side of a comparison must be a literal",
                    ))
                }
            };

            if matches!(rhs, Value::Null) {
                return Ok(match op {
                    Op::Eq => Condition::all().add(lhs.sql().is_null()),
                    Op::Ne => Condition::all().add(lhs.sql().is_not_null()),
                    _ => return Err(SqlBuildError::UnsupportedOp(*op)),
                });
            }

            let kind = if lhs.lowered {
                FieldKind::String
            } else {
                lhs.field.kind
            };
            let v = coerce(kind, rhs)?;
            let e = match op {
                Op::Eq => lhs.sql().eq(v),
                Op::Ne => lhs.sql().ne(v),
                Op::Gt => lhs.sql().gt(v),
                Op::Ge => lhs.sql().gte(v),
                Op::Lt => lhs.sql().lt(v),
                Op::Le => lhs.sql().lte(v),
            };
            Condition::all().add(e)
        }

        Expr::In(l, list) => {
            let lhs = operand(l, root, fmap)?;
            let vals = coerce_many(lhs.field.kind, list)?;
            if vals.is_empty() {
                // IN () → always false
                Condition::all().add(SqlExpr::cust("1=0"))
            } else {
                Condition::all().add(lhs.sql().is_in(vals))
            }
        }

        Expr::Function(fname, args) => {
            let n = fname.to_ascii_lowercase();
            let (target, needle) = match args.as_slice() {
                [target, Expr::Value(Value::String(s))] => (target, s),
                _ => return Err(SqlBuildError::UnsupportedFn(fname.clone())),
            };
            let needle = like_escape(needle);
            let pattern = match n.as_str() {
                "contains" => format!("%{needle}%"),
                "startswith" => format!("{needle}%"),
                "endswith" => format!("%{needle}"),
                _ => return Err(SqlBuildError::UnsupportedFn(fname.clone())),
            };
            let lhs = operand(target, root, fmap)?;
            lhs.ensure_string()?;
            Condition::all().add(lhs.sql().like(like_expr(pattern)))
        }

        Expr::Member(_, name) => return Err(SqlBuildError::BareField(name.clone())),
        Expr::Param(p) => return Err(SqlBuildError::BareField(p.to_string())),
        Expr::Value(_) => return Err(SqlBuildError::BareLiteral),
        Expr::Count(_) | Expr::Select(..) => {
            return Err(SqlBuildError::Other(
                "collection expressions are not supported in criteria",
            ))
        }
    })
}

pub fn predicate_to_condition<T, E: EntityTrait>(
    predicate: &Predicate<T>,
    fmap: &FieldMap<E>,
) -> SqlBuildResult<Condition>
where
    E::Column: ColumnTrait + Copy,
{
    expr_to_condition(predicate.body(), predicate.param(), fmap)
}

/// Column a sort or group key refers to; only direct members are accepted.
pub fn selector_column<'a, T, E: EntityTrait>(
    key: &Selector<T>,
    fmap: &'a FieldMap<E>,
) -> SqlBuildResult<&'a Field<E>>
where
    E::Column: ColumnTrait + Copy,
{
    let lambda = key.lambda();
    operand(&lambda.body, lambda.param, fmap).and_then(|op| {
        if op.lowered {
            Err(SqlBuildError::Other("computed sort keys are not supported"))
        } else {
            Ok(op.field)
        }
    })
}

/* ---------- QuerySource over Select<E> ---------- */

#[derive(Debug, Error)]
pub enum SelectError {
    #[error(transparent)]
    Build(#[from] SqlBuildError),

    #[error(transparent)]
    Db(#[from] DbErr),
}

/// A `Select<E>` being refined by a specification, bound to a connection.
pub struct SelectSource<'c, E: EntityTrait, C> {
    select: Select<E>,
    conn: &'c C,
    fmap: &'c FieldMap<E>,
    includes: Vec<String>,
    tracking: bool,
}

impl<'c, E: EntityTrait, C> SelectSource<'c, E, C> {
    pub fn new(select: Select<E>, conn: &'c C, fmap: &'c FieldMap<E>) -> Self {
        Self {
            select,
            conn,
            fmap,
            includes: Vec::new(),
            tracking: true,
        }
    }

    pub fn included_paths(&self) -> &[String] {
        &self.includes
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn into_select(self) -> Select<E> {
        self.select
    }
}

fn sea_order(dir: SortDir) -> Order {
    match dir {
        SortDir::Asc => Order::Asc,
        SortDir::Desc => Order::Desc,
    }
}

impl<E, C> QuerySource<E::Model> for SelectSource<'_, E, C>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    type Error = SelectError;

    fn apply_filter(mut self, criteria: &Predicate<E::Model>) -> Result<Self, SelectError> {
        let cond = predicate_to_condition(criteria, self.fmap)?;
        self.select = self.select.filter(cond);
        Ok(self)
    }

    fn apply_include(mut self, include: &Include<E::Model>) -> Result<Self, SelectError> {
        let path = include.path();
        if !self.fmap.has_relation(&path) {
            return Err(SqlBuildError::UnknownRelation(path).into());
        }
        self.includes.push(path);
        Ok(self)
    }

    /// Rows sharing a key are made contiguous by a leading sort on the key.
    fn apply_group(mut self, key: &Selector<E::Model>) -> Result<Self, SelectError> {
        let col = selector_column(key, self.fmap)?.col;
        self.select = self.select.order_by(col, Order::Asc);
        Ok(self)
    }

    fn apply_order(mut self, key: &Selector<E::Model>, dir: SortDir) -> Result<Self, SelectError> {
        let col = selector_column(key, self.fmap)?.col;
        self.select = self.select.order_by(col, sea_order(dir));
        Ok(self)
    }

    fn apply_skip_take(mut self, skip: u64, take: u64) -> Result<Self, SelectError> {
        self.select = self.select.offset(skip).limit(take);
        Ok(self)
    }

    fn as_no_tracking(mut self) -> Self {
        self.tracking = false;
        self
    }
}

#[async_trait]
impl<E, C> QueryExecutor<E::Model> for SelectSource<'_, E, C>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
    E::Model: Send + Sync + 'static,
    C: ConnectionTrait + Send + Sync,
{
    async fn count(&self) -> Result<u64, SelectError> {
        Ok(PaginatorTrait::count(self.select.clone(), self.conn).await?)
    }

    async fn fetch(self) -> Result<Vec<E::Model>, SelectError> {
        tracing::debug!(includes = ?self.includes, tracking = self.tracking, "fetching rows");
        Ok(self.select.all(self.conn).await?)
    }
}
