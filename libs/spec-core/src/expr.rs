//! Typed front-end over [`crate::ast`].
//!
//! `Field<T, V>` names a property, `Navigation<T, P>` is a lambda `T -> P`,
//! `Predicate<T>` is a lambda `T -> bool`. The type parameters exist only at
//! compile time; they make chaining a navigation onto the wrong entity type a
//! type error instead of a malformed tree.

use std::fmt;
use std::marker::PhantomData;

use crate::ast::{CompareOperator, Expr, Lambda, ParamId, Value};
use crate::rewrite::substitute;

/// Property `name` of entity `T`, holding a `V`.
pub struct Field<T, V> {
    name: &'static str,
    _marker: PhantomData<fn(&T) -> V>,
}

impl<T, V> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Field<T, V> {}

impl<T, V> fmt::Debug for Field<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

impl<T, V> Field<T, V> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// `x => x.<name>`
    pub fn nav(&self) -> Navigation<T, V> {
        Navigation::from_lambda(Lambda::member(self.name))
    }

    pub fn eq(&self, v: impl Into<Value>) -> Predicate<T> {
        self.nav().eq(v)
    }

    pub fn ne(&self, v: impl Into<Value>) -> Predicate<T> {
        self.nav().ne(v)
    }

    pub fn gt(&self, v: impl Into<Value>) -> Predicate<T> {
        self.nav().gt(v)
    }

    pub fn ge(&self, v: impl Into<Value>) -> Predicate<T> {
        self.nav().ge(v)
    }

    pub fn lt(&self, v: impl Into<Value>) -> Predicate<T> {
        self.nav().lt(v)
    }

    pub fn le(&self, v: impl Into<Value>) -> Predicate<T> {
        self.nav().le(v)
    }

    pub fn is_in<I, X>(&self, values: I) -> Predicate<T>
    where
        I: IntoIterator<Item = X>,
        X: Into<Value>,
    {
        self.nav().is_in(values)
    }

    pub fn is_null(&self) -> Predicate<T> {
        self.nav().is_null()
    }
}

impl<T> Field<T, String> {
    pub fn contains(&self, needle: impl Into<String>) -> Predicate<T> {
        self.nav().contains(needle)
    }

    pub fn starts_with(&self, prefix: impl Into<String>) -> Predicate<T> {
        self.nav().starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: impl Into<String>) -> Predicate<T> {
        self.nav().ends_with(suffix)
    }

    pub fn to_lower(&self) -> Navigation<T, String> {
        self.nav().to_lower()
    }
}

impl<T, P> Field<T, Vec<P>> {
    pub fn count(&self) -> Navigation<T, u64> {
        self.nav().count()
    }
}

/// Typed lambda from `T` to `P`: a related entity, a collection, or a key.
pub struct Navigation<T, P> {
    lambda: Lambda,
    _marker: PhantomData<fn(&T) -> P>,
}

impl<T, P> Clone for Navigation<T, P> {
    fn clone(&self) -> Self {
        Self::from_lambda(self.lambda.clone())
    }
}

impl<T, P> fmt::Debug for Navigation<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Navigation").field(&self.lambda).finish()
    }
}

impl<T, P> Navigation<T, P> {
    fn from_lambda(lambda: Lambda) -> Self {
        Self {
            lambda,
            _marker: PhantomData,
        }
    }

    pub fn member(name: impl Into<String>) -> Self {
        Self::from_lambda(Lambda::member(name))
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    pub fn into_lambda(self) -> Lambda {
        self.lambda
    }

    fn map_body(&self, f: impl FnOnce(Expr) -> Expr) -> Expr {
        f((*self.lambda.body).clone())
    }

    /// Follows a single-valued reference: `x => next(self(x))`.
    pub fn then<Q>(&self, next: &Navigation<P, Q>) -> Navigation<T, Q> {
        let body = substitute(&next.lambda.body, next.lambda.param, &self.lambda.body);
        Navigation::from_lambda(Lambda::new(self.lambda.param, body))
    }

    pub fn then_field<Q>(&self, field: Field<P, Q>) -> Navigation<T, Q> {
        self.then(&field.nav())
    }

    pub fn selector(&self) -> Selector<T> {
        Selector::from_lambda(self.lambda.clone())
    }

    pub fn compare(&self, op: CompareOperator, v: impl Into<Value>) -> Predicate<T> {
        let body = self.map_body(|b| Expr::Compare(Box::new(b), op, Box::new(Expr::value(v))));
        Predicate::from_lambda(Lambda::new(self.lambda.param, body))
    }

    pub fn eq(&self, v: impl Into<Value>) -> Predicate<T> {
        self.compare(CompareOperator::Eq, v)
    }

    pub fn ne(&self, v: impl Into<Value>) -> Predicate<T> {
        self.compare(CompareOperator::Ne, v)
    }

    pub fn gt(&self, v: impl Into<Value>) -> Predicate<T> {
        self.compare(CompareOperator::Gt, v)
    }

    pub fn ge(&self, v: impl Into<Value>) -> Predicate<T> {
        self.compare(CompareOperator::Ge, v)
    }

    pub fn lt(&self, v: impl Into<Value>) -> Predicate<T> {
        self.compare(CompareOperator::Lt, v)
    }

    pub fn le(&self, v: impl Into<Value>) -> Predicate<T> {
        self.compare(CompareOperator::Le, v)
    }

    pub fn is_null(&self) -> Predicate<T> {
        self.compare(CompareOperator::Eq, Value::Null)
    }

    pub fn is_in<I, X>(&self, values: I) -> Predicate<T>
    where
        I: IntoIterator<Item = X>,
        X: Into<Value>,
    {
        let list = values.into_iter().map(Expr::value).collect();
        let body = self.map_body(|b| Expr::In(Box::new(b), list));
        Predicate::from_lambda(Lambda::new(self.lambda.param, body))
    }

    fn call(&self, name: &str, arg: Option<Value>) -> Expr {
        self.map_body(|b| {
            let mut args = vec![b];
            args.extend(arg.map(Expr::Value));
            Expr::Function(name.to_string(), args)
        })
    }
}

impl<T> Navigation<T, String> {
    fn string_fn(&self, name: &str, arg: String) -> Predicate<T> {
        let body = self.call(name, Some(Value::String(arg)));
        Predicate::from_lambda(Lambda::new(self.lambda.param, body))
    }

    pub fn contains(&self, needle: impl Into<String>) -> Predicate<T> {
        self.string_fn("contains", needle.into())
    }

    pub fn starts_with(&self, prefix: impl Into<String>) -> Predicate<T> {
        self.string_fn("startswith", prefix.into())
    }

    pub fn ends_with(&self, suffix: impl Into<String>) -> Predicate<T> {
        self.string_fn("endswith", suffix.into())
    }

    pub fn to_lower(&self) -> Navigation<T, String> {
        Navigation::from_lambda(Lambda::new(self.lambda.param, self.call("tolower", None)))
    }
}

impl<T, P> Navigation<T, Vec<P>> {
    /// Loads `next` for every element of this collection.
    ///
    /// The element parameter of the result is a new binder derived from this
    /// navigation's parameter; `next`'s own parameter does not survive.
    pub fn then_include<Q>(&self, next: &Navigation<P, Q>) -> Navigation<T, Vec<Q>> {
        let element = self.lambda.param.nested(self.lambda.max_depth() + 1);
        let body = substitute(&next.lambda.body, next.lambda.param, &Expr::Param(element));
        let projected = self.map_body(|src| Expr::Select(Box::new(src), Lambda::new(element, body)));
        Navigation::from_lambda(Lambda::new(self.lambda.param, projected))
    }

    pub fn count(&self) -> Navigation<T, u64> {
        Navigation::from_lambda(Lambda::new(
            self.lambda.param,
            self.map_body(|b| Expr::Count(Box::new(b))),
        ))
    }
}

/// Chains `child_to_grandchild` onto every element `parent_to_children` yields.
pub fn build_chained_navigation<T, P, Q>(
    parent_to_children: &Navigation<T, Vec<P>>,
    child_to_grandchild: &Navigation<P, Q>,
) -> Navigation<T, Vec<Q>> {
    parent_to_children.then_include(child_to_grandchild)
}

/// Immutable boolean condition over `T`.
pub struct Predicate<T> {
    lambda: Lambda,
    _marker: PhantomData<fn(&T) -> bool>,
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self::from_lambda(self.lambda.clone())
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.lambda).finish()
    }
}

impl<T> Predicate<T> {
    fn from_lambda(lambda: Lambda) -> Self {
        Self {
            lambda,
            _marker: PhantomData,
        }
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    pub fn param(&self) -> ParamId {
        self.lambda.param
    }

    pub fn body(&self) -> &Expr {
        &self.lambda.body
    }

    fn combine(&self, other: &Predicate<T>, join: fn(Box<Expr>, Box<Expr>) -> Expr) -> Self {
        let rhs = substitute(
            &other.lambda.body,
            other.lambda.param,
            &Expr::Param(self.lambda.param),
        );
        let body = join(self.lambda.body.clone(), Box::new(rhs));
        Self::from_lambda(Lambda::new(self.lambda.param, body))
    }

    pub fn and(&self, other: &Predicate<T>) -> Self {
        self.combine(other, Expr::And)
    }

    pub fn or(&self, other: &Predicate<T>) -> Self {
        self.combine(other, Expr::Or)
    }

    pub fn not(&self) -> Self {
        Self::from_lambda(Lambda::new(
            self.lambda.param,
            Expr::Not(self.lambda.body.clone()),
        ))
    }

    /// AND of every predicate, or `None` when there are none.
    pub fn all<I: IntoIterator<Item = Predicate<T>>>(preds: I) -> Option<Self> {
        preds.into_iter().reduce(|acc, p| acc.and(&p))
    }
}

/// Navigation with its target type erased; used for sort and group keys.
pub struct Selector<T> {
    lambda: Lambda,
    _marker: PhantomData<fn(&T)>,
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self::from_lambda(self.lambda.clone())
    }
}

impl<T> fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.lambda).finish()
    }
}

impl<T> Selector<T> {
    fn from_lambda(lambda: Lambda) -> Self {
        Self {
            lambda,
            _marker: PhantomData,
        }
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    /// Dotted path when the key is a plain navigation (`check_in_at`, `host.name`).
    pub fn path(&self) -> Option<String> {
        self.lambda
            .body
            .navigation_path(self.lambda.param)
            .map(|p| p.join("."))
    }
}

/// Eager-load instruction: a navigation known to be a pure member path.
///
/// The element type of the path is not constrained here, so a path ending on
/// a scalar (`host.name`) builds. Sources reject such paths when the include
/// is applied or executed.
pub struct Include<T> {
    lambda: Lambda,
    segments: Vec<String>,
    _marker: PhantomData<fn(&T)>,
}

impl<T> Clone for Include<T> {
    fn clone(&self) -> Self {
        Self {
            lambda: self.lambda.clone(),
            segments: self.segments.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Include<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Include").field(&self.path()).finish()
    }
}

impl<T> Include<T> {
    /// `None` when the navigation is not a member path (e.g. a count).
    pub fn from_navigation<P>(nav: &Navigation<T, P>) -> Option<Self> {
        let segments = nav.lambda.body.navigation_path(nav.lambda.param)?;
        Some(Self {
            lambda: nav.lambda.clone(),
            segments,
            _marker: PhantomData,
        })
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn path(&self) -> String {
        self.segments.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::{free_params, lambda_free_params};

    struct Visitor;
    struct Visit;
    struct Employee;

    const VISITS: Field<Visitor, Vec<Visit>> = Field::new("visits");
    const HOST: Field<Visit, Employee> = Field::new("host");
    const STATUS: Field<Visit, String> = Field::new("status");
    const NAME: Field<Employee, String> = Field::new("name");

    #[test]
    fn then_include_binds_only_parent_param() {
        let parent = VISITS.nav();
        let child = HOST.nav();

        let chained = build_chained_navigation(&parent, &child);

        assert_eq!(chained.lambda().param, parent.lambda().param);
        assert!(lambda_free_params(chained.lambda()).is_empty());
        assert!(!free_params(&chained.lambda().body).contains(&child.lambda().param));
    }

    #[test]
    fn then_include_is_deterministic() {
        let parent = VISITS.nav();
        let child = HOST.nav();

        let a = parent.then_include(&child);
        let b = parent.then_include(&child);

        assert_eq!(a.lambda(), b.lambda());
    }

    #[test]
    fn nested_then_include_uses_distinct_binders() {
        let parent = VISITS.nav();
        let twice = parent.then_include(&HOST.nav()).then_include(&NAME.nav());

        match &*twice.lambda().body {
            Expr::Select(inner, outer) => match &**inner {
                Expr::Select(_, first) => assert_ne!(first.param, outer.param),
                other => panic!("expected inner select, got {other:?}"),
            },
            other => panic!("expected select, got {other:?}"),
        }
        assert!(lambda_free_params(twice.lambda()).is_empty());
    }

    #[test]
    fn then_follows_reference() {
        let host_name = HOST.nav().then_field(NAME);
        let root = host_name.lambda().param;

        assert_eq!(
            host_name.lambda().body.navigation_path(root),
            Some(vec!["host".to_string(), "name".to_string()])
        );
    }

    #[test]
    fn and_rebinds_right_operand() {
        let open = STATUS.eq("open");
        let named = HOST.nav().then_field(NAME).eq("ann");
        let before = (open.lambda().clone(), named.lambda().clone());

        let both = open.and(&named);

        assert_eq!(both.param(), open.param());
        assert!(lambda_free_params(both.lambda()).is_empty());
        assert!(!free_params(both.body()).contains(&named.param()));
        assert_eq!((open.lambda().clone(), named.lambda().clone()), before);
    }

    #[test]
    fn all_of_nothing_is_none() {
        assert!(Predicate::<Visit>::all(Vec::new()).is_none());
        assert!(Predicate::all(vec![STATUS.eq("a"), STATUS.eq("b")]).is_some());
    }

    #[test]
    fn include_rejects_non_paths() {
        assert!(Include::from_navigation(&VISITS.count()).is_none());
        let include = Include::from_navigation(&VISITS.nav().then_include(&HOST.nav())).unwrap();
        assert_eq!(include.path(), "visits.host");
    }
}
