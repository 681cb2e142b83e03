//! Structural rewriting of [`Expr`] trees.

use std::collections::BTreeSet;

use crate::ast::{Expr, Lambda, ParamId};

/// Tree-rewrite visitor. Every default method copies its node and recurses,
/// so an implementor only overrides the nodes it changes.
pub trait ExprFolder {
    fn fold_expr(&mut self, expr: &Expr) -> Expr {
        walk_expr(self, expr)
    }

    fn fold_param(&mut self, param: ParamId) -> Expr {
        Expr::Param(param)
    }

    fn fold_lambda(&mut self, lambda: &Lambda) -> Lambda {
        Lambda {
            param: lambda.param,
            body: Box::new(self.fold_expr(&lambda.body)),
        }
    }
}

/// Default recursion for [`ExprFolder::fold_expr`].
pub fn walk_expr<F: ExprFolder + ?Sized>(f: &mut F, expr: &Expr) -> Expr {
    match expr {
        Expr::Param(p) => f.fold_param(*p),
        Expr::Member(base, name) => Expr::Member(Box::new(f.fold_expr(base)), name.clone()),
        Expr::Select(src, lambda) => {
            let src = Box::new(f.fold_expr(src));
            Expr::Select(src, f.fold_lambda(lambda))
        }
        Expr::Count(x) => Expr::Count(Box::new(f.fold_expr(x))),
        Expr::And(a, b) => {
            let a = Box::new(f.fold_expr(a));
            Expr::And(a, Box::new(f.fold_expr(b)))
        }
        Expr::Or(a, b) => {
            let a = Box::new(f.fold_expr(a));
            Expr::Or(a, Box::new(f.fold_expr(b)))
        }
        Expr::Not(x) => Expr::Not(Box::new(f.fold_expr(x))),
        Expr::Compare(l, op, r) => {
            let l = Box::new(f.fold_expr(l));
            Expr::Compare(l, *op, Box::new(f.fold_expr(r)))
        }
        Expr::In(x, list) => {
            let x = Box::new(f.fold_expr(x));
            Expr::In(x, list.iter().map(|i| f.fold_expr(i)).collect())
        }
        Expr::Function(name, args) => {
            Expr::Function(name.clone(), args.iter().map(|a| f.fold_expr(a)).collect())
        }
        Expr::Value(v) => Expr::Value(v.clone()),
    }
}

/// Replaces every `Param(from)` leaf with `to`.
struct ParamSubstitution<'a> {
    from: ParamId,
    to: &'a Expr,
}

impl ExprFolder for ParamSubstitution<'_> {
    fn fold_param(&mut self, param: ParamId) -> Expr {
        if param == self.from {
            self.to.clone()
        } else {
            Expr::Param(param)
        }
    }

    fn fold_lambda(&mut self, lambda: &Lambda) -> Lambda {
        // a binder with the same token shadows `from`
        if lambda.param == self.from {
            return lambda.clone();
        }
        Lambda {
            param: lambda.param,
            body: Box::new(self.fold_expr(&lambda.body)),
        }
    }
}

/// `expr[from := to]`, matching parameters by token identity.
pub fn substitute(expr: &Expr, from: ParamId, to: &Expr) -> Expr {
    ParamSubstitution { from, to }.fold_expr(expr)
}

/// Parameters referenced in `expr` that no lambda inside it binds.
pub fn free_params(expr: &Expr) -> BTreeSet<ParamId> {
    fn collect(e: &Expr, bound: &mut Vec<ParamId>, out: &mut BTreeSet<ParamId>) {
        match e {
            Expr::Param(p) => {
                if !bound.contains(p) {
                    out.insert(*p);
                }
            }
            Expr::Value(_) => {}
            Expr::Member(x, _) | Expr::Count(x) | Expr::Not(x) => collect(x, bound, out),
            Expr::Select(src, lambda) => {
                collect(src, bound, out);
                bound.push(lambda.param);
                collect(&lambda.body, bound, out);
                bound.pop();
            }
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(a, _, b) => {
                collect(a, bound, out);
                collect(b, bound, out);
            }
            Expr::In(x, list) => {
                collect(x, bound, out);
                list.iter().for_each(|i| collect(i, bound, out));
            }
            Expr::Function(_, args) => args.iter().for_each(|a| collect(a, bound, out)),
        }
    }

    let mut out = BTreeSet::new();
    collect(expr, &mut Vec::new(), &mut out);
    out
}

/// Free parameters of a lambda, i.e. everything except its own binder.
pub fn lambda_free_params(lambda: &Lambda) -> BTreeSet<ParamId> {
    let mut free = free_params(&lambda.body);
    free.remove(&lambda.param);
    free
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOperator, Value};

    fn eq_lit(base: Expr, field: &str, v: &str) -> Expr {
        Expr::Compare(
            Box::new(Expr::member(base, field)),
            CompareOperator::Eq,
            Box::new(Expr::Value(Value::String(v.to_string()))),
        )
    }

    #[test]
    fn substitute_replaces_every_occurrence() {
        let old = ParamId::fresh();
        let new = ParamId::fresh();
        let expr = Expr::And(
            Box::new(eq_lit(Expr::Param(old), "status", "open")),
            Box::new(eq_lit(Expr::Param(old), "kind", "guest")),
        );

        let out = substitute(&expr, old, &Expr::Param(new));

        let free = free_params(&out);
        assert!(!free.contains(&old));
        assert!(free.contains(&new));
    }

    #[test]
    fn substitute_matches_identity_not_shape() {
        let a = ParamId::fresh();
        let b = ParamId::fresh();
        let target = ParamId::fresh();
        // identical-looking subtrees over different parameters
        let expr = Expr::And(
            Box::new(eq_lit(Expr::Param(a), "name", "x")),
            Box::new(eq_lit(Expr::Param(b), "name", "x")),
        );

        let out = substitute(&expr, a, &Expr::Param(target));

        let expected = Expr::And(
            Box::new(eq_lit(Expr::Param(target), "name", "x")),
            Box::new(eq_lit(Expr::Param(b), "name", "x")),
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn substitute_respects_shadowing_binder() {
        let p = ParamId::fresh();
        let repl = Expr::Value(Value::Null);
        let inner = Lambda::new(p, Expr::member(Expr::Param(p), "host"));
        let expr = Expr::Select(Box::new(Expr::member(Expr::Param(p), "visits")), inner.clone());

        let out = substitute(&expr, p, &repl);

        match out {
            Expr::Select(src, lambda) => {
                assert_eq!(*src, Expr::member(repl, "visits"));
                assert_eq!(lambda, inner);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn free_params_skips_bound_binders() {
        let root = ParamId::fresh();
        let elem = root.nested(1);
        let expr = Expr::Select(
            Box::new(Expr::member(Expr::Param(root), "visits")),
            Lambda::new(elem, Expr::member(Expr::Param(elem), "host")),
        );

        let free = free_params(&expr);
        assert_eq!(free.into_iter().collect::<Vec<_>>(), vec![root]);
    }
}
