//! Evaluates expression lambdas against rows projected to `serde_json::Value`.

use std::cmp::Ordering;

use bigdecimal::ToPrimitive;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as Json;
use spec_core::ast::{CompareOperator, Expr, Lambda, ParamId, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unbound parameter {0}")]
    UnboundParam(ParamId),

    #[error("cannot apply {op} to {got}")]
    TypeMismatch { op: &'static str, got: &'static str },

    #[error("unsupported function or args: {0}()")]
    UnsupportedFn(String),

    #[error("number out of range: {0}")]
    Number(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

fn kind(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Literal → the JSON shape serde gives the same Rust value.
pub fn literal_to_json(v: &Value) -> EvalResult<Json> {
    Ok(match v {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => {
            if n.is_integer() {
                if let Some(i) = n.to_i64() {
                    return Ok(Json::from(i));
                }
            }
            n.to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .ok_or_else(|| EvalError::Number(n.to_string()))?
        }
        Value::Uuid(u) => Json::String(u.to_string()),
        Value::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => Json::String(t.to_string()),
        Value::String(s) => Json::String(s.clone()),
    })
}

fn as_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Ordering between two scalars of the same kind; `None` when incomparable.
pub fn compare_json(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Null, Json::Null) => Some(Ordering::Equal),
        (Json::Bool(x), Json::Bool(y)) => Some(x.cmp(y)),
        (Json::Number(x), Json::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Json::String(x), Json::String(y)) => match (as_datetime(x), as_datetime(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        _ => None,
    }
}

/// Total order used for sorting: nulls first, then by kind, then by value.
///
/// RFC3339 strings form their own kind ahead of other strings, so two
/// strings are compared chronologically only when both parse and lexically
/// only when neither does.
pub fn sort_cmp(a: &Json, b: &Json) -> Ordering {
    fn rank(v: &Json) -> u8 {
        match v {
            Json::Null => 0,
            Json::Bool(_) => 1,
            Json::Number(_) => 2,
            Json::String(s) if as_datetime(s).is_some() => 3,
            Json::String(_) => 4,
            Json::Array(_) => 5,
            Json::Object(_) => 6,
        }
    }

    match (a, b) {
        (Json::String(x), Json::String(y)) => match (as_datetime(x), as_datetime(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (None, None) => x.cmp(y),
            _ => rank(a).cmp(&rank(b)),
        },
        _ => compare_json(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b))),
    }
}

fn truthy(v: &Json, op: &'static str) -> EvalResult<bool> {
    match v {
        Json::Bool(b) => Ok(*b),
        Json::Null => Ok(false),
        other => Err(EvalError::TypeMismatch {
            op,
            got: kind(other),
        }),
    }
}

fn compare(op: CompareOperator, l: &Json, r: &Json) -> bool {
    use CompareOperator as Op;

    if l.is_null() || r.is_null() {
        let both = l.is_null() && r.is_null();
        return match op {
            Op::Eq => both,
            Op::Ne => !both,
            _ => false,
        };
    }

    match compare_json(l, r) {
        Some(ord) => match op {
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
        },
        None => op == Op::Ne,
    }
}

struct Env<'a> {
    root: (ParamId, &'a Json),
    locals: Vec<(ParamId, Json)>,
}

impl Env<'_> {
    fn lookup(&self, p: ParamId) -> EvalResult<&Json> {
        if let Some((_, v)) = self.locals.iter().rev().find(|(id, _)| *id == p) {
            return Ok(v);
        }
        if self.root.0 == p {
            return Ok(self.root.1);
        }
        Err(EvalError::UnboundParam(p))
    }
}

fn eval(expr: &Expr, env: &mut Env<'_>) -> EvalResult<Json> {
    match expr {
        Expr::Param(p) => env.lookup(*p).cloned(),
        Expr::Value(v) => literal_to_json(v),
        Expr::Member(base, name) => match eval(base, env)? {
            Json::Object(mut map) => Ok(map.remove(name).unwrap_or(Json::Null)),
            Json::Null => Ok(Json::Null),
            other => Err(EvalError::TypeMismatch {
                op: "member access",
                got: kind(&other),
            }),
        },
        Expr::Select(src, lambda) => match eval(src, env)? {
            Json::Array(items) => items
                .into_iter()
                .map(|item| apply(lambda, item, env))
                .collect::<EvalResult<Vec<_>>>()
                .map(Json::Array),
            Json::Null => Ok(Json::Null),
            other => Err(EvalError::TypeMismatch {
                op: "select",
                got: kind(&other),
            }),
        },
        Expr::Count(x) => match eval(x, env)? {
            Json::Array(items) => Ok(Json::from(items.len() as u64)),
            Json::Null => Ok(Json::from(0u64)),
            other => Err(EvalError::TypeMismatch {
                op: "count",
                got: kind(&other),
            }),
        },
        Expr::And(a, b) => {
            if !truthy(&eval(a, env)?, "and")? {
                return Ok(Json::Bool(false));
            }
            Ok(Json::Bool(truthy(&eval(b, env)?, "and")?))
        }
        Expr::Or(a, b) => {
            if truthy(&eval(a, env)?, "or")? {
                return Ok(Json::Bool(true));
            }
            Ok(Json::Bool(truthy(&eval(b, env)?, "or")?))
        }
        Expr::Not(x) => match eval(x, env)? {
            Json::Null => Ok(Json::Null),
            v => Ok(Json::Bool(!truthy(&v, "not")?)),
        },
        Expr::Compare(l, op, r) => {
            let l = eval(l, env)?;
            let r = eval(r, env)?;
            Ok(Json::Bool(compare(*op, &l, &r)))
        }
        Expr::In(x, list) => {
            let needle = eval(x, env)?;
            for item in list {
                if compare(CompareOperator::Eq, &needle, &eval(item, env)?) {
                    return Ok(Json::Bool(true));
                }
            }
            Ok(Json::Bool(false))
        }
        Expr::Function(name, args) => {
            let args = args
                .iter()
                .map(|a| eval(a, env))
                .collect::<EvalResult<Vec<_>>>()?;
            call(name, &args)
        }
    }
}

fn call(name: &str, args: &[Json]) -> EvalResult<Json> {
    let n = name.to_ascii_lowercase();
    match (n.as_str(), args) {
        ("tolower", [Json::String(s)]) => Ok(Json::String(s.to_lowercase())),
        ("tolower", [Json::Null]) => Ok(Json::Null),
        ("contains" | "startswith" | "endswith", [Json::Null, _]) => Ok(Json::Bool(false)),
        ("contains", [Json::String(s), Json::String(p)]) => Ok(Json::Bool(s.contains(p.as_str()))),
        ("startswith", [Json::String(s), Json::String(p)]) => {
            Ok(Json::Bool(s.starts_with(p.as_str())))
        }
        ("endswith", [Json::String(s), Json::String(p)]) => Ok(Json::Bool(s.ends_with(p.as_str()))),
        _ => Err(EvalError::UnsupportedFn(name.to_string())),
    }
}

fn apply(lambda: &Lambda, arg: Json, env: &mut Env<'_>) -> EvalResult<Json> {
    env.locals.push((lambda.param, arg));
    let out = eval(&lambda.body, env);
    env.locals.pop();
    out
}

/// Evaluates `lambda` with its parameter bound to `row`.
pub fn eval_lambda(lambda: &Lambda, row: &Json) -> EvalResult<Json> {
    let mut env = Env {
        root: (lambda.param, row),
        locals: Vec::new(),
    };
    eval(&lambda.body, &mut env)
}

/// Predicate form of [`eval_lambda`]; `null` counts as false.
pub fn matches(lambda: &Lambda, row: &Json) -> EvalResult<bool> {
    truthy(&eval_lambda(lambda, row)?, "filter")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spec_core::Field;

    struct Visitor;
    struct Visit;
    struct Employee;

    const NAME: Field<Visitor, String> = Field::new("name");
    const VISITS: Field<Visitor, Vec<Visit>> = Field::new("visits");
    const HOST: Field<Visit, Employee> = Field::new("host");
    const HOST_NAME: Field<Employee, String> = Field::new("name");
    const AT: Field<Visit, String> = Field::new("at");

    fn visitor() -> Json {
        json!({
            "name": "Ann Lee",
            "visits": [
                { "at": "2024-03-01T09:00:00Z", "host": { "name": "Bo" } },
                { "at": "2024-03-02T09:00:00Z", "host": null },
            ]
        })
    }

    #[test]
    fn chained_navigation_equals_manual_loading() {
        let row = visitor();
        let f = VISITS.nav();
        let g = HOST.nav();

        let chained = eval_lambda(f.then_include(&g).lambda(), &row).unwrap();

        let manual: Vec<Json> = eval_lambda(f.lambda(), &row)
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| eval_lambda(g.lambda(), v).unwrap())
            .collect();
        assert_eq!(chained, Json::Array(manual));
    }

    #[test]
    fn deeper_chain_projects_each_level() {
        let row = visitor();
        let names = VISITS
            .nav()
            .then_include(&HOST.nav())
            .then_include(&HOST_NAME.nav());

        assert_eq!(eval_lambda(names.lambda(), &row).unwrap(), json!(["Bo", null]));
    }

    #[test]
    fn count_and_lowered_contains() {
        let row = visitor();
        assert!(matches(VISITS.count().ge(2).lambda(), &row).unwrap());
        assert!(!matches(VISITS.count().gt(2).lambda(), &row).unwrap());
        assert!(matches(NAME.to_lower().contains("ann").lambda(), &row).unwrap());
        assert!(!matches(NAME.contains("ann").lambda(), &row).unwrap());
    }

    #[test]
    fn datetimes_compare_chronologically() {
        let early = json!({ "at": "2024-03-01T09:00:00Z" });
        let cutoff = "2024-03-01T09:00:00.500+00:00";
        assert!(matches(AT.lt(cutoff).lambda(), &early).unwrap());
    }

    #[test]
    fn null_semantics() {
        let row = json!({ "name": null });
        assert!(matches(NAME.is_null().lambda(), &row).unwrap());
        assert!(!matches(NAME.eq("x").lambda(), &row).unwrap());
        assert!(matches(NAME.ne("x").lambda(), &row).unwrap());
        assert!(!matches(NAME.gt("a").lambda(), &row).unwrap());
    }

    #[test]
    fn combined_predicates_share_binding() {
        let row = visitor();
        let p = NAME.starts_with("Ann").and(&VISITS.count().eq(2));
        assert!(matches(p.lambda(), &row).unwrap());
        let q = NAME.eq("nobody").or(&NAME.ends_with("Lee"));
        assert!(matches(q.lambda(), &row).unwrap());
        assert!(!matches(q.not().lambda(), &row).unwrap());
    }

    #[test]
    fn in_list() {
        let row = json!({ "name": "b" });
        assert!(matches(NAME.is_in(["a", "b"]).lambda(), &row).unwrap());
        assert!(!matches(NAME.is_in(Vec::<String>::new()).lambda(), &row).unwrap());
    }

    #[test]
    fn sort_cmp_orders_nulls_first() {
        let mut v = vec![json!(3), Json::Null, json!(1)];
        v.sort_by(sort_cmp);
        assert_eq!(v, vec![Json::Null, json!(1), json!(3)]);
    }

    #[test]
    fn sort_cmp_is_transitive_over_mixed_strings() {
        let a = json!("2024-01-01T01:00:00+02:00");
        let b = json!("2024-01-01T00:00:00Z");
        let c = json!("2024-01-01T00:30:00x");

        assert_eq!(sort_cmp(&a, &b), Ordering::Less);
        assert_eq!(sort_cmp(&b, &c), Ordering::Less);
        assert_eq!(sort_cmp(&a, &c), Ordering::Less);
        assert_eq!(sort_cmp(&c, &a), Ordering::Greater);
    }

    #[test]
    fn sorting_many_mixed_strings_is_ordered() {
        let mut v: Vec<Json> = (0..3000u32)
            .map(|i| {
                let minute = (i * 7919) % 60;
                let hour = (i * 31) % 24;
                match i % 3 {
                    0 => json!(format!("2024-01-01T{hour:02}:{minute:02}:00+0{}:00", i % 9)),
                    1 => json!(format!("2024-01-01T{hour:02}:{minute:02}:00Z")),
                    _ => json!(format!("2024-01-01T{hour:02}:{minute:02}:00x")),
                }
            })
            .collect();

        v.sort_by(sort_cmp);

        assert!(v.windows(2).all(|w| sort_cmp(&w[0], &w[1]) != Ordering::Greater));
        let first_plain = v
            .iter()
            .position(|j| j.as_str().is_some_and(|s| s.ends_with('x')))
            .unwrap();
        assert_eq!(first_plain, 2000);
    }
}
