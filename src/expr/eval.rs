use serde_json::Value;
use thiserror::Error;

use super::ast::{BinOp, Expr, PathRoot};

/// The memory snapshot an expression is evaluated against: whatever a
/// [`crate::context::DataContext`] currently binds for `$data`/`$root`/
/// `$index`. Kept as a narrow trait (rather than binding directly to
/// `DataContext`) so the expression engine stays decoupled from how
/// contexts are stored.
pub trait MemoryView {
    fn get(&self, key: &str) -> Option<&Value>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("type mismatch applying {op:?} to non-comparable operands")]
    TypeMismatch { op: BinOp },
    #[error("logical operator applied to a non-boolean operand")]
    NotBoolean,
}

/// The null-substitution policy: invoked with the dotted path text exactly
/// as written in the source expression when that path cannot be resolved.
/// The crate's default policy re-emits `${path}` so an unresolved
/// placeholder stays visible, unmodified, in the output.
pub type NullSubstitution<'a> = dyn Fn(&str) -> Value + 'a;

/// Borrows the policy rather than owning it, so a single closure can be
/// shared across the many `evaluate` calls one `expand()` call makes
/// without re-boxing or cloning per call.
pub struct Options<'a> {
    pub null_substitution: &'a NullSubstitution<'a>,
}

impl<'a> Options<'a> {
    pub fn new(null_substitution: &'a NullSubstitution<'a>) -> Self {
        Self { null_substitution }
    }
}

impl<'a> Default for Options<'a> {
    fn default() -> Self {
        Self::new(&default_null_substitution)
    }
}

pub fn default_null_substitution(path: &str) -> Value {
    Value::String(format!("${{{path}}}"))
}

/// Evaluates `expr` against `mem`, consulting `opts.null_substitution`
/// whenever a path reference cannot be resolved. This never returns an
/// error for an unresolved path — that's what null-substitution is for.
/// It returns `Err` only for operator/operand type mismatches, which
/// callers are expected to swallow (falling back to the original
/// placeholder text, or to "keep" for a `$when` predicate).
pub fn evaluate(expr: &Expr, mem: &dyn MemoryView, opts: &Options) -> Result<Value, EvalError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Path(path) => Ok(resolve_path(path, mem, opts)),
        Expr::Not(inner) => {
            let v = evaluate(inner, mem, opts)?;
            let b = as_bool(&v).ok_or(EvalError::NotBoolean)?;
            Ok(Value::Bool(!b))
        }
        Expr::Binary(lhs, BinOp::And, rhs) => {
            let l = evaluate(lhs, mem, opts)?;
            let lb = as_bool(&l).ok_or(EvalError::NotBoolean)?;
            if !lb {
                return Ok(Value::Bool(false));
            }
            let r = evaluate(rhs, mem, opts)?;
            let rb = as_bool(&r).ok_or(EvalError::NotBoolean)?;
            Ok(Value::Bool(rb))
        }
        Expr::Binary(lhs, BinOp::Or, rhs) => {
            let l = evaluate(lhs, mem, opts)?;
            let lb = as_bool(&l).ok_or(EvalError::NotBoolean)?;
            if lb {
                return Ok(Value::Bool(true));
            }
            let r = evaluate(rhs, mem, opts)?;
            let rb = as_bool(&r).ok_or(EvalError::NotBoolean)?;
            Ok(Value::Bool(rb))
        }
        Expr::Binary(lhs, op, rhs) => {
            let l = evaluate(lhs, mem, opts)?;
            let r = evaluate(rhs, mem, opts)?;
            compare(&l, *op, &r)
        }
    }
}

fn as_bool(v: &Value) -> Option<bool> {
    v.as_bool()
}

fn resolve_path(path: &super::ast::Path, mem: &dyn MemoryView, opts: &Options) -> Value {
    let root_key = match path.root {
        PathRoot::Data => "$data",
        PathRoot::Root => "$root",
        PathRoot::Index => "$index",
    };
    let Some(mut current) = mem.get(root_key) else {
        return (opts.null_substitution)(&path.raw);
    };
    for seg in &path.segments {
        let next = match (seg, current) {
            (super::ast::PathSegment::Field(name), Value::Object(map)) => map.get(name),
            (super::ast::PathSegment::Index(i), Value::Array(arr)) => arr.get(*i),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return (opts.null_substitution)(&path.raw),
        }
    }
    current.clone()
}

fn compare(lhs: &Value, op: BinOp, rhs: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = ordered(lhs, rhs).ok_or(EvalError::TypeMismatch { op })?;
            let keep = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(keep))
        }
        BinOp::And | BinOp::Or => unreachable!("handled in evaluate with short-circuiting"),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

fn ordered(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use serde_json::json;
    use std::collections::HashMap;

    struct TestMemory(HashMap<&'static str, Value>);

    impl MemoryView for TestMemory {
        fn get(&self, key: &str) -> Option<&Value> {
            self.0.get(key)
        }
    }

    fn mem_with_data(data: Value) -> TestMemory {
        let mut m = HashMap::new();
        m.insert("$data", data);
        m.insert("$root", json!({}));
        TestMemory(m)
    }

    #[test]
    fn resolves_simple_field() {
        let mem = mem_with_data(json!({"x": 1}));
        let e = parse("x").unwrap();
        let v = evaluate(&e, &mem, &Options::default()).unwrap();
        assert_eq!(v, json!(1));
    }

    #[test]
    fn unresolved_path_uses_null_substitution() {
        let mem = mem_with_data(json!({}));
        let e = parse("missing").unwrap();
        let v = evaluate(&e, &mem, &Options::default()).unwrap();
        assert_eq!(v, json!("${missing}"));
    }

    #[test]
    fn comparison_false_path() {
        let mem = mem_with_data(json!({"x": 1}));
        let e = parse("x == 2").unwrap();
        let v = evaluate(&e, &mem, &Options::default()).unwrap();
        assert_eq!(v, json!(false));
    }

    #[test]
    fn custom_null_substitution_overrides_default() {
        let mem = mem_with_data(json!({}));
        let e = parse("missing").unwrap();
        let policy = |_path: &str| json!(null);
        let opts = Options::new(&policy);
        let v = evaluate(&e, &mem, &opts).unwrap();
        assert_eq!(v, json!(null));
    }
}
