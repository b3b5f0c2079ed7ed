use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::atom::Number;
use crate::env::{Environment, WeakEnvironment};
use crate::error::{SchemeError, SchemeResult};
use crate::eval;
use crate::expr::Expr;

/// The result of evaluating an [`Expr`].
#[derive(Clone, Debug)]
pub enum Value {
    Number(Number),
    Bool(bool),
    Symbol(String),
    /// The empty list is nil.
    List(Vec<Value>),
    Procedure(Procedure),
    Builtin(Builtin),
    /// Produced by `define` and `set!`.
    Unspecified,
}

impl Value {
    pub fn nil() -> Self {
        Value::List(Vec::new())
    }

    /// The single truthiness rule used by `if` and `not`.
    ///
    /// Zero, the empty list, `false` and the unspecified value are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => !n.is_zero(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::Unspecified => false,
            Value::Symbol(_) | Value::Procedure(_) | Value::Builtin(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Procedure(_) | Value::Builtin(_))
    }

    /// Invoke a procedure or builtin with already evaluated arguments.
    pub fn call(&self, args: Vec<Value>) -> SchemeResult<Value> {
        eval::apply(self, args)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Procedure(_) => "procedure",
            Value::Builtin(_) => "builtin",
            Value::Unspecified => "unspecified",
        }
    }

    /// Prepare a value for storage in `env`: procedures closing over `env` itself refer to it
    /// weakly from then on.
    pub(crate) fn detach_from(self, env: &Environment) -> Value {
        match self {
            Value::Procedure(procedure) if procedure.captures(env) => {
                Value::Procedure(Procedure {
                    lambda: procedure.lambda,
                    env: Capture::Weak(env.downgrade()),
                })
            }
            Value::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| item.detach_from(env))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Undo [`Value::detach_from`] for a value read back out of its scope.
    pub(crate) fn attach(self) -> Value {
        match self {
            Value::Procedure(Procedure {
                lambda,
                env: Capture::Weak(weak),
            }) => {
                let env = match weak.upgrade() {
                    Some(env) => Capture::Strong(env),
                    None => Capture::Weak(weak),
                };
                Value::Procedure(Procedure { lambda, env })
            }
            Value::List(items) => Value::List(items.into_iter().map(Value::attach).collect()),
            other => other,
        }
    }

    /// Move procedures closing over `from` to close over `to` instead.
    ///
    /// Only sound when `from` is a child of `to` holding nothing of its own.
    pub(crate) fn recapture(self, from: &Environment, to: &Environment) -> Value {
        match self {
            Value::Procedure(procedure) if procedure.captures(from) => {
                Value::Procedure(Procedure {
                    lambda: procedure.lambda,
                    env: Capture::Strong(to.clone()),
                })
            }
            Value::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| item.recapture(from, to))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => a.same_as(b),
            (Value::Builtin(a), Value::Builtin(b)) => a.same_as(b),
            (Value::Unspecified, Value::Unspecified) => true,
            _ => false,
        }
    }
}

impl From<&Expr> for Value {
    fn from(expr: &Expr) -> Self {
        match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Symbol(s) => Value::Symbol(s.clone()),
            Expr::List(items) => Value::List(items.iter().map(Value::from).collect()),
        }
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(Number::Int(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(Number::Float(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(true) => f.write_str("#t"),
            Value::Bool(false) => f.write_str("#f"),
            Value::Symbol(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Procedure(proc) => write!(f, "#<procedure ({})>", proc.params().join(" ")),
            Value::Builtin(builtin) => write!(f, "#<builtin {}>", builtin.name()),
            Value::Unspecified => f.write_str("#<unspecified>"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(Number::Int(i)) => serializer.serialize_i64(*i),
            Value::Number(Number::Float(x)) => serializer.serialize_f64(*x),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Symbol(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Procedure(_) | Value::Builtin(_) => serializer.collect_str(self),
            Value::Unspecified => serializer.serialize_none(),
        }
    }
}

/// A closure: parameter names, a body and the scope it was created in.
///
/// Calls evaluate the body in a fresh child of that scope, never of the caller's scope. Cloning
/// shares the lambda; two procedures are equal when they share it and close over the same scope.
#[derive(Clone)]
pub struct Procedure {
    lambda: Rc<Lambda>,
    env: Capture,
}

struct Lambda {
    params: Vec<String>,
    body: Expr,
}

#[derive(Clone)]
enum Capture {
    Strong(Environment),
    /// Used while the procedure is stored inside the scope it closes over.
    Weak(WeakEnvironment),
}

impl Procedure {
    pub(crate) fn new(params: Vec<String>, body: Expr, env: &Environment) -> Self {
        Self {
            lambda: Rc::new(Lambda { params, body }),
            env: Capture::Strong(env.clone()),
        }
    }

    pub(crate) fn params(&self) -> &[String] {
        &self.lambda.params
    }

    pub(crate) fn body(&self) -> &Expr {
        &self.lambda.body
    }

    /// The scope calls run under.
    pub(crate) fn scope(&self) -> SchemeResult<Environment> {
        match &self.env {
            Capture::Strong(env) => Ok(env.clone()),
            Capture::Weak(weak) => weak.upgrade().ok_or_else(|| {
                SchemeError::Eval("procedure outlived the scope it was defined in".into())
            }),
        }
    }

    fn captures(&self, env: &Environment) -> bool {
        match &self.env {
            Capture::Strong(captured) => captured.same_scope(env),
            Capture::Weak(weak) => weak.points_to(env),
        }
    }

    fn same_as(&self, other: &Procedure) -> bool {
        Rc::ptr_eq(&self.lambda, &other.lambda)
            && match &other.env {
                Capture::Strong(env) => self.captures(env),
                Capture::Weak(weak) => weak.upgrade().is_some_and(|env| self.captures(&env)),
            }
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The captured scope is omitted: it can (indirectly) contain this procedure.
        f.debug_struct("Procedure")
            .field("params", &self.lambda.params)
            .field("body", &self.lambda.body)
            .finish_non_exhaustive()
    }
}

type BuiltinFn = dyn Fn(&[Value]) -> SchemeResult<Value>;

/// A host-provided callable.
///
/// Receives its arguments already evaluated and either returns a value or fails; the evaluator
/// treats it exactly like a [`Procedure`] at the call site.
#[derive(Clone)]
pub struct Builtin {
    name: Rc<str>,
    func: Rc<BuiltinFn>,
}

impl Builtin {
    pub fn new(
        name: impl Into<Rc<str>>,
        func: impl Fn(&[Value]) -> SchemeResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self, args: &[Value]) -> SchemeResult<Value> {
        (self.func)(args)
    }

    fn same_as(&self, other: &Builtin) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Builtin").field(&self.name).finish()
    }
}

impl From<Builtin> for Value {
    fn from(value: Builtin) -> Self {
        Value::Builtin(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truthiness_follows_zero_empty_false() {
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(!Value::nil().is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(!Value::Unspecified.is_truthy());

        assert!(Value::from(-1).is_truthy());
        assert!(Value::from(0.5).is_truthy());
        assert!(Value::from(vec![Value::from(0)]).is_truthy());
        assert!(Value::Symbol("x".into()).is_truthy());
        assert!(Value::from(Builtin::new("f", |_| Ok(Value::nil()))).is_truthy());
    }

    #[test]
    fn quoted_tree_converts_structurally() {
        let expr = Expr::list([Expr::symbol("a"), Expr::from(1), Expr::nil()]);
        assert_eq!(
            Value::from(&expr),
            Value::List(vec![Value::Symbol("a".into()), Value::from(1), Value::nil()])
        );
    }

    #[test]
    fn displays_as_s_expression() {
        let value = Value::List(vec![
            Value::from(1),
            Value::from(2.5),
            Value::from(true),
            Value::List(vec![Value::Symbol("x".into())]),
        ]);
        assert_eq!(value.to_string(), "(1 2.5 #t (x))");
    }

    #[test]
    fn serializes_to_json() {
        let value = Value::List(vec![
            Value::from(1),
            Value::from(2.5),
            Value::Symbol("abc".into()),
            Value::from(false),
            Value::Unspecified,
        ]);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"[1,2.5,"abc",false,null]"#
        );
    }

    #[test]
    fn builtins_compare_by_identity() {
        let a = Builtin::new("f", |_| Ok(Value::nil()));
        let b = Builtin::new("f", |_| Ok(Value::nil()));
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }
}
