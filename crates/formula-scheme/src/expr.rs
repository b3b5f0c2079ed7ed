use std::fmt;

use crate::atom::Number;

/// The tree form shared by both readers.
///
/// Binary operators from the algebraic reader come out as three-element lists
/// `[operator, left, right]`, exactly like the equivalent s-expression, so nothing downstream cares
/// which grammar produced a tree. The empty list is the nil value.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(Number),
    Symbol(String),
    List(Vec<Expr>),
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn list(items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::List(items.into_iter().collect())
    }

    pub fn nil() -> Self {
        Expr::List(Vec::new())
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Number(Number::Int(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Number(Number::Float(value))
    }
}

impl From<Number> for Expr {
    fn from(value: Number) -> Self {
        Expr::Number(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Symbol(s) => f.write_str(s),
            Expr::List(items) => {
                f.write_str("(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}
