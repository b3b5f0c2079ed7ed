use std::cmp::Ordering;
use std::fmt;

use crate::expr::Expr;

/// A numeric scalar as produced by the readers.
///
/// Integers stay integral through `+`, `-`, `*` and non-negative integer powers as long as the result
/// fits in an `i64`; anything else falls back to floating point. The two representations compare
/// numerically, so `Int(3) == Float(3.0)`.
#[derive(Clone, Copy, Debug)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_add(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 + b as f64)),
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }

    pub fn sub(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_sub(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 - b as f64)),
            (a, b) => Number::Float(a.as_f64() - b.as_f64()),
        }
    }

    pub fn mul(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_mul(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 * b as f64)),
            (a, b) => Number::Float(a.as_f64() * b.as_f64()),
        }
    }

    /// True division: the result is always a float.
    pub fn div(self, other: Number) -> Number {
        Number::Float(self.as_f64() / other.as_f64())
    }

    pub fn pow(self, exponent: Number) -> Number {
        match (self, exponent) {
            (Number::Int(base), Number::Int(exp)) if exp >= 0 => u32::try_from(exp)
                .ok()
                .and_then(|exp| base.checked_pow(exp))
                .map(Number::Int)
                .unwrap_or_else(|| Number::Float((base as f64).powf(exp as f64))),
            (base, exp) => Number::Float(base.as_f64().powf(exp.as_f64())),
        }
    }

    pub fn negate(self) -> Number {
        match self {
            Number::Int(i) => i
                .checked_neg()
                .map(Number::Int)
                .unwrap_or(Number::Float(-(i as f64))),
            Number::Float(f) => Number::Float(-f),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            // `{:?}` keeps the trailing `.0` on integral floats.
            Number::Float(x) => write!(f, "{x:?}"),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

/// Classify a raw token: an integer if it parses as one, else a float, else a symbol.
///
/// Never fails. Integer literals that overflow `i64` are read as floats.
pub fn atom(token: &str) -> Expr {
    if let Ok(i) = token.parse::<i64>() {
        return Expr::Number(Number::Int(i));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Expr::Number(Number::Float(f));
    }
    Expr::Symbol(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_integers_floats_and_symbols() {
        assert_eq!(atom("42"), Expr::Number(Number::Int(42)));
        assert_eq!(atom("-7"), Expr::Number(Number::Int(-7)));
        assert!(matches!(atom("2.5"), Expr::Number(Number::Float(f)) if f == 2.5));
        assert!(matches!(atom("1e3"), Expr::Number(Number::Float(f)) if f == 1000.0));
        assert_eq!(atom("zFoo"), Expr::Symbol("zFoo".into()));
        assert_eq!(atom("set!"), Expr::Symbol("set!".into()));
    }

    #[test]
    fn oversized_integer_literal_reads_as_float() {
        assert!(matches!(
            atom("99999999999999999999"),
            Expr::Number(Number::Float(_))
        ));
    }

    #[test]
    fn integer_arithmetic_promotes_on_overflow() {
        assert!(matches!(
            Number::Int(i64::MAX).add(Number::Int(1)),
            Number::Float(_)
        ));
        assert!(matches!(Number::Int(2).pow(Number::Int(9)), Number::Int(512)));
        assert!(matches!(Number::Int(2).pow(Number::Int(-1)), Number::Float(f) if f == 0.5));
        assert!(matches!(Number::Int(6).div(Number::Int(3)), Number::Float(f) if f == 2.0));
    }

    #[test]
    fn mixed_representations_compare_numerically() {
        assert_eq!(Number::Int(3), Number::Float(3.0));
        assert!(Number::Int(2) < Number::Float(2.5));
        assert_eq!(Number::Float(3.0).to_string(), "3.0");
    }
}
