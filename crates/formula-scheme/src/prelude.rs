//! The standard root environment: arithmetic, comparison, math and list builtins plus constants.

use crate::atom::Number;
use crate::config::EvalOptions;
use crate::env::Environment;
use crate::error::{SchemeError, SchemeResult};
use crate::value::{Builtin, Value};

/// A root scope for host definitions, backed by a parent scope holding the builtins.
///
/// Definitions made on the returned scope invalidate only that scope and its descendants, so the
/// builtins themselves are never touched.
pub fn make_root_environment() -> Environment {
    make_root_environment_with_options(EvalOptions::default())
}

pub fn make_root_environment_with_options(options: EvalOptions) -> Environment {
    let builtins = Environment::with_options(options);
    builtins.update(standard_values());
    builtins.child()
}

/// Every name bound by [`make_root_environment`].
pub fn standard_values() -> Vec<(String, Value)> {
    let constants = [
        ("pi", Value::from(std::f64::consts::PI)),
        ("e", Value::from(std::f64::consts::E)),
        ("true", Value::from(true)),
        ("false", Value::from(false)),
        ("#t", Value::from(true)),
        ("#f", Value::from(false)),
        ("nil", Value::nil()),
    ];

    let builtins = vec![
        builtin("+", |args| fold_numbers("+", args, Number::Int(0), Number::add)),
        builtin("*", |args| fold_numbers("*", args, Number::Int(1), Number::mul)),
        builtin("-", subtract),
        builtin("/", divide),
        builtin("^", |args| {
            let [base, exp] = numbers::<2>("^", args)?;
            Ok(base.pow(exp).into())
        }),
        builtin("expt", |args| {
            let [base, exp] = numbers::<2>("expt", args)?;
            Ok(base.pow(exp).into())
        }),
        builtin("mod", modulo),
        builtin(">", |args| compare(">", args, |a, b| a > b)),
        builtin("<", |args| compare("<", args, |a, b| a < b)),
        builtin(">=", |args| compare(">=", args, |a, b| a >= b)),
        builtin("<=", |args| compare("<=", args, |a, b| a <= b)),
        builtin("=", |args| {
            let [a, b] = values::<2>("=", args)?;
            Ok(Value::from(a == b))
        }),
        builtin("abs", |args| {
            let [x] = numbers::<1>("abs", args)?;
            Ok(match x {
                Number::Int(i) => i
                    .checked_abs()
                    .map(Value::from)
                    .unwrap_or_else(|| Value::from((i as f64).abs())),
                Number::Float(f) => Value::from(f.abs()),
            })
        }),
        builtin("round", round),
        builtin("max", |args| extremum("max", args, |candidate, best| candidate > best)),
        builtin("min", |args| extremum("min", args, |candidate, best| candidate < best)),
        builtin("sqrt", |args| float1("sqrt", args, f64::sqrt)),
        builtin("exp", |args| float1("exp", args, f64::exp)),
        builtin("log", logarithm),
        builtin("sin", |args| float1("sin", args, f64::sin)),
        builtin("cos", |args| float1("cos", args, f64::cos)),
        builtin("tan", |args| float1("tan", args, f64::tan)),
        builtin("asin", |args| float1("asin", args, f64::asin)),
        builtin("acos", |args| float1("acos", args, f64::acos)),
        builtin("atan", |args| float1("atan", args, f64::atan)),
        builtin("atan2", |args| {
            let [y, x] = numbers::<2>("atan2", args)?;
            Ok(Value::from(y.as_f64().atan2(x.as_f64())))
        }),
        builtin("sind", |args| float1("sind", args, |x| x.to_radians().sin())),
        builtin("cosd", |args| float1("cosd", args, |x| x.to_radians().cos())),
        builtin("tand", |args| float1("tand", args, |x| x.to_radians().tan())),
        builtin("asind", |args| float1("asind", args, |x| x.asin().to_degrees())),
        builtin("acosd", |args| float1("acosd", args, |x| x.acos().to_degrees())),
        builtin("atand", |args| float1("atand", args, |x| x.atan().to_degrees())),
        builtin("atan2d", |args| {
            let [y, x] = numbers::<2>("atan2d", args)?;
            Ok(Value::from(y.as_f64().atan2(x.as_f64()).to_degrees()))
        }),
        builtin("floor", |args| integral1("floor", args, f64::floor)),
        builtin("ceil", |args| integral1("ceil", args, f64::ceil)),
        builtin("list", |args| Ok(Value::List(args.to_vec()))),
        builtin("cons", |args| {
            let [head, tail] = values::<2>("cons", args)?;
            let mut items = vec![head.clone()];
            items.extend_from_slice(list_arg("cons", tail)?);
            Ok(Value::List(items))
        }),
        builtin("car", |args| {
            let [list] = values::<1>("car", args)?;
            list_arg("car", list)?
                .first()
                .cloned()
                .ok_or_else(|| SchemeError::Eval("car of empty list".into()))
        }),
        builtin("cdr", |args| {
            let [list] = values::<1>("cdr", args)?;
            let items = list_arg("cdr", list)?;
            Ok(Value::List(items.iter().skip(1).cloned().collect()))
        }),
        builtin("append", |args| {
            let mut items = Vec::new();
            for arg in args {
                items.extend_from_slice(list_arg("append", arg)?);
            }
            Ok(Value::List(items))
        }),
        builtin("length", |args| {
            let [list] = values::<1>("length", args)?;
            let len = list_arg("length", list)?.len();
            Ok(Value::from(i64::try_from(len).unwrap_or(i64::MAX)))
        }),
        builtin("null?", |args| {
            let [x] = values::<1>("null?", args)?;
            Ok(Value::from(matches!(x, Value::List(items) if items.is_empty())))
        }),
        builtin("list?", |args| {
            let [x] = values::<1>("list?", args)?;
            Ok(Value::from(matches!(x, Value::List(_))))
        }),
        builtin("number?", |args| {
            let [x] = values::<1>("number?", args)?;
            Ok(Value::from(matches!(x, Value::Number(_))))
        }),
        builtin("symbol?", |args| {
            let [x] = values::<1>("symbol?", args)?;
            Ok(Value::from(matches!(x, Value::Symbol(_))))
        }),
        builtin("procedure?", |args| {
            let [x] = values::<1>("procedure?", args)?;
            Ok(Value::from(x.is_callable()))
        }),
        builtin("not", |args| {
            let [x] = values::<1>("not", args)?;
            Ok(Value::from(!x.is_truthy()))
        }),
        builtin("eq?", |args| {
            let [a, b] = values::<2>("eq?", args)?;
            // Lists are compared by identity, which freshly built values never share.
            let same = match (a, b) {
                (Value::List(x), Value::List(y)) => x.is_empty() && y.is_empty(),
                (a, b) => a == b,
            };
            Ok(Value::from(same))
        }),
        builtin("equal?", |args| {
            let [a, b] = values::<2>("equal?", args)?;
            Ok(Value::from(a == b))
        }),
        builtin("begin", |args| Ok(args.last().cloned().unwrap_or(Value::Unspecified))),
        builtin("map", |args| {
            let [func, list] = values::<2>("map", args)?;
            list_arg("map", list)?
                .iter()
                .map(|item| func.call(vec![item.clone()]))
                .collect::<SchemeResult<Vec<_>>>()
                .map(Value::List)
        }),
    ];

    constants
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .chain(builtins)
        .collect()
}

fn builtin(
    name: &'static str,
    func: impl Fn(&[Value]) -> SchemeResult<Value> + 'static,
) -> (String, Value) {
    (name.to_string(), Value::Builtin(Builtin::new(name, func)))
}

fn arity_error(name: &str, expected: &str, got: usize) -> SchemeError {
    SchemeError::Type(format!("{name} expects {expected} argument(s), got {got}"))
}

fn values<'a, const N: usize>(name: &str, args: &'a [Value]) -> SchemeResult<&'a [Value; N]> {
    args.try_into()
        .map_err(|_| arity_error(name, &N.to_string(), args.len()))
}

fn number(name: &str, value: &Value) -> SchemeResult<Number> {
    value.as_number().ok_or_else(|| {
        SchemeError::Type(format!(
            "{name} expects numbers, got {value} ({})",
            value.type_name()
        ))
    })
}

fn numbers<const N: usize>(name: &str, args: &[Value]) -> SchemeResult<[Number; N]> {
    let args = values::<N>(name, args)?;
    let mut out = [Number::Int(0); N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = number(name, arg)?;
    }
    Ok(out)
}

fn list_arg<'a>(name: &str, value: &'a Value) -> SchemeResult<&'a [Value]> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(SchemeError::Type(format!(
            "{name} expects a list, got {other} ({})",
            other.type_name()
        ))),
    }
}

fn fold_numbers(
    name: &str,
    args: &[Value],
    init: Number,
    op: fn(Number, Number) -> Number,
) -> SchemeResult<Value> {
    args.iter()
        .try_fold(init, |acc, arg| Ok(op(acc, number(name, arg)?)))
        .map(Value::Number)
}

fn subtract(args: &[Value]) -> SchemeResult<Value> {
    match args {
        [] => Err(arity_error("-", "at least 1", 0)),
        [x] => Ok(number("-", x)?.negate().into()),
        [first, rest @ ..] => fold_numbers("-", rest, number("-", first)?, Number::sub),
    }
}

fn checked_div(name: &str, a: Number, b: Number) -> SchemeResult<Number> {
    if b.is_zero() {
        return Err(SchemeError::Eval(format!("{name}: division by zero")));
    }
    Ok(a.div(b))
}

fn divide(args: &[Value]) -> SchemeResult<Value> {
    let (first, rest) = match args {
        [] => return Err(arity_error("/", "at least 1", 0)),
        [x] => (Number::Int(1), std::slice::from_ref(x)),
        [first, rest @ ..] => (number("/", first)?, rest),
    };
    rest.iter()
        .try_fold(first, |acc, arg| checked_div("/", acc, number("/", arg)?))
        .map(Value::Number)
}

/// Floored modulo: the result takes the sign of the divisor.
fn modulo(args: &[Value]) -> SchemeResult<Value> {
    let [a, b] = numbers::<2>("mod", args)?;
    if b.is_zero() {
        return Err(SchemeError::Eval("mod: division by zero".into()));
    }
    let result = match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            let r = a.wrapping_rem(b);
            Number::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let r = a % b;
            Number::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r })
        }
    };
    Ok(result.into())
}

fn compare(name: &str, args: &[Value], op: fn(Number, Number) -> bool) -> SchemeResult<Value> {
    let [a, b] = numbers::<2>(name, args)?;
    Ok(Value::from(op(a, b)))
}

/// `(max a b ...)` or `(max (list a b ...))`.
fn extremum(name: &str, args: &[Value], better: fn(Number, Number) -> bool) -> SchemeResult<Value> {
    let items = match args {
        [Value::List(items)] => items.as_slice(),
        _ => args,
    };
    let mut best: Option<Number> = None;
    for item in items {
        let n = number(name, item)?;
        best = match best {
            Some(current) if !better(n, current) => Some(current),
            _ => Some(n),
        };
    }
    best.map(Value::Number)
        .ok_or_else(|| arity_error(name, "at least 1", 0))
}

fn float1(name: &str, args: &[Value], f: fn(f64) -> f64) -> SchemeResult<Value> {
    let [x] = numbers::<1>(name, args)?;
    Ok(Value::from(f(x.as_f64())))
}

fn to_integral(x: f64) -> Value {
    if x.is_finite() && x.abs() < i64::MAX as f64 {
        Value::from(x as i64)
    } else {
        Value::from(x)
    }
}

fn integral1(name: &str, args: &[Value], f: fn(f64) -> f64) -> SchemeResult<Value> {
    let [x] = numbers::<1>(name, args)?;
    Ok(match x {
        Number::Int(i) => Value::from(i),
        Number::Float(x) => to_integral(f(x)),
    })
}

/// `(round x)` rounds half to even and yields an integer; `(round x digits)` yields a float.
fn round(args: &[Value]) -> SchemeResult<Value> {
    match args {
        [x] => match number("round", x)? {
            Number::Int(i) => Ok(Value::from(i)),
            Number::Float(x) => Ok(to_integral(x.round_ties_even())),
        },
        [x, digits] => {
            let x = number("round", x)?.as_f64();
            let Number::Int(digits) = number("round", digits)? else {
                return Err(SchemeError::Type("round expects an integer digit count".into()));
            };
            let digits = i32::try_from(digits)
                .map_err(|_| SchemeError::Eval(format!("round: digit count {digits} out of range")))?;
            let scale = 10f64.powi(digits);
            Ok(Value::from((x * scale).round_ties_even() / scale))
        }
        _ => Err(arity_error("round", "1 or 2", args.len())),
    }
}

/// `(log x)` is the natural logarithm, `(log x base)` uses the given base.
fn logarithm(args: &[Value]) -> SchemeResult<Value> {
    match args {
        [x] => Ok(Value::from(number("log", x)?.as_f64().ln())),
        [x, base] => Ok(Value::from(
            number("log", x)?.as_f64().log(number("log", base)?.as_f64()),
        )),
        _ => Err(arity_error("log", "1 or 2", args.len())),
    }
}
