//! Tree-walking evaluation.
//!
//! A list is classified by its shape into one of the five special forms or an application before
//! anything is evaluated. Special form names are recognized syntactically and cannot be shadowed.

use crate::env::Environment;
use crate::error::{SchemeError, SchemeResult};
use crate::expr::Expr;
use crate::value::{Procedure, Value};

enum Form<'a> {
    Quote(&'a Expr),
    If {
        test: &'a Expr,
        consequent: &'a Expr,
        alternative: &'a Expr,
    },
    Define {
        name: &'a str,
        value: &'a Expr,
    },
    Set {
        name: &'a str,
        value: &'a Expr,
    },
    Lambda {
        params: Vec<String>,
        body: &'a Expr,
    },
    Apply {
        callee: &'a Expr,
        args: &'a [Expr],
    },
}

fn malformed(form: &str, expected: &str, items: &[Expr]) -> SchemeError {
    SchemeError::Structural(format!(
        "{form} expects {expected}, got {}",
        Expr::List(items.to_vec())
    ))
}

fn classify(items: &[Expr]) -> SchemeResult<Form<'_>> {
    let Some((head, rest)) = items.split_first() else {
        return Err(SchemeError::Structural("cannot classify an empty list".into()));
    };
    let Some(keyword) = head.as_symbol() else {
        return Ok(Form::Apply { callee: head, args: rest });
    };
    let form = match (keyword, rest) {
        ("quote", [expr]) => Form::Quote(expr),
        ("quote", _) => return Err(malformed("quote", "exactly one argument", items)),

        ("if", [test, consequent, alternative]) => Form::If {
            test,
            consequent,
            alternative,
        },
        ("if", _) => {
            return Err(malformed(
                "if",
                "a test, a consequent and an alternative",
                items,
            ))
        }

        ("define", [Expr::Symbol(name), value]) => Form::Define { name, value },
        ("define", _) => return Err(malformed("define", "a symbol and an expression", items)),

        ("set!", [Expr::Symbol(name), value]) => Form::Set { name, value },
        ("set!", _) => return Err(malformed("set!", "a symbol and an expression", items)),

        ("lambda", [Expr::List(params), body]) => {
            let params = params
                .iter()
                .map(|param| {
                    param
                        .as_symbol()
                        .map(str::to_string)
                        .ok_or_else(|| malformed("lambda", "symbols as parameters", items))
                })
                .collect::<SchemeResult<Vec<_>>>()?;
            Form::Lambda { params, body }
        }
        ("lambda", _) => {
            return Err(malformed(
                "lambda",
                "a parameter list and a body",
                items,
            ))
        }

        _ => Form::Apply { callee: head, args: rest },
    };
    Ok(form)
}

/// Evaluate `expr` directly in `env` (no child scope is created).
pub fn eval(expr: &Expr, env: &Environment) -> SchemeResult<Value> {
    let _depth = env.enter()?;
    match expr {
        Expr::Symbol(name) => env.lookup(name),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::List(items) if items.is_empty() => Ok(Value::nil()),
        Expr::List(items) => eval_form(classify(items)?, env),
    }
}

fn eval_form(form: Form<'_>, env: &Environment) -> SchemeResult<Value> {
    match form {
        Form::Quote(expr) => Ok(Value::from(expr)),
        Form::If {
            test,
            consequent,
            alternative,
        } => {
            let branch = if eval(test, env)?.is_truthy() {
                consequent
            } else {
                alternative
            };
            eval(branch, env)
        }
        Form::Define { name, value } => {
            let value = eval(value, env)?;
            env.add(name, value);
            Ok(Value::Unspecified)
        }
        Form::Set { name, value } => {
            let value = eval(value, env)?;
            env.assign(name, value)?;
            Ok(Value::Unspecified)
        }
        Form::Lambda { params, body } => {
            Ok(Value::Procedure(Procedure::new(params, body.clone(), env)))
        }
        Form::Apply { callee, args } => {
            let callee = eval(callee, env)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, env))
                .collect::<SchemeResult<Vec<_>>>()?;
            apply(&callee, args)
        }
    }
}

/// Call a procedure or builtin with evaluated arguments.
pub fn apply(callee: &Value, args: Vec<Value>) -> SchemeResult<Value> {
    match callee {
        Value::Procedure(procedure) => call_procedure(procedure, args),
        Value::Builtin(builtin) => builtin.invoke(&args),
        other => Err(SchemeError::Type(format!(
            "{other} ({}) is not callable",
            other.type_name()
        ))),
    }
}

fn call_procedure(procedure: &Procedure, args: Vec<Value>) -> SchemeResult<Value> {
    let params = procedure.params();
    if args.len() != params.len() {
        return Err(SchemeError::Structural(format!(
            "procedure ({}) expects {} argument(s), got {}",
            params.join(" "),
            params.len(),
            args.len()
        )));
    }
    let scope = procedure
        .scope()?
        .child_with_values(params.iter().cloned().zip(args));
    eval(procedure.body(), &scope)
}
