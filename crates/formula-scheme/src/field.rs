//! Expressions embedded in host text fields.
//!
//! A host marks a field as an expression by wrapping it in `{{` and `}}`, e.g. `{{zFoo - 1}}`.
//! Parse failures are reported together with where the field came from.

use std::fmt;

use serde::Serialize;

use crate::env::Environment;
use crate::error::SchemeError;
use crate::expr::Expr;
use crate::parser::parse;
use crate::prelude::make_root_environment;
use crate::value::Value;

pub const EXPRESSION_START: &str = "{{";
pub const EXPRESSION_END: &str = "}}";

/// Where an expression field lives in the host's data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldLocation {
    pub table: String,
    pub row: usize,
    pub column: usize,
}

impl FieldLocation {
    pub fn new(table: impl Into<String>, row: usize, column: usize) -> Self {
        Self {
            table: table.into(),
            row,
            column,
        }
    }
}

impl fmt::Display for FieldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table '{}', column {}, row {}",
            self.table, self.column, self.row
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("syntax error in expression in {location}")]
    Syntax {
        location: FieldLocation,
        #[source]
        source: SchemeError,
    },

    #[error("failed to evaluate expression in {location}")]
    Evaluation {
        location: FieldLocation,
        #[source]
        source: SchemeError,
    },

    #[error("invalid definition of {name}")]
    Definition {
        name: String,
        #[source]
        source: SchemeError,
    },
}

/// True when the whole field (ignoring surrounding whitespace) is wrapped in `{{ }}`.
pub fn is_expression_field(text: &str) -> bool {
    let text = text.trim();
    text.len() >= EXPRESSION_START.len() + EXPRESSION_END.len()
        && text.starts_with(EXPRESSION_START)
        && text.ends_with(EXPRESSION_END)
}

/// The expression text inside the markers, or `None` if `text` is not an expression field.
pub fn strip_expression_markers(text: &str) -> Option<&str> {
    if !is_expression_field(text) {
        return None;
    }
    text.trim()
        .strip_prefix(EXPRESSION_START)
        .and_then(|inner| inner.strip_suffix(EXPRESSION_END))
}

/// A parsed expression field.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionField {
    location: FieldLocation,
    expr: Expr,
}

impl ExpressionField {
    /// Parse a marked field. Returns `Ok(None)` when `text` carries no expression markers.
    pub fn parse(text: &str, location: FieldLocation) -> Result<Option<Self>, FieldError> {
        let Some(inner) = strip_expression_markers(text) else {
            return Ok(None);
        };
        match parse(inner) {
            Ok(expr) => Ok(Some(Self { location, expr })),
            Err(source) => Err(FieldError::Syntax { location, source }),
        }
    }

    pub fn location(&self) -> &FieldLocation {
        &self.location
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, env: &Environment) -> Result<Value, FieldError> {
        env.evaluate(&self.expr)
            .map_err(|source| FieldError::Evaluation {
                location: self.location.clone(),
                source,
            })
    }
}

/// Force every field against `env`, in order.
pub fn evaluate_fields<'a>(
    fields: impl IntoIterator<Item = &'a ExpressionField>,
    env: &Environment,
) -> Result<Vec<(FieldLocation, Value)>, FieldError> {
    fields
        .into_iter()
        .map(|field| Ok((field.location.clone(), field.evaluate(env)?)))
        .collect()
}

/// A root environment with each `(name, expression text)` pair installed as a lazy definition.
pub fn environment_from_definitions<N, T>(
    definitions: impl IntoIterator<Item = (N, T)>,
) -> Result<Environment, FieldError>
where
    N: Into<String>,
    T: AsRef<str>,
{
    let env = make_root_environment();
    for (name, text) in definitions {
        let name = name.into();
        match parse(text.as_ref()) {
            Ok(expr) => {
                env.define(name, expr);
            }
            Err(source) => return Err(FieldError::Definition { name, source }),
        }
    }
    Ok(env)
}
