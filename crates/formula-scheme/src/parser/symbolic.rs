//! Reader for the parenthesized list grammar.
//!
//! `(` and `)` are always tokens of their own; everything else is split on whitespace and classified
//! as a number or symbol only once the parser consumes it.

use std::iter::Peekable;

use crate::atom::atom;
use crate::error::{SchemeError, SchemeResult};
use crate::expr::Expr;

pub fn tokenize(input: &str) -> Vec<String> {
    input
        .replace('(', " ( ")
        .replace(')', " ) ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Read the first expression from `input`. Tokens after the first complete expression are ignored.
pub fn parse(input: &str) -> SchemeResult<Expr> {
    let tokens = tokenize(input);
    let mut tokens = tokens.iter().map(String::as_str).peekable();
    read(&mut tokens)
}

fn read<'a, I>(tokens: &mut Peekable<I>) -> SchemeResult<Expr>
where
    I: Iterator<Item = &'a str>,
{
    match tokens.next() {
        None => Err(SchemeError::syntax("unexpected end of input", "")),
        Some("(") => {
            let mut items = Vec::new();
            loop {
                match tokens.peek() {
                    Some(&")") => {
                        tokens.next();
                        return Ok(Expr::List(items));
                    }
                    Some(_) => items.push(read(tokens)?),
                    None => {
                        return Err(SchemeError::syntax(
                            "unexpected end of input, expected ')'",
                            "",
                        ))
                    }
                }
            }
        }
        Some(")") => Err(SchemeError::syntax("unexpected ')'", ")")),
        Some(token) => Ok(atom(token)),
    }
}
