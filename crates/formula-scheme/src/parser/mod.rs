//! The two readers and the dispatcher choosing between them.

pub mod algebraic;
pub mod symbolic;

use crate::error::SchemeResult;
use crate::expr::Expr;

/// Which reader [`parse`] hands an input to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grammar {
    Symbolic,
    Algebraic,
}

/// Pick a reader for `input` by looking at its text only.
///
/// Input that starts with `(` and ends with `)` (a single trailing newline is ignored) is treated as an
/// s-expression, including multi-line programs; anything else is read as algebra. Consequently a
/// fully parenthesized algebraic expression such as `(a+3)*(b+5)` is routed to the symbolic reader,
/// which reads only `(a+3)` as a one-element list. The algebraic reader has no unary `+`, so such
/// expressions have to be written without the outer pair, e.g. `1*(a+3)*(b+5)`.
pub fn detect_grammar(input: &str) -> Grammar {
    let text = input.strip_suffix('\n').unwrap_or(input);
    if text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
        Grammar::Symbolic
    } else {
        Grammar::Algebraic
    }
}

/// Parse `input` with whichever grammar [`detect_grammar`] picks.
pub fn parse(input: &str) -> SchemeResult<Expr> {
    let grammar = detect_grammar(input);
    log::trace!("parsing {input:?} as {grammar:?}");
    match grammar {
        Grammar::Symbolic => symbolic::parse(input),
        Grammar::Algebraic => algebraic::parse(input),
    }
}
