//! Lazily evaluated parameter expressions.
//!
//! Values such as table inputs can be defined in terms of each other, in any order, and are only
//! evaluated once the parameters they depend on are known:
//!
//! ```
//! use formula_scheme::{make_root_environment, parse, Value};
//!
//! let root = make_root_environment();
//! root.define("zFoo", parse("(+ aPar 7)").unwrap());
//! root.define("aPar", parse("3").unwrap());
//! assert_eq!(root.evaluate(&parse("zFoo - 1").unwrap()).unwrap(), Value::from(9));
//!
//! root.define("aPar", parse("4").unwrap());
//! assert_eq!(root.evaluate(&parse("(- zFoo 1)").unwrap()).unwrap(), Value::from(10));
//! ```
//!
//! Two grammars read into the same tree: s-expressions (`(+ a 1)`) and infix algebra (`a + 1`,
//! operators `+ - * / ^`). See [`parser::detect_grammar`] for how one is picked.
//!
//! An [`Environment`] holds lazy definitions and memoized values, and drops memoized values in
//! itself and all descendant scopes whenever it changes. Evaluation is single-threaded.

mod atom;
mod config;
mod env;
mod error;
mod eval;
mod expr;
pub mod field;
pub mod parser;
mod prelude;
mod value;

pub use crate::atom::{atom, Number};
pub use crate::config::{EvalOptions, DEFAULT_MAX_DEPTH};
pub use crate::env::Environment;
pub use crate::error::{SchemeError, SchemeResult};
pub use crate::eval::{apply, eval};
pub use crate::expr::Expr;
pub use crate::parser::parse;
pub use crate::prelude::{
    make_root_environment, make_root_environment_with_options, standard_values,
};
pub use crate::value::{Builtin, Procedure, Value};
