pub type SchemeResult<T> = Result<T, SchemeError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemeError {
    /// Raised by either reader; `found` is the offending token or character.
    #[error("syntax error: {message} (found {found:?})")]
    Syntax { message: String, found: String },

    #[error("symbol \"{0}\" not defined")]
    UnresolvedSymbol(String),

    /// A malformed special form or a procedure applied to the wrong number of arguments.
    #[error("malformed expression: {0}")]
    Structural(String),

    /// `set!` target has no value slot anywhere in the scope chain.
    #[error("symbol \"{0}\" has not been defined as a value and cannot be assigned")]
    InvalidAssignment(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("evaluation error: {0}")]
    Eval(String),

    #[error("evaluation nested deeper than {limit} levels")]
    DepthLimit { limit: usize },
}

impl SchemeError {
    pub(crate) fn syntax(message: impl Into<String>, found: impl Into<String>) -> Self {
        SchemeError::Syntax {
            message: message.into(),
            found: found.into(),
        }
    }
}
