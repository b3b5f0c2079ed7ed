/// Default bound on evaluation nesting, see [`EvalOptions::max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 400;

/// Settings shared by every scope descending from one root [`crate::Environment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvalOptions {
    /// Maximum number of nested evaluations (sub-expressions, lazy definitions being forced and
    /// procedure bodies) active at once. Exceeding it fails with
    /// [`crate::SchemeError::DepthLimit`] instead of exhausting the native stack, which is also how
    /// self-referential definitions such as `x := x + 1` surface.
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EvalOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
