use thiserror::Error;

// Unified error type for stmg

#[derive(Error, Debug)]
pub enum KError {
    #[error("dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("time degree {degree} is below the scheme minimum {minimum}")]
    InvalidDegree { degree: usize, minimum: usize },
    #[error("refinement {0} is below 1")]
    InvalidRefinement(usize),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("factorization error: {0}")]
    FactorError(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parameter file error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KError {
    /// Shorthand for a shape check failing at construction time.
    pub(crate) fn mismatch(what: &'static str, expected: usize, found: usize) -> Self {
        KError::DimensionMismatch {
            what,
            expected,
            found,
        }
    }
}
