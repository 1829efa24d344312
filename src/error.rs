use thiserror::Error;

/// Result alias used across the solver.
pub type Result<T> = std::result::Result<T, AcoError>;

/// Everything that can stop an ACO run.
///
/// Input problems are reported before the first ant is built, numerical
/// problems at the point they occur. Nothing is retried.
#[derive(Debug, Error)]
pub enum AcoError {
    // ===== Input errors =====
    /// The distance matrix has no rows.
    #[error("distance matrix is empty")]
    EmptyMatrix,

    /// A row does not have as many entries as there are rows.
    #[error("distance matrix is not square: row {row} has {len} entries, expected {expected}")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },

    /// Negative or non-finite off-diagonal distance.
    #[error("invalid distance {value} from {from} to {to}")]
    InvalidDistance { from: usize, to: usize, value: f64 },

    /// Two distinct locations with zero distance between them.
    #[error("zero distance between distinct vertices {from} and {to}")]
    ZeroDistance { from: usize, to: usize },

    /// `start` or `end` does not index into the matrix.
    #[error("{role} vertex {index} is out of range for {size} vertices")]
    VertexOutOfRange {
        role: &'static str,
        index: usize,
        size: usize,
    },

    /// A run parameter is outside its allowed range.
    #[error("invalid parameter `{name}`: {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },

    // ===== Numerical errors =====
    /// Vertex selection was asked to choose from nothing.
    #[error("no candidate vertices left to choose from")]
    NoCandidates,

    /// Selection scores out of `from` sum to zero or a non-finite value.
    #[error("degenerate selection distribution at vertex {from}: score total {total}")]
    DegenerateDistribution { from: usize, total: f64 },

    /// Pheromone deposit for a route whose length is zero or not finite.
    #[error("cannot deposit pheromone for a route of length {0}")]
    ZeroLengthRoute(f64),

    // ===== Request errors =====
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AcoError {
    pub(crate) fn parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}
