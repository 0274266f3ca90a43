//! Errors of the inference layer.

/// Errors raised by the network, its parameters or the inference connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        got: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Parameter blob could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Numerical error (NaN, Inf)
    #[error("Numerical error: {0}")]
    NumericalError(String),
}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;
