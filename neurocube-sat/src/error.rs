//! Error types for instance loading.

use thiserror::Error;

/// Errors raised while reading a DIMACS instance.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// The input has no `p cnf` line.
    #[error("no problem line found")]
    MissingProblemLine,

    /// A literal refers to an undeclared variable.
    #[error("line {line}: literal {lit} out of range for {num_vars} variables")]
    LiteralOutOfRange {
        /// 1-based line number (0 when built in memory)
        line: usize,
        /// The offending literal
        lit: i32,
        /// Declared variable count
        num_vars: u32,
    },

    /// The problem line announced a different clause count.
    #[error("expected {expected} clauses but found {found}")]
    ClauseCount {
        /// Announced count
        expected: usize,
        /// Parsed count
        found: usize,
    },
}

impl ParseError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}
