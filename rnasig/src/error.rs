//! Error types for significance scoring and classification.
//!
//! Only configuration, numerical-invariant and logic errors surface here.
//! Range violations on the input side are not errors; they go to the
//! [`WarningLog`](crate::warnings::WarningLog) instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for scoring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for scoring operations
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred while reading a model.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Model text does not follow the model grammar.
    #[error("malformed model '{origin}' at line {line}: {reason}")]
    ModelFormat {
        /// File path or name of the embedded model
        origin: String,
        /// 1-based line number, 0 when the problem is not tied to one line
        line: usize,
        /// Explanation of the problem
        reason: String,
    },

    /// A model file expected in the model directory does not exist.
    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// Deployment defect: wrong model kind, scale table too short, etc.
    #[error("configuration error: {0}")]
    Config(String),

    /// A decision model requires a descriptor the caller did not provide.
    #[error("decision model '{model}' requires the {descriptor} descriptor")]
    MissingDescriptor {
        /// Decision model variant name
        model: &'static str,
        /// Human-readable descriptor name
        descriptor: &'static str,
    },

    /// A classifier produced something that is not a probability.
    #[error("classification probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    /// Sequence and dot-bracket structure differ in length.
    #[error(
        "sequence and structure have different lengths \
         (sequence: {sequence}, structure: {structure})"
    )]
    LengthMismatch {
        /// Sequence length
        sequence: usize,
        /// Structure length
        structure: usize,
    },

    /// A zero-length sequence reached the z-score engine.
    #[error("cannot compute a z-score for an empty sequence")]
    EmptySequence,

    /// The folding oracle failed or returned something unusable.
    #[error("folding failed: {0}")]
    Fold(String),

    /// An algorithm invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_format_message() {
        let error = Error::ModelFormat {
            origin: "strand.model".to_string(),
            line: 7,
            reason: "expected 'index:value', got '3'".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("strand.model"));
        assert!(msg.contains("line 7"));
    }

    #[test]
    fn test_invalid_probability_message() {
        let msg = format!("{}", Error::InvalidProbability(1.5));
        assert!(msg.contains("1.5"));
        assert!(msg.contains("[0, 1]"));
    }

    #[test]
    fn test_length_mismatch_message() {
        let msg = format!("{}", Error::LengthMismatch { sequence: 10, structure: 9 });
        assert!(msg.contains("sequence: 10"));
        assert!(msg.contains("structure: 9"));
    }
}
