//! Error types for likelihood evaluation and entity construction
//!
//! Recoverable numeric conditions (singular covariances, unmatched labels)
//! are reported through this enum; shape mismatches inside the matrix kernel
//! are structural failures and panic instead.

use std::fmt;

/// Errors surfaced by entity constructors and the likelihood evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackFitError {
    /// A covariance matrix has determinant exactly zero and cannot be
    /// inverted.
    SingularMatrix {
        /// Description of which matrix failed
        context: String,
    },

    /// A datum measures a quantity the track does not predict.
    UnmatchedQuantity {
        /// The label with no counterpart in the track
        label: String,
    },

    /// An internal consistency check failed (e.g. a chi-squared reduction
    /// that did not produce a 1x1 result).
    InvariantViolation {
        /// Description of the violated invariant
        description: String,
    },

    /// Invalid constructor arguments or evaluation options.
    Configuration {
        /// Description of the configuration issue
        description: String,
    },
}

impl fmt::Display for TrackFitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackFitError::SingularMatrix { context } => {
                write!(f, "Matrix inversion failed: {}", context)
            }
            TrackFitError::UnmatchedQuantity { label } => {
                write!(f, "Track has no prediction for measured quantity '{}'", label)
            }
            TrackFitError::InvariantViolation { description } => {
                write!(f, "Internal invariant violated: {}", description)
            }
            TrackFitError::Configuration { description } => {
                write!(f, "Configuration error: {}", description)
            }
        }
    }
}

impl std::error::Error for TrackFitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackFitError::SingularMatrix {
            context: "datum 3 covariance".to_string(),
        };
        assert!(err.to_string().contains("datum 3 covariance"));

        let err = TrackFitError::UnmatchedQuantity {
            label: "[mg/fe]".to_string(),
        };
        assert!(err.to_string().contains("[mg/fe]"));

        let err = TrackFitError::InvariantViolation {
            description: "chi-squared result is 2x2".to_string(),
        };
        assert!(err.to_string().contains("chi-squared"));
    }
}
