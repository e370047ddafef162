use thiserror::Error;

use crate::attributes::Direction;

/// Failure reported by an algorithm's own entry point.
///
/// Carries free text only. The generic layer attaches the algorithm name and
/// the phase (validation, construction, actuation) when it wraps this into a
/// [`CompressionError`]; the text itself is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AlgorithmError(pub String);

impl AlgorithmError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn reason(&self) -> &str {
        &self.0
    }
}

/// Errors surfaced to the DDL layer and the execution engine.
///
/// None of these are retried or downgraded inside the subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    /// The compression type is not present in the registry.
    #[error("unknown compresstype \"{name}\"")]
    UnknownAlgorithm { name: String },

    /// The (level, blocksize, type) combination is not legal for the algorithm.
    #[error("invalid storage attributes for compresstype \"{algorithm}\": {reason}")]
    InvalidConfig { algorithm: String, reason: String },

    /// The algorithm could not initialize a compression state.
    #[error("could not construct {direction} state for compresstype \"{algorithm}\": {reason}")]
    ConstructionFailed {
        algorithm: String,
        direction: Direction,
        reason: String,
    },

    /// The algorithm rejected its input or failed internally on one block.
    #[error("{direction} failed for compresstype \"{algorithm}\": {reason}")]
    ActuationFailed {
        algorithm: String,
        direction: Direction,
        reason: String,
    },
}

impl CompressionError {
    /// Reason text supplied by the algorithm, when there is one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            CompressionError::UnknownAlgorithm { .. } => None,
            CompressionError::InvalidConfig { reason, .. }
            | CompressionError::ConstructionFailed { reason, .. }
            | CompressionError::ActuationFailed { reason, .. } => Some(reason),
        }
    }
}

/// Rejections of the administrative registration operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("compression name must not be empty")]
    EmptyName,

    #[error("compression name \"{name}\" is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },

    #[error("compression \"{name}\" is already registered")]
    DuplicateName { name: String },

    #[error("compression \"{name}\" has no valid owner")]
    InvalidOwner { name: String },

    #[error("compression \"{name}\" is missing its {column} entry point")]
    MissingEntryPoint { name: String, column: &'static str },

    #[error("compression \"{name}\": entry point \"{symbol}\" does not exist")]
    UnresolvedEntryPoint { name: String, symbol: String },

    #[error("compression \"{name}\": entry point \"{symbol}\" is not a {expected}")]
    WrongEntryPointKind {
        name: String,
        symbol: String,
        expected: &'static str,
    },

    #[error("compression \"{name}\": entry points come from more than one provider ({first}, {second})")]
    MixedProviders {
        name: String,
        first: String,
        second: String,
    },

    #[error("malformed registry rows: {0}")]
    Malformed(String),
}
