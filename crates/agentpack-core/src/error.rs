//! Error types for Agentpack Core
//!
//! Only two failure families abort an operation: intake validation failures
//! and structural failures (missing build root, missing template, malformed
//! input, I/O). Contract violations, cycle warnings and cross-reference
//! mismatches are records carried by the reports, not errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for agentpack operations
pub type Result<T> = std::result::Result<T, PackError>;

/// Main error type for agentpack operations
#[derive(Error, Debug)]
pub enum PackError {
    /// The intake document violated one or more contract rules
    #[error("Intake validation failed:\n{0}")]
    Validation(#[from] ValidationFailure),

    /// The build root does not exist or is not a directory
    #[error("Build root not found: {}", .0.display())]
    MissingBuildRoot(PathBuf),

    /// A canonical template required by the routing table is absent
    #[error("Required template not found: {}", .0.display())]
    MissingTemplate(PathBuf),

    /// Malformed input that cannot be interpreted at all
    #[error("Structural failure: {0}")]
    Structural(String),

    /// Configuration parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        /// What was being attempted
        context: String,
        /// Underlying error
        source: Box<PackError>,
    },
}

impl PackError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error is an intake validation failure (possibly wrapped)
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::WithContext { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}

/// A single intake contract violation
///
/// `path` is a slash-delimited JSON pointer into the intake document
/// (`/` for the document root). Field order matters: the derived `Ord`
/// sorts by `(path, message)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON pointer of the offending field
    pub path: String,
    /// Human-readable reason
    pub message: String,
}

impl ValidationError {
    /// Error at `path`
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The complete, ordered set of violations for one intake document
///
/// Construction always sorts and deduplicates, so two failures for the same
/// input compare and render identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    errors: Vec<ValidationError>,
}

impl ValidationFailure {
    /// Sort and deduplicate `errors`
    pub fn new(mut errors: Vec<ValidationError>) -> Self {
        errors.sort();
        errors.dedup();
        Self { errors }
    }

    /// Errors sorted by `(path, message)`
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Number of distinct errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when there is nothing to report
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// One `path: message` line per error, in sorted order
    pub fn render(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::error::Error for ValidationFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context() {
        let err = PackError::Structural("pack payload is not an object".to_string());
        let err = err.context("Failed to load 07_Prompt_Modules_v1.json");

        assert!(err
            .to_string()
            .contains("Failed to load 07_Prompt_Modules_v1.json"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(PackError::MissingBuildRoot(PathBuf::from("/nope")));
        let result = result.context("apply aborted");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("apply aborted"));
        assert!(err.to_string().contains("/nope"));
    }

    #[test]
    fn test_failure_sorts_and_dedups() {
        let failure = ValidationFailure::new(vec![
            ValidationError::new("/metadata", "b"),
            ValidationError::new("/gates", "z"),
            ValidationError::new("/metadata", "a"),
            ValidationError::new("/gates", "z"),
        ]);

        assert_eq!(failure.len(), 3);
        assert_eq!(failure.render(), "/gates: z\n/metadata: a\n/metadata: b");
    }

    #[test]
    fn test_is_validation_through_context() {
        let failure = ValidationFailure::new(vec![ValidationError::new("/", "x")]);
        let err = PackError::from(failure).context("pipeline");
        assert!(err.is_validation());
        assert!(!PackError::Structural("x".into()).is_validation());
    }
}
