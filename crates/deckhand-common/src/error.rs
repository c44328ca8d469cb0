//! Unified error types for the Deckhand workspace.
//!
//! Two layers live here. [`DeckhandError`] is what fallible operations
//! return. [`ValidationError`] is a single diagnostic, and
//! [`ValidationErrors`] accumulates them so a caller can report every
//! problem found in one pass.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum DeckhandError {
    /// A string did not match the grammar of the requested slug kind.
    #[error("invalid slug \"{slug}\": {description}")]
    InvalidSlug {
        /// The rejected input.
        slug: String,
        /// Human-readable description of the expected grammar.
        description: String,
    },

    /// One or more validation, transform, or interpolation diagnostics.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// No component document exists at the given location.
    #[error("no component config found at {}", path.display())]
    MissingConfigSource {
        /// Location that was searched.
        path: PathBuf,
    },

    /// An I/O operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not parseable as YAML or JSON at all.
    #[error("failed to parse document: {message}")]
    Parse {
        /// Parser message.
        message: String,
        /// 1-based line of the failure, when the parser reports one.
        line: Option<usize>,
        /// 1-based column of the failure, when the parser reports one.
        column: Option<usize>,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl DeckhandError {
    /// Returns the accumulated diagnostics when this is a validation error.
    #[must_use]
    pub const fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for DeckhandError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DeckhandError>;

/// Category of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A malformed identifier.
    InvalidSlug,
    /// A field-level constraint violation.
    SchemaValidation,
    /// Colliding keys, nested debug blocks, or mutually exclusive fields.
    StructuralConflict,
    /// A `depends_on` entry pointing at a missing or wrong-kind sibling.
    DependencyReference,
    /// A `depends_on` cycle or an interpolation cycle.
    CircularReference,
    /// An interpolation expression whose path does not exist.
    UnresolvedInterpolation,
    /// A referenced document or file that does not exist.
    MissingConfigSource,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidSlug => "invalid slug",
            Self::SchemaValidation => "schema validation",
            Self::StructuralConflict => "structural conflict",
            Self::DependencyReference => "dependency reference",
            Self::CircularReference => "circular reference",
            Self::UnresolvedInterpolation => "unresolved interpolation",
            Self::MissingConfigSource => "missing config source",
        };
        f.write_str(name)
    }
}

/// A 1-based line/column location in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineColumn {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

/// The source range a diagnostic was attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// First character of the matched key.
    pub start: LineColumn,
    /// Last character of the matched line.
    pub end: LineColumn,
}

/// A single diagnostic produced by validation, transform, or interpolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Category of the failure.
    pub kind: ErrorKind,
    /// Dot-delimited property path, e.g. `services.api.depends_on.0`.
    pub path: String,
    /// Machine-readable constraint identifier.
    pub constraint: String,
    /// Human-readable description.
    pub message: String,
    /// The offending value, when one is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Best-effort source position, attached after the fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SourceSpan>,
}

impl ValidationError {
    /// Creates a diagnostic without a value or position.
    pub fn new(
        kind: ErrorKind,
        path: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            constraint: constraint.into(),
            message: message.into(),
            value: None,
            position: None,
        }
    }

    /// Attaches the offending value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(span) = self.position {
            write!(f, ":{}:{}", span.start.line, span.start.column)?;
        }
        write!(f, " [{}] {}", self.constraint, self.message)
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a diagnostic.
    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// Returns `true` if no diagnostics were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of recorded diagnostics.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the recorded diagnostics.
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Mutable iteration, used to attach source positions.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ValidationError> {
        self.0.iter_mut()
    }

    /// Returns `true` if any diagnostic has the given kind.
    #[must_use]
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.0.iter().any(|e| e.kind == kind)
    }

    /// Returns `value` when empty, otherwise the collection as an error.
    ///
    /// # Errors
    ///
    /// Returns [`DeckhandError::Validation`] if any diagnostic was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(DeckhandError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl Extend<ValidationError> for ValidationErrors {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display_includes_position() {
        let mut error = ValidationError::new(
            ErrorKind::SchemaValidation,
            "services.api.image",
            "type",
            "must be a string",
        );
        error.position = Some(SourceSpan {
            start: LineColumn { line: 4, column: 5 },
            end: LineColumn { line: 4, column: 20 },
        });
        assert_eq!(
            error.to_string(),
            "services.api.image:4:5 [type] must be a string"
        );
    }

    #[test]
    fn empty_errors_into_result_is_ok() {
        let errors = ValidationErrors::new();
        assert_eq!(errors.into_result(7).expect("should be ok"), 7);
    }

    #[test]
    fn non_empty_errors_into_result_is_err() {
        let errors: ValidationErrors = vec![ValidationError::new(
            ErrorKind::CircularReference,
            "services.a.depends_on",
            "circular-reference",
            "cycle",
        )]
        .into();
        let err = errors.into_result(()).expect_err("should fail");
        let collected = err.validation_errors().expect("should be validation");
        assert!(collected.has_kind(ErrorKind::CircularReference));
    }

    #[test]
    fn errors_display_one_per_line() {
        let errors: ValidationErrors = vec![
            ValidationError::new(ErrorKind::SchemaValidation, "a", "x", "first"),
            ValidationError::new(ErrorKind::SchemaValidation, "b", "y", "second"),
        ]
        .into();
        assert_eq!(errors.to_string(), "a [x] first\nb [y] second");
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::UnresolvedInterpolation)
            .expect("should serialize");
        assert_eq!(json, "\"unresolved_interpolation\"");
    }
}
