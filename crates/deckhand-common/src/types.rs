//! Core domain types shared across crates.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeckhandError;

/// A phase in which a component document is validated.
///
/// The same field may be required in one context and forbidden in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationContext {
    /// Authoring and registration time.
    Developer,
    /// Deployment-time overrides.
    Operator,
    /// Local debug overrides.
    Debug,
}

impl ValidationContext {
    /// Returns the lowercase name of the context.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::Operator => "operator",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationContext {
    type Err = DeckhandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "developer" => Ok(Self::Developer),
            "operator" => Ok(Self::Operator),
            "debug" => Ok(Self::Debug),
            other => Err(DeckhandError::Config {
                message: format!(
                    "unknown validation context \"{other}\" (expected developer, operator, or debug)"
                ),
            }),
        }
    }
}

/// The set of contexts a validation pass runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationContexts(BTreeSet<ValidationContext>);

impl ValidationContexts {
    /// An empty set: only context-independent rules apply.
    #[must_use]
    pub const fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// A set holding exactly one context.
    #[must_use]
    pub fn only(context: ValidationContext) -> Self {
        Self(BTreeSet::from([context]))
    }

    /// Returns `true` if `context` was requested.
    #[must_use]
    pub fn contains(&self, context: ValidationContext) -> bool {
        self.0.contains(&context)
    }

    /// Returns `true` if any of `contexts` was requested.
    #[must_use]
    pub fn intersects(&self, contexts: &[ValidationContext]) -> bool {
        contexts.iter().any(|c| self.0.contains(c))
    }

    /// Returns a copy with `context` added.
    #[must_use]
    pub fn with(&self, context: ValidationContext) -> Self {
        let mut next = self.0.clone();
        let _ = next.insert(context);
        Self(next)
    }

    /// Iterates the requested contexts in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = ValidationContext> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ValidationContext> for ValidationContexts {
    fn from_iter<I: IntoIterator<Item = ValidationContext>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_contexts() {
        assert_eq!(
            "operator".parse::<ValidationContext>().expect("should parse"),
            ValidationContext::Operator
        );
    }

    #[test]
    fn parse_unknown_context_fails() {
        let err = "staging".parse::<ValidationContext>().expect_err("should fail");
        assert!(err.to_string().contains("staging"), "got: {err}");
    }

    #[test]
    fn intersects_matches_any_member() {
        let contexts = ValidationContexts::only(ValidationContext::Operator);
        assert!(contexts.intersects(&[ValidationContext::Developer, ValidationContext::Operator]));
        assert!(!contexts.intersects(&[ValidationContext::Debug]));
        assert!(!contexts.intersects(&[]));
    }

    #[test]
    fn with_adds_without_mutating() {
        let base = ValidationContexts::only(ValidationContext::Developer);
        let extended = base.with(ValidationContext::Debug);
        assert!(!base.contains(ValidationContext::Debug));
        assert!(extended.contains(ValidationContext::Debug));
        assert!(extended.contains(ValidationContext::Developer));
    }
}
