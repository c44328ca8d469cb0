//! Schema and validation of component documents.
//!
//! Validation runs in two layers:
//!
//! 1. [`structure`] walks the raw YAML value against static per-object key
//!    tables (unknown keys, value types, dictionary key grammars).
//! 2. [`validator`] checks the typed [`spec::ComponentSpec`] against the
//!    context-gated rule tables in [`rules`] and the cross-structure
//!    constraints (key collisions, `depends_on` references and cycles).
//!
//! [`source_map`] attaches line and column numbers afterwards.

pub mod rules;
pub mod source_map;
pub mod spec;
pub mod structure;
pub mod validator;

pub use validator::validate;

/// Appends `key` to a dot-delimited property path.
#[must_use]
pub fn join_path(parent: &str, key: &str) -> String {
    match (parent.is_empty(), key.is_empty()) {
        (true, _) => key.to_owned(),
        (false, true) => parent.to_owned(),
        (false, false) => format!("{parent}.{key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_handles_empty_segments() {
        assert_eq!(join_path("", "services"), "services");
        assert_eq!(join_path("services", "api"), "services.api");
        assert_eq!(join_path("services.api", ""), "services.api");
    }
}
