//! Reading component documents from disk.
//!
//! Finds the document for a path, parses it as YAML or JSON, and replaces
//! `file:<path>` string values with the referenced file's contents before
//! anything else looks at the document.

use std::path::{Path, PathBuf};

use deckhand_common::constants::{CONFIG_FILENAMES, FILE_REF_PREFIX};
use deckhand_common::error::{
    DeckhandError, ErrorKind, Result, ValidationError, ValidationErrors,
};
use serde_yaml::Value;

use crate::schema::{join_path, source_map};

/// A parsed document together with the text it came from.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File the document was read from, if any.
    pub path: Option<PathBuf>,
    /// Original text, used to attach line numbers to diagnostics.
    pub source: String,
    /// Parsed value with `file:` references already substituted.
    pub value: Value,
}

impl SourceDocument {
    /// Parses in-memory text. `file:` references are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DeckhandError::Parse`] if the text is neither YAML nor JSON.
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let value = parse_value(&source)?;
        Ok(Self {
            path: None,
            source,
            value,
        })
    }

    /// Parses text read from `path`, resolving `file:` references relative
    /// to the directory containing it.
    ///
    /// # Errors
    ///
    /// Returns [`DeckhandError::Parse`] for malformed text, or a validation
    /// error listing every `file:` reference that points at a missing file.
    pub fn parse_at(source: impl Into<String>, path: &Path) -> Result<Self> {
        let source = source.into();
        let mut value = parse_value(&source)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut errors = ValidationErrors::new();
        substitute_file_refs(&mut value, base_dir, "", &mut errors)?;
        source_map::annotate(&source, &mut errors);
        errors.into_result(Self {
            path: Some(path.to_path_buf()),
            source,
            value,
        })
    }

    /// Directory relative paths inside the document resolve against.
    #[must_use]
    pub fn base_dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }
}

/// Returns the document file for `path`.
///
/// A file is returned as is. A directory is searched for
/// `component.yml`, `component.yaml`, then `component.json`.
///
/// # Errors
///
/// Returns [`DeckhandError::MissingConfigSource`] if nothing is found.
pub fn find_config_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if path.is_dir() {
        if let Some(found) = CONFIG_FILENAMES
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| candidate.is_file())
        {
            return Ok(found);
        }
    }
    Err(DeckhandError::MissingConfigSource {
        path: path.to_path_buf(),
    })
}

/// Finds, reads, and parses the document at `path`.
///
/// # Errors
///
/// Returns an error if no document exists, it cannot be read or parsed,
/// or one of its `file:` references is missing.
pub fn load_document(path: &Path) -> Result<SourceDocument> {
    let file = find_config_file(path)?;
    tracing::info!(path = %file.display(), "loading component document");
    let source = read(&file)?;
    SourceDocument::parse_at(source, &file)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| DeckhandError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_value(source: &str) -> Result<Value> {
    serde_yaml::from_str(source).map_err(|e| {
        let location = e.location();
        DeckhandError::Parse {
            message: e.to_string(),
            line: location.as_ref().map(serde_yaml::Location::line),
            column: location.as_ref().map(serde_yaml::Location::column),
        }
    })
}

fn substitute_file_refs(
    value: &mut Value,
    base_dir: &Path,
    path: &str,
    errors: &mut ValidationErrors,
) -> Result<()> {
    match value {
        Value::String(text) => {
            if let Some(target) = text.strip_prefix(FILE_REF_PREFIX) {
                let file = resolve_path(target.trim(), base_dir);
                if file.is_file() {
                    tracing::debug!(path, file = %file.display(), "substituting file reference");
                    *text = escape_braces(read(&file)?.trim());
                } else {
                    errors.push(
                        ValidationError::new(
                            ErrorKind::MissingConfigSource,
                            path,
                            "file-ref",
                            format!("referenced file {} does not exist", file.display()),
                        )
                        .with_value(text.as_str()),
                    );
                }
            }
        }
        Value::Mapping(map) => {
            for (key, child) in map.iter_mut() {
                let key = key.as_str().unwrap_or_default();
                if key == "extends" {
                    if !path.is_empty() && child.as_str().is_some_and(is_file_ref) {
                        tracing::warn!(path, "file reference under a nested extends is left as is");
                    }
                    continue;
                }
                substitute_file_refs(child, base_dir, &join_path(path, key), errors)?;
            }
        }
        Value::Sequence(items) => {
            for (idx, item) in items.iter_mut().enumerate() {
                substitute_file_refs(item, base_dir, &join_path(path, &idx.to_string()), errors)?;
            }
        }
        Value::Tagged(tagged) => substitute_file_refs(&mut tagged.value, base_dir, path, errors)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

fn is_file_ref(text: &str) -> bool {
    text.starts_with(FILE_REF_PREFIX)
}

fn resolve_path(target: &str, base_dir: &Path) -> PathBuf {
    if let Some(rest) = target.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    base_dir.join(target)
}

/// Doubles the `$` of every `${` that does not open an interpolation.
fn escape_braces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("${") {
        let (head, tail) = rest.split_at(idx);
        out.push_str(head);
        if tail[2..].starts_with('{') {
            out.push_str("${{");
            rest = &tail[3..];
        } else {
            out.push_str("$${");
            rest = &tail[2..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn find_config_file_searches_directory_in_order() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        fs::write(dir.path().join("component.json"), "{}").expect("should write");
        fs::write(dir.path().join("component.yaml"), "name: a").expect("should write");
        let found = find_config_file(dir.path()).expect("should find");
        assert_eq!(found, dir.path().join("component.yaml"));
    }

    #[test]
    fn find_config_file_accepts_explicit_file() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let file = dir.path().join("custom.yml");
        fs::write(&file, "name: a").expect("should write");
        assert_eq!(find_config_file(&file).expect("should find"), file);
    }

    #[test]
    fn find_config_file_reports_missing_source() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let err = find_config_file(dir.path()).expect_err("should fail");
        assert!(matches!(err, DeckhandError::MissingConfigSource { .. }));
    }

    #[test]
    fn parse_error_reports_line() {
        let err = SourceDocument::parse("name: a\nservices:\n  api: [\n").expect_err("should fail");
        match err {
            DeckhandError::Parse { line, .. } => assert!(line.is_some()),
            other => unreachable!("unexpected error: {other}"),
        }
    }

    #[test]
    fn null_literals_stay_distinct_from_absent() {
        let doc = SourceDocument::parse("parameters:\n  a: ~\n  b: NULL\n").expect("should parse");
        let parameters = doc.value.get("parameters").expect("should have parameters");
        assert!(parameters.get("a").is_some_and(Value::is_null));
        assert!(parameters.get("b").is_some_and(Value::is_null));
        assert!(parameters.get("c").is_none());
    }

    #[test]
    fn file_refs_are_substituted_relative_to_document() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        fs::write(dir.path().join("motd.txt"), "  hello \"world\"\n").expect("should write");
        let file = dir.path().join("component.yml");
        fs::write(
            &file,
            "name: acct/c\nservices:\n  api:\n    environment:\n      MOTD: file:./motd.txt\n",
        )
        .expect("should write");

        let doc = load_document(dir.path()).expect("should load");
        let motd = doc.value["services"]["api"]["environment"]["MOTD"].as_str();
        assert_eq!(motd, Some("hello \"world\""));
        assert_eq!(doc.base_dir(), Some(dir.path()));
    }

    #[test]
    fn extends_file_ref_is_not_substituted() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let file = dir.path().join("component.yml");
        fs::write(&file, "name: acct/c\nextends: file:../parent\n").expect("should write");
        let doc = load_document(&file).expect("should load");
        assert_eq!(doc.value["extends"].as_str(), Some("file:../parent"));
    }

    #[test]
    fn missing_file_ref_is_reported_at_its_path() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let file = dir.path().join("component.yml");
        fs::write(
            &file,
            "name: acct/c\nservices:\n  api:\n    command: file:nope.sh\n",
        )
        .expect("should write");
        let err = load_document(&file).expect_err("should fail");
        let errors = err.validation_errors().expect("should be validation errors");
        let error = errors.iter().next().expect("should report");
        assert_eq!(error.kind, ErrorKind::MissingConfigSource);
        assert_eq!(error.path, "services.api.command");
        assert_eq!(error.position.map(|p| p.start.line), Some(4));
    }

    #[test]
    fn literal_dollar_braces_are_doubled() {
        assert_eq!(escape_braces("echo ${HOME}"), "echo $${HOME}");
        assert_eq!(escape_braces("${{ parameters.a }}"), "${{ parameters.a }}");
        assert_eq!(escape_braces("$HOME"), "$HOME");
    }
}
