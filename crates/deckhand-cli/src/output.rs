//! Formatting helpers for CLI commands.

use clap::ValueEnum;
use deckhand_spec::ComponentConfig;

/// Serialization format of a rendered config.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// YAML document.
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

/// Serializes `config` in the requested format, ending with a newline.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render(config: &ComponentConfig, format: Format) -> anyhow::Result<String> {
    Ok(match format {
        Format::Yaml => serde_yaml::to_string(config)?,
        Format::Json => {
            let mut text = serde_json::to_string_pretty(config)?;
            text.push('\n');
            text
        }
    })
}

/// Splits `key=value` at the first `=`.
///
/// # Errors
///
/// Returns an error if there is no `=` or the key is empty.
pub fn parse_key_value(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got \"{text}\"")),
    }
}

/// `1 error`, `3 errors`.
#[must_use]
pub fn count_errors(count: usize) -> String {
    if count == 1 {
        "1 error".to_owned()
    } else {
        format!("{count} errors")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_value_splits_at_first_equals() {
        assert_eq!(
            parse_key_value("URL=http://a?b=c"),
            Ok(("URL".to_owned(), "http://a?b=c".to_owned()))
        );
    }

    #[test]
    fn parse_key_value_rejects_missing_key() {
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }

    #[test]
    fn count_errors_pluralizes() {
        assert_eq!(count_errors(1), "1 error");
        assert_eq!(count_errors(0), "0 errors");
        assert_eq!(count_errors(4), "4 errors");
    }

    #[test]
    fn render_json_ends_with_newline() {
        let config = ComponentConfig {
            name: "acct/app".into(),
            tag: "latest".into(),
            reference: "acct/app:latest".into(),
            ..ComponentConfig::default()
        };
        let text = render(&config, Format::Json).expect("should render");
        assert!(text.ends_with("}\n"), "got: {text}");
        assert!(text.contains("\"ref\": \"acct/app:latest\""), "got: {text}");
    }

    #[test]
    fn render_yaml_uses_canonical_field_names() {
        let config = ComponentConfig {
            name: "acct/app".into(),
            tag: "v1".into(),
            reference: "acct/app:v1".into(),
            ..ComponentConfig::default()
        };
        let text = render(&config, Format::Yaml).expect("should render");
        assert!(text.contains("ref: acct/app:v1"), "got: {text}");
    }
}
