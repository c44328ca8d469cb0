//! The transform pipeline: [`ComponentSpec`](crate::schema::spec::ComponentSpec)
//! in, canonical [`ComponentConfig`](crate::config::ComponentConfig) out.
//!
//! Shorthands are expanded, defaults applied, string commands tokenized,
//! and identity fields stamped onto every resource. Problems are collected
//! while the whole document is walked and returned together.

pub mod component;
pub mod resource;
pub mod shell;

use deckhand_common::config::InterpolationSettings;
use deckhand_common::error::{ErrorKind, ValidationError, ValidationErrors};

use crate::schema::spec::CommandSpec;

pub use component::transform;
pub use shell::ShellLexer;

/// Carries settings and accumulated errors through one transform run.
#[derive(Debug)]
pub struct Transformer<'a> {
    settings: &'a InterpolationSettings,
    errors: ValidationErrors,
}

impl<'a> Transformer<'a> {
    /// Starts a run with the given interpolation delimiters.
    #[must_use]
    pub const fn new(settings: &'a InterpolationSettings) -> Self {
        Self {
            settings,
            errors: ValidationErrors::new(),
        }
    }

    /// Records a problem found while transforming `path`.
    pub fn report(&mut self, error: ValidationError) {
        tracing::debug!(path = %error.path, constraint = %error.constraint, "transform error");
        self.errors.push(error);
    }

    /// Consumes the run, returning everything reported.
    #[must_use]
    pub fn finish(self) -> ValidationErrors {
        self.errors
    }

    const fn settings(&self) -> &'a InterpolationSettings {
        self.settings
    }

    /// Normalizes a command to an argument list.
    fn command(&mut self, spec: &CommandSpec, declared: &[&str], path: &str) -> Option<Vec<String>> {
        match spec {
            CommandSpec::List(args) => Some(args.iter().map(ToString::to_string).collect()),
            CommandSpec::Shell(line) => {
                let settings = self.settings;
                let lexer = ShellLexer::new(&settings.open, &settings.close)
                    .with_declared(declared.iter().copied());
                match lexer.tokenize(line) {
                    Ok(args) => Some(args),
                    Err(message) => {
                        self.report(
                            ValidationError::new(
                                ErrorKind::SchemaValidation,
                                path,
                                "shell-syntax",
                                message,
                            )
                            .with_value(line.clone()),
                        );
                        None
                    }
                }
            }
        }
    }
}
