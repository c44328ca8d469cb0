//! `deckhand validate`: Check a component document.

use std::path::PathBuf;

use clap::Args;
use deckhand_common::error::DeckhandError;
use deckhand_common::types::{ValidationContext, ValidationContexts};
use deckhand_spec::Compiler;
use deckhand_spec::loader;

use crate::output;

/// Arguments for the `validate` command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Component document, or a directory containing one.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Validation context (developer, operator, debug). Repeatable.
    #[arg(long = "context", value_name = "CONTEXT")]
    pub contexts: Vec<ValidationContext>,
}

/// Executes the `validate` command.
///
/// Runs schema validation, the transform, and an interpolation reference
/// check, printing every diagnostic found.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or has any problem.
pub fn execute(compiler: &Compiler, args: ValidateArgs) -> anyhow::Result<()> {
    let contexts = if args.contexts.is_empty() {
        compiler.default_contexts()
    } else {
        args.contexts.into_iter().collect::<ValidationContexts>()
    };
    tracing::info!(path = %args.path.display(), ?contexts, "validating component document");

    let document = loader::load_document(&args.path)?;
    let errors = match compiler.compile_document(&document, &contexts) {
        Ok(config) => {
            let errors = compiler.validate_document_interpolation(&config, &document)?;
            if errors.is_empty() {
                println!("{} is valid", config.reference);
                return Ok(());
            }
            errors
        }
        Err(DeckhandError::Validation(errors)) => errors,
        Err(other) => return Err(other.into()),
    };

    let location = document.path.as_ref().unwrap_or(&args.path);
    println!("{}", location.display());
    for error in &errors {
        println!("  {error}");
    }
    anyhow::bail!("{} found", output::count_errors(errors.len()))
}
