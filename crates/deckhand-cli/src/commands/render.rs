//! `deckhand render`: Print the canonical config of a component.

use std::path::{Path, PathBuf};

use clap::Args;
use deckhand_common::types::{ValidationContext, ValidationContexts};
use deckhand_spec::{Compiler, loader};
use indexmap::IndexMap;
use serde_yaml::Value;

use crate::output::{self, Format};

/// Arguments for the `render` command.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Component document, or a directory containing one.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Operator override documents, merged in order.
    #[arg(long = "override", value_name = "PATH")]
    pub overrides: Vec<PathBuf>,

    /// Local dependency documents, as `name=path`.
    #[arg(long = "dependency", value_name = "NAME=PATH", value_parser = output::parse_key_value)]
    pub dependencies: Vec<(String, String)>,

    /// Parameter values, as `key=value`.
    #[arg(short, long = "parameter", value_name = "KEY=VALUE", value_parser = output::parse_key_value)]
    pub parameters: Vec<(String, String)>,

    /// Resolve `${{ ... }}` expressions before printing.
    #[arg(long)]
    pub interpolate: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Yaml)]
    pub format: Format,
}

/// Executes the `render` command.
///
/// # Errors
///
/// Returns an error if any document fails to compile, or interpolation is
/// requested and an expression does not resolve.
pub fn execute(compiler: &Compiler, args: RenderArgs) -> anyhow::Result<()> {
    tracing::info!(path = %args.path.display(), "rendering component config");
    let mut config = compiler.compile_path(&args.path, &compiler.default_contexts())?;

    let operator = ValidationContexts::only(ValidationContext::Operator);
    for path in &args.overrides {
        let mut document = loader::load_document(path)?;
        // An override without a tag keeps the base tag instead of resetting it.
        if let Value::Mapping(map) = &mut document.value {
            if !map.contains_key("tag") {
                let _ = map.insert("tag".into(), Value::String(config.tag.clone()));
            }
        }
        let overlay = compiler.compile_document(&document, &operator)?;
        config = compiler.merge(&config, &overlay);
    }

    if args.interpolate {
        let mut dependencies = IndexMap::new();
        for (name, path) in &args.dependencies {
            let dependency = compiler.compile_path(Path::new(path), &compiler.default_contexts())?;
            let context = compiler.resolved_context(&dependency, &IndexMap::new())?;
            let _ = dependencies.insert(name.clone(), context);
        }
        let mut context = compiler.context_for(&config, &dependencies)?;
        for (key, value) in &args.parameters {
            context.set_parameter(key, value.as_str());
        }
        config = compiler.interpolate(&config, &context)?;
    } else if !args.parameters.is_empty() || !args.dependencies.is_empty() {
        tracing::warn!("parameters and dependencies are only used with --interpolate");
    }

    print!("{}", output::render(&config, args.format)?);
    Ok(())
}
