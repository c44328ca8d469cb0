//! CLI command definitions and dispatch.

pub mod ref_cmd;
pub mod render;
pub mod validate;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use deckhand_common::config::CompilerConfig;
use deckhand_common::constants::CONFIG_ENV_VAR;
use deckhand_spec::Compiler;

/// Deckhand: compile component documents into canonical configs.
#[derive(Parser, Debug)]
#[command(name = "deckhand", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to a compiler config file.
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// How log events are written to stderr.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a component document and report every problem found.
    Validate(validate::ValidateArgs),
    /// Print the canonical config of a component document.
    Render(render::RenderArgs),
    /// Print the safe ref of a slug.
    Ref(ref_cmd::RefArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the compiler config cannot be loaded or the command
/// fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let compiler = compiler(cli.config.as_deref())?;
    match cli.command {
        Command::Validate(args) => validate::execute(&compiler, args),
        Command::Render(args) => render::execute(&compiler, args),
        Command::Ref(args) => ref_cmd::execute(&compiler, &args),
    }
}

fn compiler(config: Option<&Path>) -> anyhow::Result<Compiler> {
    let config = match config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading compiler config");
            CompilerConfig::load(path)?
        }
        None => CompilerConfig::default(),
    };
    Ok(Compiler::new(config))
}
