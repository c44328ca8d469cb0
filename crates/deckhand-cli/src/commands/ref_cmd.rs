//! `deckhand ref`: Print the safe ref of a slug.

use clap::Args;
use deckhand_spec::Compiler;
use deckhand_spec::refs;

/// Arguments for the `ref` command.
#[derive(Args, Debug)]
pub struct RefArgs {
    /// Slug of any kind, e.g. `acct/app/api:1.0`.
    pub slug: String,

    /// Readable prefix to use instead of the slug's own parts.
    #[arg(long)]
    pub name: Option<String>,

    /// Instance identifier mixed into the digest.
    #[arg(long, conflicts_with = "name")]
    pub instance: Option<String>,

    /// Upper bound on the ref length. Defaults to the compiler config.
    #[arg(long)]
    pub max_length: Option<usize>,
}

/// Executes the `ref` command.
///
/// # Errors
///
/// Returns an error if the slug is malformed or the length bound cannot
/// hold a ref.
pub fn execute(compiler: &Compiler, args: &RefArgs) -> anyhow::Result<()> {
    let max_length = args
        .max_length
        .unwrap_or(compiler.config().max_ref_length);
    let reference = match &args.instance {
        Some(instance) => refs::safe_ref_with_instance(&args.slug, instance, max_length)?,
        None => refs::safe_ref_with_name(args.name.as_deref(), &args.slug, max_length)?,
    };
    println!("{reference}");
    Ok(())
}
