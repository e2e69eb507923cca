use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use self::image::Image;

/// Lexes friendly source into tokens.
pub mod lexer;

/// Two-pass label resolution: friendly form in, punch form out.
pub mod resolver;

/// Single-pass emission: punch form in, machine-code image out.
pub mod emitter;

/// The mapping between dialect mnemonics and opcodes.
pub mod catalogue;

/// Sparse machine-code image addressed by output address.
pub mod image;

#[derive(Debug, thiserror::Error)]
pub enum AssemblerError {
    #[error("Resolver error: {0}")]
    Resolve(#[from] resolver::ResolveError),
    #[error("Emission error: {0}")]
    Emit(#[from] emitter::EmitError),
}

/// Resolve friendly source into the punch form.
#[tracing::instrument(skip(input))]
pub fn resolve_source(input: &str) -> Result<String, AssemblerError> {
    Ok(resolver::resolve(input)?)
}

/// Assemble an already-resolved (punch form) source into an image.
#[tracing::instrument(skip(input))]
pub fn assemble_resolved(input: &str) -> Result<Image, AssemblerError> {
    Ok(emitter::emit(input)?)
}

/// Assemble friendly source: resolve labels, then emit machine code.
#[tracing::instrument(skip(input))]
pub fn assemble_source(input: &str) -> Result<Image, AssemblerError> {
    let resolved = resolver::resolve(input)?;
    Ok(emitter::emit(&resolved)?)
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Friendly source (.asm) or already-resolved punch source (.punch)
    input: PathBuf,
    /// Output path; defaults to the input with a .bin extension
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Print a hex listing of the produced image
    #[clap(long)]
    listing: bool,
}

#[tracing::instrument]
pub fn assemble(args: &AssembleArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Unable to read {}", args.input.display()))?;

    let image = if args.input.extension().is_some_and(|ext| ext == "punch") {
        assemble_resolved(&source)
    } else {
        assemble_source(&source)
    }
    .with_context(|| "Assembly failed")?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("bin"));
    let bytes = image.to_bytes();
    std::fs::write(&output, &bytes)
        .with_context(|| format!("Unable to write {}", output.display()))?;

    println!(
        "Assembled {} bytes at ${:04X} to {}",
        bytes.len(),
        image.base().unwrap_or(0),
        output.display()
    );
    if args.listing {
        println!("{}", crate::hexdump::hexdump(&bytes, image.base().unwrap_or(0)));
    }

    Ok(())
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Friendly source file
    input: PathBuf,
    /// Output path; defaults to the input with a .punch extension
    #[clap(short, long)]
    output: Option<PathBuf>,
}

#[tracing::instrument]
pub fn resolve(args: &ResolveArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Unable to read {}", args.input.display()))?;
    let resolved = resolve_source(&source).with_context(|| "Resolution failed")?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("punch"));
    std::fs::write(&output, resolved.as_bytes())
        .with_context(|| format!("Unable to write {}", output.display()))?;
    println!("Resolved {} to {}", args.input.display(), output.display());

    Ok(())
}
