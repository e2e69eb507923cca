use anyhow::Result;
use clap::{Parser, Subcommand};

use bootstrap6502::{
    assembler::{assemble, resolve, AssembleArgs, ResolveArgs},
    emulator::{emulate, EmulateArgs, HarnessError},
    instrumentation,
    selfhost::{bootstrap, BootstrapArgs},
};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[clap(long)]
    #[clap(help = "Enable chrome tracing")]
    #[clap(long_help = "Enable chrome tracing which on program exit will generate
a json file to be opened with a chrome tracing compatible
viewer.")]
    profile: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[clap(about = "Assemble a program")]
    #[clap(aliases = &["a", "asm"])]
    Assemble(AssembleArgs),
    #[clap(about = "Resolve labels and comments into the punch form")]
    #[clap(aliases = &["r", "res"])]
    Resolve(ResolveArgs),
    #[clap(about = "Run a binary image in the emulator")]
    #[clap(aliases = &["e", "emu"])]
    Emulate(EmulateArgs),
    #[clap(about = "Verify the self-hosting assembler against the reference path")]
    #[clap(aliases = &["b", "boot"])]
    Bootstrap(BootstrapArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _trace_guard = if cli.profile {
        Some(instrumentation::trace())
    } else {
        None
    };

    let result = match &cli.command {
        Command::Assemble(args) => assemble(args),
        Command::Resolve(args) => resolve(args),
        Command::Emulate(args) => emulate(args),
        Command::Bootstrap(args) => bootstrap(args),
    };

    if let Err(error) = result {
        eprintln!("Error: {error:#}");
        // The cycle cap gets its own exit code so scripts can tell a
        // non-terminating program from a mismatch.
        if matches!(
            error.downcast_ref::<HarnessError>(),
            Some(HarnessError::StepCapExceeded(_))
        ) {
            std::process::exit(2);
        }
        std::process::exit(1);
    }

    Ok(())
}
