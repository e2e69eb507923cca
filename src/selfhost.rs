use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::assembler::{self, catalogue::CATALOGUE, image::Image, AssemblerError};
use crate::emulator::{self, cpu::Cpu, memory::Memory, Halt, RunOptions};
use crate::hexdump::hexdump;

/// Where the assembler's code executes.
pub const CODE_BASE: u16 = 0x0200;
/// Where the assembler scans its opcode table.
pub const TABLE_BASE: u16 = 0x1000;
/// Where the assembler reads its resolved source.
pub const SOURCE_BASE: u16 = 0x2000;
/// Where the assembled product lands in memory.
pub const OUTPUT_BASE: u16 = 0x8000;
/// Relocation base carried by the program's leading `!` directive, so
/// that CODE_BASE + RELOCATION == OUTPUT_BASE.
pub const RELOCATION: u16 = 0x7E00;
/// Where the program jumps on the END sentinel; doubles as the harness
/// trap address.
pub const COMPLETION: u16 = 0x9000;
/// End of the output window the equivalence check compares.
pub const OUTPUT_LIMIT: u16 = 0x8FFF;

/// The hand-written part of the program: everything except the opcode
/// table, which is generated from the catalogue below.
const CORE: &str = include_str!("../programs/assembler.asm");

/// The opcode table as dialect source: each entry a 4-byte string
/// followed by the opcode and shape bytes, terminated by a zero byte.
fn table_section() -> String {
    let mut section = format!("\n; opcode lookup table\n@{TABLE_BASE:04X}\n");
    for entry in CATALOGUE.entries() {
        writeln!(
            section,
            "\"{}\" #{:02X} #{:02X}",
            entry.mnemonic_str(),
            entry.opcode,
            entry.shape.code()
        )
        .expect("write to string");
    }
    section.push_str("#00\nEND \n");
    section
}

/// The complete friendly source of the self-hosting assembler. The
/// lookup table it scans and the table the reference path consults are
/// generated from the same catalogue, so they cannot diverge.
pub fn source() -> String {
    let mut text = String::from(CORE);
    text.push_str(&table_section());
    text
}

/// The resolved (punch) form of the program.
pub fn resolved() -> Result<String, AssemblerError> {
    assembler::resolve_source(&source())
}

/// The program's image as the reference assembler produces it.
pub fn reference_image() -> Result<Image, AssemblerError> {
    assembler::assemble_resolved(&resolved()?)
}

/// Run the self-hosting assembler on the emulator over the given
/// resolved source, returning the output window it wrote.
#[tracing::instrument(skip(resolved_source))]
pub fn self_assemble(resolved_source: &str, max_steps: usize) -> Result<Vec<u8>> {
    let image = reference_image().context("reference assembly of the self-hosting program")?;

    let mut memory = Memory::new();
    memory.load(CODE_BASE, &image.to_bytes());
    memory.load(SOURCE_BASE, resolved_source.as_bytes());

    let mut cpu = Cpu::new();
    cpu.reset(CODE_BASE);
    let options = RunOptions {
        max_steps,
        trap_at: Some(COMPLETION),
        trace: false,
    };
    match emulator::run(&mut cpu, &mut memory, &options)? {
        Halt::Trap { .. } => Ok(memory.dump(OUTPUT_BASE, OUTPUT_LIMIT)),
        Halt::Break { pc } => bail!("assembler halted at ${pc:04X}: mnemonic not found"),
        Halt::StepCap => bail!("assembler exceeded the cap of {max_steps} instructions"),
    }
}

#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Halt the self-assembly after this many executed instructions
    #[clap(long, default_value_t = 10_000_000)]
    max_cycles: usize,
}

/// The full equivalence check: the reference assembler and the
/// self-hosting assembler must produce identical bytes for the
/// program's own source.
#[tracing::instrument]
pub fn bootstrap(args: &BootstrapArgs) -> Result<()> {
    let resolved = resolved().context("resolving the self-hosting program")?;
    let reference = reference_image().context("reference assembly")?;
    let expected = reference.window(OUTPUT_BASE, OUTPUT_LIMIT);

    let actual = self_assemble(&resolved, args.max_cycles)?;

    if let Some(offset) = actual
        .iter()
        .zip(&expected)
        .position(|(actual_byte, expected_byte)| actual_byte != expected_byte)
    {
        let address = OUTPUT_BASE + offset as u16;
        eprintln!("First difference at ${address:04X}:");
        let context_start = offset & !0xF;
        eprintln!(
            "reference:\n{}",
            hexdump(
                &expected[context_start..(context_start + 16).min(expected.len())],
                OUTPUT_BASE + context_start as u16
            )
        );
        eprintln!(
            "self-hosted:\n{}",
            hexdump(
                &actual[context_start..(context_start + 16).min(actual.len())],
                OUTPUT_BASE + context_start as u16
            )
        );
        bail!("self-hosted output differs from the reference image at ${address:04X}");
    }

    println!(
        "Self-hosted output matches the reference image: {} bytes at ${:04X}",
        reference.to_bytes().len(),
        reference.base().unwrap_or(OUTPUT_BASE),
    );
    Ok(())
}
