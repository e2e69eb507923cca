use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Args;
use thiserror::Error;

use self::cpu::{Cpu, CpuError};
use self::memory::Memory;

pub mod cpu;
pub mod memory;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// A BRK instruction was executed at this address.
    Break { pc: u16 },
    /// The program counter entered the trap region.
    Trap { pc: u16 },
    /// The step cap was reached before the program halted.
    StepCap,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Executed-instruction cap protecting against non-termination.
    pub max_steps: usize,
    /// Halt when the program counter reaches this address or beyond.
    pub trap_at: Option<u16>,
    /// Print one line per executed instruction.
    pub trace: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            trap_at: None,
            trace: false,
        }
    }
}

/// Drive the CPU until it halts.
///
/// A CpuError (undefined opcode) bubbles up; the caller owns the decision
/// to dump registers and the recent trace.
#[tracing::instrument(skip(cpu, memory))]
pub fn run(cpu: &mut Cpu, memory: &mut Memory, options: &RunOptions) -> Result<Halt, CpuError> {
    for _ in 0..options.max_steps {
        if let Some(trap) = options.trap_at {
            let pc = cpu.program_counter();
            if pc >= trap {
                return Ok(Halt::Trap { pc });
            }
        }
        let executed = cpu.step(memory)?;
        if options.trace {
            println!("{:<28} {}", executed.to_string(), cpu.state_line());
        }
        if executed.entry.opcode == 0x00 {
            return Ok(Halt::Break { pc: executed.pc });
        }
    }
    Ok(Halt::StepCap)
}

/// Harness failures that map to distinct process exit codes.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Step cap of {0} instructions exceeded")]
    StepCapExceeded(usize),
    #[error(
        "Memory ${lo:04X}-${hi:04X} differs from {path} at ${address:04X}: \
         expected ${expected:02X}, got ${actual:02X}"
    )]
    CompareMismatch {
        lo: u16,
        hi: u16,
        path: String,
        address: u16,
        expected: u8,
        actual: u8,
    },
    #[error("Comparison file {path} is {file_len} bytes but ${lo:04X}-${hi:04X} is {range_len}")]
    CompareLength {
        lo: u16,
        hi: u16,
        path: String,
        file_len: usize,
        range_len: usize,
    },
}

/// `PATH@HHHH` load specification.
#[derive(Debug, Clone)]
pub struct LoadSpec {
    pub path: PathBuf,
    pub address: u16,
}

impl FromStr for LoadSpec {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (path, address) = spec
            .rsplit_once('@')
            .ok_or_else(|| format!("'{spec}' is not in PATH@HHHH form"))?;
        let address = u16::from_str_radix(address, 16)
            .map_err(|_| format!("'{address}' is not a hex address"))?;
        Ok(Self {
            path: PathBuf::from(path),
            address,
        })
    }
}

/// `LO:HI:PATH` dump or compare specification.
#[derive(Debug, Clone)]
pub struct RegionSpec {
    pub lo: u16,
    pub hi: u16,
    pub path: PathBuf,
}

impl FromStr for RegionSpec {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = spec.splitn(3, ':');
        let (Some(lo), Some(hi), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("'{spec}' is not in LO:HI:PATH form"));
        };
        let lo = u16::from_str_radix(lo, 16).map_err(|_| format!("'{lo}' is not a hex address"))?;
        let hi = u16::from_str_radix(hi, 16).map_err(|_| format!("'{hi}' is not a hex address"))?;
        if hi < lo {
            return Err(format!("range ${lo:04X}-${hi:04X} is backwards"));
        }
        Ok(Self {
            lo,
            hi,
            path: PathBuf::from(path),
        })
    }
}

fn parse_hex_address(address: &str) -> Result<u16, String> {
    u16::from_str_radix(address, 16).map_err(|_| format!("'{address}' is not a hex address"))
}

#[derive(Args, Debug)]
pub struct EmulateArgs {
    /// Load a binary file into memory, repeatable (PATH@HHHH)
    #[clap(long = "load", value_name = "PATH@HHHH")]
    loads: Vec<LoadSpec>,
    /// Reset program counter (hex)
    #[clap(long, value_parser = parse_hex_address, default_value = "0200")]
    start: u16,
    /// Halt when the program counter reaches this hex address or beyond
    #[clap(long, value_parser = parse_hex_address)]
    trap: Option<u16>,
    /// Halt after this many executed instructions
    #[clap(long, default_value_t = 1_000_000)]
    max_cycles: usize,
    /// After halt, write memory LO..HI to PATH
    #[clap(long, value_name = "LO:HI:PATH")]
    dump: Option<RegionSpec>,
    /// After halt, compare memory LO..HI with PATH
    #[clap(long, value_name = "LO:HI:PATH")]
    compare: Option<RegionSpec>,
    /// Print one line per executed instruction
    #[clap(long)]
    trace: bool,
}

/// Run the batch harness: load, execute until halt, then dump and compare.
#[tracing::instrument]
pub fn emulate(args: &EmulateArgs) -> Result<()> {
    let mut memory = Memory::new();
    for load in &args.loads {
        let bytes = std::fs::read(&load.path)
            .with_context(|| format!("Unable to read {}", load.path.display()))?;
        memory.load(load.address, &bytes);
        println!(
            "Loaded {} bytes from {} at ${:04X}",
            bytes.len(),
            load.path.display(),
            load.address
        );
    }

    let mut cpu = Cpu::new();
    cpu.reset(args.start);
    let options = RunOptions {
        max_steps: args.max_cycles,
        trap_at: args.trap,
        trace: args.trace,
    };

    let halt = match run(&mut cpu, &mut memory, &options) {
        Ok(halt) => halt,
        Err(error) => {
            report_crash(&cpu, &error);
            return Err(error.into());
        }
    };

    match halt {
        Halt::Break { pc } => println!("BRK at ${pc:04X}  {}", cpu.state_line()),
        Halt::Trap { pc } => println!("Trap at ${pc:04X}  {}", cpu.state_line()),
        Halt::StepCap => return Err(HarnessError::StepCapExceeded(args.max_cycles).into()),
    }

    if let Some(dump) = &args.dump {
        let bytes = memory.dump(dump.lo, dump.hi);
        std::fs::write(&dump.path, &bytes)
            .with_context(|| format!("Unable to write {}", dump.path.display()))?;
        println!(
            "Dumped ${:04X}-${:04X} ({} bytes) to {}",
            dump.lo,
            dump.hi,
            bytes.len(),
            dump.path.display()
        );
    }

    if let Some(compare) = &args.compare {
        let actual = memory.dump(compare.lo, compare.hi);
        let expected = std::fs::read(&compare.path)
            .with_context(|| format!("Unable to read {}", compare.path.display()))?;
        compare_regions(compare, &actual, &expected)?;
        println!(
            "Memory ${:04X}-${:04X} matches {} ({} bytes)",
            compare.lo,
            compare.hi,
            compare.path.display(),
            actual.len()
        );
    }

    Ok(())
}

fn compare_regions(spec: &RegionSpec, actual: &[u8], expected: &[u8]) -> Result<(), HarnessError> {
    if actual.len() != expected.len() {
        return Err(HarnessError::CompareLength {
            lo: spec.lo,
            hi: spec.hi,
            path: spec.path.display().to_string(),
            file_len: expected.len(),
            range_len: actual.len(),
        });
    }
    for (offset, (actual_byte, expected_byte)) in actual.iter().zip(expected).enumerate() {
        if actual_byte != expected_byte {
            return Err(HarnessError::CompareMismatch {
                lo: spec.lo,
                hi: spec.hi,
                path: spec.path.display().to_string(),
                address: spec.lo.wrapping_add(offset as u16),
                expected: *expected_byte,
                actual: *actual_byte,
            });
        }
    }
    Ok(())
}

/// Register dump and recent-instruction trace for runtime errors.
fn report_crash(cpu: &Cpu, error: &CpuError) {
    eprintln!("{error}");
    eprintln!("  PC=${:04X}  {}", cpu.program_counter(), cpu.state_line());
    eprintln!("  recent instructions:");
    for executed in cpu.recent_trace() {
        eprintln!("    {executed}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble_source;

    use pretty_assertions::assert_eq;

    fn load_program(source: &str) -> Memory {
        let mut memory = Memory::new();
        let image = assemble_source(source).expect("assembly failed");
        memory.load(image.base().expect("empty image"), &image.to_bytes());
        memory
    }

    #[test]
    fn test_run_halts_on_brk() {
        let mut memory = load_program("@0200\nLDA# 07\nBRK\nEND");
        let mut cpu = Cpu::new();
        cpu.reset(0x0200);
        let halt = run(&mut cpu, &mut memory, &RunOptions::default()).unwrap();
        assert_eq!(halt, Halt::Break { pc: 0x0202 });
        assert_eq!(cpu.register(cpu::Register::A), 0x07);
    }

    #[test]
    fn test_run_halts_on_trap_region() {
        // JMP into the trap region; the trap wins before execution there.
        let mut memory = load_program("@0200\nJMP  9000\nEND");
        let mut cpu = Cpu::new();
        cpu.reset(0x0200);
        let options = RunOptions {
            trap_at: Some(0x9000),
            ..Default::default()
        };
        let halt = run(&mut cpu, &mut memory, &options).unwrap();
        assert_eq!(halt, Halt::Trap { pc: 0x9000 });
    }

    #[test]
    fn test_run_step_cap() {
        // A two-instruction infinite loop.
        let mut memory = load_program("@0200\nL:\nNOP\nJMP :L\nEND");
        let mut cpu = Cpu::new();
        cpu.reset(0x0200);
        let options = RunOptions {
            max_steps: 100,
            ..Default::default()
        };
        let halt = run(&mut cpu, &mut memory, &options).unwrap();
        assert_eq!(halt, Halt::StepCap);
    }

    #[test]
    fn test_run_reports_undefined_opcode() {
        let mut memory = Memory::new();
        memory.write_byte(0x0200, 0x6C);
        let mut cpu = Cpu::new();
        cpu.reset(0x0200);
        let result = run(&mut cpu, &mut memory, &RunOptions::default());
        assert_eq!(
            result,
            Err(CpuError::UndefinedOpcode {
                pc: 0x0200,
                opcode: 0x6C
            })
        );
    }

    #[test]
    fn test_load_spec_parsing() {
        let spec: LoadSpec = "image.bin@0200".parse().unwrap();
        assert_eq!(spec.path, PathBuf::from("image.bin"));
        assert_eq!(spec.address, 0x0200);

        assert!("no-address.bin".parse::<LoadSpec>().is_err());
        assert!("file@XYZ".parse::<LoadSpec>().is_err());
    }

    #[test]
    fn test_region_spec_parsing() {
        let spec: RegionSpec = "8000:8FFF:out.bin".parse().unwrap();
        assert_eq!(spec.lo, 0x8000);
        assert_eq!(spec.hi, 0x8FFF);
        assert_eq!(spec.path, PathBuf::from("out.bin"));

        assert!("8000:out.bin".parse::<RegionSpec>().is_err());
        assert!("9000:8000:out.bin".parse::<RegionSpec>().is_err());
    }

    #[test]
    fn test_compare_regions_reports_first_difference() {
        let spec = RegionSpec {
            lo: 0x8000,
            hi: 0x8003,
            path: PathBuf::from("x.bin"),
        };
        let result = compare_regions(&spec, &[1, 2, 3, 4], &[1, 2, 9, 4]);
        match result {
            Err(HarnessError::CompareMismatch {
                address,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(address, 0x8002);
                assert_eq!(expected, 9);
                assert_eq!(actual, 3);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }
}
