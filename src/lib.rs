/// Transforms dialect assembly code to machine code.
///
/// The steps are:
/// 1. **Lexing** - converting the friendly source into tokens
/// 2. **Resolving** - two passes that assign addresses to labels and print
///    the resolved ("punch") form with only numeric operands
/// 3. **Emitting** - converting the resolved form into a machine-code image
pub mod assembler;

/// 6502 CPU emulator and the batch harness driving it
pub mod emulator;

/// The assembler written in its own dialect, plus the bootstrap
/// equivalence check between it and the reference path
pub mod selfhost;

/// Hexdump utility
pub mod hexdump;

/// Chrome tracing instrumentation
pub mod instrumentation;
