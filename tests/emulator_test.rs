use bootstrap6502::assembler::assemble_source;
use bootstrap6502::emulator::{
    cpu::{Cpu, Register},
    memory::Memory,
    run, Halt, RunOptions,
};

#[test]
fn test_counter_program() {
    let source = "
@0200
LDA# 00
STAZ 80
L:
INCZ 80
LDAZ 80
CMP# 0A
BNE :L
BRK
END
";
    let image = assemble_source(source).unwrap();
    let mut memory = Memory::new();
    memory.load(image.base().unwrap(), &image.to_bytes());

    let mut cpu = Cpu::new();
    cpu.reset(0x0200);
    let halt = run(&mut cpu, &mut memory, &RunOptions::default()).unwrap();

    assert!(matches!(halt, Halt::Break { .. }));
    assert_eq!(memory.read_byte(0x0080), 0x0A);
    assert_eq!(cpu.register(Register::A), 0x0A);
}

#[test]
fn test_fill_pattern_program() {
    // Copy X into a page via the output pointer, subroutine included.
    let source = "
@0200
LDX# 00
LOOP:
TXA
STAX 0300
INX
CPX# 10
BNE :LOOP
JSR :MARK
BRK
MARK:
LDA# EE
STAZ 90
RTS
END
";
    let image = assemble_source(source).unwrap();
    let mut memory = Memory::new();
    memory.load(image.base().unwrap(), &image.to_bytes());

    let mut cpu = Cpu::new();
    cpu.reset(0x0200);
    let halt = run(&mut cpu, &mut memory, &RunOptions::default()).unwrap();

    assert!(matches!(halt, Halt::Break { .. }));
    for offset in 0..0x10 {
        assert_eq!(memory.read_byte(0x0300 + offset), offset as u8);
    }
    assert_eq!(memory.read_byte(0x0090), 0xEE);
}

#[test]
fn test_same_image_same_final_state() {
    // Emulator determinism over an identical setup.
    let run_once = || {
        let image = assemble_source("@0200\nLDA# 05\nL:\nADC# 05\nCMP# 23\nBNE :L\nBRK\nEND")
            .unwrap();
        let mut memory = Memory::new();
        memory.load(image.base().unwrap(), &image.to_bytes());
        let mut cpu = Cpu::new();
        cpu.reset(0x0200);
        let halt = run(&mut cpu, &mut memory, &RunOptions::default()).unwrap();
        (halt, cpu.register(Register::A), cpu.program_counter())
    };
    assert_eq!(run_once(), run_once());
}

#[test]
fn test_trap_region_detects_completion() {
    let source = "@0200\nLDA# 01\nJMP  9000\nEND";
    let image = assemble_source(source).unwrap();
    let mut memory = Memory::new();
    memory.load(image.base().unwrap(), &image.to_bytes());

    let mut cpu = Cpu::new();
    cpu.reset(0x0200);
    let options = RunOptions {
        trap_at: Some(0x9000),
        ..Default::default()
    };
    let halt = run(&mut cpu, &mut memory, &options).unwrap();
    assert_eq!(halt, Halt::Trap { pc: 0x9000 });
    assert_eq!(cpu.register(Register::A), 0x01);
}
