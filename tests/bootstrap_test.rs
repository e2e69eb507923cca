use bootstrap6502::assembler::catalogue::CATALOGUE;
use bootstrap6502::selfhost::{
    self, reference_image, resolved, self_assemble, CODE_BASE, OUTPUT_BASE, OUTPUT_LIMIT,
    TABLE_BASE,
};

use pretty_assertions::assert_eq;

/// Extract a 6-byte opcode-table record from the program's binary.
fn table_record(binary: &[u8], index: usize) -> (&[u8], u8, u8) {
    let table_offset = (TABLE_BASE - CODE_BASE) as usize;
    let offset = table_offset + index * 6;
    (
        &binary[offset..offset + 4],
        binary[offset + 4],
        binary[offset + 5],
    )
}

#[test]
fn test_opcode_table_format_in_binary() {
    let binary = reference_image().unwrap().to_bytes();
    for (index, entry) in CATALOGUE.entries().iter().enumerate() {
        let (mnemonic, opcode, shape) = table_record(&binary, index);
        assert_eq!(mnemonic, entry.mnemonic, "entry {index}: mnemonic mismatch");
        assert_eq!(opcode, entry.opcode, "entry {index}: opcode mismatch");
        assert_eq!(shape, entry.shape.code(), "entry {index}: shape mismatch");
    }
    // The scan terminator sits right after the last record.
    let terminator = (TABLE_BASE - CODE_BASE) as usize + CATALOGUE.entries().len() * 6;
    assert_eq!(binary[terminator], 0x00);
}

#[test]
fn test_opcode_lookup_in_binary_table() {
    let binary = reference_image().unwrap().to_bytes();
    let mut index = 0;
    let found = loop {
        let (mnemonic, opcode, shape) = table_record(&binary, index);
        if mnemonic == b"BRK " {
            break Some((opcode, shape));
        }
        if mnemonic[0] == 0 {
            break None;
        }
        index += 1;
    };
    assert_eq!(found, Some((0x00, 0)));
}

#[test]
fn test_self_hosting_equivalence() {
    // The whole point: assemble the assembler with the reference path,
    // then let that binary assemble its own source on the emulator, and
    // compare every byte of the output window.
    let resolved_source = resolved().unwrap();
    let reference = reference_image().unwrap();
    let expected = reference.window(OUTPUT_BASE, OUTPUT_LIMIT);

    let actual = self_assemble(&resolved_source, 10_000_000).unwrap();

    assert_eq!(actual.len(), expected.len());
    if let Some(offset) = actual
        .iter()
        .zip(&expected)
        .position(|(actual_byte, expected_byte)| actual_byte != expected_byte)
    {
        panic!(
            "first difference at ${:04X}: reference {:02X}, self-hosted {:02X}",
            OUTPUT_BASE + offset as u16,
            expected[offset],
            actual[offset],
        );
    }
}

#[test]
fn test_self_assembly_of_a_small_program() {
    // The self-hosting assembler handles arbitrary resolved input, not
    // just its own source.
    let resolved_source = "@0200\nLDA# 2A\nSTAZ 80\nBRK \nEND \n";
    let output = self_assemble(resolved_source, 1_000_000).unwrap();
    // Output lands at OUTPUT_BASE-relative positions for effective 0200
    // only when the source relocates; without a `!` the bytes go to the
    // literal output pointer, outside the dumped window, so relocate:
    let relocated = format!("!{:04X}\n{resolved_source}", selfhost::RELOCATION);
    let output_relocated = self_assemble(&relocated, 1_000_000).unwrap();
    assert_eq!(&output_relocated[..5], &[0xA9, 0x2A, 0x85, 0x80, 0x00]);
    // The unrelocated run writes nothing into the window.
    assert!(output.iter().all(|&byte| byte == 0));
}
