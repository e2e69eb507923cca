use lazy_static::lazy_static;
use std::collections::HashMap;

/// Opcode byte of the `END ` sentinel that terminates a source stream.
pub const END_OPCODE: u8 = 0xFF;

/// Operand encoding category of a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// No operand; a single opcode byte.
    Implied,
    /// One operand byte.
    Byte,
    /// Two operand bytes, emitted low then high.
    Word,
    /// One operand byte holding a signed PC-relative displacement.
    Branch,
}

impl Shape {
    pub fn code(self) -> u8 {
        match self {
            Shape::Implied => 0,
            Shape::Byte => 1,
            Shape::Word => 2,
            Shape::Branch => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Shape::Implied),
            1 => Some(Shape::Byte),
            2 => Some(Shape::Word),
            3 => Some(Shape::Branch),
            _ => None,
        }
    }

    /// Number of operand bytes that follow the opcode byte.
    pub fn operand_len(self) -> u16 {
        match self {
            Shape::Implied => 0,
            Shape::Byte | Shape::Branch => 1,
            Shape::Word => 2,
        }
    }

    /// Total encoded length of an instruction of this shape.
    pub fn encoded_len(self) -> u16 {
        1 + self.operand_len()
    }
}

/// One catalogue record: four mnemonic bytes, the opcode byte and the
/// operand shape. Laid out in memory this is exactly six bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub mnemonic: [u8; 4],
    pub opcode: u8,
    pub shape: Shape,
}

impl Entry {
    pub fn mnemonic_str(&self) -> &str {
        // Mnemonics are printable ASCII by construction.
        std::str::from_utf8(&self.mnemonic).expect("mnemonic is ASCII")
    }
}

/// Normalize a source word into the fixed 4-character mnemonic form:
/// uppercased and padded with trailing spaces. Words longer than four
/// characters are not mnemonics.
pub fn pad_mnemonic(word: &str) -> Option<[u8; 4]> {
    if word.is_empty() || word.len() > 4 || !word.is_ascii() {
        return None;
    }
    let mut mnemonic = [b' '; 4];
    for (i, byte) in word.bytes().enumerate() {
        mnemonic[i] = byte.to_ascii_uppercase();
    }
    Some(mnemonic)
}

/// The mapping between dialect mnemonics and opcodes.
///
/// The same table serves the resolver and emitter (forward lookup), the
/// interpreter and trace disassembly (reverse lookup), and the
/// self-hosting assembler, whose in-memory lookup table is `table_image`.
#[derive(Debug)]
pub struct Catalogue {
    entries: Vec<Entry>,
    by_mnemonic: HashMap<[u8; 4], Entry>,
    by_opcode: HashMap<u8, Entry>,
}

impl Catalogue {
    fn new() -> Self {
        let mappings: &[(&[u8; 4], u8, Shape)] = &[
            (b"LDA#", 0xA9, Shape::Byte),   // Load A immediate
            (b"LDA ", 0xAD, Shape::Word),   // Load A absolute
            (b"LDAZ", 0xA5, Shape::Byte),   // Load A zero page
            (b"LDAX", 0xBD, Shape::Word),   // Load A absolute,X
            (b"LDAY", 0xB1, Shape::Byte),   // Load A (zero page),Y
            (b"LDYA", 0xB9, Shape::Word),   // Load A absolute,Y
            (b"LDX#", 0xA2, Shape::Byte),   // Load X immediate
            (b"LDX ", 0xAE, Shape::Word),   // Load X absolute
            (b"LDXZ", 0xA6, Shape::Byte),   // Load X zero page
            (b"LDY#", 0xA0, Shape::Byte),   // Load Y immediate
            (b"LDY ", 0xAC, Shape::Word),   // Load Y absolute
            (b"LDYZ", 0xA4, Shape::Byte),   // Load Y zero page
            (b"STA ", 0x8D, Shape::Word),   // Store A absolute
            (b"STAZ", 0x85, Shape::Byte),   // Store A zero page
            (b"STAX", 0x9D, Shape::Word),   // Store A absolute,X
            (b"STIY", 0x91, Shape::Byte),   // Store A (zero page),Y
            (b"STAY", 0x99, Shape::Word),   // Store A absolute,Y
            (b"STX ", 0x8E, Shape::Word),   // Store X absolute
            (b"STXZ", 0x86, Shape::Byte),   // Store X zero page
            (b"STY ", 0x8C, Shape::Word),   // Store Y absolute
            (b"STYZ", 0x84, Shape::Byte),   // Store Y zero page
            (b"ADC#", 0x69, Shape::Byte),   // Add with carry immediate
            (b"ADCZ", 0x65, Shape::Byte),   // Add with carry zero page
            (b"SBC#", 0xE9, Shape::Byte),   // Subtract with carry immediate
            (b"AND#", 0x29, Shape::Byte),   // AND A immediate
            (b"ASL ", 0x0A, Shape::Implied), // Arithmetic shift left A
            (b"ORA ", 0x0D, Shape::Word),   // OR A with absolute
            (b"ORAZ", 0x05, Shape::Byte),   // OR A with zero page
            (b"CMP#", 0xC9, Shape::Byte),   // Compare A immediate
            (b"CMP ", 0xCD, Shape::Word),   // Compare A absolute
            (b"CMPZ", 0xC5, Shape::Byte),   // Compare A zero page
            (b"CPIY", 0xD1, Shape::Byte),   // Compare A (zero page),Y
            (b"CMPY", 0xD9, Shape::Word),   // Compare A absolute,Y
            (b"CPX#", 0xE0, Shape::Byte),   // Compare X immediate
            (b"CPY#", 0xC0, Shape::Byte),   // Compare Y immediate
            (b"INC ", 0xEE, Shape::Word),   // Increment absolute
            (b"INCZ", 0xE6, Shape::Byte),   // Increment zero page
            (b"DEC ", 0xCE, Shape::Word),   // Decrement absolute
            (b"DECZ", 0xC6, Shape::Byte),   // Decrement zero page
            (b"INX ", 0xE8, Shape::Implied), // Increment X
            (b"DEX ", 0xCA, Shape::Implied), // Decrement X
            (b"INY ", 0xC8, Shape::Implied), // Increment Y
            (b"DEY ", 0x88, Shape::Implied), // Decrement Y
            (b"TAX ", 0xAA, Shape::Implied), // Transfer A to X
            (b"TAY ", 0xA8, Shape::Implied), // Transfer A to Y
            (b"TXA ", 0x8A, Shape::Implied), // Transfer X to A
            (b"TYA ", 0x98, Shape::Implied), // Transfer Y to A
            (b"JMP ", 0x4C, Shape::Word),   // Jump absolute
            (b"JSR ", 0x20, Shape::Word),   // Jump to subroutine
            (b"RTS ", 0x60, Shape::Implied), // Return from subroutine
            (b"BEQ ", 0xF0, Shape::Branch), // Branch if equal
            (b"BNE ", 0xD0, Shape::Branch), // Branch if not equal
            (b"BCS ", 0xB0, Shape::Branch), // Branch if carry set
            (b"BCC ", 0x90, Shape::Branch), // Branch if carry clear
            (b"PHA ", 0x48, Shape::Implied), // Push A
            (b"PLA ", 0x68, Shape::Implied), // Pull A
            (b"CLC ", 0x18, Shape::Implied), // Clear carry
            (b"SEC ", 0x38, Shape::Implied), // Set carry
            (b"NOP ", 0xEA, Shape::Implied), // No operation
            (b"BRK ", 0x00, Shape::Implied), // Break
            (b"END ", END_OPCODE, Shape::Implied), // End of source (sentinel)
        ];

        let entries: Vec<Entry> = mappings
            .iter()
            .map(|&(mnemonic, opcode, shape)| Entry {
                mnemonic: *mnemonic,
                opcode,
                shape,
            })
            .collect();

        let mut by_mnemonic = HashMap::new();
        let mut by_opcode = HashMap::new();
        for entry in &entries {
            by_mnemonic.insert(entry.mnemonic, *entry);
            by_opcode.insert(entry.opcode, *entry);
        }

        Catalogue {
            entries,
            by_mnemonic,
            by_opcode,
        }
    }

    /// Find the entry for a padded 4-character mnemonic.
    pub fn find_mnemonic(&self, mnemonic: [u8; 4]) -> Option<Entry> {
        self.by_mnemonic.get(&mnemonic).copied()
    }

    /// Find the entry for an opcode byte.
    pub fn find_opcode(&self, opcode: u8) -> Option<Entry> {
        self.by_opcode.get(&opcode).copied()
    }

    /// All entries in table order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The table as laid out in the emulated machine's memory: one 6-byte
    /// record per entry, terminated by a single zero byte. The scan in the
    /// self-hosting assembler stops on a zero first-mnemonic byte.
    pub fn table_image(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.entries.len() * 6 + 1);
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.mnemonic);
            bytes.push(entry.opcode);
            bytes.push(entry.shape.code());
        }
        bytes.push(0x00);
        bytes
    }
}

lazy_static! {
    pub static ref CATALOGUE: Catalogue = Catalogue::new();
}
