use std::collections::HashMap;
use std::fmt::Write as _;

use thiserror::Error;

use crate::assembler::catalogue::{self, Entry, Shape, CATALOGUE};
use crate::assembler::lexer::{
    token::{Token, TokenType},
    Lexer, LexingError,
};

/// Effective address assumed before the first `@` directive.
pub const DEFAULT_ORIGIN: u16 = 0x8000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Lexing error: {0}")]
    Lex(#[from] LexingError),
    #[error("Unknown mnemonic '{1}' on line {0}")]
    UnknownMnemonic(usize, String),
    #[error("Duplicate label '{1}' on line {0}")]
    DuplicateLabel(usize, String),
    #[error("Unknown label '{1}' on line {0}")]
    UnknownLabel(usize, String),
    #[error("Branch to '{1}' on line {0} out of range ({2} bytes)")]
    BranchOutOfRange(usize, String, i32),
    #[error("Malformed operand '{1}' on line {0}")]
    MalformedOperand(usize, String),
    #[error("Missing operand for '{1}' on line {0}")]
    MissingOperand(usize, String),
    #[error("Label '{1}' cannot be a one-byte operand on line {0}")]
    LabelAsByteOperand(usize, String),
    #[error("Unexpected token '{1}' on line {0}")]
    UnexpectedToken(usize, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    None,
    /// Numeric operand, already range-checked for the shape.
    Value(u16),
    /// `:NAME` reference, resolved in pass two.
    Label(String),
}

/// One logical unit of the source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Unit {
    /// `!HHHH` relocation base
    Base(u16),
    /// `@HHHH` origin
    Origin(u16),
    /// `#..` data bytes
    Data(Vec<u8>),
    /// `"..."` text bytes
    Text(String),
    /// `NAME:` definition
    Label(String, usize),
    /// Mnemonic with its operand
    Instruction {
        entry: Entry,
        operand: Operand,
        line: usize,
    },
}

impl Unit {
    /// Bytes this unit occupies at its effective address.
    fn encoded_len(&self) -> u16 {
        match self {
            Unit::Base(_) | Unit::Origin(_) | Unit::Label(..) => 0,
            Unit::Data(bytes) => bytes.len() as u16,
            Unit::Text(text) => text.len() as u16,
            Unit::Instruction { entry, .. } => entry.shape.encoded_len(),
        }
    }
}

/// Parses the token stream into units.
struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self, ResolveError> {
        let mut lexer = Lexer::new(source);
        let current_token = lexer.next_token()?;
        Ok(Self {
            lexer,
            current_token,
        })
    }

    fn next_token(&mut self) -> Result<(), ResolveError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn parse_hex(literal: &str, line: usize) -> Result<u16, ResolveError> {
        let digits = literal
            .trim_start_matches('$')
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        u16::from_str_radix(digits, 16)
            .map_err(|_| ResolveError::MalformedOperand(line, literal.to_owned()))
    }

    fn parse_operand(&mut self, entry: Entry, line: usize) -> Result<Operand, ResolveError> {
        match self.current_token.token {
            TokenType::LabelRef => {
                let label = self.current_token.literal.clone();
                self.next_token()?;
                Ok(Operand::Label(label))
            }
            TokenType::Word => {
                let literal = self.current_token.literal.clone();
                let value = Self::parse_hex(&literal, line)?;
                let fits = match entry.shape {
                    Shape::Byte | Shape::Branch => value <= 0xFF,
                    _ => true,
                };
                if !fits {
                    return Err(ResolveError::MalformedOperand(line, literal));
                }
                self.next_token()?;
                Ok(Operand::Value(value))
            }
            _ => Err(ResolveError::MissingOperand(
                line,
                entry.mnemonic_str().trim_end().to_owned(),
            )),
        }
    }

    /// Parse the whole stream. Units after the `END ` sentinel are ignored,
    /// as the assemblers never reach them.
    fn parse_units(&mut self) -> Result<Vec<Unit>, ResolveError> {
        let mut units = Vec::new();
        loop {
            let line = self.current_token.line_number;
            match &self.current_token.token {
                TokenType::Eof => break,
                TokenType::Bang => {
                    let value = Self::parse_hex(&self.current_token.literal, line)?;
                    units.push(Unit::Base(value));
                    self.next_token()?;
                }
                TokenType::At => {
                    let value = Self::parse_hex(&self.current_token.literal, line)?;
                    units.push(Unit::Origin(value));
                    self.next_token()?;
                }
                TokenType::HexData => {
                    let digits = self.current_token.literal.clone();
                    let bytes = digits
                        .as_bytes()
                        .chunks(2)
                        .map(|pair| {
                            u8::from_str_radix(std::str::from_utf8(pair).expect("hex is ASCII"), 16)
                                .map_err(|_| ResolveError::MalformedOperand(line, digits.clone()))
                        })
                        .collect::<Result<Vec<u8>, _>>()?;
                    units.push(Unit::Data(bytes));
                    self.next_token()?;
                }
                TokenType::Str => {
                    units.push(Unit::Text(self.current_token.literal.clone()));
                    self.next_token()?;
                }
                TokenType::LabelDef => {
                    let name = self.current_token.literal.clone();
                    units.push(Unit::Label(name, line));
                    self.next_token()?;
                }
                TokenType::Word => {
                    let word = self.current_token.literal.clone();
                    let entry = catalogue::pad_mnemonic(&word)
                        .and_then(|mnemonic| CATALOGUE.find_mnemonic(mnemonic))
                        .ok_or_else(|| ResolveError::UnknownMnemonic(line, word.clone()))?;
                    self.next_token()?;
                    let operand = if entry.shape == Shape::Implied {
                        Operand::None
                    } else {
                        self.parse_operand(entry, line)?
                    };
                    let is_end = entry.opcode == catalogue::END_OPCODE;
                    units.push(Unit::Instruction {
                        entry,
                        operand,
                        line,
                    });
                    if is_end {
                        break;
                    }
                }
                TokenType::LabelRef => {
                    return Err(ResolveError::UnexpectedToken(
                        line,
                        format!(":{}", self.current_token.literal),
                    ));
                }
            }
        }
        Ok(units)
    }
}

/// Pass one: walk the units tracking the effective address each will
/// occupy and record label definitions. Emits nothing.
fn collect_labels(units: &[Unit]) -> Result<HashMap<String, u16>, ResolveError> {
    let mut labels = HashMap::new();
    let mut effective = DEFAULT_ORIGIN;
    for unit in units {
        match unit {
            Unit::Origin(address) => effective = *address,
            Unit::Label(name, line) => {
                if labels.insert(name.clone(), effective).is_some() {
                    return Err(ResolveError::DuplicateLabel(*line, name.clone()));
                }
            }
            _ => effective = effective.wrapping_add(unit.encoded_len()),
        }
    }
    Ok(labels)
}

/// Pass two: print the resolved form. Directives and data pass through
/// (hex runs split into single-byte units), labels are erased, mnemonics
/// come out in their padded 4-character form and label references become
/// numeric operands.
fn print_resolved(units: &[Unit], labels: &HashMap<String, u16>) -> Result<String, ResolveError> {
    let mut out = String::new();
    let mut effective = DEFAULT_ORIGIN;
    for unit in units {
        match unit {
            Unit::Base(value) => {
                writeln!(out, "!{value:04X}").expect("write to string");
            }
            Unit::Origin(address) => {
                writeln!(out, "@{address:04X}").expect("write to string");
                effective = *address;
            }
            Unit::Data(bytes) => {
                for byte in bytes {
                    writeln!(out, "#{byte:02X}").expect("write to string");
                }
                effective = effective.wrapping_add(bytes.len() as u16);
            }
            Unit::Text(text) => {
                writeln!(out, "\"{text}\"").expect("write to string");
                effective = effective.wrapping_add(text.len() as u16);
            }
            Unit::Label(..) => {}
            Unit::Instruction {
                entry,
                operand,
                line,
            } => {
                let mnemonic = entry.mnemonic_str();
                match (entry.shape, operand) {
                    (Shape::Implied, _) => {
                        writeln!(out, "{mnemonic}").expect("write to string");
                    }
                    (Shape::Byte, Operand::Value(value)) => {
                        writeln!(out, "{mnemonic} {value:02X}").expect("write to string");
                    }
                    (Shape::Byte, Operand::Label(name)) => {
                        return Err(ResolveError::LabelAsByteOperand(*line, name.clone()));
                    }
                    (Shape::Word, Operand::Value(value)) => {
                        writeln!(out, "{mnemonic} {value:04X}").expect("write to string");
                    }
                    (Shape::Word, Operand::Label(name)) => {
                        let target = *labels
                            .get(name)
                            .ok_or_else(|| ResolveError::UnknownLabel(*line, name.clone()))?;
                        writeln!(out, "{mnemonic} {target:04X}").expect("write to string");
                    }
                    (Shape::Branch, Operand::Value(value)) => {
                        writeln!(out, "{mnemonic} {value:02X}").expect("write to string");
                    }
                    (Shape::Branch, Operand::Label(name)) => {
                        let target = *labels
                            .get(name)
                            .ok_or_else(|| ResolveError::UnknownLabel(*line, name.clone()))?;
                        // Displacement from the PC already advanced past
                        // the two-byte branch instruction.
                        let displacement = target as i32 - (effective as i32 + 2);
                        if !(-128..=127).contains(&displacement) {
                            return Err(ResolveError::BranchOutOfRange(
                                *line,
                                name.clone(),
                                displacement,
                            ));
                        }
                        writeln!(out, "{mnemonic} {:02X}", displacement as u8)
                            .expect("write to string");
                    }
                    (_, Operand::None) => {
                        return Err(ResolveError::MissingOperand(
                            *line,
                            mnemonic.trim_end().to_owned(),
                        ));
                    }
                }
                effective = effective.wrapping_add(entry.shape.encoded_len());
            }
        }
    }
    Ok(out)
}

/// Resolve friendly source into the punch form: comments and labels
/// eliminated, every operand numeric.
#[tracing::instrument(skip(source))]
pub fn resolve(source: &str) -> Result<String, ResolveError> {
    let units = Parser::new(source)?.parse_units()?;
    let labels = collect_labels(&units)?;
    print_resolved(&units, &labels)
}

/// The label map of a friendly source, as pass one computes it.
#[tracing::instrument(skip(source))]
pub fn label_map(source: &str) -> Result<HashMap<String, u16>, ResolveError> {
    let units = Parser::new(source)?.parse_units()?;
    collect_labels(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_instructions_pass_through_padded() -> Result<(), ResolveError> {
        let resolved = resolve("@0200\nLDA# 2A\nSTAZ 80\nBRK\nEND")?;
        assert_eq!(resolved, "@0200\nLDA# 2A\nSTAZ 80\nBRK \nEND \n");
        Ok(())
    }

    #[test]
    fn test_comments_and_case_are_normalized() -> Result<(), ResolveError> {
        let resolved = resolve("@0200\nlda# $2a ; load\nbrk\nend")?;
        assert_eq!(resolved, "@0200\nLDA# 2A\nBRK \nEND \n");
        Ok(())
    }

    #[test]
    fn test_hex_run_is_split_per_byte() -> Result<(), ResolveError> {
        let resolved = resolve("@0400\n#DEADBEEF\nEND")?;
        assert_eq!(resolved, "@0400\n#DE\n#AD\n#BE\n#EF\nEND \n");
        Ok(())
    }

    #[test]
    fn test_jump_label_becomes_absolute_address() -> Result<(), ResolveError> {
        let resolved = resolve(
            "@0200
START:
LDA# 42
JSR :NEXT
BRK
NEXT:
STAZ 80
JMP :START
END",
        )?;
        // START = 0200, NEXT = 0200 + 2 + 3 + 1 = 0206
        assert_eq!(
            resolved,
            "@0200\nLDA# 42\nJSR  0206\nBRK \nSTAZ 80\nJMP  0200\nEND \n"
        );
        Ok(())
    }

    #[test]
    fn test_backward_branch_displacement() -> Result<(), ResolveError> {
        // The counter loop: branch from 020A back to 0204.
        let resolved = resolve(
            "@0200
LDA# 00
STAZ 80
L:
INCZ 80
LDAZ 80
CMP# 0A
BNE :L
BRK
END",
        )?;
        assert_eq!(
            resolved,
            "@0200\nLDA# 00\nSTAZ 80\nINCZ 80\nLDAZ 80\nCMP# 0A\nBNE  F8\nBRK \nEND \n"
        );
        Ok(())
    }

    #[test]
    fn test_forward_branch_displacement() -> Result<(), ResolveError> {
        let resolved = resolve("@0200\nBNE :SKIP\nBRK\nSKIP:\nEND")?;
        // SKIP = 0203, displacement = 0203 - (0200 + 2) = +1
        assert_eq!(resolved, "@0200\nBNE  01\nBRK \nEND \n");
        Ok(())
    }

    #[test]
    fn test_branch_range_limits() {
        // +127 is the farthest forward displacement: target = eff + 2 + 127.
        let mut ok_source = String::from("@0200\nBNE :FAR\n");
        ok_source.push_str(&"NOP\n".repeat(127));
        ok_source.push_str("FAR:\nEND");
        assert!(resolve(&ok_source).is_ok());

        // One more NOP pushes the target to +128.
        let mut far_source = String::from("@0200\nBNE :FAR\n");
        far_source.push_str(&"NOP\n".repeat(128));
        far_source.push_str("FAR:\nEND");
        assert_eq!(
            resolve(&far_source),
            Err(ResolveError::BranchOutOfRange(2, "FAR".to_string(), 128))
        );

        // -128 backward is fine: label, 126 NOPs, then the branch at
        // eff = 0202 + 126 -> displacement 0202 - (0280 + 2) = -128.
        let mut back_source = String::from("@0202\nNEAR:\n");
        back_source.push_str(&"NOP\n".repeat(126));
        back_source.push_str("BNE :NEAR\nEND");
        assert!(resolve(&back_source).is_ok());

        // One more NOP makes it -129.
        let mut toofar_source = String::from("@0202\nNEAR:\n");
        toofar_source.push_str(&"NOP\n".repeat(127));
        toofar_source.push_str("BNE :NEAR\nEND");
        assert!(matches!(
            resolve(&toofar_source),
            Err(ResolveError::BranchOutOfRange(_, _, -129))
        ));
    }

    #[test]
    fn test_duplicate_label() {
        assert_eq!(
            resolve("@0200\nA:\nNOP\nA:\nEND"),
            Err(ResolveError::DuplicateLabel(4, "A".to_string()))
        );
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(
            resolve("@0200\nJMP :NOWHERE\nEND"),
            Err(ResolveError::UnknownLabel(2, "NOWHERE".to_string()))
        );
    }

    #[test]
    fn test_unknown_mnemonic() {
        assert_eq!(
            resolve("@0200\nXYZZY 00\nEND"),
            Err(ResolveError::UnknownMnemonic(2, "XYZZY".to_string()))
        );
    }

    #[test]
    fn test_byte_operand_range() {
        assert_eq!(
            resolve("@0200\nLDA# 100\nEND"),
            Err(ResolveError::MalformedOperand(2, "100".to_string()))
        );
    }

    #[test]
    fn test_label_map_tracks_origin_changes() -> Result<(), ResolveError> {
        let labels = label_map("@0200\nA:\nNOP\n@1000\nB:\nEND")?;
        assert_eq!(labels.get("A"), Some(&0x0200));
        assert_eq!(labels.get("B"), Some(&0x1000));
        Ok(())
    }

    #[test]
    fn test_default_origin() -> Result<(), ResolveError> {
        let labels = label_map("A:\nEND")?;
        assert_eq!(labels.get("A"), Some(&DEFAULT_ORIGIN));
        Ok(())
    }
}
