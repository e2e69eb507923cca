use thiserror::Error;

use crate::assembler::catalogue::{self, Shape, CATALOGUE};
use crate::assembler::image::Image;
use crate::assembler::resolver::DEFAULT_ORIGIN;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EmitError {
    #[error("Unknown mnemonic '{0}' at source offset {1}")]
    UnknownMnemonic(String, usize),
    #[error("Malformed hex digit '{0}' at source offset {1}")]
    MalformedHex(char, usize),
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Source ended in the middle of a unit")]
    UnexpectedEof,
}

/// The single-pass emitter for the resolved form.
///
/// This is deliberately the same state machine the self-hosting assembler
/// implements: a source cursor, an effective address, an output pointer
/// and a relocation base, with both address pointers advancing in
/// lockstep on every written byte.
#[derive(Debug)]
pub struct Emitter<'a> {
    src: &'a [u8],
    pos: usize,
    effective: u16,
    output: u16,
    base: u16,
    image: Image,
}

impl<'a> Emitter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            effective: DEFAULT_ORIGIN,
            output: DEFAULT_ORIGIN,
            base: 0,
            image: Image::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn put(&mut self, byte: u8) {
        self.image.write(self.output, byte);
        self.output = self.output.wrapping_add(1);
        self.effective = self.effective.wrapping_add(1);
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance();
        }
    }

    fn hex_nibble(&mut self) -> Result<u8, EmitError> {
        let byte = self.peek().ok_or(EmitError::UnexpectedEof)?;
        let nibble = (byte as char)
            .to_digit(16)
            .ok_or(EmitError::MalformedHex(byte as char, self.pos))?;
        self.advance();
        Ok(nibble as u8)
    }

    /// Two hex digits combined high-then-low into a byte.
    fn hex_byte(&mut self) -> Result<u8, EmitError> {
        let high = self.hex_nibble()?;
        let low = self.hex_nibble()?;
        Ok(high << 4 | low)
    }

    /// Four hex digits as a 16-bit value, first pair high, second low.
    fn hex_word(&mut self) -> Result<u16, EmitError> {
        let high = self.hex_byte()?;
        let low = self.hex_byte()?;
        Ok((high as u16) << 8 | low as u16)
    }

    pub fn run(mut self) -> Result<Image, EmitError> {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\n' => self.advance(),
                b'!' => {
                    self.advance();
                    self.base = self.hex_word()?;
                }
                b'@' => {
                    self.advance();
                    let address = self.hex_word()?;
                    self.effective = address;
                    self.output = address.wrapping_add(self.base);
                }
                b'#' => {
                    self.advance();
                    let value = self.hex_byte()?;
                    self.put(value);
                }
                b'"' => {
                    self.advance();
                    loop {
                        match self.peek() {
                            None => return Err(EmitError::UnterminatedString),
                            Some(b'"') => {
                                self.advance();
                                break;
                            }
                            Some(text_byte) => {
                                self.put(text_byte);
                                self.advance();
                            }
                        }
                    }
                }
                _ => {
                    let start = self.pos;
                    let mut mnemonic = [0u8; 4];
                    for slot in &mut mnemonic {
                        *slot = self.peek().ok_or(EmitError::UnexpectedEof)?;
                        self.advance();
                    }
                    let entry = CATALOGUE.find_mnemonic(mnemonic).ok_or_else(|| {
                        EmitError::UnknownMnemonic(
                            String::from_utf8_lossy(&mnemonic).into_owned(),
                            start,
                        )
                    })?;
                    if entry.opcode == catalogue::END_OPCODE {
                        return Ok(self.image);
                    }
                    self.skip_spaces();
                    match entry.shape {
                        Shape::Implied => self.put(entry.opcode),
                        Shape::Byte | Shape::Branch => {
                            let low = self.hex_byte()?;
                            self.put(entry.opcode);
                            self.put(low);
                        }
                        Shape::Word => {
                            let high = self.hex_byte()?;
                            let low = self.hex_byte()?;
                            self.put(entry.opcode);
                            self.put(low);
                            self.put(high);
                        }
                    }
                }
            }
        }
        Ok(self.image)
    }
}

/// Assemble a resolved source stream into an image.
#[tracing::instrument(skip(source))]
pub fn emit(source: &str) -> Result<Image, EmitError> {
    Emitter::new(source).run()
}
