use thiserror::Error;

use self::token::{Token, TokenType};

pub mod token;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LexingError {
    #[error("Unexpected character on line {0}: '{1}'")]
    UnexpectedCharacter(usize, char),
    #[error("Directive '{1}' on line {0} requires four hex digits, got '{2}'")]
    MalformedDirective(usize, char, String),
    #[error("Hex data on line {0} must have an even number of digits: '#{1}'")]
    OddHexData(usize, String),
    #[error("Unterminated string literal starting on line {0}")]
    UnterminatedString(usize),
}

/// Lexer tokenizes friendly source code.
#[derive(Debug)]
pub struct Lexer<'a> {
    /// Source code to lex
    src: &'a [u8],
    /// Index of current position in source code (points to current byte)
    position: usize,
    /// Index of current reading position in source code (after current byte)
    read_position: usize,
    /// Current byte under examination
    ch: Option<u8>,
    /// Current line number in source code
    line_number: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut lexer = Self {
            src: src.as_bytes(),
            position: 0,
            read_position: 0,
            ch: None,
            line_number: 1,
        };
        lexer.read_char();
        lexer
    }

    #[inline(always)]
    fn read_char(&mut self) {
        if self.read_position >= self.src.len() {
            self.ch = None;
        } else {
            self.ch = Some(self.src[self.read_position]);
        }
        self.position = self.read_position;
        self.read_position += 1;
    }

    #[inline(always)]
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.ch {
            if !ch.is_ascii_whitespace() {
                break;
            }
            if ch == b'\n' {
                self.line_number += 1;
            }
            self.read_char();
        }
    }

    #[inline(always)]
    fn skip_comment(&mut self) {
        while self.ch.is_some() && self.ch != Some(b'\n') {
            self.read_char();
        }
    }

    fn read_while_condition(&mut self, condition: fn(u8) -> bool) -> String {
        let position = self.position;
        while let Some(ch) = self.ch {
            if !condition(ch) {
                break;
            }
            self.read_char();
        }
        String::from_utf8_lossy(&self.src[position..self.position]).into_owned()
    }

    fn read_word(&mut self) -> String {
        self.read_while_condition(|ch| {
            ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'#' || ch == b'$'
        })
    }

    fn read_label_name(&mut self) -> String {
        self.read_while_condition(|ch| ch.is_ascii_alphanumeric() || ch == b'_')
    }

    fn read_hex(&mut self) -> String {
        self.read_while_condition(|ch| ch.is_ascii_hexdigit())
    }

    /// Read the four hex digits of a `!` or `@` directive.
    fn read_directive(&mut self, directive: char) -> Result<String, LexingError> {
        self.read_char();
        let hex = self.read_hex();
        if hex.len() != 4 {
            return Err(LexingError::MalformedDirective(
                self.line_number,
                directive,
                hex,
            ));
        }
        Ok(hex)
    }

    fn read_string(&mut self) -> Result<String, LexingError> {
        let start_line = self.line_number;
        self.read_char();
        let position = self.position;
        loop {
            match self.ch {
                None => return Err(LexingError::UnterminatedString(start_line)),
                Some(b'"') => break,
                Some(b'\n') => {
                    self.line_number += 1;
                    self.read_char();
                }
                Some(_) => self.read_char(),
            }
        }
        let literal = String::from_utf8_lossy(&self.src[position..self.position]).into_owned();
        self.read_char();
        Ok(literal)
    }

    fn create_token(&mut self, token: TokenType, literal: &str) -> Token {
        Token::new(token, literal, self.line_number)
    }

    pub fn next_token(&mut self) -> Result<Token, LexingError> {
        self.skip_whitespace();
        let token = match self.ch {
            Some(ch) => match ch {
                b';' => {
                    self.skip_comment();
                    self.next_token()?
                }
                b'!' => {
                    let hex = self.read_directive('!')?;
                    self.create_token(TokenType::Bang, &hex)
                }
                b'@' => {
                    let hex = self.read_directive('@')?;
                    self.create_token(TokenType::At, &hex)
                }
                b'#' => {
                    self.read_char();
                    let hex = self.read_hex();
                    if hex.is_empty() || hex.len() % 2 != 0 {
                        return Err(LexingError::OddHexData(self.line_number, hex));
                    }
                    self.create_token(TokenType::HexData, &hex)
                }
                b'"' => {
                    let literal = self.read_string()?;
                    self.create_token(TokenType::Str, &literal)
                }
                b':' => {
                    self.read_char();
                    let name = self.read_label_name();
                    if name.is_empty() {
                        return Err(LexingError::UnexpectedCharacter(self.line_number, ':'));
                    }
                    self.create_token(TokenType::LabelRef, &name)
                }
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'$' => {
                    let word = self.read_word();
                    // A colon attached to the word makes it a label
                    // definition; `BNE :LOOP` keeps its space.
                    if self.ch == Some(b':') {
                        self.read_char();
                        self.create_token(TokenType::LabelDef, &word)
                    } else {
                        self.create_token(TokenType::Word, &word)
                    }
                }
                _ => {
                    return Err(LexingError::UnexpectedCharacter(self.line_number, ch as char));
                }
            },
            None => self.create_token(TokenType::Eof, ""),
        };
        Ok(token)
    }
}
