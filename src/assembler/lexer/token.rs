/// TokenType defines the types of tokens found in friendly source code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenType {
    /// `!` relocation-base directive; lexeme holds the four hex digits
    Bang,
    /// `@` origin directive; lexeme holds the four hex digits
    At,
    /// `#` data directive; lexeme holds an even-length hex run
    HexData,
    /// String literal; lexeme holds the enclosed text without the quotes
    Str,
    /// `NAME:` label definition; lexeme holds the name without the colon.
    ///
    /// The colon must be attached to the name, which is what keeps
    /// `LOOP:` distinct from a branch written as `BNE :LOOP`.
    LabelDef,
    /// `:NAME` label reference; lexeme holds the name without the colon
    LabelRef,
    /// Mnemonic or numeric operand.
    ///
    /// Words are not classified further here; the resolver decides from
    /// position whether a word is a mnemonic or a hex literal.
    Word,
    /// Eof marks the end of the source
    Eof,
}

/// Token is a lexical unit of source code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
    /// Type of Token
    pub token: TokenType,
    /// Literal string of token, e.g. `"LDA#"`, `"7E00"`, `"LOOP"`
    pub literal: String,
    /// Line number in the source where the token starts
    pub line_number: usize,
}

impl Token {
    pub fn new(token: TokenType, literal: &str, line_number: usize) -> Self {
        Self {
            token,
            literal: literal.to_owned(),
            line_number,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.token {
            TokenType::Bang => write!(f, "!{}", self.literal),
            TokenType::At => write!(f, "@{}", self.literal),
            TokenType::HexData => write!(f, "#{}", self.literal),
            TokenType::Str => write!(f, "\"{}\"", self.literal),
            TokenType::LabelDef => write!(f, "{}:", self.literal),
            TokenType::LabelRef => write!(f, ":{}", self.literal),
            TokenType::Word => write!(f, "{}", self.literal),
            TokenType::Eof => write!(f, "<eof>"),
        }
    }
}
