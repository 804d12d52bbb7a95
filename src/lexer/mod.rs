use std::fmt;

use miette::SourceSpan;

use crate::error::Error;
use crate::lexer::cursor::Cursor;

pub mod cursor;
mod stream;

pub use stream::TokenStream;

/// A single token of one program line.
///
/// The text is a view into the line that was tokenized, so a token cannot outlive the step
/// that owns the line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Slice of the original line covered by this token
    pub text: &'a str,
    /// Byte offset of the token inside the line
    pub offs: usize,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str, offs: usize) -> Self {
        Token { kind, text, offs }
    }

    pub fn span(&self) -> SourceSpan {
        SourceSpan::new(self.offs.into(), self.text.len())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    // Memory access
    Load,
    Store,
    Read,
    Write,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Inc,
    Halt,
    // Branches
    Br,
    Blt,
    Bgt,
    Bleq,
    Bgeq,
    Beq,
    Bneq,
    // Punctuation
    Equal,
    LBracket,
    RBracket,
    At,
    Dollar,
    Comma,
    // Operands
    Register,
    Number,
    LabelRef,
    /// Never produced by [`tokenize`], reported when a line runs out of tokens.
    End,
}

impl TokenKind {
    /// Match an identifier against the mnemonic table.
    ///
    /// The leading character must match exactly, the remainder is compared without regard to
    /// case. Anything that is not a mnemonic is a label reference.
    pub fn from_ident(ident: &str) -> TokenKind {
        let mut chars = ident.chars();
        let Some(first) = chars.next() else {
            return TokenKind::LabelRef;
        };
        let rest = chars.as_str().to_ascii_uppercase();
        match (first, rest.as_str()) {
            ('L', "OAD") => TokenKind::Load,
            ('S', "TORE") => TokenKind::Store,
            ('R', "EAD") => TokenKind::Read,
            ('W', "RITE") => TokenKind::Write,
            ('A', "DD") => TokenKind::Add,
            ('S', "UB") => TokenKind::Sub,
            ('M', "UL") => TokenKind::Mul,
            ('D', "IV") => TokenKind::Div,
            ('I', "NC") => TokenKind::Inc,
            ('H', "ALT") => TokenKind::Halt,
            ('B', "R") => TokenKind::Br,
            ('B', "LT") => TokenKind::Blt,
            ('B', "GT") => TokenKind::Bgt,
            ('B', "LEQ") => TokenKind::Bleq,
            ('B', "GEQ") => TokenKind::Bgeq,
            ('B', "EQ") => TokenKind::Beq,
            ('B', "NEQ") => TokenKind::Bneq,
            _ => TokenKind::LabelRef,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Load => "LOAD",
            TokenKind::Store => "STORE",
            TokenKind::Read => "READ",
            TokenKind::Write => "WRITE",
            TokenKind::Add => "ADD",
            TokenKind::Sub => "SUB",
            TokenKind::Mul => "MUL",
            TokenKind::Div => "DIV",
            TokenKind::Inc => "INC",
            TokenKind::Halt => "HALT",
            TokenKind::Br => "BR",
            TokenKind::Blt => "BLT",
            TokenKind::Bgt => "BGT",
            TokenKind::Bleq => "BLEQ",
            TokenKind::Bgeq => "BGEQ",
            TokenKind::Beq => "BEQ",
            TokenKind::Bneq => "BNEQ",
            TokenKind::Equal => "EQUAL",
            TokenKind::LBracket => "L_BRACKET",
            TokenKind::RBracket => "R_BRACKET",
            TokenKind::At => "AT",
            TokenKind::Dollar => "DOLLAR",
            TokenKind::Comma => "COMMA",
            TokenKind::Register => "REGISTER",
            TokenKind::Number => "NUMBER",
            TokenKind::LabelRef => "LABEL_REF",
            TokenKind::End => "END",
        }
    }

    pub fn is_opcode(self) -> bool {
        matches!(
            self,
            TokenKind::Load
                | TokenKind::Store
                | TokenKind::Read
                | TokenKind::Write
                | TokenKind::Add
                | TokenKind::Sub
                | TokenKind::Mul
                | TokenKind::Div
                | TokenKind::Inc
                | TokenKind::Halt
                | TokenKind::Br
                | TokenKind::Blt
                | TokenKind::Bgt
                | TokenKind::Bleq
                | TokenKind::Bgeq
                | TokenKind::Beq
                | TokenKind::Bneq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tokenize a single program line.
///
/// Scanning stops at the end of the line or at a `;`, which starts a comment.
pub fn tokenize(line: &str) -> Result<Vec<Token<'_>>, Error> {
    let mut cursor = Cursor::new(line);
    let mut toks = Vec::new();
    while let Some(tok) = cursor.advance_token()? {
        toks.push(tok);
    }
    Ok(toks)
}

pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Test if a character may continue an identifier.
pub(crate) fn is_id(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

/// Registers are exactly `R` followed by a single digit.
fn is_register(ident: &str) -> bool {
    let bytes = ident.as_bytes();
    bytes.len() == 2 && bytes[0] == b'R' && bytes[1].is_ascii_digit()
}

impl<'a> Cursor<'a> {
    /// Scan the next token, or `None` once the line (or a comment) is reached.
    pub fn advance_token(&mut self) -> Result<Option<Token<'a>>, Error> {
        self.take_while(is_whitespace);
        self.reset_pos();
        let first_char = match self.bump() {
            Some(';') | None => return Ok(None),
            Some(c) => c,
        };
        let kind = match first_char {
            '=' => TokenKind::Equal,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '@' => TokenKind::At,
            '$' => TokenKind::Dollar,
            ',' => TokenKind::Comma,
            c if c.is_ascii_digit() => {
                self.take_while(|c| c.is_ascii_digit());
                let text = self.token_text();
                if text.parse::<i32>().is_err() {
                    return Err(Error::BadLiteral {
                        text: text.to_string(),
                        span: self.token_span(),
                    });
                }
                TokenKind::Number
            }
            c if c.is_ascii_alphabetic() => {
                self.take_while(is_id);
                let text = self.token_text();
                if is_register(text) {
                    TokenKind::Register
                } else {
                    TokenKind::from_ident(text)
                }
            }
            ch => {
                return Err(Error::UnknownChar {
                    ch,
                    span: self.token_span(),
                })
            }
        };
        let tok = Token::new(kind, self.token_text(), self.token_start());
        self.reset_pos();
        Ok(Some(tok))
    }

    fn token_span(&self) -> SourceSpan {
        SourceSpan::new(self.token_start().into(), self.pos_in_token())
    }
}
