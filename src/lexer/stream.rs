use miette::SourceSpan;

use crate::error::Error;
use crate::lexer::{Token, TokenKind};
use crate::symbol::Register;

/// Cursor over the tokens of one line, consumed by the dispatcher and the addressing resolver.
pub struct TokenStream<'t, 'a> {
    toks: &'t [Token<'a>],
    cur: usize,
    /// Length of the tokenized line, used to point at the end of it
    line_len: usize,
}

impl<'t, 'a> TokenStream<'t, 'a> {
    pub fn new(toks: &'t [Token<'a>], line_len: usize) -> Self {
        TokenStream {
            toks,
            cur: 0,
            line_len,
        }
    }

    pub fn peek(&self) -> Option<&Token<'a>> {
        self.toks.get(self.cur)
    }

    /// Kind of the next token, [`TokenKind::End`] once the line is exhausted
    pub fn peek_kind(&self) -> TokenKind {
        self.peek().map_or(TokenKind::End, |tok| tok.kind)
    }

    pub fn advance(&mut self) -> Option<Token<'a>> {
        let tok = self.toks.get(self.cur).copied();
        if tok.is_some() {
            self.cur += 1;
        }
        tok
    }

    pub fn expect(&mut self, expected: TokenKind) -> Result<Token<'a>, Error> {
        self.expect_where(|kind| kind == expected, expected.name())
    }

    pub fn expect_where(
        &mut self,
        check: impl Fn(TokenKind) -> bool,
        expected: &'static str,
    ) -> Result<Token<'a>, Error> {
        match self.peek().copied() {
            Some(tok) if check(tok.kind) => {
                self.cur += 1;
                Ok(tok)
            }
            found => {
                // Consumed either way so the error points past the offending token
                self.advance();
                Err(self.unexpected(expected, found))
            }
        }
    }

    /// Expect a register operand that is valid for general purpose use.
    pub fn expect_reg(&mut self) -> Result<Register, Error> {
        let tok = self.expect(TokenKind::Register)?;
        let reg: Register = tok.text.parse().map_err(|_| self.unexpected("REGISTER", Some(tok)))?;
        reg.general().map_err(|err| err.with_span(tok.span()))
    }

    pub fn expect_number(&mut self) -> Result<i32, Error> {
        let tok = self.expect(TokenKind::Number)?;
        tok.text.parse().map_err(|_| Error::BadLiteral {
            text: tok.text.to_string(),
            span: tok.span(),
        })
    }

    pub fn expect_comma(&mut self) -> Result<(), Error> {
        self.expect(TokenKind::Comma).map(|_| ())
    }

    /// Every token on the line must have been consumed.
    pub fn finish(&self) -> Result<(), Error> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(Error::TrailingTokens { span: tok.span() }),
        }
    }

    pub fn unexpected(&self, expected: &'static str, found: Option<Token<'a>>) -> Error {
        let (found, span) = match found {
            Some(tok) => (tok.kind, tok.span()),
            None => (TokenKind::End, self.end_span()),
        };
        Error::Unexpected {
            expected,
            found,
            span,
        }
    }

    fn end_span(&self) -> SourceSpan {
        SourceSpan::new(self.line_len.into(), 0)
    }
}
