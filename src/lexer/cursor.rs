// Heavily inspired by the lexer cursor in `rustc_lexer` and adapted to single program lines.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

pub(crate) const EOF_CHAR: char = '\0';

/// Peekable iterator over the characters of one line.
///
/// Tracks the byte offset where the token currently being scanned started, so that finished
/// tokens can be handed out as slices of the original line.
#[derive(Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    chars: Chars<'a>,
    /// Byte offset of the start of the current token
    start: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Cursor<'a> {
        Cursor {
            src,
            chars: src.chars(),
            start: 0,
        }
    }

    /// Peek the next character without consuming it. Returns [`EOF_CHAR`] at the end.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// Line is finished scanning
    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Consume and return the next character
    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Consume characters while the predicate holds
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while !self.is_eof() && predicate(self.first()) {
            self.bump();
        }
    }

    /// Byte offset of the cursor inside the line
    pub fn pos(&self) -> usize {
        self.src.len() - self.chars.as_str().len()
    }

    /// Byte offset where the current token started
    pub fn token_start(&self) -> usize {
        self.start
    }

    /// Length in bytes of the current token so far
    pub fn pos_in_token(&self) -> usize {
        self.pos() - self.start
    }

    /// Text of the current token, borrowed from the line
    pub fn token_text(&self) -> &'a str {
        &self.src[self.start..self.pos()]
    }

    /// Text that has not been consumed yet
    pub fn rest(&self) -> &'a str {
        self.chars.as_str()
    }

    /// Start a new token at the current position
    pub fn reset_pos(&mut self) {
        self.start = self.pos();
    }
}
