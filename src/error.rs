use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::lexer::TokenKind;
use crate::symbol::Region;

/// Every way loading or executing a program can fail.
///
/// Spans, where present, point into the single line that was being tokenized or executed.
#[derive(Clone, PartialEq, Eq, Debug, Error, Diagnostic)]
pub enum Error {
    // Lexer errors
    #[error("Encountered an unknown character `{ch}`")]
    #[diagnostic(
        code(lex::unknown),
        help("only registers, numbers, labels, mnemonics and `= [ ] @ $ ,` are allowed")
    )]
    UnknownChar {
        ch: char,
        #[label("unknown character")]
        span: SourceSpan,
    },

    #[error("Encountered an invalid numeric literal `{text}`")]
    #[diagnostic(
        code(lex::bad_lit),
        help("literals range from 0 to 2,147,483,647")
    )]
    BadLiteral {
        text: String,
        #[label("incorrect literal")]
        span: SourceSpan,
    },

    // Syntax errors
    #[error("Expected {expected} but found {found}")]
    #[diagnostic(
        code(parse::unexpected_token),
        help("check the operands allowed for this instruction")
    )]
    Unexpected {
        expected: &'static str,
        found: TokenKind,
        #[label("unexpected token")]
        span: SourceSpan,
    },

    #[error("Too many tokens on this line")]
    #[diagnostic(
        code(parse::trailing_tokens),
        help("each line holds at most one instruction")
    )]
    TrailingTokens {
        #[label("unexpected token")]
        span: SourceSpan,
    },

    // Execution errors
    #[error("Expected {region} address to be a multiple of 4, found {addr}")]
    #[diagnostic(code(exec::misaligned))]
    Misaligned { addr: i64, region: Region },

    #[error("Address {addr} is out of range for {region}, expected below {bound}")]
    #[diagnostic(code(exec::out_of_range))]
    OutOfRange {
        addr: i64,
        bound: usize,
        region: Region,
    },

    #[error("Register index {index} is out of range, expected R1 to R9")]
    #[diagnostic(
        code(exec::register),
        help("R0 holds the program counter and cannot be used as an operand")
    )]
    RegisterRange {
        index: usize,
        #[label("invalid register")]
        span: Option<SourceSpan>,
    },

    #[error("Garbage contained at {region} address {addr}")]
    #[diagnostic(
        code(exec::garbage),
        help("only cells holding a decimal integer can be read as data")
    )]
    Garbage { addr: usize, region: Region },

    #[error("Expected instruction but found garbage at address {addr}")]
    #[diagnostic(
        code(exec::garbage_instruction),
        help("execution ran past the end of the program, you may be missing a HALT")
    )]
    GarbageInstruction { addr: usize },

    #[error("Label `{name}` is not defined")]
    #[diagnostic(code(exec::unresolved_label))]
    UnresolvedLabel {
        name: String,
        #[label("unknown label")]
        span: SourceSpan,
    },

    #[error("Attempted to divide by zero")]
    #[diagnostic(code(exec::division_by_zero))]
    DivisionByZero,

    #[error("Infinite loop detected after {jumps} jumps ({breakdown})")]
    #[diagnostic(
        code(exec::runaway_loop),
        help("make sure every loop has a reachable exit condition")
    )]
    RunawayLoop { jumps: u32, breakdown: String },

    // Load errors
    #[error("Too many labels, at most {limit} are allowed")]
    #[diagnostic(code(preproc::too_many_labels))]
    TooManyLabels { limit: usize },

    #[error("Duplicate label `{name}` on line {line}")]
    #[diagnostic(
        code(preproc::duplicate_label),
        help("labels may only be defined once per program")
    )]
    DuplicateLabel { name: String, line: usize },

    #[error("Program has {lines} lines but memory only holds {capacity}")]
    #[diagnostic(code(load::too_long))]
    ProgramTooLong { lines: usize, capacity: usize },
}

impl Error {
    /// Attach the location of the offending token, where the variant supports one.
    pub fn with_span(self, at: SourceSpan) -> Self {
        match self {
            Error::RegisterRange { index, span: None } => Error::RegisterRange {
                index,
                span: Some(at),
            },
            other => other,
        }
    }
}
