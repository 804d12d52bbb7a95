//! A line-oriented assembly virtual machine.
//!
//! Programs are plain text lines, loaded one per memory cell and re-tokenized every time they
//! are executed, so a program may overwrite its own instructions with data.

// Loading
mod lexer;
pub use lexer::{tokenize, Token, TokenKind};
mod preprocess;
pub use preprocess::{preprocess, Preprocessed};

// Running
mod dispatch;
mod resolve;
mod runtime;
pub use runtime::{check, Fault, Machine};
mod state;
pub use state::{Cells, MachineState};
mod symbol;
pub use symbol::{Addr, LabelEntry, LabelTable, Region, Register};

mod error;
pub use error::Error;

pub mod env;
pub mod output;

/// Registers including the program counter at index 0
pub const REGISTER_COUNT: usize = 10;
/// Cells of program memory
pub const MEMORY_SIZE: usize = 64;
/// Cells of data storage
pub const STORAGE_SIZE: usize = 64;
pub const MAX_LABELS: usize = 16;
/// Taken branches before a run is considered an infinite loop
pub const MAX_JUMPS: u32 = 1000;
/// Bytes per cell; every address must be a multiple of this
pub const WORD_SIZE: usize = 4;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 1;
