use std::cell::Cell;

use colored::Colorize;

use crate::lexer::Token;
use crate::state::MachineState;
use crate::symbol::Region;
use crate::WORD_SIZE;

/// Print a line to the trace output, if tracing is enabled.
#[macro_export]
macro_rules! tprintln {
    ( $($arg:tt)* ) => {{
        if $crate::output::Output::is_trace() {
            let mut s = format!($($arg)*);
            s.push('\n');
            $crate::output::Output::Trace.print_str(&s);
        }
    }};
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    /// Program results, to stdout
    Normal,
    /// Per-step execution trace, to stderr
    Trace,
}

thread_local! {
    static IS_MINIMAL: Cell<bool> = const { Cell::new(false) };
    static IS_TRACE: Cell<bool> = const { Cell::new(false) };
}

impl Output {
    /// Plain output without colors or boxes, suited for blackbox tests.
    pub fn set_minimal(new_value: bool) -> bool {
        if new_value {
            colored::control::set_override(false);
        }
        IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        IS_MINIMAL.with(Cell::get)
    }
    pub fn set_trace(new_value: bool) -> bool {
        IS_TRACE.with(|value| value.replace(new_value))
    }
    pub fn is_trace() -> bool {
        IS_TRACE.with(Cell::get)
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => print!("{}", string),
            Self::Trace => {
                if Self::is_minimal() {
                    eprint!("{}", string);
                } else {
                    eprint!("{}", string.blue());
                }
            }
        }
    }

    /// Trace header for one step: instruction address and line text.
    pub fn print_step(&self, pc: usize, line: &str) {
        self.print_str(&format!("0x{:02x}: {line}\n", pc * WORD_SIZE));
    }

    /// Tokens the current line was split into.
    pub fn print_tokens(&self, toks: &[Token<'_>]) {
        self.print_str(&format!("      [{}]\n", format_tokens(toks)));
    }

    pub fn print_registers(&self, state: &MachineState) {
        let regs = state.registers();
        if Self::is_minimal() {
            self.print_str(&format!("PC {}\n", regs[0]));
            for (i, val) in regs.iter().enumerate().skip(1) {
                self.print_str(&format!("R{i} {val}\n"));
            }
            return;
        }

        self.print_str("\x1b[2m┌──────────────────────────┐\x1b[0m\n");
        self.print_str(&format!(
            "\x1b[2m│\x1b[0m \x1b[1mPC\x1b[0m  {:>20} \x1b[2m│\x1b[0m\n",
            regs[0]
        ));
        for (i, val) in regs.iter().enumerate().skip(1) {
            self.print_str(&format!(
                "\x1b[2m│\x1b[0m \x1b[1mR{i}\x1b[0m  {val:>20} \x1b[2m│\x1b[0m\n"
            ));
        }
        self.print_str("\x1b[2m└──────────────────────────┘\x1b[0m\n");
    }

    /// Print every cell of a region that holds something.
    pub fn print_cells(&self, state: &MachineState, region: Region) {
        let cells = state.cells(region);
        if cells.iter().all(Option::is_none) {
            return;
        }
        if !Self::is_minimal() {
            let title = match region {
                Region::Memory => "Memory",
                Region::Storage => "Storage",
            };
            self.print_str(&format!("{}\n", title.bold()));
        }
        for (i, cell) in cells.iter().enumerate() {
            if let Some(text) = cell {
                self.print_str(&format!("{region} 0x{:02x}: {text}\n", i * WORD_SIZE));
            }
        }
    }
}

fn format_tokens(toks: &[Token<'_>]) -> String {
    toks.iter()
        .map(|tok| format!("{}({})", tok.kind, tok.text))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn token_dump() {
        let toks = tokenize("LOAD R1, =8").unwrap();
        assert_eq!(
            format_tokens(&toks),
            "LOAD(LOAD) REGISTER(R1) COMMA(,) EQUAL(=) NUMBER(8)"
        );
        assert_eq!(format_tokens(&[]), "");
    }

    #[test]
    fn switches_are_independent() {
        let old_trace = Output::set_trace(true);
        assert!(Output::is_trace());
        assert!(!Output::is_minimal());
        Output::set_trace(old_trace);
        assert_eq!(Output::is_trace(), old_trace);
    }
}
