use miette::Report;

use crate::dispatch::execute;
use crate::error::Error;
use crate::lexer::tokenize;
use crate::output::Output;
use crate::preprocess::preprocess;
use crate::state::MachineState;
use crate::symbol::{Addr, Region};
use crate::{tprintln, MAX_JUMPS, MEMORY_SIZE, WORD_SIZE};

/// Where and why execution stopped.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Fault {
    /// Byte address of the failing line
    pub addr: usize,
    /// Text of the failing line, if there was one
    pub line: Option<String>,
    pub error: Error,
}

impl Fault {
    /// Render the error against the failing line.
    pub fn report(&self) -> Report {
        let report = Report::new(self.error.clone());
        match &self.line {
            Some(line) => report.with_source_code(line.clone()),
            None => report,
        }
    }
}

/// The execution engine: owns the machine state and drives it line by line.
#[derive(Clone, Default, Debug)]
pub struct Machine {
    state: MachineState,
    /// Line index and text of the most recently fetched instruction, as it was fetched
    current: Option<(usize, Option<String>)>,
}

impl Machine {
    pub fn new() -> Self {
        Machine {
            state: MachineState::new(),
            current: None,
        }
    }

    /// Read-only view of registers, memory, storage and flags.
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Reset everything and load `program` into memory, one line per cell from address 0.
    ///
    /// A failed load leaves its error behind as the sticky error.
    pub fn load<S: AsRef<str>>(&mut self, program: &[S]) -> Result<(), Error> {
        self.state = MachineState::new();
        self.current = None;
        match Self::prepare(&mut self.state, program) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.state.raise(err).clone()),
        }
    }

    fn prepare<S: AsRef<str>>(state: &mut MachineState, program: &[S]) -> Result<(), Error> {
        if program.len() > MEMORY_SIZE {
            return Err(Error::ProgramTooLong {
                lines: program.len(),
                capacity: MEMORY_SIZE,
            });
        }
        let pre = preprocess(program)?;
        for (idx, line) in pre.lines.iter().enumerate() {
            let addr = Addr::new((idx * WORD_SIZE) as i64, Region::Memory)?;
            state.write_cell(Region::Memory, addr, Some(line.to_string()));
        }
        state.set_labels(pre.labels);
        Ok(())
    }

    /// Pre-set a memory cell, e.g. with data the program expects to find.
    pub fn set_memory(&mut self, addr: i64, text: impl Into<String>) -> Result<(), Error> {
        let addr = Addr::new(addr, Region::Memory)?;
        self.state.write_cell(Region::Memory, addr, Some(text.into()));
        Ok(())
    }

    /// Pre-set a storage cell.
    pub fn set_storage(&mut self, addr: i64, text: impl Into<String>) -> Result<(), Error> {
        let addr = Addr::new(addr, Region::Storage)?;
        self.state.write_cell(Region::Storage, addr, Some(text.into()));
        Ok(())
    }

    pub fn set_register(&mut self, index: usize, value: i32) -> Result<(), Error> {
        self.state.set_register(index, value)
    }

    /// Execute the line at the program counter. Returns whether execution may continue.
    pub fn step(&mut self) -> bool {
        if !self.state.can_continue() {
            return false;
        }
        if let Err(err) = self.execute_next() {
            self.state.raise(err);
        }
        self.state.can_continue()
    }

    fn execute_next(&mut self) -> Result<(), Error> {
        let pc = self.state.pc();
        self.state.set_pc(pc + 1);
        // Owned copy; a STORE may overwrite the cell it came from
        let fetched = self.state.line(pc).map(str::to_owned);
        let (_, fetched) = self.current.insert((pc, fetched));
        let line = fetched.as_deref().ok_or(Error::GarbageInstruction {
            addr: pc * WORD_SIZE,
        })?;
        if Output::is_trace() {
            Output::Trace.print_step(pc, line);
        }
        let toks = tokenize(line)?;
        if Output::is_trace() {
            Output::Trace.print_tokens(&toks);
        }
        execute(&mut self.state, &toks, line.len())
    }

    /// Step until the program halts, fails, or exceeds the jump ceiling.
    ///
    /// Returns `true` if the program halted without error.
    pub fn run(&mut self) -> bool {
        while self.step() {
            if self.state.jumps() >= MAX_JUMPS {
                let err = Error::RunawayLoop {
                    jumps: self.state.jumps(),
                    breakdown: self.state.labels().breakdown(),
                };
                self.state.raise(err);
                break;
            }
        }
        tprintln!(
            "stopped at line {} after {} jumps",
            self.state.pc(),
            self.state.jumps()
        );
        self.state.error().is_none()
    }

    pub fn is_halted(&self) -> bool {
        self.state.is_halted()
    }

    pub fn error(&self) -> Option<&Error> {
        self.state.error()
    }

    /// Location and cause of the sticky error, if any.
    pub fn fault(&self) -> Option<Fault> {
        let error = self.state.error()?.clone();
        let fault = match &self.current {
            Some((idx, line)) => Fault {
                addr: idx * WORD_SIZE,
                line: line.clone(),
                error,
            },
            None => Fault {
                addr: 0,
                line: None,
                error,
            },
        };
        Some(fault)
    }

    pub fn report(&self) -> Option<Report> {
        self.fault().map(|fault| fault.report())
    }
}

/// Check a program without running it: labels, length, and tokens of every line.
///
/// Returns the number of lines on success.
pub fn check<S: AsRef<str>>(program: &[S]) -> Result<usize, Fault> {
    let mut state = MachineState::new();
    Machine::prepare(&mut state, program).map_err(|error| Fault {
        addr: 0,
        line: None,
        error,
    })?;
    for idx in 0..program.len() {
        let line = state.line(idx).unwrap_or_default();
        tokenize(line).map_err(|error| Fault {
            addr: idx * WORD_SIZE,
            line: Some(line.to_string()),
            error,
        })?;
    }
    Ok(program.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(program: &[&str]) -> Machine {
        let mut machine = Machine::new();
        machine.load(program).unwrap();
        machine
    }

    #[test]
    fn load_copies_lines() {
        let machine = loaded(&["start: LOAD R1, =1", "", "HALT"]);
        let mem = machine.state().memory();
        assert_eq!(mem[0].as_deref(), Some("LOAD R1, =1"));
        assert_eq!(mem[1].as_deref(), Some(""));
        assert_eq!(mem[2].as_deref(), Some("HALT"));
        assert_eq!(mem[3], None);
        assert_eq!(machine.state().labels().line_of("start"), Some(0));
    }

    #[test]
    fn load_resets_everything() {
        let mut machine = loaded(&["a: LOAD R1, =5", "WRITE R1, [0, R1]"]);
        machine.run();
        assert!(machine.error().is_some());
        machine.load(&["HALT"]).unwrap();
        let state = machine.state();
        assert_eq!(state.registers(), MachineState::new().registers());
        assert!(state.storage().iter().all(Option::is_none));
        assert!(state.labels().is_empty());
        assert!(state.error().is_none());
        assert!(!state.is_halted());
        assert_eq!(state.jumps(), 0);
    }

    #[test]
    fn load_rejects_long_program() {
        let program = vec!["HALT"; MEMORY_SIZE + 1];
        let mut machine = Machine::new();
        assert_eq!(
            machine.load(&program),
            Err(Error::ProgramTooLong {
                lines: MEMORY_SIZE + 1,
                capacity: MEMORY_SIZE
            })
        );
        assert!(machine.error().is_some());
        assert_eq!(machine.fault().unwrap().line, None);
        assert!(!machine.step());
        assert!(machine.load(&program[..MEMORY_SIZE]).is_ok());
    }

    #[test]
    fn step_advances_pc() {
        let mut machine = loaded(&["LOAD R1, =3", "INC R1", "HALT"]);
        assert!(machine.step());
        assert_eq!(machine.state().pc(), 1);
        assert!(machine.step());
        assert_eq!(machine.state().register(1), Ok(4));
        assert!(!machine.step());
        assert!(machine.is_halted());
        assert_eq!(machine.state().pc(), 3);
        // Halted machines stay put
        assert!(!machine.step());
        assert_eq!(machine.state().pc(), 3);
    }

    #[test]
    fn running_off_the_end() {
        let mut machine = loaded(&["INC R1"]);
        assert!(!machine.run());
        assert_eq!(
            machine.error(),
            Some(&Error::GarbageInstruction { addr: 4 })
        );
    }

    #[test]
    fn error_stops_execution() {
        let mut machine = loaded(&["LOAD R1, =1", "LOAD R2, @R1", "LOAD R3, =9", "HALT"]);
        assert!(!machine.run());
        assert!(matches!(
            machine.error(),
            Some(Error::Misaligned { addr: 1, .. })
        ));
        assert_eq!(machine.state().register(3), Ok(0));
        let fault = machine.fault().unwrap();
        assert_eq!(fault.addr, 4);
        assert_eq!(fault.line.as_deref(), Some("LOAD R2, @R1"));
    }

    #[test]
    fn errored_machine_does_not_resume() {
        let mut machine = loaded(&["LOAD R1, =1 =2", "HALT"]);
        assert!(!machine.step());
        let first = machine.error().cloned();
        assert!(!machine.step());
        assert!(!machine.run());
        assert_eq!(machine.error().cloned(), first);
        assert_eq!(machine.state().pc(), 1);
    }

    #[test]
    fn runaway_loop() {
        let mut machine = loaded(&["top: INC R1", "BR top"]);
        assert!(!machine.run());
        match machine.error() {
            Some(Error::RunawayLoop { jumps, breakdown }) => {
                assert_eq!(*jumps, MAX_JUMPS);
                assert_eq!(breakdown, "top: 1000");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(machine.state().register(1), Ok(MAX_JUMPS as i32));
        let fault = machine.fault().unwrap();
        assert_eq!(fault.addr, 4);
        assert_eq!(fault.line.as_deref(), Some("BR top"));
    }

    #[test]
    fn bounded_loop_finishes() {
        let mut machine = loaded(&[
            "        LOAD R1, =0",
            "        LOAD R2, =10",
            "loop:   BGEQ R1, R2, done",
            "        ADD R3, R1",
            "        INC R1",
            "        BR loop",
            "done:   HALT",
        ]);
        assert!(machine.run());
        assert_eq!(machine.state().register(3), Ok(45));
        assert_eq!(machine.state().jumps(), 11);
        assert_eq!(machine.state().labels().get("loop").unwrap().jumps, 10);
        assert_eq!(machine.state().labels().get("done").unwrap().jumps, 1);
    }

    #[test]
    fn instructions_are_reinterpreted_each_visit() {
        // The loop body overwrites its own first line with data
        let mut machine = loaded(&[
            "        LOAD R1, =0",
            "        LOAD R2, =0",
            "top:    INC R1",
            "        STORE R1, [8, R2]",
            "        BR top",
        ]);
        assert!(!machine.run());
        assert_eq!(
            machine.error().map(ToString::to_string).as_deref(),
            Some("Expected instruction but found NUMBER")
        );
        assert_eq!(machine.state().memory()[2].as_deref(), Some("1"));
        assert_eq!(machine.fault().unwrap().addr, 8);
    }

    #[test]
    fn fault_shows_line_as_fetched() {
        // The STORE overwrites its own cell before the trailing token is rejected
        let mut machine = loaded(&["LOAD R1, =5", "LOAD R2, =0", "STORE R1, $R2 R3", "HALT"]);
        assert!(!machine.run());
        assert_eq!(machine.state().memory()[2].as_deref(), Some("5"));
        let fault = machine.fault().unwrap();
        assert_eq!(fault.addr, 8);
        assert_eq!(fault.line.as_deref(), Some("STORE R1, $R2 R3"));
        assert!(matches!(fault.error, Error::TrailingTokens { .. }));
    }

    #[test]
    fn fault_on_empty_cell() {
        let mut machine = loaded(&["INC R1"]);
        assert!(!machine.run());
        let fault = machine.fault().unwrap();
        assert_eq!(fault.addr, 4);
        assert_eq!(fault.line, None);
    }

    #[test]
    fn preset_cells() {
        let mut machine = loaded(&["LOAD R1, =80", "LOAD R2, [0, R1]", "HALT"]);
        machine.set_memory(80, "28").unwrap();
        assert!(machine.set_memory(81, "1").is_err());
        assert!(machine.set_storage(256, "1").is_err());
        assert!(machine.run());
        assert_eq!(machine.state().register(2), Ok(28));
    }

    #[test]
    fn report_carries_line() {
        let mut machine = loaded(&["LOAD R1, #1"]);
        machine.run();
        let report = machine.report().unwrap();
        assert_eq!(report.to_string(), "Encountered an unknown character `#`");
    }

    #[test]
    fn check_program() {
        assert_eq!(check(&["a: LOAD R1, =1", "BR a"]), Ok(2));
        let fault = check(&["HALT", "LOAD R1, %"]).unwrap_err();
        assert_eq!(fault.addr, 4);
        assert_eq!(fault.line.as_deref(), Some("LOAD R1, %"));
        let fault = check(&["a: HALT", "a: HALT"]).unwrap_err();
        assert!(matches!(fault.error, Error::DuplicateLabel { .. }));
    }
}
