use crate::error::Error;
use crate::symbol::{Addr, LabelTable, Region, Register};
use crate::{MEMORY_SIZE, REGISTER_COUNT, STORAGE_SIZE};

/// Optional text contents of each cell in a region.
pub type Cells<const N: usize> = [Option<String>; N];

/// Complete machine state. Replaced wholesale on every program load.
#[derive(Clone, Debug)]
pub struct MachineState {
    /// Index 0 is the program counter, counted in lines
    registers: [i32; REGISTER_COUNT],
    memory: Box<Cells<MEMORY_SIZE>>,
    storage: Box<Cells<STORAGE_SIZE>>,
    labels: LabelTable,
    halted: bool,
    /// First error raised since the last load
    error: Option<Error>,
    /// Taken branches since the last load
    jumps: u32,
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState::new()
    }
}

impl MachineState {
    pub fn new() -> Self {
        MachineState {
            registers: [0; REGISTER_COUNT],
            memory: Box::new(std::array::from_fn(|_| None)),
            storage: Box::new(std::array::from_fn(|_| None)),
            labels: LabelTable::new(),
            halted: false,
            error: None,
            jumps: 0,
        }
    }

    pub fn registers(&self) -> &[i32; REGISTER_COUNT] {
        &self.registers
    }

    pub fn memory(&self) -> &Cells<MEMORY_SIZE> {
        &self.memory
    }

    pub fn storage(&self) -> &Cells<STORAGE_SIZE> {
        &self.storage
    }

    pub fn cells(&self, region: Region) -> &[Option<String>] {
        match region {
            Region::Memory => &self.memory[..],
            Region::Storage => &self.storage[..],
        }
    }

    fn cells_mut(&mut self, region: Region) -> &mut [Option<String>] {
        match region {
            Region::Memory => &mut self.memory[..],
            Region::Storage => &mut self.storage[..],
        }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub(crate) fn set_labels(&mut self, labels: LabelTable) {
        self.labels = labels;
    }

    pub fn pc(&self) -> usize {
        self.registers[Register::PC.index()] as usize
    }

    pub(crate) fn set_pc(&mut self, line: usize) {
        self.registers[Register::PC.index()] = line as i32;
    }

    pub fn reg(&self, reg: Register) -> i32 {
        self.registers[reg.index()]
    }

    pub(crate) fn set_reg(&mut self, reg: Register, value: i32) {
        self.registers[reg.index()] = value;
    }

    /// Read general purpose register `R{index}`.
    pub fn register(&self, index: usize) -> Result<i32, Error> {
        Register::new(index).map(|reg| self.reg(reg))
    }

    /// Write general purpose register `R{index}`. Out of range indices leave the file untouched.
    pub fn set_register(&mut self, index: usize, value: i32) -> Result<(), Error> {
        let reg = Register::new(index)?;
        self.set_reg(reg, value);
        Ok(())
    }

    /// Raw contents of the cell at a checked address.
    pub fn cell(&self, region: Region, addr: Addr) -> Option<&str> {
        self.cells(region)[addr.cell()].as_deref()
    }

    /// Read a cell as data. Empty cells and non-numeric text are garbage.
    pub fn read_word(&self, region: Region, addr: Addr) -> Result<i32, Error> {
        self.cell(region, addr)
            .and_then(|text| text.trim().parse().ok())
            .ok_or(Error::Garbage {
                addr: addr.get(),
                region,
            })
    }

    pub fn write_word(&mut self, region: Region, addr: Addr, value: i32) {
        self.write_cell(region, addr, Some(value.to_string()));
    }

    pub(crate) fn write_cell(&mut self, region: Region, addr: Addr, text: Option<String>) {
        self.cells_mut(region)[addr.cell()] = text;
    }

    /// Line stored at a cell index, used to fetch instructions.
    pub(crate) fn line(&self, idx: usize) -> Option<&str> {
        self.memory.get(idx).and_then(|cell| cell.as_deref())
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Record an error unless one is already outstanding, in which case `err` is dropped.
    ///
    /// Returns the error that is held afterwards.
    pub fn raise(&mut self, err: Error) -> &Error {
        self.error.get_or_insert(err)
    }

    pub fn jumps(&self) -> u32 {
        self.jumps
    }

    /// Jump to `label`, counting it globally and against the label.
    pub(crate) fn take_jump(&mut self, label: &str) -> Option<usize> {
        let line = self.labels.record_jump(label)?;
        self.jumps += 1;
        self.set_pc(line);
        Some(line)
    }

    /// Neither halted nor errored
    pub fn can_continue(&self) -> bool {
        !self.halted && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: i64) -> Addr {
        Addr::new(raw, Region::Memory).unwrap()
    }

    #[test]
    fn fresh_state_is_empty() {
        let state = MachineState::new();
        assert_eq!(state.registers(), &[0; REGISTER_COUNT]);
        assert!(state.memory().iter().all(Option::is_none));
        assert!(state.storage().iter().all(Option::is_none));
        assert!(state.labels().is_empty());
        assert!(state.can_continue());
        assert_eq!(state.jumps(), 0);
    }

    #[test]
    fn register_roundtrip() {
        let mut state = MachineState::new();
        for idx in 1..REGISTER_COUNT {
            for value in [0, 1, -1, i32::MAX, i32::MIN] {
                state.set_register(idx, value).unwrap();
                assert_eq!(state.register(idx), Ok(value));
            }
        }
    }

    #[test]
    fn register_rejects_out_of_range() {
        let mut state = MachineState::new();
        state.set_pc(3);
        assert!(state.set_register(0, 99).is_err());
        assert!(state.set_register(10, 99).is_err());
        assert_eq!(state.pc(), 3);
        assert!(state.register(10).is_err());
    }

    #[test]
    fn word_roundtrip() {
        let mut state = MachineState::new();
        for raw in (0..(MEMORY_SIZE as i64 * 4)).step_by(4) {
            state.write_word(Region::Memory, addr(raw), raw as i32 - 100);
            assert_eq!(state.read_word(Region::Memory, addr(raw)), Ok(raw as i32 - 100));
        }
        assert!(state.storage().iter().all(Option::is_none));
    }

    #[test]
    fn reading_garbage() {
        let mut state = MachineState::new();
        assert_eq!(
            state.read_word(Region::Memory, addr(8)),
            Err(Error::Garbage {
                addr: 8,
                region: Region::Memory
            })
        );
        state.write_cell(Region::Memory, addr(8), Some("LOAD R1, =3".into()));
        assert!(state.read_word(Region::Memory, addr(8)).is_err());
        state.write_cell(Region::Memory, addr(8), Some(" -17 ".into()));
        assert_eq!(state.read_word(Region::Memory, addr(8)), Ok(-17));
    }

    #[test]
    fn first_error_wins() {
        let mut state = MachineState::new();
        state.raise(Error::DivisionByZero);
        let held = state.raise(Error::TooManyLabels { limit: 16 });
        assert_eq!(held, &Error::DivisionByZero);
        assert_eq!(state.error(), Some(&Error::DivisionByZero));
        assert!(!state.can_continue());
    }

    #[test]
    fn jumps_are_counted() {
        let mut state = MachineState::new();
        let mut labels = LabelTable::new();
        labels.insert("loop", 4).unwrap();
        state.set_labels(labels);
        assert_eq!(state.take_jump("loop"), Some(4));
        assert_eq!(state.take_jump("nowhere"), None);
        assert_eq!(state.pc(), 4);
        assert_eq!(state.jumps(), 1);
        assert_eq!(state.labels().get("loop").unwrap().jumps, 1);
    }
}
