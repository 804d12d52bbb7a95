use std::fmt;
use std::str::FromStr;

use fxhash::FxBuildHasher;
use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::error::Error;
use crate::{MAX_LABELS, MEMORY_SIZE, REGISTER_COUNT, STORAGE_SIZE, WORD_SIZE};

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Index into the register file.
///
/// Index 0 holds the program counter and is only reachable through [`Register::PC`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Register(u8);

impl Register {
    pub const PC: Register = Register(0);

    /// General purpose register `R{index}`, for `index` in `1..=9`.
    pub fn new(index: usize) -> Result<Register, Error> {
        match u8::try_from(index) {
            Ok(idx) if (1..REGISTER_COUNT).contains(&index) => Ok(Register(idx)),
            _ => Err(Error::RegisterRange { index, span: None }),
        }
    }

    /// Check that the register may be used as an instruction operand.
    pub fn general(self) -> Result<Register, Error> {
        Register::new(self.index())
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FromStr for Register {
    type Err = ();

    /// Parses `R` followed by a single digit. Range is checked by [`Register::general`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [b'R', digit @ b'0'..=b'9'] => Ok(Register(digit - b'0')),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("PC"),
            n => write!(f, "R{n}"),
        }
    }
}

/// The two word-addressed cell arrays of the machine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Region {
    Memory,
    Storage,
}

impl Region {
    /// Number of cells in the region
    pub fn cells(self) -> usize {
        match self {
            Region::Memory => MEMORY_SIZE,
            Region::Storage => STORAGE_SIZE,
        }
    }

    /// Exclusive upper bound on byte addresses
    pub fn bound(self) -> usize {
        self.cells() * WORD_SIZE
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Memory => f.write_str("memory"),
            Region::Storage => f.write_str("storage"),
        }
    }
}

/// Byte address that is word aligned and inside the region it was checked against.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Addr(usize);

impl Addr {
    pub fn new(addr: i64, region: Region) -> Result<Addr, Error> {
        if addr.rem_euclid(WORD_SIZE as i64) != 0 {
            return Err(Error::Misaligned { addr, region });
        }
        match usize::try_from(addr) {
            Ok(valid) if valid < region.bound() => Ok(Addr(valid)),
            _ => Err(Error::OutOfRange {
                addr,
                bound: region.bound(),
                region,
            }),
        }
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Index of the cell this address refers to
    pub fn cell(self) -> usize {
        self.0 / WORD_SIZE
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a label points and how often it has been jumped to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LabelEntry {
    /// Index of the line the label was defined on
    pub line: usize,
    /// Number of taken branches to this label
    pub jumps: u32,
}

/// Label name -> line index, in definition order.
#[derive(Clone, Default, Debug)]
pub struct LabelTable {
    table: FxMap<String, LabelEntry>,
}

impl LabelTable {
    pub fn new() -> Self {
        LabelTable {
            table: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Define a label. Fails on a duplicate name or once the table is full.
    pub fn insert(&mut self, name: &str, line: usize) -> Result<(), Error> {
        let at_capacity = self.table.len() >= MAX_LABELS;
        match self.table.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::DuplicateLabel {
                name: name.to_string(),
                line,
            }),
            Entry::Vacant(_) if at_capacity => Err(Error::TooManyLabels { limit: MAX_LABELS }),
            Entry::Vacant(entry) => {
                entry.insert(LabelEntry { line, jumps: 0 });
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&LabelEntry> {
        self.table.get(name)
    }

    pub fn line_of(&self, name: &str) -> Option<usize> {
        self.get(name).map(|entry| entry.line)
    }

    /// Count a taken branch to `name` and return its target line.
    pub fn record_jump(&mut self, name: &str) -> Option<usize> {
        let entry = self.table.get_mut(name)?;
        entry.jumps += 1;
        Some(entry.line)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelEntry)> {
        self.table.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Per-label jump counts, e.g. `loop: 600, skip: 400`.
    pub fn breakdown(&self) -> String {
        self.iter()
            .map(|(name, entry)| format!("{name}: {}", entry.jumps))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
