//! Operand addressing shared by the memory and storage instructions.
//!
//! | Form      | Syntax    | Value (LOAD/READ)         | Address (STORE/WRITE)     |
//! |-----------|-----------|---------------------------|---------------------------|
//! | Direct    | `Rn`      | contents of `Rn`          | contents of `Rn`          |
//! | Immediate | `=N`      | `N`                       | -                         |
//! | Indexed   | `[N, Rn]` | cell at `N + Rn`          | `N + Rn`                  |
//! | Indirect  | `@Rn`     | cell at (cell at `Rn`)    | -                         |
//! | Relative  | `$Rn`     | cell at `Rn + 4 * (PC-1)` | `Rn + 4 * (PC-1)`         |

use crate::error::Error;
use crate::lexer::{TokenKind, TokenStream};
use crate::state::MachineState;
use crate::symbol::{Addr, Region, Register};
use crate::WORD_SIZE;

/// A parsed operand, not yet evaluated against machine state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Direct(Register),
    Immediate(i32),
    Indexed { disp: i32, base: Register },
    Indirect(Register),
    Relative(Register),
}

/// Which instruction family an operand belongs to. Decides the accepted forms and the region.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    /// `LOAD`: every form
    Load,
    /// `STORE`: direct, indexed, relative
    Store,
    /// `READ`/`WRITE`: direct, indexed
    Storage,
}

impl Mode {
    pub fn region(self) -> Region {
        match self {
            Mode::Load | Mode::Store => Region::Memory,
            Mode::Storage => Region::Storage,
        }
    }

    fn allows(self, kind: TokenKind) -> bool {
        match self {
            Mode::Load => matches!(
                kind,
                TokenKind::Register
                    | TokenKind::Equal
                    | TokenKind::LBracket
                    | TokenKind::At
                    | TokenKind::Dollar
            ),
            Mode::Store => matches!(
                kind,
                TokenKind::Register | TokenKind::LBracket | TokenKind::Dollar
            ),
            Mode::Storage => matches!(kind, TokenKind::Register | TokenKind::LBracket),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Mode::Load => "REGISTER, EQUAL, L_BRACKET, AT or DOLLAR",
            Mode::Store => "REGISTER, L_BRACKET or DOLLAR",
            Mode::Storage => "REGISTER or L_BRACKET",
        }
    }
}

impl Operand {
    /// Parse the operand at the front of the stream.
    pub fn parse(toks: &mut TokenStream<'_, '_>, mode: Mode) -> Result<Operand, Error> {
        let kind = toks.peek_kind();
        if !mode.allows(kind) {
            let found = toks.advance();
            return Err(toks.unexpected(mode.expected(), found));
        }
        let operand = match kind {
            TokenKind::Register => Operand::Direct(toks.expect_reg()?),
            TokenKind::Equal => {
                toks.advance();
                Operand::Immediate(toks.expect_number()?)
            }
            TokenKind::LBracket => {
                toks.advance();
                let disp = toks.expect_number()?;
                toks.expect_comma()?;
                let base = toks.expect_reg()?;
                toks.expect(TokenKind::RBracket)?;
                Operand::Indexed { disp, base }
            }
            TokenKind::At => {
                toks.advance();
                Operand::Indirect(toks.expect_reg()?)
            }
            TokenKind::Dollar => {
                toks.advance();
                Operand::Relative(toks.expect_reg()?)
            }
            _ => unreachable!("operand kind checked against mode"),
        };
        Ok(operand)
    }

    /// Evaluate as a value, as `LOAD` and `READ` do.
    pub fn value(self, state: &MachineState, region: Region) -> Result<i32, Error> {
        match self {
            Operand::Direct(reg) => Ok(state.reg(reg)),
            Operand::Immediate(val) => Ok(val),
            Operand::Indirect(reg) => {
                let ptr = state.read_word(region, Addr::new(state.reg(reg).into(), region)?)?;
                state.read_word(region, Addr::new(ptr.into(), region)?)
            }
            Operand::Indexed { .. } | Operand::Relative(_) => {
                state.read_word(region, self.address(state, region)?)
            }
        }
    }

    /// Evaluate as a target address, as `STORE` and `WRITE` do.
    pub fn address(self, state: &MachineState, region: Region) -> Result<Addr, Error> {
        let raw = match self {
            Operand::Direct(reg) => i64::from(state.reg(reg)),
            Operand::Indexed { disp, base } => i64::from(disp) + i64::from(state.reg(base)),
            Operand::Relative(reg) => i64::from(state.reg(reg)) + current_instr_addr(state),
            Operand::Immediate(_) | Operand::Indirect(_) => {
                unreachable!("immediate and indirect operands are never targets")
            }
        };
        Addr::new(raw, region)
    }
}

/// Byte address of the instruction being executed. The PC has already moved past it.
fn current_instr_addr(state: &MachineState) -> i64 {
    (state.pc() as i64 - 1) * WORD_SIZE as i64
}

/// Parse and evaluate a value operand.
pub fn resolve_value(
    toks: &mut TokenStream<'_, '_>,
    state: &MachineState,
    mode: Mode,
) -> Result<i32, Error> {
    Operand::parse(toks, mode)?.value(state, mode.region())
}

/// Parse and evaluate a target address operand.
pub fn resolve_address(
    toks: &mut TokenStream<'_, '_>,
    state: &MachineState,
    mode: Mode,
) -> Result<Addr, Error> {
    Operand::parse(toks, mode)?.address(state, mode.region())
}
