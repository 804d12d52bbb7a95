use std::cmp::Ordering;

use crate::error::Error;
use crate::lexer::{Token, TokenKind, TokenStream};
use crate::resolve::{resolve_address, resolve_value, Mode};
use crate::state::MachineState;
use crate::tprintln;

/// Execute the tokens of one line against the machine.
///
/// Effects that happened before a failing operand are kept. A line without tokens does nothing.
pub fn execute(state: &mut MachineState, toks: &[Token<'_>], line_len: usize) -> Result<(), Error> {
    let mut toks = TokenStream::new(toks, line_len);
    let Some(op) = toks.advance() else {
        return Ok(());
    };
    if !op.kind.is_opcode() {
        return Err(toks.unexpected("instruction", Some(op)));
    }
    match op.kind {
        TokenKind::Load => exec_load(state, &mut toks, Mode::Load)?,
        TokenKind::Read => exec_load(state, &mut toks, Mode::Storage)?,
        TokenKind::Store => exec_store(state, &mut toks, Mode::Store)?,
        TokenKind::Write => exec_store(state, &mut toks, Mode::Storage)?,
        TokenKind::Add | TokenKind::Sub | TokenKind::Mul | TokenKind::Div => {
            exec_math(state, &mut toks, op.kind)?
        }
        TokenKind::Inc => {
            let reg = toks.expect_reg()?;
            state.set_reg(reg, state.reg(reg).wrapping_add(1));
        }
        TokenKind::Halt => state.halt(),
        TokenKind::Br => {
            let label = toks.expect(TokenKind::LabelRef)?;
            jump(state, label)?;
        }
        TokenKind::Blt
        | TokenKind::Bgt
        | TokenKind::Bleq
        | TokenKind::Bgeq
        | TokenKind::Beq
        | TokenKind::Bneq => exec_branch(state, &mut toks, op.kind)?,
        _ => unreachable!("non-opcode tokens rejected above"),
    }
    toks.finish()
}

/// `LOAD Rd, <value>` and `READ Rd, <value>`
fn exec_load(
    state: &mut MachineState,
    toks: &mut TokenStream<'_, '_>,
    mode: Mode,
) -> Result<(), Error> {
    let dest = toks.expect_reg()?;
    toks.expect_comma()?;
    let value = resolve_value(toks, state, mode)?;
    tprintln!("{dest} <- {value}");
    state.set_reg(dest, value);
    Ok(())
}

/// `STORE Rs, <target>` and `WRITE Rs, <target>`
fn exec_store(
    state: &mut MachineState,
    toks: &mut TokenStream<'_, '_>,
    mode: Mode,
) -> Result<(), Error> {
    let src = toks.expect_reg()?;
    toks.expect_comma()?;
    let addr = resolve_address(toks, state, mode)?;
    let value = state.reg(src);
    tprintln!("{}[{addr}] <- {value}", mode.region());
    state.write_word(mode.region(), addr, value);
    Ok(())
}

/// `ADD/SUB/MUL/DIV Ra, Rb`. Wraps on overflow, `DIV` leaves the remainder in `Rb`.
fn exec_math(
    state: &mut MachineState,
    toks: &mut TokenStream<'_, '_>,
    op: TokenKind,
) -> Result<(), Error> {
    let ra = toks.expect_reg()?;
    toks.expect_comma()?;
    let rb = toks.expect_reg()?;
    let lhs = state.reg(ra) as u32;
    let rhs = state.reg(rb) as u32;
    let result = match op {
        TokenKind::Add => lhs.wrapping_add(rhs),
        TokenKind::Sub => lhs.wrapping_sub(rhs),
        TokenKind::Mul => lhs.wrapping_mul(rhs),
        TokenKind::Div => {
            let (quot, rem) = lhs
                .checked_div(rhs)
                .zip(lhs.checked_rem(rhs))
                .ok_or(Error::DivisionByZero)?;
            state.set_reg(rb, rem as i32);
            quot
        }
        _ => unreachable!("only arithmetic opcodes reach exec_math"),
    };
    tprintln!("{ra} <- {}", result as i32);
    state.set_reg(ra, result as i32);
    Ok(())
}

/// `Bxx Ra, Rb, label`
fn exec_branch(
    state: &mut MachineState,
    toks: &mut TokenStream<'_, '_>,
    op: TokenKind,
) -> Result<(), Error> {
    let ra = toks.expect_reg()?;
    toks.expect_comma()?;
    let rb = toks.expect_reg()?;
    toks.expect_comma()?;
    let label = toks.expect(TokenKind::LabelRef)?;

    let ord = state.reg(ra).cmp(&state.reg(rb));
    let taken = match op {
        TokenKind::Blt => ord == Ordering::Less,
        TokenKind::Bgt => ord == Ordering::Greater,
        TokenKind::Bleq => ord != Ordering::Greater,
        TokenKind::Bgeq => ord != Ordering::Less,
        TokenKind::Beq => ord == Ordering::Equal,
        TokenKind::Bneq => ord != Ordering::Equal,
        _ => unreachable!("only conditional branches reach exec_branch"),
    };
    if state.labels().get(label.text).is_none() {
        return Err(unresolved(label));
    }
    if taken {
        jump(state, label)?;
    }
    Ok(())
}

fn jump(state: &mut MachineState, label: Token<'_>) -> Result<(), Error> {
    let line = state.take_jump(label.text).ok_or_else(|| unresolved(label))?;
    tprintln!("jump {} -> line {line}", label.text);
    Ok(())
}

fn unresolved(label: Token<'_>) -> Error {
    Error::UnresolvedLabel {
        name: label.text.to_string(),
        span: label.span(),
    }
}
