//! Comparisons and conditional branches. The comparison opcodes push -1, 0
//! or 1; the `l` and `g` float variants differ only in which direction NaN
//! collapses to. Branch offsets are signed and relative to the opcode's own
//! address.

use std::cmp::Ordering;

use crate::error::VmError;
use crate::jvm::frame::Frame;
use crate::jvm::mem::JavaValue;

fn push_ordering(frame: &mut Frame, ordering: Ordering) -> Result<(), VmError> {
    frame.push(JavaValue::Int(match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

pub fn lcmp(frame: &mut Frame) -> Result<(), VmError> {
    let y = frame.pop_long()?;
    let x = frame.pop_long()?;
    push_ordering(frame, x.cmp(&y))
}

/// `nan_result` is what an unordered comparison pushes: -1 for the `l`
/// variants, 1 for the `g` variants.
fn fcmp(frame: &mut Frame, nan_result: i32) -> Result<(), VmError> {
    let y = frame.pop_float()?;
    let x = frame.pop_float()?;
    match x.partial_cmp(&y) {
        Some(ordering) => push_ordering(frame, ordering),
        None => frame.push(JavaValue::Int(nan_result)),
    }
}

fn dcmp(frame: &mut Frame, nan_result: i32) -> Result<(), VmError> {
    let y = frame.pop_double()?;
    let x = frame.pop_double()?;
    match x.partial_cmp(&y) {
        Some(ordering) => push_ordering(frame, ordering),
        None => frame.push(JavaValue::Int(nan_result)),
    }
}

pub fn fcmpl(frame: &mut Frame) -> Result<(), VmError> {
    fcmp(frame, -1)
}

pub fn fcmpg(frame: &mut Frame) -> Result<(), VmError> {
    fcmp(frame, 1)
}

pub fn dcmpl(frame: &mut Frame) -> Result<(), VmError> {
    dcmp(frame, -1)
}

pub fn dcmpg(frame: &mut Frame) -> Result<(), VmError> {
    dcmp(frame, 1)
}

/// Consume a 16-bit branch offset and take the branch if `taken`. The
/// opcode byte sits one position before the current pc.
fn branch16(frame: &mut Frame, code: &[u8], taken: bool) {
    let base = frame.pc - 1;
    let offset = frame.fetch_i16(code);
    if taken {
        frame.pc = (base as i64 + offset as i64) as usize;
    }
}

pub fn if_cond(
    frame: &mut Frame,
    code: &[u8],
    cond: fn(i32) -> bool,
) -> Result<(), VmError> {
    let base = frame.pc - 1;
    let offset = frame.fetch_i16(code);
    if cond(frame.pop_int()?) {
        frame.pc = (base as i64 + offset as i64) as usize;
    }
    Ok(())
}

pub fn if_icmp(
    frame: &mut Frame,
    code: &[u8],
    cond: fn(i32, i32) -> bool,
) -> Result<(), VmError> {
    let base = frame.pc - 1;
    let offset = frame.fetch_i16(code);
    let y = frame.pop_int()?;
    let x = frame.pop_int()?;
    if cond(x, y) {
        frame.pc = (base as i64 + offset as i64) as usize;
    }
    Ok(())
}

/// `if_acmpeq` / `if_acmpne`: references are equal when they name the same
/// heap entry (or are both null).
pub fn if_acmp(frame: &mut Frame, code: &[u8], want_equal: bool) -> Result<(), VmError> {
    let base = frame.pc - 1;
    let offset = frame.fetch_i16(code);
    let y = frame.pop_reference()?;
    let x = frame.pop_reference()?;
    if (x == y) == want_equal {
        frame.pc = (base as i64 + offset as i64) as usize;
    }
    Ok(())
}

pub fn if_null(frame: &mut Frame, code: &[u8], want_null: bool) -> Result<(), VmError> {
    let base = frame.pc - 1;
    let offset = frame.fetch_i16(code);
    if frame.pop_reference()?.is_none() == want_null {
        frame.pc = (base as i64 + offset as i64) as usize;
    }
    Ok(())
}

pub fn goto(frame: &mut Frame, code: &[u8]) {
    branch16(frame, code, true);
}

pub fn goto_w(frame: &mut Frame, code: &[u8]) {
    let base = frame.pc - 1;
    let offset = frame.fetch_i32(code);
    frame.pc = (base as i64 + offset as i64) as usize;
}

/// `jsr` pushes the address of the instruction after itself, then branches.
pub fn jsr(frame: &mut Frame, code: &[u8]) -> Result<(), VmError> {
    let base = frame.pc - 1;
    let offset = frame.fetch_i16(code);
    frame.push(JavaValue::Int(frame.pc as i32))?;
    frame.pc = (base as i64 + offset as i64) as usize;
    Ok(())
}

pub fn jsr_w(frame: &mut Frame, code: &[u8]) -> Result<(), VmError> {
    let base = frame.pc - 1;
    let offset = frame.fetch_i32(code);
    frame.push(JavaValue::Int(frame.pc as i32))?;
    frame.pc = (base as i64 + offset as i64) as usize;
    Ok(())
}

/// `ret` jumps to the return address a `jsr` stored in a local.
pub fn ret(frame: &mut Frame, code: &[u8]) -> Result<(), VmError> {
    let index = frame.fetch_u8(code) as u16;
    match frame.local_load(index) {
        JavaValue::Int(address) => {
            frame.pc = address as usize;
            Ok(())
        }
        _ => Err(VmError::OperandType {
            expected: "return address",
        }),
    }
}
