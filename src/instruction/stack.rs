//! Operand stack manipulation. Every value is one interpreter slot, longs
//! and doubles included, so the two-slot forms move two interpreter slots
//! regardless of what they hold.

use crate::error::VmError;
use crate::jvm::frame::Frame;

pub fn pop(frame: &mut Frame) -> Result<(), VmError> {
    frame.pop()?;
    Ok(())
}

pub fn pop2(frame: &mut Frame) -> Result<(), VmError> {
    frame.pop()?;
    frame.pop()?;
    Ok(())
}

pub fn dup(frame: &mut Frame) -> Result<(), VmError> {
    let v = frame.pop()?;
    frame.push(v)?;
    frame.push(v)
}

pub fn dup_x1(frame: &mut Frame) -> Result<(), VmError> {
    let v1 = frame.pop()?;
    let v2 = frame.pop()?;
    frame.push(v1)?;
    frame.push(v2)?;
    frame.push(v1)
}

pub fn dup_x2(frame: &mut Frame) -> Result<(), VmError> {
    let v1 = frame.pop()?;
    let v2 = frame.pop()?;
    let v3 = frame.pop()?;
    frame.push(v1)?;
    frame.push(v3)?;
    frame.push(v2)?;
    frame.push(v1)
}

pub fn dup2(frame: &mut Frame) -> Result<(), VmError> {
    let v1 = frame.pop()?;
    let v2 = frame.pop()?;
    frame.push(v2)?;
    frame.push(v1)?;
    frame.push(v2)?;
    frame.push(v1)
}

pub fn dup2_x1(frame: &mut Frame) -> Result<(), VmError> {
    let v1 = frame.pop()?;
    let v2 = frame.pop()?;
    let v3 = frame.pop()?;
    frame.push(v2)?;
    frame.push(v1)?;
    frame.push(v3)?;
    frame.push(v2)?;
    frame.push(v1)
}

pub fn dup2_x2(frame: &mut Frame) -> Result<(), VmError> {
    let v1 = frame.pop()?;
    let v2 = frame.pop()?;
    let v3 = frame.pop()?;
    let v4 = frame.pop()?;
    frame.push(v2)?;
    frame.push(v1)?;
    frame.push(v4)?;
    frame.push(v3)?;
    frame.push(v2)?;
    frame.push(v1)
}

pub fn swap(frame: &mut Frame) -> Result<(), VmError> {
    let v1 = frame.pop()?;
    let v2 = frame.pop()?;
    frame.push(v1)?;
    frame.push(v2)
}
