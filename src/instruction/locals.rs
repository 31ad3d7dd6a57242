//! Transfers between the local variable array and the operand stack. One
//! load and one store cover every type: values carry their own shape, and
//! the frame's store helper owns the two-slot rule for longs and doubles.

use crate::error::VmError;
use crate::jvm::frame::Frame;
use crate::jvm::mem::JavaValue;

pub fn load(frame: &mut Frame, index: u16) -> Result<(), VmError> {
    let value = frame.local_load(index);
    frame.push(value)
}

pub fn store(frame: &mut Frame, index: u16) -> Result<(), VmError> {
    let value = frame.pop()?;
    frame.local_store(index, value);
    Ok(())
}

/// `iinc`: add a signed byte constant to an int local in place.
pub fn iinc(frame: &mut Frame, code: &[u8]) -> Result<(), VmError> {
    let index = frame.fetch_u8(code) as u16;
    let constant = frame.fetch_u8(code) as i8 as i32;
    match frame.local_load(index) {
        JavaValue::Int(value) => {
            frame.local_store(index, JavaValue::Int(value.wrapping_add(constant)));
            Ok(())
        }
        _ => Err(VmError::OperandType { expected: "int" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_store_round_trip() {
        let mut frame = Frame::new(4, 1);
        frame.push(JavaValue::Long(11)).unwrap();
        store(&mut frame, 1).unwrap();
        load(&mut frame, 1).unwrap();
        assert_eq!(frame.pop_long().unwrap(), 11);
        // The shadow slot reads back the same value.
        load(&mut frame, 2).unwrap();
        assert_eq!(frame.pop_long().unwrap(), 11);
    }

    #[test]
    fn iinc_handles_negative_constants() {
        // iinc 0, -3
        let code = [0x84, 0x00, 0xFD];
        let mut frame = Frame::new(1, 0);
        frame.local_store(0, JavaValue::Int(10));
        frame.pc = 1;
        iinc(&mut frame, &code).unwrap();
        assert_eq!(frame.local_load(0), JavaValue::Int(7));
    }
}
