//! Type conversions. Widening conversions are value-preserving; narrowing
//! conversions truncate. `i2b` and `i2s` sign-extend their truncated result
//! back to an int, `i2c` zero-extends. Float-to-integer conversions saturate
//! at the integer range bounds and map NaN to zero, which is exactly the
//! behavior of Rust's `as` casts.

use crate::error::VmError;
use crate::jvm::frame::Frame;
use crate::jvm::mem::JavaValue;

macro_rules! convert_instruction {
    ($name:ident, $pop:ident -> $variant:ident, $type:ty) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let value = frame.$pop()?;
            frame.push(JavaValue::$variant(value as $type))
        }
    };
}

convert_instruction! {i2l, pop_int -> Long, i64}
convert_instruction! {i2f, pop_int -> Float, f32}
convert_instruction! {i2d, pop_int -> Double, f64}
convert_instruction! {l2i, pop_long -> Int, i32}
convert_instruction! {l2f, pop_long -> Float, f32}
convert_instruction! {l2d, pop_long -> Double, f64}
convert_instruction! {f2i, pop_float -> Int, i32}
convert_instruction! {f2l, pop_float -> Long, i64}
convert_instruction! {f2d, pop_float -> Double, f64}
convert_instruction! {d2i, pop_double -> Int, i32}
convert_instruction! {d2l, pop_double -> Long, i64}
convert_instruction! {d2f, pop_double -> Float, f32}

pub fn i2b(frame: &mut Frame) -> Result<(), VmError> {
    let value = frame.pop_int()?;
    frame.push(JavaValue::Int(value as i8 as i32))
}

pub fn i2c(frame: &mut Frame) -> Result<(), VmError> {
    let value = frame.pop_int()?;
    frame.push(JavaValue::Int(value as u16 as i32))
}

pub fn i2s(frame: &mut Frame) -> Result<(), VmError> {
    let value = frame.pop_int()?;
    frame.push(JavaValue::Int(value as i16 as i32))
}
