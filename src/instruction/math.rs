//! Arithmetic and logic. Integer division truncates toward zero and the
//! remainder satisfies `a - (a / b) * b`; division by zero aborts (there is
//! no exception dispatch to throw through). Shift distances use the low five
//! bits of the operand for 32-bit shifts and the low six for 64-bit shifts.

use crate::error::VmError;
use crate::jvm::frame::Frame;
use crate::jvm::mem::JavaValue;

macro_rules! math_instruction {
    ($name:ident, Int ($x:ident, $y:ident) => $res:expr) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let $y = frame.pop_int()?;
            let $x = frame.pop_int()?;
            frame.push(JavaValue::Int($res))
        }
    };
    ($name:ident, Int ($x:ident) => $res:expr) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let $x = frame.pop_int()?;
            frame.push(JavaValue::Int($res))
        }
    };
    ($name:ident, Long ($x:ident, $y:ident) => $res:expr) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let $y = frame.pop_long()?;
            let $x = frame.pop_long()?;
            frame.push(JavaValue::Long($res))
        }
    };
    ($name:ident, Long ($x:ident) => $res:expr) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let $x = frame.pop_long()?;
            frame.push(JavaValue::Long($res))
        }
    };
    ($name:ident, Float ($x:ident, $y:ident) => $res:expr) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let $y = frame.pop_float()?;
            let $x = frame.pop_float()?;
            frame.push(JavaValue::Float($res))
        }
    };
    ($name:ident, Float ($x:ident) => $res:expr) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let $x = frame.pop_float()?;
            frame.push(JavaValue::Float($res))
        }
    };
    ($name:ident, Double ($x:ident, $y:ident) => $res:expr) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let $y = frame.pop_double()?;
            let $x = frame.pop_double()?;
            frame.push(JavaValue::Double($res))
        }
    };
    ($name:ident, Double ($x:ident) => $res:expr) => {
        pub fn $name(frame: &mut Frame) -> Result<(), VmError> {
            let $x = frame.pop_double()?;
            frame.push(JavaValue::Double($res))
        }
    };
}

fn div_guard<T: PartialEq + Default>(divisor: T) -> T {
    if divisor == T::default() {
        panic!("division by zero");
    }
    divisor
}

math_instruction! {iadd, Int (x, y) => x.wrapping_add(y)}
math_instruction! {isub, Int (x, y) => x.wrapping_sub(y)}
math_instruction! {imul, Int (x, y) => x.wrapping_mul(y)}
math_instruction! {idiv, Int (x, y) => x.wrapping_div(div_guard(y))}
math_instruction! {irem, Int (x, y) => x.wrapping_rem(div_guard(y))}
math_instruction! {ineg, Int (x) => x.wrapping_neg()}
math_instruction! {ishl, Int (x, y) => x.wrapping_shl(y as u32 & 0x1F)}
math_instruction! {ishr, Int (x, y) => x.wrapping_shr(y as u32 & 0x1F)}
math_instruction! {iushr, Int (x, y) => ((x as u32) >> (y as u32 & 0x1F)) as i32}
math_instruction! {iand, Int (x, y) => x & y}
math_instruction! {ior, Int (x, y) => x | y}
math_instruction! {ixor, Int (x, y) => x ^ y}

math_instruction! {ladd, Long (x, y) => x.wrapping_add(y)}
math_instruction! {lsub, Long (x, y) => x.wrapping_sub(y)}
math_instruction! {lmul, Long (x, y) => x.wrapping_mul(y)}
math_instruction! {ldiv, Long (x, y) => x.wrapping_div(div_guard(y))}
math_instruction! {lrem, Long (x, y) => x.wrapping_rem(div_guard(y))}
math_instruction! {lneg, Long (x) => x.wrapping_neg()}
math_instruction! {land, Long (x, y) => x & y}
math_instruction! {lor, Long (x, y) => x | y}
math_instruction! {lxor, Long (x, y) => x ^ y}

math_instruction! {fadd, Float (x, y) => x + y}
math_instruction! {fsub, Float (x, y) => x - y}
math_instruction! {fmul, Float (x, y) => x * y}
math_instruction! {fdiv, Float (x, y) => x / y}
math_instruction! {frem, Float (x, y) => x % y}
math_instruction! {fneg, Float (x) => -x}

math_instruction! {dadd, Double (x, y) => x + y}
math_instruction! {dsub, Double (x, y) => x - y}
math_instruction! {dmul, Double (x, y) => x * y}
math_instruction! {ddiv, Double (x, y) => x / y}
math_instruction! {drem, Double (x, y) => x % y}
math_instruction! {dneg, Double (x) => -x}

// Long shifts take an int shift distance, so the generic two-operand forms
// above do not apply.

pub fn lshl(frame: &mut Frame) -> Result<(), VmError> {
    let shift = frame.pop_int()?;
    let value = frame.pop_long()?;
    frame.push(JavaValue::Long(value.wrapping_shl(shift as u32 & 0x3F)))
}

pub fn lshr(frame: &mut Frame) -> Result<(), VmError> {
    let shift = frame.pop_int()?;
    let value = frame.pop_long()?;
    frame.push(JavaValue::Long(value.wrapping_shr(shift as u32 & 0x3F)))
}

pub fn lushr(frame: &mut Frame) -> Result<(), VmError> {
    let shift = frame.pop_int()?;
    let value = frame.pop_long()?;
    frame.push(JavaValue::Long(
        ((value as u64) >> (shift as u32 & 0x3F)) as i64,
    ))
}
