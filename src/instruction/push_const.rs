//! Constant pushes. `bipush` sign-extends its byte, `sipush` its short. The
//! `ldc` family resolves a pool entry; string entries allocate a heap object
//! over the pool's text.

use crate::class::constant::Constant;
use crate::class::ClassFile;
use crate::error::VmError;
use crate::jvm::frame::Frame;
use crate::jvm::mem::{Heap, HeapData, JavaValue};

pub fn aconst_null(frame: &mut Frame) -> Result<(), VmError> {
    frame.push(JavaValue::Reference(None))
}

pub fn iconst(frame: &mut Frame, value: i32) -> Result<(), VmError> {
    frame.push(JavaValue::Int(value))
}

pub fn lconst(frame: &mut Frame, value: i64) -> Result<(), VmError> {
    frame.push(JavaValue::Long(value))
}

pub fn fconst(frame: &mut Frame, value: f32) -> Result<(), VmError> {
    frame.push(JavaValue::Float(value))
}

pub fn dconst(frame: &mut Frame, value: f64) -> Result<(), VmError> {
    frame.push(JavaValue::Double(value))
}

pub fn bipush(frame: &mut Frame, code: &[u8]) -> Result<(), VmError> {
    let value = frame.fetch_u8(code) as i8 as i32;
    frame.push(JavaValue::Int(value))
}

pub fn sipush(frame: &mut Frame, code: &[u8]) -> Result<(), VmError> {
    let value = frame.fetch_i16(code) as i32;
    frame.push(JavaValue::Int(value))
}

/// Resolve a loadable pool entry to a runtime value. The load-time check
/// restricted the index to the loadable tags, so anything else defaults to
/// an int zero.
pub(crate) fn resolve_constant(class: &ClassFile, heap: &mut Heap, index: u16) -> JavaValue {
    match class.pool.get(index) {
        Ok(Constant::Int(v)) => JavaValue::Int(*v),
        Ok(Constant::Float(v)) => JavaValue::Float(*v),
        Ok(Constant::Long(v)) => JavaValue::Long(*v),
        Ok(Constant::Double(v)) => JavaValue::Double(*v),
        Ok(Constant::String { .. }) => {
            let text = class.pool.string(index).unwrap_or_default().to_string();
            JavaValue::Reference(Some(heap.alloc(HeapData::Str(text))))
        }
        _ => JavaValue::Int(0),
    }
}

pub fn ldc(
    frame: &mut Frame,
    class: &ClassFile,
    heap: &mut Heap,
    code: &[u8],
) -> Result<(), VmError> {
    let index = frame.fetch_u8(code) as u16;
    let value = resolve_constant(class, heap, index);
    frame.push(value)
}

/// `ldc_w` and `ldc2_w` share the wide-index form; the load-time tag check
/// is what distinguishes one-word from two-word entries.
pub fn ldc_w(
    frame: &mut Frame,
    class: &ClassFile,
    heap: &mut Heap,
    code: &[u8],
) -> Result<(), VmError> {
    let index = frame.fetch_u16(code);
    let value = resolve_constant(class, heap, index);
    frame.push(value)
}
