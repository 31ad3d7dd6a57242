//! Array creation, element access and length. Null dereference, index out
//! of range and negative sizes abort the process; the exception objects
//! those conditions would raise on a full VM do not exist here.

use num_traits::FromPrimitive;

use crate::class::ClassFile;
use crate::error::VmError;
use crate::instruction::TypeCode;
use crate::jvm::frame::Frame;
use crate::jvm::mem::{array_new, ArrayKind, Heap, HeapData, HeapRef, JavaValue};

fn expect_array(frame: &mut Frame) -> Result<HeapRef, VmError> {
    match frame.pop_reference()? {
        Some(reference) => Ok(reference),
        None => panic!("null pointer dereference"),
    }
}

fn bounds(index: i32, len: usize) -> usize {
    if index < 0 || index as usize >= len {
        panic!("array index out of bounds: index {} length {}", index, len);
    }
    index as usize
}

macro_rules! array_load {
    ($name:ident, $payload:ident, $variant:ident) => {
        pub fn $name(frame: &mut Frame, heap: &Heap) -> Result<(), VmError> {
            let index = frame.pop_int()?;
            let array = expect_array(frame)?;
            match heap.get(array) {
                HeapData::$payload(cells) => {
                    let value = cells[bounds(index, cells.len())];
                    frame.push(JavaValue::$variant(value))
                }
                _ => Err(VmError::OperandType { expected: "array" }),
            }
        }
    };
}

macro_rules! array_store {
    ($name:ident, $payload:ident, $pop:ident) => {
        pub fn $name(frame: &mut Frame, heap: &mut Heap) -> Result<(), VmError> {
            let value = frame.$pop()?;
            let index = frame.pop_int()?;
            let array = expect_array(frame)?;
            match heap.get_mut(array) {
                HeapData::$payload(cells) => {
                    let at = bounds(index, cells.len());
                    cells[at] = value;
                    Ok(())
                }
                _ => Err(VmError::OperandType { expected: "array" }),
            }
        }
    };
}

// byte, char, short and boolean arrays share the 32-bit cells, so baload,
// caload and saload dispatch to iaload (and likewise for the stores).
array_load! {iaload, ArrayI32, Int}
array_load! {laload, ArrayI64, Long}
array_load! {faload, ArrayF32, Float}
array_load! {daload, ArrayF64, Double}
array_store! {iastore, ArrayI32, pop_int}
array_store! {lastore, ArrayI64, pop_long}
array_store! {fastore, ArrayF32, pop_float}
array_store! {dastore, ArrayF64, pop_double}

pub fn aaload(frame: &mut Frame, heap: &Heap) -> Result<(), VmError> {
    let index = frame.pop_int()?;
    let array = expect_array(frame)?;
    match heap.get(array) {
        HeapData::ArrayRef(cells) => {
            let value = cells[bounds(index, cells.len())];
            frame.push(JavaValue::Reference(value))
        }
        _ => Err(VmError::OperandType { expected: "array" }),
    }
}

pub fn aastore(frame: &mut Frame, heap: &mut Heap) -> Result<(), VmError> {
    let value = frame.pop_reference()?;
    let index = frame.pop_int()?;
    let array = expect_array(frame)?;
    match heap.get_mut(array) {
        HeapData::ArrayRef(cells) => {
            let at = bounds(index, cells.len());
            cells[at] = value;
            Ok(())
        }
        _ => Err(VmError::OperandType { expected: "array" }),
    }
}

pub fn arraylength(frame: &mut Frame, heap: &Heap) -> Result<(), VmError> {
    let array = expect_array(frame)?;
    let len = heap.get(array).len();
    frame.push(JavaValue::Int(len as i32))
}

pub fn newarray(frame: &mut Frame, heap: &mut Heap, code: &[u8]) -> Result<(), VmError> {
    let kind = match TypeCode::from_u8(frame.fetch_u8(code)) {
        Some(TypeCode::Long) => ArrayKind::I64,
        Some(TypeCode::Double) => ArrayKind::F64,
        Some(TypeCode::Float) => ArrayKind::F32,
        _ => ArrayKind::I32,
    };

    let len = frame.pop_int()?;
    if len < 0 {
        panic!("negative array size: {}", len);
    }
    let array = array_new(heap, &[len], kind);
    frame.push(JavaValue::Reference(Some(array)))
}

/// Base element kind of an array class name such as `[[I` or
/// `[Ljava/lang/String;`.
fn element_kind(name: &str) -> ArrayKind {
    match name.chars().find(|c| *c != '[') {
        Some('L') => ArrayKind::Ref,
        Some('J') => ArrayKind::I64,
        Some('D') => ArrayKind::F64,
        Some('F') => ArrayKind::F32,
        _ => ArrayKind::I32,
    }
}

pub fn multianewarray(
    frame: &mut Frame,
    class: &ClassFile,
    heap: &mut Heap,
    code: &[u8],
) -> Result<(), VmError> {
    let index = frame.fetch_u16(code);
    let dimension = frame.fetch_u8(code) as usize;
    let kind = element_kind(class.pool.class_name(index).unwrap_or_default());

    // The outermost dimension was pushed first, so it is popped last.
    let mut sizes = vec![0i32; dimension];
    for i in 0..dimension {
        let size = frame.pop_int()?;
        if size < 0 {
            panic!("negative array size: {}", size);
        }
        sizes[dimension - i - 1] = size;
    }

    let array = array_new(heap, &sizes, kind);
    frame.push(JavaValue::Reference(Some(array)))
}
