//! The native bridge: the three host-provided classes and the handful of
//! methods the core consults before falling back to loaded bytecode.
//! Stream writes go straight to the host handles, flushed per call.

use std::io::{self, Write};

use crate::error::VmError;
use crate::jvm::frame::Frame;
use crate::jvm::mem::{Heap, HeapData, HostStream, JavaValue};

/// Classes resolved by the host instead of the class path.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JavaClass {
    System,
    String,
    PrintStream,
}

pub fn java_class(name: &str) -> Option<JavaClass> {
    match name {
        "java/lang/System" => Some(JavaClass::System),
        "java/lang/String" => Some(JavaClass::String),
        "java/io/PrintStream" => Some(JavaClass::PrintStream),
        _ => None,
    }
}

/// Static field reads on host classes: `System.out`, `System.err` and
/// `System.in` resolve to heap entries wrapping the host streams.
pub fn static_field(
    heap: &mut Heap,
    class: JavaClass,
    name: &str,
    descriptor: &str,
) -> Option<JavaValue> {
    if class != JavaClass::System {
        return None;
    }

    let stream = match (name, descriptor) {
        ("out", "Ljava/io/PrintStream;") => HostStream::Stdout,
        ("err", "Ljava/io/PrintStream;") => HostStream::Stderr,
        ("in", _) => HostStream::Stdin,
        _ => return None,
    };

    let entry = heap.alloc(HeapData::HostStream(stream));
    Some(JavaValue::Reference(Some(entry)))
}

/// Method calls on host classes. The bridge manipulates the caller's operand
/// stack directly, so the frame arrives before any argument popping.
pub fn call_method(
    frame: &mut Frame,
    heap: &mut Heap,
    class: JavaClass,
    name: &str,
    descriptor: &str,
) -> Result<(), VmError> {
    match (class, name) {
        (JavaClass::PrintStream, "println") => print_stream(frame, heap, descriptor, true),
        (JavaClass::PrintStream, "print") => print_stream(frame, heap, descriptor, false),
        (JavaClass::String, "charAt") => char_at(frame, heap),
        (JavaClass::String, "length") => length(frame, heap),
        _ => Err(VmError::MethodNotFound {
            class: format!("{:?}", class),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }),
    }
}

fn pop_stream(frame: &mut Frame, heap: &Heap) -> Result<HostStream, VmError> {
    let reference = frame.pop_reference()?.ok_or(VmError::OperandType {
        expected: "stream reference",
    })?;
    match heap.get(reference) {
        HeapData::HostStream(stream) => Ok(*stream),
        _ => Err(VmError::OperandType {
            expected: "stream reference",
        }),
    }
}

/// Render the single argument according to the call descriptor. Booleans
/// print as their int value and chars as the character, following the host
/// printf formats of the original bridge.
fn format_value(heap: &Heap, descriptor: &str, value: JavaValue) -> String {
    match (descriptor, value) {
        ("(Ljava/lang/String;)V", JavaValue::Reference(Some(r))) => match heap.get(r) {
            HeapData::Str(text) => text.clone(),
            other => format!("{:?}", other),
        },
        ("(Ljava/lang/String;)V", JavaValue::Reference(None)) => "null".to_string(),
        ("(C)V", JavaValue::Int(v)) => {
            char::from_u32(v as u32).unwrap_or('\u{FFFD}').to_string()
        }
        ("(J)V", JavaValue::Long(v)) => v.to_string(),
        ("(F)V", JavaValue::Float(v)) => v.to_string(),
        ("(D)V", JavaValue::Double(v)) => v.to_string(),
        // (B)V, (S)V, (I)V and (Z)V all print the int payload.
        (_, JavaValue::Int(v)) => v.to_string(),
        (_, v) => format!("{:?}", v),
    }
}

fn write_text(stream: HostStream, text: &str) {
    match stream {
        HostStream::Stdout => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(text.as_bytes()).ok();
            lock.flush().ok();
        }
        HostStream::Stderr => {
            let stderr = io::stderr();
            let mut lock = stderr.lock();
            lock.write_all(text.as_bytes()).ok();
            lock.flush().ok();
        }
        HostStream::Stdin => {}
    }
}

fn print_stream(
    frame: &mut Frame,
    heap: &mut Heap,
    descriptor: &str,
    newline: bool,
) -> Result<(), VmError> {
    let text = if descriptor == "()V" {
        String::new()
    } else {
        let value = frame.pop()?;
        format_value(heap, descriptor, value)
    };
    let stream = pop_stream(frame, heap)?;

    if newline {
        write_text(stream, &format!("{}\n", text));
    } else {
        write_text(stream, &text);
    }
    Ok(())
}

/// `String.charAt(I)C`, indexed by byte as in the original bridge.
fn char_at(frame: &mut Frame, heap: &Heap) -> Result<(), VmError> {
    let index = frame.pop_int()?;
    let receiver = frame.pop_reference()?.ok_or(VmError::OperandType {
        expected: "string reference",
    })?;
    match heap.get(receiver) {
        HeapData::Str(text) => {
            let byte = text.as_bytes()[index as usize];
            frame.push(JavaValue::Int(byte as i32))
        }
        _ => Err(VmError::OperandType {
            expected: "string reference",
        }),
    }
}

fn length(frame: &mut Frame, heap: &Heap) -> Result<(), VmError> {
    let receiver = frame.pop_reference()?.ok_or(VmError::OperandType {
        expected: "string reference",
    })?;
    match heap.get(receiver) {
        HeapData::Str(text) => frame.push(JavaValue::Int(text.len() as i32)),
        _ => Err(VmError::OperandType {
            expected: "string reference",
        }),
    }
}
