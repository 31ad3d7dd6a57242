use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

/// Errors produced while decoding a single class file. Each variant maps to
/// one structural rule of the format; the decoder aborts the file on the
/// first violation and the partially built class is dropped.
#[derive(Debug)]
pub enum ClassError {
    /// Underlying read failure before end of stream.
    Read(io::Error),
    /// Unexpected end of stream.
    Eof,
    /// First four bytes were not 0xCAFEBABE.
    Magic(u32),
    /// Unknown constant pool tag.
    Tag(u8),
    /// Index to constant pool out of bounds (or zero where not allowed).
    Index(u16),
    /// Reference to an entry of the wrong type on the constant pool.
    Constant(u16),
    /// Malformed field or method descriptor string.
    Descriptor(String),
    /// Method handle reference kind outside 1..=9.
    Kind(u8),
    /// Code does not follow the jvm code constraints.
    Code,
    /// invokestatic targeting `<init>` or `<clinit>`.
    Method,
}

impl Display for ClassError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClassError::Read(e) => write!(f, "could not read file: {}", e),
            ClassError::Eof => write!(f, "unexpected end of file"),
            ClassError::Magic(found) => {
                write!(f, "invalid magic number (found {:#010x})", found)
            }
            ClassError::Tag(tag) => write!(f, "unknown constant pool tag {}", tag),
            ClassError::Index(index) => {
                write!(f, "index {} to constant pool out of bounds", index)
            }
            ClassError::Constant(index) => write!(
                f,
                "reference to entry {} of wrong type on constant pool",
                index
            ),
            ClassError::Descriptor(text) => write!(f, "invalid descriptor string {:?}", text),
            ClassError::Kind(kind) => {
                write!(f, "invalid method handle reference kind {}", kind)
            }
            ClassError::Code => write!(f, "code does not follow jvm code constraints"),
            ClassError::Method => write!(f, "invalid method name"),
        }
    }
}

impl Error for ClassError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClassError::Read(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClassError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => ClassError::Eof,
            _ => ClassError::Read(e),
        }
    }
}

/// Fatal conditions raised while linking or executing. The launcher reports
/// these as `java: message` and exits nonzero; there is no Java-level
/// exception dispatch to recover them.
#[derive(Debug)]
pub enum VmError {
    /// No search root contained `name.class`.
    ClassNotFound(String),
    /// The class file was found but did not decode.
    LoadError { name: String, source: ClassError },
    /// The decoded `this_class` name differs from the requested name.
    NameMismatch { expected: String, found: String },
    /// The new class already appears in its own superclass chain.
    Circularity(String),
    /// No method matched the name/descriptor (or the required access flags).
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },
    /// A concrete method had no Code attribute.
    MissingCode { class: String, name: String },
    /// Reached an opcode outside the implemented subset.
    Unimplemented(u8),
    /// Operand stack misuse: pop on empty or push past max_stack.
    StackUnderflow,
    StackOverflow,
    /// An operand had the wrong value type for the instruction.
    OperandType { expected: &'static str },
    /// A symbolic field reference did not resolve to anything usable.
    UnresolvedField { class: String, name: String },
    /// A pool entry failed to resolve at execution time.
    Resolve(ClassError),
}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            VmError::ClassNotFound(name) => write!(f, "could not find class {}", name),
            VmError::LoadError { name, source } => {
                write!(f, "could not load class {}: {}", name, source)
            }
            VmError::NameMismatch { expected, found } => write!(
                f,
                "class file defines {} but {} was requested",
                found, expected
            ),
            VmError::Circularity(name) => write!(f, "class circularity error: {}", name),
            VmError::MethodNotFound {
                class,
                name,
                descriptor,
            } => write!(f, "could not find method {}.{} {}", class, name, descriptor),
            VmError::MissingCode { class, name } => {
                write!(f, "could not find code for method {}.{}", class, name)
            }
            VmError::Unimplemented(op) => {
                write!(f, "instruction {:#04x} not implemented (yet)", op)
            }
            VmError::StackUnderflow => write!(f, "operand stack underflow"),
            VmError::StackOverflow => write!(f, "operand stack overflow"),
            VmError::OperandType { expected } => {
                write!(f, "expected {} on operand stack", expected)
            }
            VmError::UnresolvedField { class, name } => {
                write!(f, "could not resolve field {}.{}", class, name)
            }
            VmError::Resolve(e) => write!(f, "could not resolve constant: {}", e),
        }
    }
}

impl Error for VmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VmError::LoadError { source, .. } => Some(source),
            VmError::Resolve(source) => Some(source),
            _ => None,
        }
    }
}
