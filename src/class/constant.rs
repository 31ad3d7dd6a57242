use std::io::Read;

use num_traits::FromPrimitive;

use crate::class::descriptor::FieldDescriptor;
use crate::error::ClassError;
use crate::read::{double_from_words, long_from_words, Readable};

/// Constant pool tag bytes as they appear on the wire.
mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const INVOKE_DYNAMIC: u8 = 18;
}

/// Variant tag on a `MethodHandle` constant.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: ReferenceKind,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },

    // Due to a poor choice in the JVM specification, 8 byte constants take up
    // two indexing slots. The slot after a Long or Double holds this and can
    // never be referenced.
    Placeholder,
}

impl Constant {
    fn read<T: Read>(buffer: &mut T) -> Result<Self, ClassError> {
        Ok(match u8::read(buffer)? {
            tag::UTF8 => {
                let length = u16::read(buffer)?;
                let mut bytes = vec![0u8; length as usize];
                buffer.read_exact(&mut bytes)?;
                Constant::Utf8(String::from_utf8_lossy(&bytes).into_owned())
            }
            tag::INTEGER => Constant::Int(i32::read(buffer)?),
            tag::FLOAT => Constant::Float(f32::read(buffer)?),
            tag::LONG => {
                let high_bytes = u32::read(buffer)?;
                let low_bytes = u32::read(buffer)?;
                Constant::Long(long_from_words(high_bytes, low_bytes))
            }
            tag::DOUBLE => {
                let high_bytes = u32::read(buffer)?;
                let low_bytes = u32::read(buffer)?;
                Constant::Double(double_from_words(high_bytes, low_bytes))
            }
            tag::CLASS => Constant::Class {
                name_index: u16::read(buffer)?,
            },
            tag::STRING => Constant::String {
                string_index: u16::read(buffer)?,
            },
            tag::FIELD_REF => Constant::FieldRef {
                class_index: u16::read(buffer)?,
                name_and_type_index: u16::read(buffer)?,
            },
            tag::METHOD_REF => Constant::MethodRef {
                class_index: u16::read(buffer)?,
                name_and_type_index: u16::read(buffer)?,
            },
            tag::INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                class_index: u16::read(buffer)?,
                name_and_type_index: u16::read(buffer)?,
            },
            tag::NAME_AND_TYPE => Constant::NameAndType {
                name_index: u16::read(buffer)?,
                descriptor_index: u16::read(buffer)?,
            },
            tag::METHOD_HANDLE => {
                let kind = u8::read(buffer)?;
                Constant::MethodHandle {
                    reference_kind: ReferenceKind::from_u8(kind)
                        .ok_or(ClassError::Kind(kind))?,
                    reference_index: u16::read(buffer)?,
                }
            }
            tag::METHOD_TYPE => Constant::MethodType {
                descriptor_index: u16::read(buffer)?,
            },
            tag::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method_attr_index: u16::read(buffer)?,
                name_and_type_index: u16::read(buffer)?,
            },
            x => return Err(ClassError::Tag(x)),
        })
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// What a pool index is expected to point at. `Loadable` covers the entries
/// a `ConstantValue` attribute may name; `SingleWord` and `DoubleWord` the
/// entries `ldc`/`ldc_w` and `ldc2_w` may name.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Expected {
    Utf8,
    Class,
    NameAndType,
    FieldRef,
    MethodRef,
    InterfaceMethodRef,
    Loadable,
    SingleWord,
    DoubleWord,
}

/// The constant pool of one class. Entries are 1-indexed on the wire; slot 0
/// is materialized as a placeholder so wire indices map directly.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Pass A of the pool decode: read `count - 1` indexing slots worth of
    /// entries by tag, inserting the dead slot after each `Long`/`Double`.
    /// Cross-references are not validated here; `verify` runs once the whole
    /// pool is in memory, since entries may reference forward.
    pub fn read<T: Read>(buffer: &mut T) -> Result<Self, ClassError> {
        let count = u16::read(buffer)?;
        let mut entries = Vec::with_capacity(count as usize);

        if count > 0 {
            entries.push(Constant::Placeholder);
        }
        while (entries.len() as u16) < count {
            let entry = Constant::read(buffer)?;
            trace!("\t{}/{}: {:?}", entries.len(), count, &entry);
            let wide = entry.is_wide();
            entries.push(entry);
            if wide && (entries.len() as u16) < count {
                entries.push(Constant::Placeholder);
            }
        }

        Ok(ConstantPool { entries })
    }

    /// Pass B: every index stored inside a pool entry must resolve to an
    /// entry of the expected tag, and every descriptor index must point to a
    /// well-formed descriptor string.
    pub fn verify(&self) -> Result<(), ClassError> {
        for entry in &self.entries {
            match *entry {
                Constant::String { string_index } => {
                    self.check_index(string_index, Expected::Utf8)?;
                }
                Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                } => {
                    self.check_index(class_index, Expected::Class)?;
                    self.check_index(name_and_type_index, Expected::NameAndType)?;
                }
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    self.check_index(name_index, Expected::Utf8)?;
                    self.check_descriptor(descriptor_index)?;
                }
                Constant::MethodHandle {
                    reference_kind,
                    reference_index,
                } => {
                    use ReferenceKind::*;
                    match reference_kind {
                        GetField | GetStatic | PutField | PutStatic => {
                            self.check_index(reference_index, Expected::FieldRef)?
                        }
                        InvokeVirtual | NewInvokeSpecial => {
                            self.check_index(reference_index, Expected::MethodRef)?
                        }
                        // Depends on the class file version; interface method
                        // refs became acceptable in 52.0. Left unchecked.
                        InvokeStatic | InvokeSpecial => {}
                        InvokeInterface => {
                            self.check_index(reference_index, Expected::InterfaceMethodRef)?
                        }
                    }
                }
                Constant::MethodType { descriptor_index } => {
                    self.check_descriptor(descriptor_index)?;
                }
                Constant::InvokeDynamic {
                    name_and_type_index,
                    ..
                } => {
                    self.check_index(name_and_type_index, Expected::NameAndType)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Indexing-slot count, including the reserved slot 0.
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassError> {
        if index < 1 || index >= self.count() {
            return Err(ClassError::Index(index));
        }
        Ok(&self.entries[index as usize])
    }

    /// Check that `index` is in range and points at an entry of the expected
    /// tag.
    pub fn check_index(&self, index: u16, expected: Expected) -> Result<(), ClassError> {
        let entry = self.get(index)?;
        let ok = match expected {
            Expected::Utf8 => matches!(entry, Constant::Utf8(_)),
            Expected::Class => matches!(entry, Constant::Class { .. }),
            Expected::NameAndType => matches!(entry, Constant::NameAndType { .. }),
            Expected::FieldRef => matches!(entry, Constant::FieldRef { .. }),
            Expected::MethodRef => matches!(entry, Constant::MethodRef { .. }),
            Expected::InterfaceMethodRef => {
                matches!(entry, Constant::InterfaceMethodRef { .. })
            }
            Expected::Loadable => matches!(
                entry,
                Constant::Int(_)
                    | Constant::Float(_)
                    | Constant::Long(_)
                    | Constant::Double(_)
                    | Constant::String { .. }
            ),
            Expected::SingleWord => matches!(
                entry,
                Constant::Int(_) | Constant::Float(_) | Constant::String { .. }
            ),
            Expected::DoubleWord => matches!(entry, Constant::Long(_) | Constant::Double(_)),
        };

        if ok {
            Ok(())
        } else {
            Err(ClassError::Constant(index))
        }
    }

    /// Check that `index` points at a well-formed descriptor string.
    pub fn check_descriptor(&self, index: u16) -> Result<(), ClassError> {
        let text = self.utf8(index)?;
        FieldDescriptor::read_str(text)?;
        Ok(())
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassError> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(ClassError::Constant(index)),
        }
    }

    /// Class name behind a `Class` entry.
    pub fn class_name(&self, index: u16) -> Result<&str, ClassError> {
        match *self.get(index)? {
            Constant::Class { name_index } => self.utf8(name_index),
            _ => Err(ClassError::Constant(index)),
        }
    }

    /// String literal behind a `String` entry.
    pub fn string(&self, index: u16) -> Result<&str, ClassError> {
        match *self.get(index)? {
            Constant::String { string_index } => self.utf8(string_index),
            _ => Err(ClassError::Constant(index)),
        }
    }

    /// `(name, descriptor)` behind a `NameAndType` entry.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassError> {
        match *self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(name_index)?, self.utf8(descriptor_index)?)),
            _ => Err(ClassError::Constant(index)),
        }
    }

    /// `(class name, member name, member descriptor)` behind a field, method
    /// or interface-method reference.
    pub fn member_ref(&self, index: u16) -> Result<(&str, &str, &str), ClassError> {
        match *self.get(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(name_and_type_index)?;
                Ok((self.class_name(class_index)?, name, descriptor))
            }
            _ => Err(ClassError::Constant(index)),
        }
    }
}
