use std::io::Read;

use crate::class::code::validate_code;
use crate::class::constant::{ConstantPool, Expected};
use crate::error::ClassError;
use crate::read::Readable;

/// An attribute dispatched on its name. Names outside the recognized set are
/// kept as `Unknown` with their contents skipped.
#[derive(Debug, Clone)]
pub enum Attribute {
    ConstantValue {
        constant_index: u16,
    },
    Code(CodeAttribute),
    Deprecated,
    Exceptions {
        exception_index_table: Vec<u16>,
    },
    InnerClasses(Vec<InnerClass>),
    SourceFile {
        sourcefile_index: u16,
    },
    Synthetic,
    LineNumberTable(Vec<LineNumber>),
    LocalVariableTable(Vec<LocalVariable>),
    Unknown {
        name: String,
    },
}

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    /// Maximum depth of the operand stack at any point during execution.
    pub max_stack: u16,
    /// Number of local variable slots, parameters included.
    pub max_locals: u16,
    /// The raw instruction bytes, already shape-validated.
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes: Vec<Attribute>,
}

/// One try/catch range. `start_pc` is inclusive, `end_pc` exclusive.
#[derive(Debug, Copy, Clone)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl Readable for ExceptionEntry {
    fn read<T: Read>(buffer: &mut T) -> std::io::Result<Self> {
        Ok(ExceptionEntry {
            start_pc: u16::read(buffer)?,
            end_pc: u16::read(buffer)?,
            handler_pc: u16::read(buffer)?,
            catch_type: u16::read(buffer)?,
        })
    }
}

#[derive(Debug, Copy, Clone)]
pub struct InnerClass {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: u16,
}

#[derive(Debug, Copy, Clone)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

impl Readable for LineNumber {
    fn read<T: Read>(buffer: &mut T) -> std::io::Result<Self> {
        Ok(LineNumber {
            start_pc: u16::read(buffer)?,
            line_number: u16::read(buffer)?,
        })
    }
}

#[derive(Debug, Copy, Clone)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

impl Attribute {
    /// Read one attribute, dispatching on its name resolved through the pool.
    fn read<T: Read>(buffer: &mut T, pool: &ConstantPool) -> Result<Self, ClassError> {
        let name_index = u16::read(buffer)?;
        pool.check_index(name_index, Expected::Utf8)?;
        let length = u32::read(buffer)?;

        Ok(match pool.utf8(name_index)? {
            "ConstantValue" => {
                let constant_index = u16::read(buffer)?;
                pool.check_index(constant_index, Expected::Loadable)?;
                Attribute::ConstantValue { constant_index }
            }
            "Code" => Attribute::Code(CodeAttribute::read(buffer, pool)?),
            "Deprecated" => Attribute::Deprecated,
            "Exceptions" => Attribute::Exceptions {
                exception_index_table: <Vec<u16>>::read(buffer)?,
            },
            "InnerClasses" => {
                let count = u16::read(buffer)?;
                let mut classes = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    classes.push(InnerClass::read(buffer, pool)?);
                }
                Attribute::InnerClasses(classes)
            }
            "SourceFile" => {
                let sourcefile_index = u16::read(buffer)?;
                pool.check_index(sourcefile_index, Expected::Utf8)?;
                Attribute::SourceFile { sourcefile_index }
            }
            "Synthetic" => Attribute::Synthetic,
            "LineNumberTable" => Attribute::LineNumberTable(<Vec<LineNumber>>::read(buffer)?),
            "LocalVariableTable" => {
                let count = u16::read(buffer)?;
                let mut table = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    table.push(LocalVariable::read(buffer, pool)?);
                }
                Attribute::LocalVariableTable(table)
            }
            name => {
                let name = name.to_string();
                skip(buffer, length as usize)?;
                Attribute::Unknown { name }
            }
        })
    }

    /// Read a u16-counted attribute list.
    pub fn read_list<T: Read>(
        buffer: &mut T,
        pool: &ConstantPool,
    ) -> Result<Vec<Attribute>, ClassError> {
        let count = u16::read(buffer)?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            attributes.push(Attribute::read(buffer, pool)?);
        }
        Ok(attributes)
    }

    /// Find the first `Code` attribute in a list.
    pub fn find_code(attributes: &[Attribute]) -> Option<&CodeAttribute> {
        attributes.iter().find_map(|attr| match attr {
            Attribute::Code(code) => Some(code),
            _ => None,
        })
    }

    /// Find the first `ConstantValue` attribute in a list.
    pub fn find_constant_value(attributes: &[Attribute]) -> Option<u16> {
        attributes.iter().find_map(|attr| match attr {
            Attribute::ConstantValue { constant_index } => Some(*constant_index),
            _ => None,
        })
    }
}

impl CodeAttribute {
    fn read<T: Read>(buffer: &mut T, pool: &ConstantPool) -> Result<Self, ClassError> {
        let max_stack = u16::read(buffer)?;
        let max_locals = u16::read(buffer)?;

        let code_length = u32::read(buffer)?;
        let mut code = vec![0u8; code_length as usize];
        buffer.read_exact(&mut code)?;
        validate_code(&code, pool)?;

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table: <Vec<ExceptionEntry>>::read(buffer)?,
            attributes: Attribute::read_list(buffer, pool)?,
        })
    }
}

impl InnerClass {
    fn read<T: Read>(buffer: &mut T, pool: &ConstantPool) -> Result<Self, ClassError> {
        let inner_class_info_index = u16::read(buffer)?;
        pool.check_index(inner_class_info_index, Expected::Class)?;

        // The outer class and inner name are zero for anonymous classes.
        let outer_class_info_index = u16::read(buffer)?;
        if outer_class_info_index != 0 {
            pool.check_index(outer_class_info_index, Expected::Class)?;
        }
        let inner_name_index = u16::read(buffer)?;
        if inner_name_index != 0 {
            pool.check_index(inner_name_index, Expected::Utf8)?;
        }

        Ok(InnerClass {
            inner_class_info_index,
            outer_class_info_index,
            inner_name_index,
            inner_class_access_flags: u16::read(buffer)?,
        })
    }
}

impl LocalVariable {
    fn read<T: Read>(buffer: &mut T, pool: &ConstantPool) -> Result<Self, ClassError> {
        let start_pc = u16::read(buffer)?;
        let length = u16::read(buffer)?;
        let name_index = u16::read(buffer)?;
        pool.check_index(name_index, Expected::Utf8)?;
        let descriptor_index = u16::read(buffer)?;
        pool.check_descriptor(descriptor_index)?;

        Ok(LocalVariable {
            start_pc,
            length,
            name_index,
            descriptor_index,
            index: u16::read(buffer)?,
        })
    }
}

fn skip<T: Read>(buffer: &mut T, mut remaining: usize) -> Result<(), ClassError> {
    let mut chunk = [0u8; 64];
    while remaining > 0 {
        let step = remaining.min(chunk.len());
        buffer.read_exact(&mut chunk[..step])?;
        remaining -= step;
    }
    Ok(())
}
