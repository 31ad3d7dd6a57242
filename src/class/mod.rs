pub mod attribute;
pub mod code;
pub mod constant;
pub mod descriptor;

use std::cell::Cell;
use std::io::Read;

use crate::class::attribute::{Attribute, CodeAttribute};
use crate::class::constant::{ConstantPool, Expected};
use crate::error::ClassError;
use crate::read::Readable;

const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// Classes whose superclass is `java/lang/Object` terminate the linker's
/// superclass walk.
pub const OBJECT_CLASS: &str = "java/lang/Object";

bitflags! {
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl Method {
    pub fn code(&self) -> Option<&CodeAttribute> {
        Attribute::find_code(&self.attributes)
    }
}

/// A fully decoded and validated class file. Immutable once loaded, except
/// for the initialization mark flipped when `<clinit>` runs.
#[derive(Debug)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
    pub init_done: Cell<bool>,
}

impl ClassFile {
    /// Decode a class file from a byte stream. Structures later in the file
    /// reference earlier ones, so the pool is read and verified first and
    /// everything downstream checks its indices against it. On error the
    /// partial class is dropped.
    pub fn read<T: Read>(buffer: &mut T) -> Result<Self, ClassError> {
        let magic = u32::read(buffer)?;
        if magic != CLASS_MAGIC {
            return Err(ClassError::Magic(magic));
        }

        let minor_version = u16::read(buffer)?;
        let major_version = u16::read(buffer)?;

        let pool = ConstantPool::read(buffer)?;
        pool.verify()?;

        let access_flags = AccessFlags::from_bits_truncate(u16::read(buffer)?);

        let this_class = u16::read(buffer)?;
        pool.check_index(this_class, Expected::Class)?;
        pool.class_name(this_class)?;

        // Zero only for java/lang/Object itself.
        let super_class = u16::read(buffer)?;
        if super_class != 0 {
            pool.check_index(super_class, Expected::Class)?;
            pool.class_name(super_class)?;
        }

        let interfaces = <Vec<u16>>::read(buffer)?;
        let fields = ClassFile::read_members(buffer, &pool)?;
        let methods = ClassFile::read_members(buffer, &pool)?;
        let attributes = Attribute::read_list(buffer, &pool)?;

        Ok(ClassFile {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
            init_done: Cell::new(false),
        })
    }

    /// Fields and methods share the same record layout.
    fn read_members<T: Read, M: From<MemberInfo>>(
        buffer: &mut T,
        pool: &ConstantPool,
    ) -> Result<Vec<M>, ClassError> {
        let count = u16::read(buffer)?;
        let mut members = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let access_flags = AccessFlags::from_bits_truncate(u16::read(buffer)?);
            let name_index = u16::read(buffer)?;
            pool.check_index(name_index, Expected::Utf8)?;
            let descriptor_index = u16::read(buffer)?;
            pool.check_descriptor(descriptor_index)?;
            let attributes = Attribute::read_list(buffer, pool)?;

            members.push(M::from(MemberInfo {
                access_flags,
                name_index,
                descriptor_index,
                attributes,
            }));
        }

        Ok(members)
    }

    /// Binary name of this class (`/` as the package separator).
    pub fn name(&self) -> &str {
        // this_class was validated in read(), so resolution cannot fail.
        self.pool.class_name(self.this_class).unwrap_or_default()
    }

    /// Binary name of the superclass, `None` for java/lang/Object.
    pub fn super_name(&self) -> Option<&str> {
        if self.super_class == 0 {
            return None;
        }
        self.pool.class_name(self.super_class).ok()
    }

    /// Whether the superclass chain ends here.
    pub fn is_top_class(&self) -> bool {
        match self.super_name() {
            Some(name) => name == OBJECT_CLASS,
            None => true,
        }
    }

    /// Look up a method by exact name and descriptor.
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods.iter().find(|m| {
            self.pool.utf8(m.name_index).map_or(false, |n| n == name)
                && self
                    .pool
                    .utf8(m.descriptor_index)
                    .map_or(false, |d| d == descriptor)
        })
    }

    /// Look up a field by name (any descriptor).
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| self.pool.utf8(f.name_index).map_or(false, |n| n == name))
    }
}

struct MemberInfo {
    access_flags: AccessFlags,
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<Attribute>,
}

impl From<MemberInfo> for Field {
    fn from(info: MemberInfo) -> Self {
        Field {
            access_flags: info.access_flags,
            name_index: info.name_index,
            descriptor_index: info.descriptor_index,
            attributes: info.attributes,
        }
    }
}

impl From<MemberInfo> for Method {
    fn from(info: MemberInfo) -> Self {
        Method {
            access_flags: info.access_flags,
            name_index: info.name_index,
            descriptor_index: info.descriptor_index,
            attributes: info.attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assembled class equivalent to `class Empty {}` with no members.
    pub fn empty_class_bytes(name: &str) -> Vec<u8> {
        let mut bytes = CLASS_MAGIC.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 52]); // minor 0, major 52

        // pool: Utf8 name, Class(1), Utf8 "java/lang/Object", Class(3)
        bytes.extend_from_slice(&5u16.to_be_bytes());
        bytes.push(1);
        bytes.extend_from_slice(&(name.len() as u16).to_be_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&[7, 0, 1]);
        bytes.push(1);
        bytes.extend_from_slice(&(OBJECT_CLASS.len() as u16).to_be_bytes());
        bytes.extend_from_slice(OBJECT_CLASS.as_bytes());
        bytes.extend_from_slice(&[7, 0, 3]);

        bytes.extend_from_slice(&0x0021u16.to_be_bytes()); // public super
        bytes.extend_from_slice(&2u16.to_be_bytes()); // this_class
        bytes.extend_from_slice(&4u16.to_be_bytes()); // super_class
        bytes.extend_from_slice(&[0, 0]); // interfaces
        bytes.extend_from_slice(&[0, 0]); // fields
        bytes.extend_from_slice(&[0, 0]); // methods
        bytes.extend_from_slice(&[0, 0]); // attributes
        bytes
    }

    #[test]
    fn decodes_minimal_class() {
        let bytes = empty_class_bytes("Empty");
        let class = ClassFile::read(&mut std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(class.name(), "Empty");
        assert_eq!(class.super_name(), Some(OBJECT_CLASS));
        assert!(class.is_top_class());
        assert_eq!(class.major_version, 52);
        assert!(!class.init_done.get());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = empty_class_bytes("Empty");
        bytes[0] = 0xDE;
        bytes[1] = 0xAD;
        assert!(matches!(
            ClassFile::read(&mut std::io::Cursor::new(&bytes)),
            Err(ClassError::Magic(_))
        ));
    }

    #[test]
    fn rejects_truncated_file() {
        let bytes = empty_class_bytes("Empty");
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            ClassFile::read(&mut std::io::Cursor::new(truncated)),
            Err(ClassError::Eof)
        ));
    }

    #[test]
    fn rejects_this_class_of_wrong_tag() {
        let mut bytes = empty_class_bytes("Empty");
        // this_class sits 12 bytes from the end; point it at the Utf8 in
        // slot 1 instead of the Class in slot 2.
        let at = bytes.len() - 12;
        bytes[at] = 0;
        bytes[at + 1] = 1;
        assert!(matches!(
            ClassFile::read(&mut std::io::Cursor::new(&bytes)),
            Err(ClassError::Constant(1))
        ));
    }

    #[test]
    fn zero_pool_count_cannot_name_a_class() {
        // With no pool slots, this_class has nothing valid to point at.
        let mut bytes = CLASS_MAGIC.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 52]);
        bytes.extend_from_slice(&0u16.to_be_bytes()); // constant_pool_count
        bytes.extend_from_slice(&0x0021u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes()); // this_class
        bytes.extend_from_slice(&[0; 10]);
        assert!(matches!(
            ClassFile::read(&mut std::io::Cursor::new(&bytes)),
            Err(ClassError::Index(1))
        ));
    }

    #[test]
    fn identical_bytes_decode_identically() {
        let bytes = empty_class_bytes("Stable");
        let first = ClassFile::read(&mut std::io::Cursor::new(&bytes)).unwrap();
        let second = ClassFile::read(&mut std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(first.name(), second.name());
        assert_eq!(first.pool.count(), second.pool.count());
        assert_eq!(first.access_flags, second.access_flags);
        assert_eq!(first.methods.len(), second.methods.len());
    }
}
