//! Renders a parsed class the way the `javap` tool does: a declaration
//! header, member listings, and optionally the constant pool, disassembled
//! code and debug tables. Everything here is derived from the parsed model
//! alone; no execution machinery is involved.

use std::io::{self, Write};

use num_traits::FromPrimitive;

use crate::class::attribute::{Attribute, CodeAttribute};
use crate::class::constant::Constant;
use crate::class::descriptor::FieldDescriptor;
use crate::class::{AccessFlags, ClassFile, Field, Method};
use crate::instruction::{Opcode, TypeCode};

/// Which sections to print. `-v` turns everything on.
#[derive(Debug, Default, Copy, Clone)]
pub struct Options {
    /// `-c`: disassembled code.
    pub code: bool,
    /// `-l`: line-number and local-variable tables.
    pub lines: bool,
    /// `-p`: include private members.
    pub private: bool,
    /// `-s`: internal descriptors.
    pub signatures: bool,
    /// `-v`: verbose (implies the others plus pool and metadata).
    pub verbose: bool,
}

impl Options {
    pub fn verbose() -> Self {
        Options {
            code: true,
            lines: true,
            private: true,
            signatures: true,
            verbose: true,
        }
    }
}

pub fn disassemble<W: Write>(out: &mut W, class: &ClassFile, options: &Options) -> io::Result<()> {
    print_source(out, class)?;
    print_header(out, class)?;
    if options.verbose {
        writeln!(out)?;
        print_meta(out, class)?;
        print_pool(out, class)?;
        writeln!(out, "{{")?;
    } else {
        writeln!(out, " {{")?;
    }
    for field in &class.fields {
        print_field(out, class, field, options)?;
    }
    for (index, method) in class.methods.iter().enumerate() {
        print_method(out, class, method, index, options)?;
    }
    writeln!(out, "}}")
}

/// Binary names print with `.` in place of `/`.
fn dotted(name: &str) -> String {
    name.replace('/', ".")
}

fn utf8<'a>(class: &'a ClassFile, index: u16) -> &'a str {
    class.pool.utf8(index).unwrap_or_default()
}

fn class_name<'a>(class: &'a ClassFile, index: u16) -> &'a str {
    class.pool.class_name(index).unwrap_or_default()
}

/// Initializer names get quotes so they read as identifiers.
fn quote_name(name: &str) -> String {
    if name == "<init>" {
        "\"<init>\"".to_string()
    } else {
        name.to_string()
    }
}

fn print_source<W: Write>(out: &mut W, class: &ClassFile) -> io::Result<()> {
    for attribute in &class.attributes {
        if let Attribute::SourceFile { sourcefile_index } = attribute {
            writeln!(out, "Compiled from \"{}\"", utf8(class, *sourcefile_index))?;
        }
    }
    Ok(())
}

fn print_header<W: Write>(out: &mut W, class: &ClassFile) -> io::Result<()> {
    let flags = class.access_flags;
    if flags.contains(AccessFlags::PUBLIC) {
        write!(out, "public ")?;
    }
    if flags.contains(AccessFlags::INTERFACE) {
        write!(out, "interface ")?;
    } else if flags.contains(AccessFlags::ENUM) {
        write!(out, "enum ")?;
    } else {
        if flags.contains(AccessFlags::ABSTRACT) {
            write!(out, "abstract ")?;
        } else if flags.contains(AccessFlags::FINAL) {
            write!(out, "final ")?;
        }
        write!(out, "class ")?;
    }
    write!(out, "{}", dotted(class.name()))?;
    if !class.is_top_class() {
        if let Some(super_name) = class.super_name() {
            write!(out, " extends {}", dotted(super_name))?;
        }
    }
    for (i, interface) in class.interfaces.iter().enumerate() {
        let lead = if i == 0 { " implements " } else { ", " };
        write!(out, "{}{}", lead, dotted(class_name(class, *interface)))?;
    }
    Ok(())
}

fn flag_names(flags: AccessFlags, method: bool) -> String {
    let table: &[(AccessFlags, &str)] = &[
        (AccessFlags::PUBLIC, "ACC_PUBLIC"),
        (AccessFlags::PRIVATE, "ACC_PRIVATE"),
        (AccessFlags::PROTECTED, "ACC_PROTECTED"),
        (AccessFlags::STATIC, "ACC_STATIC"),
        (AccessFlags::FINAL, "ACC_FINAL"),
        // 0x0020 doubles as SUPER on classes and SYNCHRONIZED on methods.
        (
            AccessFlags::SUPER,
            if method { "ACC_SYNCHRONIZED" } else { "ACC_SUPER" },
        ),
        (AccessFlags::VOLATILE, "ACC_VOLATILE"),
        (AccessFlags::TRANSIENT, "ACC_TRANSIENT"),
        (AccessFlags::NATIVE, "ACC_NATIVE"),
        (AccessFlags::INTERFACE, "ACC_INTERFACE"),
        (AccessFlags::ABSTRACT, "ACC_ABSTRACT"),
        (AccessFlags::STRICT, "ACC_STRICT"),
        (AccessFlags::SYNTHETIC, "ACC_SYNTHETIC"),
        (AccessFlags::ANNOTATION, "ACC_ANNOTATION"),
        (AccessFlags::ENUM, "ACC_ENUM"),
    ];

    let names: Vec<&str> = table
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
    names.join(", ")
}

fn print_meta<W: Write>(out: &mut W, class: &ClassFile) -> io::Result<()> {
    writeln!(out, "  minor version: {}", class.minor_version)?;
    writeln!(out, "  major version: {}", class.major_version)?;
    writeln!(
        out,
        "  flags: (0x{:04X}) {}",
        class.access_flags.bits(),
        flag_names(class.access_flags, false)
    )?;
    writeln!(
        out,
        "  this_class: #{:<26}// {}",
        class.this_class,
        class.name()
    )?;
    writeln!(
        out,
        "  super_class: #{:<25}// {}",
        class.super_class,
        class.super_name().unwrap_or("")
    )?;
    writeln!(
        out,
        "  interfaces: {}, fields: {}, methods: {}, attributes: {}",
        class.interfaces.len(),
        class.fields.len(),
        class.methods.len(),
        class.attributes.len()
    )
}

fn pool_entry(class: &ClassFile, index: u16, entry: &Constant) -> (&'static str, String) {
    match *entry {
        Constant::Utf8(ref text) => ("Utf8", text.clone()),
        Constant::Int(v) => ("Integer", v.to_string()),
        Constant::Float(v) => ("Float", format!("{}f", v)),
        Constant::Long(v) => ("Long", format!("{}l", v)),
        Constant::Double(v) => ("Double", format!("{}d", v)),
        Constant::Class { name_index } => (
            "Class",
            format!("#{:<15}// {}", name_index, utf8(class, name_index)),
        ),
        Constant::String { string_index } => (
            "String",
            format!("#{:<15}// {}", string_index, utf8(class, string_index)),
        ),
        Constant::FieldRef {
            class_index,
            name_and_type_index,
        } => (
            "Fieldref",
            member_comment(class, class_index, name_and_type_index),
        ),
        Constant::MethodRef {
            class_index,
            name_and_type_index,
        } => (
            "Methodref",
            member_comment(class, class_index, name_and_type_index),
        ),
        Constant::InterfaceMethodRef {
            class_index,
            name_and_type_index,
        } => (
            "InterfaceMethodref",
            member_comment(class, class_index, name_and_type_index),
        ),
        Constant::NameAndType {
            name_index,
            descriptor_index,
        } => (
            "NameAndType",
            format!(
                "#{}:#{:<12}// {}:{}",
                name_index,
                descriptor_index,
                quote_name(utf8(class, name_index)),
                utf8(class, descriptor_index)
            ),
        ),
        Constant::MethodHandle {
            reference_kind,
            reference_index,
        } => (
            "MethodHandle",
            format!("{}:#{}", reference_kind as u8, reference_index),
        ),
        Constant::MethodType { descriptor_index } => {
            ("MethodType", format!("#{}", descriptor_index))
        }
        Constant::InvokeDynamic {
            bootstrap_method_attr_index,
            name_and_type_index,
        } => (
            "InvokeDynamic",
            format!("#{}:#{}", bootstrap_method_attr_index, name_and_type_index),
        ),
        Constant::Placeholder => ("", String::new()),
    }
}

fn member_comment(class: &ClassFile, class_index: u16, name_and_type_index: u16) -> String {
    let (name, descriptor) = class
        .pool
        .name_and_type(name_and_type_index)
        .unwrap_or(("", ""));
    format!(
        "#{}.#{:<11}// {}.{}:{}",
        class_index,
        name_and_type_index,
        class_name(class, class_index),
        quote_name(name),
        descriptor
    )
}

fn print_pool<W: Write>(out: &mut W, class: &ClassFile) -> io::Result<()> {
    writeln!(out, "Constant pool:")?;
    for index in 1..class.pool.count() {
        let entry = match class.pool.get(index) {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if let Constant::Placeholder = entry {
            continue;
        }
        let (tag, text) = pool_entry(class, index, entry);
        writeln!(
            out,
            "{:>4} {:<21}{}",
            format!("#{}", index),
            format!("= {}", tag),
            text
        )?;
    }
    Ok(())
}

/// A descriptor rendered as Java source, `[I` becoming `int[]`.
fn java_type(descriptor: &FieldDescriptor) -> String {
    match descriptor {
        FieldDescriptor::Byte => "byte".to_string(),
        FieldDescriptor::Char => "char".to_string(),
        FieldDescriptor::Double => "double".to_string(),
        FieldDescriptor::Float => "float".to_string(),
        FieldDescriptor::Int => "int".to_string(),
        FieldDescriptor::Long => "long".to_string(),
        FieldDescriptor::Short => "short".to_string(),
        FieldDescriptor::Boolean => "boolean".to_string(),
        FieldDescriptor::Void => "void".to_string(),
        FieldDescriptor::Object(name) => dotted(name),
        FieldDescriptor::Array(inner) => format!("{}[]", java_type(inner)),
        FieldDescriptor::Method { .. } => String::new(),
    }
}

/// Declaration text plus the argument slot count for `args_size`.
fn declaration(descriptor: &str, name: &str, is_init: bool) -> (String, u16) {
    match FieldDescriptor::read_str(descriptor) {
        Ok(FieldDescriptor::Method { args, returns }) => {
            let rendered: Vec<String> = args.iter().map(java_type).collect();
            let head = if is_init {
                name.to_string()
            } else {
                format!("{} {}", java_type(&returns), name)
            };
            (format!("{}({})", head, rendered.join(", ")), args.len() as u16)
        }
        Ok(field) => (format!("{} {}", java_type(&field), name), 0),
        Err(_) => (format!("{} {}", descriptor, name), 0),
    }
}

fn visibility(flags: AccessFlags) -> &'static str {
    if flags.contains(AccessFlags::PRIVATE) {
        "private "
    } else if flags.contains(AccessFlags::PROTECTED) {
        "protected "
    } else if flags.contains(AccessFlags::PUBLIC) {
        "public "
    } else {
        ""
    }
}

fn print_field<W: Write>(
    out: &mut W,
    class: &ClassFile,
    field: &Field,
    options: &Options,
) -> io::Result<()> {
    if !options.private && field.access_flags.contains(AccessFlags::PRIVATE) {
        return Ok(());
    }

    let mut modifiers = visibility(field.access_flags).to_string();
    for (flag, text) in [
        (AccessFlags::STATIC, "static "),
        (AccessFlags::FINAL, "final "),
        (AccessFlags::TRANSIENT, "transient "),
        (AccessFlags::VOLATILE, "volatile "),
    ] {
        if field.access_flags.contains(flag) {
            modifiers.push_str(text);
        }
    }

    let descriptor = utf8(class, field.descriptor_index);
    let (text, _) = declaration(descriptor, utf8(class, field.name_index), false);
    writeln!(out, "  {}{};", modifiers, text)?;

    if options.signatures {
        writeln!(out, "    descriptor: {}", descriptor)?;
    }
    if options.verbose {
        writeln!(
            out,
            "    flags: (0x{:04X}) {}",
            field.access_flags.bits(),
            flag_names(field.access_flags, false)
        )?;
        if field.access_flags.contains(AccessFlags::STATIC) {
            if let Some(index) = Attribute::find_constant_value(&field.attributes) {
                if let Ok(entry) = class.pool.get(index) {
                    print_constant_value(out, class, index, entry)?;
                }
            }
        }
    }
    if options.lines || options.code {
        writeln!(out)?;
    }
    Ok(())
}

fn print_constant_value<W: Write>(
    out: &mut W,
    class: &ClassFile,
    index: u16,
    entry: &Constant,
) -> io::Result<()> {
    match *entry {
        Constant::Int(v) => writeln!(out, "    ConstantValue: int {}", v),
        Constant::Long(v) => writeln!(out, "    ConstantValue: long {}", v),
        Constant::Float(v) => writeln!(out, "    ConstantValue: float {}", v),
        Constant::Double(v) => writeln!(out, "    ConstantValue: double {}", v),
        Constant::String { .. } => writeln!(
            out,
            "    ConstantValue: String {}",
            class.pool.string(index).unwrap_or_default()
        ),
        _ => Ok(()),
    }
}

fn print_method<W: Write>(
    out: &mut W,
    class: &ClassFile,
    method: &Method,
    index: usize,
    options: &Options,
) -> io::Result<()> {
    if !options.private && method.access_flags.contains(AccessFlags::PRIVATE) {
        return Ok(());
    }
    if index > 0 && (options.lines || options.signatures || options.code) {
        writeln!(out)?;
    }

    let raw_name = utf8(class, method.name_index);
    let is_init = raw_name == "<init>";
    let name = if is_init { class.name() } else { raw_name };

    let mut modifiers = visibility(method.access_flags).to_string();
    for (flag, text) in [
        (AccessFlags::ABSTRACT, "abstract "),
        (AccessFlags::STATIC, "static "),
        (AccessFlags::FINAL, "final "),
        (AccessFlags::NATIVE, "native "),
    ] {
        if method.access_flags.contains(flag) {
            modifiers.push_str(text);
        }
    }

    let descriptor = utf8(class, method.descriptor_index);
    let (text, mut args_size) = declaration(descriptor, name, is_init);
    if !method.access_flags.contains(AccessFlags::STATIC) {
        args_size += 1;
    }
    writeln!(out, "  {}{};", modifiers, text)?;

    if options.signatures {
        writeln!(out, "    descriptor: {}", descriptor)?;
    }
    if options.verbose {
        writeln!(
            out,
            "    flags: (0x{:04X}) {}",
            method.access_flags.bits(),
            flag_names(method.access_flags, true)
        )?;
    }

    if let Some(code) = method.code() {
        if options.code {
            print_code(out, class, code, args_size, options)?;
        }
        if options.lines {
            for attribute in &code.attributes {
                match attribute {
                    Attribute::LineNumberTable(table) => {
                        writeln!(out, "      LineNumberTable:")?;
                        for entry in table {
                            writeln!(out, "        line {}: {}", entry.line_number, entry.start_pc)?;
                        }
                    }
                    Attribute::LocalVariableTable(table) if !table.is_empty() => {
                        writeln!(out, "      LocalVariableTable:")?;
                        writeln!(out, "        Start  Length  Slot  Name   Signature")?;
                        for entry in table {
                            writeln!(
                                out,
                                "      {:>7} {:>7} {:>5} {:>5}   {}",
                                entry.start_pc,
                                entry.length,
                                entry.index,
                                utf8(class, entry.name_index),
                                utf8(class, entry.descriptor_index)
                            )?;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn read_u16(code: &[u8], at: usize) -> u16 {
    (code[at] as u16) << 8 | code[at + 1] as u16
}

fn read_i32(code: &[u8], at: usize) -> i32 {
    ((code[at] as u32) << 24
        | (code[at + 1] as u32) << 16
        | (code[at + 2] as u32) << 8
        | code[at + 3] as u32) as i32
}

fn ldc_comment(class: &ClassFile, index: u16) -> String {
    match class.pool.get(index) {
        Ok(Constant::String { .. }) => {
            format!("// String {}", class.pool.string(index).unwrap_or_default())
        }
        Ok(Constant::Int(v)) => format!("// Integer {}", v),
        Ok(Constant::Float(v)) => format!("// float {}f", v),
        Ok(Constant::Long(v)) => format!("// long {}l", v),
        Ok(Constant::Double(v)) => format!("// double {}d", v),
        _ => String::new(),
    }
}

/// Disassemble one code attribute. The walk mirrors the validator's, so it
/// cannot fall out of sync with what the loader accepted.
fn print_code<W: Write>(
    out: &mut W,
    class: &ClassFile,
    code: &CodeAttribute,
    args_size: u16,
    options: &Options,
) -> io::Result<()> {
    writeln!(out, "    Code:")?;
    if options.verbose {
        writeln!(
            out,
            "      stack={}, locals={}, args_size={}",
            code.max_stack, code.max_locals, args_size
        )?;
    }

    let bytes = &code.code[..];
    let mut pc = 0usize;
    while pc < bytes.len() {
        let base = pc;
        let opcode = match Opcode::from_u8(bytes[pc]) {
            Some(opcode) => opcode,
            None => break,
        };
        pc += 1;

        let head = format!("{:8}: {}", base, opcode.mnemonic());
        let operands = match opcode {
            Opcode::Bipush => {
                let value = bytes[pc] as i8;
                pc += 1;
                format!("{}", value)
            }
            Opcode::Sipush => {
                let value = read_u16(bytes, pc) as i16;
                pc += 2;
                format!("{}", value)
            }
            Opcode::Iinc => {
                let index = bytes[pc];
                let constant = bytes[pc + 1] as i8;
                pc += 2;
                format!("{}, {}", index, constant)
            }
            Opcode::Iload
            | Opcode::Lload
            | Opcode::Fload
            | Opcode::Dload
            | Opcode::Aload
            | Opcode::Istore
            | Opcode::Lstore
            | Opcode::Fstore
            | Opcode::Dstore
            | Opcode::Astore
            | Opcode::Ret => {
                let index = bytes[pc];
                pc += 1;
                format!("{}", index)
            }
            Opcode::Ifeq
            | Opcode::Ifne
            | Opcode::Iflt
            | Opcode::Ifge
            | Opcode::Ifgt
            | Opcode::Ifle
            | Opcode::IfIcmpeq
            | Opcode::IfIcmpne
            | Opcode::IfIcmplt
            | Opcode::IfIcmpge
            | Opcode::IfIcmpgt
            | Opcode::IfIcmple
            | Opcode::IfAcmpeq
            | Opcode::IfAcmpne
            | Opcode::Ifnull
            | Opcode::Ifnonnull
            | Opcode::Goto
            | Opcode::Jsr => {
                let offset = read_u16(bytes, pc) as i16;
                pc += 2;
                format!("{}", base as i64 + offset as i64)
            }
            Opcode::GotoW | Opcode::JsrW => {
                let offset = read_i32(bytes, pc);
                pc += 4;
                format!("{}", base as i64 + offset as i64)
            }
            Opcode::Ldc => {
                let index = bytes[pc] as u16;
                pc += 1;
                format!("#{:<18}{}", index, ldc_comment(class, index))
            }
            Opcode::LdcW | Opcode::Ldc2W => {
                let index = read_u16(bytes, pc);
                pc += 2;
                format!("#{:<18}{}", index, ldc_comment(class, index))
            }
            Opcode::Getstatic | Opcode::Putstatic | Opcode::Getfield | Opcode::Putfield => {
                let index = read_u16(bytes, pc);
                pc += 2;
                let (owner, name, descriptor) =
                    class.pool.member_ref(index).unwrap_or(("", "", ""));
                format!("#{:<18}// Field {}.{}:{}", index, owner, name, descriptor)
            }
            Opcode::Invokevirtual | Opcode::Invokespecial | Opcode::Invokestatic => {
                let index = read_u16(bytes, pc);
                pc += 2;
                let (owner, name, descriptor) =
                    class.pool.member_ref(index).unwrap_or(("", "", ""));
                let owner = if owner == class.name() {
                    String::new()
                } else {
                    format!("{}.", owner)
                };
                format!(
                    "#{:<18}// Method {}{}:{}",
                    index,
                    owner,
                    quote_name(name),
                    descriptor
                )
            }
            Opcode::Invokeinterface | Opcode::Invokedynamic => {
                let index = read_u16(bytes, pc);
                pc += 4;
                format!("#{}", index)
            }
            Opcode::New | Opcode::Anewarray | Opcode::Checkcast | Opcode::Instanceof => {
                let index = read_u16(bytes, pc);
                pc += 2;
                format!(
                    "#{:<18}// class {}",
                    index,
                    class.pool.class_name(index).unwrap_or_default()
                )
            }
            Opcode::Newarray => {
                let type_code = bytes[pc];
                pc += 1;
                match TypeCode::from_u8(type_code) {
                    Some(TypeCode::Boolean) => "boolean".to_string(),
                    Some(TypeCode::Char) => "char".to_string(),
                    Some(TypeCode::Float) => "float".to_string(),
                    Some(TypeCode::Double) => "double".to_string(),
                    Some(TypeCode::Byte) => "byte".to_string(),
                    Some(TypeCode::Short) => "short".to_string(),
                    Some(TypeCode::Int) => "int".to_string(),
                    Some(TypeCode::Long) => "long".to_string(),
                    None => format!("{}", type_code),
                }
            }
            Opcode::Multianewarray => {
                let index = read_u16(bytes, pc);
                let dimension = bytes[pc + 2];
                pc += 3;
                format!(
                    "#{}, {:<12}// class \"{}\"",
                    index,
                    dimension,
                    class.pool.class_name(index).unwrap_or_default()
                )
            }
            Opcode::Wide => {
                let secondary = Opcode::from_u8(bytes[pc]);
                pc += 1;
                match secondary {
                    Some(Opcode::Iinc) => {
                        let index = read_u16(bytes, pc);
                        let constant = read_u16(bytes, pc + 2) as i16;
                        pc += 4;
                        format!("iinc {}, {}", index, constant)
                    }
                    Some(op) => {
                        let index = read_u16(bytes, pc);
                        pc += 2;
                        format!("{} {}", op.mnemonic(), index)
                    }
                    None => String::new(),
                }
            }
            Opcode::Tableswitch => {
                while pc % 4 != 0 {
                    pc += 1;
                }
                let default = read_i32(bytes, pc);
                let low = read_i32(bytes, pc + 4);
                let high = read_i32(bytes, pc + 8);
                pc += 12;
                let mut text = format!("{{ // {} to {}\n", low, high);
                for key in low..=high {
                    let offset = read_i32(bytes, pc);
                    pc += 4;
                    text.push_str(&format!(
                        "{:>24}: {}\n",
                        key,
                        base as i64 + offset as i64
                    ));
                }
                text.push_str(&format!(
                    "{:>24}: {}\n            }}",
                    "default",
                    base as i64 + default as i64
                ));
                text
            }
            Opcode::Lookupswitch => {
                while pc % 4 != 0 {
                    pc += 1;
                }
                let default = read_i32(bytes, pc);
                let npairs = read_i32(bytes, pc + 4);
                pc += 8;
                let mut text = format!("{{ // {}\n", npairs);
                for _ in 0..npairs {
                    let matched = read_i32(bytes, pc);
                    let offset = read_i32(bytes, pc + 4);
                    pc += 8;
                    text.push_str(&format!(
                        "{:>24}: {}\n",
                        matched,
                        base as i64 + offset as i64
                    ));
                }
                text.push_str(&format!(
                    "{:>24}: {}\n            }}",
                    "default",
                    base as i64 + default as i64
                ));
                text
            }
            _ => String::new(),
        };

        if operands.is_empty() {
            writeln!(out, "{}", head)?;
        } else {
            writeln!(out, "{:<24} {}", head, operands)?;
        }
    }
    Ok(())
}
