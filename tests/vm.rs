//! End-to-end scenarios: classes are assembled as raw bytes, written into a
//! temporary class-path directory, and driven through the public VM API.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;

use mini_jvm::error::{ClassError, VmError};
use mini_jvm::jvm::mem::JavaValue;
use mini_jvm::{ClassPath, JavaVm};

const OBJECT: &str = "java/lang/Object";

/// Assembles a class file for the tests. Pool helpers return the slot index
/// they allocated, so code arrays can name their operands directly.
struct ClassBuilder {
    pool: Vec<u8>,
    next_index: u16,
    this_class: u16,
    super_class: u16,
    fields: Vec<u8>,
    field_count: u16,
    methods: Vec<u8>,
    method_count: u16,
}

impl ClassBuilder {
    fn with_super(name: &str, super_name: &str) -> Self {
        let mut builder = ClassBuilder {
            pool: Vec::new(),
            next_index: 1,
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            field_count: 0,
            methods: Vec::new(),
            method_count: 0,
        };
        builder.this_class = builder.class_entry(name);
        builder.super_class = builder.class_entry(super_name);
        builder
    }

    fn new(name: &str) -> Self {
        ClassBuilder::with_super(name, OBJECT)
    }

    fn utf8(&mut self, text: &str) -> u16 {
        self.pool.push(1);
        self.pool.extend_from_slice(&(text.len() as u16).to_be_bytes());
        self.pool.extend_from_slice(text.as_bytes());
        self.take_slot(1)
    }

    fn class_entry(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.pool.push(7);
        self.pool.extend_from_slice(&name_index.to_be_bytes());
        self.take_slot(1)
    }

    fn int_entry(&mut self, value: i32) -> u16 {
        self.pool.push(3);
        self.pool.extend_from_slice(&value.to_be_bytes());
        self.take_slot(1)
    }

    fn string_entry(&mut self, text: &str) -> u16 {
        let string_index = self.utf8(text);
        self.pool.push(8);
        self.pool.extend_from_slice(&string_index.to_be_bytes());
        self.take_slot(1)
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.pool.push(12);
        self.pool.extend_from_slice(&name_index.to_be_bytes());
        self.pool.extend_from_slice(&descriptor_index.to_be_bytes());
        self.take_slot(1)
    }

    fn member_ref(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_entry(class);
        let nat_index = self.name_and_type(name, descriptor);
        self.pool.push(tag);
        self.pool.extend_from_slice(&class_index.to_be_bytes());
        self.pool.extend_from_slice(&nat_index.to_be_bytes());
        self.take_slot(1)
    }

    fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, class, name, descriptor)
    }

    fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, class, name, descriptor)
    }

    fn take_slot(&mut self, width: u16) -> u16 {
        let index = self.next_index;
        self.next_index += width;
        index
    }

    fn field(&mut self, flags: u16, name: &str, descriptor: &str) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.fields.extend_from_slice(&flags.to_be_bytes());
        self.fields.extend_from_slice(&name_index.to_be_bytes());
        self.fields.extend_from_slice(&descriptor_index.to_be_bytes());
        self.fields.extend_from_slice(&0u16.to_be_bytes());
        self.field_count += 1;
    }

    fn field_with_constant(&mut self, flags: u16, name: &str, descriptor: &str, value: i32) {
        let constant_index = self.int_entry(value);
        let attr_name = self.utf8("ConstantValue");
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.fields.extend_from_slice(&flags.to_be_bytes());
        self.fields.extend_from_slice(&name_index.to_be_bytes());
        self.fields.extend_from_slice(&descriptor_index.to_be_bytes());
        self.fields.extend_from_slice(&1u16.to_be_bytes());
        self.fields.extend_from_slice(&attr_name.to_be_bytes());
        self.fields.extend_from_slice(&2u32.to_be_bytes());
        self.fields.extend_from_slice(&constant_index.to_be_bytes());
        self.field_count += 1;
    }

    fn method(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
    ) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let code_name = self.utf8("Code");

        self.methods.extend_from_slice(&flags.to_be_bytes());
        self.methods.extend_from_slice(&name_index.to_be_bytes());
        self.methods.extend_from_slice(&descriptor_index.to_be_bytes());
        self.methods.extend_from_slice(&1u16.to_be_bytes());

        let attr_length = 2 + 2 + 4 + code.len() as u32 + 2 + 2;
        self.methods.extend_from_slice(&code_name.to_be_bytes());
        self.methods.extend_from_slice(&attr_length.to_be_bytes());
        self.methods.extend_from_slice(&max_stack.to_be_bytes());
        self.methods.extend_from_slice(&max_locals.to_be_bytes());
        self.methods.extend_from_slice(&(code.len() as u32).to_be_bytes());
        self.methods.extend_from_slice(code);
        self.methods.extend_from_slice(&0u16.to_be_bytes()); // exceptions
        self.methods.extend_from_slice(&0u16.to_be_bytes()); // attributes
        self.method_count += 1;
    }

    fn build(self) -> Vec<u8> {
        let mut bytes = 0xCAFE_BABEu32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 52]);
        bytes.extend_from_slice(&self.next_index.to_be_bytes());
        bytes.extend_from_slice(&self.pool);
        bytes.extend_from_slice(&0x0021u16.to_be_bytes());
        bytes.extend_from_slice(&self.this_class.to_be_bytes());
        bytes.extend_from_slice(&self.super_class.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&self.field_count.to_be_bytes());
        bytes.extend_from_slice(&self.fields);
        bytes.extend_from_slice(&self.method_count.to_be_bytes());
        bytes.extend_from_slice(&self.methods);
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes
    }
}

fn write_class(dir: &Path, name: &str, bytes: &[u8]) {
    fs::write(dir.join(format!("{}.class", name)), bytes).unwrap();
}

fn vm_for(dir: &TempDir) -> JavaVm {
    JavaVm::new(ClassPath::new(dir.path().to_str().unwrap()))
}

const ACC_PUBLIC_STATIC: u16 = 0x0009;
const ACC_STATIC: u16 = 0x0008;

#[test]
fn sum_loop_returns_55() {
    // int s = 0; for (int i = 1; i <= 10; i++) s += i; return s;
    let code = [
        0x03, 0x3B, // iconst_0, istore_0
        0x04, 0x3C, // iconst_1, istore_1
        0x1B, // iload_1
        0x10, 0x0A, // bipush 10
        0xA3, 0x00, 0x0D, // if_icmpgt +13 (exit)
        0x1A, 0x1B, 0x60, 0x3B, // iload_0, iload_1, iadd, istore_0
        0x84, 0x01, 0x01, // iinc 1, 1
        0xA7, 0xFF, 0xF3, // goto -13 (loop head)
        0x1A, 0xAC, // iload_0, ireturn
    ];

    let mut builder = ClassBuilder::new("Sum");
    builder.method(ACC_PUBLIC_STATIC, "sum", "()I", 2, 2, &code);

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Sum", &builder.build());

    let mut vm = vm_for(&dir);
    let result = vm.call_static("Sum", "sum", "()I", Vec::new()).unwrap();
    assert_eq!(result, Some(JavaValue::Int(55)));
}

#[test]
fn empty_void_method_returns_immediately() {
    let mut builder = ClassBuilder::new("Noop");
    builder.method(ACC_PUBLIC_STATIC, "run", "()V", 0, 0, &[]);

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Noop", &builder.build());

    let mut vm = vm_for(&dir);
    let result = vm.call_static("Noop", "run", "()V", Vec::new()).unwrap();
    assert_eq!(result, None);
}

#[test]
fn corrupt_magic_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Bad", &[0xDE, 0xAD, 0xBE, 0xEF, 0, 0]);

    let mut vm = vm_for(&dir);
    match vm.load_class("Bad") {
        Err(VmError::LoadError {
            source: ClassError::Magic(found),
            ..
        }) => assert_eq!(found, 0xDEAD_BEEF),
        other => panic!("expected magic failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn load_error_message_names_the_class() {
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Bad", &[0xDE, 0xAD, 0xBE, 0xEF, 0, 0]);

    let mut vm = vm_for(&dir);
    let message = vm.load_class("Bad").map(|_| ()).unwrap_err().to_string();
    assert!(message.starts_with("could not load class Bad: invalid magic number"));
}

#[test]
fn class_name_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Wrong", &ClassBuilder::new("Other").build());

    let mut vm = vm_for(&dir);
    assert!(matches!(
        vm.load_class("Wrong").map(|_| ()),
        Err(VmError::NameMismatch { .. })
    ));
}

#[test]
fn superclass_circularity_is_detected() {
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "A", &ClassBuilder::with_super("A", "B").build());
    write_class(dir.path(), "B", &ClassBuilder::with_super("B", "A").build());

    let mut vm = vm_for(&dir);
    assert!(matches!(
        vm.load_class("A").map(|_| ()),
        Err(VmError::Circularity(_))
    ));
}

#[test]
fn loading_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Once", &ClassBuilder::new("Once").build());

    let mut vm = vm_for(&dir);
    let first = vm.load_class("Once").unwrap();
    let second = vm.load_class("Once").unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn superclass_chain_is_loaded_eagerly() {
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Base", &ClassBuilder::new("Base").build());
    write_class(
        dir.path(),
        "Derived",
        &ClassBuilder::with_super("Derived", "Base").build(),
    );

    let mut vm = vm_for(&dir);
    vm.load_class("Derived").unwrap();
    assert!(vm.is_loaded("Base"));
}

#[test]
fn missing_method_is_reported() {
    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Empty", &ClassBuilder::new("Empty").build());

    let mut vm = vm_for(&dir);
    assert!(matches!(
        vm.call_static("Empty", "nothing", "()V", Vec::new()),
        Err(VmError::MethodNotFound { .. })
    ));
}

#[test]
fn static_invocation_crosses_classes() {
    // Util.twice(I)I doubles its argument; App.run()I returns twice(21).
    let mut util = ClassBuilder::new("Util");
    util.method(
        ACC_PUBLIC_STATIC,
        "twice",
        "(I)I",
        2,
        1,
        &[0x1A, 0x05, 0x68, 0xAC], // iload_0, iconst_2, imul, ireturn
    );

    let mut app = ClassBuilder::new("App");
    let twice = app.method_ref("Util", "twice", "(I)I");
    let code = [
        0x10,
        21, // bipush 21
        0xB8,
        (twice >> 8) as u8,
        twice as u8, // invokestatic Util.twice
        0xAC, // ireturn
    ];
    app.method(ACC_PUBLIC_STATIC, "run", "()I", 1, 0, &code);

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Util", &util.build());
    write_class(dir.path(), "App", &app.build());

    let mut vm = vm_for(&dir);
    let result = vm.call_static("App", "run", "()I", Vec::new()).unwrap();
    assert_eq!(result, Some(JavaValue::Int(42)));
}

#[test]
fn arguments_transfer_into_locals() {
    let mut builder = ClassBuilder::new("Args");
    builder.method(
        ACC_PUBLIC_STATIC,
        "first",
        "(IJ)I",
        2,
        3,
        &[0x1A, 0xAC], // iload_0, ireturn
    );

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Args", &builder.build());

    let mut vm = vm_for(&dir);
    let result = vm
        .call_static(
            "Args",
            "first",
            "(IJ)I",
            vec![JavaValue::Int(7), JavaValue::Long(8)],
        )
        .unwrap();
    assert_eq!(result, Some(JavaValue::Int(7)));
}

#[test]
fn invoked_arguments_bind_first_parameter_to_local_zero() {
    // Calc.sub(II)I subtracts its second argument from its first, which
    // only comes out right if argument order survives the call.
    let mut builder = ClassBuilder::new("Calc");
    let sub = builder.method_ref("Calc", "sub", "(II)I");
    builder.method(
        ACC_PUBLIC_STATIC,
        "sub",
        "(II)I",
        2,
        2,
        &[0x1A, 0x1B, 0x64, 0xAC], // iload_0, iload_1, isub, ireturn
    );

    let run = [
        0x10,
        5, // bipush 5
        0x10,
        2, // bipush 2
        0xB8,
        (sub >> 8) as u8,
        sub as u8, // invokestatic Calc.sub
        0xAC, // ireturn
    ];
    builder.method(ACC_PUBLIC_STATIC, "run", "()I", 2, 0, &run);

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Calc", &builder.build());

    let mut vm = vm_for(&dir);
    let result = vm.call_static("Calc", "run", "()I", Vec::new()).unwrap();
    assert_eq!(result, Some(JavaValue::Int(3)));
}

#[test]
fn invoked_wide_arguments_keep_their_slots() {
    // Mix.pick(JI)I returns its int argument, which sits at local 2 behind
    // the two slots of the leading long.
    let mut builder = ClassBuilder::new("Mix");
    let pick = builder.method_ref("Mix", "pick", "(JI)I");
    builder.method(
        ACC_PUBLIC_STATIC,
        "pick",
        "(JI)I",
        1,
        3,
        &[0x1C, 0xAC], // iload_2, ireturn
    );

    let run = [
        0x0A, // lconst_1
        0x10,
        7, // bipush 7
        0xB8,
        (pick >> 8) as u8,
        pick as u8, // invokestatic Mix.pick
        0xAC, // ireturn
    ];
    builder.method(ACC_PUBLIC_STATIC, "run", "()I", 2, 0, &run);

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Mix", &builder.build());

    let mut vm = vm_for(&dir);
    let result = vm.call_static("Mix", "run", "()I", Vec::new()).unwrap();
    assert_eq!(result, Some(JavaValue::Int(7)));
}

#[test]
fn clinit_runs_once_and_statics_persist() {
    let mut builder = ClassBuilder::new("Init");
    builder.field(ACC_STATIC, "counter", "I");
    let counter = builder.field_ref("Init", "counter", "I");
    let hi = (counter >> 8) as u8;
    let lo = counter as u8;

    // counter = counter + 1 (starts from the descriptor's zero value)
    let clinit = [0xB2, hi, lo, 0x04, 0x60, 0xB3, hi, lo, 0xB1];
    builder.method(ACC_STATIC, "<clinit>", "()V", 2, 0, &clinit);
    builder.method(
        ACC_PUBLIC_STATIC,
        "get",
        "()I",
        1,
        0,
        &[0xB2, hi, lo, 0xAC],
    );

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Init", &builder.build());

    let mut vm = vm_for(&dir);
    let first = vm.call_static("Init", "get", "()I", Vec::new()).unwrap();
    let second = vm.call_static("Init", "get", "()I", Vec::new()).unwrap();
    assert_eq!(first, Some(JavaValue::Int(1)));
    assert_eq!(second, Some(JavaValue::Int(1)));
}

#[test]
fn constant_value_fields_read_through() {
    let mut builder = ClassBuilder::new("Config");
    builder.field_with_constant(ACC_STATIC | 0x0010, "BASE", "I", 40);
    let base = builder.field_ref("Config", "BASE", "I");
    builder.method(
        ACC_PUBLIC_STATIC,
        "base",
        "()I",
        1,
        0,
        &[0xB2, (base >> 8) as u8, base as u8, 0xAC],
    );

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Config", &builder.build());

    let mut vm = vm_for(&dir);
    let result = vm.call_static("Config", "base", "()I", Vec::new()).unwrap();
    assert_eq!(result, Some(JavaValue::Int(40)));
}

#[test]
fn main_receives_the_argument_array() {
    let mut builder = ClassBuilder::new("Main");
    builder.field(ACC_STATIC, "seen", "I");
    let seen = builder.field_ref("Main", "seen", "I");

    // seen = args.length
    let main = [
        0x2A, // aload_0
        0xBE, // arraylength
        0xB3,
        (seen >> 8) as u8,
        seen as u8, // putstatic
        0xB1, // return
    ];
    builder.method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 1, 1, &main);
    builder.method(
        ACC_PUBLIC_STATIC,
        "seen",
        "()I",
        1,
        0,
        &[0xB2, (seen >> 8) as u8, seen as u8, 0xAC],
    );

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Main", &builder.build());

    let mut vm = vm_for(&dir);
    vm.entry_point("Main", vec!["one".into(), "two".into()])
        .unwrap();
    let result = vm.call_static("Main", "seen", "()I", Vec::new()).unwrap();
    assert_eq!(result, Some(JavaValue::Int(2)));
}

#[test]
fn hello_world_runs_through_the_native_bridge() {
    let mut builder = ClassBuilder::new("HelloWorld");
    let out = builder.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = builder.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let hello = builder.string_entry("hello");
    assert!(hello < 256, "ldc needs a one-byte pool index");

    let main = [
        0xB2,
        (out >> 8) as u8,
        out as u8, // getstatic System.out
        0x12,
        hello as u8, // ldc "hello"
        0xB6,
        (println >> 8) as u8,
        println as u8, // invokevirtual println
        0xB1, // return
    ];
    builder.method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 2, 1, &main);

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "HelloWorld", &builder.build());

    let mut vm = vm_for(&dir);
    vm.entry_point("HelloWorld", Vec::new()).unwrap();
}

#[test]
fn unimplemented_opcode_aborts_with_the_byte() {
    let mut builder = ClassBuilder::new("Monitor");
    // monitorenter is parsed but refuses to execute
    builder.method(ACC_PUBLIC_STATIC, "run", "()V", 1, 0, &[0x01, 0xC2, 0xB1]);

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Monitor", &builder.build());

    let mut vm = vm_for(&dir);
    assert!(matches!(
        vm.call_static("Monitor", "run", "()V", Vec::new()),
        Err(VmError::Unimplemented(0xC2))
    ));
}

#[test]
fn main_requires_public_static_flags() {
    let mut builder = ClassBuilder::new("Hidden");
    // static but not public
    builder.method(ACC_STATIC, "main", "([Ljava/lang/String;)V", 1, 1, &[0xB1]);

    let dir = TempDir::new().unwrap();
    write_class(dir.path(), "Hidden", &builder.build());

    let mut vm = vm_for(&dir);
    assert!(matches!(
        vm.entry_point("Hidden", Vec::new()),
        Err(VmError::MethodNotFound { .. })
    ));
}
