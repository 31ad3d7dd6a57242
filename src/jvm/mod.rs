pub mod call;
pub mod frame;
pub mod mem;
pub mod native;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::class::attribute::Attribute;
use crate::class::descriptor::FieldDescriptor;
use crate::class::{AccessFlags, ClassFile};
use crate::error::VmError;
use crate::instruction::push_const::resolve_constant;
use crate::jvm::call::methodcall;
use crate::jvm::frame::Frame;
use crate::jvm::mem::{Heap, HeapData, JavaValue};

#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';

/// Ordered list of directories searched for `.class` files.
#[derive(Debug, Clone)]
pub struct ClassPath {
    roots: Vec<PathBuf>,
}

impl ClassPath {
    /// Split a classpath string on the platform separator.
    pub fn new(text: &str) -> Self {
        ClassPath {
            roots: text.split(PATH_SEPARATOR).map(PathBuf::from).collect(),
        }
    }

    /// The `CLASSPATH` environment variable, or the working directory when
    /// it is unset.
    pub fn from_env() -> Self {
        match std::env::var("CLASSPATH") {
            Ok(text) => ClassPath::new(&text),
            Err(_) => ClassPath::new("."),
        }
    }

    /// First root containing `name.class`.
    fn find(&self, class_name: &str) -> Option<PathBuf> {
        for root in &self.roots {
            let path = root.join(format!("{}.class", class_name));
            if path.is_file() {
                return Some(path);
            }
        }
        None
    }
}

impl Default for ClassPath {
    fn default() -> Self {
        ClassPath::new(".")
    }
}

/// The virtual machine context: class registry, static field store and heap.
/// The registry owns every loaded class; handles passed around during
/// execution are clones of the registry's `Rc`, and a class is never mutated
/// after linking apart from its initialization mark.
pub struct JavaVm {
    class_path: ClassPath,
    classes: HashMap<String, Rc<ClassFile>>,
    statics: HashMap<(String, String), JavaValue>,
    pub heap: Heap,
}

impl JavaVm {
    pub fn new(class_path: ClassPath) -> Self {
        JavaVm {
            class_path,
            classes: HashMap::new(),
            statics: HashMap::new(),
            heap: Heap::new(),
        }
    }

    /// Load a class by binary name, along with its whole superclass chain.
    /// Loading is cached: the second request for a name returns the same
    /// class object without touching the disk.
    pub fn load_class(&mut self, name: &str) -> Result<Rc<ClassFile>, VmError> {
        if let Some(class) = self.classes.get(name) {
            return Ok(class.clone());
        }

        let path = self
            .class_path
            .find(name)
            .ok_or_else(|| VmError::ClassNotFound(name.to_string()))?;
        debug!("loading class {} from {}", name, path.display());

        let file = File::open(&path).map_err(|e| VmError::LoadError {
            name: name.to_string(),
            source: e.into(),
        })?;
        let class = ClassFile::read(&mut BufReader::new(file)).map_err(|e| {
            VmError::LoadError {
                name: name.to_string(),
                source: e,
            }
        })?;

        if class.name() != name {
            return Err(VmError::NameMismatch {
                expected: name.to_string(),
                found: class.name().to_string(),
            });
        }

        let class = Rc::new(class);
        self.classes.insert(name.to_string(), class.clone());

        if !class.is_top_class() {
            if let Some(super_name) = class.super_name() {
                let super_name = super_name.to_string();
                self.load_class(&super_name)?;
                self.check_circularity(name, &super_name)?;
            }
        }

        Ok(class)
    }

    /// Walk the (now fully loaded) superclass chain and reject the new class
    /// if it appears in its own ancestry.
    fn check_circularity(&self, name: &str, super_name: &str) -> Result<(), VmError> {
        let mut seen = HashSet::new();
        let mut current = super_name.to_string();

        loop {
            if current == name {
                return Err(VmError::Circularity(name.to_string()));
            }
            if !seen.insert(current.clone()) {
                return Ok(());
            }
            match self.classes.get(&current) {
                Some(class) if !class.is_top_class() => match class.super_name() {
                    Some(next) => current = next.to_string(),
                    None => return Ok(()),
                },
                _ => return Ok(()),
            }
        }
    }

    /// Run `<clinit>` once, ancestors first. The mark is set before the
    /// initializer runs, so self-referential initialization terminates.
    pub fn init_class(&mut self, class: &Rc<ClassFile>) -> Result<(), VmError> {
        if class.init_done.get() {
            return Ok(());
        }
        class.init_done.set(true);

        if !class.is_top_class() {
            if let Some(super_name) = class.super_name() {
                let super_class = self.classes.get(super_name).cloned();
                if let Some(super_class) = super_class {
                    self.init_class(&super_class)?;
                }
            }
        }

        if class.method("<clinit>", "()V").is_some() {
            debug!("running <clinit> of {}", class.name());
            // Older class files did not require the static flag on <clinit>.
            let required = if class.major_version >= 51 {
                AccessFlags::STATIC
            } else {
                AccessFlags::empty()
            };
            methodcall(self, class, None, "<clinit>", "()V", required, false)?;
        }

        Ok(())
    }

    /// Current value of a static field: the store if it was ever written,
    /// the field's `ConstantValue` otherwise, the descriptor's zero value
    /// as a last resort.
    pub fn static_value(
        &mut self,
        class: &Rc<ClassFile>,
        name: &str,
        descriptor: &str,
    ) -> Result<JavaValue, VmError> {
        let key = (class.name().to_string(), name.to_string());
        if let Some(value) = self.statics.get(&key) {
            return Ok(*value);
        }

        let field = class.field(name).ok_or_else(|| VmError::UnresolvedField {
            class: class.name().to_string(),
            name: name.to_string(),
        })?;

        if let Some(index) = Attribute::find_constant_value(&field.attributes) {
            return Ok(resolve_constant(class, &mut self.heap, index));
        }

        let parsed = FieldDescriptor::read_str(descriptor).map_err(VmError::Resolve)?;
        Ok(zero_value(&parsed))
    }

    pub fn put_static(&mut self, class: &Rc<ClassFile>, name: &str, value: JavaValue) {
        self.statics
            .insert((class.name().to_string(), name.to_string()), value);
    }

    /// Invoke a static method outside any running frame, feeding `args`
    /// through a synthetic caller frame. Arguments are pushed left to right,
    /// exactly as compiled bytecode would, so `args[0]` binds to local 0.
    pub fn call_static(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        args: Vec<JavaValue>,
    ) -> Result<Option<JavaValue>, VmError> {
        let class = self.load_class(class_name)?;
        self.init_class(&class)?;

        let mut frame = Frame::new(0, args.len().max(1) as u16);
        for value in args {
            frame.push(value)?;
        }
        methodcall(
            self,
            &class,
            Some(&mut frame),
            name,
            descriptor,
            AccessFlags::STATIC,
            false,
        )
    }

    /// Program entry: load and initialize the main class, wrap the argument
    /// strings into a `String[]` on the heap, and call `main`.
    pub fn entry_point(&mut self, class_name: &str, args: Vec<String>) -> Result<(), VmError> {
        let class = self.load_class(class_name)?;
        self.init_class(&class)?;

        let handles = args
            .into_iter()
            .map(|arg| Some(self.heap.alloc(HeapData::Str(arg))))
            .collect();
        let array = self.heap.alloc(HeapData::ArrayRef(handles));

        let mut frame = Frame::new(0, 1);
        frame.push(JavaValue::Reference(Some(array)))?;
        methodcall(
            self,
            &class,
            Some(&mut frame),
            "main",
            "([Ljava/lang/String;)V",
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            false,
        )?;

        debug!("main returned; {} heap entries live", self.heap.live());
        Ok(())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }
}

fn zero_value(descriptor: &FieldDescriptor) -> JavaValue {
    match descriptor {
        FieldDescriptor::Long => JavaValue::Long(0),
        FieldDescriptor::Float => JavaValue::Float(0.0),
        FieldDescriptor::Double => JavaValue::Double(0.0),
        FieldDescriptor::Object(_) | FieldDescriptor::Array(_) => JavaValue::Reference(None),
        _ => JavaValue::Int(0),
    }
}
