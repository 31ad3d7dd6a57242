//! Symbolic references and control transfers that reach outside the current
//! frame: static field access, method invocation and the two switches.

use std::rc::Rc;

use crate::class::{AccessFlags, ClassFile};
use crate::error::VmError;
use crate::jvm::call::methodcall;
use crate::jvm::frame::Frame;
use crate::jvm::native;
use crate::jvm::JavaVm;

/// `getstatic`: host classes resolve through the native bridge; user classes
/// go through the VM's static field store.
pub fn getstatic(
    vm: &mut JavaVm,
    class: &Rc<ClassFile>,
    frame: &mut Frame,
    code: &[u8],
) -> Result<(), VmError> {
    let index = frame.fetch_u16(code);
    let (class_name, name, descriptor) = class.pool.member_ref(index).map_err(VmError::Resolve)?;

    let value = match native::java_class(class_name) {
        Some(host) => native::static_field(&mut vm.heap, host, name, descriptor).ok_or(
            VmError::UnresolvedField {
                class: class_name.to_string(),
                name: name.to_string(),
            },
        )?,
        None => {
            let target = vm.load_class(class_name)?;
            vm.init_class(&target)?;
            vm.static_value(&target, name, descriptor)?
        }
    };

    frame.push(value)
}

/// `putstatic`: writes land in the VM's static store. Host class fields are
/// not writable.
pub fn putstatic(
    vm: &mut JavaVm,
    class: &Rc<ClassFile>,
    frame: &mut Frame,
    code: &[u8],
) -> Result<(), VmError> {
    let index = frame.fetch_u16(code);
    let (class_name, name, _) = class.pool.member_ref(index).map_err(VmError::Resolve)?;

    if native::java_class(class_name).is_some() {
        return Err(VmError::UnresolvedField {
            class: class_name.to_string(),
            name: name.to_string(),
        });
    }

    let target = vm.load_class(class_name)?;
    vm.init_class(&target)?;
    let value = frame.pop()?;
    vm.put_static(&target, name, value);
    Ok(())
}

/// `invokestatic` and `invokevirtual` share the resolution path; they differ
/// in the required access flags and in whether a receiver sits under the
/// arguments.
pub fn invoke(
    vm: &mut JavaVm,
    class: &Rc<ClassFile>,
    frame: &mut Frame,
    code: &[u8],
    is_virtual: bool,
) -> Result<(), VmError> {
    let index = frame.fetch_u16(code);
    let (class_name, name, descriptor) = class.pool.member_ref(index).map_err(VmError::Resolve)?;

    if let Some(host) = native::java_class(class_name) {
        return native::call_method(frame, &mut vm.heap, host, name, descriptor);
    }

    let target = vm.load_class(class_name)?;
    vm.init_class(&target)?;
    let required = if is_virtual {
        AccessFlags::empty()
    } else {
        AccessFlags::STATIC
    };
    methodcall(vm, &target, Some(frame), name, descriptor, required, is_virtual)?;
    Ok(())
}

/// `tableswitch`: aligned jump table indexed by `key - low`.
pub fn tableswitch(frame: &mut Frame, code: &[u8]) -> Result<(), VmError> {
    let base = frame.pc - 1;
    while frame.pc % 4 != 0 {
        frame.pc += 1;
    }

    let key = frame.pop_int()?;
    let default = frame.fetch_i32(code);
    let low = frame.fetch_i32(code);
    let high = frame.fetch_i32(code);

    let mut target = base as i64 + default as i64;
    if key >= low && key <= high {
        frame.pc += (key - low) as usize * 4;
        let offset = frame.fetch_i32(code);
        target = base as i64 + offset as i64;
    }
    frame.pc = target as usize;
    Ok(())
}

/// `lookupswitch`: linear scan of the match pairs.
pub fn lookupswitch(frame: &mut Frame, code: &[u8]) -> Result<(), VmError> {
    let base = frame.pc - 1;
    while frame.pc % 4 != 0 {
        frame.pc += 1;
    }

    let key = frame.pop_int()?;
    let default = frame.fetch_i32(code);
    let npairs = frame.fetch_i32(code);

    let mut target = base as i64 + default as i64;
    for _ in 0..npairs {
        let matched = frame.fetch_i32(code);
        let offset = frame.fetch_i32(code);
        if matched == key {
            target = base as i64 + offset as i64;
            break;
        }
    }
    frame.pc = target as usize;
    Ok(())
}
