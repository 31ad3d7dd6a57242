//! The fetch-decode-execute loop and the calling convention. Each
//! `methodcall` owns one frame; invocation recursion is host-stack
//! recursion, so frame teardown is automatic on both return and error.

use std::rc::Rc;

use num_traits::FromPrimitive;

use crate::class::attribute::CodeAttribute;
use crate::class::descriptor::FieldDescriptor;
use crate::class::{AccessFlags, ClassFile};
use crate::error::VmError;
use crate::instruction::Opcode;
use crate::instruction::{array, cmp, convert, general, locals, math, push_const, stack};
use crate::jvm::frame::Frame;
use crate::jvm::mem::JavaValue;
use crate::jvm::JavaVm;

/// What a single instruction did to the control flow of its frame.
pub enum OpResult {
    Continue,
    ReturnVoid,
    Return(JavaValue),
}

/// Invoke `class.name descriptor`, transferring arguments from `caller`.
///
/// When `required` is non-empty the resolved method must carry those access
/// flags; a mismatch reports as method-not-found, exactly like a missing
/// method. One value is popped from the caller per declared parameter (the
/// last argument sits on top of the stack) and the first declared parameter
/// lands at local 0, each following one at the next free slot (two slots
/// per long or double). With `pop_receiver` the receiver under the
/// arguments is popped as well. A value-returning method leaves its result
/// on the caller's stack; the result is also returned for callers without a
/// frame.
pub fn methodcall(
    vm: &mut JavaVm,
    class: &Rc<ClassFile>,
    mut caller: Option<&mut Frame>,
    name: &str,
    descriptor: &str,
    required: AccessFlags,
    pop_receiver: bool,
) -> Result<Option<JavaValue>, VmError> {
    debug!("invoking {}.{}{}", class.name(), name, descriptor);

    let not_found = || VmError::MethodNotFound {
        class: class.name().to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
    };

    let method = class.method(name, descriptor).ok_or_else(not_found)?;
    if !required.is_empty() && !method.access_flags.contains(required) {
        return Err(not_found());
    }
    let code = method.code().ok_or_else(|| VmError::MissingCode {
        class: class.name().to_string(),
        name: name.to_string(),
    })?;

    let mut frame = Frame::new(code.max_locals, code.max_stack);

    if let Some(caller) = caller.as_deref_mut() {
        if let FieldDescriptor::Method { args, .. } =
            FieldDescriptor::read_str(descriptor).map_err(VmError::Resolve)?
        {
            // The last argument is on top, so take all of them off before
            // assigning slots in declaration order.
            let mut values = Vec::with_capacity(args.len());
            for _ in 0..args.len() {
                values.push(caller.pop()?);
            }

            let mut slot = 0u16;
            for (arg, value) in args.iter().zip(values.into_iter().rev()) {
                frame.local_store(slot, value);
                slot += arg.word_len() as u16;
            }
        }
        if pop_receiver {
            caller.pop()?;
        }
    }

    let result = exec(vm, class, code, &mut frame)?;

    if let (Some(caller), Some(value)) = (caller, result) {
        caller.push(value)?;
    }
    Ok(result)
}

/// Run a frame to completion. Falling off the end of the code array returns
/// void, which is how an empty `()V` method terminates.
fn exec(
    vm: &mut JavaVm,
    class: &Rc<ClassFile>,
    code: &CodeAttribute,
    frame: &mut Frame,
) -> Result<Option<JavaValue>, VmError> {
    let bytes = &code.code[..];

    while frame.pc < bytes.len() {
        let op = bytes[frame.pc];
        frame.pc += 1;

        match dispatch(vm, class, bytes, frame, op)? {
            OpResult::Continue => {}
            OpResult::ReturnVoid => return Ok(None),
            OpResult::Return(value) => return Ok(Some(value)),
        }
    }

    Ok(None)
}

fn dispatch(
    vm: &mut JavaVm,
    class: &Rc<ClassFile>,
    code: &[u8],
    frame: &mut Frame,
    op: u8,
) -> Result<OpResult, VmError> {
    use Opcode::*;

    let opcode = match Opcode::from_u8(op) {
        Some(opcode) => opcode,
        None => return Err(VmError::Unimplemented(op)),
    };

    if log_enabled!(log::Level::Trace) {
        trace!(
            "{:5}: {:<14} stack {}",
            frame.pc - 1,
            opcode.mnemonic(),
            frame.stack_depth()
        );
    }

    match opcode {
        AconstNull => push_const::aconst_null(frame)?,
        IconstM1 => push_const::iconst(frame, -1)?,
        Iconst0 => push_const::iconst(frame, 0)?,
        Iconst1 => push_const::iconst(frame, 1)?,
        Iconst2 => push_const::iconst(frame, 2)?,
        Iconst3 => push_const::iconst(frame, 3)?,
        Iconst4 => push_const::iconst(frame, 4)?,
        Iconst5 => push_const::iconst(frame, 5)?,
        Lconst0 => push_const::lconst(frame, 0)?,
        Lconst1 => push_const::lconst(frame, 1)?,
        Fconst0 => push_const::fconst(frame, 0.0)?,
        Fconst1 => push_const::fconst(frame, 1.0)?,
        Fconst2 => push_const::fconst(frame, 2.0)?,
        Dconst0 => push_const::dconst(frame, 0.0)?,
        Dconst1 => push_const::dconst(frame, 1.0)?,
        Bipush => push_const::bipush(frame, code)?,
        Sipush => push_const::sipush(frame, code)?,
        Ldc => push_const::ldc(frame, class, &mut vm.heap, code)?,
        LdcW | Ldc2W => push_const::ldc_w(frame, class, &mut vm.heap, code)?,

        Iload | Lload | Fload | Dload | Aload => {
            let index = frame.fetch_u8(code) as u16;
            locals::load(frame, index)?
        }
        Iload0 | Lload0 | Fload0 | Dload0 | Aload0 => locals::load(frame, 0)?,
        Iload1 | Lload1 | Fload1 | Dload1 | Aload1 => locals::load(frame, 1)?,
        Iload2 | Lload2 | Fload2 | Dload2 | Aload2 => locals::load(frame, 2)?,
        Iload3 | Lload3 | Fload3 | Dload3 | Aload3 => locals::load(frame, 3)?,

        Istore | Lstore | Fstore | Dstore | Astore => {
            let index = frame.fetch_u8(code) as u16;
            locals::store(frame, index)?
        }
        Istore0 | Lstore0 | Fstore0 | Dstore0 | Astore0 => locals::store(frame, 0)?,
        Istore1 | Lstore1 | Fstore1 | Dstore1 | Astore1 => locals::store(frame, 1)?,
        Istore2 | Lstore2 | Fstore2 | Dstore2 | Astore2 => locals::store(frame, 2)?,
        Istore3 | Lstore3 | Fstore3 | Dstore3 | Astore3 => locals::store(frame, 3)?,

        Iaload | Baload | Caload | Saload => array::iaload(frame, &vm.heap)?,
        Laload => array::laload(frame, &vm.heap)?,
        Faload => array::faload(frame, &vm.heap)?,
        Daload => array::daload(frame, &vm.heap)?,
        Aaload => array::aaload(frame, &vm.heap)?,
        Iastore | Bastore | Castore | Sastore => array::iastore(frame, &mut vm.heap)?,
        Lastore => array::lastore(frame, &mut vm.heap)?,
        Fastore => array::fastore(frame, &mut vm.heap)?,
        Dastore => array::dastore(frame, &mut vm.heap)?,
        Aastore => array::aastore(frame, &mut vm.heap)?,

        Pop => stack::pop(frame)?,
        Pop2 => stack::pop2(frame)?,
        Dup => stack::dup(frame)?,
        DupX1 => stack::dup_x1(frame)?,
        DupX2 => stack::dup_x2(frame)?,
        Dup2 => stack::dup2(frame)?,
        Dup2X1 => stack::dup2_x1(frame)?,
        Dup2X2 => stack::dup2_x2(frame)?,
        Swap => stack::swap(frame)?,

        Iadd => math::iadd(frame)?,
        Ladd => math::ladd(frame)?,
        Fadd => math::fadd(frame)?,
        Dadd => math::dadd(frame)?,
        Isub => math::isub(frame)?,
        Lsub => math::lsub(frame)?,
        Fsub => math::fsub(frame)?,
        Dsub => math::dsub(frame)?,
        Imul => math::imul(frame)?,
        Lmul => math::lmul(frame)?,
        Fmul => math::fmul(frame)?,
        Dmul => math::dmul(frame)?,
        Idiv => math::idiv(frame)?,
        Ldiv => math::ldiv(frame)?,
        Fdiv => math::fdiv(frame)?,
        Ddiv => math::ddiv(frame)?,
        Irem => math::irem(frame)?,
        Lrem => math::lrem(frame)?,
        Frem => math::frem(frame)?,
        Drem => math::drem(frame)?,
        Ineg => math::ineg(frame)?,
        Lneg => math::lneg(frame)?,
        Fneg => math::fneg(frame)?,
        Dneg => math::dneg(frame)?,
        Ishl => math::ishl(frame)?,
        Lshl => math::lshl(frame)?,
        Ishr => math::ishr(frame)?,
        Lshr => math::lshr(frame)?,
        Iushr => math::iushr(frame)?,
        Lushr => math::lushr(frame)?,
        Iand => math::iand(frame)?,
        Land => math::land(frame)?,
        Ior => math::ior(frame)?,
        Lor => math::lor(frame)?,
        Ixor => math::ixor(frame)?,
        Lxor => math::lxor(frame)?,
        Iinc => locals::iinc(frame, code)?,

        I2l => convert::i2l(frame)?,
        I2f => convert::i2f(frame)?,
        I2d => convert::i2d(frame)?,
        L2i => convert::l2i(frame)?,
        L2f => convert::l2f(frame)?,
        L2d => convert::l2d(frame)?,
        F2i => convert::f2i(frame)?,
        F2l => convert::f2l(frame)?,
        F2d => convert::f2d(frame)?,
        D2i => convert::d2i(frame)?,
        D2l => convert::d2l(frame)?,
        D2f => convert::d2f(frame)?,
        I2b => convert::i2b(frame)?,
        I2c => convert::i2c(frame)?,
        I2s => convert::i2s(frame)?,

        Lcmp => cmp::lcmp(frame)?,
        Fcmpl => cmp::fcmpl(frame)?,
        Fcmpg => cmp::fcmpg(frame)?,
        Dcmpl => cmp::dcmpl(frame)?,
        Dcmpg => cmp::dcmpg(frame)?,
        Ifeq => cmp::if_cond(frame, code, |v| v == 0)?,
        Ifne => cmp::if_cond(frame, code, |v| v != 0)?,
        Iflt => cmp::if_cond(frame, code, |v| v < 0)?,
        Ifge => cmp::if_cond(frame, code, |v| v >= 0)?,
        Ifgt => cmp::if_cond(frame, code, |v| v > 0)?,
        Ifle => cmp::if_cond(frame, code, |v| v <= 0)?,
        IfIcmpeq => cmp::if_icmp(frame, code, |x, y| x == y)?,
        IfIcmpne => cmp::if_icmp(frame, code, |x, y| x != y)?,
        IfIcmplt => cmp::if_icmp(frame, code, |x, y| x < y)?,
        IfIcmpge => cmp::if_icmp(frame, code, |x, y| x >= y)?,
        IfIcmpgt => cmp::if_icmp(frame, code, |x, y| x > y)?,
        IfIcmple => cmp::if_icmp(frame, code, |x, y| x <= y)?,
        IfAcmpeq => cmp::if_acmp(frame, code, true)?,
        IfAcmpne => cmp::if_acmp(frame, code, false)?,
        Ifnull => cmp::if_null(frame, code, true)?,
        Ifnonnull => cmp::if_null(frame, code, false)?,

        Goto => cmp::goto(frame, code),
        GotoW => cmp::goto_w(frame, code),
        Jsr => cmp::jsr(frame, code)?,
        JsrW => cmp::jsr_w(frame, code)?,
        Ret => cmp::ret(frame, code)?,
        Tableswitch => general::tableswitch(frame, code)?,
        Lookupswitch => general::lookupswitch(frame, code)?,

        Ireturn | Lreturn | Freturn | Dreturn | Areturn => {
            return Ok(OpResult::Return(frame.pop()?));
        }
        Return => return Ok(OpResult::ReturnVoid),

        Getstatic => general::getstatic(vm, class, frame, code)?,
        Putstatic => general::putstatic(vm, class, frame, code)?,
        Invokevirtual => general::invoke(vm, class, frame, code, true)?,
        Invokestatic => general::invoke(vm, class, frame, code, false)?,

        Newarray => array::newarray(frame, &mut vm.heap, code)?,
        Multianewarray => array::multianewarray(frame, class, &mut vm.heap, code)?,
        Arraylength => array::arraylength(frame, &vm.heap)?,

        // The rest of the reference and extended families needs an object
        // model this core does not have.
        Nop | Getfield | Putfield | Invokespecial | Invokeinterface | Invokedynamic | New
        | Anewarray | Athrow | Checkcast | Instanceof | Monitorenter | Monitorexit | Wide => {
            return Err(VmError::Unimplemented(op));
        }
    }

    Ok(OpResult::Continue)
}
