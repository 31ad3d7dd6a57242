//! Structural validation of a method's code array. The walk advances one
//! instruction at a time using the operand-width table; when it finishes it
//! must land exactly on the end of the array. Switch padding, branch-table
//! bounds, pool references embedded in instructions and the `wide` secondary
//! opcode are all checked here, so the interpreter can decode operands
//! without re-validating.

use num_traits::FromPrimitive;

use crate::class::constant::{ConstantPool, Expected};
use crate::error::ClassError;
use crate::instruction::{operand_shape, Opcode, Operands};

struct Walker<'a> {
    code: &'a [u8],
    pc: usize,
}

impl<'a> Walker<'a> {
    fn take_u8(&mut self) -> Result<u8, ClassError> {
        let byte = *self.code.get(self.pc).ok_or(ClassError::Code)?;
        self.pc += 1;
        Ok(byte)
    }

    fn take_u16(&mut self) -> Result<u16, ClassError> {
        let hi = self.take_u8()?;
        let lo = self.take_u8()?;
        Ok((hi as u16) << 8 | lo as u16)
    }

    fn take_i32(&mut self) -> Result<i32, ClassError> {
        let mut word = 0u32;
        for _ in 0..4 {
            word = word << 8 | self.take_u8()? as u32;
        }
        Ok(word as i32)
    }

    fn skip(&mut self, count: usize) -> Result<(), ClassError> {
        if self.pc + count > self.code.len() {
            return Err(ClassError::Code);
        }
        self.pc += count;
        Ok(())
    }

    /// Skip the padding that aligns switch operands to a 4-byte boundary.
    fn align(&mut self) -> Result<(), ClassError> {
        while self.pc % 4 != 0 {
            self.skip(1)?;
        }
        Ok(())
    }

    fn check_target(&self, base: usize, offset: i32) -> Result<(), ClassError> {
        let target = base as i64 + offset as i64;
        if target < 0 || target >= self.code.len() as i64 {
            return Err(ClassError::Code);
        }
        Ok(())
    }
}

pub fn validate_code(code: &[u8], pool: &ConstantPool) -> Result<(), ClassError> {
    let mut walker = Walker { code, pc: 0 };

    while walker.pc < code.len() {
        let base = walker.pc;
        let byte = walker.take_u8()?;
        let op = match Opcode::from_u8(byte) {
            Some(op) if byte < Opcode::LAST => op,
            _ => return Err(ClassError::Code),
        };

        match op {
            Opcode::Wide => match Opcode::from_u8(walker.take_u8()?) {
                Some(Opcode::Iinc) => walker.skip(4)?,
                Some(
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
                    | Opcode::Ret,
                ) => walker.skip(2)?,
                _ => return Err(ClassError::Code),
            },
            Opcode::Lookupswitch => {
                walker.align()?;
                let _default = walker.take_i32()?;
                let npairs = walker.take_i32()?;
                if npairs < 0 {
                    return Err(ClassError::Code);
                }
                walker.skip((npairs as usize).checked_mul(8).ok_or(ClassError::Code)?)?;
            }
            Opcode::Tableswitch => {
                walker.align()?;
                let default = walker.take_i32()?;
                let low = walker.take_i32()?;
                let high = walker.take_i32()?;
                walker.check_target(base, default)?;
                if low > high {
                    return Err(ClassError::Code);
                }
                for _ in low..=high {
                    let offset = walker.take_i32()?;
                    walker.check_target(base, offset)?;
                }
            }
            Opcode::Ldc => {
                let index = walker.take_u8()? as u16;
                pool.check_index(index, Expected::SingleWord)?;
            }
            Opcode::LdcW => {
                let index = walker.take_u16()?;
                pool.check_index(index, Expected::SingleWord)?;
            }
            Opcode::Ldc2W => {
                let index = walker.take_u16()?;
                pool.check_index(index, Expected::DoubleWord)?;
            }
            Opcode::Getstatic | Opcode::Putstatic | Opcode::Getfield | Opcode::Putfield => {
                let index = walker.take_u16()?;
                pool.check_index(index, Expected::FieldRef)?;
            }
            Opcode::Invokestatic => {
                let index = walker.take_u16()?;
                pool.check_index(index, Expected::MethodRef)?;
                // Initializers can only be invoked implicitly.
                let (_, name, _) = pool.member_ref(index)?;
                if name == "<init>" || name == "<clinit>" {
                    return Err(ClassError::Method);
                }
            }
            Opcode::Multianewarray => {
                let index = walker.take_u16()?;
                pool.check_index(index, Expected::Class)?;
                if walker.take_u8()? < 1 {
                    return Err(ClassError::Code);
                }
            }
            _ => match operand_shape(byte) {
                Operands::Fixed(count) => walker.skip(count as usize)?,
                _ => return Err(ClassError::Code),
            },
        }
    }

    // The walk consumed operands in-bounds, so reaching here means the final
    // instruction ended exactly at the array end.
    if walker.pc != code.len() {
        return Err(ClassError::Code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode::*;

    fn empty_pool() -> ConstantPool {
        ConstantPool::read(&mut std::io::Cursor::new([0u8, 1])).unwrap()
    }

    /// Pool with one Int constant in slot 1 and one Long in slots 2-3.
    fn literal_pool() -> ConstantPool {
        let bytes = [0u8, 4, 3, 0, 0, 0, 7, 5, 0, 0, 0, 0, 0, 0, 0, 9];
        ConstantPool::read(&mut std::io::Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn empty_code_is_valid() {
        assert!(validate_code(&[], &empty_pool()).is_ok());
    }

    #[test]
    fn straight_line_code() {
        let code = [Iconst0 as u8, Istore1 as u8, Iload1 as u8, Return as u8];
        assert!(validate_code(&code, &empty_pool()).is_ok());
    }

    #[test]
    fn truncated_operand_is_rejected() {
        // bipush with its immediate missing
        assert!(matches!(
            validate_code(&[Bipush as u8], &empty_pool()),
            Err(ClassError::Code)
        ));
    }

    #[test]
    fn reserved_opcode_is_rejected() {
        assert!(matches!(
            validate_code(&[0xCA], &empty_pool()),
            Err(ClassError::Code)
        ));
        assert!(matches!(
            validate_code(&[0xFF], &empty_pool()),
            Err(ClassError::Code)
        ));
    }

    #[test]
    fn ldc_checks_pool_tag() {
        assert!(validate_code(&[Ldc as u8, 1, Return as u8], &literal_pool()).is_ok());
        // Slot 2 is a Long: not loadable by single-word ldc.
        assert!(matches!(
            validate_code(&[Ldc as u8, 2, Return as u8], &literal_pool()),
            Err(ClassError::Constant(2))
        ));
        assert!(validate_code(&[Ldc2W as u8, 0, 2, Return as u8], &literal_pool()).is_ok());
        assert!(matches!(
            validate_code(&[Ldc2W as u8, 0, 1, Return as u8], &literal_pool()),
            Err(ClassError::Constant(1))
        ));
    }

    #[test]
    fn wide_accepts_only_local_forms() {
        let good = [Wide as u8, Iload as u8, 0, 5, Return as u8];
        assert!(validate_code(&good, &empty_pool()).is_ok());
        let iinc = [Wide as u8, Iinc as u8, 0, 5, 0, 1, Return as u8];
        assert!(validate_code(&iinc, &empty_pool()).is_ok());
        let bad = [Wide as u8, Iadd as u8, 0, 5, Return as u8];
        assert!(matches!(
            validate_code(&bad, &empty_pool()),
            Err(ClassError::Code)
        ));
    }

    fn switch_bytes(opcode: u8, words: &[i32]) -> Vec<u8> {
        let mut code = vec![opcode];
        while code.len() % 4 != 0 {
            code.push(0);
        }
        for word in words {
            code.extend_from_slice(&word.to_be_bytes());
        }
        code.push(Return as u8);
        code
    }

    #[test]
    fn tableswitch_low_equals_high() {
        // default 0, low == high == 1, one table entry
        let code = switch_bytes(Tableswitch as u8, &[0, 1, 1, 0]);
        assert!(validate_code(&code, &empty_pool()).is_ok());
    }

    #[test]
    fn tableswitch_high_below_low_is_rejected() {
        let code = switch_bytes(Tableswitch as u8, &[0, 2, 1]);
        assert!(matches!(
            validate_code(&code, &empty_pool()),
            Err(ClassError::Code)
        ));
    }

    #[test]
    fn tableswitch_target_out_of_range_is_rejected() {
        let code = switch_bytes(Tableswitch as u8, &[500, 1, 1, 0]);
        assert!(matches!(
            validate_code(&code, &empty_pool()),
            Err(ClassError::Code)
        ));
    }

    #[test]
    fn lookupswitch_negative_npairs_is_rejected() {
        let code = switch_bytes(Lookupswitch as u8, &[0, -1]);
        assert!(matches!(
            validate_code(&code, &empty_pool()),
            Err(ClassError::Code)
        ));
    }

    #[test]
    fn lookupswitch_zero_pairs() {
        let code = switch_bytes(Lookupswitch as u8, &[0, 0]);
        assert!(validate_code(&code, &empty_pool()).is_ok());
    }

    #[test]
    fn multianewarray_dimension_must_be_positive() {
        // Pool with a Class entry in slot 2 naming slot 1.
        let bytes = [0u8, 3, 1, 0, 1, b'A', 7, 0, 1];
        let pool = ConstantPool::read(&mut std::io::Cursor::new(bytes)).unwrap();
        let bad = [Multianewarray as u8, 0, 2, 0, Return as u8];
        assert!(matches!(validate_code(&bad, &pool), Err(ClassError::Code)));
        let good = [Multianewarray as u8, 0, 2, 2, Return as u8];
        assert!(validate_code(&good, &pool).is_ok());
    }

    #[test]
    fn invokestatic_rejects_initializers() {
        // Pool: Utf8 "<init>", Utf8 "()V", NameAndType, Utf8 "A", Class,
        // MethodRef
        let mut bytes = vec![0u8, 7];
        bytes.extend_from_slice(&[1, 0, 6]);
        bytes.extend_from_slice(b"<init>");
        bytes.extend_from_slice(&[1, 0, 3]);
        bytes.extend_from_slice(b"()V");
        bytes.extend_from_slice(&[12, 0, 1, 0, 2]);
        bytes.extend_from_slice(&[1, 0, 1, b'A']);
        bytes.extend_from_slice(&[7, 0, 4]);
        bytes.extend_from_slice(&[10, 0, 5, 0, 3]);
        let pool = ConstantPool::read(&mut std::io::Cursor::new(bytes)).unwrap();
        pool.verify().unwrap();

        let code = [Invokestatic as u8, 0, 6, Return as u8];
        assert!(matches!(
            validate_code(&code, &pool),
            Err(ClassError::Method)
        ));
    }
}
