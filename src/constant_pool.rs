use tracing::trace;

use crate::buffer::ClassFileBuffer;
use crate::error::{Error, Result};

const CP_UTF8: u8 = 1;
const CP_INTEGER: u8 = 3;
const CP_FLOAT: u8 = 4;
const CP_LONG: u8 = 5;
const CP_DOUBLE: u8 = 6;
const CP_CLASS: u8 = 7;
const CP_STRING: u8 = 8;
const CP_REF_FIELD: u8 = 9;
const CP_REF_METHOD: u8 = 10;
const CP_REF_INTERFACE: u8 = 11;
const CP_NAME_AND_TYPE: u8 = 12;
const CP_METHOD_HANDLE: u8 = 15;
const CP_METHOD_TYPE: u8 = 16;
const CP_DYNAMIC: u8 = 17;
const CP_INVOKE_DYNAMIC: u8 = 18;
const CP_MODULE: u8 = 19;
const CP_PACKAGE: u8 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Unused,
    Text(String),
    /// Class or String entry pointing at a Utf8 entry, possibly a later one.
    Indirect(u16),
}

/// The parts of a class file's constant pool needed to resolve names.
///
/// Slot 0 and the slot after every Long/Double entry stay `Unused`. Numeric
/// and reference entries are skipped by width and also left `Unused`.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    slots: Vec<Constant>,
}

impl ConstantPool {
    pub fn read(input: &mut ClassFileBuffer) -> Result<Self> {
        let count = input.read_unsigned_short()?;
        let mut slots = vec![Constant::Unused; usize::from(count.max(1))];
        let mut index = 1u32;
        while index < u32::from(count) {
            let wide = read_entry(input, index as u16, &mut slots[index as usize])?;
            index += if wide { 2 } else { 1 };
        }
        trace!(count, "read constant pool");
        Ok(Self { slots })
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.slots.get(usize::from(index))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 1
    }

    pub fn resolve(&self, index: u16) -> Result<&str> {
        let unresolvable = Error::UnresolvableConstant { index };
        if index == 0 {
            return Err(unresolvable);
        }
        match self.get(index) {
            Some(Constant::Text(s)) => Ok(s),
            Some(Constant::Indirect(target)) if *target != 0 => match self.get(*target) {
                Some(Constant::Text(s)) => Ok(s),
                _ => Err(unresolvable),
            },
            _ => Err(unresolvable),
        }
    }

    /// Reads a u2 constant pool index from `input` and resolves it.
    pub fn resolve_next(&self, input: &mut ClassFileBuffer) -> Result<&str> {
        let index = input.read_unsigned_short()?;
        self.resolve(index)
    }
}

// Returns true when the entry occupies two slots.
fn read_entry(input: &mut ClassFileBuffer, index: u16, slot: &mut Constant) -> Result<bool> {
    let tag = input.read_unsigned_byte()?;
    match tag {
        CP_METHOD_TYPE | CP_MODULE | CP_PACKAGE => input.skip_bytes(2)?,
        CP_METHOD_HANDLE => input.skip_bytes(3)?,
        CP_INTEGER | CP_FLOAT | CP_REF_FIELD | CP_REF_METHOD | CP_REF_INTERFACE
        | CP_NAME_AND_TYPE | CP_DYNAMIC | CP_INVOKE_DYNAMIC => input.skip_bytes(4)?,
        CP_LONG | CP_DOUBLE => {
            input.skip_bytes(8)?;
            return Ok(true);
        }
        CP_UTF8 => *slot = Constant::Text(input.read_utf()?),
        CP_CLASS | CP_STRING => *slot = Constant::Indirect(input.read_unsigned_short()?),
        _ => return Err(Error::UnknownConstantTag { tag, index }),
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes(count: u16, entries: &[&[u8]]) -> ClassFileBuffer {
        let mut bytes = count.to_be_bytes().to_vec();
        for e in entries {
            bytes.extend_from_slice(e);
        }
        let mut buffer = ClassFileBuffer::new();
        buffer.read_from(&mut bytes.as_slice()).unwrap();
        buffer
    }

    #[test]
    fn wide_entries_leave_next_slot_unused() {
        // #1 Long, (#2 unused), #3 Utf8 "x", #4 Class -> #3
        let mut input = pool_bytes(
            5,
            &[
                &[CP_LONG, 0, 0, 0, 0, 0, 0, 0, 7],
                &[CP_UTF8, 0, 1, b'x'],
                &[CP_CLASS, 0, 3],
            ],
        );
        let pool = ConstantPool::read(&mut input).unwrap();

        assert_eq!(pool.len(), 5);
        assert_eq!(pool.get(2), Some(&Constant::Unused));
        assert_eq!(pool.get(3), Some(&Constant::Text("x".to_string())));
        assert_eq!(pool.resolve(4).unwrap(), "x");
        assert!(pool.resolve(2).is_err());
        assert_eq!(input.position(), input.size());
    }

    #[test]
    fn indirect_entries_may_point_forward() {
        // #1 String -> #2, #2 Utf8 "hello"
        let mut input = pool_bytes(
            3,
            &[&[CP_STRING, 0, 2], &[CP_UTF8, 0, 5, b'h', b'e', b'l', b'l', b'o']],
        );
        let pool = ConstantPool::read(&mut input).unwrap();
        assert_eq!(pool.resolve(1).unwrap(), "hello");
        assert_eq!(pool.resolve(2).unwrap(), "hello");
    }

    #[test]
    fn index_zero_and_out_of_range_are_rejected() {
        let mut input = pool_bytes(2, &[&[CP_UTF8, 0, 1, b'a']]);
        let pool = ConstantPool::read(&mut input).unwrap();
        assert!(matches!(
            pool.resolve(0),
            Err(Error::UnresolvableConstant { index: 0 })
        ));
        assert!(pool.resolve(9).is_err());
    }

    #[test]
    fn reference_entries_are_skipped_by_width() {
        let mut input = pool_bytes(
            6,
            &[
                &[CP_METHOD_HANDLE, 1, 0, 2],
                &[CP_METHOD_TYPE, 0, 1],
                &[CP_NAME_AND_TYPE, 0, 1, 0, 2],
                &[CP_DOUBLE, 0, 0, 0, 0, 0, 0, 0, 0],
            ],
        );
        let pool = ConstantPool::read(&mut input).unwrap();
        assert_eq!(pool.get(1), Some(&Constant::Unused));
        assert_eq!(input.position(), input.size());
    }

    #[test]
    fn unknown_tag_is_a_format_error() {
        let mut input = pool_bytes(3, &[&[CP_UTF8, 0, 0], &[2, 0, 0]]);
        assert!(matches!(
            ConstantPool::read(&mut input),
            Err(Error::UnknownConstantTag { tag: 2, index: 2 })
        ));
    }
}
