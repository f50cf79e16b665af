//! Growable read buffer for class file bytes.
//!
//! A `ClassFileBuffer` drains a whole input stream into memory before any
//! parsing starts, then hands out big-endian primitives from a forward-only
//! read pointer. The backing storage doubles whenever it fills up and is kept
//! between entries, so scanning thousands of class files reuses one
//! allocation once it has grown to fit the largest of them.

use std::io::{ErrorKind, Read};

use crate::error::{Error, Result};

const DEFAULT_CAPACITY: usize = 8 * 1024;

#[derive(Debug)]
pub struct ClassFileBuffer {
    buffer: Vec<u8>,
    // number of significant bytes in `buffer`
    size: usize,
    pointer: usize,
}

impl Default for ClassFileBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassFileBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(1)],
            size: 0,
            pointer: 0,
        }
    }

    /// Replaces the buffer contents with everything `input` yields until end of data.
    pub fn read_from<R: Read + ?Sized>(&mut self, input: &mut R) -> std::io::Result<()> {
        self.pointer = 0;
        self.size = 0;
        loop {
            if self.size == self.buffer.len() {
                self.grow();
            }
            match input.read(&mut self.buffer[self.size..]) {
                Ok(0) => return Ok(()),
                Ok(n) => self.size += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn position(&self) -> usize {
        self.pointer
    }

    pub fn read_fully(&mut self, out: &mut [u8]) -> Result<()> {
        out.copy_from_slice(self.take(out.len())?);
        Ok(())
    }

    pub fn skip_bytes(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_byte(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.take_array()?))
    }

    pub fn read_unsigned_byte(&mut self) -> Result<u8> {
        Ok(u8::from_be_bytes(self.take_array()?))
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_short(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_unsigned_short(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_int(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_long(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(u32::from_be_bytes(self.take_array()?)))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.take_array()?)))
    }

    /// Reads a u2 length followed by that many bytes of modified UTF-8.
    /// The length prefix is only consumed together with the string.
    pub fn read_utf(&mut self) -> Result<String> {
        self.check(2)?;
        let len = usize::from(u16::from_be_bytes([
            self.buffer[self.pointer],
            self.buffer[self.pointer + 1],
        ]));
        self.check(2 + len)?;
        self.pointer += 2;
        let offset = self.pointer;
        let bytes = self.take(len)?;
        decode_modified_utf8(bytes).ok_or(Error::MalformedUtf8 { offset })
    }

    fn check(&self, n: usize) -> Result<()> {
        let available = self.size - self.pointer;
        if n > available {
            return Err(Error::UnexpectedEof {
                offset: self.pointer,
                wanted: n,
                available,
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.check(n)?;
        let start = self.pointer;
        self.pointer += n;
        Ok(&self.buffer[start..self.pointer])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn grow(&mut self) {
        let doubled = self.buffer.len() * 2;
        self.buffer.resize(doubled, 0);
    }
}

fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if bytes.is_ascii() {
        return Some(bytes.iter().map(|&b| char::from(b)).collect());
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = u16::from(bytes[i]);
        match b >> 4 {
            0..=7 => {
                units.push(b);
                i += 1;
            }
            12 | 13 => {
                let b2 = continuation(bytes.get(i + 1))?;
                units.push(((b & 0x1F) << 6) | b2);
                i += 2;
            }
            14 => {
                let b2 = continuation(bytes.get(i + 1))?;
                let b3 = continuation(bytes.get(i + 2))?;
                units.push(((b & 0x0F) << 12) | (b2 << 6) | b3);
                i += 3;
            }
            _ => return None,
        }
    }

    Some(
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    )
}

fn continuation(byte: Option<&u8>) -> Option<u16> {
    let b = *byte?;
    (b & 0xC0 == 0x80).then_some(u16::from(b & 0x3F))
}
