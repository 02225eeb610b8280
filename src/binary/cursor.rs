//! Bounds-checked reader over an immutable byte slice.
//!
//! Every read advances an explicit offset and fails with [`CursorError`]
//! instead of reading past the end of the buffer. The hand-written ELF and
//! DWARF walkers are built entirely on this type.

use thiserror::Error;

/// Byte order of multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    #[error("unexpected end of data at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("LEB128 value at offset {0} does not fit in 64 bits")]
    Leb128Overflow(usize),

    #[error("unterminated string at offset {0}")]
    UnterminatedString(usize),

    #[error("offset {offset} is outside a buffer of {len} bytes")]
    OutOfRange { offset: u64, len: usize },
}

pub type CursorResult<T> = std::result::Result<T, CursorError>;

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            pos: 0,
            endian,
        }
    }

    /// Cursor positioned at `offset`, which may equal the buffer length.
    pub fn at(data: &'a [u8], offset: u64, endian: Endian) -> CursorResult<Self> {
        let mut cursor = Self::new(data, endian);
        cursor.seek(offset)?;
        Ok(cursor)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn seek(&mut self, offset: u64) -> CursorResult<()> {
        let offset = usize::try_from(offset)
            .ok()
            .filter(|o| *o <= self.data.len())
            .ok_or(CursorError::OutOfRange {
                offset,
                len: self.data.len(),
            })?;
        self.pos = offset;
        Ok(())
    }

    pub fn skip(&mut self, len: u64) -> CursorResult<()> {
        let len = usize::try_from(len).map_err(|_| self.eof(usize::MAX))?;
        self.bytes(len).map(|_| ())
    }

    /// Borrow the next `len` bytes.
    pub fn bytes(&mut self, len: usize) -> CursorResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.eof(len))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Split off the next `len` bytes as an independent cursor.
    pub fn sub_cursor(&mut self, len: u64) -> CursorResult<Cursor<'a>> {
        let len = usize::try_from(len).map_err(|_| self.eof(usize::MAX))?;
        let data = self.bytes(len)?;
        Ok(Cursor::new(data, self.endian))
    }

    pub fn u8(&mut self) -> CursorResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn i8(&mut self) -> CursorResult<i8> {
        Ok(i8::from_ne_bytes(self.array::<1>()?))
    }

    pub fn u16(&mut self) -> CursorResult<u16> {
        let raw = self.array::<2>()?;
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(raw),
            Endian::Big => u16::from_be_bytes(raw),
        })
    }

    pub fn u32(&mut self) -> CursorResult<u32> {
        let raw = self.array::<4>()?;
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        })
    }

    pub fn u64(&mut self) -> CursorResult<u64> {
        let raw = self.array::<8>()?;
        Ok(match self.endian {
            Endian::Little => u64::from_le_bytes(raw),
            Endian::Big => u64::from_be_bytes(raw),
        })
    }

    /// Three-byte unsigned integer, as used by `DW_FORM_strx3`.
    pub fn u24(&mut self) -> CursorResult<u64> {
        let raw = self.array::<3>()?;
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        Ok(match self.endian {
            Endian::Little => raw.iter().rev().fold(0, fold),
            Endian::Big => raw.iter().fold(0, fold),
        })
    }

    /// Unsigned integer of `size` bytes (1, 2, 4 or 8).
    pub fn uint(&mut self, size: u8) -> CursorResult<u64> {
        match size {
            1 => self.u8().map(u64::from),
            2 => self.u16().map(u64::from),
            4 => self.u32().map(u64::from),
            8 => self.u64(),
            other => Err(self.eof(usize::from(other))),
        }
    }

    /// A 4-byte or 8-byte offset depending on the DWARF/ELF class.
    pub fn offset(&mut self, is_64: bool) -> CursorResult<u64> {
        if is_64 {
            self.u64()
        } else {
            self.u32().map(u64::from)
        }
    }

    pub fn uleb128(&mut self) -> CursorResult<u64> {
        let start = self.pos;
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            let low = u64::from(byte & 0x7f);
            if shift >= 64 || (shift == 63 && low > 1) {
                return Err(CursorError::Leb128Overflow(start));
            }
            result |= low << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn sleb128(&mut self) -> CursorResult<i64> {
        let start = self.pos;
        let mut result: i64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            if shift >= 64 {
                return Err(CursorError::Leb128Overflow(start));
            }
            result |= i64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
    }

    /// NUL-terminated byte string, without the terminator.
    pub fn cstr(&mut self) -> CursorResult<&'a [u8]> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(CursorError::UnterminatedString(self.pos))?;
        let s = &rest[..len];
        self.pos += len + 1;
        Ok(s)
    }

    fn array<const N: usize>(&mut self) -> CursorResult<[u8; N]> {
        let bytes = self.bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn eof(&self, wanted: usize) -> CursorError {
        CursorError::UnexpectedEof {
            offset: self.pos,
            wanted,
        }
    }
}

/// Read a NUL-terminated string starting at `offset` inside `data`.
pub fn cstr_at(data: &[u8], offset: u64) -> CursorResult<&[u8]> {
    Cursor::at(data, offset, Endian::Little)?.cstr()
}
