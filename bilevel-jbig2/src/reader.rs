//! A bit and byte reader over a window of the encoded data.
//!
//! Every reader sees a window `[base, base + len)` of one underlying buffer.
//! Sub-readers narrow that window further, so a region decoder can never read
//! past the data length declared in its segment header.

use std::io::SeekFrom;

use crate::error::{ParseError, Result};

/// A saved reader position, see [`Reader::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mark(usize);

#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    /// The complete underlying buffer.
    data: &'a [u8],
    /// Start of the window in `data`, in bytes.
    base: usize,
    /// Length of the window in bytes.
    len: usize,
    /// Position relative to `base`, in bits.
    cur_pos: usize,
}

impl<'a> Reader<'a> {
    #[inline]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            base: 0,
            len: data.len(),
            cur_pos: 0,
        }
    }

    /// A reader over `len` bytes starting at byte `offset` of this window.
    ///
    /// The offset is relative to this reader's window, so nested sub-readers
    /// compose.
    pub(crate) fn sub_reader(&self, offset: usize, len: usize) -> Result<Self> {
        let end = offset.checked_add(len).ok_or(ParseError::OutOfBounds)?;

        if end > self.len {
            return Err(ParseError::OutOfBounds.into());
        }

        Ok(Self {
            data: self.data,
            base: self.base + offset,
            len,
            cur_pos: 0,
        })
    }

    /// A sub-reader over the next `len` bytes, advancing past them.
    pub(crate) fn split_off(&mut self, len: usize) -> Result<Self> {
        self.align();
        let sub = self.sub_reader(self.byte_pos(), len)?;
        self.cur_pos += len * 8;

        Ok(sub)
    }

    /// The bytes of the window.
    #[inline]
    pub(crate) fn window(&self) -> &'a [u8] {
        &self.data[self.base..self.base + self.len]
    }

    /// The absolute offset of the window start in the underlying buffer.
    #[inline]
    pub(crate) fn base(&self) -> usize {
        self.base
    }

    /// Discard the rest of a partially read byte, returning the number of bits
    /// skipped.
    #[inline]
    pub(crate) fn align(&mut self) -> u8 {
        let bit_pos = self.bit_pos();

        if bit_pos == 0 {
            0
        } else {
            self.cur_pos += 8 - bit_pos;
            (8 - bit_pos) as u8
        }
    }

    #[inline]
    pub(crate) fn at_end(&self) -> bool {
        self.byte_pos() >= self.len
    }

    /// The window length in bytes.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// The current byte position within the window.
    #[inline]
    pub(crate) fn stream_position(&self) -> usize {
        self.byte_pos()
    }

    /// The remaining bytes, starting at the current (aligned) position.
    #[inline]
    pub(crate) fn tail(&self) -> &'a [u8] {
        let start = self.byte_pos().min(self.len);
        &self.window()[start..]
    }

    pub(crate) fn seek(&mut self, pos: SeekFrom) -> Result<usize> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => self.byte_pos() as i128 + i128::from(delta),
            SeekFrom::End(delta) => self.len as i128 + i128::from(delta),
        };

        if target < 0 || target > self.len as i128 {
            return Err(ParseError::OutOfBounds.into());
        }

        self.cur_pos = target as usize * 8;

        Ok(target as usize)
    }

    /// Save the current position.
    #[inline]
    pub(crate) fn mark(&self) -> Mark {
        Mark(self.cur_pos)
    }

    /// Return to a position saved with [`Reader::mark`].
    #[inline]
    pub(crate) fn reset(&mut self, mark: Mark) {
        self.cur_pos = mark.0;
    }

    /// Read the given number of bytes.
    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.align();

        let bytes = self.peek_bytes(len)?;
        self.cur_pos += len * 8;

        Ok(bytes)
    }

    pub(crate) fn peek_bytes(&self, len: usize) -> Result<&'a [u8]> {
        let start = self.byte_pos();
        let end = start.checked_add(len).ok_or(ParseError::UnexpectedEof)?;

        self.window()
            .get(start..end)
            .ok_or(ParseError::UnexpectedEof.into())
    }

    pub(crate) fn skip_bytes(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    #[inline]
    pub(crate) fn read_byte(&mut self) -> Result<u8> {
        if self.bit_pos() == 0 {
            let byte = self.cur_byte()?;
            self.cur_pos += 8;
            Ok(byte)
        } else {
            Ok(self.read_bits(8)? as u8)
        }
    }

    #[inline]
    pub(crate) fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_byte()? as i8)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes([self.read_byte()?, self.read_byte()?]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes([
            self.read_byte()?,
            self.read_byte()?,
            self.read_byte()?,
            self.read_byte()?,
        ]))
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    #[inline]
    pub(crate) fn read_bit(&mut self) -> Result<u32> {
        let byte = self.cur_byte()?;
        let shift = 7 - self.bit_pos();
        self.cur_pos += 1;

        Ok(((byte >> shift) & 1) as u32)
    }

    /// Read up to 32 bits, most significant first.
    pub(crate) fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32);

        let mut value = 0_u64;
        let mut remaining = count;

        while remaining > 0 {
            let byte = self.cur_byte()? as u64;
            let available = (8 - self.bit_pos()) as u8;
            let take = remaining.min(available);
            let bits = (byte >> (available - take)) & ((1 << take) - 1);

            value = (value << take) | bits;
            self.cur_pos += take as usize;
            remaining -= take;
        }

        Ok(value as u32)
    }

    #[inline]
    pub(crate) fn byte_pos(&self) -> usize {
        self.cur_pos >> 3
    }

    #[inline]
    pub(crate) fn bit_pos(&self) -> usize {
        self.cur_pos & 7
    }

    #[inline]
    fn cur_byte(&self) -> Result<u8> {
        if self.byte_pos() >= self.len {
            return Err(ParseError::UnexpectedEof.into());
        }

        Ok(self.data[self.base + self.byte_pos()])
    }
}
