//! MSB-first bit reader over MMR-coded data.

use crate::tables::MAX_CODE_LEN;
use crate::{DecodeError, Result};

#[derive(Debug, Clone)]
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    bit_offset: usize,
}

impl<'a> BitReader<'a> {
    #[inline(always)]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_offset: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_offset)
    }

    /// Peek the next `count` bits, padding with zeros past the end.
    #[inline(always)]
    pub(crate) fn peek_bits(&self, count: u8) -> u32 {
        debug_assert!(count <= 32);

        let mut value = 0_u32;
        let mut pos = self.bit_offset;
        let mut remaining = count;

        while remaining > 0 {
            let byte = self.data.get(pos >> 3).copied().unwrap_or(0) as u32;
            let available = 8 - (pos & 7) as u8;
            let take = remaining.min(available);
            let bits = (byte >> (available - take)) & ((1 << take) - 1);

            value = (value << take) | bits;
            pos += take as usize;
            remaining -= take;
        }

        value
    }

    /// The next bits of the stream, sized for a table lookup.
    #[inline(always)]
    pub(crate) fn peek_code(&self) -> u32 {
        self.peek_bits(MAX_CODE_LEN)
    }

    /// Consume `count` bits that were previously peeked.
    #[inline(always)]
    pub(crate) fn consume(&mut self, count: u8) -> Result<()> {
        if count as usize > self.bits_left() {
            return Err(DecodeError::UnexpectedEof);
        }

        self.bit_offset += count as usize;

        Ok(())
    }

    #[inline(always)]
    pub(crate) fn align(&mut self) {
        let bit_pos = self.bit_offset & 7;

        if bit_pos != 0 {
            self.bit_offset += 8 - bit_pos;
        }
    }

    #[inline(always)]
    pub(crate) fn at_end(&self) -> bool {
        self.bits_left() == 0
    }

    #[inline(always)]
    pub(crate) fn byte_pos(&self) -> usize {
        self.bit_offset.div_ceil(8).min(self.data.len())
    }
}
