//! Row decoding for two-dimensional (and embedded one-dimensional) coding.
//!
//! A row is represented by its changing elements: the sorted positions at
//! which the colour flips, starting with white. Even entries start a black run,
//! odd entries start a white run. The last entry of a finished row is always the
//! row width.

use crate::bit_reader::BitReader;
use crate::tables::{EOL, EXTENSION, LookupTable, Mode, Tables};
use crate::{DecodeError, Result};
use log::warn;

impl BitReader<'_> {
    /// Decode one table code and consume its bits.
    #[inline(always)]
    fn decode_code(&mut self, table: &LookupTable) -> Result<u16> {
        let (len, value) = table
            .lookup(self.peek_code())
            .ok_or(if self.at_end() {
                DecodeError::UnexpectedEof
            } else {
                DecodeError::InvalidCode
            })?;
        self.consume(len)?;

        Ok(value)
    }

    /// Decode a complete run: any number of make-up codes followed by one
    /// terminating code.
    pub(crate) fn decode_run(&mut self, table: &LookupTable) -> Result<u32> {
        let mut total = 0_u32;

        loop {
            let value = self.decode_code(table)?;

            if value == EOL || value == EXTENSION {
                return Err(DecodeError::InvalidCode);
            }

            total = total
                .checked_add(value as u32)
                .ok_or(DecodeError::Overflow)?;

            if value < 64 {
                return Ok(total);
            }
        }
    }

    pub(crate) fn decode_mode(&mut self, table: &LookupTable) -> Result<Mode> {
        let (len, mode) = table.mode(self.peek_code()).ok_or(if self.at_end() {
            DecodeError::UnexpectedEof
        } else {
            DecodeError::InvalidCode
        })?;
        self.consume(len)?;

        Ok(mode)
    }

    /// Whether the next 12 bits are an EOL code.
    pub(crate) fn at_eol(&self) -> bool {
        self.bits_left() >= 12 && self.peek_bits(12) == 1
    }
}

/// Decoding state shared across rows.
pub(crate) struct RowDecoder<'t> {
    tables: &'t Tables,
    width: i32,
    strict: bool,
    /// Changing elements of the previous row.
    pub(crate) reference: Vec<i32>,
    /// Changing elements of the row being decoded.
    pub(crate) coding: Vec<i32>,
}

/// What ended a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowEnd {
    Complete,
    /// Two EOL codes were found in place of the first mode code of a row.
    EndOfBlock,
}

impl<'t> RowDecoder<'t> {
    pub(crate) fn new(tables: &'t Tables, width: u32, strict: bool) -> Result<Self> {
        let width = i32::try_from(width).map_err(|_| DecodeError::Overflow)?;

        Ok(Self {
            tables,
            width,
            strict,
            // "The reference line for the first coding line in a page is an
            // imaginary white line."
            reference: vec![width],
            coding: Vec::new(),
        })
    }

    #[inline(always)]
    fn reference_at(&self, idx: usize) -> i32 {
        self.reference.get(idx).copied().unwrap_or(self.width)
    }

    /// Locate b1 and b2 for the current `a0` and colour.
    ///
    /// "b1: The first changing element on the reference line to the right of
    /// a0 and of opposite colour to the colour of a0."
    /// "b2: The next changing element to the right of b1 on the reference
    /// line."
    fn find_b1_b2(&self, a0: i32, white: bool, start: usize) -> (usize, i32, i32) {
        let mut idx = start;

        while self.reference_at(idx) <= a0 && idx < self.reference.len() {
            idx += 1;
        }

        // Even entries turn black, so a white a0 needs an even b1.
        if (idx % 2 == 0) != white {
            idx += 1;
        }

        (idx, self.reference_at(idx), self.reference_at(idx + 1))
    }

    /// Decode the next row into `coding`, then make it the reference row.
    pub(crate) fn decode_row(&mut self, reader: &mut BitReader<'_>) -> Result<RowEnd> {
        self.coding.clear();

        let mut a0 = -1_i32;
        let mut white = true;
        let mut search = 0;

        while a0 < self.width {
            let mode = reader.decode_mode(&self.tables.mode)?;

            match mode {
                Mode::Pass => {
                    let (idx, _, b2) = self.find_b1_b2(a0, white, search);
                    a0 = b2;
                    search = idx;
                }
                Mode::Horizontal => {
                    let (first, second) = if white {
                        (&self.tables.white, &self.tables.black)
                    } else {
                        (&self.tables.black, &self.tables.white)
                    };

                    let a0a1 = reader.decode_run(first)? as i32;
                    let a1a2 = reader.decode_run(second)? as i32;

                    let a1 = a0.max(0).checked_add(a0a1).ok_or(DecodeError::Overflow)?;
                    let a2 = a1.checked_add(a1a2).ok_or(DecodeError::Overflow)?;

                    self.push(a1)?;
                    self.push(a2)?;
                    a0 = a2;
                }
                Mode::Vertical(delta) => {
                    let (idx, b1, _) = self.find_b1_b2(a0, white, search);
                    let a1 = b1 + delta as i32;

                    if a1 < a0.max(0) {
                        return Err(DecodeError::InvalidCode);
                    }

                    self.push(a1)?;
                    a0 = a1;
                    white = !white;
                    search = idx.saturating_sub(1);
                }
                Mode::EndOfLine => {
                    if !self.coding.is_empty() {
                        return Err(DecodeError::InvalidCode);
                    }

                    if reader.at_eol() {
                        reader.consume(12)?;
                        return Ok(RowEnd::EndOfBlock);
                    }

                    self.decode_one_dimensional(reader)?;
                    a0 = self.width;
                }
                Mode::Extension => return Err(DecodeError::InvalidCode),
            }

            // Pass and vertical modes never move backwards on a valid line.
            if a0 > self.width {
                self.overrun()?;
                a0 = self.width;
            }
        }

        self.finish_row()?;

        Ok(RowEnd::Complete)
    }

    /// Decode a row of alternating white/black runs.
    fn decode_one_dimensional(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        let mut pos = 0_i32;
        let mut white = true;

        while pos < self.width {
            let table = if white {
                &self.tables.white
            } else {
                &self.tables.black
            };

            let run = reader.decode_run(table)? as i32;
            pos = pos.checked_add(run).ok_or(DecodeError::Overflow)?;
            self.push(pos)?;
            white = !white;
        }

        Ok(())
    }

    fn push(&mut self, pos: i32) -> Result<()> {
        if pos > self.width {
            self.overrun()?;
            self.coding.push(self.width);
        } else {
            self.coding.push(pos);
        }

        Ok(())
    }

    fn overrun(&self) -> Result<()> {
        if self.strict {
            return Err(DecodeError::RowOverrun);
        }

        warn!("changing element beyond the row width, clamping");

        Ok(())
    }

    /// Enforce that the last changing element is the row width and swap the
    /// row buffers.
    fn finish_row(&mut self) -> Result<()> {
        match self.coding.last() {
            Some(&last) if last == self.width => {}
            _ => self.coding.push(self.width),
        }

        debug_assert_eq!(self.coding.last().copied(), Some(self.width));

        core::mem::swap(&mut self.reference, &mut self.coding);

        Ok(())
    }

    /// Pack the last finished row into `out`, 1 meaning black.
    pub(crate) fn pack_row(&self, out: &mut [u8]) {
        out.fill(0);

        for pair in self.reference.chunks(2) {
            let start = pair[0] as usize;
            let end = pair.get(1).copied().unwrap_or(self.width) as usize;
            fill_bits(out, start, end);
        }
    }
}

/// Set the bits `start..end` of a packed row.
fn fill_bits(row: &mut [u8], start: usize, end: usize) {
    let mut x = start;

    while x < end {
        if x % 8 == 0 && end - x >= 8 {
            let full = (end - x) / 8;
            row[x / 8..x / 8 + full].fill(0xFF);
            x += full * 8;
        } else {
            row[x / 8] |= 0x80 >> (x % 8);
            x += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::tables;

    #[test]
    fn white_runs() {
        let tables = tables().unwrap();

        // 0 = 00110101
        let data = [0b0011_0101];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.decode_run(&tables.white), Ok(0));

        // 64 + 1: 11011 000111
        let data = [0b1101_1000, 0b1110_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.decode_run(&tables.white), Ok(65));

        // 2560 + 2560 + 7: 000000011111 x2, 1111
        let data = [0b0000_0001, 0b1111_0000, 0b0001_1111, 0b1111_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.decode_run(&tables.white), Ok(5127));
    }

    #[test]
    fn black_runs() {
        let tables = tables().unwrap();

        // 0 = 0000110111
        let data = [0b0000_1101, 0b1100_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.decode_run(&tables.black), Ok(0));

        // 64 + 64 + 1: 0000001111 x2, 010
        let data = [0b0000_0011, 0b1100_0000, 0b1111_0100];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.decode_run(&tables.black), Ok(129));
    }

    #[test]
    fn mode_codes() {
        let tables = tables().unwrap();
        let cases = [
            (0b1000_0000, Mode::Vertical(0)),
            (0b0010_0000, Mode::Horizontal),
            (0b0001_0000, Mode::Pass),
            (0b0110_0000, Mode::Vertical(1)),
            (0b0100_0000, Mode::Vertical(-1)),
            (0b0000_1100, Mode::Vertical(2)),
            (0b0000_1000, Mode::Vertical(-2)),
            (0b0000_0110, Mode::Vertical(3)),
            (0b0000_0100, Mode::Vertical(-3)),
        ];

        for (byte, mode) in cases {
            let data = [byte];
            let mut reader = BitReader::new(&data);
            assert_eq!(reader.decode_mode(&tables.mode), Ok(mode));
        }
    }

    #[test]
    fn eof_is_reported() {
        let tables = tables().unwrap();
        let mut reader = BitReader::new(&[]);
        assert_eq!(
            reader.decode_run(&tables.white),
            Err(DecodeError::UnexpectedEof)
        );
        assert_eq!(
            reader.decode_mode(&tables.mode),
            Err(DecodeError::UnexpectedEof)
        );
    }

    #[test]
    fn vertical_rows_copy_reference() {
        let tables = tables().unwrap();
        let mut rows = RowDecoder::new(tables, 8, true).unwrap();
        rows.reference = vec![2, 5, 8];

        // V0 V0 V0: the row equals the reference row.
        let data = [0b1110_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(rows.decode_row(&mut reader), Ok(RowEnd::Complete));
        assert_eq!(rows.reference, vec![2, 5, 8]);

        let mut packed = [0_u8];
        rows.pack_row(&mut packed);
        assert_eq!(packed, [0b0011_1000]);
    }

    #[test]
    fn row_always_ends_at_width() {
        let tables = tables().unwrap();
        let mut rows = RowDecoder::new(tables, 16, true).unwrap();

        // Pass mode straight to the end of an all-white reference.
        let data = [0b0001_0000];
        let mut reader = BitReader::new(&data);
        rows.decode_row(&mut reader).unwrap();
        assert_eq!(rows.reference.last().copied(), Some(16));
    }

    #[test]
    fn strict_overrun_fails() {
        let tables = tables().unwrap();
        let mut rows = RowDecoder::new(tables, 4, true).unwrap();

        // Horizontal, white 7 (1111), black 2 (11).
        let data = [0b0011_1111, 0b1000_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(rows.decode_row(&mut reader), Err(DecodeError::RowOverrun));
    }
}
