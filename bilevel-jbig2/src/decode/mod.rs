//! Region and dictionary decoding procedures (clause 6) and the segment data
//! parsers around them (7.4).

pub(crate) mod generic;
pub(crate) mod generic_refinement;
pub(crate) mod halftone;
pub(crate) mod pattern;
pub(crate) mod symbol;
pub(crate) mod text;

use std::rc::Rc;

use crate::bitmap::Bitmap;
use crate::error::{HuffmanError, Result, TemplateError, bail};
use crate::huffman_table::{HuffmanTable, StandardTable};
use crate::reader::Reader;
use crate::segment::region::RegionSegmentInfo;

/// A decoded region bitmap together with its placement on the page.
#[derive(Debug, Clone)]
pub(crate) struct RegionBitmap {
    pub(crate) bitmap: Bitmap,
    pub(crate) info: RegionSegmentInfo,
}

/// "GBTEMPLATE" (6.2.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Template {
    Template0,
    Template1,
    Template2,
    Template3,
}

impl Template {
    pub(crate) fn from_value(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Template0,
            1 => Self::Template1,
            2 => Self::Template2,
            _ => Self::Template3,
        }
    }

    /// The number of AT pixels stored in the segment header.
    pub(crate) fn at_pixel_count(self) -> usize {
        match self {
            Self::Template0 => 4,
            _ => 1,
        }
    }

    pub(crate) fn context_bits(self) -> u32 {
        match self {
            Self::Template0 => 16,
            Self::Template1 => 13,
            Self::Template2 | Self::Template3 => 10,
        }
    }
}

/// "GRTEMPLATE" (6.3.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefinementTemplate {
    Template0,
    Template1,
}

impl RefinementTemplate {
    pub(crate) fn from_bit(bit: bool) -> Self {
        if bit { Self::Template1 } else { Self::Template0 }
    }

    pub(crate) fn context_bits(self) -> u32 {
        match self {
            Self::Template0 => 13,
            Self::Template1 => 10,
        }
    }
}

/// An adaptive template pixel, relative to the pixel being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AtPixel {
    pub(crate) x: i16,
    pub(crate) y: i16,
}

impl AtPixel {
    pub(crate) const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Whether the pixel has already been decoded when the current one is,
    /// see Figure 7.
    fn is_causal(self) -> bool {
        self.y < 0 || (self.y == 0 && self.x < 0)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self::new(
            i16::from(reader.read_i8()?),
            i16::from(reader.read_i8()?),
        ))
    }

    #[inline]
    pub(crate) fn offset(self) -> (i32, i32) {
        (i32::from(self.x), i32::from(self.y))
    }
}

/// Read `count` AT pixels that refer to the bitmap being decoded.
pub(crate) fn parse_at_pixels(reader: &mut Reader<'_>, count: usize) -> Result<Vec<AtPixel>> {
    (0..count)
        .map(|_| {
            let pixel = AtPixel::read(reader)?;

            if !pixel.is_causal() {
                bail!(TemplateError::InvalidAtPixel);
            }

            Ok(pixel)
        })
        .collect()
}

/// Read the two AT pixels of refinement template 0 (7.4.7.3).
///
/// The first pixel lies in the bitmap being decoded, the second one in the
/// reference bitmap where any position is allowed.
pub(crate) fn parse_refinement_at_pixels(reader: &mut Reader<'_>) -> Result<[AtPixel; 2]> {
    let own = parse_at_pixels(reader, 1)?[0];
    let reference = AtPixel::read(reader)?;

    Ok([own, reference])
}

/// The user tables of the referred-to table segments, handed out in order
/// (7.4.2.1.6, 7.4.3.1.6).
pub(crate) struct UserTables<'a> {
    tables: &'a [Rc<HuffmanTable>],
    next: usize,
}

impl<'a> UserTables<'a> {
    pub(crate) fn new(tables: &'a [Rc<HuffmanTable>]) -> Self {
        Self { tables, next: 0 }
    }

    fn take(&mut self) -> Result<&'a HuffmanTable> {
        let table = self
            .tables
            .get(self.next)
            .ok_or(HuffmanError::MissingTables)?;
        self.next += 1;

        Ok(table)
    }

    /// Resolve a table selection field: values below `standard.len()` pick a
    /// standard table, `user` picks the next user table.
    pub(crate) fn select(
        &mut self,
        value: u8,
        standard: &[StandardTable],
        user: u8,
    ) -> Result<&'a HuffmanTable> {
        if value == user {
            return self.take();
        }

        match standard.get(value as usize) {
            Some(table) => table.get(),
            None => bail!(HuffmanError::InvalidSelection),
        }
    }
}

/// The number of bits needed to represent `count` distinct values (6.4.10).
pub(crate) fn code_length(count: u32) -> u32 {
    32 - count.saturating_sub(1).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_pixel_must_be_causal() {
        let valid = [0xFD, 0xFF, 0x02, 0xFE];
        assert_eq!(
            parse_at_pixels(&mut Reader::new(&valid), 2).unwrap(),
            vec![AtPixel::new(-3, -1), AtPixel::new(2, -2)]
        );

        for invalid in [[0x00, 0x00], [0x01, 0x00], [0xFF, 0x01]] {
            assert_eq!(
                parse_at_pixels(&mut Reader::new(&invalid), 1),
                Err(TemplateError::InvalidAtPixel.into())
            );
        }
    }

    #[test]
    fn refinement_reference_pixel_is_free() {
        let data = [0xFF, 0xFF, 0x01, 0x01];
        let pixels = parse_refinement_at_pixels(&mut Reader::new(&data)).unwrap();

        assert_eq!(pixels, [AtPixel::new(-1, -1), AtPixel::new(1, 1)]);
    }

    #[test]
    fn user_tables_in_order() {
        let first = Rc::new(HuffmanTable::build(&[]).unwrap());
        let tables = [first];
        let mut user = UserTables::new(&tables);

        assert!(user.select(0, &[StandardTable::F, StandardTable::G], 3).is_ok());
        assert!(user.select(3, &[StandardTable::F, StandardTable::G], 3).is_ok());
        assert_eq!(
            user.select(3, &[StandardTable::F], 3).unwrap_err(),
            HuffmanError::MissingTables.into()
        );
        assert_eq!(
            user.select(2, &[StandardTable::F, StandardTable::G], 3).unwrap_err(),
            HuffmanError::InvalidSelection.into()
        );
    }

    #[test]
    fn symbol_code_lengths() {
        assert_eq!(code_length(1), 0);
        assert_eq!(code_length(2), 1);
        assert_eq!(code_length(3), 2);
        assert_eq!(code_length(256), 8);
        assert_eq!(code_length(257), 9);
    }
}
