//! Page information (7.4.8) and end of stripe (7.4.10) segments.

use log::warn;

use super::region::CombinationOperator;
use crate::error::Result;
use crate::reader::Reader;

/// Parsed page information segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageInformation {
    pub(crate) width: u32,
    /// `None` if the height is 0xFFFFFFFF and follows from the stripes.
    pub(crate) height: Option<u32>,
    /// Pixels per metre, 0 if unknown.
    pub(crate) x_resolution: u32,
    pub(crate) y_resolution: u32,
    pub(crate) flags: PageFlags,
    pub(crate) striping: PageStriping,
}

/// Page segment flags (7.4.8.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageFlags {
    /// "Bit 0: Page is eventually lossless."
    pub(crate) lossless: bool,
    /// "Bit 1: Page might contain refinements."
    pub(crate) might_contain_refinements: bool,
    /// "Bit 2: Page default pixel value."
    pub(crate) default_pixel: bool,
    /// "Bits 3-4: Page default combination operator."
    pub(crate) default_operator: CombinationOperator,
    /// "Bit 5: Page requires auxiliary buffers."
    pub(crate) requires_auxiliary_buffers: bool,
    /// "Bit 6: Page combination operator overridden."
    pub(crate) operator_overridden: bool,
}

/// Page striping information (7.4.8.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageStriping {
    pub(crate) striped: bool,
    pub(crate) max_stripe_size: u16,
}

impl PageInformation {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let width = reader.read_u32()?;
        let height = match reader.read_u32()? {
            0xFFFF_FFFF => None,
            height => Some(height),
        };
        let x_resolution = reader.read_u32()?;
        let y_resolution = reader.read_u32()?;
        let flags = reader.read_byte()?;
        let striping = reader.read_u16()?;

        // Bits 3-4 only reach values 0 to 3, so REPLACE is never the default.
        let flags = PageFlags {
            lossless: flags & 0x01 != 0,
            might_contain_refinements: flags & 0x02 != 0,
            default_pixel: flags & 0x04 != 0,
            default_operator: CombinationOperator::from_value((flags >> 3) & 0x03)?,
            requires_auxiliary_buffers: flags & 0x20 != 0,
            operator_overridden: flags & 0x40 != 0,
        };

        let striping = PageStriping {
            striped: striping & 0x8000 != 0,
            max_stripe_size: striping & 0x7FFF,
        };

        if height.is_none() && !striping.striped {
            warn!("page of unknown height is not marked as striped");
        }

        Ok(Self {
            width,
            height,
            x_resolution,
            y_resolution,
            flags,
            striping,
        })
    }
}

/// "This four-byte field contains the Y coordinate of the end row of the
/// stripe." (7.4.10)
pub(crate) fn parse_end_of_stripe(reader: &mut Reader<'_>) -> Result<u32> {
    reader.read_u32()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_page_info() {
        #[rustfmt::skip]
        let data = [
            0, 0, 0, 64, 0, 0, 0, 56,
            0, 0, 0x0B, 0xB8, 0, 0, 0x0B, 0xB8,
            0b0101_0100,
            0x00, 0x00,
        ];
        let info = PageInformation::parse(&mut Reader::new(&data)).unwrap();

        assert_eq!((info.width, info.height), (64, Some(56)));
        assert_eq!(info.x_resolution, 3000);
        assert!(info.flags.default_pixel);
        assert_eq!(info.flags.default_operator, CombinationOperator::Xor);
        assert!(info.flags.operator_overridden);
        assert!(!info.striping.striped);
    }

    #[test]
    fn unknown_height_with_stripes() {
        #[rustfmt::skip]
        let data = [
            0, 0, 0, 8, 0xFF, 0xFF, 0xFF, 0xFF,
            0, 0, 0, 0, 0, 0, 0, 0,
            0x00,
            0x80, 0x10,
        ];
        let info = PageInformation::parse(&mut Reader::new(&data)).unwrap();

        assert_eq!(info.height, None);
        assert!(info.striping.striped);
        assert_eq!(info.striping.max_stripe_size, 16);
    }
}
