//! Region segment information field (7.4.1).

use crate::error::{RegionError, Result, bail};
use crate::reader::Reader;

/// "These operators describe how the segment's bitmap is to be combined with
/// the page bitmap." (7.4.1.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CombinationOperator {
    /// 0 OR
    Or,
    /// 1 AND
    And,
    /// 2 XOR
    Xor,
    /// 3 XNOR
    Xnor,
    /// 4 REPLACE
    Replace,
}

impl CombinationOperator {
    pub(crate) fn from_value(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Or,
            1 => Self::And,
            2 => Self::Xor,
            3 => Self::Xnor,
            4 => Self::Replace,
            _ => bail!(RegionError::InvalidCombinationOperator),
        })
    }

    /// Combine eight destination pixels with eight source pixels.
    #[inline(always)]
    pub(crate) fn apply(self, dst: u8, src: u8) -> u8 {
        match self {
            Self::Or => dst | src,
            Self::And => dst & src,
            Self::Xor => dst ^ src,
            Self::Xnor => !(dst ^ src),
            Self::Replace => src,
        }
    }
}

/// Parsed region segment information field (7.4.1).
#[derive(Debug, Clone)]
pub(crate) struct RegionSegmentInfo {
    /// "Region segment bitmap width" (7.4.1.1)
    pub(crate) width: u32,
    /// "Region segment bitmap height" (7.4.1.2)
    pub(crate) height: u32,
    /// "Region segment bitmap X location" (7.4.1.3)
    pub(crate) x: u32,
    /// "Region segment bitmap Y location" (7.4.1.4)
    pub(crate) y: u32,
    /// "Bits 0-2: External combination operator." (7.4.1.5)
    pub(crate) combination_operator: CombinationOperator,
    /// "Bit 3: Colour extension flag (COLEXTFLAG)." (7.4.1.5)
    pub(crate) colour_extension: bool,
}

impl RegionSegmentInfo {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let x = reader.read_u32()?;
        let y = reader.read_u32()?;
        let flags = reader.read_byte()?;

        // Bits 4-7 are reserved. Some encoders set them, so they are ignored.
        Ok(Self {
            width,
            height,
            x,
            y,
            combination_operator: CombinationOperator::from_value(flags & 0x07)?,
            colour_extension: flags & 0x08 != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_region_info() {
        let data = [
            0, 0, 0, 54, 0, 0, 0, 44, 0, 0, 0, 4, 0, 0, 0, 11, 0x02,
        ];
        let mut reader = Reader::new(&data);
        let info = RegionSegmentInfo::parse(&mut reader).unwrap();

        assert_eq!((info.width, info.height, info.x, info.y), (54, 44, 4, 11));
        assert_eq!(info.combination_operator, CombinationOperator::Xor);
        assert!(!info.colour_extension);
    }

    #[test]
    fn invalid_operator() {
        let data = [0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0x05];
        let mut reader = Reader::new(&data);
        assert!(RegionSegmentInfo::parse(&mut reader).is_err());
    }

    #[test]
    fn operators_on_bytes() {
        let (dst, src) = (0b1100_1100, 0b1010_1010);
        assert_eq!(CombinationOperator::Or.apply(dst, src), 0b1110_1110);
        assert_eq!(CombinationOperator::And.apply(dst, src), 0b1000_1000);
        assert_eq!(CombinationOperator::Xor.apply(dst, src), 0b0110_0110);
        assert_eq!(CombinationOperator::Xnor.apply(dst, src), 0b1001_1001);
        assert_eq!(CombinationOperator::Replace.apply(dst, src), src);
    }
}
