//! Segment headers (7.2) and segment types (7.3).

pub(crate) mod page_info;
pub(crate) mod region;

use core::ops::Range;

use crate::error::{ParseError, Result, SegmentError, bail};
use crate::reader::Reader;

/// "The segment type is a number between 0 and 63, inclusive. Not all values
/// are allowed." (7.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// Symbol dictionary (type 0).
    SymbolDictionary,
    /// Intermediate text region (type 4).
    IntermediateTextRegion,
    /// Immediate text region (type 6).
    ImmediateTextRegion,
    /// Immediate lossless text region (type 7).
    ImmediateLosslessTextRegion,
    /// Pattern dictionary (type 16).
    PatternDictionary,
    /// Intermediate halftone region (type 20).
    IntermediateHalftoneRegion,
    /// Immediate halftone region (type 22).
    ImmediateHalftoneRegion,
    /// Immediate lossless halftone region (type 23).
    ImmediateLosslessHalftoneRegion,
    /// Intermediate generic region (type 36).
    IntermediateGenericRegion,
    /// Immediate generic region (type 38).
    ImmediateGenericRegion,
    /// Immediate lossless generic region (type 39).
    ImmediateLosslessGenericRegion,
    /// Intermediate generic refinement region (type 40).
    IntermediateGenericRefinementRegion,
    /// Immediate generic refinement region (type 42).
    ImmediateGenericRefinementRegion,
    /// Immediate lossless generic refinement region (type 43).
    ImmediateLosslessGenericRefinementRegion,
    /// Page information (type 48).
    PageInformation,
    /// End of page (type 49).
    EndOfPage,
    /// End of stripe (type 50).
    EndOfStripe,
    /// End of file (type 51).
    EndOfFile,
    /// Profiles (type 52).
    Profiles,
    /// Tables (type 53).
    Tables,
    /// Colour palette (type 54).
    ColourPalette,
    /// Extension (type 62).
    Extension,
}

impl SegmentType {
    /// "All other segment types are reserved and must not be used." (7.3)
    pub(crate) fn from_value(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::SymbolDictionary,
            4 => Self::IntermediateTextRegion,
            6 => Self::ImmediateTextRegion,
            7 => Self::ImmediateLosslessTextRegion,
            16 => Self::PatternDictionary,
            20 => Self::IntermediateHalftoneRegion,
            22 => Self::ImmediateHalftoneRegion,
            23 => Self::ImmediateLosslessHalftoneRegion,
            36 => Self::IntermediateGenericRegion,
            38 => Self::ImmediateGenericRegion,
            39 => Self::ImmediateLosslessGenericRegion,
            40 => Self::IntermediateGenericRefinementRegion,
            42 => Self::ImmediateGenericRefinementRegion,
            43 => Self::ImmediateLosslessGenericRefinementRegion,
            48 => Self::PageInformation,
            49 => Self::EndOfPage,
            50 => Self::EndOfStripe,
            51 => Self::EndOfFile,
            52 => Self::Profiles,
            53 => Self::Tables,
            54 => Self::ColourPalette,
            62 => Self::Extension,
            _ => bail!(SegmentError::UnknownType(value)),
        })
    }

    /// Whether the segment is drawn onto the page as soon as it is decoded.
    pub(crate) fn is_immediate_region(self) -> bool {
        matches!(
            self,
            Self::ImmediateTextRegion
                | Self::ImmediateLosslessTextRegion
                | Self::ImmediateHalftoneRegion
                | Self::ImmediateLosslessHalftoneRegion
                | Self::ImmediateGenericRegion
                | Self::ImmediateLosslessGenericRegion
                | Self::ImmediateGenericRefinementRegion
                | Self::ImmediateLosslessGenericRefinementRegion
        )
    }

    /// Whether the segment decodes to a region that is kept for later use.
    pub(crate) fn is_intermediate_region(self) -> bool {
        matches!(
            self,
            Self::IntermediateTextRegion
                | Self::IntermediateHalftoneRegion
                | Self::IntermediateGenericRegion
                | Self::IntermediateGenericRefinementRegion
        )
    }

    pub(crate) fn is_refinement(self) -> bool {
        matches!(
            self,
            Self::IntermediateGenericRefinementRegion
                | Self::ImmediateGenericRefinementRegion
                | Self::ImmediateLosslessGenericRefinementRegion
        )
    }
}

/// A parsed segment header (7.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SegmentHeader {
    /// "The valid range of segment numbers is 0 through 4294967295" (7.2.2)
    pub(crate) number: u32,
    pub(crate) kind: SegmentType,
    /// "Bit 7: Deferred non-retain." (7.2.3)
    pub(crate) deferred_non_retain: bool,
    /// The segment numbers this segment refers to, in order (7.2.5).
    pub(crate) referred_to: Vec<u32>,
    /// "This field may contain a value of zero; this value indicates that this
    /// segment is not associated with any page." (7.2.6)
    pub(crate) page: u32,
    /// `None` for the unknown length 0xFFFFFFFF (7.2.7).
    pub(crate) data_length: Option<u32>,
}

/// A segment header and the location of its data in the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawSegment {
    pub(crate) header: SegmentHeader,
    pub(crate) data: Range<usize>,
    /// Whether the data length was found by scanning for the end marker.
    pub(crate) unknown_length: bool,
}

/// Parse a segment header (7.2.2 to 7.2.7).
pub(crate) fn parse_header(reader: &mut Reader<'_>) -> Result<SegmentHeader> {
    let number = reader.read_u32()?;
    let flags = reader.read_byte()?;
    let kind = SegmentType::from_value(flags & 0x3F)?;
    let long_page = flags & 0x40 != 0;
    let deferred_non_retain = flags & 0x80 != 0;

    // "The three most significant bits of the first byte in this field
    // determine the length of the field." (7.2.4)
    let first = reader.read_byte()?;
    let referred_count = match first >> 5 {
        count @ 0..=4 => count as u32,
        7 => {
            let rest = reader.read_bytes(3)?;
            let count = u32::from_be_bytes([first & 0x1F, rest[0], rest[1], rest[2]]);

            // Retention bits for this segment and each referred-to segment.
            reader.skip_bytes((count as usize + 1).div_ceil(8))?;
            count
        }
        _ => bail!(SegmentError::InvalidReferredCount),
    };

    let mut referred_to = Vec::with_capacity((referred_count as usize).min(reader.len()));

    for _ in 0..referred_count {
        let referred = match number {
            0..=256 => reader.read_byte()? as u32,
            257..=65536 => reader.read_u16()? as u32,
            _ => reader.read_u32()?,
        };

        // "A segment may only refer to segments with lower segment numbers."
        if referred >= number {
            bail!(SegmentError::InvalidReference);
        }

        referred_to.push(referred);
    }

    let page = if long_page {
        reader.read_u32()?
    } else {
        reader.read_byte()? as u32
    };

    let data_length = match reader.read_u32()? {
        0xFFFF_FFFF => None,
        len => Some(len),
    };

    Ok(SegmentHeader {
        number,
        kind,
        deferred_non_retain,
        referred_to,
        page,
        data_length,
    })
}

/// Locate the data of a segment whose header was just parsed and advance the
/// reader past it.
pub(crate) fn parse_data(reader: &mut Reader<'_>, header: SegmentHeader) -> Result<RawSegment> {
    let (len, unknown_length) = match header.data_length {
        Some(len) => (len as usize, false),
        None if header.kind == SegmentType::ImmediateGenericRegion => {
            (scan_unknown_length(reader)?, true)
        }
        None => bail!(SegmentError::UnknownLength),
    };

    reader.align();
    let start = reader.base() + reader.byte_pos();
    reader.skip_bytes(len)?;

    Ok(RawSegment {
        header,
        data: start..start + len,
        unknown_length,
    })
}

/// Find the data length of an immediate generic region of unknown length.
///
/// "These four bytes can be detected without knowing the length of the data
/// part in advance: if MMR is 1, they are preceded by the two-byte sequence
/// 0x00 0x00; if MMR is 0, they are preceded by the two-byte sequence
/// 0xFF 0xAC." (7.2.7)
fn scan_unknown_length(reader: &Reader<'_>) -> Result<usize> {
    let data = reader.tail();

    // The region segment information field takes 17 bytes, the generic region
    // flags follow.
    let flags = *data.get(17).ok_or(ParseError::UnexpectedEof)?;
    let mmr = flags & 0x01 != 0;
    let marker: [u8; 2] = if mmr { [0x00, 0x00] } else { [0xFF, 0xAC] };

    // The AT pixels come before the coded data and may contain the marker.
    let at_bytes = match (mmr, (flags >> 1) & 0x03, flags & 0x10 != 0) {
        (true, ..) => 0,
        (false, 0, true) => 24,
        (false, 0, false) => 8,
        _ => 2,
    };

    data.windows(6)
        .enumerate()
        .skip(18 + at_bytes)
        .find(|(_, window)| window[..2] == marker)
        .map(|(pos, _)| pos + 6)
        .ok_or(SegmentError::MissingEndMarker.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_example_1() {
        // 7.2.8, example 1, followed by a data length of 16.
        let data = [
            0x00, 0x00, 0x00, 0x20, 0x86, 0x6B, 0x02, 0x1E, 0x05, 0x04, 0x00, 0x00, 0x00, 0x10,
        ];
        let header = parse_header(&mut Reader::new(&data)).unwrap();

        assert_eq!(header.number, 32);
        assert_eq!(header.kind, SegmentType::ImmediateTextRegion);
        assert!(header.deferred_non_retain);
        assert_eq!(header.referred_to, vec![2, 30, 5]);
        assert_eq!(header.page, 4);
        assert_eq!(header.data_length, Some(16));
    }

    #[test]
    fn header_example_2() {
        // 7.2.8, example 2, followed by a data length of 32.
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x02, 0x34, 0x40, 0xE0, 0x00, 0x00, 0x09, 0x02, 0xFD,
            0x01, 0x00, 0x00, 0x02, 0x00, 0x1E, 0x00, 0x05, 0x02, 0x00, 0x02,
            0x01, 0x02, 0x02, 0x02, 0x03, 0x02, 0x04, 0x00, 0x00, 0x04, 0x01,
            0x00, 0x00, 0x00, 0x20,
        ];
        let header = parse_header(&mut Reader::new(&data)).unwrap();

        assert_eq!(header.number, 564);
        assert_eq!(header.kind, SegmentType::SymbolDictionary);
        assert!(!header.deferred_non_retain);
        assert_eq!(
            header.referred_to,
            vec![256, 2, 30, 5, 512, 513, 514, 515, 516]
        );
        assert_eq!(header.page, 1025);
        assert_eq!(header.data_length, Some(32));
    }

    #[test]
    fn reserved_count_and_type() {
        let count = [0, 0, 0, 1, 0x30, 0xA0, 1, 0, 0, 0, 0];
        assert_eq!(
            parse_header(&mut Reader::new(&count)),
            Err(SegmentError::InvalidReferredCount.into())
        );

        let kind = [0, 0, 0, 1, 0x01, 0x00, 1, 0, 0, 0, 0];
        assert_eq!(
            parse_header(&mut Reader::new(&kind)),
            Err(SegmentError::UnknownType(1).into())
        );
    }

    #[test]
    fn forward_reference_is_rejected() {
        let data = [0, 0, 0, 3, 0x00, 0x20, 0x05, 1, 0, 0, 0, 0];
        assert_eq!(
            parse_header(&mut Reader::new(&data)),
            Err(SegmentError::InvalidReference.into())
        );
    }

    #[test]
    fn unknown_length_is_scanned() {
        let mut data = vec![0_u8; 17];
        // Arithmetic coding, template 0.
        data.extend_from_slice(&[0x00, 3, 0xFF, 0xFD, 0xFF, 2, 0xFE, 0xFE, 0xFE]);
        data.extend_from_slice(&[0x12, 0x34, 0xFF, 0xAC, 0, 0, 0, 9]);
        let data_len = data.len();
        data.extend_from_slice(&[0xAA, 0xBB]);

        let header = SegmentHeader {
            number: 1,
            kind: SegmentType::ImmediateGenericRegion,
            deferred_non_retain: false,
            referred_to: vec![],
            page: 1,
            data_length: None,
        };

        let mut reader = Reader::new(&data);
        let segment = parse_data(&mut reader, header).unwrap();

        assert_eq!(segment.data, 0..data_len);
        assert!(segment.unknown_length);
        assert_eq!(reader.read_byte().unwrap(), 0xAA);
    }

    #[test]
    fn end_marker_in_at_pixels_is_not_matched() {
        let mut data = vec![0_u8; 17];
        // Template 0 with A4 = (-1, -84), stored as 0xFF 0xAC.
        data.extend_from_slice(&[0x00, 3, 0xFF, 0xFD, 0xFF, 2, 0xFE, 0xFF, 0xAC]);
        data.extend_from_slice(&[0x12, 0x34, 0x56, 0x78, 0xFF, 0xAC, 0, 0, 0, 9]);
        let data_len = data.len();

        let header = SegmentHeader {
            number: 1,
            kind: SegmentType::ImmediateGenericRegion,
            deferred_non_retain: false,
            referred_to: vec![],
            page: 1,
            data_length: None,
        };

        let segment = parse_data(&mut Reader::new(&data), header).unwrap();
        assert_eq!(segment.data, 0..data_len);
    }
}
