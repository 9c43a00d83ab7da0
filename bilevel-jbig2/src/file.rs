//! Stream organizations (Annex D).
//!
//! The embedded organization is a bare sequence of segments, which is how
//! JBIG2 data appears in PDF. Standalone files start with a file header and
//! use either the sequential (D.1) or the random-access (D.2) organization.

use log::debug;

use crate::error::{FormatError, Result, SegmentError, bail};
use crate::reader::Reader;
use crate::segment::{RawSegment, SegmentHeader, SegmentType, parse_data, parse_header};

/// "This is an 8-byte sequence containing 0x97 0x4A 0x42 0x32 0x0D 0x0A 0x1A
/// 0x0A." (D.4.1)
const FILE_ID: [u8; 8] = [0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Organization {
    Embedded,
    Sequential,
    RandomAccess,
}

/// The segments of a stream, in stream order.
#[derive(Debug, Clone)]
pub(crate) struct ParsedStream {
    pub(crate) organization: Organization,
    /// "This is a 4-byte field, and is not present if the 'unknown number of
    /// pages' bit was 1." (D.4.3)
    pub(crate) page_count: Option<u32>,
    pub(crate) segments: Vec<RawSegment>,
}

/// Parse the segments of a standalone file or an embedded stream.
pub(crate) fn parse_stream(data: &[u8]) -> Result<ParsedStream> {
    let mut reader = Reader::new(data);

    let (organization, page_count) = if data.starts_with(&FILE_ID) {
        parse_file_header(&mut reader)?
    } else {
        (Organization::Embedded, None)
    };

    debug!("parsing {organization:?} stream of {} bytes", data.len());

    let segments = match organization {
        Organization::Embedded | Organization::Sequential => parse_sequential(&mut reader)?,
        Organization::RandomAccess => parse_random_access(&mut reader)?,
    };

    Ok(ParsedStream {
        organization,
        page_count,
        segments,
    })
}

fn parse_file_header(reader: &mut Reader<'_>) -> Result<(Organization, Option<u32>)> {
    reader.skip_bytes(FILE_ID.len())?;
    let flags = reader.read_byte()?;

    // "Bits 4-7: Reserved; must be 0." (D.4.2)
    if flags & 0xF0 != 0 {
        bail!(FormatError::ReservedBits);
    }

    let organization = if flags & 0x01 != 0 {
        Organization::Sequential
    } else {
        Organization::RandomAccess
    };

    let page_count = if flags & 0x02 != 0 {
        None
    } else {
        Some(reader.read_u32()?)
    };

    Ok((organization, page_count))
}

/// Run `parse` for the next entry, mapping running out of data before the
/// entry starts to `None`.
fn next_entry<T>(
    reader: &mut Reader<'_>,
    parse: impl FnOnce(&mut Reader<'_>) -> Result<T>,
) -> Result<Option<T>> {
    if reader.at_end() {
        return Ok(None);
    }

    parse(reader).map(Some)
}

/// "The two parts of each segment are stored together: first the segment
/// header then the segment data." (D.1)
fn parse_sequential(reader: &mut Reader<'_>) -> Result<Vec<RawSegment>> {
    let mut segments = Vec::new();

    while let Some(header) = next_entry(reader, parse_header)? {
        let is_eof = header.kind == SegmentType::EndOfFile;
        segments.push(parse_data(reader, header)?);

        // "If a file contains an end of file segment, it must be the last
        // segment." (7.4.11)
        if is_eof {
            break;
        }
    }

    Ok(segments)
}

/// "A file header is followed by a sequence of segments headers; the last
/// segment header is followed by the data for the first segment, then the
/// data for the second segment, and so on." (D.2)
fn parse_random_access(reader: &mut Reader<'_>) -> Result<Vec<RawSegment>> {
    let mut headers: Vec<SegmentHeader> = Vec::new();

    while let Some(header) = next_entry(reader, parse_header)? {
        let is_eof = header.kind == SegmentType::EndOfFile;
        headers.push(header);

        if is_eof {
            break;
        }
    }

    headers
        .into_iter()
        .map(|header| {
            if header.data_length.is_none() {
                bail!(SegmentError::UnknownLength);
            }

            parse_data(reader, header)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An end of page segment for page 1 with the given number.
    fn end_of_page(number: u8) -> [u8; 11] {
        [0, 0, 0, number, 49, 0, 1, 0, 0, 0, 0]
    }

    #[test]
    fn embedded_stream() {
        let mut data = Vec::new();
        data.extend_from_slice(&end_of_page(0));
        data.extend_from_slice(&end_of_page(1));

        let stream = parse_stream(&data).unwrap();
        assert_eq!(stream.organization, Organization::Embedded);
        assert_eq!(stream.segments.len(), 2);
        assert_eq!(stream.segments[1].header.number, 1);
    }

    #[test]
    fn random_access_file() {
        let mut data = FILE_ID.to_vec();
        data.push(0x00);
        data.extend_from_slice(&[0, 0, 0, 1]);
        // Two headers, a table segment with 2 bytes of data, then end of file.
        data.extend_from_slice(&[0, 0, 0, 0, 53, 0, 0, 0, 0, 0, 2]);
        data.extend_from_slice(&[0, 0, 0, 1, 51, 0, 0, 0, 0, 0, 0]);
        let table_start = data.len();
        data.extend_from_slice(&[0xAB, 0xCD]);

        let stream = parse_stream(&data).unwrap();
        assert_eq!(stream.organization, Organization::RandomAccess);
        assert_eq!(stream.page_count, Some(1));
        assert_eq!(stream.segments.len(), 2);
        assert_eq!(stream.segments[0].data, table_start..table_start + 2);
        assert!(stream.segments[1].data.is_empty());
    }

    #[test]
    fn sequential_file_stops_at_end_of_file() {
        let mut data = FILE_ID.to_vec();
        data.push(0x03);
        data.extend_from_slice(&[0, 0, 0, 0, 51, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&end_of_page(1));

        let stream = parse_stream(&data).unwrap();
        assert_eq!(stream.organization, Organization::Sequential);
        assert_eq!(stream.page_count, None);
        assert_eq!(stream.segments.len(), 1);
    }

    #[test]
    fn reserved_file_flags() {
        let mut data = FILE_ID.to_vec();
        data.push(0x11);

        assert_eq!(
            parse_stream(&data).unwrap_err(),
            FormatError::ReservedBits.into()
        );
    }
}
