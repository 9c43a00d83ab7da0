//! Pattern dictionary segments (7.4.4) and their decoding procedure (6.7).

use log::trace;

use super::generic::{GenericParams, decode_arithmetic, decode_mmr};
use super::{AtPixel, Template};
use crate::arithmetic_decoder::{ArithmeticDecoder, Contexts};
use crate::bitmap::Bitmap;
use crate::error::{DecodeError, RegionError, Result, bail};
use crate::reader::Reader;

/// A decoded pattern dictionary: "HDPATS".
#[derive(Debug, Clone)]
pub(crate) struct PatternDictionary {
    pub(crate) patterns: Vec<Bitmap>,
    /// "HDPW"
    pub(crate) width: u32,
    /// "HDPH"
    pub(crate) height: u32,
}

/// Parsed pattern dictionary header (7.4.4.1).
#[derive(Debug, Clone)]
struct PatternDictionaryHeader {
    mmr: bool,
    template: Template,
    width: u8,
    height: u8,
    gray_max: u32,
}

fn parse(reader: &mut Reader<'_>) -> Result<PatternDictionaryHeader> {
    let flags = reader.read_byte()?;
    let width = reader.read_byte()?;
    let height = reader.read_byte()?;
    let gray_max = reader.read_u32()?;

    if width == 0 || height == 0 {
        bail!(RegionError::InvalidDimension);
    }

    Ok(PatternDictionaryHeader {
        mmr: flags & 0x01 != 0,
        template: Template::from_value(flags >> 1),
        width,
        height,
        gray_max,
    })
}

pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<PatternDictionary> {
    let header = parse(reader)?;

    let count = header
        .gray_max
        .checked_add(1)
        .ok_or(DecodeError::Overflow)?;
    let width = u32::from(header.width);
    let height = u32::from(header.height);
    let collective_width = count.checked_mul(width).ok_or(DecodeError::Overflow)?;

    trace!("pattern dictionary: {count} patterns of {width}x{height}");

    // "B_HDC": all patterns side by side.
    let mut collective = Bitmap::new(collective_width, height)?;
    let data = reader.tail();

    if header.mmr {
        decode_mmr(&mut collective, data)?;
    } else {
        let first = AtPixel::new(-i16::from(header.width), 0);
        let at_pixels = match header.template {
            Template::Template0 => vec![
                first,
                AtPixel::new(-3, -1),
                AtPixel::new(2, -2),
                AtPixel::new(-2, -2),
            ],
            _ => vec![first],
        };

        let mut decoder = ArithmeticDecoder::new(data);
        let mut contexts = Contexts::new(header.template.context_bits());

        decode_arithmetic(
            &mut collective,
            &mut decoder,
            &mut contexts,
            &GenericParams {
                template: header.template,
                tpgdon: false,
                at_pixels: &at_pixels,
                skip: None,
            },
        );
    }

    let patterns = (0..count)
        .map(|gray| collective.extract(i64::from(gray) * i64::from(width), 0, width, height))
        .collect::<Result<Vec<_>>>()?;

    Ok(PatternDictionary {
        patterns,
        width,
        height,
    })
}
