//! Generic region decoding (6.2) and generic region segments (7.4.6).

use std::io::SeekFrom;

use log::{trace, warn};

use super::{AtPixel, RegionBitmap, Template, parse_at_pixels};
use crate::arithmetic_decoder::{ArithmeticDecoder, Contexts};
use crate::bitmap::Bitmap;
use crate::error::{DecodeError, ParseError, RegionError, Result, bail};
use crate::reader::Reader;
use crate::segment::region::RegionSegmentInfo;

/// Parsed generic region segment header (7.4.6.1).
#[derive(Debug, Clone)]
struct GenericRegionHeader {
    info: RegionSegmentInfo,
    mmr: bool,
    template: Template,
    tpgdon: bool,
    at_pixels: Vec<AtPixel>,
}

fn parse(reader: &mut Reader<'_>) -> Result<GenericRegionHeader> {
    let info = RegionSegmentInfo::parse(reader)?;
    let flags = reader.read_byte()?;

    let mmr = flags & 0x01 != 0;
    let template = Template::from_value(flags >> 1);
    let tpgdon = flags & 0x08 != 0;

    // "Bit 4: EXTTEMPLATE" selects the 12 AT pixel variant of template 0.
    if flags & 0x10 != 0 {
        warn!("generic region uses extended templates");
        bail!(DecodeError::Unsupported);
    }

    let at_pixels = if mmr {
        Vec::new()
    } else {
        parse_at_pixels(reader, template.at_pixel_count())?
    };

    Ok(GenericRegionHeader {
        info,
        mmr,
        template,
        tpgdon,
        at_pixels,
    })
}

/// Decode a generic region segment.
///
/// For an immediate generic region of unknown length the data ends with the
/// row count, which may lower the region height (7.4.6.4).
pub(crate) fn decode(reader: &mut Reader<'_>, unknown_length: bool) -> Result<RegionBitmap> {
    let mut header = parse(reader)?;
    let mut data = reader.tail();

    if unknown_length {
        let split = data.len().checked_sub(4).ok_or(ParseError::UnexpectedEof)?;

        // "the last four bytes of the segment's data part" (7.4.6.4)
        reader.seek(SeekFrom::End(-4))?;
        let rows = reader.read_u32()?;

        if rows > header.info.height {
            bail!(RegionError::InvalidDimension);
        }

        header.info.height = rows;
        data = &data[..split];
    }

    let mut bitmap = Bitmap::new(header.info.width, header.info.height)?;

    if header.mmr {
        decode_mmr(&mut bitmap, data)?;
    } else {
        let mut decoder = ArithmeticDecoder::new(data);
        let mut contexts = Contexts::new(header.template.context_bits());

        decode_arithmetic(
            &mut bitmap,
            &mut decoder,
            &mut contexts,
            &GenericParams {
                template: header.template,
                tpgdon: header.tpgdon,
                at_pixels: &header.at_pixels,
                skip: None,
            },
        );
    }

    Ok(RegionBitmap {
        bitmap,
        info: header.info,
    })
}

/// Writes decoded MMR rows into a bitmap.
struct BitmapSink<'a> {
    bitmap: &'a mut Bitmap,
    y: u32,
}

impl bilevel_mmr::RowSink for BitmapSink<'_> {
    fn push_row(&mut self, row: &[u8]) {
        if self.y < self.bitmap.height {
            self.bitmap.row_mut(self.y).copy_from_slice(row);
            self.y += 1;
        }
    }
}

/// Decode a bitmap with MMR (6.2.6), returning the number of bytes read.
///
/// "An invocation of the generic region decoding procedure with MMR equal to
/// 1 shall consume an integral number of bytes, beginning and ending on a byte
/// boundary."
pub(crate) fn decode_mmr(bitmap: &mut Bitmap, data: &[u8]) -> Result<usize> {
    let settings = bilevel_mmr::DecodeSettings {
        columns: bitmap.width,
        rows: bitmap.height,
        end_of_block: true,
        strict: false,
    };

    let mut sink = BitmapSink { bitmap, y: 0 };
    let decoded = bilevel_mmr::decode(data, &mut sink, &settings)?;
    trace!(
        "MMR bitmap: {} rows from {} bytes",
        decoded.rows, decoded.bytes_read
    );

    Ok(decoded.bytes_read)
}

/// Parameters of the arithmetic generic region decoding procedure (6.2.5).
pub(crate) struct GenericParams<'a> {
    pub(crate) template: Template,
    pub(crate) tpgdon: bool,
    pub(crate) at_pixels: &'a [AtPixel],
    /// "USESKIP" with the "SKIP" bitmap.
    pub(crate) skip: Option<&'a Bitmap>,
}

/// A pixel of a template, relative to the pixel being decoded.
#[derive(Clone, Copy)]
enum Tap {
    Fixed(i32, i32),
    /// The AT pixel with the given index.
    At(usize),
}

use Tap::{At, Fixed};

// Template pixels from the most significant context bit down (Figures 3 to 6).
#[rustfmt::skip]
const TEMPLATE_0: [Tap; 16] = [
    At(3), Fixed(-1, -2), Fixed(0, -2), Fixed(1, -2), At(2),
    At(1), Fixed(-2, -1), Fixed(-1, -1), Fixed(0, -1), Fixed(1, -1), Fixed(2, -1), At(0),
    Fixed(-4, 0), Fixed(-3, 0), Fixed(-2, 0), Fixed(-1, 0),
];

#[rustfmt::skip]
const TEMPLATE_1: [Tap; 13] = [
    Fixed(-1, -2), Fixed(0, -2), Fixed(1, -2), Fixed(2, -2),
    Fixed(-2, -1), Fixed(-1, -1), Fixed(0, -1), Fixed(1, -1), Fixed(2, -1), At(0),
    Fixed(-3, 0), Fixed(-2, 0), Fixed(-1, 0),
];

#[rustfmt::skip]
const TEMPLATE_2: [Tap; 10] = [
    Fixed(-1, -2), Fixed(0, -2), Fixed(1, -2),
    Fixed(-2, -1), Fixed(-1, -1), Fixed(0, -1), Fixed(1, -1), At(0),
    Fixed(-2, 0), Fixed(-1, 0),
];

#[rustfmt::skip]
const TEMPLATE_3: [Tap; 10] = [
    Fixed(-3, -1), Fixed(-2, -1), Fixed(-1, -1), Fixed(0, -1), Fixed(1, -1), At(0),
    Fixed(-4, 0), Fixed(-3, 0), Fixed(-2, 0), Fixed(-1, 0),
];

impl Template {
    fn taps(self) -> &'static [Tap] {
        match self {
            Self::Template0 => &TEMPLATE_0,
            Self::Template1 => &TEMPLATE_1,
            Self::Template2 => &TEMPLATE_2,
            Self::Template3 => &TEMPLATE_3,
        }
    }

    /// The context used to decode "SLTP" (Figures 8 to 11).
    fn sltp_context(self) -> u32 {
        match self {
            Self::Template0 => 0x9B25,
            Self::Template1 => 0x0795,
            Self::Template2 => 0x00E5,
            Self::Template3 => 0x0195,
        }
    }
}

/// The fixed pixels of one template row: adjacent pixels that map to
/// adjacent context bits, with the rightmost one in the lowest bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RowTaps {
    dy: i32,
    left: i32,
    right: i32,
    /// The context bit of the rightmost pixel.
    shift: u32,
}

impl RowTaps {
    fn mask(self) -> u32 {
        (1 << (self.right - self.left + 1)) - 1
    }
}

/// A template with its AT pixels resolved, split into rows of fixed pixels
/// that slide along with the current pixel and AT pixels read one by one.
#[derive(Debug)]
struct Layout {
    rows: Vec<RowTaps>,
    /// AT pixel offsets with their context bit.
    at: Vec<(i32, i32, u32)>,
}

impl Layout {
    fn new(params: &GenericParams<'_>) -> Self {
        let taps = params.template.taps();
        let mut rows: Vec<RowTaps> = Vec::new();
        let mut at = Vec::new();

        for (idx, tap) in taps.iter().enumerate() {
            let bit = (taps.len() - 1 - idx) as u32;

            match *tap {
                Fixed(dx, dy) => match rows.iter_mut().find(|row| row.dy == dy) {
                    Some(row) => {
                        row.right = dx;
                        row.shift = bit;
                    }
                    None => rows.push(RowTaps {
                        dy,
                        left: dx,
                        right: dx,
                        shift: bit,
                    }),
                },
                At(idx) => {
                    let (dx, dy) = params.at_pixels.get(idx).map_or((0, 0), |p| p.offset());
                    at.push((dx, dy, bit));
                }
            }
        }

        Self { rows, at }
    }
}

/// Decode a bitmap with a template and arithmetic coding (6.2.5.7).
///
/// The decoder and contexts are passed in since symbol dictionaries and
/// gray-scale images keep decoding from the same state across bitmaps.
pub(crate) fn decode_arithmetic(
    bitmap: &mut Bitmap,
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut Contexts,
    params: &GenericParams<'_>,
) {
    let layout = Layout::new(params);
    let mut windows = vec![0_u32; layout.rows.len()];
    let mut ltp = false;

    for y in 0..bitmap.height {
        if params.tpgdon {
            let sltp = decoder.decode(contexts.get_mut(params.template.sltp_context()));
            ltp ^= sltp != 0;

            if ltp {
                if y > 0 {
                    bitmap.copy_row(y - 1, y);
                }

                continue;
            }
        }

        let yi = y as i32;

        for (window, row) in windows.iter_mut().zip(&layout.rows) {
            *window = (row.left..=row.right)
                .fold(0, |w, dx| (w << 1) | bitmap.pixel(dx, yi + row.dy));
        }

        for x in 0..bitmap.width {
            let xi = x as i32;

            if !params.skip.is_some_and(|skip| skip.get_pixel(x, y)) {
                let mut context = layout
                    .rows
                    .iter()
                    .zip(&windows)
                    .fold(0, |ctx, (row, &w)| ctx | (w << row.shift));

                for &(dx, dy, bit) in &layout.at {
                    context |= bitmap.pixel(xi + dx, yi + dy) << bit;
                }

                if decoder.decode(contexts.get_mut(context)) != 0 {
                    bitmap.set_black(x, y);
                }
            }

            // Slide every row one pixel to the right.
            for (window, row) in windows.iter_mut().zip(&layout.rows) {
                let next = bitmap.pixel(xi + 1 + row.right, yi + row.dy);
                *window = ((*window << 1) | next) & row.mask();
            }
        }
    }
}
