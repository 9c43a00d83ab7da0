//! Generic refinement region decoding (6.3) and refinement region segments
//! (7.4.7).

use super::{AtPixel, RefinementTemplate, RegionBitmap, parse_refinement_at_pixels};
use crate::arithmetic_decoder::{ArithmeticDecoder, Contexts};
use crate::bitmap::Bitmap;
use crate::error::{RegionError, Result, bail};
use crate::reader::Reader;
use crate::segment::region::RegionSegmentInfo;

/// Parsed generic refinement region segment header (7.4.7.1).
#[derive(Debug, Clone)]
struct RefinementRegionHeader {
    info: RegionSegmentInfo,
    template: RefinementTemplate,
    tpgron: bool,
    at_pixels: [AtPixel; 2],
}

fn parse(reader: &mut Reader<'_>) -> Result<RefinementRegionHeader> {
    let info = RegionSegmentInfo::parse(reader)?;
    let flags = reader.read_byte()?;

    let template = RefinementTemplate::from_bit(flags & 0x01 != 0);
    let tpgron = flags & 0x02 != 0;

    let at_pixels = match template {
        RefinementTemplate::Template0 => parse_refinement_at_pixels(reader)?,
        RefinementTemplate::Template1 => [AtPixel::new(0, 0); 2],
    };

    Ok(RefinementRegionHeader {
        info,
        template,
        tpgron,
        at_pixels,
    })
}

/// Decode a refinement region segment against `reference`.
///
/// The reference is either the bitmap of the referred-to intermediate region
/// or the page area covered by this region, so it is always aligned with the
/// region (7.4.7.5).
pub(crate) fn decode(reader: &mut Reader<'_>, reference: &Bitmap) -> Result<RegionBitmap> {
    let header = parse(reader)?;

    if header.info.width != reference.width || header.info.height != reference.height {
        bail!(RegionError::InvalidDimension);
    }

    let mut bitmap = Bitmap::new(header.info.width, header.info.height)?;
    let mut decoder = ArithmeticDecoder::new(reader.tail());
    let mut contexts = Contexts::new(header.template.context_bits());

    decode_bitmap(
        &mut bitmap,
        &mut decoder,
        &mut contexts,
        &RefinementParams {
            template: header.template,
            tpgron: header.tpgron,
            at_pixels: header.at_pixels,
            reference,
            dx: 0,
            dy: 0,
        },
    );

    Ok(RegionBitmap {
        bitmap,
        info: header.info,
    })
}

/// Parameters of the generic refinement region decoding procedure (6.3.5.1).
pub(crate) struct RefinementParams<'a> {
    pub(crate) template: RefinementTemplate,
    pub(crate) tpgron: bool,
    pub(crate) at_pixels: [AtPixel; 2],
    /// "GRREFERENCE"
    pub(crate) reference: &'a Bitmap,
    /// "GRREFERENCEDX"
    pub(crate) dx: i32,
    /// "GRREFERENCEDY"
    pub(crate) dy: i32,
}

impl RefinementTemplate {
    /// The context used to decode "SLTP" (Figures 14 and 15).
    fn sltp_context(self) -> u32 {
        match self {
            Self::Template0 => 0b0_0000_0001_0000,
            Self::Template1 => 0b00_0000_1000,
        }
    }
}

/// Decode a refinement bitmap (6.3.5.6).
pub(crate) fn decode_bitmap(
    bitmap: &mut Bitmap,
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut Contexts,
    params: &RefinementParams<'_>,
) {
    let mut ltp = false;

    for y in 0..bitmap.height {
        if params.tpgron {
            let sltp = decoder.decode(contexts.get_mut(params.template.sltp_context()));
            ltp ^= sltp != 0;
        }

        for x in 0..bitmap.width {
            let (xi, yi) = (x as i32, y as i32);
            let (rx, ry) = (xi - params.dx, yi - params.dy);

            // "TPGRPIX": a uniform 3x3 reference neighbourhood predicts the pixel.
            if ltp && let Some(value) = uniform_neighbourhood(params.reference, rx, ry) {
                if value != 0 {
                    bitmap.set_black(x, y);
                }

                continue;
            }

            let context = gather_context(bitmap, params, xi, yi, rx, ry);

            if decoder.decode(contexts.get_mut(context)) != 0 {
                bitmap.set_black(x, y);
            }
        }
    }
}

fn uniform_neighbourhood(reference: &Bitmap, x: i32, y: i32) -> Option<u32> {
    let value = reference.pixel(x, y);

    for dy in -1..=1 {
        for dx in -1..=1 {
            if reference.pixel(x + dx, y + dy) != value {
                return None;
            }
        }
    }

    Some(value)
}

/// Form the context of the pixel at (x, y), with (rx, ry) being the
/// corresponding reference pixel (Figures 12 and 13).
#[inline(always)]
fn gather_context(
    bitmap: &Bitmap,
    params: &RefinementParams<'_>,
    x: i32,
    y: i32,
    rx: i32,
    ry: i32,
) -> u32 {
    let reference = params.reference;
    let own = |ctx: u32, (dx, dy): (i32, i32)| (ctx << 1) | bitmap.pixel(x + dx, y + dy);
    let refd = |ctx: u32, (dx, dy): (i32, i32)| (ctx << 1) | reference.pixel(rx + dx, ry + dy);

    match params.template {
        RefinementTemplate::Template0 => {
            let [at1, at2] = params.at_pixels;

            let ctx = [at1.offset(), (0, -1), (1, -1), (-1, 0)]
                .into_iter()
                .fold(0, own);

            [
                at2.offset(),
                (0, -1),
                (1, -1),
                (-1, 0),
                (0, 0),
                (1, 0),
                (-1, 1),
                (0, 1),
                (1, 1),
            ]
            .into_iter()
            .fold(ctx, refd)
        }
        RefinementTemplate::Template1 => {
            let ctx = [(-1, -1), (0, -1), (1, -1), (-1, 0)]
                .into_iter()
                .fold(0, own);

            [(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1), (1, 1)]
                .into_iter()
                .fold(ctx, refd)
        }
    }
}
