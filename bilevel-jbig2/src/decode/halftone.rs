//! Halftone region segments (7.4.5) and their decoding procedure (6.6).

use log::trace;

use super::pattern::PatternDictionary;
use super::{RegionBitmap, Template};
use crate::bitmap::{Bitmap, MAX_PIXELS};
use crate::error::{RegionError, Result, bail};
use crate::gray_scale::{self, GrayScaleParams};
use crate::reader::Reader;
use crate::segment::region::{CombinationOperator, RegionSegmentInfo};

/// Parsed halftone region header (7.4.5.1).
#[derive(Debug, Clone)]
struct HalftoneRegionHeader {
    info: RegionSegmentInfo,
    mmr: bool,
    template: Template,
    /// "HENABLESKIP"
    enable_skip: bool,
    /// "HCOMBOP"
    combination_operator: CombinationOperator,
    /// "HDEFPIXEL"
    default_pixel: bool,
    grid: Grid,
}

/// The halftone grid (7.4.5.1.2 and 7.4.5.1.3).
#[derive(Debug, Clone, Copy)]
struct Grid {
    /// "HGW"
    width: u32,
    /// "HGH"
    height: u32,
    /// "HGX", in 1/256 pixel.
    x: i32,
    /// "HGY", in 1/256 pixel.
    y: i32,
    /// "HRX"
    rx: u16,
    /// "HRY"
    ry: u16,
}

impl Grid {
    /// The top-left corner of the pattern at grid cell (mg, ng) (6.6.5.2).
    fn position(&self, mg: u32, ng: u32) -> (i64, i64) {
        let (mg, ng) = (i64::from(mg), i64::from(ng));
        let (rx, ry) = (i64::from(self.rx), i64::from(self.ry));

        let x = (i64::from(self.x) + mg * ry + ng * rx) >> 8;
        let y = (i64::from(self.y) + mg * rx - ng * ry) >> 8;

        (x, y)
    }
}

fn parse(reader: &mut Reader<'_>) -> Result<HalftoneRegionHeader> {
    let info = RegionSegmentInfo::parse(reader)?;
    let flags = reader.read_byte()?;

    let grid = Grid {
        width: reader.read_u32()?,
        height: reader.read_u32()?,
        x: reader.read_i32()?,
        y: reader.read_i32()?,
        rx: reader.read_u16()?,
        ry: reader.read_u16()?,
    };

    Ok(HalftoneRegionHeader {
        info,
        mmr: flags & 0x01 != 0,
        template: Template::from_value(flags >> 1),
        enable_skip: flags & 0x08 != 0,
        combination_operator: CombinationOperator::from_value((flags >> 4) & 0x07)?,
        default_pixel: flags & 0x80 != 0,
        grid,
    })
}

pub(crate) fn decode(reader: &mut Reader<'_>, patterns: &PatternDictionary) -> Result<RegionBitmap> {
    let header = parse(reader)?;
    let grid = header.grid;

    if u64::from(grid.width) * u64::from(grid.height) > MAX_PIXELS {
        bail!(RegionError::TooLarge);
    }

    let mut bitmap = Bitmap::filled(header.info.width, header.info.height, header.default_pixel)?;

    let skip = if header.enable_skip {
        Some(skip_mask(&grid, patterns, &bitmap)?)
    } else {
        None
    };

    // "HBPP": the bits needed to index every pattern.
    let bits_per_pixel = super::code_length(patterns.patterns.len() as u32);
    trace!(
        "halftone grid {}x{}, {bits_per_pixel} bit-planes",
        grid.width, grid.height
    );

    let values = gray_scale::decode(
        reader.tail(),
        &GrayScaleParams {
            mmr: header.mmr,
            bits_per_pixel,
            width: grid.width,
            height: grid.height,
            template: header.template,
            skip: skip.as_ref(),
        },
    )?;

    let mut values = values.into_iter();

    for mg in 0..grid.height {
        for ng in 0..grid.width {
            let gray = values.next().unwrap_or_default();
            let pattern = patterns
                .patterns
                .get(gray as usize)
                .ok_or(RegionError::GrayScaleOutOfRange)?;
            let (x, y) = grid.position(mg, ng);

            bitmap.combine(pattern, x, y, header.combination_operator);
        }
    }

    Ok(RegionBitmap {
        bitmap,
        info: header.info,
    })
}

/// "HSKIP": grid cells whose pattern lies entirely outside the region (6.6.5.1).
fn skip_mask(grid: &Grid, patterns: &PatternDictionary, region: &Bitmap) -> Result<Bitmap> {
    let mut skip = Bitmap::new(grid.width, grid.height)?;
    let (width, height) = (i64::from(patterns.width), i64::from(patterns.height));
    let (region_width, region_height) = (i64::from(region.width), i64::from(region.height));

    for mg in 0..grid.height {
        for ng in 0..grid.width {
            let (x, y) = grid.position(mg, ng);

            if x + width <= 0 || x >= region_width || y + height <= 0 || y >= region_height {
                skip.set_black(ng, mg);
            }
        }
    }

    Ok(skip)
}
