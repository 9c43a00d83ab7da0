//! Page composition (8.2).
//!
//! "The page bitmap is initialized to the default pixel value, and then the
//! region segments associated with the page are decoded and combined with the
//! page bitmap in the order in which they occur."

use log::{debug, warn};

use crate::bitmap::Bitmap;
use crate::decode::RegionBitmap;
use crate::document::Document;
use crate::error::{DecodeError, FormatError, Result, bail};
use crate::segment::SegmentType;
use crate::segment::page_info::{PageInformation, parse_end_of_stripe};
use crate::segment::region::CombinationOperator;

/// The segments of one page and the bitmap they compose to.
#[derive(Debug, Clone)]
pub(crate) struct Page {
    pub(crate) number: u32,
    /// Indices into the segment arena, in stream order.
    pub(crate) segments: Vec<usize>,
    pub(crate) info: Option<PageInformation>,
    pub(crate) bitmap: Option<Bitmap>,
}

impl Page {
    pub(crate) fn new(number: u32, first_segment: usize) -> Self {
        Self {
            number,
            segments: vec![first_segment],
            info: None,
            bitmap: None,
        }
    }
}

/// The page bitmap under construction.
struct Canvas {
    bitmap: Bitmap,
    info: PageInformation,
    /// The last end of stripe row seen.
    stripe_end: Option<u32>,
}

impl Canvas {
    fn new(info: PageInformation) -> Result<Self> {
        // "Bit 2: Page default pixel value. This bit contains the initial value
        // for every pixel in the page, before any region segments are decoded
        // or drawn." (7.4.8.5)
        let height = info.height.unwrap_or(0);
        let bitmap = Bitmap::filled(info.width, height, info.flags.default_pixel)?;

        Ok(Self {
            bitmap,
            info,
            stripe_end: None,
        })
    }

    /// Grow a page of unknown height to at least `height` rows.
    fn grow(&mut self, height: u32) -> Result<()> {
        if self.info.height.is_none() {
            self.bitmap
                .extend_height(height, self.info.flags.default_pixel)?;
        }

        Ok(())
    }

    /// "The Y coordinate of the end row of the stripe" (7.4.10)
    fn end_stripe(&mut self, row: u32) -> Result<()> {
        if let Some(previous) = self.stripe_end
            && row < previous
        {
            warn!("end of stripe row {row} before previous row {previous}");
        }

        let start = self.stripe_end.map_or(0, |previous| previous.saturating_add(1));
        let max = u32::from(self.info.striping.max_stripe_size);

        if self.info.striping.striped && max > 0 && row.saturating_sub(start) >= max {
            warn!("stripe ending at row {row} is higher than {max} rows");
        }

        self.stripe_end = Some(row);
        self.grow(row.checked_add(1).ok_or(DecodeError::Overflow)?)
    }

    /// The operator a region is drawn with.
    fn operator(&self, region: &RegionBitmap) -> CombinationOperator {
        // "Bit 6: Page combination operator overridden. If this bit is 0, then
        // every direct region segment associated with this page must use the
        // page's default combination operator" (7.4.8.5)
        if self.info.flags.operator_overridden {
            region.info.combination_operator
        } else {
            self.info.flags.default_operator
        }
    }

    /// Draw an immediate region onto the page.
    ///
    /// `sole` is set if this is the only region of the page.
    fn draw(&mut self, region: RegionBitmap, operator: CombinationOperator, sole: bool) -> Result<()> {
        let bottom = u64::from(region.info.y) + u64::from(region.info.height);
        self.grow(u32::try_from(bottom).map_err(|_| DecodeError::Overflow)?)?;

        let covers_page = region.info.x == 0
            && region.info.y == 0
            && region.bitmap.width == self.bitmap.width
            && region.bitmap.height == self.bitmap.height;

        if sole
            && covers_page
            && self.info.height.is_some()
            && !self.info.flags.default_pixel
            && matches!(
                operator,
                CombinationOperator::Or | CombinationOperator::Xor | CombinationOperator::Replace
            )
        {
            debug!("adopting region bitmap as page bitmap");
            self.bitmap = region.bitmap;
            return Ok(());
        }

        if region.info.colour_extension {
            warn!("ignoring colour extension of region");
        }

        if region.info.x >= self.bitmap.width || region.info.y >= self.bitmap.height {
            warn!(
                "region at ({}, {}) lies outside the {}x{} page",
                region.info.x, region.info.y, self.bitmap.width, self.bitmap.height
            );
        }

        self.bitmap.combine(
            &region.bitmap,
            i64::from(region.info.x),
            i64::from(region.info.y),
            operator,
        );

        Ok(())
    }

    fn finish(self) -> Result<(PageInformation, Bitmap)> {
        if self.info.height.is_none() && self.bitmap.height == 0 {
            bail!(FormatError::UnknownPageHeight);
        }

        Ok((self.info, self.bitmap))
    }
}

/// Find and parse the page information segment of a page.
fn page_information(document: &Document<'_>, segments: &[usize]) -> Result<PageInformation> {
    let mut found = segments
        .iter()
        .filter(|&&index| document.header(index).kind == SegmentType::PageInformation);

    let index = *found.next().ok_or(FormatError::MissingPageInfo)?;

    if found.next().is_some() {
        bail!(FormatError::DuplicatePageInfo);
    }

    let header = document.header(index);

    PageInformation::parse(&mut document.reader(index)?)
        .map_err(|e| e.in_segment(header.number, header.kind))
}

/// Compose the page made of `segments`.
pub(crate) fn compose(
    document: &mut Document<'_>,
    number: u32,
    segments: &[usize],
) -> Result<(PageInformation, Bitmap)> {
    let info = page_information(document, segments)?;

    debug!(
        "page {number}: {}x{} at {}x{} px/m, default pixel {}, striped {}",
        info.width,
        info.height.map_or_else(|| "unknown".into(), |h| h.to_string()),
        info.x_resolution,
        info.y_resolution,
        u8::from(info.flags.default_pixel),
        info.striping.striped
    );
    debug!(
        "page {number}: lossless {}, refinements {}, auxiliary buffers {}",
        info.flags.lossless,
        info.flags.might_contain_refinements,
        info.flags.requires_auxiliary_buffers
    );

    let regions = segments
        .iter()
        .filter(|&&index| document.header(index).kind.is_immediate_region())
        .count();

    let mut canvas = Canvas::new(info)?;
    let mut ended = false;
    let mut intermediate = Vec::new();

    for &index in segments {
        let header = document.header(index).clone();

        match header.kind {
            SegmentType::EndOfPage => {
                ended = true;
                break;
            }
            SegmentType::EndOfFile => break,
            SegmentType::EndOfStripe => {
                let row = parse_end_of_stripe(&mut document.reader(index)?)
                    .map_err(|e| e.in_segment(header.number, header.kind))?;
                canvas.end_stripe(row)?;
            }
            kind if kind.is_immediate_region() => {
                let region = document.decode_region(index, Some(&canvas.bitmap))?;

                // An immediate refinement of the page replaces the area it
                // refined.
                let operator = if kind.is_refinement() && header.referred_to.is_empty() {
                    CombinationOperator::Replace
                } else {
                    canvas.operator(&region)
                };

                canvas.draw(region, operator, regions == 1)?;
            }
            kind if kind.is_intermediate_region() => {
                document.store_region(index, &canvas.bitmap)?;
                intermediate.push(header.number);
            }
            SegmentType::Profiles | SegmentType::ColourPalette | SegmentType::Extension => {
                document.check_auxiliary(index)?;
            }
            // Dictionaries and tables are decoded when referred to.
            _ => {}
        }
    }

    if !ended {
        warn!("page {number} has no end of page segment");
    }

    for number in intermediate {
        document.clear_segment_data(number);
    }

    canvas.finish()
}
