//! Byte-packed bi-level bitmaps.
//!
//! "Pixels decoded by the MMR decoder having the value 'black' shall be treated
//! as having the value 1. Pixels decoded by the MMR decoder having the value
//! 'white' shall be treated as having the value 0." (6.2.6)
//!
//! Rows are stored most significant bit first and padded to a byte boundary.
//! Padding bits are always zero.

use crate::error::{RegionError, Result, bail};
use crate::segment::region::CombinationOperator;
use crate::{Color, DecodeParams};

/// Upper bound on the number of pixels of a single bitmap.
pub(crate) const MAX_PIXELS: u64 = 1 << 32;

/// A bi-level image, one bit per pixel, 1 meaning black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// The width in pixels.
    pub width: u32,
    /// The height in pixels.
    pub height: u32,
    /// The number of bytes per row, `ceil(width / 8)`.
    pub stride: usize,
    /// The packed rows, `height * stride` bytes.
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Create a white bitmap.
    pub(crate) fn new(width: u32, height: u32) -> Result<Self> {
        if width as u64 * height as u64 > MAX_PIXELS {
            bail!(RegionError::TooLarge);
        }

        let stride = width.div_ceil(8) as usize;

        Ok(Self {
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
        })
    }

    /// Create a bitmap with every pixel set to `black`.
    pub(crate) fn filled(width: u32, height: u32, black: bool) -> Result<Self> {
        let mut bitmap = Self::new(width, height)?;

        if black {
            bitmap.fill(true);
        }

        Ok(bitmap)
    }

    /// Whether the pixel at (x, y) is black. Pixels outside are white.
    pub fn get_pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }

        self.data[y as usize * self.stride + (x / 8) as usize] & (0x80 >> (x % 8)) != 0
    }

    /// Set the pixel at (x, y). Pixels outside are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, black: bool) {
        if x >= self.width || y >= self.height {
            return;
        }

        let idx = y as usize * self.stride + (x / 8) as usize;
        let mask = 0x80 >> (x % 8);

        if black {
            self.data[idx] |= mask;
        } else {
            self.data[idx] &= !mask;
        }
    }

    /// The pixel at signed coordinates as a context bit, 0 outside the bitmap.
    #[inline(always)]
    pub(crate) fn pixel(&self, x: i32, y: i32) -> u32 {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return 0;
        }

        let byte = self.data[y as usize * self.stride + (x as usize >> 3)];
        ((byte >> (7 - (x & 7))) & 1) as u32
    }

    /// Mark a pixel black. The pixel must be inside the bitmap.
    #[inline(always)]
    pub(crate) fn set_black(&mut self, x: u32, y: u32) {
        self.data[y as usize * self.stride + (x >> 3) as usize] |= 0x80 >> (x & 7);
    }

    /// The packed bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.stride]
    }

    /// Copy row `from` over row `to`.
    pub(crate) fn copy_row(&mut self, from: u32, to: u32) {
        let src = from as usize * self.stride;
        self.data
            .copy_within(src..src + self.stride, to as usize * self.stride);
    }

    /// Set every pixel, keeping row padding zero.
    pub(crate) fn fill(&mut self, black: bool) {
        self.data.fill(if black { 0xFF } else { 0 });

        if black {
            self.clear_padding();
        }
    }

    /// Invert every pixel.
    pub fn invert(&mut self) {
        for byte in &mut self.data {
            *byte = !*byte;
        }

        self.clear_padding();
    }

    pub(crate) fn clear_padding(&mut self) {
        let mask = last_byte_mask(self.width);

        if mask == 0xFF || self.stride == 0 {
            return;
        }

        for row in self.data.chunks_exact_mut(self.stride) {
            row[self.stride - 1] &= mask;
        }
    }

    /// Grow the bitmap to `height` rows, filling new rows with `black`.
    pub(crate) fn extend_height(&mut self, height: u32, black: bool) -> Result<()> {
        if height <= self.height {
            return Ok(());
        }

        if self.width as u64 * height as u64 > MAX_PIXELS {
            bail!(RegionError::TooLarge);
        }

        let mut rows = Self::filled(self.width, height - self.height, black)?;
        self.data.append(&mut rows.data);
        self.height = height;

        Ok(())
    }

    /// Combine `src` into this bitmap with its top-left corner at (x, y).
    ///
    /// Pixels of `src` falling outside this bitmap are dropped.
    pub(crate) fn combine(&mut self, src: &Self, x: i64, y: i64, op: CombinationOperator) {
        let x_start = x.max(0);
        let x_end = (x + src.width as i64).min(self.width as i64);
        let y_start = y.max(0);
        let y_end = (y + src.height as i64).min(self.height as i64);

        if x_start >= x_end || y_start >= y_end {
            return;
        }

        let first_byte = (x_start / 8) as usize;
        let last_byte = ((x_end - 1) / 8) as usize;

        for dst_y in y_start..y_end {
            let src_row = src.row((dst_y - y) as u32);
            let dst_row_start = dst_y as usize * self.stride;

            for byte_idx in first_byte..=last_byte {
                let byte_x = byte_idx as i64 * 8;
                let lo = (x_start - byte_x).max(0);
                let hi = (x_end - byte_x).min(8);
                let mask = (0xFF_u16 >> lo) as u8 & !(0xFF_u16 >> hi) as u8;

                let src_bits = fetch_byte(src_row, byte_x - x);
                let dst = &mut self.data[dst_row_start + byte_idx];
                let combined = op.apply(*dst, src_bits);

                *dst = (*dst & !mask) | (combined & mask);
            }
        }
    }

    /// Copy out the `width` x `height` area at (x, y). Pixels outside this
    /// bitmap are white.
    pub(crate) fn extract(&self, x: i64, y: i64, width: u32, height: u32) -> Result<Self> {
        let mut out = Self::new(width, height)?;
        let mask = last_byte_mask(width);

        for out_y in 0..height {
            let src_y = y + out_y as i64;

            if src_y < 0 || src_y >= self.height as i64 {
                continue;
            }

            let src_row = self.row(src_y as u32);
            let stride = out.stride;
            let dst_row = out.row_mut(out_y);

            for (idx, byte) in dst_row.iter_mut().enumerate() {
                let bit = x + idx as i64 * 8;
                *byte = fetch_byte_clipped(src_row, bit, self.width);
            }

            if stride > 0 {
                dst_row[stride - 1] &= mask;
            }
        }

        Ok(out)
    }

    /// The rows packed back to back without padding.
    pub fn unpadded(&self) -> Vec<u8> {
        if self.width % 8 == 0 {
            return self.data.clone();
        }

        let total_bits = self.width as usize * self.height as usize;
        let mut out = vec![0_u8; total_bits.div_ceil(8)];
        let mut bit = 0_usize;

        for y in 0..self.height {
            let row = self.row(y);
            let mut remaining = self.width as usize;
            let mut src_bit = 0_i64;

            while remaining > 0 {
                let take = remaining.min(8);
                let bits = fetch_byte(row, src_bit) & !(0xFF_u16 >> take) as u8;
                let shift = bit % 8;

                out[bit / 8] |= bits >> shift;
                if shift != 0 && shift + take > 8 {
                    out[bit / 8 + 1] |= bits << (8 - shift);
                }

                bit += take;
                src_bit += take as i64;
                remaining -= take;
            }
        }

        out
    }

    /// The bitmap as bytes, laid out and coloured according to `params`.
    pub fn to_bytes(&self, params: &DecodeParams) -> Vec<u8> {
        let mut bitmap;

        let source = if params.color == Color::Chocolate {
            bitmap = self.clone();
            bitmap.invert();
            &bitmap
        } else {
            self
        };

        if params.unpadded_data {
            source.unpadded()
        } else {
            source.data.clone()
        }
    }

    /// Convert to an 8-bit grayscale image, black pixels becoming 0.
    #[cfg(feature = "image")]
    pub fn to_luma_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.get_pixel(x, y) { 0 } else { 255 }])
        })
    }
}

/// Mask of the valid bits in the last byte of a row.
fn last_byte_mask(width: u32) -> u8 {
    match width % 8 {
        0 => 0xFF,
        rem => !(0xFF_u8 >> rem),
    }
}

/// Read eight bits starting at bit `bit` of `row`, with zeros outside.
#[inline(always)]
fn fetch_byte(row: &[u8], bit: i64) -> u8 {
    if bit <= -8 {
        return 0;
    }

    if bit < 0 {
        return row.first().copied().unwrap_or(0) >> (-bit);
    }

    let idx = (bit / 8) as usize;
    let shift = (bit % 8) as u32;
    let hi = row.get(idx).copied().unwrap_or(0);

    if shift == 0 {
        hi
    } else {
        let lo = row.get(idx + 1).copied().unwrap_or(0);
        (hi << shift) | (lo >> (8 - shift))
    }
}

/// Like [`fetch_byte`], but also zeroes bits at or beyond `width`.
#[inline(always)]
fn fetch_byte_clipped(row: &[u8], bit: i64, width: u32) -> u8 {
    let bits = fetch_byte(row, bit);
    let valid = width as i64 - bit;

    if valid >= 8 {
        bits
    } else if valid <= 0 {
        0
    } else {
        bits & !(0xFF_u16 >> valid) as u8
    }
}

#[cfg(test)]
impl Bitmap {
    /// A bitmap drawn with `#` for black and `.` for white pixels.
    pub(crate) fn from_rows(rows: &[&str]) -> Self {
        let width = rows.first().map_or(0, |row| row.len());
        let mut bitmap = Self::new(width as u32, rows.len() as u32).unwrap();

        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                bitmap.set_pixel(x as u32, y as u32, c == '#');
            }
        }

        bitmap
    }

    /// The rows drawn the way [`Bitmap::from_rows`] reads them.
    pub(crate) fn to_rows(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| if self.get_pixel(x, y) { '#' } else { '.' })
                    .collect()
            })
            .collect()
    }
}
