//! Builders for small JBIG2 streams, and an MQ encoder to produce arithmetic
//! coded test data.

#![allow(dead_code)]

#[path = "../../src/arithmetic_encoder.rs"]
mod arithmetic_encoder;

use arithmetic_encoder::{MqEncoder, contexts};

pub const SYMBOL_DICTIONARY: u8 = 0;
pub const IMMEDIATE_TEXT_REGION: u8 = 6;
pub const IMMEDIATE_GENERIC_REGION: u8 = 38;
pub const PAGE_INFORMATION: u8 = 48;
pub const END_OF_PAGE: u8 = 49;
pub const END_OF_STRIPE: u8 = 50;
pub const END_OF_FILE: u8 = 51;

/// A segment header with a one byte page association.
pub fn header(number: u32, kind: u8, page: u8, referred: &[u8], data_length: u32) -> Vec<u8> {
    let mut out = number.to_be_bytes().to_vec();
    out.push(kind);
    out.push((referred.len() as u8) << 5);
    out.extend_from_slice(referred);
    out.push(page);
    out.extend_from_slice(&data_length.to_be_bytes());
    out
}

/// A segment header followed by its data.
pub fn segment(number: u32, kind: u8, page: u8, referred: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = header(number, kind, page, referred, data.len() as u32);
    out.extend_from_slice(data);
    out
}

/// The data of a page information segment, not striped.
pub fn page_info(width: u32, height: u32, flags: u8) -> Vec<u8> {
    let mut out = width.to_be_bytes().to_vec();
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&[0; 8]);
    out.push(flags);
    out.extend_from_slice(&[0x00, 0x00]);
    out
}

/// A region segment information field.
pub fn region_info(width: u32, height: u32, x: u32, y: u32, operator: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for value in [width, height, x, y] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    out.push(operator);
    out
}

/// The header of a standalone file.
pub fn file_header(sequential: bool, pages: Option<u32>) -> Vec<u8> {
    let mut out = vec![0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A];
    let mut flags = u8::from(sequential);

    if pages.is_none() {
        flags |= 0x02;
    }

    out.push(flags);

    if let Some(pages) = pages {
        out.extend_from_slice(&pages.to_be_bytes());
    }

    out
}

/// A page of `width` x `height` pixels, 1 meaning black.
pub type Image = Vec<Vec<u8>>;

pub fn image(width: u32, height: u32, pixel: impl Fn(u32, u32) -> bool) -> Image {
    (0..height)
        .map(|y| (0..width).map(|x| u8::from(pixel(x, y))).collect())
        .collect()
}

/// Assert that a decoded bitmap shows `expected`.
pub fn assert_pixels(bitmap: &bilevel_jbig2::Bitmap, expected: &Image) {
    assert_eq!(bitmap.height as usize, expected.len());

    for (y, row) in expected.iter().enumerate() {
        assert_eq!(bitmap.width as usize, row.len());

        for (x, &pixel) in row.iter().enumerate() {
            assert_eq!(
                bitmap.get_pixel(x as u32, y as u32),
                pixel == 1,
                "pixel ({x}, {y})"
            );
        }
    }
}

/// Encode `image` as the data of a template 0 generic region.
pub fn encode_generic(image: &Image, tpgdon: bool) -> Vec<u8> {
    let mut encoder = MqEncoder::new();
    encoder.encode_generic(&mut contexts(16), image, tpgdon);
    encoder.finish()
}

/// The data of a template 0 generic region segment with the nominal AT
/// pixels.
pub fn generic_region(image: &Image, tpgdon: bool) -> Vec<u8> {
    let mut data = region_info(image[0].len() as u32, image.len() as u32, 0, 0, 0);
    data.push(if tpgdon { 0x08 } else { 0x00 });
    data.extend_from_slice(&[0x03, 0xFF, 0xFD, 0xFF, 0x02, 0xFE, 0xFE, 0xFE]);
    data.extend_from_slice(&encode_generic(image, tpgdon));
    data
}
