//! Decoding of complete streams built segment by segment.

mod support;

use bilevel_jbig2::{
    Color, DecodeError, DecodeParams, Decoder, FormatError, ParseError, SegmentType,
    decode_bytes, decode_globals,
};
use support::*;

fn empty_page(width: u32, height: u32, flags: u8) -> Vec<u8> {
    let mut data = segment(0, PAGE_INFORMATION, 1, &[], &page_info(width, height, flags));
    data.extend(segment(1, END_OF_PAGE, 1, &[], &[]));
    data
}

/// Diagonal stripes, with rows 10 and 11 repeating row 9.
fn stripes() -> Image {
    let mut image = image(37, 21, |x, y| (x + 2 * y) % 7 < 3);
    image[10] = image[9].clone();
    image[11] = image[9].clone();
    image
}

/// `stripes` coded as a template 0 generic region without TPGDON.
const STRIPES_ENCODED: [u8; 31] = [
    0xF7, 0x42, 0xA3, 0x2A, 0xEF, 0xB9, 0x37, 0x68, 0x66, 0xD3, 0x19, 0xC6, 0x3D, 0xAC, 0x56,
    0x80, 0x08, 0xA5, 0xEC, 0xB5, 0x10, 0xF5, 0x37, 0x2D, 0x40, 0x9F, 0x07, 0xFF, 0x7F, 0xFF,
    0xAC,
];

/// A 54x44 frame, two pixels thick, coded with MMR.
const FRAME_MMR: [u8; 29] = [
    0x26, 0xA0, 0x71, 0xCE, 0xA7, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xF8, 0xF0, 0x01, 0x00, 0x10,
];

fn frame() -> Image {
    image(54, 44, |x, y| x < 2 || x >= 52 || y < 2 || y >= 42)
}

fn frame_region() -> Vec<u8> {
    let mut data = region_info(54, 44, 0, 0, 0);
    data.push(0x01);
    data.extend_from_slice(&FRAME_MMR);
    data
}

fn single_region_page(width: u32, height: u32, region: &[u8]) -> Vec<u8> {
    let mut data = segment(0, PAGE_INFORMATION, 1, &[], &page_info(width, height, 0));
    data.extend(segment(1, IMMEDIATE_GENERIC_REGION, 1, &[], region));
    data.extend(segment(2, END_OF_PAGE, 1, &[], &[]));
    data
}

#[test]
fn empty_page_is_white() {
    let data = empty_page(64, 56, 0);

    let bytes = decode_bytes(&data, &DecodeParams::default(), None).unwrap();
    assert_eq!(bytes, vec![0; 448]);

    let params = DecodeParams {
        color: Color::Chocolate,
        ..DecodeParams::default()
    };
    let bytes = decode_bytes(&data, &params, None).unwrap();
    assert_eq!(bytes, vec![0xFF; 448]);
}

#[test]
fn padded_and_unpadded_output() {
    // Default pixel black.
    let data = empty_page(12, 2, 0x04);

    let padded = decode_bytes(&data, &DecodeParams::default(), None).unwrap();
    assert_eq!(padded, [0xFF, 0xF0, 0xFF, 0xF0]);

    let params = DecodeParams {
        unpadded_data: true,
        ..DecodeParams::default()
    };
    let unpadded = decode_bytes(&data, &params, None).unwrap();
    assert_eq!(unpadded, [0xFF, 0xFF, 0xFF]);
}

#[test]
fn mmr_generic_region() {
    let data = single_region_page(54, 44, &frame_region());

    let mut decoder = Decoder::new(&data, None).unwrap();
    let page = decoder.decode_page(1).unwrap();

    assert_pixels(&page, &frame());
}

#[test]
fn mmr_generic_region_of_unknown_length() {
    let mut region = frame_region();
    region.extend_from_slice(&[0x00, 0x00, 0, 0, 0, 44]);

    let mut data = segment(0, PAGE_INFORMATION, 1, &[], &page_info(54, 44, 0));
    data.extend(header(1, IMMEDIATE_GENERIC_REGION, 1, &[], 0xFFFF_FFFF));
    data.extend_from_slice(&region);
    data.extend(segment(2, END_OF_PAGE, 1, &[], &[]));

    let page = Decoder::new(&data, None).unwrap().decode_page(1).unwrap();
    assert_pixels(&page, &frame());
}

#[test]
fn arithmetic_generic_region() {
    let mut region = region_info(37, 21, 0, 0, 0);
    region.push(0x00);
    region.extend_from_slice(&[0x03, 0xFF, 0xFD, 0xFF, 0x02, 0xFE, 0xFE, 0xFE]);
    region.extend_from_slice(&STRIPES_ENCODED);

    let data = single_region_page(37, 21, &region);
    let page = Decoder::new(&data, None).unwrap().decode_page(1).unwrap();

    assert_pixels(&page, &stripes());
}

#[test]
fn typical_prediction_round_trip() {
    let text = image(45, 30, |x, y| {
        let (cx, cy) = (x % 15, y % 10);
        (2..8).contains(&cy) && (cx == 3 || cx == 9 || (cy == 4 && (3..10).contains(&cx)))
    });

    for tpgdon in [false, true] {
        let data = single_region_page(45, 30, &generic_region(&text, tpgdon));
        let page = Decoder::new(&data, None).unwrap().decode_page(1).unwrap();

        assert_pixels(&page, &text);
    }
}

#[test]
fn region_is_combined_with_page() {
    // An 8x8 black square ORed onto a 16x16 page with default pixel white.
    let square = image(8, 8, |_, _| true);
    let mut region = generic_region(&square, false);
    region[8..12].copy_from_slice(&4_u32.to_be_bytes());
    region[12..16].copy_from_slice(&6_u32.to_be_bytes());

    let data = single_region_page(16, 16, &region);
    let page = Decoder::new(&data, None).unwrap().decode_page(1).unwrap();

    let expected = image(16, 16, |x, y| (4..12).contains(&x) && (6..14).contains(&y));
    assert_pixels(&page, &expected);
}

/// A Huffman coded symbol dictionary with one 5x3 symbol.
fn glyph_dictionary(number: u32, page: u8) -> Vec<u8> {
    let data = [
        0x00, 0x01, 0, 0, 0, 1, 0, 0, 0, 1, // flags, exported and new symbols
        0xDC, 0xBF, 0x00, // HCDH 3, DW 5, OOB, BMSIZE 0
        0x88, 0x50, 0x20, // "#...#", ".#.#.", "..#.."
        0x00, 0x40, // export runs 0 and 1
    ];

    segment(number, SYMBOL_DICTIONARY, page, &[], &data)
}

/// A Huffman coded 8x4 text region placing symbol 0 at (1, 0).
fn glyph_text_region(number: u32, page: u8, dictionary: u8) -> Vec<u8> {
    let mut data = region_info(8, 4, 0, 0, 0);
    // Huffman, top left, standard tables, one instance.
    data.extend_from_slice(&[0x00, 0x11, 0x00, 0x00, 0, 0, 0, 1]);
    // Symbol ID table: run code 1 has length 1, the symbol has length 1.
    data.push(0x01);
    data.extend_from_slice(&[0; 17]);
    // DT 1, DT 1, DFS 1, ID 0, OOB.
    data.extend_from_slice(&[0x00, 0x24]);

    segment(number, IMMEDIATE_TEXT_REGION, page, &[dictionary], &data)
}

const GLYPH_PAGE: [u8; 4] = [0x44, 0x28, 0x10, 0x00];

#[test]
fn text_region_with_symbols() {
    let mut data = segment(0, PAGE_INFORMATION, 1, &[], &page_info(8, 4, 0));
    data.extend(glyph_dictionary(1, 1));
    data.extend(glyph_text_region(2, 1, 1));
    data.extend(segment(3, END_OF_PAGE, 1, &[], &[]));

    let bytes = decode_bytes(&data, &DecodeParams::default(), None).unwrap();
    assert_eq!(bytes, GLYPH_PAGE);
}

#[test]
fn symbols_from_globals() {
    let globals = decode_globals(&glyph_dictionary(0, 0)).unwrap();
    assert_eq!(globals.len(), 1);

    let mut data = segment(1, PAGE_INFORMATION, 1, &[], &page_info(8, 4, 0));
    data.extend(glyph_text_region(2, 1, 0));
    data.extend(segment(3, END_OF_PAGE, 1, &[], &[]));

    let bytes = decode_bytes(&data, &DecodeParams::default(), Some(&globals)).unwrap();
    assert_eq!(bytes, GLYPH_PAGE);

    // Without the globals the dictionary is missing.
    let err = decode_bytes(&data, &DecodeParams::default(), None).unwrap_err();
    assert!(matches!(err, DecodeError::InSegment { number: 2, .. }));
}

fn two_page_segments() -> Vec<Vec<u8>> {
    vec![
        segment(0, PAGE_INFORMATION, 1, &[], &page_info(8, 2, 0)),
        segment(1, END_OF_PAGE, 1, &[], &[]),
        segment(2, PAGE_INFORMATION, 2, &[], &page_info(8, 2, 0x04)),
        segment(3, END_OF_PAGE, 2, &[], &[]),
        segment(4, END_OF_FILE, 0, &[], &[]),
    ]
}

#[test]
fn sequential_file_with_two_pages() {
    let mut data = file_header(true, Some(2));
    data.extend(two_page_segments().concat());

    let mut decoder = Decoder::new(&data, None).unwrap();
    assert_eq!(decoder.page_count(), 2);
    assert_eq!(decoder.page_numbers(), [1, 2]);

    let first = decoder.decode_next_page().unwrap().unwrap();
    assert_eq!(first.data, [0x00, 0x00]);

    let second = decoder.decode_next_page().unwrap().unwrap();
    assert_eq!(second.data, [0xFF, 0xFF]);

    assert!(decoder.decode_next_page().is_none());

    // Pages can be decoded again in any order.
    assert_eq!(decoder.decode_page(1).unwrap(), first);
}

#[test]
fn random_access_file() {
    let mut data = file_header(false, None);
    let segments = two_page_segments();

    // Headers first, then the data of each segment.
    for segment in &segments {
        let header_len = segment.len() - segment_data_len(segment);
        data.extend_from_slice(&segment[..header_len]);
    }

    for segment in &segments {
        let header_len = segment.len() - segment_data_len(segment);
        data.extend_from_slice(&segment[header_len..]);
    }

    let mut decoder = Decoder::new(&data, None).unwrap();
    assert_eq!(decoder.page_numbers(), [1, 2]);
    assert_eq!(decoder.decode_page(2).unwrap().data, [0xFF, 0xFF]);
}

/// The data length of a segment built by `segment`.
fn segment_data_len(segment: &[u8]) -> usize {
    // Number, flags, referred count and page association, all without
    // references.
    let len = &segment[7..11];
    u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize
}

#[test]
fn unknown_page() {
    let data = empty_page(8, 1, 0);
    let mut decoder = Decoder::new(&data, None).unwrap();

    assert_eq!(
        decoder.decode_page(3).unwrap_err(),
        FormatError::PageNotFound(3).into()
    );
}

#[test]
fn broken_page_does_not_affect_others() {
    let mut data = segment(0, PAGE_INFORMATION, 1, &[], &page_info(8, 2, 0));
    // A generic region cut off inside its region segment information field.
    data.extend(segment(1, IMMEDIATE_GENERIC_REGION, 1, &[], &[0, 0, 0, 8, 0]));
    data.extend(segment(2, END_OF_PAGE, 1, &[], &[]));
    data.extend(segment(3, PAGE_INFORMATION, 2, &[], &page_info(8, 2, 0x04)));
    data.extend(segment(4, END_OF_PAGE, 2, &[], &[]));

    let mut decoder = Decoder::new(&data, None).unwrap();

    let err = decoder.decode_page(1).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::InSegment {
            number: 1,
            kind: SegmentType::ImmediateGenericRegion,
            ..
        }
    ));
    assert_eq!(err.root_cause(), &ParseError::UnexpectedEof.into());

    assert_eq!(decoder.decode_page(2).unwrap().data, [0xFF, 0xFF]);
}

#[test]
fn page_without_information() {
    let data = segment(0, END_OF_PAGE, 1, &[], &[]);

    assert_eq!(
        decode_bytes(&data, &DecodeParams::default(), None).unwrap_err(),
        FormatError::MissingPageInfo.into()
    );
}

#[test]
fn striped_page_of_unknown_height() {
    let mut info = page_info(8, 0xFFFF_FFFF, 0);
    // Striped, at most 4 rows per stripe.
    info[17..19].copy_from_slice(&[0x80, 0x04]);

    let square = image(8, 2, |_, _| true);
    let mut region = generic_region(&square, false);
    region[12..16].copy_from_slice(&1_u32.to_be_bytes());

    let mut data = segment(0, PAGE_INFORMATION, 1, &[], &info);
    data.extend(segment(1, IMMEDIATE_GENERIC_REGION, 1, &[], &region));
    data.extend(segment(2, END_OF_STRIPE, 1, &[], &3_u32.to_be_bytes()));
    data.extend(segment(3, END_OF_PAGE, 1, &[], &[]));

    let page = Decoder::new(&data, None).unwrap().decode_page(1).unwrap();
    assert_eq!(page.data, [0x00, 0xFF, 0xFF, 0x00]);
}
