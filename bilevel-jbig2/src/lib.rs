/*!
A memory-safe, pure-Rust JBIG2 decoder.

`bilevel-jbig2` decodes JBIG2 images as specified in ITU-T T.88 (also known as
ISO/IEC 14492). JBIG2 is a bi-level image compression standard commonly used
in PDF documents for compressing scanned text documents.

Both the embedded organization used by PDF and standalone JBIG2 files are
accepted. Segments shared between the images of a PDF document (the
`JBIG2Globals` stream) are parsed once with [`decode_globals`] and passed to
every decode.

# Example
```rust,no_run
use bilevel_jbig2::{DecodeParams, Decoder};

let data = std::fs::read("image.jb2").unwrap();
let mut decoder = Decoder::new(&data, None).unwrap();

for number in decoder.page_numbers() {
    let page = decoder.decode_page(number).unwrap();
    println!("page {number}: {}x{}", page.width, page.height);
}

// Or, for the first page only:
let bytes = bilevel_jbig2::decode_bytes(&data, &DecodeParams::default(), None).unwrap();
```

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]

mod arithmetic_decoder;
#[cfg(test)]
mod arithmetic_encoder;
mod bitmap;
mod decode;
mod document;
mod error;
mod file;
mod gray_scale;
mod huffman_table;
mod integer_decoder;
mod page;
mod reader;
mod segment;
mod symbol_id_decoder;

use document::Document;

pub use bitmap::Bitmap;
pub use document::Globals;
pub use error::{
    DecodeError, FormatError, HuffmanError, ParseError, RegionError, Result, SegmentError,
    SymbolError, TemplateError,
};
pub use segment::SegmentType;

/// The polarity of decoded bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Color {
    /// A set bit is a black pixel, as in JBIG2 itself.
    #[default]
    Vanilla,
    /// A set bit is a white pixel, as expected for PDF image masks.
    Chocolate,
}

/// How decoded pixels are laid out in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeParams {
    /// Pack rows back to back instead of padding each to a byte boundary.
    pub unpadded_data: bool,
    /// The polarity of the output.
    pub color: Color,
}

/// Decode the first page of `encoded` into bytes.
///
/// Rows are padded to a byte unless [`DecodeParams::unpadded_data`] is set.
pub fn decode_bytes(
    encoded: &[u8],
    params: &DecodeParams,
    globals: Option<&Globals>,
) -> Result<Vec<u8>> {
    let mut decoder = Decoder::new(encoded, globals)?;
    let bitmap = decoder
        .decode_next_page()
        .ok_or(FormatError::MissingPageInfo)??;

    Ok(bitmap.to_bytes(params))
}

/// Parse a stream of global segments, for example a PDF `JBIG2Globals`
/// stream.
///
/// Only segments that are not associated with a page are kept.
pub fn decode_globals(encoded: &[u8]) -> Result<Globals> {
    Globals::parse(encoded)
}

/// A decoder for the pages of a JBIG2 stream.
///
/// Dictionaries decoded for one page are kept and reused for later pages.
pub struct Decoder<'a> {
    document: Document<'a>,
    pages: Vec<u32>,
    next: usize,
}

impl<'a> Decoder<'a> {
    /// Parse the segment structure of `encoded`.
    ///
    /// No image data is decoded until a page is requested.
    pub fn new(encoded: &'a [u8], globals: Option<&'a Globals>) -> Result<Self> {
        let document = Document::new(encoded, globals)?;
        let pages = document.page_numbers();

        Ok(Self {
            document,
            pages,
            next: 0,
        })
    }

    /// The number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The page numbers, in the order the pages first appear.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.clone()
    }

    /// Decode the page with page number `number`.
    ///
    /// A page that fails to decode does not affect other pages, unless they
    /// share the segment that failed.
    pub fn decode_page(&mut self, number: u32) -> Result<Bitmap> {
        self.document.decode_page(number)
    }

    /// Decode the page after the one returned by the previous call, starting
    /// with the first page.
    pub fn decode_next_page(&mut self) -> Option<Result<Bitmap>> {
        let number = *self.pages.get(self.next)?;
        self.next += 1;

        Some(self.decode_page(number))
    }
}
