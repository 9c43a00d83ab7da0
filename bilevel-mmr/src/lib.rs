/*!
A CCITT Group 4 (MMR) decoder.

`bilevel-mmr` decodes two-dimensional run-length coded bi-level data as
specified in ITU-T T.6, the coding JBIG2 reuses for its MMR regions. Codes are
resolved through two-level lookup tables built once from the T.4 code tables.

Decoded rows are handed to a [`RowSink`] as packed bytes, most significant bit
first, where a set bit is a black pixel.

# Example
```rust
use bilevel_mmr::{DecodeSettings, decode};

// A single white row of 8 pixels: pass mode, followed by EOFB.
let data = [0b0001_0000, 0b0000_0001, 0b0000_0000, 0b0001_0000];
let settings = DecodeSettings {
    columns: 8,
    rows: 1,
    end_of_block: true,
    strict: true,
};

let mut rows: Vec<u8> = Vec::new();
decode(&data, &mut rows, &settings).unwrap();
assert_eq!(rows, [0x00]);
```
*/

#![forbid(unsafe_code)]

mod bit_reader;
mod decode;
mod tables;

use core::fmt;

use bit_reader::BitReader;
use decode::{RowDecoder, RowEnd};
use log::{debug, warn};
use tables::{EOFB, tables};

pub use tables::TableError;

/// Settings for decoding a block of MMR data.
#[derive(Copy, Clone, Debug)]
pub struct DecodeSettings {
    /// The width of a row in pixels.
    pub columns: u32,
    /// The maximum number of rows to decode.
    pub rows: u32,
    /// Whether the data may be terminated by an EOFB marker.
    pub end_of_block: bool,
    /// Whether changing elements beyond the row width are an error rather
    /// than being clamped.
    pub strict: bool,
}

/// Receives decoded rows.
pub trait RowSink {
    /// Push one packed row of `ceil(columns / 8)` bytes. Set bits are black.
    fn push_row(&mut self, row: &[u8]);
}

impl RowSink for Vec<u8> {
    fn push_row(&mut self, row: &[u8]) {
        self.extend_from_slice(row);
    }
}

/// An error that occurred while decoding MMR data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The data ended in the middle of a row.
    UnexpectedEof,
    /// A bit sequence matches no code of the expected table.
    InvalidCode,
    /// A run length overflowed.
    Overflow,
    /// A changing element lies beyond the row width.
    RowOverrun,
    /// The code tables could not be built.
    Table(TableError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of MMR data"),
            Self::InvalidCode => write!(f, "invalid MMR code"),
            Self::Overflow => write!(f, "run length overflow"),
            Self::RowOverrun => write!(f, "changing element beyond row width"),
            Self::Table(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodeTooLong(len) => {
                write!(f, "code of {len} bits exceeds the lookup table capacity")
            }
            Self::Conflict => write!(f, "conflicting code prefixes"),
        }
    }
}

impl core::error::Error for DecodeError {}
impl core::error::Error for TableError {}

impl From<TableError> for DecodeError {
    fn from(e: TableError) -> Self {
        Self::Table(e)
    }
}

/// Result type for MMR decoding.
pub type Result<T> = core::result::Result<T, DecodeError>;

/// The outcome of a successful decode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// The number of bytes consumed, including a trailing EOFB and padding.
    pub bytes_read: usize,
    /// The number of rows pushed to the sink.
    pub rows: u32,
}

/// Decode MMR data into `sink`.
///
/// Decoding stops after `settings.rows` rows, at an EOFB marker, or when the
/// data is exhausted at a row boundary. Trailing EOL codes are consumed before
/// the final byte alignment.
pub fn decode(data: &[u8], sink: &mut impl RowSink, settings: &DecodeSettings) -> Result<Decoded> {
    let tables = tables()?;
    let mut reader = BitReader::new(data);
    let mut rows = RowDecoder::new(tables, settings.columns, settings.strict)?;
    let mut packed = vec![0; settings.columns.div_ceil(8) as usize];
    let mut decoded_rows = 0;

    while decoded_rows < settings.rows {
        if settings.end_of_block && reader.peek_bits(24) == EOFB {
            reader.consume(24)?;
            debug!("EOFB after {decoded_rows} rows");
            break;
        }

        if reader.at_end() {
            warn!(
                "MMR data ended after {decoded_rows} of {} rows",
                settings.rows
            );
            break;
        }

        if rows.decode_row(&mut reader)? == RowEnd::EndOfBlock {
            break;
        }

        rows.pack_row(&mut packed);
        sink.push_row(&packed);
        decoded_rows += 1;
    }

    if settings.end_of_block && reader.peek_bits(24) == EOFB {
        reader.consume(24)?;
    }

    while reader.at_eol() {
        reader.consume(12)?;
    }

    reader.align();

    Ok(Decoded {
        bytes_read: reader.byte_pos(),
        rows: decoded_rows,
    })
}
