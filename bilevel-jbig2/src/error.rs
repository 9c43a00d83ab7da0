//! Error types for JBIG2 decoding.

use core::fmt;

use crate::segment::SegmentType;

/// An error that stopped a decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The data ended early or a read left its window.
    Parse(ParseError),
    /// The file or page structure is broken.
    Format(FormatError),
    /// A segment header or reference is invalid.
    Segment(SegmentError),
    /// A Huffman table or code is invalid.
    Huffman(HuffmanError),
    /// A region has invalid parameters.
    Region(RegionError),
    /// Template or coding-context configuration is invalid.
    Template(TemplateError),
    /// Symbol decoding or lookup failed.
    Symbol(SymbolError),
    /// Errors from the MMR decoder.
    Mmr(bilevel_mmr::DecodeError),
    /// An error raised while decoding a specific segment.
    InSegment {
        /// The segment number.
        number: u32,
        /// The segment type.
        kind: SegmentType,
        /// The underlying error.
        source: Box<Self>,
    },
    /// A coordinate or size computation overflowed.
    Overflow,
    /// Feature not supported by this decoder.
    Unsupported,
}

/// Failures of the bit stream reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The data ended before a read finished.
    UnexpectedEof,
    /// A seek or sub-stream lies outside the current window.
    OutOfBounds,
}

/// Errors related to file and page structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// Reserved bits are not zero.
    ReservedBits,
    /// Missing required page information segment.
    MissingPageInfo,
    /// A page has more than one page information segment.
    DuplicatePageInfo,
    /// Page height unknown with no stripe segments or regions.
    UnknownPageHeight,
    /// The requested page does not exist.
    PageNotFound(u32),
}

/// Errors related to segment framing and references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// Unknown or reserved segment type.
    UnknownType(u8),
    /// Invalid referred-to segment count.
    InvalidReferredCount,
    /// Segment refers to a larger segment number.
    InvalidReference,
    /// A referred-to segment does not exist.
    MissingReference(u32),
    /// A referred-to segment has a type that is not allowed here.
    WrongReferenceType(u32),
    /// Missing end marker for unknown-length region.
    MissingEndMarker,
    /// A segment other than an immediate generic region has unknown length.
    UnknownLength,
    /// Missing required pattern dictionary.
    MissingPatternDictionary,
    /// An extension segment that must be understood is not supported.
    CriticalExtension(u32),
}

/// Errors related to Huffman decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanError {
    /// Invalid Huffman code sequence.
    InvalidCode,
    /// Invalid Huffman table selection.
    InvalidSelection,
    /// Not enough referred Huffman tables.
    MissingTables,
    /// Unexpected out-of-band value.
    UnexpectedOob,
    /// Two codes of a table collide.
    InvalidTable,
    /// A prefix or range length exceeds 32 bits.
    CodeTooLong,
}

/// Errors related to region parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    /// Invalid combination operator value.
    InvalidCombinationOperator,
    /// Region with invalid dimension.
    InvalidDimension,
    /// The bitmap would be too large to allocate.
    TooLarge,
    /// Gray-scale value exceeds pattern count.
    GrayScaleOutOfRange,
}

/// Errors related to template configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateError {
    /// Invalid adaptive template pixel location.
    InvalidAtPixel,
    /// Retained coding contexts do not match the dictionary using them.
    RetainedMismatch,
    /// No retained coding contexts are available.
    MissingRetained,
}

/// Errors related to symbol handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolError {
    /// No symbols available for text region.
    NoSymbols,
    /// More symbols were exported or decoded than declared.
    TooManySymbols,
    /// Symbol ID out of valid range.
    OutOfRange,
    /// Unexpected out-of-band value.
    UnexpectedOob,
    /// An invalid symbol was encountered.
    Invalid,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Format(e) => write!(f, "{e}"),
            Self::Segment(e) => write!(f, "{e}"),
            Self::Huffman(e) => write!(f, "{e}"),
            Self::Region(e) => write!(f, "{e}"),
            Self::Template(e) => write!(f, "{e}"),
            Self::Symbol(e) => write!(f, "{e}"),
            Self::Mmr(e) => write!(f, "MMR: {e}"),
            Self::InSegment {
                number,
                kind,
                source,
            } => write!(f, "segment {number} ({kind:?}): {source}"),
            Self::Overflow => write!(f, "arithmetic overflow"),
            Self::Unsupported => write!(f, "unsupported feature"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of input"),
            Self::OutOfBounds => write!(f, "position outside of the data window"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedBits => write!(f, "reserved bits must be zero"),
            Self::MissingPageInfo => write!(f, "missing page information segment"),
            Self::DuplicatePageInfo => write!(f, "duplicate page information segment"),
            Self::UnknownPageHeight => write!(f, "page height unknown with no stripe segments"),
            Self::PageNotFound(page) => write!(f, "page {page} not found"),
        }
    }
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(t) => write!(f, "unknown or reserved segment type {t}"),
            Self::InvalidReferredCount => write!(f, "invalid referred-to segment count"),
            Self::InvalidReference => write!(f, "segment refers to larger segment number"),
            Self::MissingReference(n) => write!(f, "referred-to segment {n} is missing"),
            Self::WrongReferenceType(n) => {
                write!(f, "referred-to segment {n} has an unexpected type")
            }
            Self::MissingEndMarker => write!(f, "missing end marker for unknown-length region"),
            Self::UnknownLength => write!(f, "segment of unknown length is not allowed here"),
            Self::MissingPatternDictionary => write!(f, "missing required pattern dictionary"),
            Self::CriticalExtension(t) => write!(f, "unsupported critical extension {t:#x}"),
        }
    }
}

impl fmt::Display for HuffmanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCode => write!(f, "invalid Huffman code"),
            Self::InvalidSelection => write!(f, "invalid Huffman table selection"),
            Self::MissingTables => write!(f, "not enough referred Huffman tables"),
            Self::UnexpectedOob => write!(f, "unexpected out-of-band value"),
            Self::InvalidTable => write!(f, "Huffman table codes collide"),
            Self::CodeTooLong => write!(f, "Huffman code or range longer than 32 bits"),
        }
    }
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCombinationOperator => write!(f, "invalid combination operator"),
            Self::InvalidDimension => write!(f, "invalid dimension value"),
            Self::TooLarge => write!(f, "bitmap too large"),
            Self::GrayScaleOutOfRange => write!(f, "gray-scale value exceeds pattern count"),
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAtPixel => write!(f, "invalid adaptive template pixel location"),
            Self::RetainedMismatch => write!(f, "retained coding contexts do not match"),
            Self::MissingRetained => write!(f, "no retained coding contexts available"),
        }
    }
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSymbols => write!(f, "no symbols available"),
            Self::OutOfRange => write!(f, "symbol ID out of range"),
            Self::UnexpectedOob => write!(f, "unexpected out-of-band value"),
            Self::TooManySymbols => write!(f, "symbol dictionary contains too many symbols"),
            Self::Invalid => write!(f, "invalid symbol encountered"),
        }
    }
}

impl core::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Mmr(e) => Some(e),
            Self::InSegment { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// `Error` for each category, and the conversion into its `DecodeError`
/// variant.
macro_rules! category {
    ($($variant:ident($ty:ident)),* $(,)?) => {
        $(
            impl core::error::Error for $ty {}

            impl From<$ty> for DecodeError {
                fn from(e: $ty) -> Self {
                    Self::$variant(e)
                }
            }
        )*
    };
}

category!(
    Parse(ParseError),
    Format(FormatError),
    Segment(SegmentError),
    Huffman(HuffmanError),
    Region(RegionError),
    Template(TemplateError),
    Symbol(SymbolError),
);

// Running out of MMR data is the same condition as running out of segment
// data.
impl From<bilevel_mmr::DecodeError> for DecodeError {
    fn from(e: bilevel_mmr::DecodeError) -> Self {
        match e {
            bilevel_mmr::DecodeError::UnexpectedEof => Self::Parse(ParseError::UnexpectedEof),
            e => Self::Mmr(e),
        }
    }
}

impl DecodeError {
    /// Attach the segment that was being decoded.
    pub(crate) fn in_segment(self, number: u32, kind: SegmentType) -> Self {
        match self {
            e @ Self::InSegment { .. } => e,
            e => Self::InSegment {
                number,
                kind,
                source: Box::new(e),
            },
        }
    }

    /// The innermost error, without segment context.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::InSegment { source, .. } => source.root_cause(),
            e => e,
        }
    }
}

/// The result of a decoding operation.
pub type Result<T> = core::result::Result<T, DecodeError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

macro_rules! err {
    ($err:expr) => {
        Err($err.into())
    };
}

pub(crate) use bail;
pub(crate) use err;
