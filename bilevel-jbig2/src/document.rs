//! The segments of a stream, grouped into pages, and the memoised results of
//! decoding them.
//!
//! Segments are kept in one arena, global segments first, and refer to each
//! other by segment number. Dictionaries, tables and intermediate regions are
//! decoded the first time something asks for them.

use std::rc::Rc;

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::bitmap::Bitmap;
use crate::decode::pattern::PatternDictionary;
use crate::decode::symbol::SymbolDictionary;
use crate::decode::{RegionBitmap, generic, generic_refinement, halftone, pattern, symbol, text};
use crate::error::{DecodeError, FormatError, ParseError, Result, SegmentError, bail, err};
use crate::file::parse_stream;
use crate::huffman_table::HuffmanTable;
use crate::page::{self, Page};
use crate::reader::Reader;
use crate::segment::region::RegionSegmentInfo;
use crate::segment::{RawSegment, SegmentHeader, SegmentType};

/// Segments that are not associated with any page, shared between the pages
/// of a document.
///
/// In PDF these come from the `JBIG2Globals` stream of an image.
#[derive(Debug, Clone)]
pub struct Globals {
    data: Vec<u8>,
    segments: Vec<RawSegment>,
}

impl Globals {
    pub(crate) fn parse(encoded: &[u8]) -> Result<Self> {
        let stream = parse_stream(encoded)?;

        let segments = stream
            .segments
            .into_iter()
            .filter(|segment| {
                let global = segment.header.page == 0;

                if !global {
                    warn!(
                        "ignoring segment {} of page {} in globals",
                        segment.header.number, segment.header.page
                    );
                }

                global
            })
            .collect::<Vec<_>>();

        debug!("{} global segments", segments.len());

        Ok(Self {
            data: encoded.to_vec(),
            segments,
        })
    }

    /// The number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether there are no global segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Where the data of a segment lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Globals,
    Stream,
}

#[derive(Debug, Clone)]
struct Entry {
    raw: RawSegment,
    source: Source,
}

/// The decoded form of a segment.
#[derive(Debug, Clone)]
pub(crate) enum Decoded {
    Region(RegionBitmap),
    Symbols(Rc<SymbolDictionary>),
    Patterns(Rc<PatternDictionary>),
    Table(Rc<HuffmanTable>),
}

pub(crate) struct Document<'a> {
    stream: &'a [u8],
    globals: Option<&'a Globals>,
    segments: Vec<Entry>,
    by_number: FxHashMap<u32, usize>,
    pages: Vec<Page>,
    cache: FxHashMap<u32, Decoded>,
}

impl<'a> Document<'a> {
    pub(crate) fn new(stream: &'a [u8], globals: Option<&'a Globals>) -> Result<Self> {
        let parsed = parse_stream(stream)?;

        let global_entries = globals
            .into_iter()
            .flat_map(|globals| globals.segments.iter().cloned())
            .map(|raw| Entry {
                raw,
                source: Source::Globals,
            });
        let stream_entries = parsed.segments.into_iter().map(|raw| Entry {
            raw,
            source: Source::Stream,
        });

        let segments: Vec<Entry> = global_entries.chain(stream_entries).collect();
        let mut by_number = FxHashMap::default();
        let mut pages: Vec<Page> = Vec::new();

        for (index, entry) in segments.iter().enumerate() {
            let header = &entry.raw.header;

            if by_number.insert(header.number, index).is_some() {
                warn!("duplicate segment number {}", header.number);
            }

            if header.page == 0 {
                continue;
            }

            match pages.iter_mut().find(|page| page.number == header.page) {
                Some(page) => page.segments.push(index),
                None => pages.push(Page::new(header.page, index)),
            }
        }

        if let Some(declared) = parsed.page_count
            && declared as usize != pages.len()
        {
            warn!("file header declares {declared} pages, found {}", pages.len());
        }

        debug!(
            "{:?} stream: {} segments on {} pages",
            parsed.organization,
            segments.len(),
            pages.len()
        );

        let mut document = Self {
            stream,
            globals,
            segments,
            by_number,
            pages,
            cache: FxHashMap::default(),
        };

        for index in 0..document.segments.len() {
            if document.header(index).page == 0 {
                document.check_auxiliary(index)?;
            }
        }

        Ok(document)
    }

    pub(crate) fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|page| page.number).collect()
    }

    /// Compose page `number`, or return the bitmap composed earlier.
    pub(crate) fn decode_page(&mut self, number: u32) -> Result<Bitmap> {
        let index = self
            .pages
            .iter()
            .position(|page| page.number == number)
            .ok_or(FormatError::PageNotFound(number))?;

        if let Page {
            info: Some(info),
            bitmap: Some(bitmap),
            ..
        } = &self.pages[index]
        {
            debug!("page {number}: reusing {}x{} bitmap", info.width, bitmap.height);
            return Ok(bitmap.clone());
        }

        let segments = self.pages[index].segments.clone();
        let (info, bitmap) = page::compose(self, number, &segments)?;

        let page = &mut self.pages[index];
        page.info = Some(info);
        page.bitmap = Some(bitmap.clone());

        Ok(bitmap)
    }

    pub(crate) fn header(&self, index: usize) -> &SegmentHeader {
        &self.segments[index].raw.header
    }

    /// A reader over the data of segment `index`.
    pub(crate) fn reader(&self, index: usize) -> Result<Reader<'a>> {
        let entry = &self.segments[index];
        let buffer: &'a [u8] = match entry.source {
            Source::Stream => self.stream,
            Source::Globals => match self.globals {
                Some(globals) => globals.data.as_slice(),
                None => &[],
            },
        };

        let data = buffer
            .get(entry.raw.data.clone())
            .ok_or(ParseError::OutOfBounds)?;

        Ok(Reader::new(data))
    }

    /// Drop the memoised result of a segment.
    pub(crate) fn clear_segment_data(&mut self, number: u32) {
        self.cache.remove(&number);
    }

    /// Decode the region segment `index`, with `page` being the page bitmap
    /// as composed so far.
    pub(crate) fn decode_region(
        &mut self,
        index: usize,
        page: Option<&Bitmap>,
    ) -> Result<RegionBitmap> {
        let header = self.header(index).clone();

        self.region(index, &header, page)
            .map_err(|e| e.in_segment(header.number, header.kind))
    }

    /// Decode and keep an intermediate region for later segments.
    pub(crate) fn store_region(&mut self, index: usize, page: &Bitmap) -> Result<()> {
        let number = self.header(index).number;

        if !self.cache.contains_key(&number) {
            let region = self.decode_region(index, Some(page))?;
            self.cache.insert(number, Decoded::Region(region));
        }

        Ok(())
    }

    /// Handle the segment types that carry no image data.
    pub(crate) fn check_auxiliary(&self, index: usize) -> Result<()> {
        let header = self.header(index);

        match header.kind {
            SegmentType::Profiles => {
                let mut reader = self.reader(index)?;
                let count = reader.read_u32()?;
                let mut profiles = Vec::new();

                while profiles.len() < count as usize && !reader.at_end() {
                    profiles.push(reader.read_u32()?);
                }

                debug!("segment {}: profiles {profiles:?}", header.number);
            }
            SegmentType::ColourPalette => {
                warn!("skipping colour palette segment {}", header.number);
            }
            SegmentType::Extension => {
                let kind = self.reader(index)?.read_u32()?;

                // "If this bit is 1, the extension is necessary" (7.4.14.1)
                if kind & 0x8000_0000 != 0 {
                    return Err(DecodeError::from(SegmentError::CriticalExtension(kind))
                        .in_segment(header.number, header.kind));
                }

                warn!("skipping extension segment {} ({kind:#x})", header.number);
            }
            _ => {}
        }

        Ok(())
    }

    fn index_of(&self, number: u32) -> Result<usize> {
        match self.by_number.get(&number) {
            Some(&index) => Ok(index),
            None => err!(SegmentError::MissingReference(number)),
        }
    }

    /// The decoded form of segment `number`, decoding it on first use.
    ///
    /// `accept` guards the type of the referred-to segment.
    fn referred(&mut self, number: u32, accept: fn(SegmentType) -> bool) -> Result<&Decoded> {
        let index = self.index_of(number)?;
        let header = self.header(index).clone();

        if !accept(header.kind) {
            bail!(SegmentError::WrongReferenceType(number));
        }

        if !self.cache.contains_key(&number) {
            let decoded = self
                .decode_segment(index, &header)
                .map_err(|e| e.in_segment(header.number, header.kind))?;
            self.cache.insert(number, decoded);
        }

        self.cache
            .get(&number)
            .ok_or(SegmentError::MissingReference(number).into())
    }

    fn symbols(&mut self, number: u32) -> Result<Rc<SymbolDictionary>> {
        match self.referred(number, |kind| kind == SegmentType::SymbolDictionary)? {
            Decoded::Symbols(dictionary) => Ok(dictionary.clone()),
            _ => bail!(SegmentError::WrongReferenceType(number)),
        }
    }

    fn patterns(&mut self, number: u32) -> Result<Rc<PatternDictionary>> {
        match self.referred(number, |kind| kind == SegmentType::PatternDictionary)? {
            Decoded::Patterns(dictionary) => Ok(dictionary.clone()),
            _ => bail!(SegmentError::WrongReferenceType(number)),
        }
    }

    fn table(&mut self, number: u32) -> Result<Rc<HuffmanTable>> {
        match self.referred(number, |kind| kind == SegmentType::Tables)? {
            Decoded::Table(table) => Ok(table.clone()),
            _ => bail!(SegmentError::WrongReferenceType(number)),
        }
    }

    fn decode_segment(&mut self, index: usize, header: &SegmentHeader) -> Result<Decoded> {
        debug!(
            "decoding segment {} ({:?}, {} bytes{})",
            header.number,
            header.kind,
            self.segments[index].raw.data.len(),
            if header.deferred_non_retain {
                ", deferred non-retain"
            } else {
                ""
            }
        );

        Ok(match header.kind {
            SegmentType::SymbolDictionary => {
                Decoded::Symbols(Rc::new(self.symbol_dictionary(index, header)?))
            }
            SegmentType::PatternDictionary => {
                Decoded::Patterns(Rc::new(pattern::decode(&mut self.reader(index)?)?))
            }
            SegmentType::Tables => {
                Decoded::Table(Rc::new(HuffmanTable::parse(&mut self.reader(index)?)?))
            }
            kind if kind.is_intermediate_region() => {
                Decoded::Region(self.region(index, header, None)?)
            }
            _ => bail!(SegmentError::WrongReferenceType(header.number)),
        })
    }

    /// The symbols and tables of the referred-to segments, in order, and the
    /// last referred-to symbol dictionary.
    fn symbol_inputs(
        &mut self,
        header: &SegmentHeader,
    ) -> Result<(Vec<Rc<Bitmap>>, Vec<Rc<HuffmanTable>>, Option<Rc<SymbolDictionary>>)> {
        let mut symbols = Vec::new();
        let mut tables = Vec::new();
        let mut last = None;

        for &number in &header.referred_to {
            let kind = self.header(self.index_of(number)?).kind;

            match kind {
                SegmentType::SymbolDictionary => {
                    let dictionary = self.symbols(number)?;
                    symbols.extend(dictionary.symbols.iter().cloned());
                    last = Some(dictionary);
                }
                SegmentType::Tables => tables.push(self.table(number)?),
                _ => bail!(SegmentError::WrongReferenceType(number)),
            }
        }

        Ok((symbols, tables, last))
    }

    fn symbol_dictionary(
        &mut self,
        index: usize,
        header: &SegmentHeader,
    ) -> Result<SymbolDictionary> {
        let (inputs, tables, last) = self.symbol_inputs(header)?;
        let retained = last.as_ref().and_then(|dictionary| dictionary.retained.as_ref());

        symbol::decode(&mut self.reader(index)?, &inputs, &tables, retained)
    }

    fn region(
        &mut self,
        index: usize,
        header: &SegmentHeader,
        page: Option<&Bitmap>,
    ) -> Result<RegionBitmap> {
        let mut reader = self.reader(index)?;
        let unknown_length = self.segments[index].raw.unknown_length;

        match header.kind {
            SegmentType::IntermediateGenericRegion
            | SegmentType::ImmediateGenericRegion
            | SegmentType::ImmediateLosslessGenericRegion => {
                generic::decode(&mut reader, unknown_length)
            }
            SegmentType::IntermediateTextRegion
            | SegmentType::ImmediateTextRegion
            | SegmentType::ImmediateLosslessTextRegion => {
                let (symbols, tables, _) = self.symbol_inputs(header)?;
                let symbols: Vec<&Bitmap> = symbols.iter().map(AsRef::as_ref).collect();

                text::decode(&mut reader, &symbols, &tables)
            }
            SegmentType::IntermediateHalftoneRegion
            | SegmentType::ImmediateHalftoneRegion
            | SegmentType::ImmediateLosslessHalftoneRegion => {
                let &number = header
                    .referred_to
                    .first()
                    .ok_or(SegmentError::MissingPatternDictionary)?;
                let patterns = self.patterns(number)?;

                halftone::decode(&mut reader, &patterns)
            }
            kind if kind.is_refinement() => match header.referred_to.first() {
                Some(&number) => {
                    let decoded = self.referred(number, SegmentType::is_intermediate_region)?;
                    let Decoded::Region(reference) = decoded else {
                        bail!(SegmentError::WrongReferenceType(number));
                    };

                    generic_refinement::decode(&mut reader, &reference.bitmap)
                }
                None => {
                    // "If there are no referred-to segments, then use the page
                    // bitmap as the reference buffer." (7.4.7.5)
                    let page = page.ok_or(FormatError::MissingPageInfo)?;
                    let start = reader.mark();
                    let info = RegionSegmentInfo::parse(&mut reader)?;
                    reader.reset(start);

                    let reference = page.extract(
                        i64::from(info.x),
                        i64::from(info.y),
                        info.width,
                        info.height,
                    )?;

                    generic_refinement::decode(&mut reader, &reference)
                }
            },
            _ => bail!(SegmentError::WrongReferenceType(header.number)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A segment header with a 1-byte page association and no references.
    fn segment(number: u8, kind: u8, page: u8, data: &[u8]) -> Vec<u8> {
        let mut out = vec![0, 0, 0, number, kind, 0x00, page];
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
        out
    }

    fn referring(number: u8, kind: u8, page: u8, referred: u8, data: &[u8]) -> Vec<u8> {
        let mut out = vec![0, 0, 0, number, kind, 0x20, referred, page];
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn groups_segments_by_page() {
        let mut data = segment(0, 53, 0, &[]);
        data.extend(segment(1, 49, 2, &[]));
        data.extend(segment(2, 49, 1, &[]));
        data.extend(segment(3, 49, 2, &[]));

        let document = Document::new(&data, None).unwrap();

        assert_eq!(document.page_numbers(), vec![2, 1]);
        assert_eq!(document.pages[0].segments, vec![1, 3]);
        assert_eq!(document.pages[1].segments, vec![2]);
    }

    #[test]
    fn globals_come_first() {
        let globals = Globals::parse(&segment(0, 53, 0, &[0x01])).unwrap();
        let data = segment(1, 49, 1, &[]);

        let document = Document::new(&data, Some(&globals)).unwrap();

        assert_eq!(document.header(0).number, 0);
        assert_eq!(document.reader(0).unwrap().tail(), &[0x01]);
        assert_eq!(document.index_of(1).unwrap(), 1);
    }

    #[test]
    fn missing_and_mistyped_references() {
        let mut data = segment(0, 49, 1, &[]);
        data.extend(referring(1, 22, 1, 0, &[]));

        let mut document = Document::new(&data, None).unwrap();

        assert_eq!(
            document.patterns(0).unwrap_err(),
            SegmentError::WrongReferenceType(0).into()
        );
        assert_eq!(
            document.symbols(7).unwrap_err(),
            SegmentError::MissingReference(7).into()
        );
    }

    #[test]
    fn dictionaries_are_memoised_and_cleared() {
        // An empty Huffman symbol dictionary.
        let dictionary = [0x00, 0x01, 0, 0, 0, 0, 0, 0, 0, 0];
        let data = segment(0, 0, 0, &dictionary);

        let mut document = Document::new(&data, None).unwrap();
        let first = document.symbols(0).unwrap();
        let second = document.symbols(0).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.symbols.is_empty());

        document.clear_segment_data(0);
        assert!(!Rc::ptr_eq(&first, &document.symbols(0).unwrap()));
    }

    #[test]
    fn critical_extension_is_an_error() {
        let data = segment(0, 62, 0, &[0x80, 0, 0, 0x01]);

        let err = Document::new(&data, None).err().unwrap();
        assert!(matches!(err, DecodeError::InSegment { number: 0, .. }));
        assert_eq!(
            *err.root_cause(),
            SegmentError::CriticalExtension(0x8000_0001).into()
        );

        let comment = segment(0, 62, 0, &[0x20, 0, 0, 0x00, b'h', b'i']);
        assert!(Document::new(&comment, None).is_ok());
    }
}
