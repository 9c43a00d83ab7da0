//! Text region segments (7.4.3) and the text region decoding procedure (6.4).

use std::iter;
use std::rc::Rc;

use log::warn;

use super::generic_refinement::{self, RefinementParams};
use super::{
    AtPixel, RefinementTemplate, RegionBitmap, UserTables, code_length,
    parse_refinement_at_pixels,
};
use crate::arithmetic_decoder::{ArithmeticDecoder, Contexts};
use crate::bitmap::Bitmap;
use crate::error::{DecodeError, HuffmanError, Result, SymbolError, bail};
use crate::huffman_table::{HuffmanTable, StandardTable, TableLine};
use crate::integer_decoder::IntegerDecoder;
use crate::reader::Reader;
use crate::segment::region::{CombinationOperator, RegionSegmentInfo};
use crate::symbol_id_decoder::SymbolIdDecoder;

/// "REFCORNER" (7.4.3.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReferenceCorner {
    BottomLeft,
    TopLeft,
    BottomRight,
    TopRight,
}

impl ReferenceCorner {
    fn from_value(value: u16) -> Self {
        match value & 0x03 {
            0 => Self::BottomLeft,
            1 => Self::TopLeft,
            2 => Self::BottomRight,
            _ => Self::TopRight,
        }
    }

    fn is_left(self) -> bool {
        matches!(self, Self::BottomLeft | Self::TopLeft)
    }

    fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }
}

/// Parameters of the text region decoding procedure (Table 9).
#[derive(Debug, Clone)]
pub(crate) struct TextRegionParams {
    /// "SBW"
    pub(crate) width: u32,
    /// "SBH"
    pub(crate) height: u32,
    /// "SBREFINE"
    pub(crate) refine: bool,
    /// "SBNUMINSTANCES"
    pub(crate) num_instances: u32,
    /// "LOGSBSTRIPS"
    pub(crate) log_strips: u8,
    pub(crate) corner: ReferenceCorner,
    pub(crate) transposed: bool,
    pub(crate) combination_operator: CombinationOperator,
    pub(crate) default_pixel: bool,
    /// "SBDSOFFSET"
    pub(crate) ds_offset: i32,
    pub(crate) refinement_template: RefinementTemplate,
    pub(crate) refinement_at: [AtPixel; 2],
}

impl TextRegionParams {
    fn strips(&self) -> i32 {
        1 << self.log_strips
    }
}

/// The integer and symbol ID decoders of an arithmetically coded text region.
#[derive(Debug, Clone)]
pub(crate) struct TextContexts {
    iadt: IntegerDecoder,
    iafs: IntegerDecoder,
    iads: IntegerDecoder,
    iait: IntegerDecoder,
    iari: IntegerDecoder,
    iardw: IntegerDecoder,
    iardh: IntegerDecoder,
    pub(crate) iardx: IntegerDecoder,
    pub(crate) iardy: IntegerDecoder,
    pub(crate) iaid: SymbolIdDecoder,
}

impl TextContexts {
    pub(crate) fn new(symbol_code_len: u32) -> Result<Self> {
        Ok(Self {
            iadt: IntegerDecoder::new(),
            iafs: IntegerDecoder::new(),
            iads: IntegerDecoder::new(),
            iait: IntegerDecoder::new(),
            iari: IntegerDecoder::new(),
            iardw: IntegerDecoder::new(),
            iardh: IntegerDecoder::new(),
            iardx: IntegerDecoder::new(),
            iardy: IntegerDecoder::new(),
            iaid: SymbolIdDecoder::new(symbol_code_len)?,
        })
    }
}

/// The Huffman tables of a text region (7.4.3.1.6).
#[derive(Clone, Copy)]
pub(crate) struct TextHuffmanTables<'a> {
    pub(crate) fs: &'a HuffmanTable,
    pub(crate) ds: &'a HuffmanTable,
    pub(crate) dt: &'a HuffmanTable,
    pub(crate) rdw: &'a HuffmanTable,
    pub(crate) rdh: &'a HuffmanTable,
    pub(crate) rdx: &'a HuffmanTable,
    pub(crate) rdy: &'a HuffmanTable,
    pub(crate) rsize: &'a HuffmanTable,
}

/// How symbol IDs are coded in a Huffman text region.
#[derive(Clone, Copy)]
pub(crate) enum SymbolCodes<'a> {
    /// The table decoded from the segment header (7.4.3.1.7).
    Table(&'a HuffmanTable),
    /// Fixed-length codes, as used inside symbol dictionaries (6.5.8.2.3).
    Fixed(u8),
}

/// The entropy coder a text region is decoded with.
pub(crate) enum TextCoder<'a, 'b> {
    Huffman {
        reader: &'a mut Reader<'b>,
        tables: TextHuffmanTables<'a>,
        codes: SymbolCodes<'a>,
    },
    Arithmetic {
        decoder: &'a mut ArithmeticDecoder<'b>,
        contexts: &'a mut TextContexts,
        refinement: &'a mut Contexts,
    },
}

impl TextCoder<'_, '_> {
    /// "STRIPT" delta (6.4.6), in units of strips.
    fn strip_delta_t(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.dt.decode_value(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts.iadt.decode_value(decoder, SymbolError::UnexpectedOob),
        }
    }

    /// "DFS" (6.4.7).
    fn first_s(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.fs.decode_value(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts.iafs.decode_value(decoder, SymbolError::UnexpectedOob),
        }
    }

    /// "IDS" (6.4.8), `None` ending the strip.
    fn delta_s(&mut self) -> Result<Option<i32>> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.ds.decode(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts.iads.decode(decoder),
        }
    }

    /// "CURT" (6.4.9).
    fn current_t(&mut self, log_strips: u8) -> Result<i32> {
        if log_strips == 0 {
            return Ok(0);
        }

        match self {
            Self::Huffman { reader, .. } => Ok(reader.read_bits(log_strips)? as i32),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts.iait.decode_value(decoder, SymbolError::UnexpectedOob),
        }
    }

    /// "ID" (6.4.10).
    fn symbol_id(&mut self) -> Result<u32> {
        match self {
            Self::Huffman { reader, codes, .. } => match codes {
                SymbolCodes::Table(table) => Ok(table.decode_value(reader)? as u32),
                SymbolCodes::Fixed(len) => reader.read_bits(*len),
            },
            Self::Arithmetic {
                decoder, contexts, ..
            } => Ok(contexts.iaid.decode(decoder)),
        }
    }

    /// "R_I" (6.4.11).
    fn refinement_flag(&mut self) -> Result<bool> {
        match self {
            Self::Huffman { reader, .. } => Ok(reader.read_bit()? != 0),
            Self::Arithmetic {
                decoder, contexts, ..
            } => Ok(contexts
                .iari
                .decode_value(decoder, SymbolError::UnexpectedOob)?
                != 0),
        }
    }

    /// "RDW", "RDH", "RDX" and "RDY" (6.4.11.1 to 6.4.11.4).
    fn refinement_deltas(&mut self) -> Result<[i32; 4]> {
        match self {
            Self::Huffman { reader, tables, .. } => Ok([
                tables.rdw.decode_value(reader)?,
                tables.rdh.decode_value(reader)?,
                tables.rdx.decode_value(reader)?,
                tables.rdy.decode_value(reader)?,
            ]),
            Self::Arithmetic {
                decoder, contexts, ..
            } => Ok([
                contexts.iardw.decode_value(decoder, SymbolError::UnexpectedOob)?,
                contexts.iardh.decode_value(decoder, SymbolError::UnexpectedOob)?,
                contexts.iardx.decode_value(decoder, SymbolError::UnexpectedOob)?,
                contexts.iardy.decode_value(decoder, SymbolError::UnexpectedOob)?,
            ]),
        }
    }

    /// Decode a refined symbol bitmap (6.4.11, steps 5 to 7).
    fn refine(&mut self, bitmap: &mut Bitmap, params: &RefinementParams<'_>) -> Result<()> {
        match self {
            Self::Huffman { reader, tables, .. } => {
                // "BMSIZE", then the refinement data on its own byte boundary.
                let size = tables.rsize.decode_value(reader)?;
                reader.align();

                let size = usize::try_from(size).map_err(|_| DecodeError::Overflow)?;
                let data = reader.read_bytes(size)?;

                let mut decoder = ArithmeticDecoder::new(data);
                let mut contexts = Contexts::new(params.template.context_bits());
                generic_refinement::decode_bitmap(bitmap, &mut decoder, &mut contexts, params);
            }
            Self::Arithmetic {
                decoder,
                refinement,
                ..
            } => generic_refinement::decode_bitmap(bitmap, decoder, refinement, params),
        }

        Ok(())
    }
}

/// Where a symbol instance's top-left pixel goes (6.4.5, step 3 c) x)).
fn placement(
    corner: ReferenceCorner,
    transposed: bool,
    s: i32,
    t: i32,
    width: i32,
    height: i32,
) -> (i64, i64) {
    let (s, t) = (i64::from(s), i64::from(t));
    let (width, height) = (i64::from(width), i64::from(height));

    if !transposed {
        let x = if corner.is_left() { s } else { s - width + 1 };
        let y = if corner.is_top() { t } else { t - height + 1 };
        (x, y)
    } else {
        let x = if corner.is_left() { t } else { t - width + 1 };
        let y = if corner.is_top() { s } else { s - height + 1 };
        (x, y)
    }
}

/// Decode the symbol instances of a text region into a new bitmap (6.4.5).
pub(crate) fn decode_with(
    coder: &mut TextCoder<'_, '_>,
    symbols: &[&Bitmap],
    params: &TextRegionParams,
) -> Result<Bitmap> {
    let mut region = Bitmap::filled(params.width, params.height, params.default_pixel)?;

    if params.num_instances > 0 && symbols.is_empty() {
        bail!(SymbolError::NoSymbols);
    }

    let strips = params.strips();
    let mut strip_t = coder
        .strip_delta_t()?
        .checked_mul(-strips)
        .ok_or(DecodeError::Overflow)?;
    let mut first_s = 0_i32;
    let mut instances = 0_u32;

    while instances < params.num_instances {
        let dt = coder
            .strip_delta_t()?
            .checked_mul(strips)
            .ok_or(DecodeError::Overflow)?;
        strip_t = strip_t.checked_add(dt).ok_or(DecodeError::Overflow)?;

        let mut current_s = None;

        loop {
            let s = match current_s {
                None => {
                    first_s = first_s
                        .checked_add(coder.first_s()?)
                        .ok_or(DecodeError::Overflow)?;
                    first_s
                }
                Some(s) => {
                    let Some(ds) = coder.delta_s()? else {
                        break;
                    };

                    ds.checked_add(params.ds_offset)
                        .and_then(|ds| ds.checked_add(s))
                        .ok_or(DecodeError::Overflow)?
                }
            };

            if instances >= params.num_instances {
                bail!(SymbolError::TooManySymbols);
            }

            let t = strip_t
                .checked_add(coder.current_t(params.log_strips)?)
                .ok_or(DecodeError::Overflow)?;
            let id = coder.symbol_id()?;
            let refine = params.refine && coder.refinement_flag()?;

            let refined;
            let symbol = match symbols.get(id as usize) {
                Some(symbol) if refine => {
                    refined = refine_symbol(coder, symbol, params)?;
                    &refined
                }
                Some(symbol) => *symbol,
                None if refine => bail!(SymbolError::OutOfRange),
                None => {
                    warn!("symbol ID {id} out of range, instance skipped");
                    instances += 1;
                    current_s = Some(s);
                    continue;
                }
            };

            let (width, height) = dimensions(symbol)?;
            let extent = (if params.transposed { height } else { width }) - 1;

            // The S coordinate moves over the symbol before placing it when
            // the reference corner is on the far side.
            let leading = if params.transposed {
                !params.corner.is_top()
            } else {
                !params.corner.is_left()
            };

            let mut s = s;
            if leading {
                s = s.checked_add(extent).ok_or(DecodeError::Overflow)?;
            }

            let (x, y) = placement(params.corner, params.transposed, s, t, width, height);
            region.combine(symbol, x, y, params.combination_operator);

            if !leading {
                s = s.checked_add(extent).ok_or(DecodeError::Overflow)?;
            }

            current_s = Some(s);
            instances += 1;
        }
    }

    Ok(region)
}

/// The size of a symbol in the signed coordinates instances are placed with.
fn dimensions(symbol: &Bitmap) -> Result<(i32, i32)> {
    let width = i32::try_from(symbol.width).map_err(|_| DecodeError::Overflow)?;
    let height = i32::try_from(symbol.height).map_err(|_| DecodeError::Overflow)?;

    Ok((width, height))
}

/// Decode a refined instance of `symbol` (6.4.11).
fn refine_symbol(
    coder: &mut TextCoder<'_, '_>,
    symbol: &Bitmap,
    params: &TextRegionParams,
) -> Result<Bitmap> {
    let [rdw, rdh, rdx, rdy] = coder.refinement_deltas()?;

    let width = (symbol.width as i64) + i64::from(rdw);
    let height = (symbol.height as i64) + i64::from(rdh);
    let width = u32::try_from(width).map_err(|_| DecodeError::Overflow)?;
    let height = u32::try_from(height).map_err(|_| DecodeError::Overflow)?;

    let dx = rdw
        .div_euclid(2)
        .checked_add(rdx)
        .ok_or(DecodeError::Overflow)?;
    let dy = rdh
        .div_euclid(2)
        .checked_add(rdy)
        .ok_or(DecodeError::Overflow)?;

    let mut bitmap = Bitmap::new(width, height)?;
    coder.refine(
        &mut bitmap,
        &RefinementParams {
            template: params.refinement_template,
            tpgron: false,
            at_pixels: params.refinement_at,
            reference: symbol,
            dx,
            dy,
        },
    )?;

    Ok(bitmap)
}

/// Parsed text region segment header (7.4.3.1).
struct TextRegionHeader {
    info: RegionSegmentInfo,
    huffman: bool,
    params: TextRegionParams,
    huffman_flags: u16,
}

fn parse(reader: &mut Reader<'_>) -> Result<TextRegionHeader> {
    let info = RegionSegmentInfo::parse(reader)?;
    let flags = reader.read_u16()?;

    let huffman = flags & 0x0001 != 0;
    let refine = flags & 0x0002 != 0;
    let log_strips = ((flags >> 2) & 0x03) as u8;
    let corner = ReferenceCorner::from_value(flags >> 4);
    let transposed = flags & 0x0040 != 0;
    let combination_operator = CombinationOperator::from_value(((flags >> 7) & 0x03) as u8)?;
    let default_pixel = flags & 0x0200 != 0;

    // "SBDSOFFSET" is a signed 5-bit value.
    let ds_offset = (((flags >> 10) & 0x1F) as i32) << 27 >> 27;
    let refinement_template = RefinementTemplate::from_bit(flags & 0x8000 != 0);

    let huffman_flags = if huffman { reader.read_u16()? } else { 0 };

    let refinement_at = if refine && refinement_template == RefinementTemplate::Template0 {
        parse_refinement_at_pixels(reader)?
    } else {
        [AtPixel::new(0, 0); 2]
    };

    let num_instances = reader.read_u32()?;

    Ok(TextRegionHeader {
        params: TextRegionParams {
            width: info.width,
            height: info.height,
            refine,
            num_instances,
            log_strips,
            corner,
            transposed,
            combination_operator,
            default_pixel,
            ds_offset,
            refinement_template,
            refinement_at,
        },
        info,
        huffman,
        huffman_flags,
    })
}

/// Resolve the Huffman table selections (7.4.3.1.2).
fn select_tables<'a>(flags: u16, user: &mut UserTables<'a>) -> Result<TextHuffmanTables<'a>> {
    use StandardTable::*;

    let field = |shift: u16| ((flags >> shift) & 0x03) as u8;

    if flags & 0x8000 != 0 {
        warn!("reserved bit set in text region Huffman flags");
    }

    Ok(TextHuffmanTables {
        fs: user.select(field(0), &[F, G], 3)?,
        ds: user.select(field(2), &[H, I, J], 3)?,
        dt: user.select(field(4), &[K, L, M], 3)?,
        rdw: user.select(field(6), &[N, O], 3)?,
        rdh: user.select(field(8), &[N, O], 3)?,
        rdx: user.select(field(10), &[N, O], 3)?,
        rdy: user.select(field(12), &[N, O], 3)?,
        rsize: user.select(((flags >> 14) & 0x01) as u8, &[A], 1)?,
    })
}

/// Decode the symbol ID Huffman table (7.4.3.1.7).
fn parse_symbol_id_table(reader: &mut Reader<'_>, num_symbols: u32) -> Result<HuffmanTable> {
    let run_lines = (0..35)
        .map(|idx| Ok(TableLine::range(reader.read_bits(4)? as u8, 0, idx)))
        .collect::<Result<Vec<_>>>()?;
    let run_codes = HuffmanTable::build(&run_lines)?;

    let num_symbols = num_symbols as usize;
    let mut lengths: Vec<u8> = Vec::with_capacity(num_symbols);

    while lengths.len() < num_symbols {
        let code = run_codes.decode_value(reader)?;

        match code {
            0..=31 => lengths.push(code as u8),
            32 => {
                let previous = *lengths.last().ok_or(HuffmanError::InvalidCode)?;
                let repeat = 3 + reader.read_bits(2)? as usize;
                lengths.extend(iter::repeat_n(previous, repeat));
            }
            33 => {
                let repeat = 3 + reader.read_bits(3)? as usize;
                lengths.extend(iter::repeat_n(0, repeat));
            }
            34 => {
                let repeat = 11 + reader.read_bits(7)? as usize;
                lengths.extend(iter::repeat_n(0, repeat));
            }
            _ => bail!(HuffmanError::InvalidCode),
        }
    }

    if lengths.len() > num_symbols {
        bail!(HuffmanError::InvalidCode);
    }

    reader.align();

    let lines = lengths
        .iter()
        .enumerate()
        .map(|(idx, &len)| TableLine::range(len, 0, idx as i32))
        .collect::<Vec<_>>();

    HuffmanTable::build(&lines)
}

/// Decode a text region segment.
pub(crate) fn decode(
    reader: &mut Reader<'_>,
    symbols: &[&Bitmap],
    tables: &[Rc<HuffmanTable>],
) -> Result<RegionBitmap> {
    let header = parse(reader)?;
    let params = &header.params;

    let bitmap = if header.huffman {
        let mut user = UserTables::new(tables);
        let huffman_tables = select_tables(header.huffman_flags, &mut user)?;
        let symbol_codes = parse_symbol_id_table(reader, symbols.len() as u32)?;

        let mut coder = TextCoder::Huffman {
            reader,
            tables: huffman_tables,
            codes: SymbolCodes::Table(&symbol_codes),
        };

        decode_with(&mut coder, symbols, params)?
    } else {
        let mut decoder = ArithmeticDecoder::new(reader.tail());
        let num_symbols = u32::try_from(symbols.len()).map_err(|_| DecodeError::Overflow)?;
        let mut contexts = TextContexts::new(code_length(num_symbols))?;
        let mut refinement = Contexts::new(params.refinement_template.context_bits());

        let mut coder = TextCoder::Arithmetic {
            decoder: &mut decoder,
            contexts: &mut contexts,
            refinement: &mut refinement,
        };

        decode_with(&mut coder, symbols, params)?
    };

    Ok(RegionBitmap {
        bitmap,
        info: header.info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithmetic_encoder::{MqEncoder, contexts, image};

    fn region_info(width: u8, height: u8) -> Vec<u8> {
        vec![0, 0, 0, width, 0, 0, 0, height, 0, 0, 0, 0, 0, 0, 0, 0, 0]
    }

    #[test]
    fn placement_by_corner() {
        use ReferenceCorner::*;

        assert_eq!(placement(TopLeft, false, 5, 7, 3, 4), (5, 7));
        assert_eq!(placement(TopRight, false, 5, 7, 3, 4), (3, 7));
        assert_eq!(placement(BottomLeft, false, 5, 7, 3, 4), (5, 4));
        assert_eq!(placement(BottomRight, false, 5, 7, 3, 4), (3, 4));
        assert_eq!(placement(TopLeft, true, 5, 7, 3, 4), (7, 5));
        assert_eq!(placement(BottomRight, true, 5, 7, 3, 4), (5, 2));
    }

    #[test]
    fn symbol_wider_than_coordinates() {
        let wide = Bitmap {
            width: 0x8000_0000,
            height: 1,
            stride: 0x1000_0000,
            data: Vec::new(),
        };

        assert_eq!(dimensions(&wide).unwrap_err(), DecodeError::Overflow);
        assert_eq!(dimensions(&Bitmap::new(3, 4).unwrap()).unwrap(), (3, 4));
    }

    #[test]
    fn ds_offset_is_signed() {
        let mut data = region_info(1, 1);
        // SBDSOFFSET = -2 (0b11110), one instance.
        data.extend_from_slice(&[0x78, 0x00, 0, 0, 0, 1]);

        let header = parse(&mut Reader::new(&data)).unwrap();
        assert_eq!(header.params.ds_offset, -2);
        assert_eq!(header.params.corner, ReferenceCorner::BottomLeft);
    }

    #[test]
    fn symbol_id_table_from_run_codes() {
        // Run code 1 has length 2, run code 2 has length 2 (codes 00, 01).
        // Symbol lengths 1, 2, 2 are then coded as 00 01 01.
        let mut data = vec![0x02, 0x20];
        data.extend_from_slice(&[0; 15]);
        data.extend_from_slice(&[0b0000_0001, 0b0100_0000]);

        let mut reader = Reader::new(&data);
        let table = parse_symbol_id_table(&mut reader, 3).unwrap();
        assert_eq!(reader.bit_pos(), 0);

        let ids = [0b0101_1000];
        let mut ids = Reader::new(&ids);
        assert_eq!(table.decode_value(&mut ids).unwrap(), 0);
        assert_eq!(table.decode_value(&mut ids).unwrap(), 1);
        assert_eq!(table.decode_value(&mut ids).unwrap(), 2);
    }

    #[test]
    fn huffman_text_region() {
        let square = Bitmap::filled(2, 2, true).unwrap();
        let bar = Bitmap::filled(1, 3, true).unwrap();

        let mut data = region_info(8, 4);
        // Huffman, TOPLEFT, OR; standard tables; two instances.
        data.extend_from_slice(&[0x00, 0x11, 0x00, 0x00, 0, 0, 0, 2]);
        // Symbol ID table: run code 1 has length 1, both symbols get length 1.
        data.push(0x01);
        data.extend_from_slice(&[0; 17]);
        // DT 1, DT 1, DFS 1, ID 0, IDS 2, ID 1, OOB.
        data.extend_from_slice(&[0x00, 0x2D, 0x50]);

        let region = decode(&mut Reader::new(&data), &[&square, &bar], &[]).unwrap();

        assert_eq!(region.bitmap.row(0), &[0b0110_1000]);
        assert_eq!(region.bitmap.row(1), &[0b0110_1000]);
        assert_eq!(region.bitmap.row(2), &[0b0000_1000]);
        assert_eq!(region.bitmap.row(3), &[0b0000_0000]);
    }

    #[test]
    fn arithmetic_text_region_with_refinement() {
        let square = Bitmap::filled(2, 2, true).unwrap();
        let bar = Bitmap::filled(1, 3, true).unwrap();

        let mut encoder = MqEncoder::new();
        let (mut iadt, mut iafs, mut iads, mut iari) =
            (contexts(9), contexts(9), contexts(9), contexts(9));
        let mut iaid = contexts(1);

        // First strip: the square at S 1, the bar at S 4.
        encoder.encode_integer(&mut iadt, Some(0));
        encoder.encode_integer(&mut iadt, Some(0));
        encoder.encode_integer(&mut iafs, Some(1));
        encoder.encode_symbol_id(&mut iaid, 1, 0);
        encoder.encode_integer(&mut iari, Some(0));
        encoder.encode_integer(&mut iads, Some(2));
        encoder.encode_symbol_id(&mut iaid, 1, 1);
        encoder.encode_integer(&mut iari, Some(0));
        encoder.encode_integer(&mut iads, None);

        // Second strip at T 3: the bar widened to a 2x3 block at S 0.
        encoder.encode_integer(&mut iadt, Some(3));
        encoder.encode_integer(&mut iafs, Some(-1));
        encoder.encode_symbol_id(&mut iaid, 1, 1);
        encoder.encode_integer(&mut iari, Some(1));
        for delta in [1, 0, 0, 0] {
            encoder.encode_integer(&mut contexts(9), Some(delta));
        }
        encoder.encode_refinement(
            &mut contexts(10),
            &image(&["##", "##", "##"]),
            &image(&["#", "#", "#"]),
            (0, 0),
            true,
            false,
        );
        encoder.encode_integer(&mut iads, None);

        let mut data = region_info(8, 6);
        // Refinement template 1, TOPLEFT, OR, refinement; three instances.
        data.extend_from_slice(&[0x80, 0x12, 0, 0, 0, 3]);
        data.extend(encoder.finish());

        let region = decode(&mut Reader::new(&data), &[&square, &bar], &[]).unwrap();

        assert_eq!(
            region.bitmap.to_rows(),
            [".##.#...", ".##.#...", "....#...", "##......", "##......", "##......"]
        );
    }

    #[test]
    fn missing_user_table() {
        let mut user = UserTables::new(&[]);
        assert_eq!(
            select_tables(0x0003, &mut user).err(),
            Some(HuffmanError::MissingTables.into())
        );
    }
}
