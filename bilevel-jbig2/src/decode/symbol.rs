//! Symbol dictionary segments (7.4.2) and the symbol dictionary decoding
//! procedure (6.5).

use std::rc::Rc;

use log::{trace, warn};

use super::generic::{GenericParams, decode_arithmetic, decode_mmr};
use super::generic_refinement::{self, RefinementParams};
use super::text::{
    ReferenceCorner, SymbolCodes, TextCoder, TextContexts, TextHuffmanTables, TextRegionParams,
    decode_with,
};
use super::{
    AtPixel, RefinementTemplate, Template, UserTables, code_length, parse_at_pixels,
    parse_refinement_at_pixels,
};
use crate::arithmetic_decoder::{ArithmeticDecoder, Contexts};
use crate::bitmap::Bitmap;
use crate::error::{
    DecodeError, HuffmanError, RegionError, Result, SymbolError, TemplateError, bail,
};
use crate::huffman_table::{HuffmanTable, StandardTable};
use crate::integer_decoder::IntegerDecoder;
use crate::reader::Reader;
use crate::segment::region::CombinationOperator;

/// A decoded symbol dictionary.
#[derive(Debug, Clone)]
pub(crate) struct SymbolDictionary {
    /// "SDEXSYMS"
    pub(crate) symbols: Vec<Rc<Bitmap>>,
    /// The coding state, if the dictionary asked for it to be retained.
    pub(crate) retained: Option<SymbolContexts>,
}

/// The arithmetic coding state of a symbol dictionary (7.4.2.2).
///
/// A dictionary with "bitmap coding context retained" set hands this state on
/// to the next dictionary that has "bitmap coding context used" set.
#[derive(Debug, Clone)]
pub(crate) struct SymbolContexts {
    template: Template,
    refinement_template: RefinementTemplate,
    generic: Contexts,
    refinement: Contexts,
    iadh: IntegerDecoder,
    iadw: IntegerDecoder,
    iaex: IntegerDecoder,
    iaai: IntegerDecoder,
    text: Option<TextContexts>,
}

impl SymbolContexts {
    fn new(template: Template, refinement_template: RefinementTemplate) -> Self {
        Self {
            template,
            refinement_template,
            generic: Contexts::new(template.context_bits()),
            refinement: Contexts::new(refinement_template.context_bits()),
            iadh: IntegerDecoder::new(),
            iadw: IntegerDecoder::new(),
            iaex: IntegerDecoder::new(),
            iaai: IntegerDecoder::new(),
            text: None,
        }
    }
}

/// The text region decoders, with an IAID sized for `code_len` bits.
fn text_contexts(slot: &mut Option<TextContexts>, code_len: u32) -> Result<&mut TextContexts> {
    let contexts = match slot.take() {
        Some(contexts) if contexts.iaid.code_len() == code_len => contexts,
        _ => TextContexts::new(code_len)?,
    };

    Ok(slot.insert(contexts))
}

/// Parsed symbol dictionary header (7.4.2.1).
#[derive(Debug, Clone)]
struct SymbolDictionaryHeader {
    huffman: bool,
    refagg: bool,
    flags: u16,
    context_used: bool,
    context_retained: bool,
    template: Template,
    refinement_template: RefinementTemplate,
    at_pixels: Vec<AtPixel>,
    refinement_at: [AtPixel; 2],
    /// "SDNUMEXSYMS"
    num_exported: u32,
    /// "SDNUMNEWSYMS"
    num_new: u32,
}

fn parse(reader: &mut Reader<'_>) -> Result<SymbolDictionaryHeader> {
    let flags = reader.read_u16()?;

    let huffman = flags & 0x0001 != 0;
    let refagg = flags & 0x0002 != 0;
    let context_used = flags & 0x0100 != 0;
    let context_retained = flags & 0x0200 != 0;
    let template = Template::from_value((flags >> 10) as u8);

    let mut refinement_template = RefinementTemplate::from_bit(flags & 0x1000 != 0);
    if !refagg && refinement_template != RefinementTemplate::Template0 {
        warn!("SDRTEMPLATE set without refinement, using 0");
        refinement_template = RefinementTemplate::Template0;
    }

    let at_pixels = if huffman {
        Vec::new()
    } else {
        parse_at_pixels(reader, template.at_pixel_count())?
    };

    let refinement_at = if refagg && refinement_template == RefinementTemplate::Template0 {
        parse_refinement_at_pixels(reader)?
    } else {
        [AtPixel::new(0, 0); 2]
    };

    Ok(SymbolDictionaryHeader {
        huffman,
        refagg,
        flags,
        context_used,
        context_retained,
        template,
        refinement_template,
        at_pixels,
        refinement_at,
        num_exported: reader.read_u32()?,
        num_new: reader.read_u32()?,
    })
}

/// The Huffman tables of a symbol dictionary (7.4.2.1.6).
#[derive(Clone, Copy)]
struct SymbolHuffmanTables<'a> {
    dh: &'a HuffmanTable,
    dw: &'a HuffmanTable,
    bmsize: &'a HuffmanTable,
    agginst: &'a HuffmanTable,
}

fn select_tables<'a>(flags: u16, user: &mut UserTables<'a>) -> Result<SymbolHuffmanTables<'a>> {
    use StandardTable::{A, B, C, D, E};

    let tables = SymbolHuffmanTables {
        dh: user.select(((flags >> 2) & 0x03) as u8, &[D, E], 3)?,
        dw: user.select(((flags >> 4) & 0x03) as u8, &[B, C], 3)?,
        bmsize: user.select(((flags >> 6) & 0x01) as u8, &[A], 1)?,
        agginst: user.select(((flags >> 7) & 0x01) as u8, &[A], 1)?,
    };

    // Height classes end with an out-of-band width.
    if !tables.dw.has_oob() {
        bail!(HuffmanError::InvalidTable);
    }

    Ok(tables)
}

enum SymbolCoder<'a, 'b> {
    Huffman {
        reader: &'a mut Reader<'b>,
        tables: SymbolHuffmanTables<'a>,
    },
    Arithmetic {
        decoder: ArithmeticDecoder<'b>,
        contexts: &'a mut SymbolContexts,
    },
}

impl SymbolCoder<'_, '_> {
    /// "HCDH" (6.5.6).
    fn height_delta(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables } => tables.dh.decode_value(reader),
            Self::Arithmetic { decoder, contexts } => {
                contexts.iadh.decode_value(decoder, SymbolError::UnexpectedOob)
            }
        }
    }

    /// "DW" (6.5.7), `None` ending the height class.
    fn width_delta(&mut self) -> Result<Option<i32>> {
        match self {
            Self::Huffman { reader, tables } => tables.dw.decode(reader),
            Self::Arithmetic { decoder, contexts } => contexts.iadw.decode(decoder),
        }
    }

    /// "REFAGGNINST" (6.5.8.2.1).
    fn aggregate_count(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables } => tables.agginst.decode_value(reader),
            Self::Arithmetic { decoder, contexts } => {
                contexts.iaai.decode_value(decoder, SymbolError::UnexpectedOob)
            }
        }
    }

    /// "EXRUNLENGTH" (6.5.10).
    fn export_run(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, .. } => StandardTable::A.get()?.decode_value(reader),
            Self::Arithmetic { decoder, contexts } => {
                contexts.iaex.decode_value(decoder, SymbolError::UnexpectedOob)
            }
        }
    }
}

/// Decode a symbol dictionary segment.
///
/// `inputs` are the symbols exported by the referred-to dictionaries, in
/// order, and `retained` the coding state of the last of them.
pub(crate) fn decode(
    reader: &mut Reader<'_>,
    inputs: &[Rc<Bitmap>],
    tables: &[Rc<HuffmanTable>],
    retained: Option<&SymbolContexts>,
) -> Result<SymbolDictionary> {
    let header = parse(reader)?;

    // Every new symbol takes at least one bit of the remaining data.
    let available = 8 * reader.tail().len() as u64;
    if u64::from(header.num_new) > available {
        warn!(
            "symbol dictionary declares {} new symbols in {available} bits",
            header.num_new
        );
        bail!(SymbolError::TooManySymbols);
    }

    trace!(
        "symbol dictionary: {} inputs, {} new, {} exported",
        inputs.len(),
        header.num_new,
        header.num_exported
    );

    let mut contexts = if header.context_used && !header.huffman {
        let retained = retained.ok_or(TemplateError::MissingRetained)?;

        if retained.template != header.template
            || retained.refinement_template != header.refinement_template
        {
            bail!(TemplateError::RetainedMismatch);
        }

        retained.clone()
    } else {
        SymbolContexts::new(header.template, header.refinement_template)
    };

    let mut user = UserTables::new(tables);
    let mut coder = if header.huffman {
        SymbolCoder::Huffman {
            tables: select_tables(header.flags, &mut user)?,
            reader,
        }
    } else {
        SymbolCoder::Arithmetic {
            decoder: ArithmeticDecoder::new(reader.tail()),
            contexts: &mut contexts,
        }
    };

    let new_symbols = decode_new_symbols(&mut coder, &header, inputs)?;
    let symbols = export_symbols(&mut coder, &header, inputs, &new_symbols)?;

    let retained = (header.context_retained && !header.huffman).then_some(contexts);

    Ok(SymbolDictionary { symbols, retained })
}

/// Decode "SDNEWSYMS" height class by height class (6.5.5).
fn decode_new_symbols(
    coder: &mut SymbolCoder<'_, '_>,
    header: &SymbolDictionaryHeader,
    inputs: &[Rc<Bitmap>],
) -> Result<Vec<Rc<Bitmap>>> {
    let num_new = header.num_new as usize;
    let total = inputs
        .len()
        .checked_add(num_new)
        .ok_or(DecodeError::Overflow)?;

    let mut new_symbols: Vec<Rc<Bitmap>> = Vec::new();
    let mut height = 0_u32;
    let mut decoded = 0_usize;

    while decoded < num_new {
        height = height
            .checked_add_signed(coder.height_delta()?)
            .ok_or(RegionError::InvalidDimension)?;

        let mut width = 0_u32;
        let mut total_width = 0_u32;
        let mut class_widths = Vec::new();

        while let Some(dw) = coder.width_delta()? {
            if decoded >= num_new {
                bail!(SymbolError::TooManySymbols);
            }

            width = width
                .checked_add_signed(dw)
                .ok_or(RegionError::InvalidDimension)?;
            total_width = total_width
                .checked_add(width)
                .ok_or(DecodeError::Overflow)?;

            if header.refagg {
                let bitmap =
                    decode_refagg(coder, header, inputs, &new_symbols, total, width, height)?;
                new_symbols.push(Rc::new(bitmap));
            } else {
                match coder {
                    SymbolCoder::Huffman { .. } => class_widths.push(width),
                    SymbolCoder::Arithmetic { decoder, contexts } => {
                        let mut bitmap = Bitmap::new(width, height)?;
                        decode_arithmetic(
                            &mut bitmap,
                            decoder,
                            &mut contexts.generic,
                            &GenericParams {
                                template: header.template,
                                tpgdon: false,
                                at_pixels: &header.at_pixels,
                                skip: None,
                            },
                        );
                        new_symbols.push(Rc::new(bitmap));
                    }
                }
            }

            decoded += 1;
        }

        if let SymbolCoder::Huffman { reader, tables } = coder
            && !header.refagg
        {
            let collective = decode_collective(reader, tables.bmsize, total_width, height)?;
            let mut x = 0_i64;

            for width in class_widths {
                new_symbols.push(Rc::new(collective.extract(x, 0, width, height)?));
                x += i64::from(width);
            }
        }
    }

    Ok(new_symbols)
}

/// Decode the collective bitmap of a Huffman coded height class (6.5.9).
fn decode_collective(
    reader: &mut Reader<'_>,
    bmsize: &HuffmanTable,
    width: u32,
    height: u32,
) -> Result<Bitmap> {
    let size = bmsize.decode_value(reader)?;
    reader.align();

    let mut bitmap = Bitmap::new(width, height)?;

    if size == 0 {
        // Stored uncompressed, rows padded to a byte.
        for y in 0..height {
            let row = reader.read_bytes(bitmap.stride)?;
            bitmap.row_mut(y).copy_from_slice(row);
        }

        // Stored padding bits may be set.
        bitmap.clear_padding();
    } else {
        let size = usize::try_from(size).map_err(|_| DecodeError::Overflow)?;
        let collective = reader.split_off(size)?;
        let used = decode_mmr(&mut bitmap, collective.tail())?;

        if used != size {
            trace!("collective bitmap used {used} of {size} bytes");
        }
    }

    trace!(
        "{width}x{height} collective bitmap ends at byte {}",
        reader.stream_position()
    );

    Ok(bitmap)
}

/// Decode a symbol with refinement/aggregate coding (6.5.8.2).
fn decode_refagg(
    coder: &mut SymbolCoder<'_, '_>,
    header: &SymbolDictionaryHeader,
    inputs: &[Rc<Bitmap>],
    new_symbols: &[Rc<Bitmap>],
    total: usize,
    width: u32,
    height: u32,
) -> Result<Bitmap> {
    let instances = coder.aggregate_count()?;
    let code_len = code_length(u32::try_from(total).map_err(|_| DecodeError::Overflow)?);

    let mut bitmap = Bitmap::new(width, height)?;

    if instances == 1 {
        match coder {
            SymbolCoder::Huffman { reader, .. } => {
                let id = reader.read_bits(code_len.max(1) as u8)?;
                let rdx = StandardTable::O.get()?.decode_value(reader)?;
                let rdy = StandardTable::O.get()?.decode_value(reader)?;
                let size = StandardTable::A.get()?.decode_value(reader)?;
                reader.align();

                let size = usize::try_from(size).map_err(|_| DecodeError::Overflow)?;
                let data = reader.read_bytes(size)?;
                let mut decoder = ArithmeticDecoder::new(data);
                let mut contexts = Contexts::new(header.refinement_template.context_bits());

                generic_refinement::decode_bitmap(
                    &mut bitmap,
                    &mut decoder,
                    &mut contexts,
                    &refinement_params(header, lookup(inputs, new_symbols, id)?, rdx, rdy),
                );
            }
            SymbolCoder::Arithmetic { decoder, contexts } => {
                let text = text_contexts(&mut contexts.text, code_len)?;
                let id = text.iaid.decode(decoder);
                let rdx = text
                    .iardx
                    .decode_value(decoder, SymbolError::UnexpectedOob)?;
                let rdy = text
                    .iardy
                    .decode_value(decoder, SymbolError::UnexpectedOob)?;

                generic_refinement::decode_bitmap(
                    &mut bitmap,
                    decoder,
                    &mut contexts.refinement,
                    &refinement_params(header, lookup(inputs, new_symbols, id)?, rdx, rdy),
                );
            }
        }

        return Ok(bitmap);
    }

    let instances = u32::try_from(instances).map_err(|_| SymbolError::Invalid)?;

    // Table 17.
    let params = TextRegionParams {
        width,
        height,
        refine: true,
        num_instances: instances,
        log_strips: 0,
        corner: ReferenceCorner::TopLeft,
        transposed: false,
        combination_operator: CombinationOperator::Or,
        default_pixel: false,
        ds_offset: 0,
        refinement_template: header.refinement_template,
        refinement_at: header.refinement_at,
    };

    let symbols: Vec<&Bitmap> = inputs
        .iter()
        .chain(new_symbols)
        .map(|symbol| symbol.as_ref())
        .collect();

    match coder {
        SymbolCoder::Huffman { reader, .. } => {
            use StandardTable::{A, F, H, K, O};

            let mut text = TextCoder::Huffman {
                reader,
                tables: TextHuffmanTables {
                    fs: F.get()?,
                    ds: H.get()?,
                    dt: K.get()?,
                    rdw: O.get()?,
                    rdh: O.get()?,
                    rdx: O.get()?,
                    rdy: O.get()?,
                    rsize: A.get()?,
                },
                codes: SymbolCodes::Fixed(code_len.max(1) as u8),
            };

            decode_with(&mut text, &symbols, &params)
        }
        SymbolCoder::Arithmetic { decoder, contexts } => {
            let SymbolContexts {
                refinement, text, ..
            } = &mut **contexts;
            let mut text = TextCoder::Arithmetic {
                decoder,
                contexts: text_contexts(text, code_len)?,
                refinement,
            };

            decode_with(&mut text, &symbols, &params)
        }
    }
}

/// The symbol with ID `id` among the input symbols followed by the new ones.
fn lookup<'a>(inputs: &'a [Rc<Bitmap>], new_symbols: &'a [Rc<Bitmap>], id: u32) -> Result<&'a Bitmap> {
    let id = id as usize;

    match id.checked_sub(inputs.len()) {
        None => Ok(&inputs[id]),
        Some(new) => new_symbols
            .get(new)
            .map(|symbol| symbol.as_ref())
            .ok_or(SymbolError::OutOfRange.into()),
    }
}

fn refinement_params<'a>(
    header: &SymbolDictionaryHeader,
    reference: &'a Bitmap,
    dx: i32,
    dy: i32,
) -> RefinementParams<'a> {
    RefinementParams {
        template: header.refinement_template,
        tpgron: false,
        at_pixels: header.refinement_at,
        reference,
        dx,
        dy,
    }
}

/// Select the exported symbols with the export flags (6.5.10).
fn export_symbols(
    coder: &mut SymbolCoder<'_, '_>,
    header: &SymbolDictionaryHeader,
    inputs: &[Rc<Bitmap>],
    new_symbols: &[Rc<Bitmap>],
) -> Result<Vec<Rc<Bitmap>>> {
    let total = inputs.len() + new_symbols.len();
    let mut flags = vec![false; total];
    let mut index = 0_usize;
    let mut current = false;

    while index < total {
        let run = usize::try_from(coder.export_run()?).map_err(|_| SymbolError::Invalid)?;
        let end = index
            .checked_add(run)
            .filter(|&end| end <= total)
            .ok_or(SymbolError::OutOfRange)?;

        flags[index..end].fill(current);
        index = end;
        current = !current;
    }

    let exported: Vec<Rc<Bitmap>> = inputs
        .iter()
        .chain(new_symbols)
        .zip(flags)
        .filter_map(|(symbol, export)| export.then(|| symbol.clone()))
        .collect();

    let declared = header.num_exported as usize;

    if exported.len() > declared {
        bail!(SymbolError::TooManySymbols);
    }

    if exported.len() < declared {
        warn!(
            "symbol dictionary exports {} symbols, {declared} declared",
            exported.len()
        );
    }

    Ok(exported)
}
