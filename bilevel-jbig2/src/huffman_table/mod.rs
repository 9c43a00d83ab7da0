//! Huffman tables (Annex B).
//!
//! A table is a list of lines, each covering a range of values behind a
//! prefix code. Prefix codes are assigned canonically (B.3) and stored in a
//! binary tree that is walked one bit at a time while decoding.

mod standard;

pub(crate) use standard::StandardTable;

use crate::error::{DecodeError, HuffmanError, Result, bail};
use crate::reader::Reader;

/// How the value of a table line is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    /// `RANGELOW + HTOFFSET`.
    Range,
    /// The lower range line, `RANGELOW - HTOFFSET` with `RANGELOW` being the
    /// upper end of the range.
    Lower,
    /// The out-of-band line.
    Oob,
}

/// One line of a code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableLine {
    pub(crate) prefix_len: u8,
    pub(crate) range_len: u8,
    pub(crate) range_low: i32,
    pub(crate) kind: LineKind,
}

impl TableLine {
    pub(crate) const fn range(prefix_len: u8, range_len: u8, range_low: i32) -> Self {
        Self {
            prefix_len,
            range_len,
            range_low,
            kind: LineKind::Range,
        }
    }

    /// "-∞...range_high"
    pub(crate) const fn lower(prefix_len: u8, range_high: i32) -> Self {
        Self {
            prefix_len,
            range_len: 32,
            range_low: range_high,
            kind: LineKind::Lower,
        }
    }

    /// "range_low...+∞"
    pub(crate) const fn upper(prefix_len: u8, range_low: i32) -> Self {
        Self::range(prefix_len, 32, range_low)
    }

    pub(crate) const fn oob(prefix_len: u8) -> Self {
        Self {
            prefix_len,
            range_len: 0,
            range_low: 0,
            kind: LineKind::Oob,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Internal([Option<Box<Node>>; 2]),
    Leaf(TableLine),
}

impl Node {
    fn internal() -> Self {
        Self::Internal([None, None])
    }
}

/// A decoding table.
#[derive(Debug, Clone)]
pub(crate) struct HuffmanTable {
    root: Node,
    has_oob: bool,
}

impl HuffmanTable {
    /// Assign prefix codes to the lines (B.3) and build the decoding tree.
    ///
    /// Lines with a prefix length of 0 are never used and get no code.
    pub(crate) fn build(lines: &[TableLine]) -> Result<Self> {
        let codes = assign_codes(lines)?;
        let mut root = Node::internal();

        for (line, code) in lines.iter().zip(codes) {
            if line.prefix_len == 0 {
                continue;
            }

            insert(&mut root, code, line.prefix_len, *line)?;
        }

        Ok(Self {
            root,
            has_oob: lines
                .iter()
                .any(|l| l.kind == LineKind::Oob && l.prefix_len > 0),
        })
    }

    /// Whether the table can produce an out-of-band value.
    pub(crate) fn has_oob(&self) -> bool {
        self.has_oob
    }

    /// Decode one value (B.4), `None` meaning OOB.
    pub(crate) fn decode(&self, reader: &mut Reader<'_>) -> Result<Option<i32>> {
        let mut node = &self.root;

        let line = loop {
            match node {
                Node::Internal(children) => {
                    let bit = reader.read_bit()?;
                    node = children[bit as usize]
                        .as_deref()
                        .ok_or(HuffmanError::InvalidCode)?;
                }
                Node::Leaf(line) => break line,
            }
        };

        if line.kind == LineKind::Oob {
            return Ok(None);
        }

        let offset = i64::from(reader.read_bits(line.range_len)?);
        let low = i64::from(line.range_low);

        let value = match line.kind {
            LineKind::Lower => low - offset,
            _ => low + offset,
        };

        i32::try_from(value)
            .map(Some)
            .map_err(|_| DecodeError::Overflow)
    }

    /// Decode a value where OOB is not allowed.
    pub(crate) fn decode_value(&self, reader: &mut Reader<'_>) -> Result<i32> {
        self.decode(reader)?
            .ok_or(HuffmanError::UnexpectedOob.into())
    }

    /// Parse a code table segment (B.2).
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let flags = reader.read_byte()?;

        if flags & 0x80 != 0 {
            bail!(HuffmanError::InvalidTable);
        }

        let oob = flags & 0x01 != 0;
        let prefix_bits = ((flags >> 1) & 0x07) + 1;
        let range_bits = ((flags >> 4) & 0x07) + 1;
        let low = reader.read_i32()?;
        let high = reader.read_i32()?;

        if high < low {
            bail!(HuffmanError::InvalidTable);
        }

        let mut lines = Vec::new();
        let mut current = i64::from(low);

        while current < i64::from(high) {
            let prefix_len = reader.read_bits(prefix_bits)? as u8;
            let range_len = reader.read_bits(range_bits)? as u8;

            if range_len > 32 {
                bail!(HuffmanError::CodeTooLong);
            }

            // `current < high` keeps it inside i32.
            lines.push(TableLine::range(prefix_len, range_len, current as i32));
            current += 1_i64 << range_len;
        }

        let upper_low = i32::try_from(current).map_err(|_| DecodeError::Overflow)?;
        let lower_high = low.checked_sub(1).ok_or(DecodeError::Overflow)?;

        lines.push(TableLine::lower(reader.read_bits(prefix_bits)? as u8, lower_high));
        lines.push(TableLine::upper(reader.read_bits(prefix_bits)? as u8, upper_low));

        if oob {
            lines.push(TableLine::oob(reader.read_bits(prefix_bits)? as u8));
        }

        Self::build(&lines)
    }
}

/// The canonical code assignment of B.3.
fn assign_codes(lines: &[TableLine]) -> Result<Vec<u32>> {
    let max_len = lines.iter().map(|l| l.prefix_len).max().unwrap_or(0) as usize;

    if max_len > 32 {
        bail!(HuffmanError::CodeTooLong);
    }

    let mut len_count = vec![0_u64; max_len + 1];
    for line in lines {
        len_count[line.prefix_len as usize] += 1;
    }
    len_count[0] = 0;

    let mut codes = vec![0_u32; lines.len()];
    let mut first_code = 0_u64;

    for len in 1..=max_len {
        first_code = (first_code + len_count[len - 1]) << 1;
        let mut code = first_code;

        for (line, slot) in lines.iter().zip(codes.iter_mut()) {
            if line.prefix_len as usize == len {
                if code >> len != 0 {
                    bail!(HuffmanError::InvalidTable);
                }

                *slot = code as u32;
                code += 1;
            }
        }
    }

    Ok(codes)
}

fn insert(root: &mut Node, code: u32, len: u8, line: TableLine) -> Result<()> {
    let mut node = root;

    for i in (0..len).rev() {
        let bit = ((code >> i) & 1) as usize;

        node = match node {
            Node::Internal(children) => children[bit]
                .get_or_insert_with(|| Box::new(Node::internal()))
                .as_mut(),
            Node::Leaf(_) => bail!(HuffmanError::InvalidTable),
        };
    }

    if !matches!(node, Node::Internal([None, None])) {
        bail!(HuffmanError::InvalidTable);
    }

    *node = Node::Leaf(line);

    Ok(())
}
