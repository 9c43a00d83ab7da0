//! Code tables for T.4/T.6 and the two-level lookup tables built from them.
//!
//! Every code is looked up by peeking 18 bits: the first 9 index the primary
//! table, and codes longer than that continue into a secondary table indexed by
//! the next 9 bits.

use std::sync::LazyLock;

/// A code word as `(bit length, code, value)`.
pub(crate) type Code = (u8, u16, u16);

/// Number of bits indexing one level of a lookup table.
pub(crate) const LEVEL_BITS: u8 = 9;
/// Longest code that fits into a primary table plus one secondary table.
pub(crate) const MAX_CODE_LEN: u8 = 2 * LEVEL_BITS;

/// Value stored for the 12-bit EOL code `000000000001`.
pub(crate) const EOL: u16 = 0xFFFF;
/// "EOFB": two consecutive EOL codes (T.6, 2.4).
pub(crate) const EOFB: u32 = 0x001001;

/// Value stored for the 2-D extension code `0000001xxx`.
pub(crate) const EXTENSION: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Pass,
    Horizontal,
    Vertical(i8),
    /// An EOL code where a mode code was expected.
    EndOfLine,
    Extension,
}

impl Mode {
    fn from_value(value: u16) -> Option<Self> {
        Some(match value {
            0 => Self::Pass,
            1 => Self::Horizontal,
            2 => Self::Vertical(0),
            3 => Self::Vertical(1),
            4 => Self::Vertical(2),
            5 => Self::Vertical(3),
            6 => Self::Vertical(-1),
            7 => Self::Vertical(-2),
            8 => Self::Vertical(-3),
            EOL => Self::EndOfLine,
            EXTENSION => Self::Extension,
            _ => return None,
        })
    }
}

/// An error while building a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// A code is longer than the two table levels can hold.
    CodeTooLong(u8),
    /// Two codes share a prefix.
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entry {
    Invalid,
    /// A complete code with its total bit length.
    Code { len: u8, value: u16 },
    /// Continue in the secondary table with the given index.
    Link(u16),
}

#[derive(Debug)]
pub(crate) struct LookupTable {
    primary: Vec<Entry>,
    secondary: Vec<Vec<Entry>>,
}

impl LookupTable {
    pub(crate) fn build<'a>(
        groups: impl IntoIterator<Item = &'a [Code]>,
    ) -> Result<Self, TableError> {
        let size = 1 << LEVEL_BITS;
        let mut table = Self {
            primary: vec![Entry::Invalid; size],
            secondary: Vec::new(),
        };

        for &(len, code, value) in groups.into_iter().flatten() {
            table.insert(len, code, value)?;
        }

        Ok(table)
    }

    fn insert(&mut self, len: u8, code: u16, value: u16) -> Result<(), TableError> {
        if len == 0 || len > MAX_CODE_LEN {
            return Err(TableError::CodeTooLong(len));
        }

        let entry = Entry::Code { len, value };

        if len <= LEVEL_BITS {
            let free = LEVEL_BITS - len;
            let start = (code as usize) << free;
            return fill(&mut self.primary[start..start + (1 << free)], entry);
        }

        let rest = len - LEVEL_BITS;
        let prefix = (code >> rest) as usize;

        let link = match self.primary[prefix] {
            Entry::Link(idx) => idx as usize,
            Entry::Invalid => {
                let idx = self.secondary.len();
                self.secondary.push(vec![Entry::Invalid; 1 << LEVEL_BITS]);
                self.primary[prefix] = Entry::Link(idx as u16);
                idx
            }
            Entry::Code { .. } => return Err(TableError::Conflict),
        };

        let free = LEVEL_BITS - rest;
        let start = ((code as usize) & ((1 << rest) - 1)) << free;
        fill(&mut self.secondary[link][start..start + (1 << free)], entry)
    }

    /// Look up the code at the start of `bits`, which holds the next
    /// `MAX_CODE_LEN` bits of the stream, MSB first.
    #[inline(always)]
    pub(crate) fn lookup(&self, bits: u32) -> Option<(u8, u16)> {
        let high = (bits >> LEVEL_BITS) as usize;

        match self.primary[high] {
            Entry::Code { len, value } => Some((len, value)),
            Entry::Link(idx) => {
                let low = (bits & ((1 << LEVEL_BITS) - 1)) as usize;

                match self.secondary[idx as usize][low] {
                    Entry::Code { len, value } => Some((len, value)),
                    _ => None,
                }
            }
            Entry::Invalid => None,
        }
    }

    pub(crate) fn mode(&self, bits: u32) -> Option<(u8, Mode)> {
        let (len, value) = self.lookup(bits)?;
        Some((len, Mode::from_value(value)?))
    }
}

fn fill(slots: &mut [Entry], entry: Entry) -> Result<(), TableError> {
    for slot in slots {
        if *slot != Entry::Invalid {
            return Err(TableError::Conflict);
        }

        *slot = entry;
    }

    Ok(())
}

pub(crate) struct Tables {
    pub(crate) white: LookupTable,
    pub(crate) black: LookupTable,
    pub(crate) mode: LookupTable,
}

const END_OF_LINE: [Code; 1] = [(12, 0b000000000001, EOL)];

static TABLES: LazyLock<Result<Tables, TableError>> = LazyLock::new(|| {
    Ok(Tables {
        white: LookupTable::build([
            &WHITE_TERMINATING[..],
            &WHITE_MAKEUP[..],
            &COMMON_MAKEUP[..],
            &END_OF_LINE[..],
        ])?,
        black: LookupTable::build([
            &BLACK_TERMINATING[..],
            &BLACK_MAKEUP[..],
            &COMMON_MAKEUP[..],
            &END_OF_LINE[..],
        ])?,
        mode: LookupTable::build([&MODE_CODES[..], &END_OF_LINE[..]])?,
    })
});

pub(crate) fn tables() -> Result<&'static Tables, TableError> {
    TABLES.as_ref().map_err(|e| *e)
}

/// Mode codes (T.4 Table 4).
const MODE_CODES: [Code; 10] = [
    (4, 0b0001, 0),
    (3, 0b001, 1),
    (1, 0b1, 2),
    (3, 0b011, 3),
    (6, 0b000011, 4),
    (7, 0b0000011, 5),
    (3, 0b010, 6),
    (6, 0b000010, 7),
    (7, 0b0000010, 8),
    (7, 0b0000001, EXTENSION),
];

/// White terminating codes (T.4 Table 2).
const WHITE_TERMINATING: [Code; 64] = [
    (8, 0b00110101, 0),
    (6, 0b000111, 1),
    (4, 0b0111, 2),
    (4, 0b1000, 3),
    (4, 0b1011, 4),
    (4, 0b1100, 5),
    (4, 0b1110, 6),
    (4, 0b1111, 7),
    (5, 0b10011, 8),
    (5, 0b10100, 9),
    (5, 0b00111, 10),
    (5, 0b01000, 11),
    (6, 0b001000, 12),
    (6, 0b000011, 13),
    (6, 0b110100, 14),
    (6, 0b110101, 15),
    (6, 0b101010, 16),
    (6, 0b101011, 17),
    (7, 0b0100111, 18),
    (7, 0b0001100, 19),
    (7, 0b0001000, 20),
    (7, 0b0010111, 21),
    (7, 0b0000011, 22),
    (7, 0b0000100, 23),
    (7, 0b0101000, 24),
    (7, 0b0101011, 25),
    (7, 0b0010011, 26),
    (7, 0b0100100, 27),
    (7, 0b0011000, 28),
    (8, 0b00000010, 29),
    (8, 0b00000011, 30),
    (8, 0b00011010, 31),
    (8, 0b00011011, 32),
    (8, 0b00010010, 33),
    (8, 0b00010011, 34),
    (8, 0b00010100, 35),
    (8, 0b00010101, 36),
    (8, 0b00010110, 37),
    (8, 0b00010111, 38),
    (8, 0b00101000, 39),
    (8, 0b00101001, 40),
    (8, 0b00101010, 41),
    (8, 0b00101011, 42),
    (8, 0b00101100, 43),
    (8, 0b00101101, 44),
    (8, 0b00000100, 45),
    (8, 0b00000101, 46),
    (8, 0b00001010, 47),
    (8, 0b00001011, 48),
    (8, 0b01010010, 49),
    (8, 0b01010011, 50),
    (8, 0b01010100, 51),
    (8, 0b01010101, 52),
    (8, 0b00100100, 53),
    (8, 0b00100101, 54),
    (8, 0b01011000, 55),
    (8, 0b01011001, 56),
    (8, 0b01011010, 57),
    (8, 0b01011011, 58),
    (8, 0b01001010, 59),
    (8, 0b01001011, 60),
    (8, 0b00110010, 61),
    (8, 0b00110011, 62),
    (8, 0b00110100, 63),
];

/// White make-up codes (T.4 Table 3).
const WHITE_MAKEUP: [Code; 27] = [
    (5, 0b11011, 64),
    (5, 0b10010, 128),
    (6, 0b010111, 192),
    (7, 0b0110111, 256),
    (8, 0b00110110, 320),
    (8, 0b00110111, 384),
    (8, 0b01100100, 448),
    (8, 0b01100101, 512),
    (8, 0b01101000, 576),
    (8, 0b01100111, 640),
    (9, 0b011001100, 704),
    (9, 0b011001101, 768),
    (9, 0b011010010, 832),
    (9, 0b011010011, 896),
    (9, 0b011010100, 960),
    (9, 0b011010101, 1024),
    (9, 0b011010110, 1088),
    (9, 0b011010111, 1152),
    (9, 0b011011000, 1216),
    (9, 0b011011001, 1280),
    (9, 0b011011010, 1344),
    (9, 0b011011011, 1408),
    (9, 0b010011000, 1472),
    (9, 0b010011001, 1536),
    (9, 0b010011010, 1600),
    (6, 0b011000, 1664),
    (9, 0b010011011, 1728),
];

/// Black terminating codes (T.4 Table 2).
const BLACK_TERMINATING: [Code; 64] = [
    (10, 0b0000110111, 0),
    (3, 0b010, 1),
    (2, 0b11, 2),
    (2, 0b10, 3),
    (3, 0b011, 4),
    (4, 0b0011, 5),
    (4, 0b0010, 6),
    (5, 0b00011, 7),
    (6, 0b000101, 8),
    (6, 0b000100, 9),
    (7, 0b0000100, 10),
    (7, 0b0000101, 11),
    (7, 0b0000111, 12),
    (8, 0b00000100, 13),
    (8, 0b00000111, 14),
    (9, 0b000011000, 15),
    (10, 0b0000010111, 16),
    (10, 0b0000011000, 17),
    (10, 0b0000001000, 18),
    (11, 0b00001100111, 19),
    (11, 0b00001101000, 20),
    (11, 0b00001101100, 21),
    (11, 0b00000110111, 22),
    (11, 0b00000101000, 23),
    (11, 0b00000010111, 24),
    (11, 0b00000011000, 25),
    (12, 0b000011001010, 26),
    (12, 0b000011001011, 27),
    (12, 0b000011001100, 28),
    (12, 0b000011001101, 29),
    (12, 0b000001101000, 30),
    (12, 0b000001101001, 31),
    (12, 0b000001101010, 32),
    (12, 0b000001101011, 33),
    (12, 0b000011010010, 34),
    (12, 0b000011010011, 35),
    (12, 0b000011010100, 36),
    (12, 0b000011010101, 37),
    (12, 0b000011010110, 38),
    (12, 0b000011010111, 39),
    (12, 0b000001101100, 40),
    (12, 0b000001101101, 41),
    (12, 0b000011011010, 42),
    (12, 0b000011011011, 43),
    (12, 0b000001010100, 44),
    (12, 0b000001010101, 45),
    (12, 0b000001010110, 46),
    (12, 0b000001010111, 47),
    (12, 0b000001100100, 48),
    (12, 0b000001100101, 49),
    (12, 0b000001010010, 50),
    (12, 0b000001010011, 51),
    (12, 0b000000100100, 52),
    (12, 0b000000110111, 53),
    (12, 0b000000111000, 54),
    (12, 0b000000100111, 55),
    (12, 0b000000101000, 56),
    (12, 0b000001011000, 57),
    (12, 0b000001011001, 58),
    (12, 0b000000101011, 59),
    (12, 0b000000101100, 60),
    (12, 0b000001011010, 61),
    (12, 0b000001100110, 62),
    (12, 0b000001100111, 63),
];

/// Black make-up codes (T.4 Table 3).
const BLACK_MAKEUP: [Code; 27] = [
    (10, 0b0000001111, 64),
    (12, 0b000011001000, 128),
    (12, 0b000011001001, 192),
    (12, 0b000001011011, 256),
    (12, 0b000000110011, 320),
    (12, 0b000000110100, 384),
    (12, 0b000000110101, 448),
    (13, 0b0000001101100, 512),
    (13, 0b0000001101101, 576),
    (13, 0b0000001001010, 640),
    (13, 0b0000001001011, 704),
    (13, 0b0000001001100, 768),
    (13, 0b0000001001101, 832),
    (13, 0b0000001110010, 896),
    (13, 0b0000001110011, 960),
    (13, 0b0000001110100, 1024),
    (13, 0b0000001110101, 1088),
    (13, 0b0000001110110, 1152),
    (13, 0b0000001110111, 1216),
    (13, 0b0000001010010, 1280),
    (13, 0b0000001010011, 1344),
    (13, 0b0000001010100, 1408),
    (13, 0b0000001010101, 1472),
    (13, 0b0000001011010, 1536),
    (13, 0b0000001011011, 1600),
    (13, 0b0000001100100, 1664),
    (13, 0b0000001100101, 1728),
];

/// Make-up codes shared by both colours (T.4 Table 3).
const COMMON_MAKEUP: [Code; 13] = [
    (11, 0b00000001000, 1792),
    (11, 0b00000001100, 1856),
    (11, 0b00000001101, 1920),
    (12, 0b000000010010, 1984),
    (12, 0b000000010011, 2048),
    (12, 0b000000010100, 2112),
    (12, 0b000000010101, 2176),
    (12, 0b000000010110, 2240),
    (12, 0b000000010111, 2304),
    (12, 0b000000011100, 2368),
    (12, 0b000000011101, 2432),
    (12, 0b000000011110, 2496),
    (12, 0b000000011111, 2560),
];
