//! The standard tables B.1 to B.15.

use std::sync::LazyLock;

use super::{HuffmanTable, TableLine};
use crate::error::{DecodeError, Result};

/// One of the fifteen standard Huffman tables of Annex B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StandardTable {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
}

static TABLES: LazyLock<core::result::Result<Vec<HuffmanTable>, DecodeError>> =
    LazyLock::new(|| LINES.iter().map(|lines| HuffmanTable::build(lines)).collect());

impl StandardTable {
    pub(crate) fn get(self) -> Result<&'static HuffmanTable> {
        let tables = TABLES.as_ref().map_err(Clone::clone)?;

        Ok(&tables[self as usize])
    }
}

use TableLine as T;

#[rustfmt::skip]
static LINES: [&[TableLine]; 15] = [
    // B.1
    &[
        T::range(1, 4, 0),
        T::range(2, 8, 16),
        T::range(3, 16, 272),
        T::upper(3, 65808),
    ],
    // B.2
    &[
        T::range(1, 0, 0),
        T::range(2, 0, 1),
        T::range(3, 0, 2),
        T::range(4, 3, 3),
        T::range(5, 6, 11),
        T::upper(6, 75),
        T::oob(6),
    ],
    // B.3
    &[
        T::range(8, 8, -256),
        T::range(1, 0, 0),
        T::range(2, 0, 1),
        T::range(3, 0, 2),
        T::range(4, 3, 3),
        T::range(5, 6, 11),
        T::lower(8, -257),
        T::upper(7, 75),
        T::oob(6),
    ],
    // B.4
    &[
        T::range(1, 0, 1),
        T::range(2, 0, 2),
        T::range(3, 0, 3),
        T::range(4, 3, 4),
        T::range(5, 6, 12),
        T::upper(5, 76),
    ],
    // B.5
    &[
        T::range(7, 8, -255),
        T::range(1, 0, 1),
        T::range(2, 0, 2),
        T::range(3, 0, 3),
        T::range(4, 3, 4),
        T::range(5, 6, 12),
        T::lower(7, -256),
        T::upper(6, 76),
    ],
    // B.6
    &[
        T::range(5, 10, -2048),
        T::range(4, 9, -1024),
        T::range(4, 8, -512),
        T::range(4, 7, -256),
        T::range(5, 6, -128),
        T::range(5, 5, -64),
        T::range(4, 5, -32),
        T::range(2, 7, 0),
        T::range(3, 7, 128),
        T::range(3, 8, 256),
        T::range(4, 9, 512),
        T::range(4, 10, 1024),
        T::lower(6, -2049),
        T::upper(6, 2048),
    ],
    // B.7
    &[
        T::range(4, 9, -1024),
        T::range(3, 8, -512),
        T::range(4, 7, -256),
        T::range(5, 6, -128),
        T::range(5, 5, -64),
        T::range(4, 5, -32),
        T::range(4, 5, 0),
        T::range(5, 5, 32),
        T::range(5, 6, 64),
        T::range(4, 7, 128),
        T::range(3, 8, 256),
        T::range(3, 9, 512),
        T::range(3, 10, 1024),
        T::lower(5, -1025),
        T::upper(5, 2048),
    ],
    // B.8
    &[
        T::range(8, 3, -15),
        T::range(9, 1, -7),
        T::range(8, 1, -5),
        T::range(9, 0, -3),
        T::range(7, 0, -2),
        T::range(4, 0, -1),
        T::range(2, 1, 0),
        T::range(5, 0, 2),
        T::range(6, 0, 3),
        T::range(3, 4, 4),
        T::range(6, 1, 20),
        T::range(4, 4, 22),
        T::range(4, 5, 38),
        T::range(5, 6, 70),
        T::range(5, 7, 134),
        T::range(6, 7, 262),
        T::range(7, 8, 390),
        T::range(6, 10, 646),
        T::lower(9, -16),
        T::upper(9, 1670),
        T::oob(2),
    ],
    // B.9
    &[
        T::range(8, 4, -31),
        T::range(9, 2, -15),
        T::range(8, 2, -11),
        T::range(9, 1, -7),
        T::range(7, 1, -5),
        T::range(4, 1, -3),
        T::range(3, 1, -1),
        T::range(3, 1, 1),
        T::range(5, 1, 3),
        T::range(6, 1, 5),
        T::range(3, 5, 7),
        T::range(6, 2, 39),
        T::range(4, 5, 43),
        T::range(4, 6, 75),
        T::range(5, 7, 139),
        T::range(5, 8, 267),
        T::range(6, 8, 523),
        T::range(7, 9, 779),
        T::range(6, 11, 1291),
        T::lower(9, -32),
        T::upper(9, 3339),
        T::oob(2),
    ],
    // B.10
    &[
        T::range(7, 4, -21),
        T::range(8, 0, -5),
        T::range(7, 0, -4),
        T::range(5, 0, -3),
        T::range(2, 2, -2),
        T::range(5, 0, 2),
        T::range(6, 0, 3),
        T::range(7, 0, 4),
        T::range(8, 0, 5),
        T::range(2, 6, 6),
        T::range(5, 5, 70),
        T::range(6, 5, 102),
        T::range(6, 6, 134),
        T::range(6, 7, 198),
        T::range(6, 8, 326),
        T::range(6, 9, 582),
        T::range(6, 10, 1094),
        T::range(7, 11, 2118),
        T::lower(8, -22),
        T::upper(8, 4166),
        T::oob(2),
    ],
    // B.11
    &[
        T::range(1, 0, 1),
        T::range(2, 1, 2),
        T::range(4, 0, 4),
        T::range(4, 1, 5),
        T::range(5, 1, 7),
        T::range(5, 2, 9),
        T::range(6, 2, 13),
        T::range(7, 2, 17),
        T::range(7, 3, 21),
        T::range(7, 4, 29),
        T::range(7, 5, 45),
        T::range(7, 6, 77),
        T::upper(7, 141),
    ],
    // B.12
    &[
        T::range(1, 0, 1),
        T::range(2, 0, 2),
        T::range(3, 1, 3),
        T::range(5, 0, 5),
        T::range(5, 1, 6),
        T::range(6, 1, 8),
        T::range(7, 0, 10),
        T::range(7, 1, 11),
        T::range(7, 2, 13),
        T::range(7, 3, 17),
        T::range(7, 4, 25),
        T::range(8, 5, 41),
        T::upper(8, 73),
    ],
    // B.13
    &[
        T::range(1, 0, 1),
        T::range(3, 0, 2),
        T::range(4, 0, 3),
        T::range(5, 0, 4),
        T::range(4, 1, 5),
        T::range(3, 3, 7),
        T::range(6, 1, 15),
        T::range(6, 2, 17),
        T::range(6, 3, 21),
        T::range(6, 4, 29),
        T::range(6, 5, 45),
        T::range(7, 6, 77),
        T::upper(7, 141),
    ],
    // B.14
    &[
        T::range(3, 0, -2),
        T::range(3, 0, -1),
        T::range(1, 0, 0),
        T::range(3, 0, 1),
        T::range(3, 0, 2),
    ],
    // B.15
    &[
        T::range(7, 4, -24),
        T::range(6, 2, -8),
        T::range(5, 1, -4),
        T::range(4, 0, -2),
        T::range(3, 0, -1),
        T::range(1, 0, 0),
        T::range(3, 0, 1),
        T::range(4, 0, 2),
        T::range(5, 1, 3),
        T::range(6, 2, 5),
        T::range(7, 4, 9),
        T::lower(7, -25),
        T::upper(7, 25),
    ],
];
