//! The MQ arithmetic decoder (Annex E).
//!
//! "The arithmetic decoding procedure receives an arithmetically coded bit
//! sequence and an associated sequence of context labels, and reconstructs
//! the original string of binary symbols." (E.1.1)

/// Adaptive state of a single context (E.2.4).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Context {
    /// "I(CX)": index into the probability estimation table.
    index: u8,
    /// "MPS(CX)": the sense of the more probable symbol.
    mps: u8,
}

/// A block of contexts addressed by a context label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Contexts(Vec<Context>);

impl Contexts {
    /// `1 << bits` fresh contexts.
    pub(crate) fn new(bits: u32) -> Self {
        Self(vec![Context::default(); 1 << bits])
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self, label: u32) -> &mut Context {
        &mut self.0[label as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Decoder registers (Table E.1).
pub(crate) struct ArithmeticDecoder<'a> {
    data: &'a [u8],
    /// "BP": position of the current byte.
    pos: usize,
    /// The C-register, "Chigh" in the upper 16 bits.
    c: u32,
    /// The A-register.
    a: u32,
    /// "CT": bits left in the low half of C.
    ct: u32,
}

impl<'a> ArithmeticDecoder<'a> {
    /// INITDEC (E.3.5, Figure G.1).
    pub(crate) fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            data,
            pos: 0,
            c: 0,
            a: 0,
            ct: 0,
        };

        decoder.c = ((decoder.byte_at(0) as u32) ^ 0xFF) << 16;
        decoder.byte_in();
        decoder.c <<= 7;
        decoder.ct = decoder.ct.wrapping_sub(7);
        decoder.a = 0x8000;

        decoder
    }

    /// DECODE (E.3.2, Figure G.2). Returns the decoded bit.
    #[inline(always)]
    pub(crate) fn decode(&mut self, cx: &mut Context) -> u32 {
        let (qe, nmps, nlps, switch) = QE_TABLE[cx.index as usize];
        let qe = qe as u32;

        self.a -= qe;

        if (self.c >> 16) < self.a {
            if self.a & 0x8000 != 0 {
                return cx.mps as u32;
            }

            // MPS_EXCHANGE (Figure E.16).
            let d = if self.a < qe {
                let d = 1 - cx.mps;
                if switch {
                    cx.mps = 1 - cx.mps;
                }
                cx.index = nlps;
                d
            } else {
                cx.index = nmps;
                cx.mps
            };

            self.renormalize();
            d as u32
        } else {
            self.c -= self.a << 16;

            // LPS_EXCHANGE (Figure E.17).
            let d = if self.a < qe {
                self.a = qe;
                cx.index = nmps;
                cx.mps
            } else {
                self.a = qe;
                let d = 1 - cx.mps;
                if switch {
                    cx.mps = 1 - cx.mps;
                }
                cx.index = nlps;
                d
            };

            self.renormalize();
            d as u32
        }
    }

    /// RENORMD (E.3.3, Figure E.18).
    #[inline(always)]
    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }

            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// BYTEIN (E.3.4, Figure G.3).
    ///
    /// "If B1 exceeds 0x8F, then B1 must be one of the marker codes." In that
    /// case the decoder stops consuming data and feeds 1-bits from then on,
    /// which is also what happens past the end of the data. The C-register
    /// holds inverted data, so those 1-bits add nothing.
    #[inline(always)]
    fn byte_in(&mut self) {
        if self.byte_at(self.pos) == 0xFF {
            if self.byte_at(self.pos + 1) > 0x8F {
                self.ct = 8;
            } else {
                self.pos += 1;
                self.c = self
                    .c
                    .wrapping_add(0xFE00)
                    .wrapping_sub((self.byte_at(self.pos) as u32) << 9);
                self.ct = 7;
            }
        } else {
            self.pos += 1;
            self.c = self
                .c
                .wrapping_add(0xFF00)
                .wrapping_sub((self.byte_at(self.pos) as u32) << 8);
            self.ct = 8;
        }
    }

    #[inline(always)]
    fn byte_at(&self, pos: usize) -> u8 {
        self.data.get(pos).copied().unwrap_or(0xFF)
    }
}

/// "Table E.1 - Qe values and probability estimation process", as
/// `(Qe, NMPS, NLPS, SWITCH)`.
#[rustfmt::skip]
static QE_TABLE: [(u16, u8, u8, bool); 47] = [
    (0x5601, 1, 1, true),
    (0x3401, 2, 6, false),
    (0x1801, 3, 9, false),
    (0x0AC1, 4, 12, false),
    (0x0521, 5, 29, false),
    (0x0221, 38, 33, false),
    (0x5601, 7, 6, true),
    (0x5401, 8, 14, false),
    (0x4801, 9, 14, false),
    (0x3801, 10, 14, false),
    (0x3001, 11, 17, false),
    (0x2401, 12, 18, false),
    (0x1C01, 13, 20, false),
    (0x1601, 29, 21, false),
    (0x5601, 15, 14, true),
    (0x5401, 16, 14, false),
    (0x5101, 17, 15, false),
    (0x4801, 18, 16, false),
    (0x3801, 19, 17, false),
    (0x3401, 20, 18, false),
    (0x3001, 21, 19, false),
    (0x2801, 22, 19, false),
    (0x2401, 23, 20, false),
    (0x2201, 24, 21, false),
    (0x1C01, 25, 22, false),
    (0x1801, 26, 23, false),
    (0x1601, 27, 24, false),
    (0x1401, 28, 25, false),
    (0x1201, 29, 26, false),
    (0x1101, 30, 27, false),
    (0x0AC1, 31, 28, false),
    (0x09C1, 32, 29, false),
    (0x08A1, 33, 30, false),
    (0x0521, 34, 31, false),
    (0x0441, 35, 32, false),
    (0x02A1, 36, 33, false),
    (0x0221, 37, 34, false),
    (0x0141, 38, 35, false),
    (0x0111, 39, 36, false),
    (0x0085, 40, 37, false),
    (0x0049, 41, 38, false),
    (0x0025, 42, 39, false),
    (0x0015, 43, 40, false),
    (0x0009, 44, 41, false),
    (0x0005, 45, 42, false),
    (0x0001, 45, 43, false),
    (0x5601, 46, 46, false),
];
