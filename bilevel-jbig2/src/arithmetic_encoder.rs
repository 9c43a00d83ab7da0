//! An MQ encoder (E.2) with the integer, symbol ID, generic and refinement
//! coding built on top of it, for producing arithmetic coded test data.
//!
//! Images are rows of 0 and 1 bytes, 1 meaning black.

#[rustfmt::skip]
const QE: [(u32, usize, usize, bool); 47] = [
    (0x5601, 1, 1, true), (0x3401, 2, 6, false), (0x1801, 3, 9, false),
    (0x0AC1, 4, 12, false), (0x0521, 5, 29, false), (0x0221, 38, 33, false),
    (0x5601, 7, 6, true), (0x5401, 8, 14, false), (0x4801, 9, 14, false),
    (0x3801, 10, 14, false), (0x3001, 11, 17, false), (0x2401, 12, 18, false),
    (0x1C01, 13, 20, false), (0x1601, 29, 21, false), (0x5601, 15, 14, true),
    (0x5401, 16, 14, false), (0x5101, 17, 15, false), (0x4801, 18, 16, false),
    (0x3801, 19, 17, false), (0x3401, 20, 18, false), (0x3001, 21, 19, false),
    (0x2801, 22, 19, false), (0x2401, 23, 20, false), (0x2201, 24, 21, false),
    (0x1C01, 25, 22, false), (0x1801, 26, 23, false), (0x1601, 27, 24, false),
    (0x1401, 28, 25, false), (0x1201, 29, 26, false), (0x1101, 30, 27, false),
    (0x0AC1, 31, 28, false), (0x09C1, 32, 29, false), (0x08A1, 33, 30, false),
    (0x0521, 34, 31, false), (0x0441, 35, 32, false), (0x02A1, 36, 33, false),
    (0x0221, 37, 34, false), (0x0141, 38, 35, false), (0x0111, 39, 36, false),
    (0x0085, 40, 37, false), (0x0049, 41, 38, false), (0x0025, 42, 39, false),
    (0x0015, 43, 40, false), (0x0009, 44, 41, false), (0x0005, 45, 42, false),
    (0x0001, 45, 43, false), (0x5601, 46, 46, false),
];

/// Integer prefix tiers (Table A.1) as `(value bits, offset)`.
const TIERS: [(u32, u64); 6] = [(2, 0), (4, 4), (6, 20), (8, 84), (12, 340), (32, 4436)];

/// Generic template 0 with the nominal AT pixels, from the most significant
/// context bit down.
#[rustfmt::skip]
const TEMPLATE_0: [(i32, i32); 16] = [
    (-2, -2), (-1, -2), (0, -2), (1, -2), (2, -2),
    (-3, -1), (-2, -1), (-1, -1), (0, -1), (1, -1), (2, -1), (3, -1),
    (-4, 0), (-3, 0), (-2, 0), (-1, 0),
];

/// Refinement templates as (own pixels, reference pixels). Template 0 uses
/// the nominal AT pixels.
type RefinementTaps = (&'static [(i32, i32)], &'static [(i32, i32)]);

const REFINEMENT_0: RefinementTaps = (
    &[(-1, -1), (0, -1), (1, -1), (-1, 0)],
    &[(-1, -1), (0, -1), (1, -1), (-1, 0), (0, 0), (1, 0), (-1, 1), (0, 1), (1, 1)],
);

const REFINEMENT_1: RefinementTaps = (
    &[(-1, -1), (0, -1), (1, -1), (-1, 0)],
    &[(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1), (1, 1)],
);

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Context {
    index: usize,
    mps: u8,
}

/// `1 << bits` fresh contexts.
pub(crate) fn contexts(bits: u32) -> Vec<Context> {
    vec![Context::default(); 1 << bits]
}

pub(crate) struct MqEncoder {
    a: u32,
    c: u32,
    ct: u32,
    /// The first byte stands in for the byte before the output.
    out: Vec<u8>,
}

impl MqEncoder {
    /// INITENC (Figure E.4).
    pub(crate) fn new() -> Self {
        Self {
            a: 0x8000,
            c: 0,
            ct: 12,
            out: vec![0],
        }
    }

    /// ENCODE (Figures E.5 to E.7).
    pub(crate) fn encode(&mut self, cx: &mut Context, bit: u8) {
        let (qe, nmps, nlps, switch) = QE[cx.index];
        self.a -= qe;

        if bit == cx.mps {
            if self.a & 0x8000 != 0 {
                self.c += qe;
                return;
            }

            if self.a < qe {
                self.a = qe;
            } else {
                self.c += qe;
            }

            cx.index = nmps;
        } else {
            if self.a < qe {
                self.c += qe;
            } else {
                self.a = qe;
            }

            if switch {
                cx.mps = 1 - cx.mps;
            }

            cx.index = nlps;
        }

        self.renormalize();
    }

    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;

            if self.ct == 0 {
                self.byte_out();
            }

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// BYTEOUT (Figure E.8).
    fn byte_out(&mut self) {
        let last = self.out.len() - 1;

        if self.out[last] == 0xFF {
            self.emit(20);
            return;
        }

        if self.c < 0x800_0000 {
            self.emit(19);
            return;
        }

        self.out[last] += 1;

        if self.out[last] == 0xFF {
            self.c &= 0x7FF_FFFF;
            self.emit(20);
        } else {
            self.emit(19);
        }
    }

    fn emit(&mut self, shift: u32) {
        self.out.push((self.c >> shift) as u8);
        self.c &= (1 << shift) - 1;
        self.ct = 27 - shift;
    }

    /// FLUSH (Figure E.10), followed by the 0xFFAC marker.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        let temp = self.c + self.a;
        self.c |= 0xFFFF;

        if self.c >= temp {
            self.c -= 0x8000;
        }

        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();

        if self.out.last() != Some(&0xFF) {
            self.out.push(0xFF);
        }

        self.out.push(0xAC);
        self.out.remove(0);
        self.out
    }

    /// An IAx value (A.2) with 512 contexts, `None` being OOB.
    pub(crate) fn encode_integer(&mut self, contexts: &mut [Context], value: Option<i64>) {
        let (sign, magnitude) = match value {
            None => (1, 0),
            Some(value) => (u8::from(value < 0), value.unsigned_abs()),
        };

        let tier = TIERS
            .iter()
            .rposition(|&(_, offset)| magnitude >= offset)
            .unwrap_or(0);
        let (bits, offset) = TIERS[tier];

        let mut prev = 1_usize;
        self.integer_bit(contexts, &mut prev, sign);

        for _ in 0..tier {
            self.integer_bit(contexts, &mut prev, 1);
        }

        if tier < TIERS.len() - 1 {
            self.integer_bit(contexts, &mut prev, 0);
        }

        let value = magnitude - offset;

        for i in (0..bits).rev() {
            self.integer_bit(contexts, &mut prev, ((value >> i) & 1) as u8);
        }
    }

    fn integer_bit(&mut self, contexts: &mut [Context], prev: &mut usize, bit: u8) {
        self.encode(&mut contexts[*prev], bit);

        let next = (*prev << 1) | usize::from(bit);
        *prev = if *prev < 256 { next } else { (next & 511) | 256 };
    }

    /// An IAID value (A.3) with `1 << code_len` contexts.
    pub(crate) fn encode_symbol_id(&mut self, contexts: &mut [Context], code_len: u32, id: u32) {
        let mut prev = 1_usize;

        for i in (0..code_len).rev() {
            let bit = ((id >> i) & 1) as u8;
            self.encode(&mut contexts[prev], bit);
            prev = (prev << 1) | usize::from(bit);
        }
    }

    /// A bitmap with generic template 0 and the nominal AT pixels.
    pub(crate) fn encode_generic(&mut self, contexts: &mut [Context], image: &[Vec<u8>], tpgdon: bool) {
        let mut ltp = 0;

        for (y, row) in image.iter().enumerate() {
            if tpgdon {
                let typical = match y {
                    0 => row.iter().all(|&p| p == 0),
                    _ => *row == image[y - 1],
                };

                self.encode(&mut contexts[0x9B25], u8::from(typical) ^ ltp);
                ltp = u8::from(typical);

                if typical {
                    continue;
                }
            }

            for (x, &bit) in row.iter().enumerate() {
                let context = TEMPLATE_0.iter().fold(0, |ctx, &(dx, dy)| {
                    (ctx << 1) | pixel(image, x as i32 + dx, y as i32 + dy)
                });

                self.encode(&mut contexts[context], bit);
            }
        }
    }

    /// A bitmap refined from `reference`, which is offset by `(dx, dy)`.
    pub(crate) fn encode_refinement(
        &mut self,
        contexts: &mut [Context],
        image: &[Vec<u8>],
        reference: &[Vec<u8>],
        (dx, dy): (i32, i32),
        template1: bool,
        tpgron: bool,
    ) {
        let (own, refd) = if template1 { REFINEMENT_1 } else { REFINEMENT_0 };
        let sltp = if template1 { 0x0008 } else { 0x0010 };
        let mut ltp = 0;

        for (y, row) in image.iter().enumerate() {
            let y = y as i32;

            if tpgron {
                let typical = row.iter().enumerate().all(|(x, &p)| {
                    uniform(reference, x as i32 - dx, y - dy).is_none_or(|value| value == usize::from(p))
                });

                self.encode(&mut contexts[sltp], u8::from(typical) ^ ltp);
                ltp = u8::from(typical);
            }

            for (x, &bit) in row.iter().enumerate() {
                let (x, rx, ry) = (x as i32, x as i32 - dx, y - dy);

                if ltp == 1 && uniform(reference, rx, ry).is_some() {
                    continue;
                }

                let context = own
                    .iter()
                    .fold(0, |ctx, &(ox, oy)| (ctx << 1) | pixel(image, x + ox, y + oy));
                let context = refd
                    .iter()
                    .fold(context, |ctx, &(ox, oy)| (ctx << 1) | pixel(reference, rx + ox, ry + oy));

                self.encode(&mut contexts[context], bit);
            }
        }
    }
}

/// An image drawn with `#` for black and `.` for white pixels.
pub(crate) fn image(rows: &[&str]) -> Vec<Vec<u8>> {
    rows.iter()
        .map(|row| row.chars().map(|c| u8::from(c == '#')).collect())
        .collect()
}

fn pixel(image: &[Vec<u8>], x: i32, y: i32) -> usize {
    if x < 0 || y < 0 {
        return 0;
    }

    image
        .get(y as usize)
        .and_then(|row| row.get(x as usize))
        .map_or(0, |&p| usize::from(p))
}

/// The value of a uniform 3x3 neighbourhood around (x, y).
fn uniform(image: &[Vec<u8>], x: i32, y: i32) -> Option<usize> {
    let value = pixel(image, x, y);

    (-1..=1)
        .all(|dy| (-1..=1).all(|dx| pixel(image, x + dx, y + dy) == value))
        .then_some(value)
}
