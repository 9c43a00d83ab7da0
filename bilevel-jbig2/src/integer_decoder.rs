//! Arithmetic integer decoding (A.2).

use crate::arithmetic_decoder::{ArithmeticDecoder, Contexts};
use crate::error::{DecodeError, Result};

/// Prefix tiers of Figure A.1 as `(value bits, offset)`.
const TIERS: [(u32, i64); 6] = [
    (2, 0),
    (4, 4),
    (6, 20),
    (8, 84),
    (12, 340),
    (32, 4436),
];

/// One IAx procedure with its own 512 contexts.
#[derive(Clone, Debug)]
pub(crate) struct IntegerDecoder {
    contexts: Contexts,
}

impl IntegerDecoder {
    pub(crate) fn new() -> Self {
        Self {
            contexts: Contexts::new(9),
        }
    }

    /// Decode a value, `None` meaning OOB.
    ///
    /// "The result of the integer arithmetic decoding procedure is equal to:
    /// V if S = 0, -V if S = 1 and V > 0, OOB if S = 1 and V = 0" (A.2)
    pub(crate) fn decode(&mut self, decoder: &mut ArithmeticDecoder<'_>) -> Result<Option<i32>> {
        let mut prev = 1_u32;

        let sign = self.bit(decoder, &mut prev);

        let mut tier = 0;
        while tier < TIERS.len() - 1 && self.bit(decoder, &mut prev) == 1 {
            tier += 1;
        }

        let (bits, offset) = TIERS[tier];
        let mut value = 0_i64;

        for _ in 0..bits {
            value = (value << 1) | self.bit(decoder, &mut prev) as i64;
        }

        value += offset;

        if sign == 1 {
            if value == 0 {
                return Ok(None);
            }

            value = -value;
        }

        i32::try_from(value)
            .map(Some)
            .map_err(|_| DecodeError::Overflow)
    }

    /// Decode a value that must not be OOB.
    pub(crate) fn decode_value(
        &mut self,
        decoder: &mut ArithmeticDecoder<'_>,
        oob: impl Into<DecodeError>,
    ) -> Result<i32> {
        self.decode(decoder)?.ok_or(oob.into())
    }

    /// "If PREV < 256 set PREV = (PREV << 1) OR D, otherwise set
    /// PREV = (((PREV << 1) OR D) AND 511) OR 256" (A.2)
    #[inline]
    fn bit(&mut self, decoder: &mut ArithmeticDecoder<'_>, prev: &mut u32) -> u32 {
        let d = decoder.decode(self.contexts.get_mut(*prev & 0x1FF));

        *prev = if *prev < 256 {
            (*prev << 1) | d
        } else {
            (((*prev << 1) | d) & 511) | 256
        };

        d
    }
}
