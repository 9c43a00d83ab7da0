//! Symbol ID decoding (A.3).

use crate::arithmetic_decoder::{ArithmeticDecoder, Contexts};
use crate::error::{DecodeError, Result};

/// The longest symbol code whose contexts can be addressed.
const MAX_CODE_LEN: u32 = 31;

/// The IAID procedure.
#[derive(Clone, Debug)]
pub(crate) struct SymbolIdDecoder {
    /// "The number of contexts required is 2^SBSYMCODELEN" (A.3)
    contexts: Contexts,
    code_len: u32,
}

impl SymbolIdDecoder {
    pub(crate) fn new(code_len: u32) -> Result<Self> {
        if code_len > MAX_CODE_LEN {
            return Err(DecodeError::Overflow);
        }

        Ok(Self {
            contexts: Contexts::new(code_len),
            code_len,
        })
    }

    pub(crate) fn code_len(&self) -> u32 {
        self.code_len
    }

    pub(crate) fn decode(&mut self, decoder: &mut ArithmeticDecoder<'_>) -> u32 {
        let mut prev = 1_u32;

        for _ in 0..self.code_len {
            // PREV never exceeds 2^SBSYMCODELEN - 1 before the last bit.
            let d = decoder.decode(self.contexts.get_mut(prev));
            prev = (prev << 1) | d;
        }

        prev - (1 << self.code_len)
    }
}
