use crate::constants::{ADC_SCALE, LOGIC_BITS, MAX_RANGE};
use modular_bitfield::prelude::*;
use serde::{Deserialize, Serialize};

/// One 32-bit sample word as streamed by the PPK2 (little-endian on the wire).
///
/// Layout, least significant bit first:
/// - bits 0..14: ADC count divided by 4
/// - bits 14..17: measurement range
/// - bits 17..24: unused
/// - bits 24..32: digital logic channels
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWord {
    pub adc: B14,
    pub range: B3,
    #[skip]
    unused: B7,
    pub logic: u8,
}

impl From<u32> for SampleWord {
    fn from(word: u32) -> Self {
        SampleWord::from_bytes(word.to_le_bytes())
    }
}

impl From<SampleWord> for u32 {
    fn from(word: SampleWord) -> Self {
        u32::from_le_bytes(word.into_bytes())
    }
}

/// Fields of a sample word after range clamping and ADC scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSample {
    /// Measurement range index, clamped to `0..=MAX_RANGE`
    pub range: u8,
    /// Full-resolution ADC count (the 14-bit field times 4)
    pub raw_adc: u32,
    /// Digital channel state, carried through untouched
    pub logic: u8,
}

impl DecodedSample {
    /// State of digital channel `channel` (0..8). Out-of-range channels read as low.
    pub fn logic_channel(&self, channel: u8) -> bool {
        u32::from(channel) < LOGIC_BITS && (self.logic >> channel) & 1 == 1
    }
}

/// Split a sample word into its bitfields.
///
/// Total over `u32`: range values above the table bound fold to the last range.
pub fn decode(word: u32) -> DecodedSample {
    let fields = SampleWord::from(word);
    DecodedSample {
        range: fields.range().min(MAX_RANGE),
        raw_adc: u32::from(fields.adc()) * ADC_SCALE,
        logic: fields.logic(),
    }
}
