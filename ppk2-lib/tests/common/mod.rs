//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use ppk2_lib::calibration::{CalibrationTable, ConstantKey, RangeConstants, UncalibratedPolicy};
#[allow(unused_imports)]
pub use ppk2_lib::constants::{ADC_MULTIPLIER, ADC_POS, LOGIC_POS, NUM_RANGES, RANGE_POS};
#[allow(unused_imports)]
pub use ppk2_lib::error::{CalibrationError, PpkError};

/// Metadata block as a calibrated PPK2 sends it
#[allow(dead_code)]
pub const METADATA: &str = "Calibrated: 1\n\
R0: 1031.64\nR1: 101.65\nR2: 10.15\nR3: 0.94\nR4: 0.043\n\
GS0: 0.0001\nGS1: 0.00011\nGS2: 0.000094\nGS3: 0.0000072\nGS4: 0.00000021\n\
GI0: 1.0011\nGI1: 0.9989\nGI2: 1.0006\nGI3: 1.0015\nGI4: 0.9992\n\
O0: 112.7\nO1: 75.4\nO2: 64.9\nO3: 68.2\nO4: 86.3\n\
S0: 0.0000000124\nS1: 0.000000112\nS2: 0.00000117\nS3: 0.0000122\nS4: 0.000134\n\
I0: 0.0\nI1: 0.0\nI2: 0.0\nI3: 0.0\nI4: 0.0\n\
UG0: 1.0\nUG1: 1.0\nUG2: 1.0\nUG3: 1.0\nUG4: 1.0\n\
HW: 9173\n\
IA: 56\n\
END\n";

/// Range constants that reduce the calibration formula to `raw_adc * multiplier / r`
#[allow(dead_code)]
pub fn linear_constants(r: f64) -> RangeConstants {
    RangeConstants {
        r,
        gs: 0.0,
        gi: 1.0,
        o: 0.0,
        s: 0.0,
        i: 0.0,
        ug: 1.0,
    }
}

/// Calibrated table using the same constants for every range
#[allow(dead_code)]
pub fn uniform_table(constants: RangeConstants) -> CalibrationTable {
    let mut builder = CalibrationTable::builder().calibrated(true);
    for range in 0..NUM_RANGES {
        builder = builder.range(range, constants).expect("range within table");
    }
    builder.build(UncalibratedPolicy::Reject).expect("complete table")
}

/// Assemble a sample word from its fields (`adc` is the 14-bit, pre-scale value)
#[allow(dead_code)]
pub fn sample_word(adc: u32, range: u32, logic: u32) -> u32 {
    (adc << ADC_POS) | (range << RANGE_POS) | (logic << LOGIC_POS)
}

/// Little-endian wire bytes of a sequence of words
#[allow(dead_code)]
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
