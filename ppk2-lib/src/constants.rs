// Stream and calibration constants for the PPK2

/// Size of one sample word on the wire (4 bytes, little-endian)
pub const SAMPLE_SIZE: usize = 4;

/// Number of current measurement ranges with their own calibration constants
pub const NUM_RANGES: usize = 5;

/// Highest valid measurement range index
pub const MAX_RANGE: u8 = (NUM_RANGES - 1) as u8;

/// ADC field: 14 bits at position 0
pub const ADC_BITS: u32 = 14;
pub const ADC_POS: u32 = 0;

/// Measurement range field: 3 bits at position 14
pub const RANGE_BITS: u32 = 3;
pub const RANGE_POS: u32 = 14;

/// Logic channel field: 8 bits at position 24
pub const LOGIC_BITS: u32 = 8;
pub const LOGIC_POS: u32 = 24;

/// The device reports ADC counts divided by 4
pub const ADC_SCALE: u32 = 4;

/// Volts per ADC count: 1.8 V reference over 163840 counts
pub const ADC_MULTIPLIER: f64 = 1.8 / 163840.0;

/// Lowest regulator voltage the device accepts (mV)
pub const VDD_LOW_MV: u16 = 800;

/// Highest regulator voltage the device accepts (mV)
pub const VDD_HIGH_MV: u16 = 5000;

/// Offset applied to the regulator baseline when encoding the voltage
pub const REGULATOR_OFFSET: u16 = 32;

/// First regulator byte at the 800 mV baseline
pub const REGULATOR_BASE: u8 = 3;

/// Largest chunk the device hands over in one read
pub const READ_BUFFER_SIZE: usize = 1024;

/// Terminator of the metadata text block
pub const METADATA_END: &str = "END";
