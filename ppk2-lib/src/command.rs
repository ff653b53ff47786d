use crate::constants::{REGULATOR_BASE, REGULATOR_OFFSET, VDD_HIGH_MV, VDD_LOW_MV};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

/// Serial command opcodes understood by the PPK2 firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    NoOp = 0x00,
    TriggerSet = 0x01,
    AvgNumSet = 0x02,
    TriggerWindowSet = 0x03,
    TriggerIntervalSet = 0x04,
    TriggerSingleSet = 0x05,
    AverageStart = 0x06,
    AverageStop = 0x07,
    RangeSet = 0x08,
    LcdSet = 0x09,
    TriggerStop = 0x0a,
    DeviceRunningSet = 0x0c,
    RegulatorSet = 0x0d,
    SwitchPointDown = 0x0e,
    SwitchPointUp = 0x0f,
    // Shares its value with TRIGGER_EXT_TOGGLE
    SetPowerMode = 0x11,
    ResUserSet = 0x12,
    SpikeFilteringOn = 0x15,
    SpikeFilteringOff = 0x16,
    GetMetaData = 0x19,
    Reset = 0x20,
    SetUserGains = 0x25,
}

/// Measurement mode of the PPK2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MeasurementMode {
    /// Ampere meter: the DUT is powered externally
    #[default]
    #[strum(to_string = "ampere meter")]
    Ampere = 1,
    /// Source meter: the PPK2 powers the DUT through its regulator
    #[strum(to_string = "source meter")]
    Source = 2,
}

/// DUT power switch state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DutPower {
    #[strum(to_string = "OFF")]
    Off = 0,
    #[strum(to_string = "ON")]
    On = 1,
}

/// High-level device commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetMetadata,
    StartMeasuring,
    StopMeasuring,
    SetMode(MeasurementMode),
    DutPower(DutPower),
    /// Regulator voltage in millivolts, clamped to the supported range when encoded
    SetSourceVoltage(u16),
    SpikeFiltering(bool),
    Reset,
}

impl Command {
    /// Wire bytes of the command
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            Command::GetMetadata => vec![Opcode::GetMetaData.into()],
            Command::StartMeasuring => vec![Opcode::AverageStart.into()],
            Command::StopMeasuring => vec![Opcode::AverageStop.into()],
            Command::SetMode(mode) => vec![Opcode::SetPowerMode.into(), mode.into()],
            Command::DutPower(state) => vec![Opcode::DeviceRunningSet.into(), state.into()],
            Command::SetSourceVoltage(mv) => {
                let [b1, b2] = encode_source_voltage(mv);
                vec![Opcode::RegulatorSet.into(), b1, b2]
            }
            Command::SpikeFiltering(true) => vec![Opcode::SpikeFilteringOn.into()],
            Command::SpikeFiltering(false) => vec![Opcode::SpikeFilteringOff.into()],
            Command::Reset => vec![Opcode::Reset.into()],
        }
    }
}

/// Clamp a requested regulator voltage to what the device supports.
pub fn clamp_source_voltage(mv: u16) -> u16 {
    mv.clamp(VDD_LOW_MV, VDD_HIGH_MV)
}

/// Encode a regulator voltage as the two argument bytes of `REGULATOR_SET`.
///
/// 800 mV is `[3, 32]`; each further millivolt adds one to the low byte,
/// carrying into the high byte every 256.
pub fn encode_source_voltage(mv: u16) -> [u8; 2] {
    let diff = clamp_source_voltage(mv) - VDD_LOW_MV + REGULATOR_OFFSET;
    // diff <= 4232, so diff / 256 fits in a byte with room to spare
    [REGULATOR_BASE + (diff / 256) as u8, (diff % 256) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_voltage_encoding() {
        assert_eq!(encode_source_voltage(800), [3, 32]);
        assert_eq!(encode_source_voltage(1023), [3, 255]);
        assert_eq!(encode_source_voltage(1024), [4, 0]);
        assert_eq!(encode_source_voltage(3000), [11, 184]);
        assert_eq!(encode_source_voltage(5000), [19, 136]);
    }

    #[test]
    fn test_source_voltage_is_clamped() {
        assert_eq!(encode_source_voltage(0), encode_source_voltage(800));
        assert_eq!(encode_source_voltage(9000), encode_source_voltage(5000));
        assert_eq!(clamp_source_voltage(3300), 3300);
    }

    #[test]
    fn test_command_bytes() {
        assert_eq!(Command::GetMetadata.to_bytes(), vec![0x19]);
        assert_eq!(Command::StartMeasuring.to_bytes(), vec![0x06]);
        assert_eq!(Command::StopMeasuring.to_bytes(), vec![0x07]);
        assert_eq!(Command::SetMode(MeasurementMode::Ampere).to_bytes(), vec![0x11, 0x01]);
        assert_eq!(Command::SetMode(MeasurementMode::Source).to_bytes(), vec![0x11, 0x02]);
        assert_eq!(Command::DutPower(DutPower::On).to_bytes(), vec![0x0c, 0x01]);
        assert_eq!(Command::DutPower(DutPower::Off).to_bytes(), vec![0x0c, 0x00]);
        assert_eq!(Command::SetSourceVoltage(800).to_bytes(), vec![0x0d, 3, 32]);
        assert_eq!(Command::SpikeFiltering(true).to_bytes(), vec![0x15]);
        assert_eq!(Command::SpikeFiltering(false).to_bytes(), vec![0x16]);
        assert_eq!(Command::Reset.to_bytes(), vec![0x20]);
    }

    #[test]
    fn test_opcode_round_trip() {
        assert_eq!(Opcode::try_from(0x19u8).ok(), Some(Opcode::GetMetaData));
        assert!(Opcode::try_from(0x0bu8).is_err());
        assert_eq!(MeasurementMode::try_from(2u8).ok(), Some(MeasurementMode::Source));
    }
}
