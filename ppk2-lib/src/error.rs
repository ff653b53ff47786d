use std::io;
use thiserror::Error;

/// Problems with the calibration table that make conversion impossible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Calibration constant {key}{range} is missing")]
    MissingConstant { key: &'static str, range: usize },

    #[error("Metadata does not say whether the device is calibrated")]
    MissingCalibratedFlag,

    #[error("Device reports it was never factory-calibrated")]
    Uncalibrated,
}

/// The primary error type for the `ppk2-lib` library.
#[derive(Error, Debug)]
pub enum PpkError {
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Measurement range {range} exceeds the table bound {max}")]
    RangeOutOfBounds { range: u8, max: u8 },

    #[error("No calibration table loaded. Read the device metadata first")]
    NotCalibrated,

    #[error("Metadata parse error at line {line}: {message}")]
    Metadata { line: usize, message: String },

    #[error("Metadata block incomplete after {attempts} reads")]
    MetadataIncomplete { attempts: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
