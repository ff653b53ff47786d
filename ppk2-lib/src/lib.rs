//! Streaming sample decoder and calibration engine for the Nordic Power Profiler Kit II.
//!
//! Raw serial chunks go through [`WordReassembler`] (4-byte word alignment),
//! [`decode`] (bitfield split) and [`AnalogConverter`] (calibration polynomial),
//! composed per read cycle by [`SampleStream`]. [`Ppk2`] drives a live device.

pub mod calibration;
pub mod command;
pub mod constants;
pub mod converter;
pub mod device;
pub mod error;
pub mod metadata;
pub mod reassembly;
pub mod sample;
pub mod stream;

pub use calibration::{CalibrationTable, CalibrationTableBuilder, ConstantKey, RangeConstants, UncalibratedPolicy};
pub use command::{Command, DutPower, MeasurementMode, Opcode};
pub use converter::{AnalogConverter, calibrate};
pub use device::{Ppk2, SessionConfig};
pub use error::{CalibrationError, PpkError};
pub use metadata::{metadata_complete, parse_metadata};
pub use reassembly::WordReassembler;
pub use sample::{DecodedSample, SampleWord, decode};
pub use stream::{PeriodSummary, Sample, SampleStream};
