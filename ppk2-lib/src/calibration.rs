use crate::constants::{MAX_RANGE, NUM_RANGES};
use crate::error::{CalibrationError, PpkError};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use tracing::warn;

/// Name of a per-range calibration constant as it appears in the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum ConstantKey {
    R,
    GS,
    GI,
    O,
    S,
    I,
    UG,
}

impl ConstantKey {
    pub const ALL: [ConstantKey; 7] = [
        ConstantKey::R,
        ConstantKey::GS,
        ConstantKey::GI,
        ConstantKey::O,
        ConstantKey::S,
        ConstantKey::I,
        ConstantKey::UG,
    ];

    fn slot(&self) -> usize {
        *self as usize
    }
}

/// Calibration constants of one measurement range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConstants {
    /// Sense resistor divider factor
    pub r: f64,
    /// Gain slope
    pub gs: f64,
    /// Gain intercept
    pub gi: f64,
    /// ADC offset in counts
    pub o: f64,
    /// Source-mode offset
    pub s: f64,
    /// Source-mode leakage
    pub i: f64,
    /// User gain
    pub ug: f64,
}

impl RangeConstants {
    fn from_slots(range: usize, slots: &[Option<f64>; 7]) -> Result<Self, CalibrationError> {
        let get = |key: ConstantKey| {
            slots[key.slot()].ok_or(CalibrationError::MissingConstant {
                key: key.into(),
                range,
            })
        };
        Ok(Self {
            r: get(ConstantKey::R)?,
            gs: get(ConstantKey::GS)?,
            gi: get(ConstantKey::GI)?,
            o: get(ConstantKey::O)?,
            s: get(ConstantKey::S)?,
            i: get(ConstantKey::I)?,
            ug: get(ConstantKey::UG)?,
        })
    }

    fn into_slots(self) -> [Option<f64>; 7] {
        [
            Some(self.r),
            Some(self.gs),
            Some(self.gi),
            Some(self.o),
            Some(self.s),
            Some(self.i),
            Some(self.ug),
        ]
    }
}

/// What to do with a device that reports it was never factory-calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum UncalibratedPolicy {
    /// Refuse to build a table; conversion never starts.
    #[default]
    Reject,
    /// Convert with whatever constants the device reported.
    UseReported,
}

/// Fully populated calibration table. Immutable once built.
///
/// Deserializing goes through [`CalibrationTableBuilder::build`] with
/// [`UncalibratedPolicy::Reject`], so a stored table can never bypass validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredTable")]
pub struct CalibrationTable {
    pub calibrated: bool,
    pub hw: Option<String>,
    pub ia: Option<String>,
    ranges: [RangeConstants; NUM_RANGES],
}

impl CalibrationTable {
    pub fn builder() -> CalibrationTableBuilder {
        CalibrationTableBuilder::default()
    }

    /// Constants for `range`, checked against the table bound.
    pub fn constants_for(&self, range: u8) -> Result<&RangeConstants, PpkError> {
        self.ranges
            .get(usize::from(range))
            .ok_or(PpkError::RangeOutOfBounds {
                range,
                max: MAX_RANGE,
            })
    }

    pub fn ranges(&self) -> &[RangeConstants; NUM_RANGES] {
        &self.ranges
    }
}

// Serialized shape of a table before validation
#[derive(Deserialize)]
struct StoredTable {
    calibrated: bool,
    hw: Option<String>,
    ia: Option<String>,
    ranges: Vec<RangeConstants>,
}

impl TryFrom<StoredTable> for CalibrationTable {
    type Error = PpkError;

    fn try_from(stored: StoredTable) -> Result<Self, Self::Error> {
        let mut builder = CalibrationTable::builder().calibrated(stored.calibrated);
        if let Some(hw) = stored.hw {
            builder.set_hw(hw);
        }
        if let Some(ia) = stored.ia {
            builder.set_ia(ia);
        }
        for (range, constants) in stored.ranges.into_iter().enumerate() {
            builder = builder.range(range, constants)?;
        }
        Ok(builder.build(UncalibratedPolicy::Reject)?)
    }
}

/// Accumulates metadata values into optional slots until every constant is known.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTableBuilder {
    calibrated: Option<bool>,
    hw: Option<String>,
    ia: Option<String>,
    slots: [[Option<f64>; 7]; NUM_RANGES],
}

impl CalibrationTableBuilder {
    pub fn calibrated(mut self, calibrated: bool) -> Self {
        self.set_calibrated(calibrated);
        self
    }

    pub fn hw(mut self, hw: impl Into<String>) -> Self {
        self.set_hw(hw);
        self
    }

    pub fn ia(mut self, ia: impl Into<String>) -> Self {
        self.set_ia(ia);
        self
    }

    /// Fill every constant of `range` at once.
    pub fn range(mut self, range: usize, constants: RangeConstants) -> Result<Self, PpkError> {
        let slots = self.slots.get_mut(range).ok_or(PpkError::RangeOutOfBounds {
            range: u8::try_from(range).unwrap_or(u8::MAX),
            max: MAX_RANGE,
        })?;
        *slots = constants.into_slots();
        Ok(self)
    }

    pub fn set_calibrated(&mut self, calibrated: bool) {
        self.calibrated = Some(calibrated);
    }

    pub fn set_hw(&mut self, hw: impl Into<String>) {
        self.hw = Some(hw.into());
    }

    pub fn set_ia(&mut self, ia: impl Into<String>) {
        self.ia = Some(ia.into());
    }

    /// Record one constant. Later values for the same slot win.
    pub fn set(&mut self, key: ConstantKey, range: usize, value: f64) -> Result<(), PpkError> {
        let slots = self.slots.get_mut(range).ok_or(PpkError::RangeOutOfBounds {
            range: u8::try_from(range).unwrap_or(u8::MAX),
            max: MAX_RANGE,
        })?;
        slots[key.slot()] = Some(value);
        Ok(())
    }

    pub fn get(&self, key: ConstantKey, range: usize) -> Option<f64> {
        self.slots.get(range).and_then(|slots| slots[key.slot()])
    }

    /// Validate and freeze the table.
    pub fn build(self, policy: UncalibratedPolicy) -> Result<CalibrationTable, CalibrationError> {
        let calibrated = match (self.calibrated, policy) {
            (Some(true), _) => true,
            (Some(false), UncalibratedPolicy::Reject) => return Err(CalibrationError::Uncalibrated),
            (None, UncalibratedPolicy::Reject) => return Err(CalibrationError::MissingCalibratedFlag),
            (_, UncalibratedPolicy::UseReported) => {
                warn!("Device is not factory-calibrated, converting with reported constants");
                false
            }
        };

        let [r0, r1, r2, r3, r4]: [Result<RangeConstants, CalibrationError>; NUM_RANGES] =
            std::array::from_fn(|range| RangeConstants::from_slots(range, &self.slots[range]));

        Ok(CalibrationTable {
            calibrated,
            hw: self.hw,
            ia: self.ia,
            ranges: [r0?, r1?, r2?, r3?, r4?],
        })
    }
}
