use crate::calibration::{CalibrationTable, RangeConstants};
use crate::constants::ADC_MULTIPLIER;
use crate::error::PpkError;
use crate::sample::DecodedSample;
use std::collections::VecDeque;

const ROLLING_WINDOW: usize = 4;

/// Apply the calibration polynomial to one full-resolution ADC count.
///
/// Returns amperes. `regulator_mv` is the commanded source voltage and is 0
/// in ampere-meter mode. The evaluation order is fixed so results are
/// bit-identical to the device's reference formula.
pub fn calibrate(raw_adc: u32, constants: &RangeConstants, adc_multiplier: f64, regulator_mv: u16) -> f64 {
    let result_without_gain = (f64::from(raw_adc) - constants.o) * (adc_multiplier / constants.r);

    constants.ug
        * (result_without_gain * (constants.gs * result_without_gain + constants.gi)
            + (constants.s + f64::from(regulator_mv) / 1000.0 + constants.i))
}

/// Converts decoded samples to microamps and keeps live-display diagnostics.
#[derive(Debug, Clone)]
pub struct AnalogConverter {
    adc_multiplier: f64,
    last_value: Option<f64>,
    last_range: Option<u8>,
    window: VecDeque<f64>,
}

impl Default for AnalogConverter {
    fn default() -> Self {
        Self::new(ADC_MULTIPLIER)
    }
}

impl AnalogConverter {
    pub fn new(adc_multiplier: f64) -> Self {
        Self {
            adc_multiplier,
            last_value: None,
            last_range: None,
            window: VecDeque::with_capacity(ROLLING_WINDOW),
        }
    }

    pub fn adc_multiplier(&self) -> f64 {
        self.adc_multiplier
    }

    /// Calibrated current of `sample` in µA.
    pub fn convert(
        &mut self,
        sample: &DecodedSample,
        table: &CalibrationTable,
        regulator_mv: u16,
    ) -> Result<f64, PpkError> {
        let constants = table.constants_for(sample.range)?;
        let current_ua = calibrate(sample.raw_adc, constants, self.adc_multiplier, regulator_mv) * 1_000_000.0;

        self.last_value = Some(current_ua);
        self.last_range = Some(sample.range);
        if self.window.len() == ROLLING_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(current_ua);

        Ok(current_ua)
    }

    /// Latest converted value in µA
    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    /// Mean of the last (up to) four converted values in µA
    pub fn rolling_avg4(&self) -> Option<f64> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
        }
    }

    pub fn last_range(&self) -> Option<u8> {
        self.last_range
    }

    pub fn reset_diagnostics(&mut self) {
        self.last_value = None;
        self.last_range = None;
        self.window.clear();
    }
}
