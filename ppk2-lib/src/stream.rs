use crate::calibration::CalibrationTable;
use crate::converter::AnalogConverter;
use crate::error::PpkError;
use crate::reassembly::WordReassembler;
use crate::sample::decode;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// One calibrated sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub range: u8,
    pub raw_adc: u32,
    pub logic: u8,
    pub current_ua: f64,
}

/// Aggregate over every sample resolved by one read cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// Words completed by the chunk, including one finished from the carried remainder
    pub count: usize,
    pub average_ua: f64,
    pub min_ua: f64,
    pub max_ua: f64,
    /// Logic channels seen high at least once during the period
    pub logic_or: u8,
}

impl fmt::Display for PeriodSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Avg of {} samples: {:.3} µA (min {:.3}, max {:.3}, logic {:08b})",
            self.count, self.average_ua, self.min_ua, self.max_ua, self.logic_or
        )
    }
}

/// Decoding pipeline for one device stream: reassembly, bitfield decoding and
/// calibration, aggregated per read cycle.
#[derive(Debug, Default)]
pub struct SampleStream {
    reassembler: WordReassembler,
    converter: AnalogConverter,
    table: Option<CalibrationTable>,
}

impl SampleStream {
    pub fn new(converter: AnalogConverter) -> Self {
        Self {
            reassembler: WordReassembler::new(),
            converter,
            table: None,
        }
    }

    pub fn with_table(table: CalibrationTable, converter: AnalogConverter) -> Self {
        Self {
            table: Some(table),
            ..Self::new(converter)
        }
    }

    pub fn set_table(&mut self, table: CalibrationTable) {
        self.table = Some(table);
    }

    pub fn table(&self) -> Option<&CalibrationTable> {
        self.table.as_ref()
    }

    pub fn converter(&self) -> &AnalogConverter {
        &self.converter
    }

    pub fn remainder(&self) -> &[u8] {
        self.reassembler.remainder()
    }

    /// Forget the partial word and display diagnostics, e.g. after a restart.
    pub fn reset(&mut self) {
        self.reassembler.clear();
        self.converter.reset_diagnostics();
    }

    /// Decode one chunk and summarise it. `Ok(None)` when no word was completed.
    pub fn process_chunk(&mut self, chunk: &[u8], regulator_mv: u16) -> Result<Option<PeriodSummary>, PpkError> {
        self.process_chunk_with(chunk, regulator_mv, |_| {})
    }

    /// Like [`process_chunk`](Self::process_chunk), handing each sample to `on_sample`.
    pub fn process_chunk_with<F>(
        &mut self,
        chunk: &[u8],
        regulator_mv: u16,
        mut on_sample: F,
    ) -> Result<Option<PeriodSummary>, PpkError>
    where
        F: FnMut(&Sample),
    {
        let table = self.table.as_ref().ok_or(PpkError::NotCalibrated)?;
        let words = self.reassembler.push(chunk);
        if words.is_empty() {
            return Ok(None);
        }

        let mut sum = 0.0;
        let mut min_ua = f64::INFINITY;
        let mut max_ua = f64::NEG_INFINITY;
        let mut logic_or = 0u8;

        for word in &words {
            let decoded = decode(*word);
            let current_ua = self.converter.convert(&decoded, table, regulator_mv)?;
            sum += current_ua;
            min_ua = min_ua.min(current_ua);
            max_ua = max_ua.max(current_ua);
            logic_or |= decoded.logic;

            on_sample(&Sample {
                range: decoded.range,
                raw_adc: decoded.raw_adc,
                logic: decoded.logic,
                current_ua,
            });
        }

        let summary = PeriodSummary {
            count: words.len(),
            average_ua: sum / words.len() as f64,
            min_ua,
            max_ua,
            logic_or,
        };
        debug!(
            count = summary.count,
            average_ua = summary.average_ua,
            remainder = self.reassembler.remainder().len(),
            "Processed chunk"
        );
        Ok(Some(summary))
    }
}
