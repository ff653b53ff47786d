use crate::calibration::{CalibrationTable, UncalibratedPolicy};
use crate::command::{Command, DutPower, MeasurementMode, clamp_source_voltage};
use crate::constants::{ADC_MULTIPLIER, READ_BUFFER_SIZE};
use crate::converter::AnalogConverter;
use crate::error::PpkError;
use crate::metadata::{metadata_complete, parse_metadata};
use crate::stream::{PeriodSummary, Sample, SampleStream};
use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, trace};

// Default timeout for a single serial read
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

// Reads allowed before the metadata block must be complete
const DEFAULT_METADATA_ATTEMPTS: usize = 5;

/// Session configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub read_timeout: Duration,
    pub metadata_attempts: usize,
    pub uncalibrated: UncalibratedPolicy,
    pub adc_multiplier: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            metadata_attempts: DEFAULT_METADATA_ATTEMPTS,
            uncalibrated: UncalibratedPolicy::Reject,
            adc_multiplier: ADC_MULTIPLIER,
        }
    }
}

impl SessionConfig {
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn metadata_attempts(mut self, attempts: usize) -> Self {
        self.metadata_attempts = attempts;
        self
    }

    /// Convert even if the device reports it was never calibrated
    pub fn allow_uncalibrated(mut self) -> Self {
        self.uncalibrated = UncalibratedPolicy::UseReported;
        self
    }

    pub fn adc_multiplier(mut self, adc_multiplier: f64) -> Self {
        self.adc_multiplier = adc_multiplier;
        self
    }
}

/// A Power Profiler Kit II session over any byte stream (usually the CDC ACM serial port).
///
/// Reads are abandoned when `read_timeout` expires, so the stream's `read`
/// must be cancel-safe and the port must already be in raw mode. A
/// `tokio_serial::SerialStream` satisfies both; a `tokio::fs::File` on the
/// tty does not.
pub struct Ppk2<S> {
    port: S,
    config: SessionConfig,
    stream: SampleStream,
    mode: MeasurementMode,
    regulator_mv: u16,
}

impl<S> Ppk2<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(port: S, config: SessionConfig) -> Self {
        Self {
            port,
            config,
            stream: SampleStream::new(AnalogConverter::new(config.adc_multiplier)),
            mode: MeasurementMode::default(),
            regulator_mv: 0,
        }
    }

    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    /// Last commanded regulator voltage in mV (0 until one was set)
    pub fn regulator_mv(&self) -> u16 {
        self.regulator_mv
    }

    /// Regulator voltage fed into the calibration formula for the current mode
    pub fn effective_regulator_mv(&self) -> u16 {
        match self.mode {
            MeasurementMode::Ampere => 0,
            MeasurementMode::Source => self.regulator_mv,
        }
    }

    pub fn calibration(&self) -> Option<&CalibrationTable> {
        self.stream.table()
    }

    pub fn stream(&self) -> &SampleStream {
        &self.stream
    }

    /// Send a command to the device
    pub async fn send(&mut self, command: Command) -> Result<(), PpkError> {
        let bytes = command.to_bytes();
        trace!(?command, bytes = %hex::encode(&bytes), "Sending command");
        self.port.write_all(&bytes).await?;
        self.port.flush().await?;
        Ok(())
    }

    /// Read whatever the device has buffered, up to `READ_BUFFER_SIZE` bytes.
    ///
    /// A read that times out yields an empty chunk.
    pub async fn read_chunk(&mut self) -> Result<Bytes, PpkError> {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let read = match timeout(self.config.read_timeout, self.port.read(&mut buffer)).await {
            Ok(result) => result?,
            Err(_) => 0,
        };
        buffer.truncate(read);
        trace!(len = read, "Read chunk");
        Ok(Bytes::from(buffer))
    }

    /// Fetch and parse the metadata block, then install the calibration table.
    pub async fn get_metadata(&mut self) -> Result<&CalibrationTable, PpkError> {
        self.send(Command::GetMetadata).await?;

        let mut text = String::new();
        let mut attempts = 0;
        while !metadata_complete(&text) {
            if attempts == self.config.metadata_attempts {
                return Err(PpkError::MetadataIncomplete { attempts });
            }
            attempts += 1;
            let chunk = self.read_chunk().await?;
            text.push_str(&String::from_utf8_lossy(&chunk));
        }
        debug!(attempts, len = text.len(), "Metadata received");

        let table = parse_metadata(&text)?.build(self.config.uncalibrated)?;
        info!(
            calibrated = table.calibrated,
            hw = table.hw.as_deref().unwrap_or("?"),
            "Calibration table loaded"
        );
        self.stream.set_table(table);
        self.stream.table().ok_or(PpkError::NotCalibrated)
    }

    /// Configure the device as ampere meter
    pub async fn use_ampere_meter(&mut self) -> Result<(), PpkError> {
        self.set_mode(MeasurementMode::Ampere).await
    }

    /// Configure the device as source meter
    pub async fn use_source_meter(&mut self) -> Result<(), PpkError> {
        self.set_mode(MeasurementMode::Source).await
    }

    async fn set_mode(&mut self, mode: MeasurementMode) -> Result<(), PpkError> {
        self.send(Command::SetMode(mode)).await?;
        self.mode = mode;
        info!(%mode, "Measurement mode set");
        Ok(())
    }

    /// Set the source regulator voltage (clamped to 800..=5000 mV)
    pub async fn set_source_voltage(&mut self, mv: u16) -> Result<(), PpkError> {
        self.send(Command::SetSourceVoltage(mv)).await?;
        self.regulator_mv = clamp_source_voltage(mv);
        info!(requested_mv = mv, regulator_mv = self.regulator_mv, "Source voltage set");
        Ok(())
    }

    pub async fn toggle_dut_power(&mut self, state: DutPower) -> Result<(), PpkError> {
        self.send(Command::DutPower(state)).await?;
        info!(%state, "DUT power");
        Ok(())
    }

    pub async fn start_measuring(&mut self) -> Result<(), PpkError> {
        self.send(Command::StartMeasuring).await
    }

    /// Stop streaming and drop any partial sample word
    pub async fn stop_measuring(&mut self) -> Result<(), PpkError> {
        self.send(Command::StopMeasuring).await?;
        self.stream.reset();
        Ok(())
    }

    /// Read one chunk and summarise the samples it completes.
    pub async fn read_period(&mut self) -> Result<Option<PeriodSummary>, PpkError> {
        self.read_period_with(|_| {}).await
    }

    /// Like [`read_period`](Self::read_period), handing each sample to `on_sample`.
    pub async fn read_period_with<F>(&mut self, on_sample: F) -> Result<Option<PeriodSummary>, PpkError>
    where
        F: FnMut(&Sample),
    {
        if self.stream.table().is_none() {
            return Err(PpkError::NotCalibrated);
        }
        let chunk = self.read_chunk().await?;
        let regulator_mv = self.effective_regulator_mv();
        self.stream.process_chunk_with(&chunk, regulator_mv, on_sample)
    }

    /// Give back the underlying byte stream
    pub fn into_inner(self) -> S {
        self.port
    }
}
