use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use ppk2_lib::{AnalogConverter, SampleStream, UncalibratedPolicy, parse_metadata};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Decode a raw PPK2 sample capture offline, one simulated read cycle per chunk.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Raw capture of the serial sample stream.
    capture: PathBuf,
    /// Metadata block saved from the same device.
    #[arg(short, long)]
    metadata: PathBuf,
    /// The capture is hex text rather than binary.
    #[arg(long)]
    hex: bool,
    /// Bytes per simulated read cycle.
    #[arg(short, long, default_value_t = 1024, value_parser = clap::value_parser!(u16).range(1..))]
    chunk_size: u16,
    /// Regulator voltage in mV for captures taken in source meter mode.
    #[arg(short, long, default_value_t = 0)]
    regulator_mv: u16,
    /// Convert even if the metadata says the device was never factory-calibrated.
    #[arg(long)]
    allow_uncalibrated: bool,
    /// Print one JSON object per period instead of text.
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cli.verbose.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let metadata = tokio::fs::read_to_string(&cli.metadata)
        .await
        .with_context(|| format!("Failed to read metadata from {:?}", cli.metadata))?;
    let policy = if cli.allow_uncalibrated {
        UncalibratedPolicy::UseReported
    } else {
        UncalibratedPolicy::Reject
    };
    let table = parse_metadata(&metadata)?.build(policy)?;
    info!(calibrated = table.calibrated, hw = table.hw.as_deref().unwrap_or("?"), "Calibration table loaded");

    let capture = load_capture(&cli).await?;
    info!(bytes = capture.len(), "Capture loaded");

    let mut stream = SampleStream::with_table(table, AnalogConverter::default());
    let mut total_samples = 0usize;
    let mut total_ua = 0.0;

    for chunk in capture.chunks(usize::from(cli.chunk_size)) {
        let Some(summary) = stream.process_chunk(chunk, cli.regulator_mv)? else {
            continue;
        };
        total_samples += summary.count;
        total_ua += summary.average_ua * summary.count as f64;

        if cli.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            println!("{}", summary);
        }
    }

    if !stream.remainder().is_empty() {
        warn!(
            bytes = stream.remainder().len(),
            "Capture ends with a partial sample word"
        );
    }
    if total_samples == 0 {
        bail!("Capture contains no complete sample word");
    }
    info!(
        samples = total_samples,
        average_ua = total_ua / total_samples as f64,
        "Replay finished"
    );
    Ok(())
}

async fn load_capture(cli: &Cli) -> Result<Bytes> {
    let raw = tokio::fs::read(&cli.capture)
        .await
        .with_context(|| format!("Failed to read capture from {:?}", cli.capture))?;
    if !cli.hex {
        return Ok(Bytes::from(raw));
    }

    let text: String = String::from_utf8(raw)
        .context("Hex capture is not valid UTF-8")?
        .split_whitespace()
        .collect();
    let decoded = hex::decode(&text).context("Failed to decode hex capture")?;
    Ok(Bytes::from(decoded))
}
