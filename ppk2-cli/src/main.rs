use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use ppk2_lib::{DutPower, PeriodSummary, Ppk2, SessionConfig};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tokio::{signal, time::sleep};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Stream calibrated current readings from a Nordic Power Profiler Kit II.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial device of the PPK2 (e.g. /dev/ttyACM0).
    port: PathBuf,
    /// Power the DUT from the PPK2 at this voltage in mV (source meter mode).
    /// Without it the PPK2 runs as ampere meter.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(800..=5000))]
    source_mv: Option<u16>,
    /// Number of read cycles. Runs until Ctrl+C when omitted.
    #[arg(short, long)]
    periods: Option<u64>,
    /// Pause between reads in milliseconds.
    #[arg(short, long, default_value_t = 10)]
    interval_ms: u64,
    /// Timeout of a single serial read in milliseconds.
    #[arg(long, default_value_t = 100)]
    read_timeout_ms: u64,
    /// Convert even if the device reports it was never factory-calibrated.
    #[arg(long)]
    allow_uncalibrated: bool,
    /// Leave DUT power off.
    #[arg(long)]
    no_dut_power: bool,
    /// Print one JSON object per period instead of text.
    #[arg(long)]
    json: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(log_file_path: Option<&PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // -v raises INFO to DEBUG, -vv to TRACE; RUST_LOG wins when set
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.as_ref(), &cli.verbose)?;

    let port = open_port(&cli.port)?;

    let mut config = SessionConfig::default().read_timeout(Duration::from_millis(cli.read_timeout_ms));
    if cli.allow_uncalibrated {
        config = config.allow_uncalibrated();
    }
    let mut ppk = Ppk2::new(port, config);

    let result = tokio::select! {
        res = run(&mut ppk, &cli) => res,
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down gracefully.");
            Ok(())
        }
    };

    if let Err(e) = ppk.stop_measuring().await {
        warn!("Failed to stop measuring: {}", e);
    }

    if let Err(e) = result {
        error!("Monitor failed: {:?}", e);
        process::exit(1);
    }
    Ok(())
}

// The PPK2 is a USB CDC device, so the baud rate is nominal. Opening through
// the serial layer puts the tty into raw mode.
const BAUD_RATE: u32 = 115_200;

fn open_port(path: &Path) -> Result<SerialStream> {
    let name = path.to_string_lossy();
    let port = tokio_serial::new(name.as_ref(), BAUD_RATE)
        .open_native_async()
        .with_context(|| format!("Failed to open serial device {:?}", path))?;
    info!(port = %name, "Serial device opened");
    Ok(port)
}

async fn run(ppk: &mut Ppk2<SerialStream>, cli: &Cli) -> Result<()> {
    let table = ppk.get_metadata().await.context("Failed to read calibration metadata")?;
    info!(
        calibrated = table.calibrated,
        hw = table.hw.as_deref().unwrap_or("?"),
        ia = table.ia.as_deref().unwrap_or("?"),
        "Device metadata"
    );

    match cli.source_mv {
        Some(mv) => {
            ppk.use_source_meter().await?;
            ppk.set_source_voltage(mv).await?;
        }
        None => ppk.use_ampere_meter().await?,
    }

    let power = if cli.no_dut_power { DutPower::Off } else { DutPower::On };
    ppk.toggle_dut_power(power).await?;
    ppk.start_measuring().await?;

    info!("--- Streaming ---");
    let mut period = 0u64;
    while cli.periods.is_none_or(|limit| period < limit) {
        if let Some(summary) = ppk.read_period().await? {
            period += 1;
            print_summary(&summary, cli.json)?;
        }
        sleep(Duration::from_millis(cli.interval_ms)).await;
    }

    info!(periods = period, "Finished streaming.");
    Ok(())
}

fn print_summary(summary: &PeriodSummary, json: bool) -> Result<()> {
    let now = chrono::Local::now();
    if json {
        let mut record = serde_json::to_value(summary)?;
        record["timestamp"] = now.to_rfc3339().into();
        println!("{record}");
    } else {
        println!("{} {}", now.format("%H:%M:%S%.3f"), summary);
    }
    Ok(())
}
