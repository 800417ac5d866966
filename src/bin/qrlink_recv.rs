//! Capture QR frames, reassemble the stream and write it to a file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use qrlink_protocol::capture::{select_device, CaptureDeviceProvider, ImageSequenceProvider};
use qrlink_protocol::codec::QrCodec;
use qrlink_protocol::config::TransferConfig;
use qrlink_protocol::logging;
use qrlink_protocol::reassembler::LossPolicy;
use qrlink_protocol::receiver::{write_report, write_stream, Receiver};
use qrlink_protocol::TransferError;

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Log index gaps and keep going
    Log,
    /// Abort on the first index gap
    Fail,
}

impl From<PolicyArg> for LossPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Log => LossPolicy::LogAndContinue,
            PolicyArg::Fail => LossPolicy::FailFast,
        }
    }
}

#[derive(Parser)]
#[command(name = "qrlink-recv")]
#[command(about = "Read a stream of QR code frames and rebuild the file")]
#[command(version)]
struct Args {
    /// File to write the reassembled stream to (use the original extension)
    #[arg(short, long)]
    output: PathBuf,

    /// Directory of captured samples; each one is a capture device
    #[arg(long = "capture-dir", required = true)]
    capture_dirs: Vec<PathBuf>,

    /// Preferred capture device id, falls back to the first available
    #[arg(short, long)]
    device: Option<usize>,

    /// Consecutive samples taken of each captured image
    #[arg(long, default_value_t = 1)]
    samples_per_image: u32,

    /// Silence that ends the capture, in milliseconds [default: 2000]
    #[arg(long)]
    inactivity_ms: Option<u64>,

    /// What to do when frame indices are not contiguous [default: log]
    #[arg(long, value_enum)]
    loss_policy: Option<PolicyArg>,

    /// Write a JSON session report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// TOML transfer configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut config = TransferConfig::load_or_default(args.config.as_deref())
        .context("Failed to load transfer configuration")?;
    if let Some(inactivity_ms) = args.inactivity_ms {
        config.inactivity_ms = inactivity_ms;
    }
    if let Some(policy) = args.loss_policy {
        config.loss_policy = policy.into();
    }
    config.validate()?;

    let provider = ImageSequenceProvider::new(args.capture_dirs, args.samples_per_image);
    let device_info = match select_device(&provider, args.device) {
        Ok(info) => info,
        Err(TransferError::NoCaptureDevice) => {
            tracing::error!("no valid capture devices identified... aborting run!");
            return Err(TransferError::NoCaptureDevice.into());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(id = device_info.id, name = %device_info.name, "using capture device");
    let mut device = provider.open(device_info.id)?;

    let codec = QrCodec::new(&config.symbol)?;
    let mut receiver = Receiver::new(codec, config.inactivity(), config.loss_policy);
    receiver.run(device.as_mut())?;

    let report = receiver.report();
    if let Some(path) = &args.report {
        write_report(path, &report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    let stream = receiver.into_stream();
    write_stream(&args.output, &stream)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Received {} frames ({} bytes, digest {}), {} ordering anomalies",
        report.frames_accepted,
        report.bytes,
        report.digest,
        report.ordering_anomalies.len()
    );
    Ok(())
}
