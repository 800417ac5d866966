//! Play a directory of QR frame images on the terminal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use qrlink_protocol::config::TransferConfig;
use qrlink_protocol::logging;
use qrlink_protocol::presenter::{Presenter, TerminalDisplay};

#[derive(Parser)]
#[command(name = "qrlink-play")]
#[command(about = "Play QR code frames to the screen in sequence")]
#[command(version)]
struct Args {
    /// Directory holding 0.png, 1.png, ...
    #[arg(short, long)]
    dir: PathBuf,

    /// Frames per second [default: 1]
    #[arg(short, long)]
    freq: Option<f64>,

    /// Pause before the first frame, in milliseconds [default: 5000]
    #[arg(long)]
    lead_in_ms: Option<u64>,

    /// Image pixels per terminal column [default: symbol module scale]
    #[arg(long)]
    cell_px: Option<u32>,

    /// TOML transfer configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut config = TransferConfig::load_or_default(args.config.as_deref())
        .context("Failed to load transfer configuration")?;
    if let Some(freq) = args.freq {
        config.frames_per_second = freq;
    }
    if let Some(lead_in_ms) = args.lead_in_ms {
        config.lead_in_ms = lead_in_ms;
    }
    config.validate()?;

    let presenter = Presenter::new(config.frames_per_second, config.lead_in())?;
    let cell_px = args.cell_px.unwrap_or(config.symbol.module_scale);
    let mut display = TerminalDisplay::new(std::io::stdout().lock(), cell_px);

    let shown = presenter
        .present_dir(&args.dir, &mut display)
        .with_context(|| format!("Failed to play frames from {}", args.dir.display()))?;

    tracing::info!(frames = shown, "playback finished");
    Ok(())
}
