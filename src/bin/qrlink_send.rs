//! Encode a file into a directory of QR frame images.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use qrlink_protocol::codec::QrCodec;
use qrlink_protocol::config::TransferConfig;
use qrlink_protocol::encoder::encode_path;
use qrlink_protocol::layout::{prepare_frame_dir, write_frames};
use qrlink_protocol::logging;

#[derive(Parser)]
#[command(name = "qrlink-send")]
#[command(about = "Create QR code frames for the chunks of a file")]
#[command(version)]
struct Args {
    /// File to transfer
    #[arg(short, long)]
    file: PathBuf,

    /// Root directory for frame images; frames land in <QR_DIR>/<file name>/
    #[arg(short, long)]
    qr_dir: PathBuf,

    /// Payload bytes per frame, not counting the 8-byte index [default: 1024]
    #[arg(short, long)]
    block_size: Option<usize>,

    /// TOML transfer configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut config = TransferConfig::load_or_default(args.config.as_deref())
        .context("Failed to load transfer configuration")?;
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
    config.validate()?;

    let codec = QrCodec::new(&config.symbol)?;

    let frames = encode_path(&args.file, config.block_size)
        .with_context(|| format!("Failed to encode {}", args.file.display()))?;

    let dir = prepare_frame_dir(&args.qr_dir, &args.file)
        .with_context(|| format!("Failed to create frame directory under {}", args.qr_dir.display()))?;

    let written = write_frames(&codec, &frames, &dir)?;

    println!("Wrote {} frames to {}", written, dir.display());
    Ok(())
}
