//! Playback of rendered frames on a display device.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use image::GrayImage;
use tracing::{info, warn};

use crate::layout::list_frame_images;
use crate::{Result, TransferError};

pub trait DisplayDevice {
    fn show(&mut self, index: u64, image: &GrayImage) -> Result<()>;
}

/// Shows frames in order at a fixed rate.
#[derive(Debug, Clone, Copy)]
pub struct Presenter {
    interval: Duration,
    lead_in: Duration,
}

impl Presenter {
    pub fn new(frames_per_second: f64, lead_in: Duration) -> Result<Self> {
        if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
            return Err(TransferError::InvalidConfig(format!(
                "frames per second must be positive, got {}",
                frames_per_second
            )));
        }
        let interval = Duration::try_from_secs_f64(1.0 / frames_per_second).map_err(|e| {
            TransferError::InvalidConfig(format!(
                "frames per second {} gives no usable frame interval: {}",
                frames_per_second, e
            ))
        })?;
        Ok(Presenter { interval, lead_in })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Play every `<n>.png` in `dir` in numeric order. Returns the number of frames shown.
    pub fn present_dir(&self, dir: &Path, display: &mut dyn DisplayDevice) -> Result<usize> {
        let images = list_frame_images(dir)?;
        if images.is_empty() {
            warn!(dir = %dir.display(), "no frame images to present");
            return Ok(0);
        }

        let total = images.len();
        std::thread::sleep(self.lead_in);

        for (pos, (index, path)) in images.into_iter().enumerate() {
            let img = image::open(&path)?.to_luma8();
            info!("showing image: {}/{}", pos, total);
            display.show(index, &img)?;
            std::thread::sleep(self.interval);
        }

        Ok(total)
    }
}

/// Draws frames on a terminal with Unicode half blocks, two pixel rows per text line.
///
/// Light pixels are drawn as filled cells, so the terminal background should be dark.
pub struct TerminalDisplay<W: Write> {
    out: W,
    cell_px: u32,
}

impl<W: Write> TerminalDisplay<W> {
    /// `cell_px`: image pixels per terminal column (use the symbol's module scale).
    pub fn new(out: W, cell_px: u32) -> Self {
        TerminalDisplay {
            out,
            cell_px: cell_px.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn light(image: &GrayImage, x: u32, y: u32) -> bool {
        y < image.height() && image.get_pixel(x, y).0[0] >= 128
    }
}

impl<W: Write> DisplayDevice for TerminalDisplay<W> {
    fn show(&mut self, index: u64, image: &GrayImage) -> Result<()> {
        let step = self.cell_px;
        let mut screen = String::from("\x1b[2J\x1b[H");

        let mut y = 0;
        while y < image.height() {
            let mut x = 0;
            while x < image.width() {
                let top = Self::light(image, x, y);
                let bottom = Self::light(image, x, y + step);
                screen.push(match (top, bottom) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
                x += step;
            }
            screen.push('\n');
            y += step * 2;
        }
        screen.push_str(&format!("frame {}\n", index));

        self.out.write_all(screen.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
