//! Capture devices and device enumeration.
//!
//! Devices are obtained through a [`CaptureDeviceProvider`] so the receiver never probes
//! hardware handles itself, and a recorded or synthetic feed can stand in for a camera.

use std::collections::VecDeque;
use std::path::PathBuf;

use image::GrayImage;
use tracing::{debug, info, warn};

use crate::layout::list_frame_images;
use crate::{Result, TransferError};

/// A source of sampled images, one per polling cycle.
pub trait CaptureDevice {
    /// Block until the next image is available.
    ///
    /// Returns `Ok(None)` once a finite feed has no more images.
    fn next_frame(&mut self) -> Result<Option<GrayImage>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: usize,
    pub name: String,
}

pub trait CaptureDeviceProvider {
    /// Devices that can currently be opened.
    fn devices(&self) -> Vec<DeviceInfo>;

    fn open(&self, id: usize) -> Result<Box<dyn CaptureDevice>>;
}

/// Pick the requested device if it is available, otherwise the first one.
///
/// # Errors
/// - `TransferError::NoCaptureDevice` when the provider has nothing to offer.
pub fn select_device(
    provider: &dyn CaptureDeviceProvider,
    requested: Option<usize>,
) -> Result<DeviceInfo> {
    debug!("identifying capture devices...");
    let devices = provider.devices();
    debug!(count = devices.len(), "identified capture devices");

    let first = devices.first().cloned().ok_or(TransferError::NoCaptureDevice)?;

    match requested {
        Some(id) => match devices.into_iter().find(|d| d.id == id) {
            Some(device) => Ok(device),
            None => {
                warn!(
                    requested = id,
                    fallback = first.id,
                    "requested capture device not found, using the first one"
                );
                Ok(first)
            }
        },
        None => Ok(first),
    }
}

enum Sample {
    Path(PathBuf),
    Image(GrayImage),
}

/// Replays a finite sequence of images, each sampled `samples_per_image` times in a row.
///
/// A camera watching a slideshow sees every symbol several times; repeating each image
/// reproduces that for recorded feeds.
pub struct ImageSequenceDevice {
    pending: VecDeque<Sample>,
    samples_per_image: u32,
    current: Option<GrayImage>,
    repeats_left: u32,
}

impl ImageSequenceDevice {
    /// Replay `<n>.png` files from `dir` in numeric order.
    pub fn open_dir(dir: &std::path::Path, samples_per_image: u32) -> Result<Self> {
        let images = list_frame_images(dir)?;
        info!(dir = %dir.display(), images = images.len(), "opened image sequence");
        Self::build(
            images.into_iter().map(|(_, p)| Sample::Path(p)).collect(),
            samples_per_image,
        )
    }

    pub fn from_images(images: Vec<GrayImage>, samples_per_image: u32) -> Result<Self> {
        Self::build(
            images.into_iter().map(Sample::Image).collect(),
            samples_per_image,
        )
    }

    fn build(pending: VecDeque<Sample>, samples_per_image: u32) -> Result<Self> {
        if samples_per_image == 0 {
            return Err(TransferError::InvalidConfig(
                "samples per image must be at least 1".into(),
            ));
        }
        Ok(ImageSequenceDevice {
            pending,
            samples_per_image,
            current: None,
            repeats_left: 0,
        })
    }
}

impl CaptureDevice for ImageSequenceDevice {
    fn next_frame(&mut self) -> Result<Option<GrayImage>> {
        if self.repeats_left > 0 {
            if let Some(img) = &self.current {
                self.repeats_left -= 1;
                return Ok(Some(img.clone()));
            }
        }

        let img = match self.pending.pop_front() {
            Some(Sample::Path(path)) => image::open(&path)?.to_luma8(),
            Some(Sample::Image(img)) => img,
            None => {
                self.current = None;
                return Ok(None);
            }
        };

        self.repeats_left = self.samples_per_image - 1;
        self.current = Some(img.clone());
        Ok(Some(img))
    }
}

/// Each directory of recorded samples is one device; its id is its position in the list.
pub struct ImageSequenceProvider {
    dirs: Vec<PathBuf>,
    samples_per_image: u32,
}

impl ImageSequenceProvider {
    pub fn new(dirs: Vec<PathBuf>, samples_per_image: u32) -> Self {
        ImageSequenceProvider {
            dirs,
            samples_per_image,
        }
    }
}

impl CaptureDeviceProvider for ImageSequenceProvider {
    fn devices(&self) -> Vec<DeviceInfo> {
        self.dirs
            .iter()
            .enumerate()
            .filter(|(_, dir)| dir.is_dir())
            .map(|(id, dir)| DeviceInfo {
                id,
                name: dir.display().to_string(),
            })
            .collect()
    }

    fn open(&self, id: usize) -> Result<Box<dyn CaptureDevice>> {
        let dir = self.dirs.get(id).ok_or(TransferError::NoCaptureDevice)?;
        Ok(Box::new(ImageSequenceDevice::open_dir(
            dir,
            self.samples_per_image,
        )?))
    }
}
