//! On-disk layout of rendered frames.
//!
//! ```text
//! <root>/<source name up to first '.'>/0.png
//!                                      1.png
//!                                      ...
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::codec::SymbolCodec;
use crate::{Frame, Result, TransferError};

const FRAME_EXT: &str = "png";

/// Directory name for a source file: its file name up to the first `.`.
///
/// Dot-files (`.bashrc`) keep their full name.
pub fn frame_dir_name(source: &Path) -> Result<String> {
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TransferError::InvalidConfig(format!(
                "source path {} has no usable file name",
                source.display()
            ))
        })?;

    let stem = file_name.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        Ok(file_name.to_string())
    } else {
        Ok(stem.to_string())
    }
}

pub fn frame_dir(root: &Path, source: &Path) -> Result<PathBuf> {
    Ok(root.join(frame_dir_name(source)?))
}

/// Create `<root>/<name>` (and `root` itself) if missing, and remove any `<n>.png` left by an
/// earlier run so the directory holds only the frames about to be written.
pub fn prepare_frame_dir(root: &Path, source: &Path) -> Result<PathBuf> {
    let dir = frame_dir(root, source)?;
    std::fs::create_dir_all(&dir)?;

    let stale = clear_frames(&dir)?;
    if stale > 0 {
        warn!(dir = %dir.display(), removed = stale, "removed frames from a previous run");
    }
    Ok(dir)
}

/// Delete every `<n>.png` in `dir`. Other files are left alone.
pub fn clear_frames(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if frame_index(&path).is_some() {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Index of a frame image path, if it is named exactly `<n>.png` with no padding or sign.
pub fn frame_index(path: &Path) -> Option<u64> {
    if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(FRAME_EXT) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let index = stem.parse::<u64>().ok()?;
    (index.to_string() == stem).then_some(index)
}

/// `<dir>/<index>.png`, no zero padding.
pub fn frame_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{}.{}", index, FRAME_EXT))
}

/// Render every frame through `codec` and save it under `dir`.
pub fn write_frames<C: SymbolCodec + ?Sized>(
    codec: &C,
    frames: &[Frame],
    dir: &Path,
) -> Result<usize> {
    for frame in frames {
        let wire = frame.to_wire();
        let img = codec.render(wire.as_bytes())?;
        img.save(frame_path(dir, frame.index))?;
        info!(index = frame.index, len = wire.len(), "frame written");
    }
    Ok(frames.len())
}

/// Frame images in `dir`, sorted by numeric index.
///
/// Entries that are not exactly `<n>.png` (`01.png`, `+2.png`, `notes.txt`) are skipped. Gaps in the numbering are logged.
pub fn list_frame_images(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(index) = frame_index(&path) {
            images.push((index, path));
        }
    }

    images.sort_by_key(|(index, _)| *index);

    for (expected, (index, _)) in images.iter().enumerate() {
        if *index != expected as u64 {
            warn!(expected, found = *index, "frame numbering has a gap");
            break;
        }
    }

    Ok(images)
}
