use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Result, ThumbviewError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Rewrites the image at `path` turned a quarter turn.
pub fn rotate_in_place(path: &Path, rotation: Rotation) -> Result<()> {
    // Re-encoded with the format implied by the extension
    let edit_error = |source| ThumbviewError::ImageAccess {
        path: path.to_path_buf(),
        source,
    };
    let img = image::open(path).map_err(edit_error)?;
    let rotated = match rotation {
        Rotation::Clockwise => img.rotate90(),
        Rotation::CounterClockwise => img.rotate270(),
    };
    rotated.save(path).map_err(edit_error)?;
    log::debug!("Rotated {} {:?}", path.display(), rotation);
    Ok(())
}

/// Short description of an image file for the info line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetails {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

impl std::fmt::Display for ImageDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}x{}, {}",
            self.name,
            self.width,
            self.height,
            human_size(self.bytes)
        )
    }
}

pub fn describe(path: &Path) -> Result<ImageDetails> {
    let (width, height) = image::image_dimensions(path).map_err(|source| ThumbviewError::ImageAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = fs::metadata(path)
        .map_err(|source| ThumbviewError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    // Fall back to the whole path for names like ".."
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    Ok(ImageDetails {
        name,
        width,
        height,
        bytes,
    })
}

/// Moves `source` into `dest_dir`, or copies it when `copy` is set, keeping
/// its file name. An existing file of that name is replaced. Returns the new
/// path; when that is `source` itself nothing is touched.
pub fn relocate(source: &Path, dest_dir: &Path, copy: bool) -> Result<PathBuf> {
    let access_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ThumbviewError::FileAccess { path, source }
    };
    let file_name = source.file_name().ok_or_else(|| {
        access_error(source)(io::Error::new(io::ErrorKind::InvalidInput, "no file name"))
    })?;
    let dest_dir = fs::canonicalize(dest_dir).map_err(access_error(dest_dir))?;
    let dest = dest_dir.join(file_name);

    // Sorting into the folder the file already lives in; copying onto itself would truncate it
    let resolved = fs::canonicalize(source).map_err(access_error(source))?;
    if dest == source || dest == resolved {
        log::debug!("{} is already in {}", source.display(), dest_dir.display());
        return Ok(dest);
    }

    if copy {
        fs::copy(source, &dest).map_err(access_error(&dest))?;
        log::debug!("Copied {} to {}", source.display(), dest.display());
        return Ok(dest);
    }

    // rename fails across filesystems; fall back to copy and delete
    if let Err(e) = fs::rename(source, &dest) {
        log::debug!("Rename of {} failed ({}), copying instead", source.display(), e);
        fs::copy(source, &dest).map_err(access_error(&dest))?;
        fs::remove_file(source).map_err(access_error(source))?;
    }
    log::debug!("Moved {} to {}", source.display(), dest.display());
    Ok(dest)
}

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

pub fn human_size(bytes: u64) -> String {
    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    }
}
