use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{Result, ThumbviewError};

/// Extensions the viewer can decode, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "pbm", "pgm", "ppm", "jpg", "jpeg", "png", "gif"];

/// Absolute path of a source image as listed in the active folder.
pub type ImageFile = PathBuf;

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext_str| IMAGE_EXTENSIONS.iter().any(|&valid_ext| valid_ext.eq_ignore_ascii_case(ext_str)))
        .unwrap_or(false)
}

/// Lists the supported images directly inside `dir`, sorted ascending.
///
/// Entries are returned under their own names in the folder. Several entries
/// resolving to the same file (symlinks) collapse into one. Unreadable
/// entries are skipped; only an unreadable `dir` itself is an error.
pub fn scan_folder(dir: &Path) -> Result<Vec<ImageFile>> {
    let scan_error = |source| ThumbviewError::FolderScan {
        path: dir.to_path_buf(),
        source,
    };
    let root = fs::canonicalize(dir).map_err(scan_error)?;
    fs::read_dir(&root).map_err(scan_error)?;

    // Resolved target -> listed entry
    let mut found: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
    for entry in WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let listed = entry.path();
        if !is_image_file(listed) {
            continue;
        }
        let target = match fs::canonicalize(listed) {
            Ok(target) => target,
            Err(e) => {
                log::debug!("Skipping {}: {}", listed.display(), e);
                continue;
            }
        };
        // A link named like an image may still point at something we can't show
        if !is_image_file(&target) {
            log::debug!("Skipping link to {}", target.display());
            continue;
        }

        // First name wins, except that the real file beats any link to it
        let is_real = target.as_path() == listed;
        if found.contains_key(&target) && !is_real {
            log::debug!("{} duplicates {}", listed.display(), target.display());
        } else {
            found.insert(target, listed.to_path_buf());
        }
    }

    let mut files: Vec<ImageFile> = found.into_values().collect();
    files.sort();
    log::debug!("Found {} images in {}", files.len(), root.display());
    Ok(files)
}
