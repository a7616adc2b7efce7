use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Result, ThumbviewError};

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 250;
pub const DEFAULT_SCALE_STEP: f32 = 0.8;

#[derive(Parser, Clone, Debug)]
#[command(name = "thumbview")]
#[command(about = "Browse the images of a folder with background thumbnails")]
pub struct Args {
    /// Image to start with, or a folder
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[arg(short, long, default_value = "250")]
    pub thumbnail_width: u32,

    /// Render workers (defaults to the number of CPUs)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Folder the Sort button moves the current image into
    #[arg(long, value_name = "DIR")]
    pub sort_to: Option<PathBuf>,

    #[arg(long, help = "Copy instead of move when sorting")]
    pub copy_on_sort: bool,

    #[arg(long, help = "Enable debug output")]
    pub debug: bool,

    #[arg(long, help = "Render thumbnails once, report unreadable images and exit (don't show GUI)")]
    pub check: bool,
}

/// Settings threaded through the thumbnailer and the viewer window.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub thumbnail_width: u32,
    /// Factor applied to the thumbnail width per shrink step.
    pub scale_step: f32,
    pub workers: usize,
    pub sort_folder: Option<PathBuf>,
    pub copy_on_sort: bool,
    pub debug: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            scale_step: DEFAULT_SCALE_STEP,
            workers: num_cpus::get(),
            sort_folder: None,
            copy_on_sort: false,
            debug: false,
        }
    }
}

impl ViewerConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.thumbnail_width == 0 {
            return Err(ThumbviewError::InvalidThumbnailWidth(args.thumbnail_width));
        }
        Ok(Self {
            thumbnail_width: args.thumbnail_width,
            workers: args.workers.unwrap_or_else(num_cpus::get).max(1),
            sort_folder: args.sort_to.clone(),
            copy_on_sort: args.copy_on_sort,
            debug: args.debug,
            ..Default::default()
        })
    }
}

/// Folder to open for a start path: a file opens its parent, a folder opens
/// itself.
pub fn resolve_start(path: &Path) -> Result<(PathBuf, Option<PathBuf>)> {
    let invalid = || ThumbviewError::InvalidStartPath(path.to_path_buf());
    // Canonical, so scanned paths and the start file compare equal
    let canonical = fs::canonicalize(path).map_err(|_| invalid())?;
    if canonical.is_dir() {
        return Ok((canonical, None));
    }
    if !canonical.is_file() {
        return Err(invalid());
    }

    // Keep the name as given: a symlinked start file is listed under that name
    let name = path.file_name().ok_or_else(invalid)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let folder = fs::canonicalize(parent).map_err(|_| invalid())?;
    Ok((folder.clone(), Some(folder.join(name))))
}

/// Sets up `env_logger`; `RUST_LOG` wins over `debug`.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "warn,thumbview=debug" } else { "warn,thumbview=info" };
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Seconds))
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialised");
    }
}
