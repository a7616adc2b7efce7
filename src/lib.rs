use std::path::PathBuf;

pub mod app;
pub mod board;
pub mod config;
pub mod file_ops;
pub mod pipeline;
pub mod queue;
pub mod render;
pub mod scanner;
pub mod workspace;

pub use app::ViewerApp;
pub use board::{display_size, Direction, Placeholder, PlaceholderBoard};
pub use config::{init_logging, resolve_start, Args, ViewerConfig};
pub use file_ops::{describe, human_size, relocate, rotate_in_place, ImageDetails, Rotation};
pub use pipeline::{check_folder, install_placeholders, BatchReport, ThumbnailBatch, Thumbnailer};
pub use queue::{relay_completions, CompletionQueue};
pub use render::{render_thumbnail, thumbnail_height, RenderFailure, RenderMessage, RenderPool, ThumbnailJob, ThumbnailRecord};
pub use scanner::{is_image_file, scan_folder, ImageFile, IMAGE_EXTENSIONS};
pub use workspace::Workspace;

#[derive(Debug, thiserror::Error)]
pub enum ThumbviewError {
    #[error("Failed to create thread pool: {0}")]
    ThreadPoolCreation(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to start background worker: {0}")]
    WorkerSpawn(std::io::Error),

    #[error("Background worker panicked: {0}")]
    WorkerPanicked(&'static str),

    #[error("Failed to create thumbnail workspace: {0}")]
    WorkspaceCreation(std::io::Error),

    #[error("Failed to remove thumbnail workspace: {0}")]
    WorkspaceRemoval(std::io::Error),

    #[error("Failed to read folder {path}: {source}")]
    FolderScan {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not an image or folder: {0}")]
    InvalidStartPath(PathBuf),

    #[error("Thumbnail width must be positive, got {0}")]
    InvalidThumbnailWidth(u32),

    #[error("No readable images left in {0}")]
    NoImagesLeft(PathBuf),

    #[error("Failed to process image {path}: {source}")]
    ImageAccess {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Lock acquisition failed")]
    LockAcquisition,
}

pub type Result<T> = std::result::Result<T, ThumbviewError>;
