use image::imageops::FilterType;
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use crate::scanner::ImageFile;
use crate::Result;

/// Request to render one source image at a given width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailJob {
    pub source: ImageFile,
    pub target_width: u32,
}

impl ThumbnailJob {
    pub fn batch(files: &[ImageFile], target_width: u32) -> Vec<ThumbnailJob> {
        files
            .iter()
            .map(|source| ThumbnailJob {
                source: source.clone(),
                target_width,
            })
            .collect()
    }
}

/// A finished thumbnail: which source it belongs to and where it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRecord {
    pub source: ImageFile,
    pub thumbnail: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderFailure {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to write thumbnail {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Image has no pixels: {0}")]
    Empty(PathBuf),

    #[error("Source has no file name: {0}")]
    MissingFileName(PathBuf),
}

/// Messages flowing from the render pool to the completion relay.
#[derive(Debug)]
pub enum RenderMessage {
    Rendered(ThumbnailRecord),
    BatchComplete,
}

/// Height of a width-anchored thumbnail, never less than one pixel.
pub fn thumbnail_height(source_width: u32, source_height: u32, target_width: u32) -> u32 {
    if source_width == 0 {
        return 1;
    }
    let height = source_height as f64 * target_width as f64 / source_width as f64;
    (height.round() as u32).max(1)
}

/// Scales `job.source` to `job.target_width` and writes it into `dest_dir`
/// under the source's file name. File names are unique within one folder, so
/// a batch never writes the same thumbnail twice.
pub fn render_thumbnail(job: &ThumbnailJob, dest_dir: &Path) -> std::result::Result<ThumbnailRecord, RenderFailure> {
    let source = &job.source;
    let file_name = source
        .file_name()
        .ok_or_else(|| RenderFailure::MissingFileName(source.clone()))?;

    // Sniff the content rather than trusting the extension
    let img = image::io::Reader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| RenderFailure::Io {
            path: source.clone(),
            source: e,
        })?
        .decode()
        .map_err(|e| RenderFailure::Decode {
            path: source.clone(),
            source: e,
        })?;

    if img.width() == 0 || img.height() == 0 || job.target_width == 0 {
        return Err(RenderFailure::Empty(source.clone()));
    }

    // Width-anchored: small sources are scaled up too
    let height = thumbnail_height(img.width(), img.height(), job.target_width);
    let thumbnail = img.resize_exact(job.target_width, height, FilterType::Triangle);

    // The extension picks the encoder, so the thumbnail keeps the source format
    let dest = dest_dir.join(file_name);
    thumbnail.save(&dest).map_err(|e| RenderFailure::Encode {
        path: dest.clone(),
        source: e,
    })?;

    Ok(ThumbnailRecord {
        source: source.clone(),
        thumbnail: dest,
    })
}

/// Fixed-size worker pool that renders whole batches.
pub struct RenderPool {
    pool: rayon::ThreadPool,
}

impl RenderPool {
    pub fn new(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("thumbview-render-{}", i))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Renders every job, sending one `Rendered` per success and then a single
    /// `BatchComplete` once all workers are done.
    ///
    /// Blocks the calling thread until the whole batch has run. Jobs picked up
    /// after `is_current` turns false are skipped without rendering. Returns the
    /// number of thumbnails sent.
    pub fn run<F>(&self, jobs: &[ThumbnailJob], dest_dir: &Path, sender: &Sender<RenderMessage>, is_current: F) -> usize
    where
        F: Fn() -> bool + Sync,
    {
        let is_current = &is_current;
        let worker_sender = sender.clone();
        let rendered = self.pool.install(move || {
            jobs.par_iter()
                .map_with(worker_sender, |sender, job| {
                    // Superseded by a newer folder, leave the rest of the batch
                    if !is_current() {
                        return 0;
                    }
                    match render_thumbnail(job, dest_dir) {
                        Ok(record) => {
                            log::debug!("Rendered thumbnail for {}", record.source.display());
                            // A closed channel means nobody is listening anymore
                            usize::from(sender.send(RenderMessage::Rendered(record)).is_ok())
                        }
                        Err(e) => {
                            log::warn!("{}", e);
                            0
                        }
                    }
                })
                .sum::<usize>()
        });

        // Every worker has returned by now, so nothing can follow this message
        if sender.send(RenderMessage::BatchComplete).is_err() {
            log::debug!("Completion relay went away before the batch finished");
        }
        rendered
    }
}

impl std::fmt::Debug for RenderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPool")
            .field("workers", &self.workers())
            .finish()
    }
}
