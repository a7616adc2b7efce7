use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::board::PlaceholderBoard;
use crate::config::{resolve_start, ViewerConfig};
use crate::file_ops::{self, Rotation};
use crate::queue::{relay_completions, CompletionQueue};
use crate::render::{RenderPool, ThumbnailJob};
use crate::scanner::{scan_folder, ImageFile};
use crate::workspace::Workspace;
use crate::{Result, ThumbviewError};

/// Outcome of one thumbnail batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub generation: u64,
    /// Thumbnails the render pool produced.
    pub rendered: usize,
    /// Placeholders bound by the installer.
    pub bound: usize,
    /// Sources whose placeholder never got a thumbnail.
    pub pruned: Vec<ImageFile>,
    /// The batch was superseded before it finished; nothing was pruned.
    pub stale: bool,
}

/// Binds queued thumbnails to their placeholders until the relay has drained
/// the batch, then prunes every placeholder left empty.
///
/// Records of a superseded generation are discarded. Fails with
/// `NoImagesLeft` when pruning empties the active list.
pub fn install_placeholders(
    queue: &CompletionQueue,
    board: &PlaceholderBoard,
    generation: u64,
    folder: &Path,
) -> Result<BatchReport> {
    let mut report = BatchReport {
        generation,
        ..Default::default()
    };

    // pop blocks until a record arrives, and only gives up once the relay has drained
    while let Some(record) = queue.pop() {
        if board.bind(generation, &record)? {
            report.bound += 1;
        } else {
            log::debug!("Discarded thumbnail for {}", record.source.display());
        }
    }

    match board.prune_unbound(generation)? {
        Some(pruned) => {
            for source in &pruned {
                log::warn!("No thumbnail for {}, dropping it", source.display());
            }
            report.pruned = pruned;
        }
        None => {
            // A newer folder owns the board now, its own installer will prune
            report.stale = true;
            return Ok(report);
        }
    }

    if board.is_empty()? {
        return Err(ThumbviewError::NoImagesLeft(folder.to_path_buf()));
    }
    log::info!(
        "Thumbnails ready: {} bound, {} pruned",
        report.bound,
        report.pruned.len()
    );
    Ok(report)
}

/// The three background threads driving one batch: render driver, completion
/// relay and placeholder installer.
#[derive(Debug)]
pub struct ThumbnailBatch {
    generation: u64,
    renderer: JoinHandle<usize>,
    relay: JoinHandle<usize>,
    installer: JoinHandle<Result<BatchReport>>,
}

fn spawn_named<T, F>(name: &str, f: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(f)
        .map_err(ThumbviewError::WorkerSpawn)
}

impl ThumbnailBatch {
    pub fn start(
        pool: Arc<RenderPool>,
        board: PlaceholderBoard,
        generation: u64,
        folder: PathBuf,
        jobs: Vec<ThumbnailJob>,
        dest_dir: PathBuf,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let queue = CompletionQueue::new();

        // Consumer first, so nothing the relay pushes can go unseen
        let installer = {
            let queue = queue.clone();
            let board = board.clone();
            spawn_named("thumbview-installer", move || {
                install_placeholders(&queue, &board, generation, &folder)
            })?
        };

        let relay_queue = queue.clone();
        let relay = spawn_named("thumbview-relay", move || relay_completions(receiver, &relay_queue))
            .map_err(|e| {
                // Release the installer, it would otherwise wait forever
                queue.mark_drained();
                e
            })?;

        let renderer = spawn_named("thumbview-render-driver", move || {
            log::debug!("Rendering {} thumbnails into {}", jobs.len(), dest_dir.display());
            pool.run(&jobs, &dest_dir, &sender, || board.is_current(generation))
        })?;

        Ok(Self {
            generation,
            renderer,
            relay,
            installer,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.renderer.is_finished() && self.relay.is_finished() && self.installer.is_finished()
    }

    /// Waits for all three threads and returns the installer's report.
    pub fn join(self) -> Result<BatchReport> {
        let rendered = self
            .renderer
            .join()
            .map_err(|_| ThumbviewError::WorkerPanicked("render driver"))?;
        let relayed = self
            .relay
            .join()
            .map_err(|_| ThumbviewError::WorkerPanicked("completion relay"))?;
        let mut report = self
            .installer
            .join()
            .map_err(|_| ThumbviewError::WorkerPanicked("placeholder installer"))??;

        if rendered != relayed {
            log::warn!("Rendered {} thumbnails but relayed {}", rendered, relayed);
        }
        report.rendered = rendered;
        Ok(report)
    }
}

/// Owns the render pool, the thumbnail workspace and the placeholder board,
/// and runs one batch per opened folder.
pub struct Thumbnailer {
    pool: Arc<RenderPool>,
    board: PlaceholderBoard,
    workspace: Workspace,
    folder: Option<PathBuf>,
    batch: Option<ThumbnailBatch>,
}

impl Thumbnailer {
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        Self::with_workspace(config, Workspace::new()?)
    }

    pub fn with_workspace(config: &ViewerConfig, workspace: Workspace) -> Result<Self> {
        let pool = RenderPool::new(config.workers)?;
        log::debug!("Render pool with {} workers", pool.workers());
        Ok(Self {
            pool: Arc::new(pool),
            board: PlaceholderBoard::new(config.thumbnail_width),
            workspace,
            folder: None,
            batch: None,
        })
    }

    pub fn board(&self) -> &PlaceholderBoard {
        &self.board
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn workspace_dir(&self) -> Option<&Path> {
        self.workspace.path()
    }

    /// Scans `dir` and starts rendering its thumbnails.
    ///
    /// Any batch still running for the previous folder is superseded and
    /// joined before the workspace is recreated. Returns the new generation.
    pub fn open_folder(&mut self, dir: &Path) -> Result<u64> {
        let files = scan_folder(dir)?;
        if files.is_empty() {
            return Err(ThumbviewError::NoImagesLeft(dir.to_path_buf()));
        }
        log::info!("Opening {} ({} images)", dir.display(), files.len());

        // Bump the generation before joining, so old workers stop early
        let generation = self.board.begin_batch(files.clone())?;
        if let Some(previous) = self.batch.take() {
            match previous.join() {
                Ok(report) => log::debug!("Previous batch {} retired", report.generation),
                Err(e) => log::debug!("Previous batch ended with: {}", e),
            }
        }

        // Nothing writes into the old workspace anymore
        let dest_dir = self.workspace.recreate()?.to_path_buf();
        let width = self.board.thumbnail_width()?;
        let jobs = ThumbnailJob::batch(&files, width);

        self.batch = Some(ThumbnailBatch::start(
            Arc::clone(&self.pool),
            self.board.clone(),
            generation,
            dir.to_path_buf(),
            jobs,
            dest_dir,
        )?);
        self.folder = Some(dir.to_path_buf());
        Ok(generation)
    }

    /// Returns the batch report once all of its threads have exited.
    pub fn poll_batch(&mut self) -> Option<Result<BatchReport>> {
        if !self.batch.as_ref()?.is_finished() {
            return None;
        }
        self.batch.take().map(ThumbnailBatch::join)
    }

    /// Blocks until the running batch (if any) has finished.
    pub fn wait_batch(&mut self) -> Result<Option<BatchReport>> {
        self.batch.take().map(ThumbnailBatch::join).transpose()
    }

    /// Forgets a file that was deleted or moved away, dropping its thumbnail.
    pub fn remove_file(&mut self, source: &Path) -> Result<()> {
        if let Some(thumbnail) = self.board.remove(source)?.and_then(|p| p.thumbnail) {
            match fs::remove_file(&thumbnail) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", thumbnail.display(), e),
            }
        }
        if self.board.is_empty()? {
            let folder = self.folder.clone().unwrap_or_default();
            return Err(ThumbviewError::NoImagesLeft(folder));
        }
        Ok(())
    }

    /// Sorts `source` into `dest_dir`. A move also drops the file from the
    /// active list, and fails with `NoImagesLeft` when it was the last one. A
    /// copy leaves the list alone. Returns the path of the sorted file.
    pub fn move_file(&mut self, source: &Path, dest_dir: &Path, copy: bool) -> Result<PathBuf> {
        let dest = file_ops::relocate(source, dest_dir, copy)?;
        if copy || dest == source {
            return Ok(dest);
        }
        log::info!("Sorted {} into {}", source.display(), dest_dir.display());
        self.remove_file(source)?;
        Ok(dest)
    }

    /// Turns `source` a quarter turn on disk, along with its thumbnail.
    pub fn rotate_file(&mut self, source: &Path, rotation: Rotation) -> Result<()> {
        file_ops::rotate_in_place(source, rotation)?;
        // Turn the thumbnail too instead of rendering it again
        if let Some(thumbnail) = self.board.placeholder(source)?.and_then(|p| p.thumbnail) {
            file_ops::rotate_in_place(&thumbnail, rotation)?;
            self.board.refresh(source)?;
        }
        Ok(())
    }

    /// Waits for the running batch and removes the workspace. The
    /// thumbnailer keeps its board but has no workspace afterwards.
    pub fn finish(&mut self) -> Result<()> {
        // Join first, render workers may still be writing into the workspace
        if let Err(e) = self.wait_batch() {
            log::debug!("Batch ended with: {}", e);
        }
        self.workspace.purge()
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.finish()
    }
}

/// Runs a single batch for the folder of `start` without a window and waits
/// for it to finish.
pub fn check_folder(config: &ViewerConfig, start: &Path) -> Result<BatchReport> {
    let (folder, _) = resolve_start(start)?;
    let mut thumbnailer = Thumbnailer::new(config)?;
    thumbnailer.open_folder(&folder)?;
    let report = thumbnailer.wait_batch()?.unwrap_or_default();
    thumbnailer.shutdown()?;
    Ok(report)
}
