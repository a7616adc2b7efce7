use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::render::ThumbnailRecord;
use crate::scanner::ImageFile;
use crate::{Result, ThumbviewError};

/// UI-side stand-in for one source image.
///
/// Created empty before a batch starts and bound at most once when its
/// thumbnail arrives. Placeholders that never get bound are pruned when the
/// batch finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub source: ImageFile,
    pub thumbnail: Option<PathBuf>,
    /// Pixel dimensions of the generated thumbnail file.
    pub thumbnail_size: Option<[u32; 2]>,
    /// Size to draw at, derived from the current thumbnail width.
    pub display_size: Option<[f32; 2]>,
    /// Bumped whenever the thumbnail file changes on disk.
    pub revision: u64,
}

impl Placeholder {
    fn empty(source: ImageFile) -> Self {
        Self {
            source,
            thumbnail: None,
            thumbnail_size: None,
            display_size: None,
            revision: 0,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.thumbnail.is_some()
    }

    fn refresh_display(&mut self, width: u32) {
        self.display_size = self
            .thumbnail_size
            .map(|[w, h]| display_size(w, h, width));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Aspect-preserving draw size for a `width` x `height` thumbnail shown
/// `target_width` wide.
pub fn display_size(width: u32, height: u32, target_width: u32) -> [f32; 2] {
    let target = target_width as f32;
    if width == 0 {
        return [target, target];
    }
    [target, target * height as f32 / width as f32]
}

#[derive(Debug)]
struct BoardState {
    files: Vec<ImageFile>,
    placeholders: Vec<Placeholder>,
    base_width: u32,
    thumbnail_width: u32,
    generation: u64,
}

/// The active file list and its placeholders, shared between the UI thread
/// and the placeholder installer.
#[derive(Clone, Debug)]
pub struct PlaceholderBoard {
    inner: Arc<RwLock<BoardState>>,
}

impl PlaceholderBoard {
    pub fn new(thumbnail_width: u32) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BoardState {
                files: Vec::new(),
                placeholders: Vec::new(),
                base_width: thumbnail_width,
                thumbnail_width,
                generation: 0,
            })),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BoardState>> {
        self.inner.read().map_err(|_| ThumbviewError::LockAcquisition)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BoardState>> {
        self.inner.write().map_err(|_| ThumbviewError::LockAcquisition)
    }

    /// Replaces the active list with `files`, creates one empty placeholder per
    /// file and starts a new generation. Older generations become stale.
    pub fn begin_batch(&self, files: Vec<ImageFile>) -> Result<u64> {
        // Keep the first occurrence, order is the scan order
        let mut seen = HashSet::new();
        let files: Vec<ImageFile> = files.into_iter().filter(|f| seen.insert(f.clone())).collect();

        let mut state = self.write()?;
        state.generation += 1;
        state.placeholders = files.iter().cloned().map(Placeholder::empty).collect();
        state.files = files;
        Ok(state.generation)
    }

    pub fn generation(&self) -> Result<u64> {
        Ok(self.read()?.generation)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        // Poisoned counts as stale
        self.read().map(|s| s.generation == generation).unwrap_or(false)
    }

    /// Attaches `record` to its placeholder. Returns false when the
    /// generation is stale, the source is unknown or the placeholder was
    /// already bound.
    pub fn bind(&self, generation: u64, record: &ThumbnailRecord) -> Result<bool> {
        // Read the file before taking the lock, the UI thread shares it
        let dimensions = match image::image_dimensions(&record.thumbnail) {
            Ok((w, h)) => [w, h],
            Err(e) => {
                log::warn!("Unreadable thumbnail {}: {}", record.thumbnail.display(), e);
                return Ok(false);
            }
        };

        // Generation check and binding happen under one write lock
        let mut state = self.write()?;
        if state.generation != generation {
            return Ok(false);
        }
        let width = state.thumbnail_width;
        let Some(placeholder) = state
            .placeholders
            .iter_mut()
            .find(|p| p.source == record.source)
        else {
            return Ok(false);
        };
        if placeholder.is_bound() {
            return Ok(false);
        }

        placeholder.thumbnail = Some(record.thumbnail.clone());
        placeholder.thumbnail_size = Some(dimensions);
        placeholder.revision += 1;
        placeholder.refresh_display(width);
        Ok(true)
    }

    /// Removes every placeholder that is still empty, together with its entry
    /// in the active list. Returns `None` for a stale generation.
    pub fn prune_unbound(&self, generation: u64) -> Result<Option<Vec<ImageFile>>> {
        let mut state = self.write()?;
        if state.generation != generation {
            return Ok(None);
        }
        let (kept, pruned): (Vec<Placeholder>, Vec<Placeholder>) =
            state.placeholders.drain(..).partition(Placeholder::is_bound);
        state.placeholders = kept;

        let pruned: Vec<ImageFile> = pruned.into_iter().map(|p| p.source).collect();
        state.files.retain(|f| !pruned.contains(f));
        Ok(Some(pruned))
    }

    /// Drops `source` from the active list and returns its placeholder.
    pub fn remove(&self, source: &Path) -> Result<Option<Placeholder>> {
        let mut state = self.write()?;
        state.files.retain(|f| f != source);
        let position = state.placeholders.iter().position(|p| p.source == source);
        Ok(position.map(|i| state.placeholders.remove(i)))
    }

    /// Re-reads the thumbnail of `source` after it changed on disk.
    pub fn refresh(&self, source: &Path) -> Result<bool> {
        let Some(thumbnail) = self.placeholder(source)?.and_then(|p| p.thumbnail) else {
            return Ok(false);
        };
        let dimensions = match image::image_dimensions(&thumbnail) {
            Ok((w, h)) => [w, h],
            Err(e) => {
                log::warn!("Unreadable thumbnail {}: {}", thumbnail.display(), e);
                return Ok(false);
            }
        };

        let mut state = self.write()?;
        let width = state.thumbnail_width;
        match state.placeholders.iter_mut().find(|p| p.source == source) {
            Some(placeholder) => {
                placeholder.thumbnail_size = Some(dimensions);
                placeholder.revision += 1;
                placeholder.refresh_display(width);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn thumbnail_width(&self) -> Result<u32> {
        Ok(self.read()?.thumbnail_width)
    }

    pub fn set_thumbnail_width(&self, width: u32) -> Result<()> {
        let mut state = self.write()?;
        state.thumbnail_width = width.max(1);
        let width = state.thumbnail_width;
        for placeholder in &mut state.placeholders {
            placeholder.refresh_display(width);
        }
        Ok(())
    }

    /// Resizes every thumbnail to `coefficient` times the configured width.
    pub fn scale_thumbnails(&self, coefficient: f32) -> Result<()> {
        // Relative to the configured width, so repeated steps don't drift
        let base = self.read()?.base_width;
        let width = (base as f32 * coefficient).round().max(1.0) as u32;
        self.set_thumbnail_width(width)
    }

    pub fn files(&self) -> Result<Vec<ImageFile>> {
        Ok(self.read()?.files.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.files.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn snapshot(&self) -> Result<Vec<Placeholder>> {
        Ok(self.read()?.placeholders.clone())
    }

    pub fn placeholder(&self, source: &Path) -> Result<Option<Placeholder>> {
        Ok(self
            .read()?
            .placeholders
            .iter()
            .find(|p| p.source == source)
            .cloned())
    }

    /// Next or previous file in the active list, clamped at both ends.
    /// An unknown `current` resolves to the first file.
    pub fn neighbor(&self, current: &Path, direction: Direction) -> Result<Option<ImageFile>> {
        let state = self.read()?;
        // Empty list: first() is None, which is what we want
        let Some(index) = state.files.iter().position(|f| f == current) else {
            return Ok(state.files.first().cloned());
        };
        let target = match direction {
            Direction::Next => (index + 1).min(state.files.len() - 1),
            Direction::Previous => index.saturating_sub(1),
        };
        Ok(state.files.get(target).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_poisoned_board_reports_lock_failure() {
        let board = PlaceholderBoard::new(100);
        board.begin_batch(vec![PathBuf::from("/a.png")]).unwrap();

        let holder = board.clone();
        let _ = thread::spawn(move || {
            let _guard = holder.inner.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(matches!(board.len(), Err(ThumbviewError::LockAcquisition)));
        assert!(matches!(board.is_empty(), Err(ThumbviewError::LockAcquisition)));
        assert!(!board.is_current(1));
    }
}
