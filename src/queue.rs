use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::render::{RenderMessage, ThumbnailRecord};

/// Unbounded queue of finished thumbnails shared by the completion relay
/// (producer) and the placeholder installer (consumer).
#[derive(Clone, Debug, Default)]
pub struct CompletionQueue {
    inner: Arc<QueueInner>,
}

#[derive(Debug, Default)]
struct QueueInner {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

#[derive(Debug, Default)]
struct QueueState {
    records: VecDeque<ThumbnailRecord>,
    drained: bool,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, record: ThumbnailRecord) {
        let mut state = self.lock();
        // Past the drained point the installer may already have pruned
        if state.drained {
            log::warn!("Dropping late thumbnail for {}", record.source.display());
            return;
        }
        state.records.push_back(record);
        self.inner.condvar.notify_one();
    }

    /// Marks the batch as fully relayed. Monotone: never reopens.
    pub fn mark_drained(&self) {
        let mut state = self.lock();
        state.drained = true;
        self.inner.condvar.notify_all();
    }

    pub fn is_drained(&self) -> bool {
        self.lock().drained
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until a record is available. Returns `None` only once the queue
    /// is drained and empty; both are checked under the same lock.
    pub fn pop(&self) -> Option<ThumbnailRecord> {
        let mut state = self.lock();
        loop {
            if let Some(record) = state.records.pop_front() {
                return Some(record);
            }
            if state.drained {
                return None;
            }
            // Spurious wakeups just go round the loop again
            state = self
                .inner
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Drains render messages into `queue` until the batch-complete signal.
///
/// A disconnected channel counts as completion, so the installer can never be
/// left waiting on a relay whose pool died. Returns the number of records
/// relayed.
pub fn relay_completions(receiver: Receiver<RenderMessage>, queue: &CompletionQueue) -> usize {
    let mut relayed = 0;
    loop {
        match receiver.recv() {
            Ok(RenderMessage::Rendered(record)) => {
                queue.push(record);
                relayed += 1;
            }
            Ok(RenderMessage::BatchComplete) => break,
            Err(_) => {
                log::warn!("Render pool hung up without completing the batch");
                break;
            }
        }
    }
    queue.mark_drained();
    log::debug!("Relayed {} thumbnails", relayed);
    relayed
}
