//! Deferred buffer uploads.
//!
//! Any thread may queue bytes for a buffer with [`TransferQueue::enqueue`].
//! The render thread applies them in submission order with
//! [`TransferQueue::flush`]. Dropping the queue flushes what is left.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GpuBackend, GpuBuffer};
use crate::error::GraphicsError;
use crate::resources::Buffer;

/// One queued upload.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TransferEntry {
    target: GpuBuffer,
    target_offset: u64,
    data: Vec<u8>,
}

/// A thread-safe queue of buffer uploads.
pub struct TransferQueue {
    backend: Arc<dyn GpuBackend>,
    queued: Mutex<Vec<TransferEntry>>,
}

impl TransferQueue {
    /// Create an empty queue writing through `backend`.
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            backend,
            queued: Mutex::new(Vec::new()),
        }
    }

    /// Queue `data` to be written to `buffer` at `offset`.
    ///
    /// Fails without queueing if the write would not fit in the buffer.
    pub fn enqueue(
        &self,
        buffer: &Buffer,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<(), GraphicsError> {
        let target = *buffer.gpu();
        let end = offset.checked_add(data.len() as u64);
        if end.is_none_or(|end| end > target.size()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "transfer of {} bytes at offset {offset} exceeds buffer {:?} of {} bytes",
                data.len(),
                buffer.label(),
                target.size()
            )));
        }

        let mut queued = self.queued.lock();
        log::trace!(
            "queued buffer {} transfer offset = {} size = {}",
            target.id(),
            offset,
            data.len()
        );
        queued.push(TransferEntry {
            target,
            target_offset: offset,
            data,
        });
        Ok(())
    }

    /// Write every queued upload in submission order and empty the queue.
    ///
    /// The lock is held for the whole drain, so uploads queued concurrently
    /// wait for the next flush.
    pub fn flush(&self) {
        let mut queued = self.queued.lock();
        for entry in queued.iter() {
            log::trace!(
                "buffer upload {} transfer offset = {} size = {}",
                entry.target.id(),
                entry.target_offset,
                entry.data.len()
            );
            self.backend
                .write_buffer(&entry.target, entry.target_offset, &entry.data);
        }
        queued.clear();
    }

    /// Number of uploads waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.queued.lock().len()
    }
}

impl Drop for TransferQueue {
    fn drop(&mut self) {
        self.flush();
    }
}

impl std::fmt::Debug for TransferQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferQueue")
            .field("backend", &self.backend.name())
            .field("pending", &self.pending_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(TransferQueue: Send, Sync);
