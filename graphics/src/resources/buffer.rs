//! GPU buffer resource.

use crate::backend::{GpuBackend, GpuBuffer};
use crate::error::GraphicsError;
use crate::types::BufferDescriptor;

/// A GPU buffer together with the descriptor it was created from.
pub struct Buffer {
    gpu: GpuBuffer,
    descriptor: BufferDescriptor,
}

impl Buffer {
    /// Create a buffer on `backend`.
    pub fn create(
        backend: &dyn GpuBackend,
        descriptor: BufferDescriptor,
    ) -> Result<Self, GraphicsError> {
        let gpu = backend.create_buffer(&descriptor)?;
        Ok(Self { gpu, descriptor })
    }

    /// Get the backend handle.
    pub fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.gpu.id())
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::types::BufferUsage;

    #[test]
    fn test_buffer_debug() {
        let backend = DummyBackend::new();
        let desc = BufferDescriptor::new(1024, BufferUsage::STORAGE).with_label("lights");
        let buffer = Buffer::create(&backend, desc).unwrap();
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("Buffer"));
        assert!(debug.contains("1024"));
        assert_eq!(buffer.label(), Some("lights"));
    }

    #[test]
    fn test_buffer_size() {
        let backend = DummyBackend::new();
        let desc = BufferDescriptor::new(2048, BufferUsage::UNIFORM);
        let buffer = Buffer::create(&backend, desc).unwrap();
        assert_eq!(buffer.size(), 2048);
        assert_eq!(buffer.gpu().size(), 2048);
    }
}
