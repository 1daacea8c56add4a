//! Recording GPU backend for testing and headless use.
//!
//! This backend doesn't talk to a GPU. It keeps buffer contents in CPU
//! memory so they can be read back, and records every state change and draw
//! call in submission order so tests can inspect what the renderer did.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::mesh::{IndexFormat, PrimitiveTopology};
use crate::pipeline::PipelineState;
use crate::texture::TextureHandle;
use crate::types::{BufferDescriptor, Viewport};

use super::{BackendCapabilities, BufferTarget, GpuBackend, GpuBuffer};

/// A GPU call recorded by [`DummyBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// `write_buffer`
    WriteBuffer {
        /// Buffer id.
        buffer: u64,
        /// Byte offset.
        offset: u64,
        /// Bytes written.
        size: u64,
    },
    /// `bind_buffer_range`
    BindBufferRange {
        /// Binding point kind.
        target: BufferTarget,
        /// Binding index.
        binding: u32,
        /// Buffer id.
        buffer: u64,
        /// Byte offset.
        offset: u64,
        /// Bytes bound.
        size: u64,
    },
    /// `set_viewport`
    SetViewport(Viewport),
    /// `apply_pipeline_state`, identified by the state name.
    ApplyPipelineState(String),
    /// `set_depth_range`
    SetDepthRange {
        /// Near value.
        near: f32,
        /// Far value.
        far: f32,
    },
    /// `make_texture_resident`
    MakeTextureResident(TextureHandle),
    /// `make_texture_non_resident`
    MakeTextureNonResident(TextureHandle),
    /// `bind_texture_unit`
    BindTextureUnit {
        /// Texture unit.
        unit: u32,
        /// Texture bound to it.
        handle: TextureHandle,
    },
    /// `multi_draw_elements_indirect`
    MultiDrawElementsIndirect {
        /// Primitive topology.
        topology: PrimitiveTopology,
        /// Index format.
        index_format: IndexFormat,
        /// Byte offset into the indirect buffer.
        indirect_offset: u64,
        /// Number of draws.
        draw_count: u32,
        /// Bytes between commands.
        stride: u32,
    },
    /// `draw_arrays`
    DrawArrays {
        /// Primitive topology.
        topology: PrimitiveTopology,
        /// First vertex.
        first_vertex: u32,
        /// Number of vertices.
        vertex_count: u32,
    },
}

impl RecordedCommand {
    /// Check whether this command submits geometry.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::MultiDrawElementsIndirect { .. } | Self::DrawArrays { .. }
        )
    }
}

/// Recording GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    capabilities: BackendCapabilities,
    next_buffer_id: AtomicU64,
    buffers: Mutex<HashMap<u64, Vec<u8>>>,
    resident: Mutex<HashSet<TextureHandle>>,
    commands: Mutex<Vec<RecordedCommand>>,
}

impl DummyBackend {
    /// Create a new dummy backend with default capabilities (no bindless).
    pub fn new() -> Self {
        Self::with_capabilities(BackendCapabilities::default())
    }

    /// Create a dummy backend reporting the given capabilities.
    pub fn with_capabilities(capabilities: BackendCapabilities) -> Self {
        Self {
            capabilities,
            next_buffer_id: AtomicU64::new(1),
            buffers: Mutex::new(HashMap::new()),
            resident: Mutex::new(HashSet::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Create a dummy backend that supports bindless textures.
    pub fn bindless() -> Self {
        Self::with_capabilities(BackendCapabilities {
            bindless_textures: true,
            ..BackendCapabilities::default()
        })
    }

    /// All commands recorded so far.
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().clone()
    }

    /// Take the recorded commands, leaving the log empty.
    pub fn take_commands(&self) -> Vec<RecordedCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    /// Number of recorded draw calls.
    pub fn draw_call_count(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|command| command.is_draw())
            .count()
    }

    /// Handles currently resident, in ascending order.
    pub fn resident_textures(&self) -> Vec<TextureHandle> {
        let mut handles: Vec<_> = self.resident.lock().iter().copied().collect();
        handles.sort();
        handles
    }

    /// Number of buffers created so far.
    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().len()
    }

    fn record(&self, command: RecordedCommand) {
        self.commands.lock().push(command);
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "buffer {:?} has zero size",
                descriptor.label
            )));
        }
        let id = self.next_buffer_id.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "DummyBackend: creating buffer {} {:?} (size: {})",
            id,
            descriptor.label,
            descriptor.size
        );
        self.buffers
            .lock()
            .insert(id, vec![0u8; descriptor.size as usize]);
        Ok(GpuBuffer::new(id, descriptor.size))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        log::trace!(
            "DummyBackend: write_buffer {} offset={} len={}",
            buffer.id(),
            offset,
            data.len()
        );
        {
            let mut buffers = self.buffers.lock();
            let Some(memory) = buffers.get_mut(&buffer.id()) else {
                log::error!("DummyBackend: write to unknown buffer {}", buffer.id());
                return;
            };
            let start = offset as usize;
            let end = start + data.len();
            if end > memory.len() {
                log::error!(
                    "DummyBackend: write of {} bytes at {} overruns buffer {} ({} bytes)",
                    data.len(),
                    offset,
                    buffer.id(),
                    memory.len()
                );
                return;
            }
            memory[start..end].copy_from_slice(data);
        }
        self.record(RecordedCommand::WriteBuffer {
            buffer: buffer.id(),
            offset,
            size: data.len() as u64,
        });
    }

    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64) -> Vec<u8> {
        log::trace!(
            "DummyBackend: read_buffer {} offset={} size={}",
            buffer.id(),
            offset,
            size
        );
        let buffers = self.buffers.lock();
        buffers
            .get(&buffer.id())
            .map(|memory| {
                let start = (offset as usize).min(memory.len());
                let end = (start + size as usize).min(memory.len());
                memory[start..end].to_vec()
            })
            .unwrap_or_default()
    }

    fn bind_buffer_range(
        &self,
        target: BufferTarget,
        binding: u32,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) {
        self.record(RecordedCommand::BindBufferRange {
            target,
            binding,
            buffer: buffer.id(),
            offset,
            size,
        });
    }

    fn set_viewport(&self, viewport: &Viewport) {
        self.record(RecordedCommand::SetViewport(*viewport));
    }

    fn apply_pipeline_state(&self, state: &PipelineState) {
        log::trace!("DummyBackend: pipeline state {}", state.name);
        self.record(RecordedCommand::ApplyPipelineState(state.name.clone()));
    }

    fn set_depth_range(&self, near: f32, far: f32) {
        self.record(RecordedCommand::SetDepthRange { near, far });
    }

    fn make_texture_resident(&self, handle: TextureHandle) {
        if !self.resident.lock().insert(handle) {
            log::error!("DummyBackend: texture {:?} is already resident", handle);
        }
        self.record(RecordedCommand::MakeTextureResident(handle));
    }

    fn make_texture_non_resident(&self, handle: TextureHandle) {
        if !self.resident.lock().remove(&handle) {
            log::error!("DummyBackend: texture {:?} is not resident", handle);
        }
        self.record(RecordedCommand::MakeTextureNonResident(handle));
    }

    fn bind_texture_unit(&self, unit: u32, handle: TextureHandle) {
        self.record(RecordedCommand::BindTextureUnit { unit, handle });
    }

    fn multi_draw_elements_indirect(
        &self,
        topology: PrimitiveTopology,
        index_format: IndexFormat,
        indirect_offset: u64,
        draw_count: u32,
        stride: u32,
    ) {
        log::trace!(
            "DummyBackend: multi_draw_elements_indirect {} draws at {}",
            draw_count,
            indirect_offset
        );
        self.record(RecordedCommand::MultiDrawElementsIndirect {
            topology,
            index_format,
            indirect_offset,
            draw_count,
            stride,
        });
    }

    fn draw_arrays(&self, topology: PrimitiveTopology, first_vertex: u32, vertex_count: u32) {
        self.record(RecordedCommand::DrawArrays {
            topology,
            first_vertex,
            vertex_count,
        });
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferUsage;

    #[test]
    fn test_buffer_write_read_back() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::STORAGE))
            .unwrap();

        backend.write_buffer(&buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(backend.read_buffer(&buffer, 0, 8), vec![0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_out_of_range_write_is_dropped() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(4, BufferUsage::STORAGE))
            .unwrap();

        backend.write_buffer(&buffer, 2, &[9, 9, 9, 9]);
        assert_eq!(backend.read_buffer(&buffer, 0, 4), vec![0; 4]);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_zero_sized_buffer_fails() {
        let backend = DummyBackend::new();
        let result = backend.create_buffer(&BufferDescriptor::new(0, BufferUsage::UNIFORM));
        assert!(matches!(result, Err(GraphicsError::ResourceCreationFailed(_))));
    }

    #[test]
    fn test_residency_tracking() {
        let backend = DummyBackend::bindless();
        assert!(backend.capabilities().bindless_textures);

        let handle = TextureHandle::from_raw(42);
        backend.make_texture_resident(handle);
        assert_eq!(backend.resident_textures(), vec![handle]);
        backend.make_texture_non_resident(handle);
        assert!(backend.resident_textures().is_empty());
    }

    #[test]
    fn test_draw_call_count() {
        let backend = DummyBackend::new();
        backend.set_depth_range(0.0, 1.0);
        backend.draw_arrays(PrimitiveTopology::TriangleList, 0, 3);
        assert_eq!(backend.draw_call_count(), 1);
        assert_eq!(backend.take_commands().len(), 2);
        assert!(backend.commands().is_empty());
    }
}
