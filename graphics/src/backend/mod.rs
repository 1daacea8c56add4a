//! GPU backend abstraction layer.
//!
//! Every GPU side effect of the renderer flows through the [`GpuBackend`]
//! trait: buffer creation and writes, binding buffer ranges to interface
//! blocks, pipeline state, texture residency and draw submission.
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: records every call and keeps buffer contents in CPU
//!   memory. Used by tests and headless tools.
//!
//! # Frame latency contract
//!
//! The renderer rotates its per-frame buffers without fences. A backend must
//! guarantee that the GPU has finished reading a slot before the CPU cycles
//! back to it, i.e. its maximum frame latency must stay below the configured
//! frames in flight.

pub mod dummy;

use std::sync::Arc;

use crate::error::GraphicsError;
use crate::mesh::{IndexFormat, PrimitiveTopology};
use crate::pipeline::PipelineState;
use crate::texture::TextureHandle;
use crate::types::{BufferDescriptor, Viewport};

pub use dummy::{DummyBackend, RecordedCommand};

/// Handle to a GPU buffer resource.
///
/// The id is assigned by the backend that created the buffer and is only
/// meaningful to that backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBuffer {
    id: u64,
    size: u64,
}

impl GpuBuffer {
    /// Wrap a backend buffer id.
    pub fn new(id: u64, size: u64) -> Self {
        Self { id, size }
    }

    /// Backend specific buffer id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Binding point kind a buffer range is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Uniform block binding point.
    Uniform,
    /// Shader storage block binding point.
    Storage,
    /// Source of indirect draw commands.
    DrawIndirect,
}

/// Capabilities the renderer adapts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendCapabilities {
    /// Bindless textures are available.
    pub bindless_textures: bool,
    /// Number of combined texture image units.
    pub max_texture_units: u32,
    /// Required alignment of uniform buffer binding offsets.
    pub uniform_offset_alignment: u64,
    /// Required alignment of storage buffer binding offsets.
    pub storage_offset_alignment: u64,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            bindless_textures: false,
            max_texture_units: 32,
            uniform_offset_alignment: 256,
            storage_offset_alignment: 256,
        }
    }
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Capabilities of the device.
    fn capabilities(&self) -> BackendCapabilities;

    /// Create a buffer resource.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError>;

    /// Write data to a buffer.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);

    /// Read data from a buffer.
    ///
    /// This is a blocking operation that waits for the GPU to finish.
    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64) -> Vec<u8>;

    /// Attach `size` bytes of `buffer` starting at `offset` to a binding point.
    ///
    /// `binding` is ignored for [`BufferTarget::DrawIndirect`].
    fn bind_buffer_range(
        &self,
        target: BufferTarget,
        binding: u32,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    );

    /// Set the viewport rectangle.
    fn set_viewport(&self, viewport: &Viewport);

    /// Apply a complete fixed-function pipeline state.
    fn apply_pipeline_state(&self, state: &PipelineState);

    /// Set the mapping of normalized depth to window depth.
    fn set_depth_range(&self, near: f32, far: f32);

    /// Make a bindless texture handle resident.
    fn make_texture_resident(&self, handle: TextureHandle);

    /// Make a bindless texture handle non-resident.
    fn make_texture_non_resident(&self, handle: TextureHandle);

    /// Bind the texture and sampler of `handle` to a texture unit.
    fn bind_texture_unit(&self, unit: u32, handle: TextureHandle);

    /// Issue `draw_count` indexed draws read from the bound indirect buffer.
    ///
    /// `indirect_offset` is a byte offset into the bound indirect buffer.
    fn multi_draw_elements_indirect(
        &self,
        topology: PrimitiveTopology,
        index_format: IndexFormat,
        indirect_offset: u64,
        draw_count: u32,
        stride: u32,
    );

    /// Draw `vertex_count` vertices without vertex or index buffers.
    fn draw_arrays(&self, topology: PrimitiveTopology, first_vertex: u32, vertex_count: u32);
}

/// Creates the default backend.
///
/// Only the recording backend ships with this crate. Applications provide
/// their own [`GpuBackend`] implementation for a real graphics API.
pub fn create_backend() -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    log::info!("Using dummy backend");
    Ok(Arc::new(DummyBackend::new()))
}
