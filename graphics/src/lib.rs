//! # Tessera Graphics
//!
//! Frame-synchronized GPU data streaming and render-pass execution.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RingBuffer`] - N-slot GPU buffers rotated once per frame instead of fenced
//! - [`streams`] - Typed serializers for materials, lights, the camera,
//!   per-primitive data and indirect draw commands
//! - [`residency`] - Bindless texture residency or a bounded texture-unit cache
//! - [`ForwardRenderer`] - Runs [`RenderPass`]es over filtered mesh spans
//! - [`TransferQueue`] - Deferred buffer uploads from any thread
//! - [`GpuBackend`] - The backend every GPU call goes through, with a
//!   recording [`DummyBackend`] for tests
//!
//! ## Example
//!
//! ```ignore
//! use tessera_graphics::{ForwardRenderer, RenderParameters, RendererConfig};
//!
//! let mut renderer = ForwardRenderer::new(backend, &RendererConfig::default())?;
//! renderer.render(
//!     &RenderParameters::new(viewport)
//!         .with_camera(&camera)
//!         .with_materials(&materials)
//!         .with_mesh_spans(&[&meshes])
//!         .with_passes(&[&pass]),
//! );
//! renderer.next_frame();
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod residency;
pub mod resources;
pub mod shader;
pub mod streams;
pub mod transfer;
pub mod types;

pub use tessera_core::{item, material, mesh, scene, texture};

// Re-export main types for convenience
pub use backend::{BackendCapabilities, BufferTarget, DummyBackend, GpuBackend, GpuBuffer};
pub use config::{RendererConfig, ResidencyPreference};
pub use error::GraphicsError;
pub use pipeline::PipelineState;
pub use renderer::{EditorPasses, ForwardRenderer, PassHook, RenderParameters, RenderPass};
pub use residency::{ResidentTextures, TextureResidencyMode, TextureUnitCache};
pub use resources::{Buffer, RingBuffer, StreamRange};
pub use transfer::TransferQueue;
pub use types::{BufferDescriptor, BufferUsage, DrawIndirectCommand, Viewport};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Logs the library version. Call once before creating a renderer.
pub fn init() {
    log::info!("Tessera Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy");
        assert!(!backend.capabilities().bindless_textures);
    }
}
