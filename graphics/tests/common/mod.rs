//! Shared fixtures for the integration tests.
//!
//! Every test runs against the recording [`DummyBackend`], configured either
//! with or without bindless texture support so both residency modes are
//! exercised by the same cases.

#![allow(dead_code)]

use std::sync::Arc;

use tessera_graphics::backend::RecordedCommand;
use tessera_graphics::item::ItemFlags;
use tessera_graphics::material::Material;
use tessera_graphics::mesh::{IndexRange, Mesh, Primitive, PrimitiveMode};
use tessera_graphics::pipeline::{PipelineState, ShaderProgram};
use tessera_graphics::texture::TextureHandle;
use tessera_graphics::{
    BackendCapabilities, DummyBackend, ForwardRenderer, RenderPass, RendererConfig,
};

/// Texture residency flavor of the test backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Residency {
    /// Backend with bindless textures.
    Bindless,
    /// Backend with texture units only.
    Bound,
}

impl Residency {
    /// Create a backend of this flavor.
    pub fn backend(self) -> Arc<DummyBackend> {
        let capabilities = BackendCapabilities {
            bindless_textures: self == Residency::Bindless,
            ..Default::default()
        };
        Arc::new(DummyBackend::with_capabilities(capabilities))
    }
}

/// A backend and a renderer created on it.
pub struct TestContext {
    /// The recording backend.
    pub backend: Arc<DummyBackend>,
    /// Renderer under test.
    pub renderer: ForwardRenderer,
}

impl TestContext {
    /// Create a context with the default configuration.
    pub fn new(residency: Residency) -> Self {
        Self::with_config(residency, &RendererConfig::default())
    }

    /// Create a context with `config`.
    pub fn with_config(residency: Residency, config: &RendererConfig) -> Self {
        init_logging();
        let backend = residency.backend();
        let renderer = ForwardRenderer::new(backend.clone(), config)
            .expect("renderer creation should succeed");
        Self { backend, renderer }
    }

    /// Draw counts of the indirect draws recorded so far.
    pub fn indirect_draw_counts(&self) -> Vec<u32> {
        self.backend
            .commands()
            .into_iter()
            .filter_map(|command| match command {
                RecordedCommand::MultiDrawElementsIndirect { draw_count, .. } => Some(draw_count),
                _ => None,
            })
            .collect()
    }
}

/// Route log output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A pass with a shader, drawing filled polygons.
pub fn shaded_pass(name: &str) -> RenderPass {
    RenderPass::new(PipelineState::new(name).with_shader(Arc::new(ShaderProgram::new(name))))
}

/// A mesh with `primitive_count` filled triangles.
pub fn triangle_mesh(flags: ItemFlags, primitive_count: u32) -> Arc<Mesh> {
    let mut mesh = Mesh::new("triangles").with_flags(flags);
    for i in 0..primitive_count {
        mesh = mesh.with_primitive(
            Primitive::new().with_index_range(PrimitiveMode::PolygonFill, IndexRange::new(i * 3, 3)),
        );
    }
    Arc::new(mesh)
}

/// A mesh with `primitive_count` triangles, each with filled and edge line
/// index ranges.
pub fn outlined_mesh(flags: ItemFlags, primitive_count: u32) -> Arc<Mesh> {
    let mut mesh = Mesh::new("outlined").with_flags(flags);
    for i in 0..primitive_count {
        mesh = mesh.with_primitive(
            Primitive::new()
                .with_index_range(PrimitiveMode::PolygonFill, IndexRange::new(i * 9, 3))
                .with_index_range(PrimitiveMode::EdgeLines, IndexRange::new(i * 9 + 3, 6)),
        );
    }
    Arc::new(mesh)
}

/// A material sampling `texture`.
pub fn textured_material(name: &str, texture: u64) -> Arc<Material> {
    Arc::new(Material::new(name).with_texture(TextureHandle::from_raw(texture)))
}
