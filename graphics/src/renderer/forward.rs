//! Forward renderer.

use std::sync::Arc;

use glam::Vec4;

use crate::backend::GpuBackend;
use crate::config::RendererConfig;
use crate::error::GraphicsError;
use crate::item::ItemFilter;
use crate::material::Material;
use crate::mesh::{IndexFormat, Mesh};
use crate::residency::{pack_texture_unit, ResidentTextures, TextureResidencyMode, TextureUnitCache};
use crate::scene::{Camera, Light, LightProjections};
use crate::streams::{
    CameraStream, DrawIndirectStream, LightStream, MaterialStream, PrimitiveInterfaceSettings,
    PrimitiveStream,
};
use crate::texture::TextureHandle;
use crate::types::{DrawIndirectCommand, Viewport};

use super::RenderPass;

/// Inputs of one [`ForwardRenderer::render`] call.
///
/// Everything is borrowed from the caller for the duration of the call.
#[derive(Debug, Clone, Copy)]
pub struct RenderParameters<'a> {
    /// Framebuffer rectangle, and whether depth is reversed.
    pub viewport: Viewport,
    /// View camera. Rendering without one logs an error and leaves the
    /// camera block unbound.
    pub camera: Option<&'a Camera>,
    /// Lights of the frame.
    pub lights: &'a [Arc<Light>],
    /// Shadow transforms of the shadow casting lights.
    pub light_projections: Option<&'a LightProjections>,
    /// Ambient light color.
    pub ambient_light: Vec4,
    /// Materials referenced by the meshes.
    pub materials: &'a [Arc<Material>],
    /// Groups of meshes drawn with one indirect draw call per pass.
    pub mesh_spans: &'a [&'a [Arc<Mesh>]],
    /// Passes, in execution order.
    pub passes: &'a [&'a RenderPass],
    /// Mesh filter of passes without their own.
    pub filter: ItemFilter,
    /// Shadow map. Shadows are enabled when set and lights are present.
    pub shadow_texture: Option<TextureHandle>,
    /// Texture bound to unused texture units in bound mode.
    pub fallback_texture: TextureHandle,
}

impl<'a> RenderParameters<'a> {
    /// Parameters rendering nothing into `viewport`.
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            camera: None,
            lights: &[],
            light_projections: None,
            ambient_light: Vec4::ZERO,
            materials: &[],
            mesh_spans: &[],
            passes: &[],
            filter: ItemFilter::ALL,
            shadow_texture: None,
            fallback_texture: TextureHandle::NULL,
        }
    }

    /// Set the camera.
    pub fn with_camera(mut self, camera: &'a Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Set the lights and their shadow transforms.
    pub fn with_lights(
        mut self,
        lights: &'a [Arc<Light>],
        light_projections: Option<&'a LightProjections>,
    ) -> Self {
        self.lights = lights;
        self.light_projections = light_projections;
        self
    }

    /// Set the ambient light.
    pub fn with_ambient_light(mut self, ambient_light: Vec4) -> Self {
        self.ambient_light = ambient_light;
        self
    }

    /// Set the materials.
    pub fn with_materials(mut self, materials: &'a [Arc<Material>]) -> Self {
        self.materials = materials;
        self
    }

    /// Set the mesh spans.
    pub fn with_mesh_spans(mut self, mesh_spans: &'a [&'a [Arc<Mesh>]]) -> Self {
        self.mesh_spans = mesh_spans;
        self
    }

    /// Set the passes.
    pub fn with_passes(mut self, passes: &'a [&'a RenderPass]) -> Self {
        self.passes = passes;
        self
    }

    /// Set the default mesh filter.
    pub fn with_filter(mut self, filter: ItemFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the shadow map.
    pub fn with_shadow_texture(mut self, shadow_texture: TextureHandle) -> Self {
        self.shadow_texture = Some(shadow_texture);
        self
    }

    /// Set the fallback texture.
    pub fn with_fallback_texture(mut self, fallback_texture: TextureHandle) -> Self {
        self.fallback_texture = fallback_texture;
        self
    }

    fn shadows_enabled(&self) -> bool {
        !self.lights.is_empty() && self.shadow_texture.is_some_and(|handle| !handle.is_null())
    }
}

/// Streams the scene data of a frame and runs render passes over it.
///
/// All ring buffers advance together in [`next_frame`](Self::next_frame),
/// which must be called once per presented frame.
pub struct ForwardRenderer {
    backend: Arc<dyn GpuBackend>,
    residency_mode: TextureResidencyMode,
    index_format: IndexFormat,
    shadow_texture_unit: u32,
    texture_units: TextureUnitCache,
    material_stream: MaterialStream,
    light_stream: LightStream,
    camera_stream: CameraStream,
    primitive_stream: PrimitiveStream,
    draw_indirect_stream: DrawIndirectStream,
    frame_index: u64,
}

impl ForwardRenderer {
    /// Create a renderer and allocate its stream buffers.
    pub fn new(backend: Arc<dyn GpuBackend>, config: &RendererConfig) -> Result<Self, GraphicsError> {
        config.validate()?;
        let capabilities = backend.capabilities();
        let residency_mode = config.residency_mode(&capabilities)?;
        if residency_mode == TextureResidencyMode::Bound {
            let last_unit = (config.base_texture_unit + config.texture_unit_count)
                .max(config.shadow_texture_unit + 1);
            if last_unit > capabilities.max_texture_units {
                return Err(GraphicsError::InvalidParameter(format!(
                    "texture units up to {last_unit} requested, backend has {}",
                    capabilities.max_texture_units
                )));
            }
        }
        let alignment = config.effective_offset_alignment(&capabilities);
        let slots = config.frames_in_flight;
        let renders = config.max_renders_per_frame;
        let span_updates = config.max_span_updates_per_frame;

        let renderer = Self {
            material_stream: MaterialStream::with_updates_per_frame(
                backend.clone(),
                slots,
                config.max_materials,
                renders,
                alignment,
            )?,
            light_stream: LightStream::with_updates_per_frame(
                backend.clone(),
                slots,
                config.max_lights,
                renders,
                alignment,
            )?,
            camera_stream: CameraStream::with_updates_per_frame(
                backend.clone(),
                slots,
                renders,
                alignment,
            )?,
            primitive_stream: PrimitiveStream::with_updates_per_frame(
                backend.clone(),
                slots,
                config.max_primitives,
                span_updates,
                alignment,
            )?,
            draw_indirect_stream: DrawIndirectStream::with_updates_per_frame(
                backend.clone(),
                slots,
                config.max_draws,
                span_updates,
                alignment,
            )?,
            texture_units: TextureUnitCache::new(
                config.base_texture_unit,
                config.texture_unit_count,
            ),
            residency_mode,
            index_format: config.index_format,
            shadow_texture_unit: config.shadow_texture_unit,
            backend,
            frame_index: 0,
        };

        log::debug!(
            "Created forward renderer on {} backend: {:?} textures, {} frames in flight",
            renderer.backend.name(),
            residency_mode,
            slots
        );
        Ok(renderer)
    }

    /// The backend every GPU call goes through.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Texture residency mode chosen at construction.
    pub fn residency_mode(&self) -> TextureResidencyMode {
        self.residency_mode
    }

    /// Number of [`next_frame`](Self::next_frame) calls so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Color and size sources of primitive entries.
    pub fn primitive_settings(&self) -> &PrimitiveInterfaceSettings {
        self.primitive_stream.settings()
    }

    /// Color and size sources of primitive entries, for modification.
    pub fn primitive_settings_mut(&mut self) -> &mut PrimitiveInterfaceSettings {
        self.primitive_stream.settings_mut()
    }

    /// The material stream.
    pub fn material_stream(&self) -> &MaterialStream {
        &self.material_stream
    }

    /// The light stream.
    pub fn light_stream(&self) -> &LightStream {
        &self.light_stream
    }

    /// The camera stream.
    pub fn camera_stream(&self) -> &CameraStream {
        &self.camera_stream
    }

    /// The primitive stream.
    pub fn primitive_stream(&self) -> &PrimitiveStream {
        &self.primitive_stream
    }

    /// The indirect draw stream.
    pub fn draw_indirect_stream(&self) -> &DrawIndirectStream {
        &self.draw_indirect_stream
    }

    /// Advance every stream to its next slot.
    pub fn next_frame(&mut self) {
        self.material_stream.next_frame();
        self.light_stream.next_frame();
        self.camera_stream.next_frame();
        self.primitive_stream.next_frame();
        self.draw_indirect_stream.next_frame();
        self.frame_index += 1;
    }

    /// Render the mesh spans of `parameters` with each of its passes.
    ///
    /// # Panics
    ///
    /// Panics when a stream runs out of capacity, including when more than
    /// [`RendererConfig::max_renders_per_frame`] render calls run between two
    /// [`next_frame`](Self::next_frame) calls. Stream sizes come from the
    /// [`RendererConfig`], so this is a configuration error.
    pub fn render(&mut self, parameters: &RenderParameters<'_>) {
        let viewport = parameters.viewport;
        if viewport.is_empty() {
            log::error!("render: skipping frame with empty viewport {viewport:?}");
            return;
        }
        let backend = Arc::clone(&self.backend);
        backend.set_viewport(&viewport);

        self.update_camera(parameters);

        let bound = self.residency_mode == TextureResidencyMode::Bound;
        if bound {
            self.texture_units.reset();
        }
        let texture_units = bound.then_some(&mut self.texture_units);
        let material_range = fatal(self.material_stream.update(parameters.materials, texture_units));
        self.material_stream.bind(material_range);

        self.update_lights(parameters);

        let shadows_enabled = parameters.shadows_enabled();
        let _resident = self.make_textures_available(parameters, shadows_enabled);

        for pass in parameters.passes {
            if pass.pipeline.shader.is_none() {
                log::error!("render: pass {} has no shader, skipping", pass.name());
                continue;
            }
            pass.run_begin(backend.as_ref());
            backend.apply_pipeline_state(&pass.pipeline);

            let filter = pass.effective_filter(&parameters.filter);
            for meshes in parameters.mesh_spans {
                if meshes.is_empty() {
                    continue;
                }
                let primitive_range = fatal(self.primitive_stream.update(meshes, &filter));
                let draw = fatal(self.draw_indirect_stream.update(
                    meshes,
                    pass.primitive_mode,
                    &filter,
                ));
                if draw.draw_indirect_count == 0 {
                    continue;
                }
                self.primitive_stream.bind(primitive_range);
                self.draw_indirect_stream.bind(draw.range);

                log::trace!(
                    "render: {} draws for pass {}",
                    draw.draw_indirect_count,
                    pass.name()
                );
                backend.multi_draw_elements_indirect(
                    pass.pipeline.topology,
                    self.index_format,
                    draw.range.first_byte_offset,
                    draw.draw_indirect_count,
                    DrawIndirectCommand::SIZE as u32,
                );
            }

            pass.run_end(backend.as_ref());
        }
    }

    /// Run each pass of `parameters` as one fullscreen triangle.
    ///
    /// With `light`, the light control block selects it, so passes can
    /// sample its shadow map layer.
    ///
    /// # Panics
    ///
    /// Panics when a stream runs out of capacity.
    pub fn render_fullscreen(&mut self, parameters: &RenderParameters<'_>, light: Option<&Arc<Light>>) {
        let viewport = parameters.viewport;
        if viewport.is_empty() {
            log::error!("render_fullscreen: skipping frame with empty viewport {viewport:?}");
            return;
        }
        let backend = Arc::clone(&self.backend);
        backend.set_viewport(&viewport);

        let bound = self.residency_mode == TextureResidencyMode::Bound;
        if bound {
            self.texture_units.reset();
        }
        let texture_units = bound.then_some(&mut self.texture_units);
        let material_range = fatal(self.material_stream.update(parameters.materials, texture_units));
        self.material_stream.bind(material_range);

        self.update_camera(parameters);

        if let Some(light) = light {
            let transforms = parameters
                .light_projections
                .and_then(|projections| projections.transforms_for(light));
            match transforms {
                Some(transforms) => {
                    let control_range = fatal(self.light_stream.update_control(transforms.index));
                    self.light_stream.bind_control_buffer(control_range);
                }
                None => log::warn!("light {} has no light projection transforms", light.name),
            }
        }

        self.update_lights(parameters);

        let shadows_enabled = parameters.shadows_enabled();
        let _resident = self.make_textures_available(parameters, shadows_enabled);

        for pass in parameters.passes {
            if pass.pipeline.shader.is_none() {
                log::error!("render_fullscreen: pass {} has no shader, skipping", pass.name());
                continue;
            }
            pass.run_begin(backend.as_ref());
            backend.apply_pipeline_state(&pass.pipeline);
            backend.draw_arrays(pass.pipeline.topology, 0, 3);
            pass.run_end(backend.as_ref());
        }
    }

    fn update_camera(&mut self, parameters: &RenderParameters<'_>) {
        match parameters.camera {
            Some(camera) => {
                let range = fatal(self.camera_stream.update(camera, &parameters.viewport));
                self.camera_stream.bind(range);
            }
            None => log::error!("render: no camera, camera block left unbound"),
        }
    }

    /// Written even without lights: shaders read the light counts.
    fn update_lights(&mut self, parameters: &RenderParameters<'_>) {
        let shadow_reference = if !parameters.shadows_enabled() {
            0
        } else {
            match self.residency_mode {
                TextureResidencyMode::Bindless => {
                    parameters.shadow_texture.map_or(0, TextureHandle::raw)
                }
                TextureResidencyMode::Bound => pack_texture_unit(self.shadow_texture_unit),
            }
        };
        let empty = LightProjections::default();
        let projections = parameters.light_projections.unwrap_or(&empty);
        let light_range = fatal(self.light_stream.update(
            parameters.lights,
            projections,
            parameters.ambient_light,
            shadow_reference,
        ));
        self.light_stream.bind_light_buffer(light_range);
    }

    /// Make the shadow map and the material textures of the last material
    /// update available to shaders.
    ///
    /// In bindless mode the returned guard keeps them resident until dropped.
    /// In bound mode every unit of the cache is rebound, so packed units in
    /// the material block never sample a previous render's textures.
    fn make_textures_available(
        &self,
        parameters: &RenderParameters<'_>,
        shadows_enabled: bool,
    ) -> Option<ResidentTextures> {
        let shadow_texture = parameters
            .shadow_texture
            .filter(|_| shadows_enabled);
        match self.residency_mode {
            TextureResidencyMode::Bindless => {
                let material_handles = self.material_stream.used_handles().iter();
                Some(ResidentTextures::enter(
                    Arc::clone(&self.backend),
                    shadow_texture.into_iter().chain(material_handles),
                ))
            }
            TextureResidencyMode::Bound => {
                if let Some(shadow_texture) = shadow_texture {
                    self.backend
                        .bind_texture_unit(self.shadow_texture_unit, shadow_texture);
                }
                self.texture_units
                    .bind(self.backend.as_ref(), parameters.fallback_texture);
                None
            }
        }
    }
}

impl std::fmt::Debug for ForwardRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardRenderer")
            .field("backend", &self.backend.name())
            .field("residency_mode", &self.residency_mode)
            .field("index_format", &self.index_format)
            .field("frame_index", &self.frame_index)
            .finish_non_exhaustive()
    }
}

/// Unwrap a stream update. Overflows mean the configured sizes are too small
/// for the scene, which no frame can recover from.
fn fatal<T>(result: Result<T, GraphicsError>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            log::error!("fatal stream error: {error}");
            panic!("{error}");
        }
    }
}
