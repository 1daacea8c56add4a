//! Renderer configuration.

use crate::backend::BackendCapabilities;
use crate::error::GraphicsError;
use crate::mesh::IndexFormat;
use crate::residency::{TextureResidencyMode, TextureUnitCache};

/// How the texture residency mode is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResidencyPreference {
    /// Bindless when the backend supports it, bound texture units otherwise.
    #[default]
    Auto,
    /// Always bindless. Fails if the backend lacks support.
    Bindless,
    /// Always bound texture units.
    Bound,
}

/// Sizing and feature configuration of a
/// [`ForwardRenderer`](crate::renderer::ForwardRenderer).
///
/// Stream buffers are allocated once from the `max_*` counts. Exceeding a
/// count during a frame is fatal.
///
/// Every render call between two `next_frame` calls writes new camera,
/// material and light ranges, so their slots hold `max_renders_per_frame`
/// ranges. Primitive and indirect draw ranges share their per-frame counts,
/// with alignment padding for `max_span_updates_per_frame` ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Number of ring buffer slots. Must exceed the number of frames the
    /// backend lets the GPU lag behind.
    pub frames_in_flight: usize,
    /// Materials per frame.
    pub max_materials: usize,
    /// Lights per frame.
    pub max_lights: usize,
    /// Primitive entries per frame, summed over all passes and spans.
    pub max_primitives: usize,
    /// Indirect draw commands per frame, summed over all passes and spans.
    pub max_draws: usize,
    /// `render` and `render_fullscreen` calls per frame.
    pub max_renders_per_frame: usize,
    /// Primitive and indirect draw updates per frame, one per non-empty
    /// span of each pass.
    pub max_span_updates_per_frame: usize,
    /// Texture residency mode selection.
    pub residency: ResidencyPreference,
    /// Texture units used for material textures in bound mode, including
    /// the fallback unit.
    pub texture_unit_count: u32,
    /// First texture unit used for material textures.
    pub base_texture_unit: u32,
    /// Texture unit of the shadow map in bound mode.
    pub shadow_texture_unit: u32,
    /// Binding offset alignment. `None` uses the backend's.
    pub offset_alignment: Option<u64>,
    /// Whether depth is reversed (near = 1, far = 0).
    pub reverse_depth: bool,
    /// Index format of mesh index buffers.
    pub index_format: IndexFormat,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 4,
            max_materials: 256,
            max_lights: 128,
            max_primitives: 8000,
            max_draws: 8000,
            max_renders_per_frame: 16,
            max_span_updates_per_frame: 256,
            residency: ResidencyPreference::Auto,
            texture_unit_count: TextureUnitCache::DEFAULT_UNIT_COUNT,
            base_texture_unit: 0,
            shadow_texture_unit: TextureUnitCache::DEFAULT_UNIT_COUNT,
            offset_alignment: None,
            reverse_depth: true,
            index_format: IndexFormat::Uint32,
        }
    }
}

impl RendererConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames_in_flight: usize) -> Self {
        self.frames_in_flight = frames_in_flight;
        self
    }

    /// Set the maximum material count.
    pub fn with_max_materials(mut self, max_materials: usize) -> Self {
        self.max_materials = max_materials;
        self
    }

    /// Set the maximum light count.
    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Set the maximum primitive entry count.
    pub fn with_max_primitives(mut self, max_primitives: usize) -> Self {
        self.max_primitives = max_primitives;
        self
    }

    /// Set the maximum indirect draw count.
    pub fn with_max_draws(mut self, max_draws: usize) -> Self {
        self.max_draws = max_draws;
        self
    }

    /// Set the number of render calls per frame.
    pub fn with_max_renders_per_frame(mut self, max_renders_per_frame: usize) -> Self {
        self.max_renders_per_frame = max_renders_per_frame;
        self
    }

    /// Set the number of primitive and indirect draw updates per frame.
    pub fn with_max_span_updates_per_frame(mut self, max_span_updates_per_frame: usize) -> Self {
        self.max_span_updates_per_frame = max_span_updates_per_frame;
        self
    }

    /// Set the residency mode selection.
    pub fn with_residency(mut self, residency: ResidencyPreference) -> Self {
        self.residency = residency;
        self
    }

    /// Set the texture unit range used in bound mode.
    pub fn with_texture_units(mut self, base_texture_unit: u32, texture_unit_count: u32) -> Self {
        self.base_texture_unit = base_texture_unit;
        self.texture_unit_count = texture_unit_count;
        self
    }

    /// Set the shadow map texture unit.
    pub fn with_shadow_texture_unit(mut self, shadow_texture_unit: u32) -> Self {
        self.shadow_texture_unit = shadow_texture_unit;
        self
    }

    /// Override the binding offset alignment.
    pub fn with_offset_alignment(mut self, offset_alignment: u64) -> Self {
        self.offset_alignment = Some(offset_alignment);
        self
    }

    /// Set reverse depth.
    pub fn with_reverse_depth(mut self, reverse_depth: bool) -> Self {
        self.reverse_depth = reverse_depth;
        self
    }

    /// Set the index format.
    pub fn with_index_format(mut self, index_format: IndexFormat) -> Self {
        self.index_format = index_format;
        self
    }

    /// Check the configuration for values no renderer can be built from.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.frames_in_flight == 0 {
            return Err(GraphicsError::InvalidParameter(
                "frames in flight must be non-zero".to_string(),
            ));
        }
        for (name, count) in [
            ("max_materials", self.max_materials),
            ("max_lights", self.max_lights),
            ("max_primitives", self.max_primitives),
            ("max_draws", self.max_draws),
            ("max_renders_per_frame", self.max_renders_per_frame),
            ("max_span_updates_per_frame", self.max_span_updates_per_frame),
        ] {
            if count == 0 {
                return Err(GraphicsError::InvalidParameter(format!(
                    "{name} must be non-zero"
                )));
            }
        }
        if self.texture_unit_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture unit count must include the fallback unit".to_string(),
            ));
        }
        let units = self.base_texture_unit..self.base_texture_unit + self.texture_unit_count;
        if units.contains(&self.shadow_texture_unit) {
            return Err(GraphicsError::InvalidParameter(format!(
                "shadow texture unit {} overlaps material units {units:?}",
                self.shadow_texture_unit
            )));
        }
        if let Some(alignment) = self.offset_alignment {
            if !alignment.is_power_of_two() {
                return Err(GraphicsError::InvalidParameter(format!(
                    "offset alignment must be a power of 2, got {alignment}"
                )));
            }
        }
        Ok(())
    }

    /// Residency mode for a backend with `capabilities`.
    pub fn residency_mode(
        &self,
        capabilities: &BackendCapabilities,
    ) -> Result<TextureResidencyMode, GraphicsError> {
        match self.residency {
            ResidencyPreference::Auto if capabilities.bindless_textures => {
                Ok(TextureResidencyMode::Bindless)
            }
            ResidencyPreference::Auto | ResidencyPreference::Bound => {
                Ok(TextureResidencyMode::Bound)
            }
            ResidencyPreference::Bindless if capabilities.bindless_textures => {
                Ok(TextureResidencyMode::Bindless)
            }
            ResidencyPreference::Bindless => Err(GraphicsError::InvalidParameter(
                "bindless textures requested but not supported by the backend".to_string(),
            )),
        }
    }

    /// Offset alignment to use with a backend with `capabilities`.
    ///
    /// Ranges of storage and uniform streams share one alignment, the
    /// larger of the two the backend requires.
    pub fn effective_offset_alignment(&self, capabilities: &BackendCapabilities) -> u64 {
        self.offset_alignment.unwrap_or_else(|| {
            capabilities
                .uniform_offset_alignment
                .max(capabilities.storage_offset_alignment)
                .max(1)
        })
    }
}
