use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

/// Kind of light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightType {
    /// Infinitely distant light with parallel rays.
    #[default]
    Directional,
    /// Cone-shaped light.
    Spot,
    /// Omnidirectional light.
    Point,
}

/// A light placed in the world.
///
/// Lights shine along the negative Z axis of their node.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light name.
    pub name: String,
    /// Kind of light source.
    pub light_type: LightType,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier applied to `color`.
    pub intensity: f32,
    /// Range of influence (spot and point lights).
    pub range: f32,
    /// Full inner cone angle of a spot light, in radians.
    pub inner_spot_angle: f32,
    /// Full outer cone angle of a spot light, in radians.
    pub outer_spot_angle: f32,
    /// Whether this light renders a shadow map.
    pub cast_shadow: bool,
    /// Transform from light space to world space.
    pub world_from_node: Mat4,
}

impl Light {
    /// Create a white light of the given type.
    pub fn new(name: impl Into<String>, light_type: LightType) -> Self {
        Self {
            name: name.into(),
            light_type,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 100.0,
            inner_spot_angle: std::f32::consts::FRAC_PI_4,
            outer_spot_angle: std::f32::consts::FRAC_PI_2,
            cast_shadow: true,
            world_from_node: Mat4::IDENTITY,
        }
    }

    /// Set color and intensity.
    #[must_use]
    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }

    /// Set the range.
    #[must_use]
    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    /// Set the spot cone angles.
    #[must_use]
    pub fn with_spot_angles(mut self, inner: f32, outer: f32) -> Self {
        self.inner_spot_angle = inner;
        self.outer_spot_angle = outer;
        self
    }

    /// Set the world transform.
    #[must_use]
    pub fn with_transform(mut self, world_from_node: Mat4) -> Self {
        self.world_from_node = world_from_node;
        self
    }

    /// World space position.
    pub fn position(&self) -> Vec3 {
        self.world_from_node.w_axis.truncate()
    }

    /// World space direction the light points to.
    pub fn direction(&self) -> Vec3 {
        (-self.world_from_node.z_axis.truncate()).normalize_or_zero()
    }

    /// Color premultiplied by intensity.
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }
}

/// Shadow-map transforms computed for one light.
#[derive(Debug, Clone)]
pub struct LightProjectionTransforms {
    /// Light these transforms belong to.
    pub light: Arc<Light>,
    /// Shadow map layer index of this light.
    pub index: u32,
    /// Light clip space from world space.
    pub clip_from_world: Mat4,
    /// Shadow texture space from world space.
    pub texture_from_world: Mat4,
}

/// Shadow-map transforms of all shadow casting lights of a frame.
#[derive(Debug, Clone, Default)]
pub struct LightProjections {
    /// Per light transforms.
    pub transforms: Vec<LightProjectionTransforms>,
}

impl LightProjections {
    /// Create an empty set of projections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add transforms for `light`, assigning the next shadow layer index.
    pub fn push(&mut self, light: Arc<Light>, clip_from_world: Mat4) {
        let index = self.transforms.len() as u32;
        // Maps clip space [-1, 1] xy to texture space [0, 1].
        let texture_from_clip = Mat4::from_cols(
            Vec4::new(0.5, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 0.5, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.5, 0.5, 0.0, 1.0),
        );
        self.transforms.push(LightProjectionTransforms {
            light,
            index,
            clip_from_world,
            texture_from_world: texture_from_clip * clip_from_world,
        });
    }

    /// Transforms computed for `light`, compared by identity.
    pub fn transforms_for(&self, light: &Arc<Light>) -> Option<&LightProjectionTransforms> {
        self.transforms
            .iter()
            .find(|transforms| Arc::ptr_eq(&transforms.light, light))
    }
}
