//! Surface materials as consumed by the material stream.
//!
//! Materials are shared via `Arc` between the material list handed to the
//! renderer and the primitives that reference them. The renderer writes the
//! entry index each material received in the current frame's material buffer
//! back onto the material, so primitives can refer to it.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Vec2, Vec4};

use crate::texture::TextureHandle;

/// A physically based surface material.
#[derive(Debug)]
pub struct Material {
    /// Material name.
    pub name: String,
    /// Base color (linear RGBA).
    pub base_color: Vec4,
    /// Emissive color (linear RGB, w unused).
    pub emissive: Vec4,
    /// Anisotropic roughness (x along tangent, y along bitangent).
    pub roughness: Vec2,
    /// Metallic factor (0.0 to 1.0).
    pub metallic: f32,
    /// Reflectance at normal incidence for dielectrics.
    pub reflectance: f32,
    /// Opacity (1.0 = fully opaque).
    pub opacity: f32,
    /// Base color texture ([`TextureHandle::NULL`] when untextured).
    pub texture: TextureHandle,
    buffer_index: AtomicU32,
}

impl Material {
    /// Create a new white, dielectric, untextured material.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: Vec4::ONE,
            emissive: Vec4::ZERO,
            roughness: Vec2::splat(0.5),
            metallic: 0.0,
            reflectance: 0.5,
            opacity: 1.0,
            texture: TextureHandle::NULL,
            buffer_index: AtomicU32::new(0),
        }
    }

    /// Set the base color.
    #[must_use]
    pub fn with_base_color(mut self, base_color: Vec4) -> Self {
        self.base_color = base_color;
        self
    }

    /// Set the emissive color.
    #[must_use]
    pub fn with_emissive(mut self, emissive: Vec4) -> Self {
        self.emissive = emissive;
        self
    }

    /// Set isotropic roughness.
    #[must_use]
    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = Vec2::splat(roughness);
        self
    }

    /// Set anisotropic roughness.
    #[must_use]
    pub fn with_anisotropic_roughness(mut self, roughness: Vec2) -> Self {
        self.roughness = roughness;
        self
    }

    /// Set the metallic factor.
    #[must_use]
    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    /// Set the reflectance.
    #[must_use]
    pub fn with_reflectance(mut self, reflectance: f32) -> Self {
        self.reflectance = reflectance;
        self
    }

    /// Set the opacity.
    #[must_use]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the base color texture.
    #[must_use]
    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = texture;
        self
    }

    /// Index of this material in the most recently written material buffer.
    pub fn buffer_index(&self) -> u32 {
        self.buffer_index.load(Ordering::Relaxed)
    }

    /// Record the index this material received in the material buffer.
    pub fn set_buffer_index(&self, index: u32) {
        self.buffer_index.store(index, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_defaults() {
        let material = Material::new("default");
        assert_eq!(material.base_color, Vec4::ONE);
        assert!(material.texture.is_null());
        assert_eq!(material.buffer_index(), 0);
    }

    #[test]
    fn test_buffer_index_is_shared_through_arc() {
        let material = std::sync::Arc::new(Material::new("shared"));
        let other = std::sync::Arc::clone(&material);
        material.set_buffer_index(5);
        assert_eq!(other.buffer_index(), 5);
    }
}
