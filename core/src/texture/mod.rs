//! Texture handles.
//!
//! A [`TextureHandle`] is the opaque 64-bit value the GPU uses to reference a
//! texture/sampler pair. With bindless textures it is written into shader
//! buffers directly; without, it is the key of the texture-unit cache.

/// Opaque 64-bit texture handle. Zero means "no texture".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextureHandle(u64);

impl TextureHandle {
    /// The null handle (no texture, use the fallback).
    pub const NULL: Self = Self(0);

    /// Wrap a raw handle value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check whether this is the null handle.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for TextureHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
