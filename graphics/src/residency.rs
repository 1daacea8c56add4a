//! Texture residency.
//!
//! Shaders reference material textures by a 64-bit value in the material
//! buffer. Two modes are supported, selected once when the renderer is
//! created:
//!
//! - **Bindless**: the value is the texture handle itself. Every handle used
//!   in a frame is made resident before the first draw and non-resident after
//!   the last one, bracketed by a [`ResidentTextures`] guard.
//! - **Bound**: handles are assigned to a small range of texture units by a
//!   [`TextureUnitCache`], and the value is the unit tagged with
//!   [`TEXTURE_UNIT_TAG`] so shaders can tell units and handles apart.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::texture::TextureHandle;

/// High bits marking a packed texture unit in place of a bindless handle.
pub const TEXTURE_UNIT_TAG: u64 = 0x7fff_ffff << 32;

/// Pack a texture unit into the value written to shader buffers in bound mode.
pub fn pack_texture_unit(unit: u32) -> u64 {
    u64::from(unit) | TEXTURE_UNIT_TAG
}

/// How material textures are made available to shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureResidencyMode {
    /// Bindless handles made resident per frame.
    Bindless,
    /// Handles bound to a fixed range of texture units.
    Bound,
}

/// Distinct non-null texture handles referenced during one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResidencySet {
    handles: BTreeSet<TextureHandle>,
}

impl ResidencySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all handles.
    pub fn clear(&mut self) {
        self.handles.clear();
    }

    /// Add a handle. Null handles are ignored.
    ///
    /// Returns `true` if the handle was not yet in the set.
    pub fn insert(&mut self, handle: TextureHandle) -> bool {
        !handle.is_null() && self.handles.insert(handle)
    }

    /// Check whether `handle` is in the set.
    pub fn contains(&self, handle: TextureHandle) -> bool {
        self.handles.contains(&handle)
    }

    /// Number of handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handles in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.handles.iter().copied()
    }
}

/// Assigns texture handles to a fixed range of texture units.
///
/// The last unit of the range is reserved for the fallback texture. Null
/// handles, and handles that arrive once every other unit is taken, resolve
/// to it.
#[derive(Debug, Clone)]
pub struct TextureUnitCache {
    base_unit: u32,
    unit_count: u32,
    handles: Vec<TextureHandle>,
}

impl TextureUnitCache {
    /// Default number of units, including the fallback unit.
    pub const DEFAULT_UNIT_COUNT: u32 = 15;

    /// Create a cache over `unit_count` units starting at `base_unit`.
    pub fn new(base_unit: u32, unit_count: u32) -> Self {
        debug_assert!(unit_count > 0, "texture unit cache needs a fallback unit");
        Self {
            base_unit,
            unit_count: unit_count.max(1),
            handles: Vec::with_capacity(unit_count as usize),
        }
    }

    /// Forget all assignments. Called at the start of each render.
    pub fn reset(&mut self) {
        self.handles.clear();
    }

    /// First unit of the range.
    pub fn base_unit(&self) -> u32 {
        self.base_unit
    }

    /// Number of units, including the fallback unit.
    pub fn unit_count(&self) -> u32 {
        self.unit_count
    }

    /// Unit bound to the fallback texture.
    pub fn fallback_unit(&self) -> u32 {
        self.base_unit + self.unit_count - 1
    }

    /// Number of units currently assigned to handles.
    pub fn used_unit_count(&self) -> usize {
        self.handles.len()
    }

    /// Unit for `handle`: its existing unit, a newly assigned one, or the
    /// fallback unit when the handle is null or the cache is full.
    pub fn allocate(&mut self, handle: TextureHandle) -> u32 {
        if handle.is_null() {
            return self.fallback_unit();
        }
        if let Some(index) = self.handles.iter().position(|&used| used == handle) {
            return self.base_unit + index as u32;
        }
        if self.handles.len() as u32 + 1 < self.unit_count {
            self.handles.push(handle);
            return self.base_unit + self.handles.len() as u32 - 1;
        }
        log::warn!(
            "texture unit cache full ({} units), using fallback unit {} for {:?}",
            self.unit_count,
            self.fallback_unit(),
            handle
        );
        self.fallback_unit()
    }

    /// Bind every assigned unit to its texture and every other unit of the
    /// range to `fallback`.
    pub fn bind(&self, backend: &dyn GpuBackend, fallback: TextureHandle) {
        for index in 0..self.unit_count {
            let handle = self
                .handles
                .get(index as usize)
                .copied()
                .unwrap_or(fallback);
            backend.bind_texture_unit(self.base_unit + index, handle);
        }
    }
}

impl Default for TextureUnitCache {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_UNIT_COUNT)
    }
}

/// Scoped bindless residency of a set of texture handles.
///
/// Handles are made resident on construction and non-resident when the guard
/// is dropped, so every exit path releases them.
pub struct ResidentTextures {
    backend: Arc<dyn GpuBackend>,
    handles: Vec<TextureHandle>,
}

impl ResidentTextures {
    /// Make every distinct non-null handle of `handles` resident.
    pub fn enter(
        backend: Arc<dyn GpuBackend>,
        handles: impl IntoIterator<Item = TextureHandle>,
    ) -> Self {
        let mut unique = ResidencySet::new();
        for handle in handles {
            unique.insert(handle);
        }
        let handles: Vec<_> = unique.iter().collect();
        for &handle in &handles {
            backend.make_texture_resident(handle);
        }
        log::trace!("made {} textures resident", handles.len());
        Self { backend, handles }
    }

    /// Handles held resident by this guard.
    pub fn handles(&self) -> &[TextureHandle] {
        &self.handles
    }
}

impl Drop for ResidentTextures {
    fn drop(&mut self) {
        for &handle in &self.handles {
            self.backend.make_texture_non_resident(handle);
        }
        log::trace!("made {} textures non-resident", self.handles.len());
    }
}

impl std::fmt::Debug for ResidentTextures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidentTextures")
            .field("handles", &self.handles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, RecordedCommand};

    fn handle(raw: u64) -> TextureHandle {
        TextureHandle::from_raw(raw)
    }

    #[test]
    fn test_pack_texture_unit() {
        assert_eq!(pack_texture_unit(3), 0x7fff_ffff_0000_0003);
        assert_eq!(pack_texture_unit(0) >> 32, 0x7fff_ffff);
    }

    #[test]
    fn test_residency_set_ignores_null_and_duplicates() {
        let mut set = ResidencySet::new();
        assert!(set.insert(handle(5)));
        assert!(!set.insert(handle(5)));
        assert!(!set.insert(TextureHandle::NULL));
        assert!(set.insert(handle(2)));

        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![handle(2), handle(5)]);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_unit_cache_reuses_units() {
        let mut cache = TextureUnitCache::new(4, 15);
        assert_eq!(cache.allocate(handle(10)), 4);
        assert_eq!(cache.allocate(handle(11)), 5);
        assert_eq!(cache.allocate(handle(10)), 4);
        assert_eq!(cache.used_unit_count(), 2);
        assert_eq!(cache.fallback_unit(), 18);
        assert_eq!(cache.allocate(TextureHandle::NULL), 18);
    }

    #[test]
    fn test_unit_cache_overflow_uses_fallback() {
        let mut cache = TextureUnitCache::new(0, 4);
        let units: Vec<u32> = (1..=6).map(|raw| cache.allocate(handle(raw))).collect();

        assert_eq!(units, vec![0, 1, 2, 3, 3, 3]);
        assert_eq!(cache.used_unit_count(), 3);

        // Same answer on a repeated run.
        cache.reset();
        let again: Vec<u32> = (1..=6).map(|raw| cache.allocate(handle(raw))).collect();
        assert_eq!(units, again);
    }

    #[test]
    fn test_unit_cache_bind_fills_unused_with_fallback() {
        let backend = DummyBackend::new();
        let mut cache = TextureUnitCache::new(2, 3);
        cache.allocate(handle(7));
        cache.bind(&backend, handle(99));

        assert_eq!(
            backend.commands(),
            vec![
                RecordedCommand::BindTextureUnit {
                    unit: 2,
                    handle: handle(7)
                },
                RecordedCommand::BindTextureUnit {
                    unit: 3,
                    handle: handle(99)
                },
                RecordedCommand::BindTextureUnit {
                    unit: 4,
                    handle: handle(99)
                },
            ]
        );
    }

    #[test]
    fn test_resident_guard_releases_on_drop() {
        let backend = Arc::new(DummyBackend::bindless());
        {
            let guard = ResidentTextures::enter(
                backend.clone(),
                [handle(3), handle(1), handle(3), TextureHandle::NULL],
            );
            assert_eq!(guard.handles(), &[handle(1), handle(3)]);
            assert_eq!(backend.resident_textures(), vec![handle(1), handle(3)]);
        }
        assert!(backend.resident_textures().is_empty());
    }

    #[test]
    fn test_resident_guard_releases_on_early_return() {
        fn render(backend: Arc<DummyBackend>) -> Result<(), &'static str> {
            let _resident = ResidentTextures::enter(backend, [TextureHandle::from_raw(8)]);
            Err("pass failed")
        }

        let backend = Arc::new(DummyBackend::bindless());
        assert!(render(backend.clone()).is_err());
        assert!(backend.resident_textures().is_empty());
    }
}
