//! Material stream.

use std::sync::Arc;

use crate::backend::{BufferTarget, GpuBackend};
use crate::error::GraphicsError;
use crate::material::Material;
use crate::residency::{pack_texture_unit, ResidencySet, TextureUnitCache};
use crate::resources::{RingBuffer, StreamRange};
use crate::shader::{BlockKind, FieldType, InterfaceBlock, LayoutRule, StructLayout};

use super::{bindings, slot_capacity};

#[derive(Debug, Clone, Copy)]
struct MaterialOffsets {
    roughness: usize,
    metallic: usize,
    reflectance: usize,
    base_color: usize,
    emissive: usize,
    base_texture: usize,
    opacity: usize,
}

/// Streams material parameters into the `material` storage block.
///
/// Each material receives the index of its entry, which primitives then
/// reference through [`Material::buffer_index`].
#[derive(Debug)]
pub struct MaterialStream {
    ring: RingBuffer,
    block: InterfaceBlock,
    offsets: MaterialOffsets,
    stride: u64,
    max_materials: usize,
    used_handles: ResidencySet,
}

impl MaterialStream {
    /// Create a stream with room for one update of `max_materials` entries
    /// per frame.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        max_materials: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        Self::with_updates_per_frame(backend, slot_count, max_materials, 1, offset_alignment)
    }

    /// Create a stream with room for `updates_per_frame` updates of up to
    /// `max_materials` entries each per frame.
    pub fn with_updates_per_frame(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        max_materials: usize,
        updates_per_frame: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        let mut element = StructLayout::new("Material", LayoutRule::Std430);
        let offsets = MaterialOffsets {
            roughness: element.add("roughness", FieldType::Vec2),
            metallic: element.add("metallic", FieldType::Float),
            reflectance: element.add("reflectance", FieldType::Float),
            base_color: element.add("base_color", FieldType::Vec4),
            emissive: element.add("emissive", FieldType::Vec4),
            base_texture: element.add("base_texture", FieldType::UVec2),
            opacity: element.add("opacity", FieldType::Float),
        };
        element.add("reserved", FieldType::Float);
        let stride = element.stride() as u64;

        let block = InterfaceBlock {
            name: "material",
            instance_name: "material",
            binding: bindings::MATERIAL,
            kind: BlockKind::Storage,
            header: None,
            array: Some(("materials", element)),
        };
        let ring = RingBuffer::new(
            backend,
            "material",
            BufferTarget::Storage,
            bindings::MATERIAL,
            slot_count,
            slot_capacity(&block, max_materials, updates_per_frame, offset_alignment)?,
            offset_alignment,
        )?;

        Ok(Self {
            ring,
            block,
            offsets,
            stride,
            max_materials,
            used_handles: ResidencySet::new(),
        })
    }

    /// Interface block written by this stream.
    pub fn block(&self) -> &InterfaceBlock {
        &self.block
    }

    /// Size of one material entry in bytes.
    pub fn entry_stride(&self) -> u64 {
        self.stride
    }

    /// The underlying ring buffer.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Distinct non-null texture handles referenced by the last update.
    pub fn used_handles(&self) -> &ResidencySet {
        &self.used_handles
    }

    /// Write `materials` to the current slot.
    ///
    /// With a texture unit cache, texture references are written as packed
    /// units allocated from it. Without one, the raw bindless handle is
    /// written.
    pub fn update(
        &mut self,
        materials: &[Arc<Material>],
        mut texture_units: Option<&mut TextureUnitCache>,
    ) -> Result<StreamRange, GraphicsError> {
        self.used_handles.clear();

        let offsets = self.offsets;
        let stride = self.stride;
        let entry_count = materials.len().min(self.max_materials);
        let mut writer = self.ring.begin(entry_count as u64 * stride);
        for (index, material) in materials.iter().enumerate() {
            let mut entry = writer.try_entry(stride, index)?;
            entry.put(offsets.roughness, &material.roughness);
            entry.put(offsets.metallic, &material.metallic);
            entry.put(offsets.reflectance, &material.reflectance);
            entry.put(offsets.base_color, &material.base_color);
            entry.put(offsets.emissive, &material.emissive);
            entry.put(offsets.opacity, &material.opacity);

            let texture = material.texture;
            self.used_handles.insert(texture);
            let texture_reference = match texture_units.as_deref_mut() {
                Some(cache) => pack_texture_unit(cache.allocate(texture)),
                None => texture.raw(),
            };
            entry.put(offsets.base_texture, &texture_reference);

            material.set_buffer_index(index as u32);
        }
        Ok(writer.end())
    }

    /// Bind a range written by [`update`](Self::update).
    pub fn bind(&self, range: StreamRange) {
        self.ring.bind(range);
    }

    /// Advance to the next slot.
    pub fn next_frame(&mut self) {
        self.ring.next_frame();
    }
}
