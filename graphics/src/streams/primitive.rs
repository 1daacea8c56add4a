//! Primitive stream.

use std::sync::Arc;

use glam::Vec4;

use crate::backend::{BufferTarget, GpuBackend};
use crate::error::GraphicsError;
use crate::item::ItemFilter;
use crate::mesh::Mesh;
use crate::resources::{RingBuffer, StreamRange};
use crate::shader::{BlockKind, FieldType, InterfaceBlock, LayoutRule, StructLayout};

use super::{bindings, shared_slot_capacity};

/// Where the `color` of a primitive entry comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveColorSource {
    /// The same color for every primitive.
    Constant(Vec4),
    /// The wireframe color of the owning mesh.
    MeshWireframeColor,
    /// The primitive id (`mesh.id_offset + primitive index`) encoded as
    /// 8-bit RGB, for id rendering.
    IdOffset,
}

/// Where the `size` of a primitive entry comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveSizeSource {
    /// The same size for every primitive.
    Constant(f32),
    /// The point size of the owning mesh.
    PointSize,
    /// The line width of the owning mesh.
    LineWidth,
}

/// Selects how the per-primitive color and size are filled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveInterfaceSettings {
    /// Color source.
    pub color_source: PrimitiveColorSource,
    /// Size source.
    pub size_source: PrimitiveSizeSource,
}

impl Default for PrimitiveInterfaceSettings {
    fn default() -> Self {
        Self {
            color_source: PrimitiveColorSource::Constant(Vec4::ONE),
            size_source: PrimitiveSizeSource::Constant(1.0),
        }
    }
}

impl PrimitiveInterfaceSettings {
    fn color(&self, mesh: &Mesh, id: u32) -> Vec4 {
        match self.color_source {
            PrimitiveColorSource::Constant(color) => color,
            PrimitiveColorSource::MeshWireframeColor => mesh.wireframe_color,
            PrimitiveColorSource::IdOffset => {
                let channel = |shift: u32| ((id >> shift) & 0xff) as f32 / 255.0;
                Vec4::new(channel(0), channel(8), channel(16), 1.0)
            }
        }
    }

    fn size(&self, mesh: &Mesh) -> f32 {
        match self.size_source {
            PrimitiveSizeSource::Constant(size) => size,
            PrimitiveSizeSource::PointSize => mesh.point_size,
            PrimitiveSizeSource::LineWidth => mesh.line_width,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PrimitiveOffsets {
    world_from_node: usize,
    world_from_node_normal: usize,
    color: usize,
    material_index: usize,
    size: usize,
    extra1: usize,
    extra2: usize,
}

/// Streams one entry per primitive of every admitted mesh into the
/// `primitive` storage block.
///
/// Entries are written in mesh order, then primitive order, so the entry
/// index of a primitive is the `base_instance` of its indirect draw.
#[derive(Debug)]
pub struct PrimitiveStream {
    ring: RingBuffer,
    block: InterfaceBlock,
    offsets: PrimitiveOffsets,
    stride: u64,
    settings: PrimitiveInterfaceSettings,
}

impl PrimitiveStream {
    /// Create a stream with room for `max_primitives` entries per frame,
    /// written in one update.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        max_primitives: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        Self::with_updates_per_frame(backend, slot_count, max_primitives, 1, offset_alignment)
    }

    /// Create a stream with room for `max_primitives` entries per frame,
    /// split over up to `updates_per_frame` aligned ranges.
    pub fn with_updates_per_frame(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        max_primitives: usize,
        updates_per_frame: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        let mut element = StructLayout::new("Primitive", LayoutRule::Std430);
        let offsets = PrimitiveOffsets {
            world_from_node: element.add("world_from_node", FieldType::Mat4),
            world_from_node_normal: element.add("world_from_node_normal", FieldType::Mat4),
            color: element.add("color", FieldType::Vec4),
            material_index: element.add("material_index", FieldType::Uint),
            size: element.add("size", FieldType::Float),
            extra1: element.add("extra1", FieldType::Uint),
            extra2: element.add("extra2", FieldType::Uint),
        };
        let stride = element.stride() as u64;

        let block = InterfaceBlock {
            name: "primitive",
            instance_name: "primitive",
            binding: bindings::PRIMITIVE,
            kind: BlockKind::Storage,
            header: None,
            array: Some(("primitives", element)),
        };
        let ring = RingBuffer::new(
            backend,
            "primitive",
            BufferTarget::Storage,
            bindings::PRIMITIVE,
            slot_count,
            shared_slot_capacity(
                block.name,
                block.size_bytes(max_primitives) as u64,
                updates_per_frame,
                offset_alignment,
            )?,
            offset_alignment,
        )?;

        Ok(Self {
            ring,
            block,
            offsets,
            stride,
            settings: PrimitiveInterfaceSettings::default(),
        })
    }

    /// Interface block written by this stream.
    pub fn block(&self) -> &InterfaceBlock {
        &self.block
    }

    /// Size of one primitive entry in bytes.
    pub fn entry_stride(&self) -> u64 {
        self.stride
    }

    /// The underlying ring buffer.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Color and size sources.
    pub fn settings(&self) -> &PrimitiveInterfaceSettings {
        &self.settings
    }

    /// Color and size sources, for modification.
    pub fn settings_mut(&mut self) -> &mut PrimitiveInterfaceSettings {
        &mut self.settings
    }

    /// Write the primitives of the meshes admitted by `filter`.
    pub fn update(
        &mut self,
        meshes: &[Arc<Mesh>],
        filter: &ItemFilter,
    ) -> Result<StreamRange, GraphicsError> {
        let primitive_count: usize = meshes
            .iter()
            .filter(|mesh| filter.admits(mesh.flags))
            .map(|mesh| mesh.primitives.len())
            .sum();

        let offsets = self.offsets;
        let stride = self.stride;
        let settings = self.settings;
        let mut writer = self.ring.begin(primitive_count as u64 * stride);
        let mut entry_index = 0;
        for mesh in meshes.iter().filter(|mesh| filter.admits(mesh.flags)) {
            let world_from_node_normal = mesh.world_from_node.inverse().transpose();
            let size = settings.size(mesh);
            for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
                let primitive_index = primitive_index as u32;
                let id = mesh.id_offset.wrapping_add(primitive_index);

                let mut entry = writer.try_entry(stride, entry_index)?;
                entry.put(offsets.world_from_node, &mesh.world_from_node);
                entry.put(offsets.world_from_node_normal, &world_from_node_normal);
                entry.put(offsets.color, &settings.color(mesh, id));
                entry.put(offsets.material_index, &primitive.material_index());
                entry.put(offsets.size, &size);
                entry.put(offsets.extra1, &id);
                entry.put(offsets.extra2, &primitive_index);
                entry_index += 1;
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::item::ItemFlags;
    use crate::material::Material;
    use crate::mesh::Primitive;

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn mesh(name: &str, flags: ItemFlags, primitives: usize) -> Arc<Mesh> {
        let mut mesh = Mesh::new(name).with_flags(flags);
        for _ in 0..primitives {
            mesh = mesh.with_primitive(Primitive::new());
        }
        Arc::new(mesh)
    }

    #[test]
    fn test_layout() {
        let backend = Arc::new(DummyBackend::new());
        let stream = PrimitiveStream::new(backend, 2, 16, 256).unwrap();
        let element = &stream.block().array.as_ref().unwrap().1;

        assert_eq!(element.offset_of("color"), Some(128));
        assert_eq!(element.offset_of("material_index"), Some(144));
        assert_eq!(element.offset_of("extra2"), Some(156));
        assert_eq!(stream.entry_stride(), 160);
    }

    #[test]
    fn test_filter_selects_meshes() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = PrimitiveStream::new(backend, 2, 16, 256).unwrap();
        let meshes = vec![
            mesh("visible", ItemFlags::VISIBLE, 2),
            mesh("hidden", ItemFlags::empty(), 3),
            mesh("also_visible", ItemFlags::VISIBLE | ItemFlags::TOOL, 1),
        ];
        let filter = ItemFilter::new().with_all_set(ItemFlags::VISIBLE);

        let range = stream.update(&meshes, &filter).unwrap();
        assert_eq!(range.byte_count, 3 * 160);
    }

    #[test]
    fn test_material_index_and_ids() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = PrimitiveStream::new(backend.clone(), 2, 16, 256).unwrap();
        let material = Arc::new(Material::new("m"));
        material.set_buffer_index(7);
        let meshes = vec![Arc::new(
            Mesh::new("mesh")
                .with_id_offset(100)
                .with_primitive(Primitive::new())
                .with_primitive(Primitive::new().with_material(material)),
        )];

        stream.update(&meshes, &ItemFilter::ALL).unwrap();

        let bytes = backend.read_buffer(stream.ring().current_buffer().gpu(), 0, 320);
        assert_eq!(read_u32(&bytes, 144), 0);
        assert_eq!(read_u32(&bytes, 160 + 144), 7);
        assert_eq!(read_u32(&bytes, 160 + 152), 101);
        assert_eq!(read_u32(&bytes, 160 + 156), 1);
    }

    #[test]
    fn test_color_and_size_sources() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = PrimitiveStream::new(backend.clone(), 2, 16, 256).unwrap();
        *stream.settings_mut() = PrimitiveInterfaceSettings {
            color_source: PrimitiveColorSource::IdOffset,
            size_source: PrimitiveSizeSource::PointSize,
        };
        let meshes = vec![Arc::new(
            Mesh::new("mesh")
                .with_id_offset(0x0102ff)
                .with_primitive(Primitive::new()),
        )];

        stream.update(&meshes, &ItemFilter::ALL).unwrap();

        let bytes = backend.read_buffer(stream.ring().current_buffer().gpu(), 0, 160);
        assert_eq!(read_f32(&bytes, 128), 1.0);
        assert_eq!(read_f32(&bytes, 132), 2.0 / 255.0);
        assert_eq!(read_f32(&bytes, 136), 1.0 / 255.0);
        assert_eq!(read_f32(&bytes, 148), 4.0);
    }

    #[test]
    fn test_overflow() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = PrimitiveStream::new(backend, 1, 2, 256).unwrap();
        let meshes = vec![mesh("a", ItemFlags::VISIBLE, 2), mesh("b", ItemFlags::VISIBLE, 2)];

        let first = stream.update(&meshes, &ItemFilter::ALL).err();
        let second = stream.update(&meshes, &ItemFilter::ALL).err();
        assert!(matches!(
            first,
            Some(GraphicsError::CapacityExceeded {
                stream: "primitive",
                element_index: 2,
                ..
            })
        ));
        assert_eq!(first, second);
    }
}
