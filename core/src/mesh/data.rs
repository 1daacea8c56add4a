//! Mesh and primitive data consumed by the render passes.
//!
//! The renderer never touches vertex or index bytes. It only reads the
//! per-mesh flags and transform, and the per-primitive index ranges and
//! material, to build primitive entries and indirect draw commands.

use std::sync::Arc;

use glam::{Mat4, Vec4};

use crate::item::ItemFlags;
use crate::material::Material;

/// Primitive topology describing how vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Each vertex is a separate point.
    PointList,
    /// Every two vertices form a line.
    LineList,
    /// Vertices form a connected strip of lines.
    LineStrip,
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Vertices form a connected strip of triangles.
    TriangleStrip,
}

/// Index format for indexed drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit unsigned integers (max 65535 vertices).
    Uint16,
    /// 32-bit unsigned integers.
    #[default]
    Uint32,
}

impl IndexFormat {
    /// Get the size in bytes of each index.
    pub fn size(&self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Which index range of a primitive a render pass draws.
///
/// A primitive's index buffer holds several views of the same geometry:
/// filled triangles, edge lines, corner points and polygon centroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveMode {
    /// The pass draws nothing from mesh primitives.
    NotRendered,
    /// Filled polygons (triangles).
    #[default]
    PolygonFill,
    /// Polygon edges as lines.
    EdgeLines,
    /// Polygon corners as points.
    CornerPoints,
    /// Polygon centroids as points.
    PolygonCentroids,
}

impl PrimitiveMode {
    /// Topology the index range of this mode is laid out for.
    pub fn topology(self) -> PrimitiveTopology {
        match self {
            Self::NotRendered | Self::PolygonFill => PrimitiveTopology::TriangleList,
            Self::EdgeLines => PrimitiveTopology::LineList,
            Self::CornerPoints | Self::PolygonCentroids => PrimitiveTopology::PointList,
        }
    }

    fn slot(self) -> Option<usize> {
        match self {
            Self::NotRendered => None,
            Self::PolygonFill => Some(0),
            Self::EdgeLines => Some(1),
            Self::CornerPoints => Some(2),
            Self::PolygonCentroids => Some(3),
        }
    }
}

/// A contiguous range in the shared index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexRange {
    /// First index, in indices (not bytes).
    pub first_index: u32,
    /// Number of indices.
    pub index_count: u32,
}

impl IndexRange {
    /// Create a new index range.
    pub const fn new(first_index: u32, index_count: u32) -> Self {
        Self {
            first_index,
            index_count,
        }
    }

    /// Check whether the range holds no indices.
    pub const fn is_empty(&self) -> bool {
        self.index_count == 0
    }
}

/// One drawable part of a mesh with a single material.
#[derive(Debug, Clone, Default)]
pub struct Primitive {
    /// Material, or `None` to use material entry 0.
    pub material: Option<Arc<Material>>,
    /// Value added to each index before vertex lookup.
    pub base_vertex: i32,
    index_ranges: [IndexRange; 4],
}

impl Primitive {
    /// Create a primitive with no index ranges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the material.
    #[must_use]
    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = Some(material);
        self
    }

    /// Set the base vertex.
    #[must_use]
    pub fn with_base_vertex(mut self, base_vertex: i32) -> Self {
        self.base_vertex = base_vertex;
        self
    }

    /// Set the index range drawn for `mode`. Ignored for [`PrimitiveMode::NotRendered`].
    #[must_use]
    pub fn with_index_range(mut self, mode: PrimitiveMode, range: IndexRange) -> Self {
        if let Some(slot) = mode.slot() {
            self.index_ranges[slot] = range;
        }
        self
    }

    /// Index range drawn for `mode`. Empty for [`PrimitiveMode::NotRendered`].
    pub fn index_range(&self, mode: PrimitiveMode) -> IndexRange {
        mode.slot()
            .map(|slot| self.index_ranges[slot])
            .unwrap_or_default()
    }

    /// Material buffer index of this primitive's material (0 when unset).
    pub fn material_index(&self) -> u32 {
        self.material
            .as_ref()
            .map(|material| material.buffer_index())
            .unwrap_or(0)
    }
}

/// A renderable mesh: flags, a world transform and its primitives.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Mesh name.
    pub name: String,
    /// Classification bits tested by item filters.
    pub flags: ItemFlags,
    /// Transform from mesh space to world space.
    pub world_from_node: Mat4,
    /// Primitives of this mesh.
    pub primitives: Vec<Primitive>,
    /// Color used when primitives are drawn as wireframe.
    pub wireframe_color: Vec4,
    /// Point size for corner and centroid points.
    pub point_size: f32,
    /// Line width for edge lines.
    pub line_width: f32,
    /// First id assigned to this mesh's primitives in id rendering.
    pub id_offset: u32,
}

impl Mesh {
    /// Create an empty visible content mesh.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: ItemFlags::VISIBLE | ItemFlags::CONTENT,
            world_from_node: Mat4::IDENTITY,
            primitives: Vec::new(),
            wireframe_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            point_size: 4.0,
            line_width: 1.0,
            id_offset: 0,
        }
    }

    /// Set the item flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ItemFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the world transform.
    #[must_use]
    pub fn with_transform(mut self, world_from_node: Mat4) -> Self {
        self.world_from_node = world_from_node;
        self
    }

    /// Append a primitive.
    #[must_use]
    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    /// Set the wireframe color.
    #[must_use]
    pub fn with_wireframe_color(mut self, color: Vec4) -> Self {
        self.wireframe_color = color;
        self
    }

    /// Set the id offset.
    #[must_use]
    pub fn with_id_offset(mut self, id_offset: u32) -> Self {
        self.id_offset = id_offset;
        self
    }
}
