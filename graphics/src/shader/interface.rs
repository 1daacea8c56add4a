//! Interface block layout.

use std::fmt::Write;

use crate::resources::align_up;

/// Memory layout rule of an interface block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutRule {
    /// Uniform block layout. Struct alignment is rounded up to 16 bytes.
    Std140,
    /// Storage block layout. Structs align to their largest member.
    Std430,
}

/// Type of a struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `float`
    Float,
    /// `int`
    Int,
    /// `uint`
    Uint,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `vec4`
    Vec4,
    /// `uvec2`, used for 64-bit texture handles.
    UVec2,
    /// `uvec4`
    UVec4,
    /// `mat4`
    Mat4,
}

impl FieldType {
    /// Size in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Vec2 | Self::UVec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 | Self::UVec4 => 16,
            Self::Mat4 => 64,
        }
    }

    /// Base alignment in bytes. Identical under std140 and std430 for
    /// non-array members.
    pub fn alignment(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Vec2 | Self::UVec2 => 8,
            Self::Vec3 | Self::Vec4 | Self::UVec4 | Self::Mat4 => 16,
        }
    }

    /// GLSL type name.
    pub fn glsl_name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::UVec2 => "uvec2",
            Self::UVec4 => "uvec4",
            Self::Mat4 => "mat4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: &'static str,
    field_type: FieldType,
    offset: usize,
}

/// Field offsets of a struct, in declaration order.
///
/// ```ignore
/// let mut layout = StructLayout::new("material", LayoutRule::Std430);
/// let roughness = layout.add("roughness", FieldType::Vec2);   // 0
/// let metallic = layout.add("metallic", FieldType::Float);    // 8
/// let base_color = layout.add("base_color", FieldType::Vec4); // 16
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    name: &'static str,
    rule: LayoutRule,
    fields: Vec<Field>,
    size: usize,
    alignment: usize,
}

impl StructLayout {
    /// Create an empty struct.
    pub fn new(name: &'static str, rule: LayoutRule) -> Self {
        Self {
            name,
            rule,
            fields: Vec::new(),
            size: 0,
            alignment: 4,
        }
    }

    /// Append a field and return its byte offset.
    pub fn add(&mut self, name: &'static str, field_type: FieldType) -> usize {
        debug_assert!(
            self.offset_of(name).is_none(),
            "duplicate field {name} in {}",
            self.name
        );
        let alignment = field_type.alignment();
        let offset = align_up(self.size as u64, alignment as u64) as usize;
        self.fields.push(Field {
            name,
            field_type,
            offset,
        });
        self.size = offset + field_type.size();
        self.alignment = self.alignment.max(alignment);
        offset
    }

    /// Struct name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Layout rule.
    pub fn rule(&self) -> LayoutRule {
        self.rule
    }

    /// Offset of a field by name.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.offset)
    }

    /// Bytes covered by the fields, without trailing padding.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment of the struct under its layout rule.
    pub fn alignment(&self) -> usize {
        match self.rule {
            LayoutRule::Std140 => align_up(self.alignment as u64, 16) as usize,
            LayoutRule::Std430 => self.alignment,
        }
    }

    /// Distance between consecutive array elements of this struct.
    pub fn stride(&self) -> usize {
        align_up(self.size as u64, self.alignment() as u64) as usize
    }

    /// GLSL struct declaration.
    pub fn glsl_declaration(&self) -> String {
        let mut source = format!("struct {}\n{{\n", self.name);
        for field in &self.fields {
            let _ = writeln!(
                source,
                "    {:<6} {}; // offset {}",
                field.field_type.glsl_name(),
                field.name,
                field.offset
            );
        }
        source.push_str("};\n");
        source
    }
}

/// Kind of interface block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// `uniform` block, std140.
    Uniform,
    /// `buffer` block, std430.
    Storage,
}

/// A uniform or storage block holding a header struct and an optional
/// unsized array of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceBlock {
    /// Block name.
    pub name: &'static str,
    /// Instance name used by shader code.
    pub instance_name: &'static str,
    /// Binding point.
    pub binding: u32,
    /// Block kind.
    pub kind: BlockKind,
    /// Fields preceding the array. Empty when the block is only an array.
    pub header: Option<StructLayout>,
    /// Array element struct and member name.
    pub array: Option<(&'static str, StructLayout)>,
}

impl InterfaceBlock {
    /// Layout rule implied by the block kind.
    pub fn rule(&self) -> LayoutRule {
        match self.kind {
            BlockKind::Uniform => LayoutRule::Std140,
            BlockKind::Storage => LayoutRule::Std430,
        }
    }

    /// Byte offset of the first array element.
    pub fn array_offset(&self) -> usize {
        match (&self.header, &self.array) {
            (Some(header), Some((_, element))) => {
                align_up(header.size() as u64, element.alignment() as u64) as usize
            }
            _ => 0,
        }
    }

    /// Bytes needed for `element_count` array elements.
    pub fn size_bytes(&self, element_count: usize) -> usize {
        let header = self.header.as_ref().map_or(0, StructLayout::stride);
        match &self.array {
            Some((_, element)) => self.array_offset() + element.stride() * element_count,
            None => header,
        }
    }

    /// GLSL declaration of the block and the structs it uses.
    pub fn glsl_declaration(&self) -> String {
        let mut source = String::new();
        if let Some((_, element)) = &self.array {
            source.push_str(&element.glsl_declaration());
            source.push('\n');
        }
        let (qualifier, layout) = match self.kind {
            BlockKind::Uniform => ("uniform", "std140"),
            BlockKind::Storage => ("buffer", "std430"),
        };
        let _ = writeln!(
            source,
            "layout({layout}, binding = {}) {qualifier} {}\n{{",
            self.binding, self.name
        );
        if let Some(header) = &self.header {
            for field in &header.fields {
                let _ = writeln!(
                    source,
                    "    {:<6} {};",
                    field.field_type.glsl_name(),
                    field.name
                );
            }
        }
        if let Some((member, element)) = &self.array {
            let _ = writeln!(source, "    {} {}[];", element.name(), member);
        }
        let _ = writeln!(source, "}} {};", self.instance_name);
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_followed_by_float_is_packed() {
        let mut layout = StructLayout::new("s", LayoutRule::Std430);
        assert_eq!(layout.add("a", FieldType::Vec2), 0);
        assert_eq!(layout.add("b", FieldType::Float), 8);
        assert_eq!(layout.add("c", FieldType::Float), 12);
        assert_eq!(layout.add("d", FieldType::Vec4), 16);
        assert_eq!(layout.stride(), 32);
    }

    #[test]
    fn test_vec4_after_float_is_padded() {
        let mut layout = StructLayout::new("s", LayoutRule::Std430);
        layout.add("a", FieldType::Float);
        assert_eq!(layout.add("b", FieldType::Vec4), 16);
        assert_eq!(layout.add("c", FieldType::Vec3), 32);
        assert_eq!(layout.add("d", FieldType::Float), 44);
    }

    #[test]
    fn test_std140_rounds_struct_alignment() {
        let mut std140 = StructLayout::new("s", LayoutRule::Std140);
        std140.add("a", FieldType::Uint);
        let mut std430 = StructLayout::new("s", LayoutRule::Std430);
        std430.add("a", FieldType::Uint);

        assert_eq!(std140.stride(), 16);
        assert_eq!(std430.stride(), 4);
    }

    #[test]
    fn test_offset_lookup() {
        let mut layout = StructLayout::new("s", LayoutRule::Std430);
        layout.add("world_from_node", FieldType::Mat4);
        layout.add("color", FieldType::Vec4);
        assert_eq!(layout.offset_of("color"), Some(64));
        assert_eq!(layout.offset_of("missing"), None);
    }

    #[test]
    fn test_block_with_header_and_array() {
        let mut header = StructLayout::new("header", LayoutRule::Std430);
        header.add("count", FieldType::Uint);
        let mut element = StructLayout::new("Entry", LayoutRule::Std430);
        element.add("value", FieldType::Vec4);

        let block = InterfaceBlock {
            name: "entries",
            instance_name: "entries",
            binding: 5,
            kind: BlockKind::Storage,
            header: Some(header),
            array: Some(("items", element)),
        };
        assert_eq!(block.array_offset(), 16);
        assert_eq!(block.size_bytes(2), 48);

        let source = block.glsl_declaration();
        assert!(source.contains("layout(std430, binding = 5) buffer entries"));
        assert!(source.contains("Entry items[];"));
        assert!(source.contains("uint   count;"));
    }
}
