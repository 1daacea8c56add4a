//! Fixed-function pipeline state applied by render passes.
//!
//! A [`PipelineState`] bundles everything a pass configures before drawing:
//! shader program, vertex input, topology, rasterization, depth/stencil and
//! color blending. States are built once and applied by the backend each time
//! a pass runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use crate::mesh::PrimitiveTopology;

// ============================================================================
// Shader program
// ============================================================================

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to a linked shader program.
///
/// Programs are compiled and linked outside of this crate. The renderer only
/// needs to know whether a pass has one and which one to bind.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ShaderProgram {
    id: u64,
    name: String,
}

impl ShaderProgram {
    /// Register a program under a unique id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        }
    }

    /// Unique program id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Vertex input
// ============================================================================

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Single 32-bit unsigned integer.
    Uint,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
}

impl VertexFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Uint | Self::Unorm8x4 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

/// A single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Data format.
    pub format: VertexFormat,
    /// Byte offset within a vertex.
    pub offset: u32,
}

/// Interleaved vertex layout shared by all meshes of the vertex pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexInputState {
    /// Attributes in location order.
    pub attributes: Vec<VertexAttribute>,
    /// Bytes between consecutive vertices.
    pub stride: u32,
}

impl VertexInputState {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute at the next free location and offset.
    pub fn with_attribute(mut self, format: VertexFormat) -> Self {
        self.attributes.push(VertexAttribute {
            location: self.attributes.len() as u32,
            format,
            offset: self.stride,
        });
        self.stride += format.size();
        self
    }

    /// Position, normal, texture coordinate and color.
    pub fn position_normal_texcoord_color() -> Self {
        Self::new()
            .with_attribute(VertexFormat::Float3)
            .with_attribute(VertexFormat::Float3)
            .with_attribute(VertexFormat::Float2)
            .with_attribute(VertexFormat::Float4)
    }
}

// ============================================================================
// Rasterization
// ============================================================================

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    #[default]
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Winding order of front faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Counter-clockwise.
    #[default]
    Ccw,
    /// Clockwise.
    Cw,
}

/// Rasterization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterizationState {
    /// Face culling.
    pub cull_mode: CullMode,
    /// Front face winding.
    pub front_face: FrontFace,
}

impl RasterizationState {
    /// Draw both faces.
    pub const CULL_MODE_NONE: Self = Self {
        cull_mode: CullMode::None,
        front_face: FrontFace::Ccw,
    };

    /// Cull back faces, counter-clockwise front.
    pub const CULL_MODE_BACK_CCW: Self = Self {
        cull_mode: CullMode::Back,
        front_face: FrontFace::Ccw,
    };

    /// Cull front faces, counter-clockwise front.
    pub const CULL_MODE_FRONT_CCW: Self = Self {
        cull_mode: CullMode::Front,
        front_face: FrontFace::Ccw,
    };
}

// ============================================================================
// Depth / stencil
// ============================================================================

/// Comparison function for depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if new < existing.
    Less,
    /// Passes if new == existing.
    Equal,
    /// Passes if new <= existing.
    LessEqual,
    /// Passes if new > existing.
    Greater,
    /// Passes if new != existing.
    NotEqual,
    /// Passes if new >= existing.
    GreaterEqual,
    /// Always passes.
    #[default]
    Always,
}

impl CompareFunction {
    /// The depth comparison to use for this forward-depth comparison.
    ///
    /// With reverse depth, nearer fragments have larger depth values, so the
    /// ordering comparisons are mirrored. Equality tests are unchanged.
    pub fn for_depth(self, reverse_depth: bool) -> Self {
        if !reverse_depth {
            return self;
        }
        match self {
            Self::Less => Self::Greater,
            Self::LessEqual => Self::GreaterEqual,
            Self::Greater => Self::Less,
            Self::GreaterEqual => Self::LessEqual,
            other => other,
        }
    }
}

/// Operation applied to the stencil value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    /// Keep the current value.
    #[default]
    Keep,
    /// Set to zero.
    Zero,
    /// Set to the reference value.
    Replace,
    /// Increment, clamping at the maximum.
    Increment,
    /// Increment, wrapping to zero.
    IncrementWrap,
    /// Decrement, clamping at zero.
    Decrement,
    /// Decrement, wrapping to the maximum.
    DecrementWrap,
    /// Bitwise invert.
    Invert,
}

/// Stencil test configuration for one face orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    /// Operation when the stencil test fails.
    pub fail_op: StencilOp,
    /// Operation when the stencil test passes and the depth test fails.
    pub depth_fail_op: StencilOp,
    /// Operation when both tests pass.
    pub pass_op: StencilOp,
    /// Stencil comparison.
    pub compare: CompareFunction,
    /// Reference value.
    pub reference: u32,
    /// Mask applied to both values before comparing.
    pub test_mask: u32,
    /// Mask applied when writing.
    pub write_mask: u32,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            compare: CompareFunction::Always,
            reference: 0,
            test_mask: 0xff,
            write_mask: 0xff,
        }
    }
}

impl StencilFaceState {
    /// Write `reference` wherever the depth test passes.
    pub fn tag(reference: u32) -> Self {
        Self {
            pass_op: StencilOp::Replace,
            compare: CompareFunction::Always,
            reference,
            ..Self::default()
        }
    }

    /// Pass only where the stencil equals `reference`, leaving it unchanged.
    pub fn require(reference: u32) -> Self {
        Self {
            compare: CompareFunction::Equal,
            reference,
            ..Self::default()
        }
    }
}

/// Depth and stencil test state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    /// Whether the depth test runs.
    pub depth_test_enabled: bool,
    /// Whether passing fragments write depth.
    pub depth_write_enabled: bool,
    /// Depth comparison.
    pub depth_compare: CompareFunction,
    /// Whether the stencil test runs.
    pub stencil_test_enabled: bool,
    /// Stencil state for front faces.
    pub stencil_front: StencilFaceState,
    /// Stencil state for back faces.
    pub stencil_back: StencilFaceState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self::depth_test_disabled_stencil_test_disabled()
    }
}

impl DepthStencilState {
    /// No depth or stencil testing.
    pub fn depth_test_disabled_stencil_test_disabled() -> Self {
        Self {
            depth_test_enabled: false,
            depth_write_enabled: false,
            depth_compare: CompareFunction::Always,
            stencil_test_enabled: false,
            stencil_front: StencilFaceState::default(),
            stencil_back: StencilFaceState::default(),
        }
    }

    /// Standard depth test with writes, no stencil.
    pub fn depth_test_enabled_stencil_test_disabled(reverse_depth: bool) -> Self {
        Self {
            depth_test_enabled: true,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less.for_depth(reverse_depth),
            ..Self::depth_test_disabled_stencil_test_disabled()
        }
    }

    /// Always write depth, no stencil.
    pub fn depth_test_always_stencil_test_disabled() -> Self {
        Self {
            depth_test_enabled: true,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Always,
            ..Self::depth_test_disabled_stencil_test_disabled()
        }
    }

    /// Depth test without depth writes, same stencil state on both faces.
    pub fn stencil(
        depth_compare: CompareFunction,
        depth_write_enabled: bool,
        face: StencilFaceState,
    ) -> Self {
        Self {
            depth_test_enabled: true,
            depth_write_enabled,
            depth_compare,
            stencil_test_enabled: true,
            stencil_front: face,
            stencil_back: face,
        }
    }
}

// ============================================================================
// Color blending
// ============================================================================

/// Blend factor for blending operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    /// 0.0
    #[default]
    Zero,
    /// 1.0
    One,
    /// Source color
    Src,
    /// 1 - source color
    OneMinusSrc,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination color
    Dst,
    /// 1 - destination color
    OneMinusDst,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
    /// Constant color
    Constant,
    /// 1 - constant color
    OneMinusConstant,
    /// Constant alpha
    ConstantAlpha,
    /// 1 - constant alpha
    OneMinusConstantAlpha,
}

/// Blend operation for combining colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    /// source + destination
    #[default]
    Add,
    /// source - destination
    Subtract,
    /// destination - source
    ReverseSubtract,
    /// min(source, destination)
    Min,
    /// max(source, destination)
    Max,
}

/// Blend component configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    /// Source factor.
    pub src_factor: BlendFactor,
    /// Destination factor.
    pub dst_factor: BlendFactor,
    /// Blend operation.
    pub operation: BlendOperation,
}

impl Default for BlendComponent {
    fn default() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            operation: BlendOperation::Add,
        }
    }
}

impl BlendComponent {
    /// Premultiplied alpha blending component.
    pub fn premultiplied() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        }
    }

    /// Blend by the constant alpha.
    pub fn constant_alpha() -> Self {
        Self {
            src_factor: BlendFactor::ConstantAlpha,
            dst_factor: BlendFactor::OneMinusConstantAlpha,
            operation: BlendOperation::Add,
        }
    }
}

bitflags! {
    /// Color channels written by a pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u8 {
        /// Red channel.
        const RED = 1 << 0;
        /// Green channel.
        const GREEN = 1 << 1;
        /// Blue channel.
        const BLUE = 1 << 2;
        /// Alpha channel.
        const ALPHA = 1 << 3;
        /// All channels.
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// Color blend state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBlendState {
    /// Whether blending is enabled.
    pub enabled: bool,
    /// Color blend component.
    pub color: BlendComponent,
    /// Alpha blend component.
    pub alpha: BlendComponent,
    /// Constant blend color (RGBA).
    pub constant: [f32; 4],
    /// Channels written.
    pub write_mask: ColorWrites,
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self::color_blend_disabled()
    }
}

impl ColorBlendState {
    /// Color writes on, blending off.
    pub fn color_blend_disabled() -> Self {
        Self {
            enabled: false,
            color: BlendComponent::default(),
            alpha: BlendComponent::default(),
            constant: [0.0; 4],
            write_mask: ColorWrites::ALL,
        }
    }

    /// Premultiplied alpha blending.
    pub fn color_blend_premultiplied() -> Self {
        Self {
            enabled: true,
            color: BlendComponent::premultiplied(),
            alpha: BlendComponent::premultiplied(),
            ..Self::color_blend_disabled()
        }
    }

    /// No color writes at all (depth or stencil only passes).
    pub fn color_writes_disabled() -> Self {
        Self {
            write_mask: ColorWrites::empty(),
            ..Self::color_blend_disabled()
        }
    }

    /// Blend by a constant alpha.
    pub fn constant_alpha(alpha: f32) -> Self {
        Self {
            enabled: true,
            color: BlendComponent::constant_alpha(),
            alpha: BlendComponent::constant_alpha(),
            constant: [0.0, 0.0, 0.0, alpha],
            write_mask: ColorWrites::ALL,
        }
    }
}

// ============================================================================
// Pipeline state
// ============================================================================

/// Complete fixed-function state of a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    /// Debug name.
    pub name: String,
    /// Shader program; passes without one are skipped.
    pub shader: Option<Arc<ShaderProgram>>,
    /// Vertex input layout.
    pub vertex_input: Arc<VertexInputState>,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Rasterization state.
    pub rasterization: RasterizationState,
    /// Depth and stencil state.
    pub depth_stencil: DepthStencilState,
    /// Color blend state.
    pub color_blend: ColorBlendState,
}

impl PipelineState {
    /// Create a state with triangle topology and all tests disabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader: None,
            vertex_input: Arc::new(VertexInputState::default()),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: DepthStencilState::default(),
            color_blend: ColorBlendState::default(),
        }
    }

    /// Set the shader program.
    pub fn with_shader(mut self, shader: Arc<ShaderProgram>) -> Self {
        self.shader = Some(shader);
        self
    }

    /// Set the vertex input layout.
    pub fn with_vertex_input(mut self, vertex_input: Arc<VertexInputState>) -> Self {
        self.vertex_input = vertex_input;
        self
    }

    /// Set the topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the rasterization state.
    pub fn with_rasterization(mut self, rasterization: RasterizationState) -> Self {
        self.rasterization = rasterization;
        self
    }

    /// Set the depth and stencil state.
    pub fn with_depth_stencil(mut self, depth_stencil: DepthStencilState) -> Self {
        self.depth_stencil = depth_stencil;
        self
    }

    /// Set the color blend state.
    pub fn with_color_blend(mut self, color_blend: ColorBlendState) -> Self {
        self.color_blend = color_blend;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_depth_mirrors_ordering() {
        assert_eq!(CompareFunction::Less.for_depth(true), CompareFunction::Greater);
        assert_eq!(CompareFunction::LessEqual.for_depth(true), CompareFunction::GreaterEqual);
        assert_eq!(CompareFunction::Equal.for_depth(true), CompareFunction::Equal);
        assert_eq!(CompareFunction::Less.for_depth(false), CompareFunction::Less);
    }

    #[test]
    fn test_vertex_input_offsets() {
        let layout = VertexInputState::position_normal_texcoord_color();
        assert_eq!(layout.stride, 48);
        assert_eq!(layout.attributes[2].offset, 24);
        assert_eq!(layout.attributes[3].location, 3);
    }

    #[test]
    fn test_stencil_presets() {
        let tag = StencilFaceState::tag(2);
        assert_eq!(tag.pass_op, StencilOp::Replace);
        assert_eq!(tag.compare, CompareFunction::Always);

        let require = StencilFaceState::require(1);
        assert_eq!(require.pass_op, StencilOp::Keep);
        assert_eq!(require.compare, CompareFunction::Equal);
        assert_eq!(require.reference, 1);
    }

    #[test]
    fn test_color_writes_disabled() {
        let state = ColorBlendState::color_writes_disabled();
        assert!(state.write_mask.is_empty());
        assert!(!state.enabled);
    }

    #[test]
    fn test_program_ids_are_unique() {
        let a = ShaderProgram::new("a");
        let b = ShaderProgram::new("a");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), "a");
    }
}
