//! Fixed-function pipeline state.

mod state;

pub use state::{
    BlendComponent, BlendFactor, BlendOperation, ColorBlendState, ColorWrites, CompareFunction,
    CullMode, DepthStencilState, FrontFace, PipelineState, RasterizationState, ShaderProgram,
    StencilFaceState, StencilOp, VertexAttribute, VertexFormat, VertexInputState,
};
