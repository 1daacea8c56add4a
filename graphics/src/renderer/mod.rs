//! Render passes and the forward renderer.
//!
//! - [`RenderPass`] - Pipeline state, primitive mode, filter and hooks of one pass
//! - [`ForwardRenderer`] - Streams a frame's scene data and runs passes over it
//! - [`EditorPasses`] - The standard passes of the editor viewport

mod editor_passes;
mod forward;
mod pass;

pub use editor_passes::{
    BlendMode, EditorPassShaders, EditorPasses, FillMode, HIDDEN_LINE_ALPHA, HIDDEN_TOOL_ALPHA,
    OutlineStyle, STENCIL_TOOL_MESH_HIDDEN, STENCIL_TOOL_MESH_VISIBLE, SelectionMode,
    ViewportLayers, apply_blend_mode, apply_selection_mode, brush_filter, content_filter,
    rendertarget_filter, tool_filter,
};
pub use forward::{ForwardRenderer, RenderParameters};
pub use pass::{PassHook, RenderPass};
