//! Shader interface descriptions shared by the CPU and GPU sides.
//!
//! - [`StructLayout`] - Field offsets of one interface struct under std140/std430
//! - [`InterfaceBlock`] - A uniform or storage block bound at a fixed binding
//!
//! The offset tables used by the streams come from these descriptions, and
//! the same descriptions produce the GLSL declarations included by shaders.

mod interface;

pub use interface::{BlockKind, FieldType, InterfaceBlock, LayoutRule, StructLayout};
