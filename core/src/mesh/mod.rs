//! Mesh types read by the primitive and draw-indirect streams.
//!
//! - [`Mesh`] - Flags, world transform and primitives of one renderable item
//! - [`Primitive`] - Material and per-mode index ranges
//! - [`PrimitiveMode`] - Which index range a pass draws
//!
//! These types are re-exported by `tessera-graphics` for convenience.

mod data;

pub use data::{IndexFormat, IndexRange, Mesh, Primitive, PrimitiveMode, PrimitiveTopology};
