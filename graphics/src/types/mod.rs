//! Plain data types shared between the backend and the renderer.

mod buffer;
mod common;

pub use buffer::{BufferDescriptor, BufferUsage, DrawIndirectCommand};
pub use common::Viewport;
