//! GPU resources owned by the renderer.

mod buffer;
mod ring_buffer;

pub use buffer::Buffer;
pub use ring_buffer::{EntryWriter, FrameWriter, RingBuffer, StreamRange};

pub(crate) use ring_buffer::align_up;
