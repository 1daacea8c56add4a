//! Typed streams of per-frame scene data.
//!
//! Each stream owns a [`RingBuffer`](crate::resources::RingBuffer) and the
//! [`InterfaceBlock`](crate::shader::InterfaceBlock) describing its entries.
//! `update` serializes a collection into the current slot at the offsets of
//! the block layout and returns the written [`StreamRange`]; `bind` attaches
//! that range to the block's binding point.
//!
//! | Stream | Block | Binding |
//! |--------|-------|---------|
//! | [`MaterialStream`] | `material` (storage) | 0 |
//! | [`LightStream`] | `light_block` (storage) | 1 |
//! | [`LightStream`] control | `light_control_block` (uniform) | 2 |
//! | [`CameraStream`] | `camera` (uniform) | 3 |
//! | [`PrimitiveStream`] | `primitive` (storage) | 4 |
//! | [`DrawIndirectStream`] | indirect commands | - |

mod camera;
mod draw_indirect;
mod light;
mod material;
mod primitive;

pub use camera::CameraStream;
pub use draw_indirect::{DrawIndirectStream, DrawIndirectUpdate};
pub use light::LightStream;
pub use material::MaterialStream;
pub use primitive::{
    PrimitiveColorSource, PrimitiveInterfaceSettings, PrimitiveSizeSource, PrimitiveStream,
};

use crate::error::GraphicsError;
use crate::resources::align_up;
use crate::shader::InterfaceBlock;

/// Binding points of the interface blocks.
pub mod bindings {
    /// Material storage block.
    pub const MATERIAL: u32 = 0;
    /// Light storage block.
    pub const LIGHT: u32 = 1;
    /// Light control uniform block.
    pub const LIGHT_CONTROL: u32 = 2;
    /// Camera uniform block.
    pub const CAMERA: u32 = 3;
    /// Primitive storage block.
    pub const PRIMITIVE: u32 = 4;
}

/// Slot size for `updates` ranges per frame, each holding up to
/// `max_count` entries of `block` and starting at an aligned offset.
fn slot_capacity(
    block: &InterfaceBlock,
    max_count: usize,
    updates: usize,
    alignment: u64,
) -> Result<u64, GraphicsError> {
    let size = block.size_bytes(max_count) as u64;
    check_budget(block.name, size, updates, alignment)?;
    Ok(align_up(size, alignment) * (updates as u64 - 1) + size)
}

/// Slot size for `updates` ranges per frame sharing `total_bytes`, each
/// starting at an aligned offset.
fn shared_slot_capacity(
    name: &str,
    total_bytes: u64,
    updates: usize,
    alignment: u64,
) -> Result<u64, GraphicsError> {
    check_budget(name, total_bytes, updates, alignment)?;
    Ok(total_bytes + (alignment - 1) * (updates as u64 - 1))
}

fn check_budget(name: &str, size: u64, updates: usize, alignment: u64) -> Result<(), GraphicsError> {
    if size == 0 || updates == 0 {
        return Err(GraphicsError::InvalidParameter(format!(
            "{name} stream needs room for at least one entry per frame"
        )));
    }
    if !alignment.is_power_of_two() {
        return Err(GraphicsError::InvalidParameter(format!(
            "alignment must be a power of 2, got {alignment}"
        )));
    }
    Ok(())
}
