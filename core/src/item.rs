//! Item flags and the per-pass item filter.
//!
//! Every mesh carries an [`ItemFlags`] bitmask. Render passes select the
//! subset of meshes they draw with an [`ItemFilter`], a pure predicate over
//! that bitmask.

use bitflags::bitflags;

bitflags! {
    /// Classification bits attached to scene items.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ItemFlags: u64 {
        /// Item is visible.
        const VISIBLE = 1 << 0;
        /// Regular scene content.
        const CONTENT = 1 << 1;
        /// Item casts shadows.
        const SHADOW_CAST = 1 << 2;
        /// Item participates in id (picking) rendering.
        const ID = 1 << 3;
        /// Editor tool geometry (gizmos, handles).
        const TOOL = 1 << 4;
        /// Brush preview geometry.
        const BRUSH = 1 << 5;
        /// Item is selected.
        const SELECTED = 1 << 6;
        /// Item is rendered with the opaque passes.
        const OPAQUE = 1 << 7;
        /// Item is rendered with the translucent passes.
        const TRANSLUCENT = 1 << 8;
        /// Mesh displays a render target texture.
        const RENDERTARGET = 1 << 9;
        /// Item is shown with debug visualizations.
        const SHOW_DEBUG = 1 << 10;
        /// Input controller geometry (hands, pointers).
        const CONTROLLER = 1 << 11;
    }
}

/// Bitmask predicate selecting which items participate in a pass.
///
/// An item passes when all of the following hold:
///
/// - every bit of `require_all_bits_set` is set,
/// - at least one bit of `require_at_least_one_bit_set` is set (ignored when empty),
/// - no bit of `require_all_bits_clear` is set,
/// - at least one bit of `require_at_least_one_bit_clear` is clear (ignored when empty).
///
/// The filter holds no state, so evaluating it is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemFilter {
    /// Bits that must all be set.
    pub require_all_bits_set: ItemFlags,
    /// Bits of which at least one must be set.
    pub require_at_least_one_bit_set: ItemFlags,
    /// Bits that must all be clear.
    pub require_all_bits_clear: ItemFlags,
    /// Bits of which at least one must be clear.
    pub require_at_least_one_bit_clear: ItemFlags,
}

impl ItemFilter {
    /// A filter that admits every item.
    pub const ALL: Self = Self {
        require_all_bits_set: ItemFlags::empty(),
        require_at_least_one_bit_set: ItemFlags::empty(),
        require_all_bits_clear: ItemFlags::empty(),
        require_at_least_one_bit_clear: ItemFlags::empty(),
    };

    /// Create a filter that admits every item.
    pub fn new() -> Self {
        Self::ALL
    }

    /// Require all of `flags` to be set.
    #[must_use]
    pub fn with_all_set(mut self, flags: ItemFlags) -> Self {
        self.require_all_bits_set |= flags;
        self
    }

    /// Require at least one of `flags` to be set.
    #[must_use]
    pub fn with_any_set(mut self, flags: ItemFlags) -> Self {
        self.require_at_least_one_bit_set |= flags;
        self
    }

    /// Require all of `flags` to be clear.
    #[must_use]
    pub fn with_all_clear(mut self, flags: ItemFlags) -> Self {
        self.require_all_bits_clear |= flags;
        self
    }

    /// Require at least one of `flags` to be clear.
    #[must_use]
    pub fn with_any_clear(mut self, flags: ItemFlags) -> Self {
        self.require_at_least_one_bit_clear |= flags;
        self
    }

    /// Evaluate the filter against an item's flags.
    pub fn admits(&self, flags: ItemFlags) -> bool {
        if !flags.contains(self.require_all_bits_set) {
            return false;
        }
        if !self.require_at_least_one_bit_set.is_empty()
            && !flags.intersects(self.require_at_least_one_bit_set)
        {
            return false;
        }
        if flags.intersects(self.require_all_bits_clear) {
            return false;
        }
        if !self.require_at_least_one_bit_clear.is_empty()
            && flags.contains(self.require_at_least_one_bit_clear)
        {
            return false;
        }
        true
    }
}
