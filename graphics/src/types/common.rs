//! Common types shared across the graphics system.

/// Rectangle of the framebuffer a frame is rendered to.
///
/// Coordinates follow the OpenGL window convention: origin at the bottom-left
/// corner, sizes in pixels. Depth is mapped to `[0, 1]`; with `reverse_depth`
/// the near plane maps to 1 and the far plane to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// X coordinate of the lower-left corner.
    pub x: i32,
    /// Y coordinate of the lower-left corner.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether projections use reversed depth.
    pub reverse_depth: bool,
}

impl Viewport {
    /// Create a viewport with forward depth.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            reverse_depth: false,
        }
    }

    /// Create a viewport covering `width` x `height` pixels from the origin.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Set reverse depth.
    pub fn with_reverse_depth(mut self, reverse_depth: bool) -> Self {
        self.reverse_depth = reverse_depth;
        self
    }

    /// Width divided by height, or 1.0 for an empty viewport.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Check whether the viewport covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Viewport as `(x, y, width, height)` floats, the layout shaders read.
    pub fn as_vec4(&self) -> glam::Vec4 {
        glam::Vec4::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}
