use glam::{Mat4, Vec4};

/// Camera projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection.
    Perspective {
        /// Vertical field of view in radians.
        yfov: f32,
        /// Near clipping plane distance.
        znear: f32,
        /// Far clipping plane distance.
        zfar: f32,
    },
    /// Orthographic projection.
    Orthographic {
        /// Height of the view volume in world units.
        height: f32,
        /// Near clipping plane distance.
        znear: f32,
        /// Far clipping plane distance.
        zfar: f32,
    },
}

impl Projection {
    /// Near clipping plane distance.
    pub fn znear(&self) -> f32 {
        match *self {
            Self::Perspective { znear, .. } | Self::Orthographic { znear, .. } => znear,
        }
    }

    /// Far clipping plane distance.
    pub fn zfar(&self) -> f32 {
        match *self {
            Self::Perspective { zfar, .. } | Self::Orthographic { zfar, .. } => zfar,
        }
    }

    /// Clip-from-view matrix with a [0, 1] depth range.
    ///
    /// With `reverse_depth` the near plane maps to depth 1 and the far plane to 0.
    pub fn clip_from_node(&self, aspect_ratio: f32, reverse_depth: bool) -> Mat4 {
        let (near, far) = if reverse_depth {
            (self.zfar(), self.znear())
        } else {
            (self.znear(), self.zfar())
        };
        match *self {
            Self::Perspective { yfov, .. } => Mat4::perspective_rh(yfov, aspect_ratio, near, far),
            Self::Orthographic { height, .. } => {
                let half_height = height * 0.5;
                let half_width = half_height * aspect_ratio;
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, near, far)
            }
        }
    }

    /// Field of view angles `(left, right, up, down)` in radians.
    ///
    /// Orthographic projections have no angular field of view and return zero.
    pub fn fov_sides(&self, aspect_ratio: f32) -> Vec4 {
        match *self {
            Self::Perspective { yfov, .. } => {
                let half_y = yfov * 0.5;
                let half_x = (aspect_ratio * half_y.tan()).atan();
                Vec4::new(-half_x, half_x, half_y, -half_y)
            }
            Self::Orthographic { .. } => Vec4::ZERO,
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            yfov: std::f32::consts::FRAC_PI_3,
            znear: 0.03,
            zfar: 200.0,
        }
    }
}

/// A camera placed in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera name.
    pub name: String,
    /// Projection parameters.
    pub projection: Projection,
    /// Transform from camera space to world space.
    pub world_from_node: Mat4,
    /// Exposure multiplier applied by the shaders.
    pub exposure: f32,
}

impl Camera {
    /// Create a camera at the origin with the default projection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            projection: Projection::default(),
            world_from_node: Mat4::IDENTITY,
            exposure: 1.0,
        }
    }

    /// Set the projection.
    #[must_use]
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Set the world transform.
    #[must_use]
    pub fn with_transform(mut self, world_from_node: Mat4) -> Self {
        self.world_from_node = world_from_node;
        self
    }

    /// Set the exposure.
    #[must_use]
    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    /// Clip-from-world matrix for the given aspect ratio.
    pub fn clip_from_world(&self, aspect_ratio: f32, reverse_depth: bool) -> Mat4 {
        self.projection.clip_from_node(aspect_ratio, reverse_depth) * self.world_from_node.inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_perspective_depth_direction() {
        let projection = Projection::Perspective {
            yfov: 1.0,
            znear: 1.0,
            zfar: 100.0,
        };
        let near_point = Vec4::new(0.0, 0.0, -1.0, 1.0);

        let forward = projection.clip_from_node(1.0, false) * near_point;
        assert!((forward.z / forward.w).abs() < 1e-5);

        let reverse = projection.clip_from_node(1.0, true) * near_point;
        assert!((reverse.z / reverse.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_fov_sides_symmetric() {
        let fov = Projection::default().fov_sides(1.0);
        assert!((fov.x + fov.y).abs() < 1e-6);
        assert!((fov.z + fov.w).abs() < 1e-6);
        assert!((fov.z - std::f32::consts::FRAC_PI_6).abs() < 1e-6);
    }

    #[test]
    fn test_clip_from_world_uses_inverse_transform() {
        let camera = Camera::new("camera")
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)));
        let clip = camera.clip_from_world(1.0, false) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.w > 0.0);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
    }
}
