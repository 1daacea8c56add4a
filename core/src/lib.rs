//! # Tessera Core
//!
//! Scene-side inputs of the Tessera renderer: materials, meshes, cameras,
//! lights, texture handles and the item flags render passes filter on.

pub mod item;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod texture;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
