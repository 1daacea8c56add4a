//! Camera and light inputs of a rendered frame.
//!
//! - [`Camera`] / [`Projection`] - View and projection parameters
//! - [`Light`] / [`LightType`] - Punctual and directional lights
//! - [`LightProjections`] - Shadow-map transforms computed per light

mod camera;
mod light;

pub use camera::{Camera, Projection};
pub use light::{Light, LightProjectionTransforms, LightProjections, LightType};
