//! Camera stream.

use std::sync::Arc;

use crate::backend::{BufferTarget, GpuBackend};
use crate::error::GraphicsError;
use crate::resources::{RingBuffer, StreamRange};
use crate::scene::Camera;
use crate::shader::{BlockKind, FieldType, InterfaceBlock, LayoutRule, StructLayout};
use crate::types::Viewport;

use super::{bindings, slot_capacity};

#[derive(Debug, Clone, Copy)]
struct CameraOffsets {
    world_from_node: usize,
    world_from_clip: usize,
    clip_from_world: usize,
    viewport: usize,
    fov: usize,
    clip_depth_direction: usize,
    view_depth_near: usize,
    view_depth_far: usize,
    exposure: usize,
}

/// Streams the view camera into the `camera` uniform block.
#[derive(Debug)]
pub struct CameraStream {
    ring: RingBuffer,
    block: InterfaceBlock,
    offsets: CameraOffsets,
    stride: u64,
}

impl CameraStream {
    /// Create a stream holding one camera per frame.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        Self::with_updates_per_frame(backend, slot_count, 1, offset_alignment)
    }

    /// Create a stream holding `updates_per_frame` cameras per frame.
    pub fn with_updates_per_frame(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        updates_per_frame: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        let mut layout = StructLayout::new("camera", LayoutRule::Std140);
        let offsets = CameraOffsets {
            world_from_node: layout.add("world_from_node", FieldType::Mat4),
            world_from_clip: layout.add("world_from_clip", FieldType::Mat4),
            clip_from_world: layout.add("clip_from_world", FieldType::Mat4),
            viewport: layout.add("viewport", FieldType::Vec4),
            fov: layout.add("fov", FieldType::Vec4),
            clip_depth_direction: layout.add("clip_depth_direction", FieldType::Float),
            view_depth_near: layout.add("view_depth_near", FieldType::Float),
            view_depth_far: layout.add("view_depth_far", FieldType::Float),
            exposure: layout.add("exposure", FieldType::Float),
        };
        let stride = layout.stride() as u64;

        let block = InterfaceBlock {
            name: "camera",
            instance_name: "camera",
            binding: bindings::CAMERA,
            kind: BlockKind::Uniform,
            header: Some(layout),
            array: None,
        };
        let ring = RingBuffer::new(
            backend,
            "camera",
            BufferTarget::Uniform,
            bindings::CAMERA,
            slot_count,
            slot_capacity(&block, 1, updates_per_frame, offset_alignment)?,
            offset_alignment,
        )?;

        Ok(Self {
            ring,
            block,
            offsets,
            stride,
        })
    }

    /// Interface block written by this stream.
    pub fn block(&self) -> &InterfaceBlock {
        &self.block
    }

    /// The underlying ring buffer.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Write `camera` as seen through `viewport`.
    pub fn update(
        &mut self,
        camera: &Camera,
        viewport: &Viewport,
    ) -> Result<StreamRange, GraphicsError> {
        let aspect_ratio = viewport.aspect_ratio();
        let clip_from_world = camera.clip_from_world(aspect_ratio, viewport.reverse_depth);
        let world_from_clip = clip_from_world.inverse();
        let clip_depth_direction: f32 = if viewport.reverse_depth { -1.0 } else { 1.0 };

        let offsets = self.offsets;
        let stride = self.stride;
        let mut writer = self.ring.begin(stride);
        let mut entry = writer.try_entry(stride, 0)?;
        entry.put(offsets.world_from_node, &camera.world_from_node);
        entry.put(offsets.world_from_clip, &world_from_clip);
        entry.put(offsets.clip_from_world, &clip_from_world);
        entry.put(offsets.viewport, &viewport.as_vec4());
        entry.put(offsets.fov, &camera.projection.fov_sides(aspect_ratio));
        entry.put(offsets.clip_depth_direction, &clip_depth_direction);
        entry.put(offsets.view_depth_near, &camera.projection.znear());
        entry.put(offsets.view_depth_far, &camera.projection.zfar());
        entry.put(offsets.exposure, &camera.exposure);
        Ok(writer.end())
    }

    /// Bind a range written by [`update`](Self::update).
    pub fn bind(&self, range: StreamRange) {
        self.ring.bind(range);
    }

    /// Advance to the next slot.
    pub fn next_frame(&mut self) {
        self.ring.next_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use glam::{Mat4, Vec3};

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_layout() {
        let backend = Arc::new(DummyBackend::new());
        let stream = CameraStream::new(backend, 2, 256).unwrap();
        let layout = stream.block().header.as_ref().unwrap();

        assert_eq!(layout.offset_of("clip_from_world"), Some(128));
        assert_eq!(layout.offset_of("viewport"), Some(192));
        assert_eq!(layout.offset_of("fov"), Some(208));
        assert_eq!(layout.offset_of("clip_depth_direction"), Some(224));
        assert_eq!(layout.offset_of("exposure"), Some(236));
        assert_eq!(layout.stride(), 240);
    }

    #[test]
    fn test_update_writes_camera() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = CameraStream::new(backend.clone(), 2, 256).unwrap();
        let camera = Camera::new("main")
            .with_transform(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)))
            .with_exposure(0.5);
        let viewport = Viewport::from_dimensions(800, 600).with_reverse_depth(true);

        let range = stream.update(&camera, &viewport).unwrap();
        assert_eq!(range, StreamRange::new(0, 240));

        let bytes = backend.read_buffer(stream.ring().current_buffer().gpu(), 0, 240);
        // world_from_node translation column.
        assert_eq!(read_f32(&bytes, 48), 1.0);
        assert_eq!(read_f32(&bytes, 52), 2.0);
        assert_eq!(read_f32(&bytes, 56), 3.0);
        assert_eq!(read_f32(&bytes, 200), 800.0);
        assert_eq!(read_f32(&bytes, 204), 600.0);
        assert_eq!(read_f32(&bytes, 224), -1.0);
        assert_eq!(read_f32(&bytes, 228), 0.03);
        assert_eq!(read_f32(&bytes, 232), 200.0);
        assert_eq!(read_f32(&bytes, 236), 0.5);
    }

    #[test]
    fn test_updates_per_frame_bound_slot() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = CameraStream::with_updates_per_frame(backend, 2, 3, 256).unwrap();
        let camera = Camera::new("main");
        let viewport = Viewport::from_dimensions(4, 4);

        let offsets: Vec<u64> = (0..3)
            .map(|_| stream.update(&camera, &viewport).unwrap().first_byte_offset)
            .collect();
        assert_eq!(offsets, vec![0, 256, 512]);
        assert!(matches!(
            stream.update(&camera, &viewport),
            Err(GraphicsError::CapacityExceeded { stream: "camera", .. })
        ));

        stream.next_frame();
        assert_eq!(stream.update(&camera, &viewport).unwrap(), StreamRange::new(0, 240));
    }

    #[test]
    fn test_forward_depth_direction() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = CameraStream::new(backend.clone(), 2, 256).unwrap();

        stream
            .update(&Camera::new("main"), &Viewport::from_dimensions(4, 4))
            .unwrap();
        let bytes = backend.read_buffer(stream.ring().current_buffer().gpu(), 224, 4);
        assert_eq!(read_f32(&bytes, 0), 1.0);
    }
}
