//! Light stream and light control block.

use std::sync::Arc;

use glam::{Mat4, Vec4};

use crate::backend::{BufferTarget, GpuBackend};
use crate::error::GraphicsError;
use crate::resources::{RingBuffer, StreamRange};
use crate::scene::{Light, LightProjections, LightType};
use crate::shader::{BlockKind, FieldType, InterfaceBlock, LayoutRule, StructLayout};

use super::{bindings, slot_capacity};

#[derive(Debug, Clone, Copy)]
struct HeaderOffsets {
    shadow_texture: usize,
    directional_light_count: usize,
    spot_light_count: usize,
    point_light_count: usize,
    ambient_light: usize,
}

#[derive(Debug, Clone, Copy)]
struct LightOffsets {
    clip_from_world: usize,
    texture_from_world: usize,
    position_and_inner_spot_cos: usize,
    direction_and_outer_spot_cos: usize,
    radiance_and_range: usize,
}

/// Streams lights into the `light_block` storage block, and the index of
/// the light rendered by shadow passes into the `light_control_block`
/// uniform block.
///
/// Lights are written grouped by type: directional lights first, then spot
/// lights, then point lights. The header holds the count of each group.
#[derive(Debug)]
pub struct LightStream {
    ring: RingBuffer,
    control_ring: RingBuffer,
    block: InterfaceBlock,
    control_block: InterfaceBlock,
    header_offsets: HeaderOffsets,
    light_offsets: LightOffsets,
    light_index_offset: usize,
    header_size: u64,
    light_stride: u64,
    control_stride: u64,
    max_lights: usize,
}

impl LightStream {
    /// Create a stream with room for one update of `max_lights` lights per
    /// frame.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        max_lights: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        Self::with_updates_per_frame(backend, slot_count, max_lights, 1, offset_alignment)
    }

    /// Create a stream with room for `updates_per_frame` updates of up to
    /// `max_lights` lights each per frame.
    ///
    /// The control ring holds one light index per shadow casting light or
    /// per update, whichever is more.
    pub fn with_updates_per_frame(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        max_lights: usize,
        updates_per_frame: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        let mut header = StructLayout::new("light_block", LayoutRule::Std430);
        let shadow_texture = header.add("shadow_texture", FieldType::UVec2);
        header.add("reserved_1", FieldType::UVec2);
        let directional_light_count = header.add("directional_light_count", FieldType::Uint);
        let spot_light_count = header.add("spot_light_count", FieldType::Uint);
        let point_light_count = header.add("point_light_count", FieldType::Uint);
        header.add("reserved_0", FieldType::Uint);
        let ambient_light = header.add("ambient_light", FieldType::Vec4);
        let header_offsets = HeaderOffsets {
            shadow_texture,
            directional_light_count,
            spot_light_count,
            point_light_count,
            ambient_light,
        };

        let mut element = StructLayout::new("Light", LayoutRule::Std430);
        let light_offsets = LightOffsets {
            clip_from_world: element.add("clip_from_world", FieldType::Mat4),
            texture_from_world: element.add("texture_from_world", FieldType::Mat4),
            position_and_inner_spot_cos: element
                .add("position_and_inner_spot_cos", FieldType::Vec4),
            direction_and_outer_spot_cos: element
                .add("direction_and_outer_spot_cos", FieldType::Vec4),
            radiance_and_range: element.add("radiance_and_range", FieldType::Vec4),
        };
        let light_stride = element.stride() as u64;

        let block = InterfaceBlock {
            name: "light_block",
            instance_name: "light_block",
            binding: bindings::LIGHT,
            kind: BlockKind::Storage,
            header: Some(header),
            array: Some(("lights", element)),
        };
        let header_size = block.array_offset() as u64;

        let mut control = StructLayout::new("light_control_block", LayoutRule::Std140);
        let light_index_offset = control.add("light_index", FieldType::Uint);
        let control_stride = control.stride() as u64;
        let control_block = InterfaceBlock {
            name: "light_control_block",
            instance_name: "light_control",
            binding: bindings::LIGHT_CONTROL,
            kind: BlockKind::Uniform,
            header: Some(control),
            array: None,
        };

        let ring = RingBuffer::new(
            backend.clone(),
            "light",
            BufferTarget::Storage,
            bindings::LIGHT,
            slot_count,
            slot_capacity(&block, max_lights, updates_per_frame, offset_alignment)?,
            offset_alignment,
        )?;
        let control_capacity = slot_capacity(
            &control_block,
            0,
            max_lights.max(updates_per_frame),
            offset_alignment,
        )?;
        let control_ring = RingBuffer::new(
            backend,
            "light_control",
            BufferTarget::Uniform,
            bindings::LIGHT_CONTROL,
            slot_count,
            control_capacity,
            offset_alignment,
        )?;

        Ok(Self {
            ring,
            control_ring,
            block,
            control_block,
            header_offsets,
            light_offsets,
            light_index_offset,
            header_size,
            light_stride,
            control_stride,
            max_lights,
        })
    }

    /// Interface block of the light array.
    pub fn block(&self) -> &InterfaceBlock {
        &self.block
    }

    /// Interface block of the light control uniform.
    pub fn control_block(&self) -> &InterfaceBlock {
        &self.control_block
    }

    /// Size of one light entry in bytes.
    pub fn entry_stride(&self) -> u64 {
        self.light_stride
    }

    /// The light array ring buffer.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// The light control ring buffer.
    pub fn control_ring(&self) -> &RingBuffer {
        &self.control_ring
    }

    /// Write the header and `lights` to the current slot.
    ///
    /// `shadow_texture` is the bindless handle of the shadow map, or a packed
    /// texture unit in bound mode. Lights without shadow projections get
    /// identity transforms.
    pub fn update(
        &mut self,
        lights: &[Arc<Light>],
        projections: &LightProjections,
        ambient_light: Vec4,
        shadow_texture: u64,
    ) -> Result<StreamRange, GraphicsError> {
        let count_of = |light_type: LightType| {
            lights
                .iter()
                .filter(|light| light.light_type == light_type)
                .count() as u32
        };
        let header = self.header_offsets;
        let offsets = self.light_offsets;
        let light_stride = self.light_stride;

        let light_count = lights.len().min(self.max_lights) as u64;
        let mut writer = self
            .ring
            .begin(self.header_size + light_count * light_stride);
        {
            let mut entry = writer.try_entry(self.header_size, 0)?;
            entry.put(header.shadow_texture, &shadow_texture);
            entry.put(header.directional_light_count, &count_of(LightType::Directional));
            entry.put(header.spot_light_count, &count_of(LightType::Spot));
            entry.put(header.point_light_count, &count_of(LightType::Point));
            entry.put(header.ambient_light, &ambient_light);
        }

        let grouped = [LightType::Directional, LightType::Spot, LightType::Point]
            .into_iter()
            .flat_map(|light_type| {
                lights
                    .iter()
                    .filter(move |light| light.light_type == light_type)
            });
        for (index, light) in grouped.enumerate() {
            let (clip_from_world, texture_from_world) = projections
                .transforms_for(light)
                .map_or((Mat4::IDENTITY, Mat4::IDENTITY), |transforms| {
                    (transforms.clip_from_world, transforms.texture_from_world)
                });
            let inner_spot_cos = (light.inner_spot_angle * 0.5).cos();
            let outer_spot_cos = (light.outer_spot_angle * 0.5).cos();

            let mut entry = writer.try_entry(light_stride, index)?;
            entry.put(offsets.clip_from_world, &clip_from_world);
            entry.put(offsets.texture_from_world, &texture_from_world);
            entry.put(
                offsets.position_and_inner_spot_cos,
                &light.position().extend(inner_spot_cos),
            );
            entry.put(
                offsets.direction_and_outer_spot_cos,
                &light.direction().extend(outer_spot_cos),
            );
            entry.put(
                offsets.radiance_and_range,
                &light.radiance().extend(light.range),
            );
        }
        Ok(writer.end())
    }

    /// Write the light control block selecting `light_index`.
    pub fn update_control(&mut self, light_index: u32) -> Result<StreamRange, GraphicsError> {
        let stride = self.control_stride;
        let mut writer = self.control_ring.begin(stride);
        let mut entry = writer.try_entry(stride, 0)?;
        entry.put(self.light_index_offset, &light_index);
        Ok(writer.end())
    }

    /// Bind a range written by [`update`](Self::update).
    pub fn bind_light_buffer(&self, range: StreamRange) {
        self.ring.bind(range);
    }

    /// Bind a range written by [`update_control`](Self::update_control).
    pub fn bind_control_buffer(&self, range: StreamRange) {
        self.control_ring.bind(range);
    }

    /// Advance both rings to their next slot.
    pub fn next_frame(&mut self) {
        self.ring.next_frame();
        self.control_ring.next_frame();
    }
}
