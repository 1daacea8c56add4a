//! Indirect draw command stream.

use std::sync::Arc;

use crate::backend::{BufferTarget, GpuBackend};
use crate::error::GraphicsError;
use crate::item::ItemFilter;
use crate::mesh::{Mesh, PrimitiveMode};
use crate::resources::{RingBuffer, StreamRange};
use crate::types::DrawIndirectCommand;

use super::shared_slot_capacity;

/// Result of a [`DrawIndirectStream::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawIndirectUpdate {
    /// Range holding the commands.
    pub range: StreamRange,
    /// Number of commands written.
    pub draw_indirect_count: u32,
}

/// Streams indexed indirect draw commands.
///
/// Walks meshes and primitives in the same order as
/// [`PrimitiveStream`](super::PrimitiveStream), so each command's
/// `base_instance` is the entry index of its primitive in the primitive
/// range updated with the same meshes and filter. Primitives without
/// indices for the requested mode get no command but keep their entry index.
#[derive(Debug)]
pub struct DrawIndirectStream {
    ring: RingBuffer,
}

impl DrawIndirectStream {
    /// Create a stream with room for `max_draws` commands per frame,
    /// written in one update.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        max_draws: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        Self::with_updates_per_frame(backend, slot_count, max_draws, 1, offset_alignment)
    }

    /// Create a stream with room for `max_draws` commands per frame, split
    /// over up to `updates_per_frame` aligned ranges.
    pub fn with_updates_per_frame(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        max_draws: usize,
        updates_per_frame: usize,
        offset_alignment: u64,
    ) -> Result<Self, GraphicsError> {
        let capacity = shared_slot_capacity(
            "draw_indirect",
            max_draws as u64 * DrawIndirectCommand::SIZE,
            updates_per_frame,
            offset_alignment,
        )?;
        let ring = RingBuffer::new(
            backend,
            "draw_indirect",
            BufferTarget::DrawIndirect,
            0,
            slot_count,
            capacity,
            offset_alignment,
        )?;
        Ok(Self { ring })
    }

    /// Size of one command in bytes.
    pub fn entry_stride(&self) -> u64 {
        DrawIndirectCommand::SIZE
    }

    /// The underlying ring buffer.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Write one command per primitive of the meshes admitted by `filter`
    /// that has indices for `mode`.
    pub fn update(
        &mut self,
        meshes: &[Arc<Mesh>],
        mode: PrimitiveMode,
        filter: &ItemFilter,
    ) -> Result<DrawIndirectUpdate, GraphicsError> {
        let admitted = || meshes.iter().filter(move |mesh| filter.admits(mesh.flags));
        let draw_count: usize = admitted()
            .flat_map(|mesh| mesh.primitives.iter())
            .filter(|primitive| !primitive.index_range(mode).is_empty())
            .count();

        let stride = DrawIndirectCommand::SIZE;
        let mut writer = self.ring.begin(draw_count as u64 * stride);
        let mut draw_indirect_count = 0u32;
        let primitives = admitted().flat_map(|mesh| mesh.primitives.iter());
        for (base_instance, primitive) in primitives.enumerate() {
            let index_range = primitive.index_range(mode);
            if index_range.is_empty() {
                continue;
            }
            let command = DrawIndirectCommand {
                index_count: index_range.index_count,
                instance_count: 1,
                first_index: index_range.first_index,
                base_vertex: primitive.base_vertex,
                base_instance: base_instance as u32,
            };
            let mut entry = writer.try_entry(stride, draw_indirect_count as usize)?;
            entry.put(0, &command);
            draw_indirect_count += 1;
        }
        let range = writer.end();
        Ok(DrawIndirectUpdate {
            range,
            draw_indirect_count,
        })
    }

    /// Bind a range written by [`update`](Self::update) as the indirect
    /// command source.
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
    use crate::backend::{DummyBackend, RecordedCommand};
    use crate::item::ItemFlags;
    use crate::mesh::{IndexRange, Primitive};

    fn stream(backend: &Arc<DummyBackend>, max_draws: usize) -> DrawIndirectStream {
        DrawIndirectStream::new(backend.clone(), 2, max_draws, 4).unwrap()
    }

    fn read_commands(
        backend: &DummyBackend,
        stream: &DrawIndirectStream,
        count: usize,
    ) -> Vec<DrawIndirectCommand> {
        let bytes = backend.read_buffer(
            stream.ring().current_buffer().gpu(),
            0,
            count as u64 * DrawIndirectCommand::SIZE,
        );
        bytes
            .chunks_exact(DrawIndirectCommand::SIZE as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    fn cube() -> Arc<Mesh> {
        Arc::new(
            Mesh::new("cube")
                .with_primitive(
                    Primitive::new()
                        .with_base_vertex(-4)
                        .with_index_range(PrimitiveMode::PolygonFill, IndexRange::new(0, 36))
                        .with_index_range(PrimitiveMode::EdgeLines, IndexRange::new(36, 24)),
                )
                .with_primitive(
                    Primitive::new()
                        .with_index_range(PrimitiveMode::PolygonFill, IndexRange::new(60, 6)),
                ),
        )
    }

    #[test]
    fn test_commands_follow_primitives() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = stream(&backend, 8);

        let update = stream
            .update(&[cube()], PrimitiveMode::PolygonFill, &ItemFilter::ALL)
            .unwrap();
        assert_eq!(update.draw_indirect_count, 2);
        assert_eq!(update.range, StreamRange::new(0, 40));

        let commands = read_commands(&backend, &stream, 2);
        assert_eq!(
            commands,
            vec![
                DrawIndirectCommand {
                    index_count: 36,
                    instance_count: 1,
                    first_index: 0,
                    base_vertex: -4,
                    base_instance: 0,
                },
                DrawIndirectCommand {
                    index_count: 6,
                    instance_count: 1,
                    first_index: 60,
                    base_vertex: 0,
                    base_instance: 1,
                },
            ]
        );
    }

    #[test]
    fn test_empty_ranges_keep_base_instance() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = stream(&backend, 8);
        let meshes = vec![cube(), cube()];

        let update = stream
            .update(&meshes, PrimitiveMode::EdgeLines, &ItemFilter::ALL)
            .unwrap();
        assert_eq!(update.draw_indirect_count, 2);

        let commands = read_commands(&backend, &stream, 2);
        let base_instances: Vec<u32> = commands.iter().map(|c| c.base_instance).collect();
        assert_eq!(base_instances, vec![0, 2]);
    }

    #[test]
    fn test_empty_span_writes_nothing() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = stream(&backend, 8);

        let update = stream
            .update(&[], PrimitiveMode::PolygonFill, &ItemFilter::ALL)
            .unwrap();
        assert_eq!(update.draw_indirect_count, 0);
        assert!(update.range.is_empty());
        assert!(!backend
            .commands()
            .iter()
            .any(|command| matches!(command, RecordedCommand::WriteBuffer { .. })));
    }

    #[test]
    fn test_filtered_and_not_rendered() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = stream(&backend, 8);
        let hidden = Arc::new(
            Mesh::new("hidden")
                .with_flags(ItemFlags::empty())
                .with_primitive(
                    Primitive::new()
                        .with_index_range(PrimitiveMode::PolygonFill, IndexRange::new(0, 3)),
                ),
        );
        let filter = ItemFilter::new().with_all_set(ItemFlags::VISIBLE);

        let filtered = stream
            .update(&[hidden], PrimitiveMode::PolygonFill, &filter)
            .unwrap();
        assert_eq!(filtered.draw_indirect_count, 0);

        let not_rendered = stream
            .update(&[cube()], PrimitiveMode::NotRendered, &ItemFilter::ALL)
            .unwrap();
        assert_eq!(not_rendered.draw_indirect_count, 0);
    }

    #[test]
    fn test_overflow() {
        let backend = Arc::new(DummyBackend::new());
        let mut stream = stream(&backend, 1);

        let result = stream.update(&[cube()], PrimitiveMode::PolygonFill, &ItemFilter::ALL);
        assert!(matches!(
            result,
            Err(GraphicsError::CapacityExceeded {
                stream: "draw_indirect",
                element_index: 1,
                ..
            })
        ));
    }
}
