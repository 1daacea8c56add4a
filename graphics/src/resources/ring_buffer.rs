//! N-way rotated buffers for streaming per-frame data to the GPU.
//!
//! A [`RingBuffer`] owns N independent GPU buffers ("slots"). During a frame
//! the CPU writes only to the current slot while the GPU may still read the
//! slots of the previous frames. [`RingBuffer::next_frame`] advances to the
//! next slot and resets the write cursor.
//!
//! # Usage
//!
//! ```ignore
//! let mut ring = RingBuffer::new(backend, "camera", BufferTarget::Uniform, 3, 4096, 4, 256)?;
//!
//! let mut writer = ring.begin(entry_stride);
//! if let Some(mut entry) = writer.entry(entry_stride) {
//!     entry.put(0, &camera.world_from_node);
//! }
//! let range = writer.end();
//! ring.bind(range);
//!
//! // After the frame has been submitted
//! ring.next_frame();
//! ```
//!
//! # Synchronization
//!
//! Rotation is not fenced. The slot count must exceed the number of frames
//! the backend lets the GPU lag behind the CPU.

use std::sync::Arc;

use crate::backend::{BufferTarget, GpuBackend};
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, BufferUsage};

/// A contiguous region written to one slot during the current frame.
///
/// Only valid until the ring rotates past its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamRange {
    /// Byte offset of the first written byte within the slot.
    pub first_byte_offset: u64,
    /// Number of bytes written.
    pub byte_count: u64,
}

impl StreamRange {
    /// Create a new range.
    pub fn new(first_byte_offset: u64, byte_count: u64) -> Self {
        Self {
            first_byte_offset,
            byte_count,
        }
    }

    /// Get the end offset (first_byte_offset + byte_count).
    pub fn end(&self) -> u64 {
        self.first_byte_offset + self.byte_count
    }

    /// Check whether the range is empty.
    pub fn is_empty(&self) -> bool {
        self.byte_count == 0
    }
}

/// A set of N GPU buffers rotated once per frame.
///
/// # Thread Safety
///
/// `RingBuffer` is NOT thread-safe. All writes happen on the render thread.
pub struct RingBuffer {
    backend: Arc<dyn GpuBackend>,
    name: &'static str,
    target: BufferTarget,
    binding: u32,
    slots: Vec<Buffer>,
    current_slot: usize,
    capacity: u64,
    alignment: u64,
    write_offset: u64,
    staging: Vec<u8>,
}

impl RingBuffer {
    /// Create a ring of `slot_count` buffers of `capacity` bytes each.
    ///
    /// # Arguments
    ///
    /// * `backend` - The backend to create the buffers on
    /// * `name` - Stream name used in labels and log messages
    /// * `target` - Binding point kind the ranges are bound to
    /// * `binding` - Binding index of the interface block
    /// * `slot_count` - Number of slots (frames in flight)
    /// * `capacity` - Size of each slot in bytes
    /// * `alignment` - Alignment of range start offsets (must be power of 2)
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        name: &'static str,
        target: BufferTarget,
        binding: u32,
        slot_count: usize,
        capacity: u64,
        alignment: u64,
    ) -> Result<Self, GraphicsError> {
        if slot_count == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "{name} ring buffer needs at least one slot"
            )));
        }
        if capacity == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "{name} ring buffer capacity cannot be zero"
            )));
        }
        if !alignment.is_power_of_two() {
            return Err(GraphicsError::InvalidParameter(format!(
                "alignment must be a power of 2, got {alignment}"
            )));
        }

        let usage = match target {
            BufferTarget::Uniform => BufferUsage::UNIFORM,
            BufferTarget::Storage => BufferUsage::STORAGE,
            BufferTarget::DrawIndirect => BufferUsage::INDIRECT,
        } | BufferUsage::COPY_DST
            | BufferUsage::PERSISTENT_MAP;

        let slots = (0..slot_count)
            .map(|slot| {
                let descriptor =
                    BufferDescriptor::new(capacity, usage).with_label(format!("{name}_{slot}"));
                Buffer::create(backend.as_ref(), descriptor)
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Created {name} ring buffer: {slot_count} slots of {capacity} bytes, binding {binding}"
        );

        Ok(Self {
            backend,
            name,
            target,
            binding,
            slots,
            current_slot: 0,
            capacity,
            alignment,
            write_offset: 0,
            staging: Vec::new(),
        })
    }

    /// Stream name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Binding index ranges are bound to.
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Index of the slot written this frame.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Buffer of the slot written this frame.
    pub fn current_buffer(&self) -> &Buffer {
        &self.slots[self.current_slot]
    }

    /// Size of each slot in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Offset just past the last range written this frame.
    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    /// Start writing up to `max_byte_count` bytes to the current slot.
    ///
    /// The range starts at the cursor aligned to the binding offset alignment,
    /// following any ranges already written this frame. Its end is clamped
    /// to the slot capacity.
    pub fn begin(&mut self, max_byte_count: u64) -> FrameWriter<'_> {
        let first = align_up(self.write_offset, self.alignment).min(self.capacity);
        let write_end = first.saturating_add(max_byte_count).min(self.capacity);
        let mut staging = std::mem::take(&mut self.staging);
        staging.clear();
        staging.resize((write_end - first) as usize, 0);
        FrameWriter {
            ring: self,
            first_offset: first,
            write_offset: first,
            write_end,
            staging,
        }
    }

    /// Attach a range of the current slot to this ring's binding point.
    ///
    /// Empty ranges are not bound.
    pub fn bind(&self, range: StreamRange) {
        if range.is_empty() {
            log::trace!("{}: skipping bind of empty range", self.name);
            return;
        }
        self.backend.bind_buffer_range(
            self.target,
            self.binding,
            self.current_buffer().gpu(),
            range.first_byte_offset,
            range.byte_count,
        );
    }

    /// Advance to the next slot and reset the write cursor.
    pub fn next_frame(&mut self) {
        self.current_slot = (self.current_slot + 1) % self.slots.len();
        self.write_offset = 0;
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("binding", &self.binding)
            .field("slot_count", &self.slots.len())
            .field("current_slot", &self.current_slot)
            .field("capacity", &self.capacity)
            .field("write_offset", &self.write_offset)
            .finish()
    }
}

/// Write cursor into the current slot of a [`RingBuffer`].
///
/// Bytes are staged on the CPU and uploaded by [`FrameWriter::end`].
/// Offsets are absolute within the slot.
pub struct FrameWriter<'a> {
    ring: &'a mut RingBuffer,
    first_offset: u64,
    write_offset: u64,
    write_end: u64,
    staging: Vec<u8>,
}

impl FrameWriter<'_> {
    /// Offset of the next entry.
    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    /// End of the writable region.
    pub fn write_end(&self) -> u64 {
        self.write_end
    }

    /// Slot capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.ring.capacity
    }

    /// The range written so far.
    pub fn range(&self) -> StreamRange {
        StreamRange::new(self.first_offset, self.write_offset - self.first_offset)
    }

    /// Copy the bytes of element `element_index` to `offset`, which must lie
    /// within the writable region.
    pub fn write(
        &mut self,
        element_index: usize,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), GraphicsError> {
        let end = offset + bytes.len() as u64;
        if offset < self.first_offset || end > self.write_end {
            let error = self.capacity_exceeded(element_index);
            log::error!("{error}");
            return Err(error);
        }
        let start = (offset - self.first_offset) as usize;
        self.staging[start..start + bytes.len()].copy_from_slice(bytes);
        self.write_offset = self.write_offset.max(end);
        Ok(())
    }

    /// Claim the next `stride` bytes as a zeroed entry.
    ///
    /// Returns `None` when the entry would cross the end of the writable region.
    pub fn entry(&mut self, stride: u64) -> Option<EntryWriter<'_>> {
        if !self.fits(stride) {
            return None;
        }
        Some(self.claim(stride))
    }

    /// Claim the next `stride` bytes as a zeroed entry for element
    /// `element_index`, or log and return the capacity fault.
    pub fn try_entry(
        &mut self,
        stride: u64,
        element_index: usize,
    ) -> Result<EntryWriter<'_>, GraphicsError> {
        if !self.fits(stride) {
            let error = self.capacity_exceeded(element_index);
            log::error!("{error}");
            return Err(error);
        }
        Ok(self.claim(stride))
    }

    fn fits(&self, stride: u64) -> bool {
        self.write_offset + stride <= self.write_end
    }

    fn claim(&mut self, stride: u64) -> EntryWriter<'_> {
        let start = (self.write_offset - self.first_offset) as usize;
        self.write_offset += stride;
        let bytes = &mut self.staging[start..start + stride as usize];
        bytes.fill(0);
        EntryWriter { bytes }
    }

    /// Build the fault reported when `element_index` does not fit.
    pub fn capacity_exceeded(&self, element_index: usize) -> GraphicsError {
        GraphicsError::CapacityExceeded {
            stream: self.ring.name,
            capacity: self.ring.capacity,
            element_index,
            range: self.range(),
        }
    }

    /// Upload the written bytes and finalize the range.
    pub fn end(self) -> StreamRange {
        let range = self.range();
        let FrameWriter {
            ring, mut staging, ..
        } = self;
        if !range.is_empty() {
            ring.backend.write_buffer(
                ring.slots[ring.current_slot].gpu(),
                range.first_byte_offset,
                &staging[..range.byte_count as usize],
            );
        }
        log::trace!(
            "{}: wrote {} bytes at {} in slot {}",
            ring.name,
            range.byte_count,
            range.first_byte_offset,
            ring.current_slot
        );
        ring.write_offset = range.end();
        staging.clear();
        ring.staging = staging;
        range
    }
}

/// One fixed-size entry claimed by [`FrameWriter::entry`].
pub struct EntryWriter<'a> {
    bytes: &'a mut [u8],
}

impl EntryWriter<'_> {
    /// Write `value` at `field_offset` within the entry.
    pub fn put<T: bytemuck::Pod>(&mut self, field_offset: usize, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        self.bytes[field_offset..field_offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Entry size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check whether the entry has zero size.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Align a value up to the given alignment.
#[inline]
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
