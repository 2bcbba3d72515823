/// DescriptorWriter - batches descriptor writes for one set

use crate::graphics_device::{
    BufferHandle, DescriptorBufferInfo, DescriptorImageInfo, DescriptorResource,
    DescriptorSetHandle, DescriptorType, DescriptorUpdate, DescriptorWrite, GraphicsDevice,
    ImageLayout, ImageViewHandle, SamplerHandle,
};
use crate::engine_trace;

/// Accumulates image and buffer writes, then applies them to a set in one call
///
/// The info records stay owned by the writer until `clear`, so they outlive
/// the native update call. Reuse the writer across sets by calling `clear`
/// between targets.
#[derive(Debug, Clone, Default)]
pub struct DescriptorWriter {
    image_infos: Vec<DescriptorImageInfo>,
    buffer_infos: Vec<DescriptorBufferInfo>,
    writes: Vec<DescriptorWrite>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an image write
    pub fn write_image(
        &mut self,
        binding: u32,
        view: ImageViewHandle,
        sampler: SamplerHandle,
        layout: ImageLayout,
        descriptor_type: DescriptorType,
    ) -> &mut Self {
        self.image_infos.push(DescriptorImageInfo { sampler, view, layout });
        self.writes.push(DescriptorWrite {
            binding,
            descriptor_type,
            resource: DescriptorResource::Image(self.image_infos.len() - 1),
        });
        self
    }

    /// Queue a buffer write of `size` bytes starting at `offset`
    pub fn write_buffer(
        &mut self,
        binding: u32,
        buffer: BufferHandle,
        size: u64,
        offset: u64,
        descriptor_type: DescriptorType,
    ) -> &mut Self {
        self.buffer_infos.push(DescriptorBufferInfo { buffer, offset, range: size });
        self.writes.push(DescriptorWrite {
            binding,
            descriptor_type,
            resource: DescriptorResource::Buffer(self.buffer_infos.len() - 1),
        });
        self
    }

    /// Apply every pending write to `set` in a single device call
    ///
    /// Nothing is submitted when no write is pending. Pending writes are kept;
    /// call `clear` before targeting another set.
    pub fn update_set(&self, device: &dyn GraphicsDevice, set: DescriptorSetHandle) {
        if self.writes.is_empty() {
            return;
        }
        engine_trace!("nebula::DescriptorWriter", "Updating set {:?} with {} writes", set, self.writes.len());
        device.update_descriptor_set(&DescriptorUpdate {
            set,
            writes: &self.writes,
            image_infos: &self.image_infos,
            buffer_infos: &self.buffer_infos,
        });
    }

    /// Discard all pending writes and their info records
    pub fn clear(&mut self) {
        self.image_infos.clear();
        self.buffer_infos.clear();
        self.writes.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.writes.len()
    }

    pub fn writes(&self) -> &[DescriptorWrite] {
        &self.writes
    }

    pub fn image_infos(&self) -> &[DescriptorImageInfo] {
        &self.image_infos
    }

    pub fn buffer_infos(&self) -> &[DescriptorBufferInfo] {
        &self.buffer_infos
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
