/// DeletionQueue - deferred GPU object teardown in reverse acquisition order

use crate::graphics_device::{
    AllocatedBuffer, CommandPoolHandle, DescriptorPoolHandle, DescriptorSetLayoutHandle,
    FenceHandle, GraphicsDevice, PipelineHandle, PipelineLayoutHandle, SemaphoreHandle,
    ShaderModuleHandle,
};
use crate::{engine_trace, engine_warn};

/// One GPU object waiting to be released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRelease {
    /// Buffer plus its backing allocation
    Buffer(AllocatedBuffer),
    DescriptorPool(DescriptorPoolHandle),
    DescriptorSetLayout(DescriptorSetLayoutHandle),
    Pipeline(PipelineHandle),
    PipelineLayout(PipelineLayoutHandle),
    ShaderModule(ShaderModuleHandle),
    CommandPool(CommandPoolHandle),
    Fence(FenceHandle),
    Semaphore(SemaphoreHandle),
}

impl PendingRelease {
    /// Release the object through the device
    pub fn release(self, device: &dyn GraphicsDevice) {
        match self {
            PendingRelease::Buffer(buffer) => device.destroy_buffer(&buffer),
            PendingRelease::DescriptorPool(pool) => device.destroy_descriptor_pool(pool),
            PendingRelease::DescriptorSetLayout(layout) => device.destroy_descriptor_set_layout(layout),
            PendingRelease::Pipeline(pipeline) => device.destroy_pipeline(pipeline),
            PendingRelease::PipelineLayout(layout) => device.destroy_pipeline_layout(layout),
            PendingRelease::ShaderModule(module) => device.destroy_shader_module(module),
            PendingRelease::CommandPool(pool) => device.destroy_command_pool(pool),
            PendingRelease::Fence(fence) => device.destroy_fence(fence),
            PendingRelease::Semaphore(semaphore) => device.destroy_semaphore(semaphore),
        }
    }
}

/// LIFO list of pending releases
///
/// Objects are pushed in acquisition order and released newest first, so an
/// object is always gone before the objects it was built from.
#[derive(Debug, Default)]
pub struct DeletionQueue {
    entries: Vec<PendingRelease>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PendingRelease) {
        self.entries.push(entry);
    }

    /// Release every entry, newest first, and empty the queue
    pub fn flush(&mut self, device: &dyn GraphicsDevice) {
        self.flush_with(|entry| entry.release(device));
    }

    /// Drain the queue newest first through `release`
    pub fn flush_with<F: FnMut(PendingRelease)>(&mut self, mut release: F) {
        if self.entries.is_empty() {
            return;
        }
        engine_trace!("nebula::DeletionQueue", "Flushing {} pending releases", self.entries.len());
        while let Some(entry) = self.entries.pop() {
            release(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PendingRelease> {
        self.entries.iter()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            engine_warn!("nebula::DeletionQueue",
                "Dropped with {} unreleased GPU objects", self.entries.len());
        }
    }
}

#[cfg(test)]
#[path = "deletion_queue_tests.rs"]
mod tests;
