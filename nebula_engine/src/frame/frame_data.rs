/// FrameData - per-frame-in-flight resources
///
/// The engine owns `FRAME_OVERLAP` slots and uses `frames[frame_number % FRAME_OVERLAP]`.
/// A slot's private resources (command buffer, descriptor pools, deletion queue)
/// are only touched after its render fence reports that the GPU finished the
/// slot's previous submission.

use crate::descriptor::{DescriptorAllocatorGrowable, PoolSizeRatio};
use crate::error::{Error, Result};
use crate::frame::{DeletionQueue, PendingRelease};
use crate::graphics_device::{
    CommandBufferHandle, CommandPoolHandle, FenceHandle, GraphicsDevice, SemaphoreHandle,
};
use crate::engine_debug;

/// Number of frames the CPU may record ahead of the GPU
pub const FRAME_OVERLAP: usize = 2;

/// Lifecycle of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Fence signaled, resources safe to reuse
    Idle,
    /// Commands recorded, fence reset for the submission
    Recording,
    /// Submitted, fence signals on GPU completion
    Submitted,
}

/// Resources of one frame in flight
#[derive(Debug)]
pub struct FrameData {
    pub command_pool: CommandPoolHandle,
    pub command_buffer: CommandBufferHandle,
    /// Signaled by acquire, waited on by submit
    pub swapchain_semaphore: SemaphoreHandle,
    /// Signaled by submit, waited on by present
    pub render_semaphore: SemaphoreHandle,
    /// Signaled when the slot's submission completes; created signaled
    pub render_fence: FenceHandle,
    /// Objects released the next time this slot is reused
    pub deletion_queue: DeletionQueue,
    /// Descriptor sets valid for this frame only
    pub descriptors: DescriptorAllocatorGrowable,
    state: FrameState,
}

impl FrameData {
    /// Create every resource of one slot
    ///
    /// Whatever was created before a failure is released again.
    pub fn create(
        device: &dyn GraphicsDevice,
        descriptor_sets: u32,
        descriptor_ratios: &[PoolSizeRatio],
    ) -> Result<Self> {
        let mut created = DeletionQueue::new();
        match Self::create_tracked(device, descriptor_sets, descriptor_ratios, &mut created) {
            Ok(frame) => {
                // Ownership moved into the frame
                created.flush_with(|_| {});
                Ok(frame)
            }
            Err(e) => {
                created.flush(device);
                Err(e)
            }
        }
    }

    fn create_tracked(
        device: &dyn GraphicsDevice,
        descriptor_sets: u32,
        descriptor_ratios: &[PoolSizeRatio],
        created: &mut DeletionQueue,
    ) -> Result<Self> {
        let command_pool = device.create_command_pool()?;
        created.push(PendingRelease::CommandPool(command_pool));
        let command_buffer = device.allocate_command_buffer(command_pool)?;

        let render_fence = device.create_fence(true)?;
        created.push(PendingRelease::Fence(render_fence));
        let swapchain_semaphore = device.create_semaphore()?;
        created.push(PendingRelease::Semaphore(swapchain_semaphore));
        let render_semaphore = device.create_semaphore()?;
        created.push(PendingRelease::Semaphore(render_semaphore));

        let mut descriptors = DescriptorAllocatorGrowable::new();
        descriptors.init(device, descriptor_sets, descriptor_ratios)?;

        Ok(Self {
            command_pool,
            command_buffer,
            swapchain_semaphore,
            render_semaphore,
            render_fence,
            deletion_queue: DeletionQueue::new(),
            descriptors,
            state: FrameState::Idle,
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// The render fence was observed signaled
    pub fn mark_gpu_complete(&mut self) {
        self.state = FrameState::Idle;
    }

    /// Idle -> Recording, once the fence has been reset
    pub fn begin_recording(&mut self) -> Result<()> {
        self.expect_state(FrameState::Idle, FrameState::Recording)
    }

    /// Recording -> Submitted
    pub fn mark_submitted(&mut self) -> Result<()> {
        self.expect_state(FrameState::Recording, FrameState::Submitted)
    }

    fn expect_state(&mut self, from: FrameState, to: FrameState) -> Result<()> {
        if self.state != from {
            return Err(Error::InvalidResource(format!(
                "frame slot cannot go from {:?} to {:?}", self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Release everything the slot owns
    ///
    /// The caller guarantees the device is idle.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.deletion_queue.flush(device);
        self.descriptors.destroy_pools(device);
        device.destroy_semaphore(self.render_semaphore);
        device.destroy_semaphore(self.swapchain_semaphore);
        device.destroy_fence(self.render_fence);
        // Frees the command buffer with it
        device.destroy_command_pool(self.command_pool);
        engine_debug!("nebula::FrameData", "Destroyed frame slot {:?}", self.command_pool);
    }
}

#[cfg(test)]
#[path = "frame_data_tests.rs"]
mod tests;
