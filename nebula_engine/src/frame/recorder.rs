/// FrameRecorder - the collaborator that fills a frame's command buffer

use crate::descriptor::DescriptorAllocatorGrowable;
use crate::error::Result;
use crate::frame::DeletionQueue;
use crate::graphics_device::{
    CommandBufferHandle, Extent2D, GraphicsDevice, ImageHandle, ImageLayout, ImageViewHandle,
};

/// Everything a recorder may use while one frame is being recorded
///
/// Descriptor sets allocated from `descriptors` and objects pushed on
/// `deletion_queue` live until this slot is reused, `FRAME_OVERLAP` frames later.
pub struct FrameContext<'a> {
    pub device: &'a dyn GraphicsDevice,
    /// Command buffer in the recording state
    pub command_buffer: CommandBufferHandle,
    /// Acquired swapchain image, in `ImageLayout::Undefined`
    pub image: ImageHandle,
    pub image_view: ImageViewHandle,
    pub image_index: u32,
    pub extent: Extent2D,
    pub frame_number: u64,
    pub descriptors: &'a mut DescriptorAllocatorGrowable,
    pub deletion_queue: &'a mut DeletionQueue,
}

/// Records the draw commands of one frame
///
/// The recorder must leave the swapchain image in `ImageLayout::PresentSrc`.
pub trait FrameRecorder {
    fn record(&mut self, frame: &mut FrameContext<'_>) -> Result<()>;
}

/// Clears the swapchain image to a blue that pulses with the frame number
#[derive(Debug, Clone, Copy, Default)]
pub struct FlashClearRecorder;

impl FlashClearRecorder {
    /// Clear color for `frame_number`: blue = |sin(frame / 120)|
    pub fn clear_color(frame_number: u64) -> [f32; 4] {
        let flash = (frame_number as f64 / 120.0).sin().abs() as f32;
        [0.0, 0.0, flash, 1.0]
    }
}

impl FrameRecorder for FlashClearRecorder {
    fn record(&mut self, frame: &mut FrameContext<'_>) -> Result<()> {
        let device = frame.device;
        let cmd = frame.command_buffer;

        device.cmd_transition_image(cmd, frame.image, ImageLayout::Undefined, ImageLayout::General);
        device.cmd_clear_color_image(
            cmd,
            frame.image,
            ImageLayout::General,
            Self::clear_color(frame.frame_number),
        );
        device.cmd_transition_image(cmd, frame.image, ImageLayout::General, ImageLayout::PresentSrc);
        Ok(())
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
