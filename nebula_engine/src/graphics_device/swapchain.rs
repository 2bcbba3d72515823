/// Swapchain trait - for window presentation

use crate::error::Result;
use crate::graphics_device::{Extent2D, ImageHandle, ImageViewHandle, SemaphoreHandle};

/// Image handed out by `Swapchain::acquire_next_image`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Index into the swapchain images
    pub index: u32,
    /// The swapchain still works but no longer matches the surface exactly
    pub suboptimal: bool,
}

/// Result of a successful present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    /// Presented, but the swapchain should be recreated
    Suboptimal,
}

/// Swapchain for presenting rendered images to a window
///
/// Out-of-date surfaces are reported as `Error::SwapchainOutOfDate`, an
/// acquire that exceeds its timeout as `Error::AcquireTimeout`. Both are
/// recoverable: the engine recreates the swapchain and keeps going.
pub trait Swapchain: Send {
    /// Acquire the next presentable image
    ///
    /// # Arguments
    ///
    /// * `timeout_ns` - How long to wait for an image
    /// * `signal` - Semaphore signaled once the image is ready to be written
    fn acquire_next_image(&mut self, timeout_ns: u64, signal: SemaphoreHandle) -> Result<AcquiredImage>;

    /// Queue `image_index` for presentation once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentStatus>;

    /// Recreate the swapchain (e.g., after window resize)
    ///
    /// The caller guarantees the device is idle.
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    /// Swapchain image at `index`
    fn image(&self, index: u32) -> Option<ImageHandle>;

    /// View of the swapchain image at `index`
    fn image_view(&self, index: u32) -> Option<ImageViewHandle>;

    /// Current image extent
    fn extent(&self) -> Extent2D;

    fn image_count(&self) -> usize;
}
