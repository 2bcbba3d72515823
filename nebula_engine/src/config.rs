//! Engine configuration
//!
//! Plain struct with defaults. Backends read the window/validation/present
//! fields, the engine reads the timeouts and descriptor sizing.

use std::time::Duration;
use crate::error::{Error, Result};
use crate::graphics_device::{DescriptorType, Extent2D, PresentMode};
use crate::descriptor::PoolSizeRatio;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name (window title, Vulkan application info)
    pub app_name: String,

    /// Initial window width in pixels
    pub window_width: u32,

    /// Initial window height in pixels
    pub window_height: u32,

    /// Enable backend validation layers (debug builds by default)
    pub enable_validation: bool,

    /// Swapchain presentation mode
    pub present_mode: PresentMode,

    /// Timeout for the per-frame render fence wait; exceeding it is fatal
    pub fence_timeout_ns: u64,

    /// Timeout for swapchain image acquisition
    pub acquire_timeout_ns: u64,

    /// Sleep between event polls while the window is minimized
    pub minimized_poll_interval: Duration,

    /// Initial set capacity of each frame slot's descriptor allocator
    pub frame_descriptor_sets: u32,

    /// Descriptor mix reserved by the per-frame pools
    pub frame_descriptor_ratios: Vec<PoolSizeRatio>,

    /// Initial set capacity of the engine-lifetime descriptor allocator
    pub global_descriptor_sets: u32,

    /// Descriptor mix reserved by the engine-lifetime pools
    pub global_descriptor_ratios: Vec<PoolSizeRatio>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Nebula".to_string(),
            window_width: 1700,
            window_height: 900,
            enable_validation: cfg!(debug_assertions),
            present_mode: PresentMode::Fifo,
            fence_timeout_ns: u64::MAX,
            acquire_timeout_ns: 1_000_000_000,
            minimized_poll_interval: Duration::from_millis(100),
            frame_descriptor_sets: 1000,
            frame_descriptor_ratios: vec![
                PoolSizeRatio::new(DescriptorType::StorageImage, 3.0),
                PoolSizeRatio::new(DescriptorType::StorageBuffer, 3.0),
                PoolSizeRatio::new(DescriptorType::UniformBuffer, 3.0),
                PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 4.0),
            ],
            global_descriptor_sets: 10,
            global_descriptor_ratios: vec![
                PoolSizeRatio::new(DescriptorType::StorageImage, 1.0),
                PoolSizeRatio::new(DescriptorType::UniformBuffer, 1.0),
                PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 1.0),
            ],
        }
    }
}

impl Config {
    /// Reject configurations the engine cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(Error::InitializationFailed(format!(
                "Window extent must be non-zero, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        if self.frame_descriptor_sets == 0 {
            return Err(Error::InitializationFailed(
                "frame_descriptor_sets must be greater than zero".to_string(),
            ));
        }
        if self.global_descriptor_sets == 0 {
            return Err(Error::InitializationFailed(
                "global_descriptor_sets must be greater than zero".to_string(),
            ));
        }
        let ratios = self.frame_descriptor_ratios.iter()
            .chain(self.global_descriptor_ratios.iter());
        for ratio in ratios {
            if !(ratio.ratio > 0.0) {
                return Err(Error::InitializationFailed(format!(
                    "Descriptor ratio for {:?} must be positive, got {}",
                    ratio.descriptor_type, ratio.ratio
                )));
            }
        }
        Ok(())
    }

    /// Initial window extent
    pub fn window_extent(&self) -> Extent2D {
        Extent2D::new(self.window_width, self.window_height)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
