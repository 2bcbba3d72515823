/*!
# Nebula Engine - Vulkan Backend

Vulkan implementation of the `nebula_engine` device and swapchain traits.

Uses Ash for the Vulkan bindings, ash-window for surface creation and
gpu-allocator for buffer memory. Requires Vulkan 1.3 (dynamic rendering and
synchronization2) plus buffer device address.

```no_run
use std::sync::Arc;
use nebula_engine::nebula::{Config, Engine};
use nebula_engine_vulkan::{GpuContext, VulkanGraphicsDevice, VulkanSwapchain};
# fn demo(window: &winit::window::Window) -> nebula_engine::nebula::Result<()> {
let config = Config::default();
let context = GpuContext::new(window, &config)?;
let swapchain = VulkanSwapchain::new(
    Arc::clone(&context), config.window_width, config.window_height, config.present_mode)?;
let device = Arc::new(VulkanGraphicsDevice::new(context));
let engine = Engine::new(device, Box::new(swapchain), config)?;
# Ok(())
# }
```
*/

mod vulkan_format;
mod vulkan_context;
mod vulkan_graphics_device;
mod vulkan_swapchain;
mod vulkan_pipeline;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_context::GpuContext;
pub use vulkan_graphics_device::VulkanGraphicsDevice;
pub use vulkan_swapchain::VulkanSwapchain;
pub use vulkan_pipeline::{load_shader_module, PipelineBuilder};

// Re-export ash so callers configure the pipeline builder with the same types
pub use ash;

// Re-export debug utilities
#[cfg(feature = "vulkan-validation")]
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
