/// Graphics device module - native API traits, handles and descriptions

pub mod graphics_device;
pub mod handles;
pub mod types;
pub mod swapchain;

pub use graphics_device::*;
pub use handles::*;
pub use types::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
