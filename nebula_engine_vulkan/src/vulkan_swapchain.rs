/// VulkanSwapchain - Vulkan implementation of the Swapchain trait
///
/// Presents on the context's graphics queue. The surface belongs to the
/// GpuContext; only the swapchain and its image views are owned here.

use ash::vk;
use nebula_engine::nebula::graphics::{
    AcquiredImage, Extent2D, ImageHandle, ImageViewHandle, PresentMode, PresentStatus,
    SemaphoreHandle, Swapchain,
};
use nebula_engine::nebula::{Error, Result};
use nebula_engine::{engine_debug, engine_error, engine_warn};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{from_raw, present_mode_to_vk, raw, vk_result_to_error};

/// Vulkan swapchain implementation
///
/// Handles image acquisition, presentation, and swapchain recreation on resize.
pub struct VulkanSwapchain {
    context: Arc<GpuContext>,

    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,

    /// Requested presentation mode; falls back to FIFO when unsupported
    present_mode: PresentMode,
}

impl VulkanSwapchain {
    /// Create a swapchain for the context's surface
    ///
    /// # Arguments
    ///
    /// * `context` - Shared GPU context owning the surface
    /// * `width` - Requested width, used when the surface leaves the extent to us
    /// * `height` - Requested height
    /// * `present_mode` - Preferred presentation mode
    pub fn new(context: Arc<GpuContext>, width: u32, height: u32, present_mode: PresentMode) -> Result<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(&context.instance, &context.device);
        let mut swapchain = Self {
            context,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::B8G8R8A8_UNORM,
            extent: vk::Extent2D { width, height },
            present_mode,
        };
        swapchain.build(width, height)?;
        Ok(swapchain)
    }

    /// Color format of the swapchain images
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// (Re)build the swapchain, retiring the current one if any
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let context = Arc::clone(&self.context);
        unsafe {
            let capabilities = context
                .surface_loader
                .get_physical_device_surface_capabilities(context.physical_device, context.surface)
                .map_err(|e| {
                    engine_error!("nebula::vulkan", "Failed to get surface capabilities: {:?}", e);
                    vk_result_to_error(e, "vkGetPhysicalDeviceSurfaceCapabilitiesKHR")
                })?;

            let formats = context
                .surface_loader
                .get_physical_device_surface_formats(context.physical_device, context.surface)
                .map_err(|e| vk_result_to_error(e, "vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
            let surface_format = formats
                .iter()
                .find(|f| f.format == vk::Format::B8G8R8A8_UNORM
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
                .or_else(|| formats.first())
                .copied()
                .ok_or_else(|| Error::InitializationFailed("Surface reports no formats".to_string()))?;

            let present_modes = context
                .surface_loader
                .get_physical_device_surface_present_modes(context.physical_device, context.surface)
                .map_err(|e| vk_result_to_error(e, "vkGetPhysicalDeviceSurfacePresentModesKHR"))?;
            let wanted = present_mode_to_vk(self.present_mode);
            let present_mode = if present_modes.contains(&wanted) {
                wanted
            } else {
                engine_warn!("nebula::vulkan", "Present mode {:?} unsupported, using FIFO", self.present_mode);
                vk::PresentModeKHR::FIFO
            };

            let extent = choose_extent(&capabilities, width, height);
            if extent.width == 0 || extent.height == 0 {
                return Err(Error::SwapchainOutOfDate);
            }

            let mut image_count = capabilities.min_image_count + 1;
            if capabilities.max_image_count > 0 {
                image_count = image_count.min(capabilities.max_image_count);
            }

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(context.surface)
                .min_image_count(image_count)
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    engine_error!("nebula::vulkan", "Failed to create swapchain: {:?}", e);
                    vk_result_to_error(e, "vkCreateSwapchainKHR")
                })?;

            // The old swapchain is retired by the create call above
            self.destroy_views();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;

            self.images = self
                .swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| vk_result_to_error(e, "vkGetSwapchainImagesKHR"))?;

            for &image in &self.images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let view = context
                    .device
                    .create_image_view(&view_info, None)
                    .map_err(|e| {
                        engine_error!("nebula::vulkan", "Failed to create swapchain image view: {:?}", e);
                        vk_result_to_error(e, "vkCreateImageView")
                    })?;
                self.image_views.push(view);
            }

            self.format = surface_format.format;
            self.extent = extent;
        }

        engine_debug!("nebula::vulkan", "Swapchain built: {}x{}, {} images, {:?}",
            self.extent.width, self.extent.height, self.images.len(), self.format);
        Ok(())
    }

    fn destroy_views(&mut self) {
        for view in self.image_views.drain(..) {
            unsafe { self.context.device.destroy_image_view(view, None) };
        }
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self, timeout_ns: u64, signal: SemaphoreHandle) -> Result<AcquiredImage> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout_ns,
                from_raw(signal.raw()),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquiredImage { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SwapchainOutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Err(Error::AcquireTimeout),
            Err(e) => Err(vk_result_to_error(e, "vkAcquireNextImageKHR")),
        }
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentStatus> {
        let wait_semaphores = [from_raw::<vk::Semaphore>(wait.raw())];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let queue = self.context.queue();
        match unsafe { self.swapchain_loader.queue_present(*queue, &present_info) } {
            Ok(false) => Ok(PresentStatus::Optimal),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SwapchainOutOfDate),
            Err(e) => Err(vk_result_to_error(e, "vkQueuePresentKHR")),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.build(width, height)
    }

    fn image(&self, index: u32) -> Option<ImageHandle> {
        self.images.get(index as usize).map(|&image| ImageHandle(raw(image)))
    }

    fn image_view(&self, index: u32) -> Option<ImageViewHandle> {
        self.image_views.get(index as usize).map(|&view| ImageViewHandle(raw(view)))
    }

    fn extent(&self) -> Extent2D {
        Extent2D::new(self.extent.width, self.extent.height)
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            let _ = self.context.device.device_wait_idle();
        }
        self.destroy_views();
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(self.swapchain, None) };
        }
    }
}

/// Surface-mandated extent, or the requested size clamped to the surface limits
fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
