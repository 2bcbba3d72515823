/// Conversions between engine descriptions and Vulkan enums/flags
///
/// Pure functions, no device required.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::MemoryLocation as VkMemoryLocation;
use nebula_engine::nebula::graphics::{
    BufferUsage, DescriptorBindingFlags, DescriptorSetLayoutFlags, DescriptorType, ImageLayout,
    MemoryLocation, PipelineStage, PresentMode, ShaderStageFlags,
};
use nebula_engine::nebula::Error;

/// Raw id of a Vulkan handle, as carried by engine handles
pub(crate) fn raw<T: Handle>(handle: T) -> u64 {
    handle.as_raw()
}

/// Vulkan handle from the raw id of an engine handle
pub(crate) fn from_raw<T: Handle>(raw: u64) -> T {
    T::from_raw(raw)
}

pub(crate) fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    }
}

pub(crate) fn shader_stages_to_vk(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStageFlags::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStageFlags::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStageFlags::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub(crate) fn binding_flags_to_vk(flags: DescriptorBindingFlags) -> vk::DescriptorBindingFlags {
    let mut vk_flags = vk::DescriptorBindingFlags::empty();
    if flags.contains(DescriptorBindingFlags::UPDATE_AFTER_BIND) {
        vk_flags |= vk::DescriptorBindingFlags::UPDATE_AFTER_BIND;
    }
    if flags.contains(DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING) {
        vk_flags |= vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING;
    }
    if flags.contains(DescriptorBindingFlags::PARTIALLY_BOUND) {
        vk_flags |= vk::DescriptorBindingFlags::PARTIALLY_BOUND;
    }
    if flags.contains(DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT) {
        vk_flags |= vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT;
    }
    vk_flags
}

pub(crate) fn layout_flags_to_vk(flags: DescriptorSetLayoutFlags) -> vk::DescriptorSetLayoutCreateFlags {
    let mut vk_flags = vk::DescriptorSetLayoutCreateFlags::empty();
    if flags.contains(DescriptorSetLayoutFlags::UPDATE_AFTER_BIND_POOL) {
        vk_flags |= vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL;
    }
    if flags.contains(DescriptorSetLayoutFlags::PUSH_DESCRIPTOR) {
        vk_flags |= vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR;
    }
    vk_flags
}

pub(crate) fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthAttachment => vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

/// Aspect touched by a transition into `layout`
pub(crate) fn aspect_for_layout(layout: ImageLayout) -> vk::ImageAspectFlags {
    match layout {
        ImageLayout::DepthAttachment => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let table = [
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::DEVICE_ADDRESS, vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS),
    ];
    table
        .iter()
        .filter(|(engine, _)| usage.contains(*engine))
        .fold(vk::BufferUsageFlags::empty(), |acc, (_, vk_flag)| acc | *vk_flag)
}

pub(crate) fn memory_location_to_vk(location: MemoryLocation) -> VkMemoryLocation {
    match location {
        MemoryLocation::GpuOnly => VkMemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => VkMemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => VkMemoryLocation::GpuToCpu,
    }
}

pub(crate) fn pipeline_stage_to_vk(stage: PipelineStage) -> vk::PipelineStageFlags2 {
    match stage {
        PipelineStage::TopOfPipe => vk::PipelineStageFlags2::TOP_OF_PIPE,
        PipelineStage::Transfer => vk::PipelineStageFlags2::TRANSFER,
        PipelineStage::ColorAttachmentOutput => vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        PipelineStage::AllCommands => vk::PipelineStageFlags2::ALL_COMMANDS,
    }
}

pub(crate) fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

/// Classify a failed Vulkan call
///
/// Codes with a dedicated engine variant map to it; everything else becomes
/// a `BackendError` naming the call.
pub(crate) fn vk_result_to_error(result: vk::Result, call: &str) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => Error::OutOfPoolMemory,
        vk::Result::ERROR_FRAGMENTED_POOL => Error::FragmentedPool,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            Error::OutOfMemory
        }
        vk::Result::ERROR_OUT_OF_DATE_KHR => Error::SwapchainOutOfDate,
        vk::Result::TIMEOUT => Error::Timeout(format!("{} timed out", call)),
        other => Error::BackendError(format!("{} failed: {:?}", call, other)),
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
