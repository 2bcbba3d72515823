/// VulkanGraphicsDevice - ash implementation of the GraphicsDevice trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use nebula_engine::nebula::graphics::{
    AllocatedBuffer, AllocationHandle, BufferCopy, BufferHandle, BufferUsage, CommandBufferHandle,
    CommandPoolHandle, DescriptorPoolHandle, DescriptorResource, DescriptorSetHandle,
    DescriptorSetLayoutFlags, DescriptorSetLayoutHandle, DescriptorUpdate, FenceHandle,
    GraphicsDevice, ImageHandle, ImageLayout, LayoutBinding, MemoryLocation, PipelineHandle,
    PipelineLayoutHandle, PoolSize, SemaphoreHandle, ShaderModuleHandle, ShaderStageFlags,
    SubmitInfo,
};
use nebula_engine::nebula::{Error, Result};
use nebula_engine::{engine_err, engine_error, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::*;

/// Vulkan device implementation
///
/// Engine handles carry raw Vulkan handles. Buffer memory is owned here and
/// looked up by `AllocationHandle`.
pub struct VulkanGraphicsDevice {
    context: Arc<GpuContext>,
    allocations: Mutex<FxHashMap<AllocationHandle, Allocation>>,
    next_allocation: AtomicU64,
}

impl VulkanGraphicsDevice {
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self {
            context,
            allocations: Mutex::new(FxHashMap::default()),
            next_allocation: AtomicU64::new(1),
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    fn device(&self) -> &ash::Device {
        &self.context.device
    }

    fn allocations(&self) -> MutexGuard<'_, FxHashMap<AllocationHandle, Allocation>> {
        self.allocations.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a pipeline layout over `set_layouts` with an optional push constant range
    pub fn create_pipeline_layout(
        &self,
        set_layouts: &[DescriptorSetLayoutHandle],
        push_constant: Option<(ShaderStageFlags, u32)>,
    ) -> Result<PipelineLayoutHandle> {
        let layouts: Vec<vk::DescriptorSetLayout> =
            set_layouts.iter().map(|l| from_raw(l.raw())).collect();
        let ranges: Vec<vk::PushConstantRange> = push_constant
            .map(|(stages, size)| {
                vk::PushConstantRange::default()
                    .stage_flags(shader_stages_to_vk(stages))
                    .offset(0)
                    .size(size)
            })
            .into_iter()
            .collect();

        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&layouts)
            .push_constant_ranges(&ranges);

        let layout = unsafe { self.device().create_pipeline_layout(&info, None) }
            .map_err(|e| vk_result_to_error(e, "vkCreatePipelineLayout"))?;
        Ok(PipelineLayoutHandle(raw(layout)))
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
        flags: DescriptorSetLayoutFlags,
    ) -> Result<DescriptorSetLayoutHandle> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                    .descriptor_count(b.count)
                    .stage_flags(shader_stages_to_vk(b.stages))
            })
            .collect();
        let binding_flags: Vec<vk::DescriptorBindingFlags> =
            bindings.iter().map(|b| binding_flags_to_vk(b.flags)).collect();

        let mut flags_info =
            vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
        let mut info = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&vk_bindings)
            .flags(layout_flags_to_vk(flags));
        if binding_flags.iter().any(|f| !f.is_empty()) {
            info = info.push_next(&mut flags_info);
        }

        let layout = unsafe { self.device().create_descriptor_set_layout(&info, None) }
            .map_err(|e| {
                engine_error!("nebula::vulkan", "Failed to create descriptor set layout: {:?}", e);
                vk_result_to_error(e, "vkCreateDescriptorSetLayout")
            })?;
        Ok(DescriptorSetLayoutHandle(raw(layout)))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        unsafe { self.device().destroy_descriptor_set_layout(from_raw(layout.raw()), None) };
    }

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[PoolSize]) -> Result<DescriptorPoolHandle> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .map(|s| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(s.descriptor_type),
                descriptor_count: s.count,
            })
            .collect();
        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { self.device().create_descriptor_pool(&info, None) }
            .map_err(|e| {
                engine_error!("nebula::vulkan", "Failed to create descriptor pool: {:?}", e);
                vk_result_to_error(e, "vkCreateDescriptorPool")
            })?;
        Ok(DescriptorPoolHandle(raw(pool)))
    }

    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()> {
        unsafe {
            self.device()
                .reset_descriptor_pool(from_raw(pool.raw()), vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(|e| vk_result_to_error(e, "vkResetDescriptorPool"))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        unsafe { self.device().destroy_descriptor_pool(from_raw(pool.raw()), None) };
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
        variable_descriptor_count: Option<u32>,
    ) -> Result<DescriptorSetHandle> {
        let layouts = [from_raw::<vk::DescriptorSetLayout>(layout.raw())];
        let counts = [variable_descriptor_count.unwrap_or(0)];
        let mut variable_info =
            vk::DescriptorSetVariableDescriptorCountAllocateInfo::default().descriptor_counts(&counts);

        let mut info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(from_raw(pool.raw()))
            .set_layouts(&layouts);
        if variable_descriptor_count.is_some() {
            info = info.push_next(&mut variable_info);
        }

        // Pool exhaustion is expected by the growable allocator; not logged here
        let sets = unsafe { self.device().allocate_descriptor_sets(&info) }
            .map_err(|e| vk_result_to_error(e, "vkAllocateDescriptorSets"))?;
        sets.first()
            .map(|&set| DescriptorSetHandle(raw(set)))
            .ok_or_else(|| Error::BackendError("vkAllocateDescriptorSets returned no set".to_string()))
    }

    fn update_descriptor_set(&self, update: &DescriptorUpdate<'_>) {
        let image_infos: Vec<vk::DescriptorImageInfo> = update
            .image_infos
            .iter()
            .map(|info| vk::DescriptorImageInfo {
                sampler: from_raw(info.sampler.raw()),
                image_view: from_raw(info.view.raw()),
                image_layout: image_layout_to_vk(info.layout),
            })
            .collect();
        let buffer_infos: Vec<vk::DescriptorBufferInfo> = update
            .buffer_infos
            .iter()
            .map(|info| vk::DescriptorBufferInfo {
                buffer: from_raw(info.buffer.raw()),
                offset: info.offset,
                range: info.range,
            })
            .collect();

        let set = from_raw::<vk::DescriptorSet>(update.set.raw());
        let mut writes = Vec::with_capacity(update.writes.len());
        for write in update.writes {
            let base = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(write.binding)
                .descriptor_type(descriptor_type_to_vk(write.descriptor_type));
            let vk_write = match write.resource {
                DescriptorResource::Image(i) => image_infos
                    .get(i)
                    .map(|info| base.image_info(std::slice::from_ref(info))),
                DescriptorResource::Buffer(i) => buffer_infos
                    .get(i)
                    .map(|info| base.buffer_info(std::slice::from_ref(info))),
            };
            match vk_write {
                Some(w) => writes.push(w),
                None => engine_warn!("nebula::vulkan",
                    "Skipping descriptor write for binding {}: info index out of range", write.binding),
            }
        }

        unsafe { self.device().update_descriptor_sets(&writes, &[]) };
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { self.device().create_fence(&info, None) }
            .map_err(|e| vk_result_to_error(e, "vkCreateFence"))?;
        Ok(FenceHandle(raw(fence)))
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()> {
        unsafe {
            self.device()
                .wait_for_fences(&[from_raw::<vk::Fence>(fence.raw())], true, timeout_ns)
        }
        .map_err(|e| vk_result_to_error(e, "vkWaitForFences"))
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        unsafe { self.device().reset_fences(&[from_raw::<vk::Fence>(fence.raw())]) }
            .map_err(|e| vk_result_to_error(e, "vkResetFences"))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device().destroy_fence(from_raw(fence.raw()), None) };
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { self.device().create_semaphore(&info, None) }
            .map_err(|e| vk_result_to_error(e, "vkCreateSemaphore"))?;
        Ok(SemaphoreHandle(raw(semaphore)))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe { self.device().destroy_semaphore(from_raw(semaphore.raw()), None) };
    }

    // ===== COMMANDS =====

    fn create_command_pool(&self) -> Result<CommandPoolHandle> {
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.context.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { self.device().create_command_pool(&info, None) }
            .map_err(|e| vk_result_to_error(e, "vkCreateCommandPool"))?;
        Ok(CommandPoolHandle(raw(pool)))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        unsafe { self.device().destroy_command_pool(from_raw(pool.raw()), None) };
    }

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(from_raw(pool.raw()))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device().allocate_command_buffers(&info) }
            .map_err(|e| vk_result_to_error(e, "vkAllocateCommandBuffers"))?;
        buffers
            .first()
            .map(|&cmd| CommandBufferHandle(raw(cmd)))
            .ok_or_else(|| Error::BackendError("vkAllocateCommandBuffers returned no buffer".to_string()))
    }

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.device()
                .reset_command_buffer(from_raw(cmd.raw()), vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| vk_result_to_error(e, "vkResetCommandBuffer"))
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device().begin_command_buffer(from_raw(cmd.raw()), &info) }
            .map_err(|e| vk_result_to_error(e, "vkBeginCommandBuffer"))
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe { self.device().end_command_buffer(from_raw(cmd.raw())) }
            .map_err(|e| vk_result_to_error(e, "vkEndCommandBuffer"))
    }

    fn submit(&self, info: &SubmitInfo) -> Result<()> {
        let command_buffers = [vk::CommandBufferSubmitInfo::default()
            .command_buffer(from_raw(info.command_buffer.raw()))];
        let waits: Vec<vk::SemaphoreSubmitInfo> = info
            .wait_semaphore
            .iter()
            .map(|&(semaphore, stage)| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(from_raw(semaphore.raw()))
                    .stage_mask(pipeline_stage_to_vk(stage))
                    .value(1)
            })
            .collect();
        let signals: Vec<vk::SemaphoreSubmitInfo> = info
            .signal_semaphore
            .iter()
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(from_raw(semaphore.raw()))
                    .stage_mask(vk::PipelineStageFlags2::ALL_GRAPHICS)
                    .value(1)
            })
            .collect();

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&waits)
            .signal_semaphore_infos(&signals)
            .command_buffer_infos(&command_buffers);
        let fence = info.fence.map_or(vk::Fence::null(), |f| from_raw(f.raw()));

        let queue = self.context.queue();
        unsafe { self.device().queue_submit2(*queue, &[submit], fence) }
            .map_err(|e| engine_err!("nebula::vulkan", "Failed to submit commands to GPU queue: {:?}", e))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device().device_wait_idle() }
            .map_err(|e| vk_result_to_error(e, "vkDeviceWaitIdle"))
    }

    // ===== RECORDING =====

    fn cmd_transition_image(
        &self,
        cmd: CommandBufferHandle,
        image: ImageHandle,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) {
        let barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
            .old_layout(image_layout_to_vk(old_layout))
            .new_layout(image_layout_to_vk(new_layout))
            .subresource_range(full_range(aspect_for_layout(new_layout)))
            .image(from_raw(image.raw()));
        let barriers = [barrier];
        let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);

        unsafe { self.device().cmd_pipeline_barrier2(from_raw(cmd.raw()), &dependency) };
    }

    fn cmd_clear_color_image(
        &self,
        cmd: CommandBufferHandle,
        image: ImageHandle,
        layout: ImageLayout,
        color: [f32; 4],
    ) {
        let clear = vk::ClearColorValue { float32: color };
        let ranges = [full_range(vk::ImageAspectFlags::COLOR)];
        unsafe {
            self.device().cmd_clear_color_image(
                from_raw(cmd.raw()),
                from_raw(image.raw()),
                image_layout_to_vk(layout),
                &clear,
                &ranges,
            )
        };
    }

    fn cmd_copy_buffer(
        &self,
        cmd: CommandBufferHandle,
        src: &AllocatedBuffer,
        dst: &AllocatedBuffer,
        regions: &[BufferCopy],
    ) {
        let vk_regions: Vec<vk::BufferCopy> = regions
            .iter()
            .map(|r| vk::BufferCopy {
                src_offset: r.src_offset,
                dst_offset: r.dst_offset,
                size: r.size,
            })
            .collect();
        unsafe {
            self.device().cmd_copy_buffer(
                from_raw(cmd.raw()),
                from_raw(src.buffer.raw()),
                from_raw(dst.buffer.raw()),
                &vk_regions,
            )
        };
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, size: u64, usage: BufferUsage, location: MemoryLocation) -> Result<AllocatedBuffer> {
        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(buffer_usage_to_vk(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let device = self.device();
        let buffer = unsafe { device.create_buffer(&info, None) }
            .map_err(|e| vk_result_to_error(e, "vkCreateBuffer"))?;
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let allocation = self
            .context
            .allocator()
            .allocate(&AllocationCreateDesc {
                name: "nebula buffer",
                requirements,
                location: memory_location_to_vk(location),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                unsafe { device.destroy_buffer(buffer, None) };
                engine_err!("nebula::vulkan", "Failed to allocate {} bytes of buffer memory: {:?}", size, e)
            })?;

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            unsafe { device.destroy_buffer(buffer, None) };
            if let Err(free_err) = self.context.allocator().free(allocation) {
                engine_warn!("nebula::vulkan", "Failed to free buffer memory: {:?}", free_err);
            }
            return Err(vk_result_to_error(e, "vkBindBufferMemory"));
        }

        let device_address = if usage.contains(BufferUsage::DEVICE_ADDRESS) {
            let address_info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
            unsafe { device.get_buffer_device_address(&address_info) }
        } else {
            0
        };

        let handle = AllocationHandle(self.next_allocation.fetch_add(1, Ordering::Relaxed));
        self.allocations().insert(handle, allocation);

        engine_trace!("nebula::vulkan", "Created buffer {:?} ({} bytes, {:?})", buffer, size, location);
        Ok(AllocatedBuffer {
            buffer: BufferHandle(raw(buffer)),
            allocation: handle,
            size,
            device_address,
        })
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|&end| end <= buffer.size)
            .ok_or_else(|| Error::InvalidResource(format!(
                "Write of {} bytes at offset {} exceeds buffer size {}",
                data.len(), offset, buffer.size
            )))?;

        let mut allocations = self.allocations();
        let allocation = allocations
            .get_mut(&buffer.allocation)
            .ok_or_else(|| Error::InvalidResource(format!("Unknown allocation {:?}", buffer.allocation)))?;
        let mapped = allocation
            .mapped_slice_mut()
            .ok_or_else(|| Error::InvalidResource("Buffer memory is not host visible".to_string()))?;
        mapped[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &AllocatedBuffer) {
        unsafe { self.device().destroy_buffer(from_raw(buffer.buffer.raw()), None) };

        let allocation = self.allocations().remove(&buffer.allocation);
        match allocation {
            Some(allocation) => {
                if let Err(e) = self.context.allocator().free(allocation) {
                    engine_warn!("nebula::vulkan", "Failed to free buffer memory: {:?}", e);
                }
            }
            None => engine_warn!("nebula::vulkan", "Destroyed buffer with unknown allocation {:?}", buffer.allocation),
        }
    }

    // ===== SHADERS AND PIPELINES =====

    fn create_shader_module(&self, code: &[u8]) -> Result<ShaderModuleHandle> {
        let words = ash::util::read_spv(&mut Cursor::new(code))
            .map_err(|e| Error::AssetLoadFailed(format!("Invalid SPIR-V: {}", e)))?;
        let info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe { self.device().create_shader_module(&info, None) }
            .map_err(|e| vk_result_to_error(e, "vkCreateShaderModule"))?;
        Ok(ShaderModuleHandle(raw(module)))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        unsafe { self.device().destroy_shader_module(from_raw(module.raw()), None) };
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        unsafe { self.device().destroy_pipeline(from_raw(pipeline.raw()), None) };
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        unsafe { self.device().destroy_pipeline_layout(from_raw(layout.raw()), None) };
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        let leaked: Vec<Allocation> = self.allocations().drain().map(|(_, a)| a).collect();
        if !leaked.is_empty() {
            engine_warn!("nebula::vulkan", "{} buffer allocation(s) still alive at device drop", leaked.len());
        }
        let mut allocator = self.context.allocator();
        for allocation in leaked {
            let _ = allocator.free(allocation);
        }
    }
}

fn full_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect)
        .base_mip_level(0)
        .level_count(vk::REMAINING_MIP_LEVELS)
        .base_array_layer(0)
        .layer_count(vk::REMAINING_ARRAY_LAYERS)
}
