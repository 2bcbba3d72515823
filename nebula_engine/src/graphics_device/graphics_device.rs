/// GraphicsDevice trait - the native API surface the engine core drives

use crate::error::Result;
use crate::graphics_device::{
    AllocatedBuffer, BufferCopy, BufferUsage, CommandBufferHandle, CommandPoolHandle,
    DescriptorPoolHandle, DescriptorSetHandle, DescriptorSetLayoutFlags,
    DescriptorSetLayoutHandle, DescriptorUpdate, FenceHandle, ImageHandle, ImageLayout,
    LayoutBinding, MemoryLocation, PipelineHandle, PipelineLayoutHandle, PoolSize,
    SemaphoreHandle, ShaderModuleHandle, SubmitInfo,
};

/// Logical GPU device
///
/// Thin, handle-based wrapper over the native device. The engine core (frame
/// ring, descriptor allocators, deletion queues) only talks to the GPU through
/// this trait, so it can run against a mock device in tests.
///
/// Destroy calls return nothing: a teardown failure is logged by the backend
/// and never stops a deletion queue flush.
pub trait GraphicsDevice: Send + Sync {
    // ===== DESCRIPTORS =====

    /// Create a descriptor set layout from fully resolved bindings
    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
        flags: DescriptorSetLayoutFlags,
    ) -> Result<DescriptorSetLayoutHandle>;

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    /// Create a pool able to hold `max_sets` sets drawing on `sizes`
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[PoolSize],
    ) -> Result<DescriptorPoolHandle>;

    /// Return every set of the pool to it; previously allocated sets become invalid
    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()>;

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    /// Allocate one set from `pool`
    ///
    /// Fails with `Error::OutOfPoolMemory` or `Error::FragmentedPool` when the
    /// pool cannot satisfy the request. `variable_descriptor_count` feeds the
    /// variable-count binding of the layout, if it has one.
    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
        variable_descriptor_count: Option<u32>,
    ) -> Result<DescriptorSetHandle>;

    /// Apply a batch of writes to one set in one native call
    fn update_descriptor_set(&self, update: &DescriptorUpdate<'_>);

    // ===== SYNCHRONIZATION =====

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;

    /// Block until `fence` is signaled; `Error::Timeout` after `timeout_ns`
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()>;

    fn reset_fence(&self, fence: FenceHandle) -> Result<()>;

    fn destroy_fence(&self, fence: FenceHandle);

    fn create_semaphore(&self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    // ===== COMMANDS =====

    /// Create a resettable command pool on the graphics queue family
    fn create_command_pool(&self) -> Result<CommandPoolHandle>;

    fn destroy_command_pool(&self, pool: CommandPoolHandle);

    /// Allocate one primary command buffer
    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle>;

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    /// Submit one command buffer to the graphics queue
    fn submit(&self, info: &SubmitInfo) -> Result<()>;

    /// Block until the device has no pending work
    fn wait_idle(&self) -> Result<()>;

    // ===== RECORDING =====

    /// Record a full-image layout transition barrier
    fn cmd_transition_image(
        &self,
        cmd: CommandBufferHandle,
        image: ImageHandle,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    );

    /// Record a clear of the whole color image
    fn cmd_clear_color_image(
        &self,
        cmd: CommandBufferHandle,
        image: ImageHandle,
        layout: ImageLayout,
        color: [f32; 4],
    );

    fn cmd_copy_buffer(
        &self,
        cmd: CommandBufferHandle,
        src: &AllocatedBuffer,
        dst: &AllocatedBuffer,
        regions: &[BufferCopy],
    );

    // ===== BUFFERS =====

    /// Create a buffer and bind memory from the backing allocator
    fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
        location: MemoryLocation,
    ) -> Result<AllocatedBuffer>;

    /// Copy `data` into a host-visible buffer at `offset`
    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: u64, data: &[u8]) -> Result<()>;

    /// Destroy the buffer and free its allocation
    fn destroy_buffer(&self, buffer: &AllocatedBuffer);

    // ===== SHADERS AND PIPELINES =====

    /// Create a shader module from SPIR-V bytes
    fn create_shader_module(&self, code: &[u8]) -> Result<ShaderModuleHandle>;

    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    fn destroy_pipeline(&self, pipeline: PipelineHandle);

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle);
}
