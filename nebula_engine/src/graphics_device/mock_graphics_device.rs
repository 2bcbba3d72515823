/// Mock GraphicsDevice and Swapchain for unit tests (no GPU required)
///
/// Every call is appended to a call log shared by the device and its
/// swapchains, so tests can assert on the exact order of native operations.
/// Descriptor pools enforce their set capacity, fences signal a configurable
/// delay after the submission that uses them, and allocation, submit, acquire
/// and present failures can be scripted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquiredImage, AllocatedBuffer, AllocationHandle, BufferCopy, BufferHandle, BufferUsage,
    CommandBufferHandle, CommandPoolHandle, DescriptorPoolHandle, DescriptorSetHandle,
    DescriptorSetLayoutFlags, DescriptorSetLayoutHandle, DescriptorUpdate, DescriptorWrite,
    Extent2D, FenceHandle, GraphicsDevice, ImageHandle, ImageLayout, ImageViewHandle,
    LayoutBinding, MemoryLocation, PipelineHandle, PipelineLayoutHandle, PoolSize,
    PresentStatus, SemaphoreHandle, ShaderModuleHandle, SubmitInfo, Swapchain,
};

// ============================================================================
// Call log
// ============================================================================

/// One recorded device or swapchain call
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    CreateLayout { layout: DescriptorSetLayoutHandle, bindings: Vec<LayoutBinding>, flags: DescriptorSetLayoutFlags },
    DestroyLayout(DescriptorSetLayoutHandle),
    CreatePool { pool: DescriptorPoolHandle, max_sets: u32, sizes: Vec<PoolSize> },
    ResetPool(DescriptorPoolHandle),
    DestroyPool(DescriptorPoolHandle),
    AllocateSet {
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
        variable_descriptor_count: Option<u32>,
        result: std::result::Result<DescriptorSetHandle, Error>,
    },
    UpdateDescriptorSet { set: DescriptorSetHandle, writes: Vec<DescriptorWrite> },
    CreateFence { fence: FenceHandle, signaled: bool },
    WaitFence { fence: FenceHandle, returned_at: Instant },
    ResetFence(FenceHandle),
    DestroyFence(FenceHandle),
    CreateSemaphore(SemaphoreHandle),
    DestroySemaphore(SemaphoreHandle),
    CreateCommandPool(CommandPoolHandle),
    DestroyCommandPool(CommandPoolHandle),
    AllocateCommandBuffer(CommandBufferHandle),
    ResetCommandBuffer(CommandBufferHandle),
    BeginCommandBuffer { cmd: CommandBufferHandle, at: Instant },
    EndCommandBuffer(CommandBufferHandle),
    Submit(SubmitInfo),
    WaitIdle,
    TransitionImage { cmd: CommandBufferHandle, image: ImageHandle, old_layout: ImageLayout, new_layout: ImageLayout },
    ClearColorImage { cmd: CommandBufferHandle, image: ImageHandle, color: [f32; 4] },
    CopyBuffer { cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: Vec<BufferCopy> },
    CreateBuffer { buffer: AllocatedBuffer, usage: BufferUsage, location: MemoryLocation },
    WriteBuffer { buffer: BufferHandle, offset: u64, len: usize },
    DestroyBuffer(BufferHandle),
    CreateShaderModule(ShaderModuleHandle),
    DestroyShaderModule(ShaderModuleHandle),
    DestroyPipeline(PipelineHandle),
    DestroyPipelineLayout(PipelineLayoutHandle),
    Acquire { signal: SemaphoreHandle, result: std::result::Result<AcquiredImage, Error> },
    Present { image_index: u32, wait: SemaphoreHandle },
    Recreate { width: u32, height: u32 },
}

type CallLog = Arc<Mutex<Vec<MockCall>>>;

// ============================================================================
// Mock device state
// ============================================================================

/// Capacity accounting of one mock descriptor pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPool {
    pub max_sets: u32,
    pub allocated: u32,
    pub sizes: Vec<PoolSize>,
}

#[derive(Debug, Clone, Copy)]
struct MockFence {
    signaled: bool,
    /// Set by a submission; the fence signals at this instant
    signal_at: Option<Instant>,
}

struct MockState {
    next_handle: u64,
    live: FxHashSet<u64>,
    pools: FxHashMap<DescriptorPoolHandle, MockPool>,
    created_pools: Vec<DescriptorPoolHandle>,
    fences: FxHashMap<FenceHandle, MockFence>,
    fence_signals: Vec<(FenceHandle, Instant)>,
    fence_delay: Duration,
    allocation_failures: VecDeque<Error>,
    submit_failure: Option<Error>,
    buffers: FxHashMap<BufferHandle, Vec<u8>>,
}

impl MockState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create_live(&mut self) -> u64 {
        let id = self.next();
        self.live.insert(id);
        id
    }
}

/// Mock GraphicsDevice
pub struct MockGraphicsDevice {
    calls: CallLog,
    state: Mutex<MockState>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            state: Mutex::new(MockState {
                next_handle: 0,
                live: FxHashSet::default(),
                pools: FxHashMap::default(),
                created_pools: Vec::new(),
                fences: FxHashMap::default(),
                fence_signals: Vec::new(),
                fence_delay: Duration::ZERO,
                allocation_failures: VecDeque::new(),
                submit_failure: None,
                buffers: FxHashMap::default(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    // ===== INSPECTION =====

    /// Snapshot of the call log
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Number of logged calls matching `predicate`
    pub fn count_calls(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    /// Capacity accounting of a live pool
    pub fn pool(&self, pool: DescriptorPoolHandle) -> Option<MockPool> {
        self.state().pools.get(&pool).cloned()
    }

    /// Every pool ever created, in creation order
    pub fn created_pools(&self) -> Vec<DescriptorPoolHandle> {
        self.state().created_pools.clone()
    }

    /// Pools created and not yet destroyed
    pub fn live_pools(&self) -> FxHashSet<DescriptorPoolHandle> {
        self.state().pools.keys().copied().collect()
    }

    /// Objects created and not yet destroyed (all kinds)
    pub fn live_object_count(&self) -> usize {
        self.state().live.len()
    }

    /// (fence, instant) for every fence signal observed by a wait
    pub fn fence_signals(&self) -> Vec<(FenceHandle, Instant)> {
        self.state().fence_signals.clone()
    }

    pub fn is_fence_signaled(&self, fence: FenceHandle) -> bool {
        self.state().fences.get(&fence).map(|f| f.signaled).unwrap_or(false)
    }

    /// Bytes last written to a buffer
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state().buffers.get(&buffer).cloned()
    }

    // ===== SCRIPTING =====

    /// Fail the next allocate_descriptor_set calls with these errors, in order
    pub fn fail_next_allocations(&self, errors: impl IntoIterator<Item = Error>) {
        self.state().allocation_failures.extend(errors);
    }

    /// Delay between a submission and its fence signaling
    pub fn set_fence_delay(&self, delay: Duration) {
        self.state().fence_delay = delay;
    }

    /// Fail the next submit call with this error
    pub fn fail_next_submit(&self, error: Error) {
        self.state().submit_failure = Some(error);
    }

    fn destroy_live(&self, id: u64, call: MockCall) {
        self.state().live.remove(&id);
        self.record(call);
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
        flags: DescriptorSetLayoutFlags,
    ) -> Result<DescriptorSetLayoutHandle> {
        let layout = DescriptorSetLayoutHandle(self.state().create_live());
        self.record(MockCall::CreateLayout { layout, bindings: bindings.to_vec(), flags });
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        self.destroy_live(layout.raw(), MockCall::DestroyLayout(layout));
    }

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[PoolSize]) -> Result<DescriptorPoolHandle> {
        let pool = {
            let mut state = self.state();
            let pool = DescriptorPoolHandle(state.create_live());
            state.pools.insert(pool, MockPool { max_sets, allocated: 0, sizes: sizes.to_vec() });
            state.created_pools.push(pool);
            pool
        };
        self.record(MockCall::CreatePool { pool, max_sets, sizes: sizes.to_vec() });
        Ok(pool)
    }

    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()> {
        {
            let mut state = self.state();
            let record = state.pools.get_mut(&pool).ok_or_else(|| {
                Error::InvalidResource(format!("reset of unknown pool {:?}", pool))
            })?;
            record.allocated = 0;
        }
        self.record(MockCall::ResetPool(pool));
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        self.state().pools.remove(&pool);
        self.destroy_live(pool.raw(), MockCall::DestroyPool(pool));
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
        variable_descriptor_count: Option<u32>,
    ) -> Result<DescriptorSetHandle> {
        let result = {
            let mut state = self.state();
            if let Some(error) = state.allocation_failures.pop_front() {
                Err(error)
            } else {
                let set = DescriptorSetHandle(state.next());
                match state.pools.get_mut(&pool) {
                    None => Err(Error::InvalidResource(format!("allocation from unknown pool {:?}", pool))),
                    Some(record) if record.allocated >= record.max_sets => Err(Error::OutOfPoolMemory),
                    Some(record) => {
                        record.allocated += 1;
                        Ok(set)
                    }
                }
            }
        };
        self.record(MockCall::AllocateSet {
            pool,
            layout,
            variable_descriptor_count,
            result: result.clone(),
        });
        result
    }

    fn update_descriptor_set(&self, update: &DescriptorUpdate<'_>) {
        self.record(MockCall::UpdateDescriptorSet { set: update.set, writes: update.writes.to_vec() });
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let fence = {
            let mut state = self.state();
            let fence = FenceHandle(state.create_live());
            state.fences.insert(fence, MockFence { signaled, signal_at: None });
            fence
        };
        self.record(MockCall::CreateFence { fence, signaled });
        Ok(fence)
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()> {
        let signal_at = {
            let state = self.state();
            let record = state.fences.get(&fence).ok_or_else(|| {
                Error::InvalidResource(format!("wait on unknown fence {:?}", fence))
            })?;
            if record.signaled {
                None
            } else {
                match record.signal_at {
                    Some(at) => Some(at),
                    None => return Err(Error::Timeout(format!("fence {:?} is never signaled", fence))),
                }
            }
        };

        if let Some(at) = signal_at {
            let remaining = at.saturating_duration_since(Instant::now());
            if remaining > Duration::from_nanos(timeout_ns) {
                return Err(Error::Timeout(format!("fence {:?} wait exceeded {} ns", fence, timeout_ns)));
            }
            std::thread::sleep(remaining);
            let mut state = self.state();
            if let Some(record) = state.fences.get_mut(&fence) {
                record.signaled = true;
                record.signal_at = None;
            }
            state.fence_signals.push((fence, at));
        }

        self.record(MockCall::WaitFence { fence, returned_at: Instant::now() });
        Ok(())
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        {
            let mut state = self.state();
            let record = state.fences.get_mut(&fence).ok_or_else(|| {
                Error::InvalidResource(format!("reset of unknown fence {:?}", fence))
            })?;
            record.signaled = false;
            record.signal_at = None;
        }
        self.record(MockCall::ResetFence(fence));
        Ok(())
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        self.state().fences.remove(&fence);
        self.destroy_live(fence.raw(), MockCall::DestroyFence(fence));
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = SemaphoreHandle(self.state().create_live());
        self.record(MockCall::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        self.destroy_live(semaphore.raw(), MockCall::DestroySemaphore(semaphore));
    }

    fn create_command_pool(&self) -> Result<CommandPoolHandle> {
        let pool = CommandPoolHandle(self.state().create_live());
        self.record(MockCall::CreateCommandPool(pool));
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        self.destroy_live(pool.raw(), MockCall::DestroyCommandPool(pool));
    }

    fn allocate_command_buffer(&self, _pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let cmd = CommandBufferHandle(self.state().next());
        self.record(MockCall::AllocateCommandBuffer(cmd));
        Ok(cmd)
    }

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.record(MockCall::ResetCommandBuffer(cmd));
        Ok(())
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.record(MockCall::BeginCommandBuffer { cmd, at: Instant::now() });
        Ok(())
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.record(MockCall::EndCommandBuffer(cmd));
        Ok(())
    }

    fn submit(&self, info: &SubmitInfo) -> Result<()> {
        {
            let mut state = self.state();
            if let Some(error) = state.submit_failure.take() {
                return Err(error);
            }
            if let Some(fence) = info.fence {
                let delay = state.fence_delay;
                let record = state.fences.get_mut(&fence).ok_or_else(|| {
                    Error::InvalidResource(format!("submit with unknown fence {:?}", fence))
                })?;
                if record.signaled || record.signal_at.is_some() {
                    return Err(Error::InvalidResource(format!(
                        "fence {:?} submitted without being reset", fence
                    )));
                }
                record.signal_at = Some(Instant::now() + delay);
            }
        }
        self.record(MockCall::Submit(*info));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        {
            let now = Instant::now();
            let mut state = self.state();
            let mut signaled = Vec::new();
            for (fence, record) in state.fences.iter_mut() {
                if let Some(at) = record.signal_at.take() {
                    record.signaled = true;
                    signaled.push((*fence, at.max(now)));
                }
            }
            state.fence_signals.extend(signaled);
        }
        self.record(MockCall::WaitIdle);
        Ok(())
    }

    fn cmd_transition_image(
        &self,
        cmd: CommandBufferHandle,
        image: ImageHandle,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    ) {
        self.record(MockCall::TransitionImage { cmd, image, old_layout, new_layout });
    }

    fn cmd_clear_color_image(
        &self,
        cmd: CommandBufferHandle,
        image: ImageHandle,
        _layout: ImageLayout,
        color: [f32; 4],
    ) {
        self.record(MockCall::ClearColorImage { cmd, image, color });
    }

    fn cmd_copy_buffer(
        &self,
        cmd: CommandBufferHandle,
        src: &AllocatedBuffer,
        dst: &AllocatedBuffer,
        regions: &[BufferCopy],
    ) {
        self.record(MockCall::CopyBuffer {
            cmd,
            src: src.buffer,
            dst: dst.buffer,
            regions: regions.to_vec(),
        });
    }

    fn create_buffer(&self, size: u64, usage: BufferUsage, location: MemoryLocation) -> Result<AllocatedBuffer> {
        let buffer = {
            let mut state = self.state();
            let handle = BufferHandle(state.create_live());
            let allocation = AllocationHandle(state.next());
            state.buffers.insert(handle, vec![0; size as usize]);
            AllocatedBuffer {
                buffer: handle,
                allocation,
                size,
                device_address: if usage.contains(BufferUsage::DEVICE_ADDRESS) {
                    handle.raw() << 16
                } else {
                    0
                },
            }
        };
        self.record(MockCall::CreateBuffer { buffer, usage, location });
        Ok(buffer)
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: u64, data: &[u8]) -> Result<()> {
        {
            let mut state = self.state();
            let contents = state.buffers.get_mut(&buffer.buffer).ok_or_else(|| {
                Error::InvalidResource(format!("write to unknown buffer {:?}", buffer.buffer))
            })?;
            let start = offset as usize;
            let end = start + data.len();
            if end > contents.len() {
                return Err(Error::InvalidResource(format!(
                    "write of {} bytes at {} overflows buffer of {} bytes",
                    data.len(), offset, contents.len()
                )));
            }
            contents[start..end].copy_from_slice(data);
        }
        self.record(MockCall::WriteBuffer { buffer: buffer.buffer, offset, len: data.len() });
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &AllocatedBuffer) {
        self.state().buffers.remove(&buffer.buffer);
        self.destroy_live(buffer.buffer.raw(), MockCall::DestroyBuffer(buffer.buffer));
    }

    fn create_shader_module(&self, code: &[u8]) -> Result<ShaderModuleHandle> {
        if code.len() % 4 != 0 || code.is_empty() {
            return Err(Error::AssetLoadFailed(format!(
                "SPIR-V size {} is not a non-zero multiple of 4", code.len()
            )));
        }
        let module = ShaderModuleHandle(self.state().create_live());
        self.record(MockCall::CreateShaderModule(module));
        Ok(module)
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.destroy_live(module.raw(), MockCall::DestroyShaderModule(module));
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        self.destroy_live(pipeline.raw(), MockCall::DestroyPipeline(pipeline));
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        self.destroy_live(layout.raw(), MockCall::DestroyPipelineLayout(layout));
    }
}

// ============================================================================
// Mock swapchain
// ============================================================================

/// Scripted outcomes consumed by MockSwapchain, shared with the test
#[derive(Debug, Default)]
pub struct SwapchainScript {
    /// Errors returned by the next acquires, in order
    pub acquire_failures: VecDeque<Error>,
    /// Results of the next presents, in order (Optimal once exhausted)
    pub present_results: VecDeque<Result<PresentStatus>>,
    /// Errors returned by the next recreates, in order; the extent is kept
    pub recreate_failures: VecDeque<Error>,
}

/// Mock Swapchain writing to its device's call log
pub struct MockSwapchain {
    calls: CallLog,
    script: Arc<Mutex<SwapchainScript>>,
    images: Vec<ImageHandle>,
    views: Vec<ImageViewHandle>,
    extent: Extent2D,
    next_image: u32,
}

impl MockSwapchain {
    pub fn new(device: &MockGraphicsDevice, image_count: u32, extent: Extent2D) -> Self {
        let images = (0..image_count)
            .map(|_| ImageHandle(device.state().next()))
            .collect();
        let views = (0..image_count)
            .map(|_| ImageViewHandle(device.state().next()))
            .collect();
        Self {
            calls: Arc::clone(&device.calls),
            script: Arc::new(Mutex::new(SwapchainScript::default())),
            images,
            views,
            extent,
            next_image: 0,
        }
    }

    /// Handle to the script, kept by the test after the swapchain is moved
    pub fn script(&self) -> Arc<Mutex<SwapchainScript>> {
        Arc::clone(&self.script)
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, _timeout_ns: u64, signal: SemaphoreHandle) -> Result<AcquiredImage> {
        let scripted = self.script.lock().unwrap().acquire_failures.pop_front();
        let result = match scripted {
            Some(error) => Err(error),
            None => {
                let index = self.next_image;
                self.next_image = (self.next_image + 1) % self.images.len() as u32;
                Ok(AcquiredImage { index, suboptimal: false })
            }
        };
        self.record(MockCall::Acquire { signal, result: result.clone() });
        result
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentStatus> {
        self.record(MockCall::Present { image_index, wait });
        self.script
            .lock()
            .unwrap()
            .present_results
            .pop_front()
            .unwrap_or(Ok(PresentStatus::Optimal))
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.record(MockCall::Recreate { width, height });
        if let Some(error) = self.script.lock().unwrap().recreate_failures.pop_front() {
            return Err(error);
        }
        self.extent = Extent2D::new(width, height);
        self.next_image = 0;
        Ok(())
    }

    fn image(&self, index: u32) -> Option<ImageHandle> {
        self.images.get(index as usize).copied()
    }

    fn image_view(&self, index: u32) -> Option<ImageViewHandle> {
        self.views.get(index as usize).copied()
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }
}

#[path = "mock_graphics_device_tests.rs"]
#[cfg(test)]
mod tests;
