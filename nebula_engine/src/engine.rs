//! Engine - frame ring, submission loop and engine-lifetime resources
//!
//! One `Engine` value owns the device, the swapchain and `FRAME_OVERLAP` frame
//! slots. `draw` renders one frame:
//!
//! 1. wait for the slot's render fence (the only blocking point)
//! 2. release the slot's deferred objects and reset its descriptor pools
//! 3. acquire a swapchain image
//! 4. record through the `FrameRecorder`
//! 5. reset the fence, submit (wait acquire, signal render + fence)
//! 6. present, `frame_number += 1`
//!
//! Out-of-date or suboptimal swapchains only set `resize_requested`; the
//! swapchain is recreated at the start of the next `draw`. A recreate that
//! fails out-of-date (zero-size surface) is retried on the following `draw`.

use std::sync::Arc;
use std::time::Instant;

use crate::assets::{MeshSource, Vertex};
use crate::config::Config;
use crate::descriptor::DescriptorAllocatorGrowable;
use crate::error::{Error, Result};
use crate::frame::{
    DeletionQueue, FrameContext, FrameData, FrameRecorder, PendingRelease, FRAME_OVERLAP,
};
use crate::graphics_device::{
    AllocatedBuffer, BufferCopy, BufferUsage, CommandBufferHandle, CommandPoolHandle, Extent2D,
    FenceHandle, GraphicsDevice, MemoryLocation, PipelineStage, PresentStatus, SubmitInfo,
    Swapchain,
};
use crate::scene::{GeoSurface, GpuMeshBuffers, MeshAsset};
use crate::window::{EventSource, WindowEvent};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

/// What one `draw` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and queued for presentation
    Presented,
    /// No image was acquired or the swapchain could not be rebuilt; nothing
    /// was recorded and the frame counter did not advance. The swapchain is
    /// recreated on the next `draw`.
    ResizeRequested,
}

/// Command pool, buffer and fence for blocking one-off submissions
#[derive(Debug)]
struct ImmediateSubmit {
    command_pool: CommandPoolHandle,
    command_buffer: CommandBufferHandle,
    fence: FenceHandle,
}

impl ImmediateSubmit {
    fn create(device: &dyn GraphicsDevice) -> Result<Self> {
        let command_pool = device.create_command_pool()?;
        let command_buffer = match device.allocate_command_buffer(command_pool) {
            Ok(cmd) => cmd,
            Err(e) => {
                device.destroy_command_pool(command_pool);
                return Err(e);
            }
        };
        let fence = match device.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_command_pool(command_pool);
                return Err(e);
            }
        };
        Ok(Self { command_pool, command_buffer, fence })
    }

    fn destroy(&self, device: &dyn GraphicsDevice) {
        device.destroy_fence(self.fence);
        device.destroy_command_pool(self.command_pool);
    }
}

/// The renderer
pub struct Engine {
    // Dropped before `device`
    swapchain: Box<dyn Swapchain>,
    frames: Vec<FrameData>,
    global_descriptors: DescriptorAllocatorGrowable,
    main_deletion_queue: DeletionQueue,
    immediate: ImmediateSubmit,
    device: Arc<dyn GraphicsDevice>,
    config: Config,
    frame_number: u64,
    window_extent: Extent2D,
    resize_requested: bool,
    /// Last recreate failed recoverably; `run` backs off until it succeeds
    swapchain_unavailable: bool,
    minimized: bool,
    destroyed: bool,
}

impl Engine {
    /// Create the frame ring and engine-lifetime resources
    ///
    /// # Arguments
    ///
    /// * `device` - Graphics device shared with the backend
    /// * `swapchain` - Swapchain of the window being rendered to
    /// * `config` - Engine configuration, validated here
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;

        let mut frames = Vec::with_capacity(FRAME_OVERLAP);
        let mut global_descriptors = DescriptorAllocatorGrowable::new();
        let created = Self::create_resources(
            device.as_ref(),
            &config,
            &mut frames,
            &mut global_descriptors,
        );
        let immediate = match created {
            Ok(immediate) => immediate,
            Err(e) => {
                global_descriptors.destroy_pools(device.as_ref());
                for frame in frames.iter_mut() {
                    frame.destroy(device.as_ref());
                }
                engine_error!("nebula::Engine", "Engine initialization failed: {}", e);
                return Err(e);
            }
        };

        let window_extent = swapchain.extent();
        engine_info!(
            "nebula::Engine",
            "Engine '{}' initialized: {}x{}, {} frames in flight, {} swapchain images",
            config.app_name,
            window_extent.width,
            window_extent.height,
            FRAME_OVERLAP,
            swapchain.image_count()
        );

        Ok(Self {
            swapchain,
            frames,
            global_descriptors,
            main_deletion_queue: DeletionQueue::new(),
            immediate,
            device,
            config,
            frame_number: 0,
            window_extent,
            resize_requested: false,
            swapchain_unavailable: false,
            minimized: false,
            destroyed: false,
        })
    }

    fn create_resources(
        device: &dyn GraphicsDevice,
        config: &Config,
        frames: &mut Vec<FrameData>,
        global_descriptors: &mut DescriptorAllocatorGrowable,
    ) -> Result<ImmediateSubmit> {
        for _ in 0..FRAME_OVERLAP {
            frames.push(FrameData::create(
                device,
                config.frame_descriptor_sets,
                &config.frame_descriptor_ratios,
            )?);
        }
        global_descriptors.init(
            device,
            config.global_descriptor_sets,
            &config.global_descriptor_ratios,
        )?;
        ImmediateSubmit::create(device)
    }

    // ===== FRAME LOOP =====

    /// Render and present one frame
    ///
    /// Errors other than out-of-date swapchains are unrecoverable and leave
    /// the engine in an unspecified state; the caller should shut down.
    pub fn draw(&mut self, recorder: &mut dyn FrameRecorder) -> Result<FrameOutcome> {
        if self.resize_requested {
            match self.resize_swapchain() {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    engine_debug!("nebula::Engine", "Swapchain recreate deferred ({})", e);
                    self.swapchain_unavailable = true;
                    return Ok(FrameOutcome::ResizeRequested);
                }
                Err(e) => return Err(e),
            }
        }

        let device = self.device.as_ref();
        let slot = (self.frame_number % FRAME_OVERLAP as u64) as usize;
        let frame = &mut self.frames[slot];

        device
            .wait_for_fence(frame.render_fence, self.config.fence_timeout_ns)
            .map_err(|e| {
                engine_error!("nebula::Engine", "Render fence wait failed on frame {}: {}", self.frame_number, e);
                e
            })?;
        frame.mark_gpu_complete();

        // The GPU is done with everything this slot used last time
        frame.deletion_queue.flush(device);
        frame.descriptors.clear_pools(device)?;

        let acquired = match self
            .swapchain
            .acquire_next_image(self.config.acquire_timeout_ns, frame.swapchain_semaphore)
        {
            Ok(acquired) => acquired,
            Err(e) if e.is_recoverable() => {
                engine_debug!("nebula::Engine", "Acquire failed ({}), resize requested", e);
                self.resize_requested = true;
                return Ok(FrameOutcome::ResizeRequested);
            }
            Err(e) => return Err(e),
        };
        if acquired.suboptimal {
            self.resize_requested = true;
        }

        let image = self.swapchain.image(acquired.index).ok_or_else(|| {
            Error::InvalidResource(format!("swapchain image {} out of range", acquired.index))
        })?;
        let image_view = self.swapchain.image_view(acquired.index).ok_or_else(|| {
            Error::InvalidResource(format!("swapchain view {} out of range", acquired.index))
        })?;

        let cmd = frame.command_buffer;
        device.reset_command_buffer(cmd)?;
        device.begin_command_buffer(cmd)?;
        {
            let mut context = FrameContext {
                device,
                command_buffer: cmd,
                image,
                image_view,
                image_index: acquired.index,
                extent: self.swapchain.extent(),
                frame_number: self.frame_number,
                descriptors: &mut frame.descriptors,
                deletion_queue: &mut frame.deletion_queue,
            };
            recorder.record(&mut context)?;
        }
        device.end_command_buffer(cmd)?;

        // Reset only once the slot is certain to be submitted
        device.reset_fence(frame.render_fence)?;
        frame.begin_recording()?;
        device.submit(&SubmitInfo {
            command_buffer: cmd,
            wait_semaphore: Some((frame.swapchain_semaphore, PipelineStage::ColorAttachmentOutput)),
            signal_semaphore: Some(frame.render_semaphore),
            fence: Some(frame.render_fence),
        })?;
        frame.mark_submitted()?;

        match self.swapchain.present(acquired.index, frame.render_semaphore) {
            Ok(PresentStatus::Optimal) => {}
            Ok(PresentStatus::Suboptimal) => self.resize_requested = true,
            Err(e) if e.is_recoverable() => {
                engine_debug!("nebula::Engine", "Present failed ({}), resize requested", e);
                self.resize_requested = true;
            }
            Err(e) => return Err(e),
        }

        self.frame_number += 1;
        Ok(FrameOutcome::Presented)
    }

    /// Poll events and draw until the window is closed
    pub fn run(
        &mut self,
        events: &mut dyn EventSource,
        recorder: &mut dyn FrameRecorder,
    ) -> Result<()> {
        let started = Instant::now();
        loop {
            for event in events.poll_events() {
                if !self.handle_event(event) {
                    engine_info!(
                        "nebula::Engine",
                        "Close requested after {} frames ({:.1}s)",
                        self.frame_number,
                        started.elapsed().as_secs_f64()
                    );
                    return Ok(());
                }
            }

            if self.minimized {
                std::thread::sleep(self.config.minimized_poll_interval);
                continue;
            }
            self.draw(recorder)?;
            if self.swapchain_unavailable {
                std::thread::sleep(self.config.minimized_poll_interval);
            }
        }
    }

    /// Apply one window event; false once the window should close
    pub fn handle_event(&mut self, event: WindowEvent) -> bool {
        match event {
            WindowEvent::Close => return false,
            WindowEvent::Minimized => self.minimized = true,
            WindowEvent::Restored => self.minimized = false,
            WindowEvent::Resized { width, height } => {
                let extent = Extent2D::new(width, height);
                if extent.is_empty() {
                    self.minimized = true;
                } else {
                    self.minimized = false;
                    if extent != self.window_extent {
                        self.window_extent = extent;
                        self.resize_requested = true;
                    }
                }
            }
        }
        true
    }

    /// Wait for the device and rebuild the swapchain at the window extent
    pub fn resize_swapchain(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        let extent = self.window_extent;
        self.swapchain.recreate(extent.width, extent.height)?;
        self.resize_requested = false;
        self.swapchain_unavailable = false;
        engine_info!("nebula::Engine", "Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }

    // ===== UPLOADS =====

    /// Record commands with `record` and block until the GPU has executed them
    pub fn immediate_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&dyn GraphicsDevice, CommandBufferHandle) -> Result<()>,
    {
        let device = self.device.as_ref();
        let imm = &self.immediate;

        device.reset_fence(imm.fence)?;
        device.reset_command_buffer(imm.command_buffer)?;
        device.begin_command_buffer(imm.command_buffer)?;
        record(device, imm.command_buffer)?;
        device.end_command_buffer(imm.command_buffer)?;

        device.submit(&SubmitInfo {
            command_buffer: imm.command_buffer,
            wait_semaphore: None,
            signal_semaphore: None,
            fence: Some(imm.fence),
        })?;
        device.wait_for_fence(imm.fence, self.config.fence_timeout_ns)
    }

    /// Copy a mesh into GPU-only vertex and index buffers
    ///
    /// The buffers are released with the engine.
    pub fn upload_mesh(&mut self, indices: &[u32], vertices: &[Vertex]) -> Result<GpuMeshBuffers> {
        if indices.is_empty() || vertices.is_empty() {
            return Err(Error::InvalidResource(format!(
                "cannot upload mesh with {} indices and {} vertices",
                indices.len(),
                vertices.len()
            )));
        }

        let mut created = DeletionQueue::new();
        match self.upload_tracked(indices, vertices, &mut created) {
            Ok(buffers) => {
                created.flush_with(|_| {});
                self.main_deletion_queue.push(PendingRelease::Buffer(buffers.vertex_buffer));
                self.main_deletion_queue.push(PendingRelease::Buffer(buffers.index_buffer));
                Ok(buffers)
            }
            Err(e) => {
                created.flush(self.device.as_ref());
                Err(e)
            }
        }
    }

    fn upload_tracked(
        &self,
        indices: &[u32],
        vertices: &[Vertex],
        created: &mut DeletionQueue,
    ) -> Result<GpuMeshBuffers> {
        let device = self.device.as_ref();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let vertex_size = vertex_bytes.len() as u64;
        let index_size = index_bytes.len() as u64;

        let vertex_buffer = device.create_buffer(
            vertex_size,
            BufferUsage::STORAGE | BufferUsage::TRANSFER_DST | BufferUsage::DEVICE_ADDRESS,
            MemoryLocation::GpuOnly,
        )?;
        created.push(PendingRelease::Buffer(vertex_buffer));
        let index_buffer = device.create_buffer(
            index_size,
            BufferUsage::INDEX | BufferUsage::TRANSFER_DST,
            MemoryLocation::GpuOnly,
        )?;
        created.push(PendingRelease::Buffer(index_buffer));

        let staging = device.create_buffer(
            vertex_size + index_size,
            BufferUsage::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        let copied = self.copy_through_staging(
            &staging,
            (&vertex_buffer, vertex_bytes),
            (&index_buffer, index_bytes),
        );
        device.destroy_buffer(&staging);
        copied?;

        engine_debug!(
            "nebula::Engine",
            "Uploaded mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );
        Ok(GpuMeshBuffers {
            index_buffer,
            vertex_buffer,
            vertex_buffer_address: vertex_buffer.device_address,
        })
    }

    /// Vertices at offset 0 of the staging buffer, indices right after
    fn copy_through_staging(
        &self,
        staging: &AllocatedBuffer,
        (vertex_buffer, vertex_bytes): (&AllocatedBuffer, &[u8]),
        (index_buffer, index_bytes): (&AllocatedBuffer, &[u8]),
    ) -> Result<()> {
        let device = self.device.as_ref();
        let vertex_size = vertex_bytes.len() as u64;
        device.write_buffer(staging, 0, vertex_bytes)?;
        device.write_buffer(staging, vertex_size, index_bytes)?;

        self.immediate_submit(|device, cmd| {
            device.cmd_copy_buffer(
                cmd,
                staging,
                vertex_buffer,
                &[BufferCopy { src_offset: 0, dst_offset: 0, size: vertex_size }],
            );
            device.cmd_copy_buffer(
                cmd,
                staging,
                index_buffer,
                &[BufferCopy {
                    src_offset: vertex_size,
                    dst_offset: 0,
                    size: index_bytes.len() as u64,
                }],
            );
            Ok(())
        })
    }

    /// Load every mesh of `path` through `source` and upload it
    ///
    /// Surfaces come back without a material.
    pub fn load_meshes(&mut self, source: &dyn MeshSource, path: &str) -> Result<Vec<Arc<MeshAsset>>> {
        let meshes = source.load_meshes(path).map_err(|e| {
            engine_warn!("nebula::Engine", "Failed to load meshes from '{}': {}", path, e);
            e
        })?;

        let mut assets = Vec::with_capacity(meshes.len());
        for mesh in meshes {
            if let Err(e) = mesh.validate() {
                engine_warn!("nebula::Engine", "Rejected mesh from '{}': {}", path, e);
                return Err(e);
            }
            let mesh_buffers = self.upload_mesh(&mesh.indices, &mesh.vertices)?;
            let surfaces = mesh
                .surfaces
                .iter()
                .map(|s| GeoSurface { start_index: s.start_index, count: s.count, material: None })
                .collect();
            assets.push(Arc::new(MeshAsset { name: mesh.name, surfaces, mesh_buffers }));
        }

        engine_info!("nebula::Engine", "Loaded {} meshes from '{}'", assets.len(), path);
        Ok(assets)
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Frames presented so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Slot the next `draw` uses
    pub fn current_frame(&self) -> &FrameData {
        &self.frames[(self.frame_number % FRAME_OVERLAP as u64) as usize]
    }

    pub fn frames(&self) -> &[FrameData] {
        &self.frames
    }

    /// Engine-lifetime descriptor sets, never reset by the frame loop
    pub fn global_descriptors(&mut self) -> &mut DescriptorAllocatorGrowable {
        &mut self.global_descriptors
    }

    /// Objects released at shutdown
    pub fn deletion_queue(&mut self) -> &mut DeletionQueue {
        &mut self.main_deletion_queue
    }

    pub fn swapchain(&self) -> &dyn Swapchain {
        self.swapchain.as_ref()
    }

    pub fn window_extent(&self) -> Extent2D {
        self.window_extent
    }

    pub fn resize_requested(&self) -> bool {
        self.resize_requested
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    // ===== SHUTDOWN =====

    /// Wait for the GPU and release every engine-owned object
    ///
    /// Safe to call more than once; later calls do nothing. Objects are
    /// released even when the idle wait fails, and that failure is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;

        let device = self.device.as_ref();
        let idle = device.wait_idle();
        if let Err(e) = &idle {
            engine_error!("nebula::Engine", "Device idle wait failed during shutdown: {}", e);
        }

        for frame in self.frames.iter_mut() {
            frame.destroy(device);
        }
        self.main_deletion_queue.flush(device);
        self.global_descriptors.destroy_pools(device);
        self.immediate.destroy(device);

        engine_info!("nebula::Engine", "Engine shut down after {} frames", self.frame_number);
        idle
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            engine_error!("nebula::Engine", "Shutdown on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
