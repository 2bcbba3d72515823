/// Backend-agnostic descriptions passed across the GraphicsDevice boundary

use bitflags::bitflags;
use crate::graphics_device::{
    AllocationHandle, BufferHandle, CommandBufferHandle, DescriptorSetHandle, FenceHandle,
    ImageViewHandle, SamplerHandle, SemaphoreHandle,
};

// ============================================================================
// Descriptor types
// ============================================================================

/// Kind of resource a descriptor binding references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
}

impl DescriptorType {
    /// True for descriptor types written from a DescriptorImageInfo
    pub fn is_image(self) -> bool {
        matches!(
            self,
            DescriptorType::Sampler
                | DescriptorType::CombinedImageSampler
                | DescriptorType::SampledImage
                | DescriptorType::StorageImage
        )
    }

    /// True for descriptor types written from a DescriptorBufferInfo
    pub fn is_buffer(self) -> bool {
        !self.is_image()
    }
}

bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

bitflags! {
    /// Per-binding flags chained into layout creation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DescriptorBindingFlags: u32 {
        const UPDATE_AFTER_BIND = 1 << 0;
        const UPDATE_UNUSED_WHILE_PENDING = 1 << 1;
        const PARTIALLY_BOUND = 1 << 2;
        const VARIABLE_DESCRIPTOR_COUNT = 1 << 3;
    }
}

bitflags! {
    /// Layout creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DescriptorSetLayoutFlags: u32 {
        const UPDATE_AFTER_BIND_POOL = 1 << 0;
        const PUSH_DESCRIPTOR = 1 << 1;
    }
}

/// Number of descriptors of one type reserved by a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStageFlags,
    pub flags: DescriptorBindingFlags,
}

/// Image side of a descriptor write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorImageInfo {
    pub sampler: SamplerHandle,
    pub view: ImageViewHandle,
    pub layout: ImageLayout,
}

/// Buffer side of a descriptor write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBufferInfo {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub range: u64,
}

/// Which info array a write reads from, and at which index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    Image(usize),
    Buffer(usize),
}

/// One pending descriptor write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub resource: DescriptorResource,
}

/// A batch of writes applied to one set in a single device call
///
/// The info arrays outlive the call; writes refer into them by index.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorUpdate<'a> {
    pub set: DescriptorSetHandle,
    pub writes: &'a [DescriptorWrite],
    pub image_infos: &'a [DescriptorImageInfo],
    pub buffer_infos: &'a [DescriptorBufferInfo],
}

// ============================================================================
// Images and buffers
// ============================================================================

/// Image layouts the engine transitions between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

bitflags! {
    /// How a buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const DEVICE_ADDRESS = 1 << 6;
    }
}

/// Memory class requested from the backing allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local, not host visible
    GpuOnly,
    /// Host visible, used for uploads
    CpuToGpu,
    /// Host visible, used for readback
    GpuToCpu,
}

/// A buffer plus the backing allocator token that owns its memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer {
    pub buffer: BufferHandle,
    pub allocation: AllocationHandle,
    pub size: u64,
    /// GPU virtual address, 0 unless created with DEVICE_ADDRESS
    pub device_address: u64,
}

/// Region of a buffer-to-buffer copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

// ============================================================================
// Submission
// ============================================================================

/// Pipeline stage a queue submission waits at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    TopOfPipe,
    Transfer,
    ColorAttachmentOutput,
    AllCommands,
}

/// One queue submission of one command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitInfo {
    pub command_buffer: CommandBufferHandle,
    /// Semaphore to wait on, and the stage the wait applies to
    pub wait_semaphore: Option<(SemaphoreHandle, PipelineStage)>,
    pub signal_semaphore: Option<SemaphoreHandle>,
    /// Fence signaled when the GPU finishes this submission
    pub fence: Option<FenceHandle>,
}

// ============================================================================
// Presentation
// ============================================================================

/// 2D extent in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Swapchain presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// Vsync, always supported
    Fifo,
    FifoRelaxed,
    Mailbox,
    Immediate,
}
