/// Opaque GPU object handles
///
/// Every handle wraps the backend's raw 64-bit object id. Zero is the null
/// handle, matching `VK_NULL_HANDLE`.

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(pub u64);

            impl $name {
                /// The null handle
                pub const NULL: Self = Self(0);

                /// Raw backend id
                pub fn raw(self) -> u64 {
                    self.0
                }

                pub fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

define_handle! {
    /// Descriptor set layout
    DescriptorSetLayoutHandle;
    /// Descriptor pool
    DescriptorPoolHandle;
    /// Descriptor set carved from a pool
    DescriptorSetHandle;
    /// CPU-observable GPU completion signal
    FenceHandle;
    /// GPU-only queue ordering signal
    SemaphoreHandle;
    CommandPoolHandle;
    CommandBufferHandle;
    BufferHandle;
    ImageHandle;
    ImageViewHandle;
    SamplerHandle;
    PipelineHandle;
    PipelineLayoutHandle;
    ShaderModuleHandle;
    /// Backing-allocator token for a buffer's memory
    AllocationHandle;
}
