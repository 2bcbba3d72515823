/// Fixed-capacity descriptor allocator and the pool sizing shared by both allocators

use crate::error::{Error, Result};
use crate::graphics_device::{
    DescriptorPoolHandle, DescriptorSetHandle, DescriptorSetLayoutHandle, DescriptorType,
    GraphicsDevice, PoolSize,
};
use crate::engine_debug;

/// Descriptors of one type reserved per set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSizeRatio {
    pub descriptor_type: DescriptorType,
    pub ratio: f32,
}

impl PoolSizeRatio {
    pub fn new(descriptor_type: DescriptorType, ratio: f32) -> Self {
        Self { descriptor_type, ratio }
    }
}

/// Pool sizes for `max_sets` sets: `ceil(ratio * max_sets)` descriptors per ratio
pub fn pool_sizes_for(max_sets: u32, ratios: &[PoolSizeRatio]) -> Vec<PoolSize> {
    ratios
        .iter()
        .map(|r| PoolSize {
            descriptor_type: r.descriptor_type,
            count: (r.ratio * max_sets as f32).ceil() as u32,
        })
        .collect()
}

/// A native pool plus its set accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolRecord {
    pub pool: DescriptorPoolHandle,
    /// Sets the pool was created for
    pub capacity: u32,
    /// Sets handed out since creation or the last reset
    pub allocated: u32,
}

impl DescriptorPoolRecord {
    pub fn is_exhausted(&self) -> bool {
        self.allocated >= self.capacity
    }

    /// Create a pool of `max_sets` sets sized by `ratios`
    pub(crate) fn create(
        device: &dyn GraphicsDevice,
        max_sets: u32,
        ratios: &[PoolSizeRatio],
    ) -> Result<Self> {
        let sizes = pool_sizes_for(max_sets, ratios);
        let pool = device.create_descriptor_pool(max_sets, &sizes)?;
        engine_debug!("nebula::DescriptorAllocator", "Created descriptor pool {:?} for {} sets", pool, max_sets);
        Ok(Self { pool, capacity: max_sets, allocated: 0 })
    }

    /// Allocate one set, refusing locally once the pool reached its capacity
    pub(crate) fn allocate(
        &mut self,
        device: &dyn GraphicsDevice,
        layout: DescriptorSetLayoutHandle,
        variable_descriptor_count: Option<u32>,
    ) -> Result<DescriptorSetHandle> {
        if self.is_exhausted() {
            return Err(Error::OutOfPoolMemory);
        }
        let set = device.allocate_descriptor_set(self.pool, layout, variable_descriptor_count)?;
        self.allocated += 1;
        Ok(set)
    }

    pub(crate) fn reset(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        device.reset_descriptor_pool(self.pool)?;
        self.allocated = 0;
        Ok(())
    }
}

/// Descriptor allocator over one fixed pool
///
/// Never grows: once the pool is exhausted every allocation fails until
/// `clear_descriptors` or a new `init_pool`.
#[derive(Debug, Default)]
pub struct DescriptorAllocator {
    pool: Option<DescriptorPoolRecord>,
}

impl DescriptorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the pool
    ///
    /// # Arguments
    ///
    /// * `device` - Device that owns the pool
    /// * `max_sets` - Number of sets the pool holds
    /// * `ratios` - Descriptors of each type reserved per set
    pub fn init_pool(
        &mut self,
        device: &dyn GraphicsDevice,
        max_sets: u32,
        ratios: &[PoolSizeRatio],
    ) -> Result<()> {
        if self.pool.is_some() {
            return Err(Error::InvalidResource(
                "descriptor allocator pool already initialized".to_string(),
            ));
        }
        self.pool = Some(DescriptorPoolRecord::create(device, max_sets, ratios)?);
        Ok(())
    }

    /// Allocate one set; `Error::OutOfPoolMemory` or `Error::FragmentedPool` once exhausted
    pub fn allocate(
        &mut self,
        device: &dyn GraphicsDevice,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        self.record_mut()?.allocate(device, layout, None)
    }

    /// Reset the pool; every set allocated from it becomes invalid
    pub fn clear_descriptors(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        self.record_mut()?.reset(device)
    }

    /// Destroy the pool; a no-op when it was never created
    pub fn destroy_pool(&mut self, device: &dyn GraphicsDevice) {
        if let Some(record) = self.pool.take() {
            device.destroy_descriptor_pool(record.pool);
        }
    }

    pub fn pool(&self) -> Option<&DescriptorPoolRecord> {
        self.pool.as_ref()
    }

    fn record_mut(&mut self) -> Result<&mut DescriptorPoolRecord> {
        self.pool.as_mut().ok_or_else(|| {
            Error::InvalidResource("descriptor allocator used before init_pool".to_string())
        })
    }
}

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;
