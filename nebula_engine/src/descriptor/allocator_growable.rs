/// DescriptorAllocatorGrowable - descriptor sets from a growing working set of pools
///
/// Pools live in exactly one of two lists:
/// - `ready`: has spare capacity, may be allocated from
/// - `full`: reported exhaustion, waits for `clear_pools`
///
/// When no pool is ready a new one is created with `sets_per_pool` sets, and
/// `sets_per_pool` grows by 1.5x (capped at `MAX_SETS_PER_POOL`) so sustained
/// pressure creates few, larger pools. Growth is never undone.

use crate::descriptor::{DescriptorPoolRecord, PoolSizeRatio};
use crate::error::{Error, Result};
use crate::graphics_device::{DescriptorSetHandle, DescriptorSetLayoutHandle, GraphicsDevice};
use crate::{engine_debug, engine_warn};

/// Upper bound for the set capacity of newly created pools
pub const MAX_SETS_PER_POOL: u32 = 4092;

/// Grow a pool size by 1.5x, at least by one, capped at MAX_SETS_PER_POOL
///
/// Never returns less than `current`, even when `current` is already above the cap.
pub fn grow_sets_per_pool(current: u32) -> u32 {
    let grown = current.saturating_add((current / 2).max(1));
    grown.min(MAX_SETS_PER_POOL).max(current)
}

/// Growable descriptor allocator
#[derive(Debug, Default)]
pub struct DescriptorAllocatorGrowable {
    ratios: Vec<PoolSizeRatio>,
    sets_per_pool: u32,
    ready_pools: Vec<DescriptorPoolRecord>,
    full_pools: Vec<DescriptorPoolRecord>,
}

impl DescriptorAllocatorGrowable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the ratio template and create the first pool
    ///
    /// # Arguments
    ///
    /// * `device` - Device that owns the pools
    /// * `initial_sets` - Set capacity of the first pool
    /// * `ratios` - Descriptors of each type reserved per set, for every pool
    pub fn init(
        &mut self,
        device: &dyn GraphicsDevice,
        initial_sets: u32,
        ratios: &[PoolSizeRatio],
    ) -> Result<()> {
        if initial_sets == 0 {
            return Err(Error::InvalidResource(
                "growable descriptor allocator needs at least one set per pool".to_string(),
            ));
        }
        if self.pool_count() > 0 {
            return Err(Error::InvalidResource(
                "growable descriptor allocator already initialized".to_string(),
            ));
        }
        self.ratios = ratios.to_vec();
        let record = DescriptorPoolRecord::create(device, initial_sets, &self.ratios)?;
        self.ready_pools.push(record);
        self.sets_per_pool = initial_sets;
        Ok(())
    }

    /// Allocate one set
    ///
    /// Pool exhaustion moves the pool to `full` and retries once on another
    /// pool. A second failure is returned to the caller.
    pub fn allocate(
        &mut self,
        device: &dyn GraphicsDevice,
        layout: DescriptorSetLayoutHandle,
        variable_descriptor_count: Option<u32>,
    ) -> Result<DescriptorSetHandle> {
        let record = self.get_pool(device)?;
        match self.allocate_from(device, record, layout, variable_descriptor_count) {
            Err(e) if e.is_pool_exhaustion() => {
                engine_debug!("nebula::DescriptorAllocator",
                    "Pool {:?} exhausted ({}), retrying on a fresh pool", record.pool, e);
            }
            result => return result,
        }

        let record = self.get_pool(device)?;
        self.allocate_from(device, record, layout, variable_descriptor_count)
            .map_err(|e| {
                engine_warn!("nebula::DescriptorAllocator",
                    "Descriptor set allocation failed after retry: {}", e);
                e
            })
    }

    /// Reset every pool and make all of them ready again
    ///
    /// `sets_per_pool` keeps its grown value.
    pub fn clear_pools(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        self.ready_pools.append(&mut self.full_pools);
        for record in self.ready_pools.iter_mut() {
            record.reset(device)?;
        }
        Ok(())
    }

    /// Destroy every pool; both lists end empty
    pub fn destroy_pools(&mut self, device: &dyn GraphicsDevice) {
        for record in self.ready_pools.drain(..).chain(self.full_pools.drain(..)) {
            device.destroy_descriptor_pool(record.pool);
        }
    }

    // ===== INSPECTION =====

    /// Set capacity of the next pool this allocator creates
    pub fn sets_per_pool(&self) -> u32 {
        self.sets_per_pool
    }

    pub fn ratios(&self) -> &[PoolSizeRatio] {
        &self.ratios
    }

    pub fn ready_pools(&self) -> &[DescriptorPoolRecord] {
        &self.ready_pools
    }

    pub fn full_pools(&self) -> &[DescriptorPoolRecord] {
        &self.full_pools
    }

    pub fn ready_pool_count(&self) -> usize {
        self.ready_pools.len()
    }

    pub fn full_pool_count(&self) -> usize {
        self.full_pools.len()
    }

    pub fn pool_count(&self) -> usize {
        self.ready_pools.len() + self.full_pools.len()
    }

    /// Every pool, ready ones first
    pub fn pools(&self) -> impl Iterator<Item = &DescriptorPoolRecord> {
        self.ready_pools.iter().chain(self.full_pools.iter())
    }

    // ===== INTERNALS =====

    /// Take a ready pool, or create one and grow the size of the next
    ///
    /// The returned record belongs to neither list until `allocate_from` files it.
    fn get_pool(&mut self, device: &dyn GraphicsDevice) -> Result<DescriptorPoolRecord> {
        if let Some(record) = self.ready_pools.pop() {
            return Ok(record);
        }
        if self.sets_per_pool == 0 {
            return Err(Error::InvalidResource(
                "growable descriptor allocator used before init".to_string(),
            ));
        }
        let record = DescriptorPoolRecord::create(device, self.sets_per_pool, &self.ratios)?;
        self.sets_per_pool = grow_sets_per_pool(self.sets_per_pool);
        Ok(record)
    }

    /// Allocate from `record` and file it: full on exhaustion, ready otherwise
    fn allocate_from(
        &mut self,
        device: &dyn GraphicsDevice,
        mut record: DescriptorPoolRecord,
        layout: DescriptorSetLayoutHandle,
        variable_descriptor_count: Option<u32>,
    ) -> Result<DescriptorSetHandle> {
        let result = record.allocate(device, layout, variable_descriptor_count);
        match &result {
            Err(e) if e.is_pool_exhaustion() => self.full_pools.push(record),
            _ => self.ready_pools.push(record),
        }
        result
    }
}

#[cfg(test)]
#[path = "allocator_growable_tests.rs"]
mod tests;
