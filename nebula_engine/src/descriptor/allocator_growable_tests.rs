//! Unit tests for allocator_growable.rs
//!
//! Pool bookkeeping is checked against the mock device after every step:
//! ready and full never share a pool, and together they hold exactly the
//! pools the device still has alive.

use crate::descriptor::{
    grow_sets_per_pool, DescriptorAllocatorGrowable, PoolSizeRatio, MAX_SETS_PER_POOL,
};
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{MockCall, MockGraphicsDevice};
use crate::graphics_device::{DescriptorPoolHandle, DescriptorSetLayoutHandle, DescriptorType};
use rustc_hash::FxHashSet;

// ============================================================================
// TEST HELPERS
// ============================================================================

const LAYOUT: DescriptorSetLayoutHandle = DescriptorSetLayoutHandle(1);

fn ratios() -> Vec<PoolSizeRatio> {
    vec![
        PoolSizeRatio::new(DescriptorType::UniformBuffer, 1.0),
        PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 2.0),
    ]
}

fn allocator_with(device: &MockGraphicsDevice, initial_sets: u32) -> DescriptorAllocatorGrowable {
    let mut allocator = DescriptorAllocatorGrowable::new();
    allocator.init(device, initial_sets, &ratios()).unwrap();
    allocator
}

fn assert_pool_sets_consistent(allocator: &DescriptorAllocatorGrowable, device: &MockGraphicsDevice) {
    let ready: FxHashSet<DescriptorPoolHandle> = allocator.ready_pools().iter().map(|r| r.pool).collect();
    let full: FxHashSet<DescriptorPoolHandle> = allocator.full_pools().iter().map(|r| r.pool).collect();

    assert_eq!(ready.len(), allocator.ready_pool_count(), "pool listed twice in ready");
    assert_eq!(full.len(), allocator.full_pool_count(), "pool listed twice in full");
    assert!(ready.is_disjoint(&full), "pool in both ready and full");

    let union: FxHashSet<DescriptorPoolHandle> = ready.union(&full).copied().collect();
    assert_eq!(union, device.live_pools());
}

fn allocation_attempts(device: &MockGraphicsDevice) -> usize {
    device.count_calls(|c| matches!(c, MockCall::AllocateSet { .. }))
}

// ============================================================================
// INIT
// ============================================================================

#[test]
fn test_init_creates_one_ready_pool() {
    let device = MockGraphicsDevice::new();
    let allocator = allocator_with(&device, 8);

    assert_eq!(allocator.ready_pool_count(), 1);
    assert_eq!(allocator.full_pool_count(), 0);
    assert_eq!(allocator.sets_per_pool(), 8);
    assert_eq!(allocator.ready_pools()[0].capacity, 8);
    assert_eq!(allocator.ratios(), ratios().as_slice());

    match &device.calls()[0] {
        MockCall::CreatePool { max_sets, sizes, .. } => {
            assert_eq!(*max_sets, 8);
            assert_eq!(sizes[1].count, 16);
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[test]
fn test_init_rejects_zero_sets() {
    let device = MockGraphicsDevice::new();
    let mut allocator = DescriptorAllocatorGrowable::new();
    assert!(matches!(allocator.init(&device, 0, &ratios()), Err(Error::InvalidResource(_))));
    assert_eq!(allocator.pool_count(), 0);
}

#[test]
fn test_allocate_before_init_rejected() {
    let device = MockGraphicsDevice::new();
    let mut allocator = DescriptorAllocatorGrowable::new();
    assert!(matches!(allocator.allocate(&device, LAYOUT, None), Err(Error::InvalidResource(_))));
    assert!(device.created_pools().is_empty());
}

// ============================================================================
// ALLOCATION AND CAPACITY
// ============================================================================

#[test]
fn test_successful_allocation_keeps_pool_ready() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 4);

    allocator.allocate(&device, LAYOUT, None).unwrap();
    assert_eq!(allocator.ready_pool_count(), 1);
    assert_eq!(allocator.ready_pools()[0].allocated, 1);
    assert_pool_sets_consistent(&allocator, &device);
}

#[test]
fn test_variable_count_forwarded() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 4);

    allocator.allocate(&device, LAYOUT, Some(16)).unwrap();
    assert_eq!(
        device.count_calls(|c| matches!(
            c,
            MockCall::AllocateSet { variable_descriptor_count: Some(16), .. }
        )),
        1
    );
}

#[test]
fn test_pool_never_exceeds_capacity() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 2);
    let first_pool = allocator.ready_pools()[0].pool;

    allocator.allocate(&device, LAYOUT, None).unwrap();
    allocator.allocate(&device, LAYOUT, None).unwrap();
    assert_eq!(device.pool(first_pool).unwrap().allocated, 2);

    // Third set must come from a new pool
    allocator.allocate(&device, LAYOUT, None).unwrap();
    assert_eq!(device.pool(first_pool).unwrap().allocated, 2);
    assert_eq!(allocator.full_pools()[0].pool, first_pool);
    assert_eq!(device.created_pools().len(), 2);

    for record in allocator.pools() {
        assert!(record.allocated <= record.capacity);
        assert!(device.pool(record.pool).unwrap().allocated <= record.capacity);
    }
    assert_pool_sets_consistent(&allocator, &device);
}

#[test]
fn test_many_allocations_stay_consistent() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 3);

    for _ in 0..200 {
        allocator.allocate(&device, LAYOUT, None).unwrap();
        assert_pool_sets_consistent(&allocator, &device);
    }
    let total: u32 = allocator.pools().map(|r| r.allocated).sum();
    assert_eq!(total, 200);
}

// ============================================================================
// GROWTH
// ============================================================================

#[test]
fn test_grow_sets_per_pool() {
    assert_eq!(grow_sets_per_pool(1), 2);
    assert_eq!(grow_sets_per_pool(2), 3);
    assert_eq!(grow_sets_per_pool(4), 6);
    assert_eq!(grow_sets_per_pool(100), 150);
    assert_eq!(grow_sets_per_pool(3000), MAX_SETS_PER_POOL);
    assert_eq!(grow_sets_per_pool(MAX_SETS_PER_POOL), MAX_SETS_PER_POOL);
    assert_eq!(grow_sets_per_pool(5000), 5000);
}

#[test]
fn test_growth_is_monotonic_and_bounded() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 4);
    let mut previous = allocator.sets_per_pool();
    let mut creations = 0;

    while creations < 12 {
        let pools_before = device.created_pools().len();
        allocator.allocate(&device, LAYOUT, None).unwrap();
        if device.created_pools().len() > pools_before {
            creations += 1;
        }
        let current = allocator.sets_per_pool();
        assert!(current >= previous, "sets_per_pool shrank from {} to {}", previous, current);
        assert!(current <= MAX_SETS_PER_POOL);
        previous = current;
    }
    assert!(allocator.sets_per_pool() > 4);
}

#[test]
fn test_new_pool_uses_current_size_then_grows() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 1);

    allocator.allocate(&device, LAYOUT, None).unwrap();
    allocator.allocate(&device, LAYOUT, None).unwrap();

    let second = allocator.ready_pools()[0];
    assert_eq!(second.capacity, 1);
    assert_eq!(allocator.sets_per_pool(), 2);
}

#[test]
fn test_initial_size_above_cap_is_kept() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 5000);
    device.fail_next_allocations([Error::OutOfPoolMemory]);

    allocator.allocate(&device, LAYOUT, None).unwrap();
    assert_eq!(allocator.sets_per_pool(), 5000);
}

#[test]
fn test_growth_survives_clear_pools() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 2);
    for _ in 0..5 {
        allocator.allocate(&device, LAYOUT, None).unwrap();
    }
    let grown = allocator.sets_per_pool();
    assert!(grown > 2);

    allocator.clear_pools(&device).unwrap();
    assert_eq!(allocator.sets_per_pool(), grown);
}

// ============================================================================
// RETRY POLICY
// ============================================================================

#[test]
fn test_single_retry_recovers() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 8);
    device.fail_next_allocations([Error::FragmentedPool]);

    assert!(allocator.allocate(&device, LAYOUT, None).is_ok());
    assert_eq!(allocation_attempts(&device), 2);
    assert_eq!(allocator.full_pool_count(), 1);
    assert_eq!(allocator.ready_pool_count(), 1);
    assert_pool_sets_consistent(&allocator, &device);
}

#[test]
fn test_second_failure_propagates_after_one_retry() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 8);
    device.fail_next_allocations([Error::OutOfPoolMemory, Error::FragmentedPool]);

    assert_eq!(allocator.allocate(&device, LAYOUT, None), Err(Error::FragmentedPool));
    assert_eq!(allocation_attempts(&device), 2, "exactly one retry");
    assert_eq!(allocator.full_pool_count(), 2);
    assert_eq!(allocator.ready_pool_count(), 0);
    assert_pool_sets_consistent(&allocator, &device);

    // The allocator stays usable
    assert!(allocator.allocate(&device, LAYOUT, None).is_ok());
    assert_pool_sets_consistent(&allocator, &device);
}

#[test]
fn test_other_errors_do_not_retry() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 8);
    device.fail_next_allocations([Error::OutOfMemory]);

    assert_eq!(allocator.allocate(&device, LAYOUT, None), Err(Error::OutOfMemory));
    assert_eq!(allocation_attempts(&device), 1);
    assert_eq!(allocator.ready_pool_count(), 1);
    assert_eq!(allocator.full_pool_count(), 0);
    assert_pool_sets_consistent(&allocator, &device);
}

// ============================================================================
// CLEAR AND DESTROY
// ============================================================================

#[test]
fn test_clear_pools_moves_everything_to_ready() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 2);
    for _ in 0..7 {
        allocator.allocate(&device, LAYOUT, None).unwrap();
    }
    assert!(allocator.full_pool_count() > 0);
    let pool_count = allocator.pool_count();

    allocator.clear_pools(&device).unwrap();

    assert_eq!(allocator.full_pool_count(), 0);
    assert_eq!(allocator.ready_pool_count(), pool_count);
    assert!(allocator.pools().all(|r| r.allocated == 0));
    assert_eq!(device.count_calls(|c| matches!(c, MockCall::ResetPool(_))), pool_count);
    assert_pool_sets_consistent(&allocator, &device);
}

#[test]
fn test_cleared_pools_are_reused() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 2);
    for _ in 0..2 {
        allocator.allocate(&device, LAYOUT, None).unwrap();
    }
    allocator.clear_pools(&device).unwrap();
    for _ in 0..2 {
        allocator.allocate(&device, LAYOUT, None).unwrap();
    }
    assert_eq!(device.created_pools().len(), 1);
}

#[test]
fn test_destroy_pools_empties_both_lists() {
    let device = MockGraphicsDevice::new();
    let mut allocator = allocator_with(&device, 1);
    for _ in 0..4 {
        allocator.allocate(&device, LAYOUT, None).unwrap();
    }
    let created = device.created_pools().len();

    allocator.destroy_pools(&device);

    assert_eq!(allocator.pool_count(), 0);
    assert!(device.live_pools().is_empty());
    assert_eq!(device.count_calls(|c| matches!(c, MockCall::DestroyPool(_))), created);
    assert_pool_sets_consistent(&allocator, &device);
}
