//! Unit tests for layout_builder.rs

use crate::descriptor::DescriptorLayoutBuilder;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{MockCall, MockGraphicsDevice};
use crate::graphics_device::{
    DescriptorBindingFlags, DescriptorSetLayoutFlags, DescriptorType, ShaderStageFlags,
};

#[test]
fn test_stages_applied_to_every_binding() {
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding(0, DescriptorType::UniformBuffer);
    builder.add_binding(1, DescriptorType::CombinedImageSampler);

    let bindings = builder.resolve(ShaderStageFlags::ALL_GRAPHICS, &[]).unwrap();
    assert_eq!(bindings.len(), 2);
    for binding in &bindings {
        assert_eq!(binding.stages, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT);
        assert_eq!(binding.count, 1);
    }
}

#[test]
fn test_per_binding_stages_kept() {
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding_with_stages(0, DescriptorType::StorageImage, ShaderStageFlags::COMPUTE);
    builder.add_binding(1, DescriptorType::UniformBuffer);

    let bindings = builder.resolve(ShaderStageFlags::FRAGMENT, &[]).unwrap();
    assert_eq!(bindings[0].stages, ShaderStageFlags::COMPUTE | ShaderStageFlags::FRAGMENT);
    assert_eq!(bindings[1].stages, ShaderStageFlags::FRAGMENT);
}

#[test]
fn test_resolve_does_not_mutate_builder() {
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding(0, DescriptorType::UniformBuffer);
    builder.resolve(ShaderStageFlags::VERTEX, &[]).unwrap();
    assert_eq!(builder.bindings()[0].stages, ShaderStageFlags::empty());
}

#[test]
fn test_binding_flags_applied_per_binding() {
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding(0, DescriptorType::UniformBuffer);
    builder.add_binding(1, DescriptorType::CombinedImageSampler);

    let flags = [
        DescriptorBindingFlags::empty(),
        DescriptorBindingFlags::PARTIALLY_BOUND | DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT,
    ];
    let bindings = builder.resolve(ShaderStageFlags::FRAGMENT, &flags).unwrap();
    assert_eq!(bindings[0].flags, DescriptorBindingFlags::empty());
    assert!(bindings[1].flags.contains(DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT));
}

#[test]
fn test_binding_flags_length_mismatch_rejected() {
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding(0, DescriptorType::UniformBuffer);
    builder.add_binding(1, DescriptorType::UniformBuffer);

    let result = builder.resolve(ShaderStageFlags::VERTEX, &[DescriptorBindingFlags::PARTIALLY_BOUND]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_duplicate_binding_rejected() {
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding(2, DescriptorType::UniformBuffer);
    builder.add_binding(2, DescriptorType::StorageBuffer);
    assert!(builder.resolve(ShaderStageFlags::VERTEX, &[]).is_err());
}

#[test]
fn test_build_creates_one_layout() {
    let device = MockGraphicsDevice::new();
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding(0, DescriptorType::StorageImage);

    let layout = builder
        .build(&device, ShaderStageFlags::COMPUTE, &[], DescriptorSetLayoutFlags::empty())
        .unwrap();

    let calls = device.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        MockCall::CreateLayout { layout: created, bindings, .. } => {
            assert_eq!(*created, layout);
            assert_eq!(bindings[0].stages, ShaderStageFlags::COMPUTE);
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[test]
fn test_builder_reusable_after_clear() {
    let device = MockGraphicsDevice::new();
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding(0, DescriptorType::UniformBuffer);
    let first = builder.build(&device, ShaderStageFlags::VERTEX, &[], DescriptorSetLayoutFlags::empty()).unwrap();

    builder.clear();
    assert!(builder.bindings().is_empty());
    builder.add_binding(0, DescriptorType::StorageImage);
    let second = builder.build(&device, ShaderStageFlags::COMPUTE, &[], DescriptorSetLayoutFlags::empty()).unwrap();

    assert_ne!(first, second);
}
