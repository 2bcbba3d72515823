/// DescriptorLayoutBuilder - accumulates bindings into a descriptor set layout

use crate::error::{Error, Result};
use crate::graphics_device::{
    DescriptorBindingFlags, DescriptorSetLayoutFlags, DescriptorSetLayoutHandle, DescriptorType,
    GraphicsDevice, LayoutBinding, ShaderStageFlags,
};

/// Builder for descriptor set layouts
///
/// Bindings are accumulated with `add_binding` and turned into one immutable
/// layout by `build`. The stage flags given to `build` apply to every binding;
/// `add_binding_with_stages` adds stages visible to one binding only, on top of
/// the shared ones. The builder is reusable after `clear`.
///
/// # Example
///
/// ```ignore
/// let mut builder = DescriptorLayoutBuilder::new();
/// builder.add_binding(0, DescriptorType::UniformBuffer);
/// builder.add_binding(1, DescriptorType::CombinedImageSampler);
/// let layout = builder.build(
///     device,
///     ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
///     &[],
///     DescriptorSetLayoutFlags::empty(),
/// )?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<LayoutBinding>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one binding holding a single descriptor
    pub fn add_binding(&mut self, binding: u32, descriptor_type: DescriptorType) -> &mut Self {
        self.add_binding_with_stages(binding, descriptor_type, ShaderStageFlags::empty())
    }

    /// Append one binding with stages of its own, kept alongside the shared ones
    pub fn add_binding_with_stages(
        &mut self,
        binding: u32,
        descriptor_type: DescriptorType,
        stages: ShaderStageFlags,
    ) -> &mut Self {
        self.bindings.push(LayoutBinding {
            binding,
            descriptor_type,
            count: 1,
            stages,
            flags: DescriptorBindingFlags::empty(),
        });
        self
    }

    /// Forget every accumulated binding
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }

    /// Bindings as they will be handed to the device
    ///
    /// `binding_flags` is either empty or holds one entry per accumulated binding.
    pub fn resolve(
        &self,
        stages: ShaderStageFlags,
        binding_flags: &[DescriptorBindingFlags],
    ) -> Result<Vec<LayoutBinding>> {
        if !binding_flags.is_empty() && binding_flags.len() != self.bindings.len() {
            return Err(Error::InvalidResource(format!(
                "{} binding flags given for {} bindings",
                binding_flags.len(),
                self.bindings.len()
            )));
        }
        if let Some(duplicate) = self.duplicate_binding() {
            return Err(Error::InvalidResource(format!(
                "binding {} declared twice", duplicate
            )));
        }

        Ok(self.bindings
            .iter()
            .enumerate()
            .map(|(i, b)| LayoutBinding {
                stages: b.stages | stages,
                flags: binding_flags.get(i).copied().unwrap_or(b.flags),
                ..*b
            })
            .collect())
    }

    /// Create the layout from the accumulated bindings
    ///
    /// # Arguments
    ///
    /// * `device` - Device that owns the layout
    /// * `stages` - Stages OR-ed into every binding
    /// * `binding_flags` - Optional per-binding flags (empty, or one per binding)
    /// * `layout_flags` - Layout creation flags
    pub fn build(
        &self,
        device: &dyn GraphicsDevice,
        stages: ShaderStageFlags,
        binding_flags: &[DescriptorBindingFlags],
        layout_flags: DescriptorSetLayoutFlags,
    ) -> Result<DescriptorSetLayoutHandle> {
        let bindings = self.resolve(stages, binding_flags)?;
        device.create_descriptor_set_layout(&bindings, layout_flags)
    }

    fn duplicate_binding(&self) -> Option<u32> {
        let mut seen: Vec<u32> = self.bindings.iter().map(|b| b.binding).collect();
        seen.sort_unstable();
        seen.windows(2).find(|w| w[0] == w[1]).map(|w| w[0])
    }
}

#[cfg(test)]
#[path = "layout_builder_tests.rs"]
mod tests;
