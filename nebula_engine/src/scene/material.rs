/// Materials - pipeline + descriptor set pairs bound per draw

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::descriptor::{DescriptorAllocatorGrowable, DescriptorLayoutBuilder, DescriptorWriter};
use crate::error::Result;
use crate::graphics_device::{
    BufferHandle, DescriptorSetHandle, DescriptorSetLayoutFlags, DescriptorSetLayoutHandle,
    DescriptorType, GraphicsDevice, ImageLayout, ImageViewHandle, PipelineHandle,
    PipelineLayoutHandle, SamplerHandle, ShaderStageFlags,
};
use crate::engine_debug;

/// Render pass a material draws in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialPass {
    MainColor,
    Transparent,
    Other,
}

/// Pipeline and its layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialPipeline {
    pub pipeline: PipelineHandle,
    pub layout: PipelineLayoutHandle,
}

/// What a draw binds: pipeline, material descriptor set and pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialInstance {
    pub pipeline: MaterialPipeline,
    pub material_set: DescriptorSetHandle,
    pub pass: MaterialPass,
}

/// Uniform block of the metallic-roughness material, padded to 256 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub color_factors: Vec4,
    pub metal_rough_factors: Vec4,
    /// Padding up to the uniform buffer offset alignment
    pub extra: [Vec4; 14],
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            color_factors: Vec4::ONE,
            metal_rough_factors: Vec4::new(1.0, 0.5, 0.0, 0.0),
            extra: [Vec4::ZERO; 14],
        }
    }
}

/// GPU resources referenced by one metallic-roughness material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialResources {
    pub color_view: ImageViewHandle,
    pub color_sampler: SamplerHandle,
    pub metal_rough_view: ImageViewHandle,
    pub metal_rough_sampler: SamplerHandle,
    /// Buffer holding a MaterialConstants block
    pub data_buffer: BufferHandle,
    pub data_buffer_offset: u64,
}

/// Metallic-roughness material family: one layout, an opaque and a transparent pipeline
///
/// Binding 0 is the MaterialConstants uniform, bindings 1 and 2 the color and
/// metal-rough textures.
#[derive(Debug)]
pub struct MetallicRoughnessMaterial {
    pub layout: DescriptorSetLayoutHandle,
    pub opaque: MaterialPipeline,
    pub transparent: MaterialPipeline,
    writer: DescriptorWriter,
}

impl MetallicRoughnessMaterial {
    /// Create the material descriptor set layout
    pub fn build_layout(device: &dyn GraphicsDevice) -> Result<DescriptorSetLayoutHandle> {
        let mut builder = DescriptorLayoutBuilder::new();
        builder
            .add_binding(0, DescriptorType::UniformBuffer)
            .add_binding(1, DescriptorType::CombinedImageSampler)
            .add_binding(2, DescriptorType::CombinedImageSampler);
        builder.build(
            device,
            ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
            &[],
            DescriptorSetLayoutFlags::empty(),
        )
    }

    pub fn new(
        layout: DescriptorSetLayoutHandle,
        opaque: MaterialPipeline,
        transparent: MaterialPipeline,
    ) -> Self {
        Self { layout, opaque, transparent, writer: DescriptorWriter::new() }
    }

    /// Allocate and fill the descriptor set of one material
    pub fn write_material(
        &mut self,
        device: &dyn GraphicsDevice,
        pass: MaterialPass,
        resources: &MaterialResources,
        descriptors: &mut DescriptorAllocatorGrowable,
    ) -> Result<MaterialInstance> {
        let pipeline = match pass {
            MaterialPass::Transparent => self.transparent,
            MaterialPass::MainColor | MaterialPass::Other => self.opaque,
        };
        let material_set = descriptors.allocate(device, self.layout, None)?;

        self.writer.clear();
        self.writer
            .write_buffer(
                0,
                resources.data_buffer,
                std::mem::size_of::<MaterialConstants>() as u64,
                resources.data_buffer_offset,
                DescriptorType::UniformBuffer,
            )
            .write_image(
                1,
                resources.color_view,
                resources.color_sampler,
                ImageLayout::ShaderReadOnly,
                DescriptorType::CombinedImageSampler,
            )
            .write_image(
                2,
                resources.metal_rough_view,
                resources.metal_rough_sampler,
                ImageLayout::ShaderReadOnly,
                DescriptorType::CombinedImageSampler,
            );
        self.writer.update_set(device, material_set);

        Ok(MaterialInstance { pipeline, material_set, pass })
    }

    /// Destroy the layout and pipelines
    pub fn clear_resources(&self, device: &dyn GraphicsDevice) {
        device.destroy_descriptor_set_layout(self.layout);
        device.destroy_pipeline(self.transparent.pipeline);
        device.destroy_pipeline(self.opaque.pipeline);
        device.destroy_pipeline_layout(self.opaque.layout);
        if self.transparent.layout != self.opaque.layout {
            device.destroy_pipeline_layout(self.transparent.layout);
        }
        engine_debug!("nebula::Material", "Released metallic-roughness material resources");
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
