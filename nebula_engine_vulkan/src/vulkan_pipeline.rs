/// PipelineBuilder - graphics pipelines for dynamic rendering
///
/// Holds plain state between calls; the Vulkan create-info chain is assembled
/// in `build_pipeline`. Viewport and scissor are always dynamic.

use ash::vk;
use nebula_engine::nebula::graphics::{
    GraphicsDevice, PipelineHandle, PipelineLayoutHandle, ShaderModuleHandle,
};
use nebula_engine::nebula::{Error, Result};
use nebula_engine::{engine_debug, engine_error, engine_warn};

use crate::vulkan_format::{from_raw, raw, vk_result_to_error};
use crate::vulkan_graphics_device::VulkanGraphicsDevice;

/// Builder for graphics pipelines targeting one color (and optional depth) attachment
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    vertex_shader: vk::ShaderModule,
    fragment_shader: vk::ShaderModule,
    topology: vk::PrimitiveTopology,
    polygon_mode: vk::PolygonMode,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    depth_test: bool,
    depth_write: bool,
    depth_compare_op: vk::CompareOp,
    color_attachment_format: vk::Format,
    depth_format: vk::Format,
    layout: vk::PipelineLayout,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            vertex_shader: vk::ShaderModule::null(),
            fragment_shader: vk::ShaderModule::null(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            color_blend_attachment: vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false),
            depth_test: false,
            depth_write: false,
            depth_compare_op: vk::CompareOp::NEVER,
            color_attachment_format: vk::Format::UNDEFINED,
            depth_format: vk::Format::UNDEFINED,
            layout: vk::PipelineLayout::null(),
        }
    }

    /// Reset every setting to its default
    pub fn clear(&mut self) -> &mut Self {
        *self = Self::new();
        self
    }

    pub fn set_shaders(&mut self, vertex: ShaderModuleHandle, fragment: ShaderModuleHandle) -> &mut Self {
        self.vertex_shader = from_raw(vertex.raw());
        self.fragment_shader = from_raw(fragment.raw());
        self
    }

    pub fn set_input_topology(&mut self, topology: vk::PrimitiveTopology) -> &mut Self {
        self.topology = topology;
        self
    }

    pub fn set_polygon_mode(&mut self, mode: vk::PolygonMode) -> &mut Self {
        self.polygon_mode = mode;
        self
    }

    pub fn set_cull_mode(&mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> &mut Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    /// Single sample, no sample shading
    pub fn set_multisampling_none(&mut self) -> &mut Self {
        // Only one supported mode; multisample state is emitted in build_pipeline
        self
    }

    pub fn disable_blending(&mut self) -> &mut Self {
        self.color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);
        self
    }

    /// out = src * src_alpha + dst
    pub fn enable_blending_additive(&mut self) -> &mut Self {
        self.color_blend_attachment = blend_state(vk::BlendFactor::ONE);
        self
    }

    /// out = src * src_alpha + dst * (1 - src_alpha)
    pub fn enable_blending_alpha(&mut self) -> &mut Self {
        self.color_blend_attachment = blend_state(vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        self
    }

    pub fn set_color_attachment_format(&mut self, format: vk::Format) -> &mut Self {
        self.color_attachment_format = format;
        self
    }

    pub fn set_depth_format(&mut self, format: vk::Format) -> &mut Self {
        self.depth_format = format;
        self
    }

    pub fn enable_depth_test(&mut self, depth_write: bool, compare_op: vk::CompareOp) -> &mut Self {
        self.depth_test = true;
        self.depth_write = depth_write;
        self.depth_compare_op = compare_op;
        self
    }

    pub fn disable_depth_test(&mut self) -> &mut Self {
        self.depth_test = false;
        self.depth_write = false;
        self.depth_compare_op = vk::CompareOp::NEVER;
        self
    }

    pub fn set_layout(&mut self, layout: PipelineLayoutHandle) -> &mut Self {
        self.layout = from_raw(layout.raw());
        self
    }

    /// Create the graphics pipeline
    ///
    /// Fails with `Error::InvalidResource` when shaders, layout or the color
    /// format are missing.
    pub fn build_pipeline(&self, device: &VulkanGraphicsDevice) -> Result<PipelineHandle> {
        if self.vertex_shader == vk::ShaderModule::null() || self.fragment_shader == vk::ShaderModule::null() {
            return Err(Error::InvalidResource("Pipeline needs a vertex and a fragment shader".to_string()));
        }
        if self.layout == vk::PipelineLayout::null() {
            return Err(Error::InvalidResource("Pipeline needs a layout".to_string()));
        }
        if self.color_attachment_format == vk::Format::UNDEFINED {
            return Err(Error::InvalidResource("Pipeline needs a color attachment format".to_string()));
        }

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.vertex_shader)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(self.fragment_shader)
                .name(c"main"),
        ];

        // Vertices are pulled from a storage buffer through its device address
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology)
            .primitive_restart_enable(false);
        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(self.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face);
        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false);
        let attachments = [self.color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&attachments);
        let depth_stencil = self.depth_stencil_state();

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [self.color_attachment_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(self.depth_format);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .depth_stencil_state(&depth_stencil)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            device.context().device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| {
            engine_error!("nebula::vulkan", "Failed to create graphics pipeline: {:?}", e);
            vk_result_to_error(e, "vkCreateGraphicsPipelines")
        })?;

        let pipeline = pipelines
            .first()
            .copied()
            .ok_or_else(|| Error::BackendError("vkCreateGraphicsPipelines returned no pipeline".to_string()))?;
        engine_debug!("nebula::vulkan", "Created graphics pipeline {:?}", pipeline);
        Ok(PipelineHandle(raw(pipeline)))
    }

    fn depth_stencil_state(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(self.depth_compare_op)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
    }
}

fn blend_state(dst_color: vk::BlendFactor) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(dst_color)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
}

/// Read a SPIR-V file from disk and create a shader module from it
pub fn load_shader_module(device: &VulkanGraphicsDevice, path: &str) -> Result<ShaderModuleHandle> {
    let code = std::fs::read(path).map_err(|e| {
        engine_warn!("nebula::vulkan", "Failed to read shader '{}': {}", path, e);
        Error::AssetLoadFailed(format!("Failed to read shader '{}': {}", path, e))
    })?;
    device.create_shader_module(&code)
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
