//! Graphics pipeline construction.

use crate::error::{GpuError, Result};
use ash::vk;

/// Shader stage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    fn stage_flags(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

/// A shader stage as supplied by the shader collaborator: stage kind plus
/// raw SPIR-V words. Bytecode acceptance is only validated at module
/// creation time.
#[derive(Clone)]
pub struct ShaderStage {
    pub kind: ShaderKind,
    pub code: Vec<u32>,
}

impl ShaderStage {
    pub fn new(kind: ShaderKind, code: Vec<u32>) -> Self {
        Self { kind, code }
    }
}

/// Vertex input layout as supplied by the mesh collaborator.
#[derive(Clone, Default)]
pub struct VertexLayout {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexLayout {
    /// One binding of tightly packed 3-float positions, one attribute.
    pub fn position_only() -> Self {
        Self {
            bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: (std::mem::size_of::<f32>() * 3) as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            }],
            attributes: vec![vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            }],
        }
    }
}

/// An executable graphics pipeline bound to a render pass.
///
/// Immutable once built. Fixed-function state is static policy: dynamic
/// viewport/scissor, triangle list, wireframe with back-face culling and
/// clockwise front face, single sample, no blending. The layout carries no
/// descriptor sets or push constants.
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Build the pipeline from the given stages and vertex layout.
    ///
    /// On failure no partially constructed object is exposed; interim
    /// shader modules are destroyed on every path.
    ///
    /// # Safety
    /// The device and render pass must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        stages: &[ShaderStage],
        vertex_layout: &VertexLayout,
    ) -> Result<Self> {
        let mut modules = Vec::with_capacity(stages.len());
        for stage in stages {
            let shader_info = vk::ShaderModuleCreateInfo::default().code(&stage.code);
            match device.create_shader_module(&shader_info, None) {
                Ok(module) => modules.push(module),
                Err(e) => {
                    for &module in &modules {
                        device.destroy_shader_module(module, None);
                    }
                    return Err(GpuError::ShaderCompilation(format!("{:?}: {e}", stage.kind)));
                }
            }
        }

        let result = Self::build(device, render_pass, stages, &modules, vertex_layout);

        // Modules are only needed during pipeline creation
        for &module in &modules {
            device.destroy_shader_module(module, None);
        }

        result
    }

    unsafe fn build(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        stages: &[ShaderStage],
        modules: &[vk::ShaderModule],
        vertex_layout: &VertexLayout,
    ) -> Result<Self> {
        let shader_stages: Vec<_> = stages
            .iter()
            .zip(modules)
            .map(|(stage, &module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.kind.stage_flags())
                    .module(module)
                    .name(c"main")
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_layout.bindings)
            .vertex_attribute_descriptions(&vertex_layout.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic so a swapchain resize does not
        // force a pipeline rebuild
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::LINE)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = device
            .create_pipeline_layout(&layout_info, None)
            .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = match device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[pipeline_info],
            None,
        ) {
            Ok(pipelines) => pipelines,
            Err((_pipelines, e)) => {
                device.destroy_pipeline_layout(layout, None);
                return Err(GpuError::PipelineCreation(e.to_string()));
            }
        };

        Ok(Self {
            pipeline: pipelines[0],
            layout,
        })
    }

    /// Destroy the pipeline and its layout.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_layout_is_tightly_packed() {
        let layout = VertexLayout::position_only();
        assert_eq!(layout.bindings.len(), 1);
        assert_eq!(layout.bindings[0].stride, 12);
        assert_eq!(layout.attributes.len(), 1);
        assert_eq!(layout.attributes[0].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn shader_kinds_map_to_stage_flags() {
        assert_eq!(
            ShaderKind::Vertex.stage_flags(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderKind::Fragment.stage_flags(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }
}
