//! Per-frame rendering loop.
//!
//! One frame in flight: the in-flight fence caps the CPU at a single
//! recorded-but-unretired submission, and the two semaphores order the
//! presentation engine, the graphics queue, and the present queue.

use ash::vk;
use lumen_gpu::command::submit_command_buffers;
use lumen_gpu::swapchain::AcquireResult;
use lumen_gpu::{
    BufferTransferor, CommandPool, FrameSync, GpuContext, GraphicsPipeline, Result, ShaderStage,
    Swapchain, VertexLayout,
};

use crate::mesh::MeshBuffers;
use crate::policy::{run_frame, FrameOps, FrameOutcome, RebuildPolicy};
use crate::render_pass::{create_framebuffers, create_render_pass};

/// Bound on the in-flight fence wait and image acquisition. An expiry is
/// reported as a lost device rather than hanging the loop forever.
const FRAME_TIMEOUT_NS: u64 = 5_000_000_000;

/// Owns the per-frame synchronization triple, the command pool/buffer, the
/// frame buffers, and the resident meshes; drives the
/// acquire/record/submit/present cycle.
pub struct FrameRenderer {
    render_pass: vk::RenderPass,
    pipeline: GraphicsPipeline,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: CommandPool,
    command_buffer: vk::CommandBuffer,
    sync: FrameSync,
    meshes: Vec<MeshBuffers>,
    policy: RebuildPolicy,
    // Kept so a format change can rebuild the pipeline
    stages: Vec<ShaderStage>,
    vertex_layout: VertexLayout,
    color_format: vk::Format,
    clear_color: [f32; 4],
}

impl FrameRenderer {
    /// Build the renderer against the current swapchain.
    ///
    /// # Safety
    /// The GPU context and swapchain must be valid.
    pub unsafe fn new(
        gpu: &GpuContext,
        swapchain: &Swapchain,
        stages: Vec<ShaderStage>,
        vertex_layout: VertexLayout,
    ) -> Result<Self> {
        let device = gpu.device();
        let color_format = swapchain.format.format;

        let render_pass = create_render_pass(device, color_format)?;
        let pipeline = GraphicsPipeline::new(device, render_pass, &stages, &vertex_layout)?;
        let framebuffers =
            create_framebuffers(device, render_pass, &swapchain.image_views, swapchain.extent)?;

        let command_pool = CommandPool::new(
            device,
            gpu.families().graphics,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let command_buffer = command_pool.allocate_primary(device)?;
        let sync = FrameSync::new(device)?;

        Ok(Self {
            render_pass,
            pipeline,
            framebuffers,
            command_pool,
            command_buffer,
            sync,
            meshes: Vec::new(),
            policy: RebuildPolicy::new(),
            stages,
            vertex_layout,
            color_format,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        })
    }

    /// Set the render pass clear color.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Upload a mesh from flat vertex/index arrays and keep it resident.
    ///
    /// # Safety
    /// The GPU context must be valid.
    pub unsafe fn load_mesh(
        &mut self,
        gpu: &GpuContext,
        vertices: &[f32],
        indices: &[u32],
    ) -> Result<()> {
        let transferor = BufferTransferor::new(
            gpu.instance(),
            gpu.device(),
            gpu.physical_device(),
            &self.command_pool,
            gpu.graphics_queue(),
        );
        let mesh = MeshBuffers::upload(gpu.device(), &transferor, vertices, indices)?;
        tracing::info!(
            "Mesh resident: {} vertices, {} indices",
            mesh.vertex_count,
            mesh.index_count
        );
        self.meshes.push(mesh);
        Ok(())
    }

    /// Flag the swapchain for a rebuild before the next acquire (e.g., the
    /// window was resized). Idempotent.
    pub fn mark_swapchain_stale(&mut self) {
        self.policy.mark_stale();
    }

    /// Run one frame: wait, acquire, record, submit, present.
    ///
    /// Transient surface staleness is recovered via rebuild and never
    /// surfaced as an error; hard failures stop the loop.
    ///
    /// # Safety
    /// The GPU context and swapchain must be valid.
    pub unsafe fn draw_frame(
        &mut self,
        gpu: &GpuContext,
        swapchain: &mut Swapchain,
    ) -> Result<FrameOutcome> {
        let mut policy = std::mem::take(&mut self.policy);
        let result = run_frame(
            &mut DeviceFrame {
                renderer: self,
                gpu,
                swapchain,
            },
            &mut policy,
        );
        self.policy = policy;
        result
    }

    /// Rebuild the swapchain and everything that depends on it.
    ///
    /// Waits for the device to go idle first so no in-flight command still
    /// references the images about to be destroyed. The render pass and
    /// pipeline survive unless the color format changed.
    unsafe fn rebuild(&mut self, gpu: &GpuContext, swapchain: &mut Swapchain) -> Result<()> {
        let device = gpu.device();
        gpu.wait_idle()?;

        swapchain.rebuild(device, gpu.physical_device(), gpu.surface())?;

        if swapchain.format.format != self.color_format {
            let render_pass = create_render_pass(device, swapchain.format.format)?;
            let pipeline =
                GraphicsPipeline::new(device, render_pass, &self.stages, &self.vertex_layout)?;
            self.pipeline.destroy(device);
            device.destroy_render_pass(self.render_pass, None);
            self.render_pass = render_pass;
            self.pipeline = pipeline;
            self.color_format = swapchain.format.format;
            tracing::info!("Color format changed; render pass and pipeline rebuilt");
        }

        for &framebuffer in &self.framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
        self.framebuffers =
            create_framebuffers(device, self.render_pass, &swapchain.image_views, swapchain.extent)?;

        Ok(())
    }

    /// Re-record the full command sequence for the acquired image.
    unsafe fn record(
        &self,
        device: &ash::Device,
        extent: vk::Extent2D,
        image_index: u32,
    ) -> Result<()> {
        let cmd = self.command_buffer;

        let begin_info = vk::CommandBufferBeginInfo::default();
        device.begin_command_buffer(cmd, &begin_info)?;

        let clear = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        };
        let pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .clear_values(std::slice::from_ref(&clear));

        device.cmd_begin_render_pass(cmd, &pass_begin, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(cmd, 0, &[viewport]);

        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        device.cmd_set_scissor(cmd, 0, &[scissor]);

        for mesh in &self.meshes {
            mesh.record_draw(device, cmd);
        }

        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd)?;

        Ok(())
    }

    /// Tear the renderer down in reverse creation order.
    ///
    /// # Safety
    /// The GPU context must be valid; the device is drained first.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        let device = gpu.device();
        let _ = gpu.wait_idle();

        for mesh in &mut self.meshes {
            mesh.destroy(device);
        }
        self.meshes.clear();

        self.sync.destroy(device);
        self.command_pool.destroy(device);
        for &framebuffer in &self.framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
        self.framebuffers.clear();
        self.pipeline.destroy(device);
        device.destroy_render_pass(self.render_pass, None);
    }
}

/// The frame protocol's operations bound to the live device.
///
/// Constructed only inside `draw_frame`, whose safety contract covers the
/// device calls made here.
struct DeviceFrame<'a> {
    renderer: &'a mut FrameRenderer,
    gpu: &'a GpuContext,
    swapchain: &'a mut Swapchain,
}

impl FrameOps for DeviceFrame<'_> {
    fn wait_fence(&mut self) -> Result<()> {
        unsafe { self.renderer.sync.wait(self.gpu.device(), FRAME_TIMEOUT_NS) }
    }

    fn rebuild(&mut self) -> Result<()> {
        unsafe { self.renderer.rebuild(self.gpu, self.swapchain) }
    }

    fn acquire(&mut self) -> Result<AcquireResult> {
        unsafe {
            self.swapchain
                .acquire_next_image(self.renderer.sync.image_available, FRAME_TIMEOUT_NS)
        }
    }

    fn reset_and_record(&mut self, image_index: u32) -> Result<()> {
        let device = self.gpu.device();
        unsafe {
            self.renderer.sync.reset(device)?;
            device.reset_command_buffer(
                self.renderer.command_buffer,
                vk::CommandBufferResetFlags::empty(),
            )?;
            self.renderer.record(device, self.swapchain.extent, image_index)
        }
    }

    fn submit(&mut self) -> Result<()> {
        unsafe {
            submit_command_buffers(
                self.gpu.device(),
                self.gpu.graphics_queue(),
                &[self.renderer.command_buffer],
                &[self.renderer.sync.image_available],
                &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                &[self.renderer.sync.render_finished],
                self.renderer.sync.in_flight,
            )
        }
    }

    fn present(&mut self, image_index: u32) -> Result<bool> {
        unsafe {
            self.swapchain.present(
                self.gpu.present_queue(),
                image_index,
                &[self.renderer.sync.render_finished],
            )
        }
    }
}
