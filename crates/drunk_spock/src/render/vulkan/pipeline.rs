//! Fixed graphics pipeline and the frames-in-flight draw loop
//!
//! [`PipeLine`] owns shaders by path, one render pass with a single colour
//! attachment, the graphics pipeline, framebuffers over the swapchain views
//! and the per-frame synchronization. It borrows everything else from
//! [`Devices`], which must outlive it.

use super::shader::ShaderModule;
use super::sync::{FrameRing, FrameSync, Semaphore};
use super::{Acquired, Devices, PresentOutcome, VulkanError, VulkanResult};
use ash::{vk, Device};
use std::collections::HashMap;
use std::ffi::CStr;

const ENTRY_POINT: &[u8] = b"main\0";

/// How a [`PipeLine::draw_stuffs`] call went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was presented
    Presented,
    /// The frame was presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Nothing was presented; rebuild the swapchain before drawing again
    SwapchainOutOfDate,
}

#[derive(Clone)]
struct PipelineSource {
    vertex_shader: String,
    fragment_shader: String,
    bindings: Vec<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

/// Graphics pipeline, render pass, framebuffers and frame synchronization
pub struct PipeLine {
    device: Device,
    shaders: HashMap<String, ShaderModule>,
    max_frames_in_flight: usize,
    source: Option<PipelineSource>,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    extent: vk::Extent2D,
    framebuffers: Vec<vk::Framebuffer>,
    frames: Vec<FrameSync>,
    render_finished: Vec<Semaphore>,
    ring: FrameRing,
}

impl PipeLine {
    /// Empty pipeline on the logical device of `devices`
    pub fn new(devices: &Devices, max_frames_in_flight: usize) -> VulkanResult<Self> {
        let device = devices.logical_device()?.clone();
        let max_frames_in_flight = max_frames_in_flight.max(1);

        Ok(Self {
            device,
            shaders: HashMap::new(),
            max_frames_in_flight,
            source: None,
            render_pass: vk::RenderPass::null(),
            layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            extent: vk::Extent2D::default(),
            framebuffers: Vec::new(),
            frames: Vec::new(),
            render_finished: Vec::new(),
            ring: FrameRing::new(max_frames_in_flight, 0),
        })
    }

    /// Load a SPIR-V shader, keyed by its path; loading the same path twice does nothing
    pub fn load_shader(&mut self, path: &str) -> VulkanResult<()> {
        if self.shaders.contains_key(path) {
            return Ok(());
        }
        let module = ShaderModule::from_file(self.device.clone(), path)?;
        self.shaders.insert(path.to_string(), module);
        Ok(())
    }

    /// Whether a shader was loaded from `path`
    pub fn has_shader(&self, path: &str) -> bool {
        self.shaders.contains_key(path)
    }

    /// Build the pipeline from two loaded shaders with no vertex input
    pub fn create(&mut self, devices: &Devices, vs: &str, fs: &str) -> VulkanResult<()> {
        self.create_with_vertex_input(devices, vs, fs, &[], &[])
    }

    /// Build the pipeline from two loaded shaders and a vertex layout
    pub fn create_with_vertex_input(
        &mut self,
        devices: &Devices,
        vs: &str,
        fs: &str,
        bindings: &[vk::VertexInputBindingDescription],
        attributes: &[vk::VertexInputAttributeDescription],
    ) -> VulkanResult<()> {
        if self.pipeline != vk::Pipeline::null() {
            return Err(VulkanError::InvalidOperation {
                reason: "Pipeline already created".to_string(),
            });
        }

        let source = PipelineSource {
            vertex_shader: vs.to_string(),
            fragment_shader: fs.to_string(),
            bindings: bindings.to_vec(),
            attributes: attributes.to_vec(),
        };
        self.build(devices, &source)?;
        self.source = Some(source);
        self.create_sync_objects(devices.chain_image_views().len())
    }

    fn build(&mut self, devices: &Devices, source: &PipelineSource) -> VulkanResult<()> {
        let shader_err = |name: &str| VulkanError::UnknownName {
            kind: "shader",
            name: name.to_string(),
        };
        let vs = self
            .shaders
            .get(&source.vertex_shader)
            .ok_or_else(|| shader_err(&source.vertex_shader))?;
        let fs = self
            .shaders
            .get(&source.fragment_shader)
            .ok_or_else(|| shader_err(&source.fragment_shader))?;

        let extent = devices.chain_extent()?;
        let format = devices.chain_format()?;

        let entry = CStr::from_bytes_with_nul(ENTRY_POINT).map_err(|e| VulkanError::InvalidOperation {
            reason: e.to_string(),
        })?;
        let stages = [
            vs.create_stage_info(vk::ShaderStageFlags::VERTEX, entry),
            fs.create_stage_info(vk::ShaderStageFlags::FRAGMENT, entry),
        ];

        let render_pass = create_render_pass(&self.device, format)?;

        let set_layouts: Vec<vk::DescriptorSetLayout> =
            devices.descriptor_set_layouts().into_iter().take(1).collect();
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = match unsafe { self.device.create_pipeline_layout(&layout_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { self.device.destroy_render_pass(render_pass, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&source.bindings)
            .vertex_attribute_descriptions(&source.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [full_viewport(extent)];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_, e)) => {
                unsafe {
                    self.device.destroy_pipeline_layout(layout, None);
                    self.device.destroy_render_pass(render_pass, None);
                }
                return Err(VulkanError::Api(e));
            }
        };
        let pipeline = pipeline.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Pipeline creation returned nothing".to_string(),
        })?;

        log::info!(
            "Graphics pipeline {} + {} at {}x{}",
            source.vertex_shader,
            source.fragment_shader,
            extent.width,
            extent.height
        );

        self.render_pass = render_pass;
        self.layout = layout;
        self.pipeline = pipeline;
        self.extent = extent;
        Ok(())
    }

    fn create_sync_objects(&mut self, image_count: usize) -> VulkanResult<()> {
        if self.frames.is_empty() {
            self.frames = (0..self.max_frames_in_flight)
                .map(|_| FrameSync::new(self.device.clone()))
                .collect::<VulkanResult<_>>()?;
        }
        self.render_finished = (0..image_count)
            .map(|_| Semaphore::new(self.device.clone()))
            .collect::<VulkanResult<_>>()?;
        self.ring = FrameRing::new(self.max_frames_in_flight, image_count);
        Ok(())
    }

    /// Rebuild against a recreated swapchain: framebuffers, pipeline, render
    /// pass and per-image semaphores. Command buffers must be re-recorded.
    pub fn recreate(&mut self, devices: &Devices) -> VulkanResult<()> {
        let source = self.source.clone().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Pipeline was never created".to_string(),
        })?;

        unsafe {
            self.device.device_wait_idle().map_err(VulkanError::Api)?;
        }
        self.destroy_frame_buffers();
        self.destroy_pipeline();

        self.build(devices, &source)?;
        self.create_sync_objects(devices.chain_image_views().len())?;
        self.create_frame_buffers(devices)
    }

    /// One framebuffer per swapchain image view
    pub fn create_frame_buffers(&mut self, devices: &Devices) -> VulkanResult<()> {
        if self.render_pass == vk::RenderPass::null() {
            return Err(VulkanError::InvalidOperation {
                reason: "Create the pipeline before its framebuffers".to_string(),
            });
        }
        self.destroy_frame_buffers();

        for &view in devices.chain_image_views() {
            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = unsafe {
                self.device
                    .create_framebuffer(&framebuffer_info, None)
                    .map_err(VulkanError::Api)?
            };
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    /// One primary command buffer per framebuffer from the named queue's pool
    pub fn allocate_command_buffers(&self, devices: &Devices, queue: &str) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let count = u32::try_from(self.framebuffers.len()).unwrap_or(u32::MAX);
        devices.command_pool(queue)?.allocate_command_buffers(count)
    }

    /// Begin recording `cb`, start the render pass on framebuffer `frame_index`
    /// cleared to `clear`, and bind the pipeline
    pub fn begin_buffer(&self, cb: vk::CommandBuffer, frame_index: usize, clear: [f32; 4]) -> VulkanResult<()> {
        let framebuffer = *self.framebuffers.get(frame_index).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!(
                "Framebuffer {} of {} does not exist",
                frame_index,
                self.framebuffers.len()
            ),
        })?;

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        }];
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            self.device
                .begin_command_buffer(cb, &begin_info)
                .map_err(VulkanError::Api)?;
            self.device
                .cmd_begin_render_pass(cb, &render_pass_info, vk::SubpassContents::INLINE);
            self.device
                .cmd_bind_pipeline(cb, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
        }
        Ok(())
    }

    /// End the render pass and finish recording `cb`
    pub fn end_buffer(&self, cb: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe {
            self.device.cmd_end_render_pass(cb);
            self.device.end_command_buffer(cb).map_err(VulkanError::Api)
        }
    }

    /// Bind descriptor set 0 for chain image `index` on `cb`
    pub fn bind_descriptor_set(&self, devices: &Devices, cb: vk::CommandBuffer, index: usize) -> VulkanResult<()> {
        let set = devices.descriptor_set(index).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("No descriptor set for image {index}"),
        })?;
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cb,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout,
                0,
                &[set],
                &[],
            );
        }
        Ok(())
    }

    /// Record a non-indexed draw of `vertex_count` vertices
    pub fn draw(&self, cb: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device.cmd_draw(cb, vertex_count, instance_count, 0, 0);
        }
    }

    /// Record an indexed draw from the bound index buffer
    pub fn draw_indexed(&self, cb: vk::CommandBuffer, index_count: u32, instance_count: u32) {
        unsafe {
            self.device.cmd_draw_indexed(cb, index_count, instance_count, 0, 0, 0);
        }
    }

    /// Draw one frame: wait for the frame slot, acquire an image, submit its
    /// command buffer on `graphics_queue` and present on `present_queue`
    pub fn draw_stuffs(
        &mut self,
        devices: &Devices,
        cbs: &[vk::CommandBuffer],
        graphics_queue: &str,
        present_queue: &str,
    ) -> VulkanResult<FrameStatus> {
        let current = self.ring.current();
        let frame = self.frames.get(current).ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Pipeline has no frame sync objects".to_string(),
        })?;
        frame.in_flight.wait(u64::MAX)?;

        let (index, suboptimal) = match devices.acquire_next_image(frame.image_available.handle())? {
            Acquired::Image { index, suboptimal } => (index, suboptimal),
            Acquired::OutOfDate => return Ok(FrameStatus::SwapchainOutOfDate),
        };
        let image = index as usize;

        if let Some(previous) = self.ring.claim_image(image) {
            if let Some(owner) = self.frames.get(previous) {
                owner.in_flight.wait(u64::MAX)?;
            }
        }

        let cb = *cbs.get(image).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("No command buffer for image {image}"),
        })?;
        let render_finished = self
            .render_finished
            .get(image)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("No render semaphore for image {image}"),
            })?
            .handle();

        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cb];
        let signal_semaphores = [render_finished];
        let submit = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        frame.in_flight.reset()?;
        devices.submit_to_queue(graphics_queue, &[submit], frame.in_flight.handle())?;

        let outcome = devices.queue_present(render_finished, index, present_queue)?;
        self.ring.advance();

        Ok(match outcome {
            PresentOutcome::OutOfDate => FrameStatus::SwapchainOutOfDate,
            PresentOutcome::Suboptimal => FrameStatus::Suboptimal,
            PresentOutcome::Presented if suboptimal => FrameStatus::Suboptimal,
            PresentOutcome::Presented => FrameStatus::Presented,
        })
    }

    /// Destroy the framebuffers, keeping the pipeline
    pub fn destroy_frame_buffers(&mut self) {
        for framebuffer in self.framebuffers.drain(..) {
            unsafe {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }

    fn destroy_pipeline(&mut self) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                self.device.destroy_pipeline(self.pipeline, None);
            }
            if self.layout != vk::PipelineLayout::null() {
                self.device.destroy_pipeline_layout(self.layout, None);
            }
            if self.render_pass != vk::RenderPass::null() {
                self.device.destroy_render_pass(self.render_pass, None);
            }
        }
        self.pipeline = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
        self.render_pass = vk::RenderPass::null();
    }

    /// Number of framebuffers
    pub fn frame_buffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Render pass handle
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for PipeLine {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }
        self.destroy_frame_buffers();
        self.destroy_pipeline();
    }
}

fn create_render_pass(device: &Device, format: vk::Format) -> VulkanResult<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];

    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .build();

    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build();

    let attachments = [color_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];
    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe {
        device
            .create_render_pass(&render_pass_info, None)
            .map_err(VulkanError::Api)
    }
}

/// Viewport covering the whole extent with the standard depth range
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_matches_extent() {
        let vp = full_viewport(vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!((vp.x, vp.y), (0.0, 0.0));
        assert_eq!((vp.width, vp.height), (1920.0, 1080.0));
        assert_eq!((vp.min_depth, vp.max_depth), (0.0, 1.0));
    }

    #[test]
    fn test_entry_point_is_main() {
        let entry = CStr::from_bytes_with_nul(ENTRY_POINT).unwrap();
        assert_eq!(entry.to_str().unwrap(), "main");
    }
}
