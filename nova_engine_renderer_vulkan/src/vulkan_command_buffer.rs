//! Command buffer pools and per-frame recording
//!
//! One resettable pool per queue role, with a pre-allocated grid of
//! `frames_in_flight x roles` primary buffers for per-frame recording.
//! Every buffer tracks its recording/submitting state so misuse surfaces
//! as an `InvalidUsage` error instead of a validation crash.

use ash::vk;
use nova_engine::nova::{Error, Result};
use nova_engine::{nova_err, nova_warn, nova_warn_err};
use std::sync::Arc;

use crate::vulkan_context::GraphicsContext;

/// Queue role a command buffer submits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRole {
    Graphics,
    Compute,
    Transfer,
}

impl QueueRole {
    pub const ALL: [QueueRole; 3] = [QueueRole::Graphics, QueueRole::Compute, QueueRole::Transfer];

    fn index(self) -> usize {
        match self {
            QueueRole::Graphics => 0,
            QueueRole::Compute => 1,
            QueueRole::Transfer => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            QueueRole::Graphics => "graphics",
            QueueRole::Compute => "compute",
            QueueRole::Transfer => "transfer",
        }
    }
}

/// A primary command buffer with explicit state tracking
///
/// `handle` stays owned by the pool it was allocated from; this struct only
/// tracks recording state and routes submission to the right queue.
pub struct CommandBuffer {
    pub(crate) handle: vk::CommandBuffer,
    pub(crate) role: QueueRole,
    pub(crate) is_recording: bool,
    pub(crate) is_submitting: bool,
}

impl CommandBuffer {
    pub(crate) fn new(handle: vk::CommandBuffer, role: QueueRole) -> Self {
        Self {
            handle,
            role,
            is_recording: false,
            is_submitting: false,
        }
    }

    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub fn role(&self) -> QueueRole {
        self.role
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Recording may start only on an idle buffer
    pub fn can_begin(&self) -> bool {
        !self.is_recording && !self.is_submitting
    }

    /// Submission requires a fully recorded, closed buffer
    pub fn can_submit(&self) -> bool {
        !self.is_recording && !self.is_submitting
    }

    pub fn begin(&mut self, context: &GraphicsContext, usage: vk::CommandBufferUsageFlags) -> Result<()> {
        if !self.can_begin() {
            return Err(nova_warn_err!(
                "nova::vulkan",
                "begin on a {} command buffer that is already recording",
                self.role.label()
            ));
        }

        let begin_info = vk::CommandBufferBeginInfo::default().flags(usage);
        unsafe {
            context
                .device()
                .begin_command_buffer(self.handle, &begin_info)
                .map_err(|e| nova_err!("nova::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }
        self.is_recording = true;
        Ok(())
    }

    pub fn end(&mut self, context: &GraphicsContext) -> Result<()> {
        if !self.is_recording {
            return Err(nova_warn_err!(
                "nova::vulkan",
                "end on a {} command buffer that is not recording",
                self.role.label()
            ));
        }

        unsafe {
            context
                .device()
                .end_command_buffer(self.handle)
                .map_err(|e| nova_err!("nova::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.is_recording = false;
        Ok(())
    }

    pub fn reset(&mut self, context: &GraphicsContext) -> Result<()> {
        if self.is_recording {
            return Err(nova_warn_err!(
                "nova::vulkan",
                "reset on a {} command buffer that is still recording",
                self.role.label()
            ));
        }

        unsafe {
            context
                .device()
                .reset_command_buffer(self.handle, vk::CommandBufferResetFlags::empty())
                .map_err(|e| nova_err!("nova::vulkan", "Failed to reset command buffer: {:?}", e))
        }
    }

    /// Submit to the role's queue with optional semaphore/fence plumbing
    ///
    /// `wait_semaphores` and `wait_stages` must be the same length.
    pub fn submit(
        &mut self,
        context: &GraphicsContext,
        wait_semaphores: &[vk::Semaphore],
        wait_stages: &[vk::PipelineStageFlags],
        signal_semaphores: &[vk::Semaphore],
        fence: vk::Fence,
    ) -> Result<()> {
        if !self.can_submit() {
            return Err(nova_warn_err!(
                "nova::vulkan",
                "submit on a {} command buffer that is still recording",
                self.role.label()
            ));
        }
        if wait_semaphores.len() != wait_stages.len() {
            return Err(Error::InvalidUsage(
                "wait_semaphores and wait_stages length mismatch".to_string(),
            ));
        }

        let queue = match self.role {
            QueueRole::Graphics => context.graphics_queue(),
            QueueRole::Compute => context.compute_queue(),
            QueueRole::Transfer => context.transfer_queue(),
        };

        let command_buffers = [self.handle];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(signal_semaphores);

        self.is_submitting = true;
        let result = unsafe { context.device().queue_submit(queue, &[submit_info], fence) };
        self.is_submitting = false;

        result.map_err(|e| {
            nova_err!(
                "nova::vulkan",
                "Failed to submit {} command buffer: {:?}",
                self.role.label(),
                e
            )
        })
    }

    /// Submit with no synchronization beyond an optional fence
    pub fn submit_simple(&mut self, context: &GraphicsContext, fence: vk::Fence) -> Result<()> {
        self.submit(context, &[], &[], &[], fence)
    }

    fn check_recording(&self, operation: &str) -> Result<()> {
        if self.is_recording {
            Ok(())
        } else {
            Err(nova_warn_err!(
                "nova::vulkan",
                "{} outside of recording on a {} command buffer",
                operation,
                self.role.label()
            ))
        }
    }

    pub fn begin_render_pass(
        &self,
        context: &GraphicsContext,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> Result<()> {
        self.check_recording("begin_render_pass")?;
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);
        unsafe {
            context
                .device()
                .cmd_begin_render_pass(self.handle, &begin_info, vk::SubpassContents::INLINE);
        }
        Ok(())
    }

    pub fn end_render_pass(&self, context: &GraphicsContext) -> Result<()> {
        self.check_recording("end_render_pass")?;
        unsafe {
            context.device().cmd_end_render_pass(self.handle);
        }
        Ok(())
    }

    pub fn set_viewport(&self, context: &GraphicsContext, viewport: vk::Viewport) -> Result<()> {
        self.check_recording("set_viewport")?;
        unsafe {
            context.device().cmd_set_viewport(self.handle, 0, &[viewport]);
        }
        Ok(())
    }

    pub fn set_scissor(&self, context: &GraphicsContext, scissor: vk::Rect2D) -> Result<()> {
        self.check_recording("set_scissor")?;
        unsafe {
            context.device().cmd_set_scissor(self.handle, 0, &[scissor]);
        }
        Ok(())
    }

    pub fn bind_pipeline(
        &self,
        context: &GraphicsContext,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) -> Result<()> {
        self.check_recording("bind_pipeline")?;
        unsafe {
            context
                .device()
                .cmd_bind_pipeline(self.handle, bind_point, pipeline);
        }
        Ok(())
    }

    pub fn draw(
        &self,
        context: &GraphicsContext,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.check_recording("draw")?;
        unsafe {
            context.device().cmd_draw(
                self.handle,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
        Ok(())
    }

    pub fn draw_indexed(
        &self,
        context: &GraphicsContext,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.check_recording("draw_indexed")?;
        unsafe {
            context.device().cmd_draw_indexed(
                self.handle,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    pub fn dispatch(&self, context: &GraphicsContext, x: u32, y: u32, z: u32) -> Result<()> {
        self.check_recording("dispatch")?;
        unsafe {
            context.device().cmd_dispatch(self.handle, x, y, z);
        }
        Ok(())
    }

    pub fn copy_buffer(
        &self,
        context: &GraphicsContext,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) -> Result<()> {
        self.check_recording("copy_buffer")?;
        unsafe {
            context.device().cmd_copy_buffer(self.handle, src, dst, regions);
        }
        Ok(())
    }

    pub fn copy_buffer_to_image(
        &self,
        context: &GraphicsContext,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) -> Result<()> {
        self.check_recording("copy_buffer_to_image")?;
        unsafe {
            context
                .device()
                .cmd_copy_buffer_to_image(self.handle, src, dst, dst_layout, regions);
        }
        Ok(())
    }

    pub fn pipeline_barrier(
        &self,
        context: &GraphicsContext,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) -> Result<()> {
        self.check_recording("pipeline_barrier")?;
        unsafe {
            context.device().cmd_pipeline_barrier(
                self.handle,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                memory_barriers,
                buffer_barriers,
                image_barriers,
            );
        }
        Ok(())
    }

    /// Full-subresource color image layout transition with conservative
    /// access masks
    pub fn transition_image_layout(
        &self,
        context: &GraphicsContext,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Result<()> {
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(vk::REMAINING_MIP_LEVELS)
                    .layer_count(vk::REMAINING_ARRAY_LAYERS),
            );
        self.pipeline_barrier(
            context,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::PipelineStageFlags::ALL_COMMANDS,
            &[],
            &[],
            &[barrier],
        )
    }

    pub fn blit_image(
        &self,
        context: &GraphicsContext,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) -> Result<()> {
        self.check_recording("blit_image")?;
        unsafe {
            context
                .device()
                .cmd_blit_image(self.handle, src, src_layout, dst, dst_layout, regions, filter);
        }
        Ok(())
    }
}

/// Per-role command pools plus the per-frame buffer grid
pub struct CommandBufferManager {
    context: Arc<GraphicsContext>,
    // Indexed by QueueRole::index()
    pools: [vk::CommandPool; 3],
    // frame_buffers[frame][role]
    frame_buffers: Vec<[CommandBuffer; 3]>,
}

impl CommandBufferManager {
    /// Create one resettable pool per role and pre-allocate the frame grid
    pub fn new(context: Arc<GraphicsContext>, frames_in_flight: usize) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::InvalidUsage(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let families = context.queue_families();
        let graphics_family = families.graphics.ok_or_else(|| {
            Error::InitializationFailed("context has no graphics queue family".to_string())
        })?;
        let family_for = |role: QueueRole| match role {
            QueueRole::Graphics => graphics_family,
            QueueRole::Compute => families.compute.unwrap_or(graphics_family),
            QueueRole::Transfer => families.transfer.unwrap_or(graphics_family),
        };

        let mut pools = [vk::CommandPool::null(); 3];
        for role in QueueRole::ALL {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(family_for(role))
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let pool = unsafe {
                match context.device().create_command_pool(&pool_info, None) {
                    Ok(pool) => pool,
                    Err(e) => {
                        Self::destroy_pools(&context, &pools);
                        return Err(nova_err!(
                            "nova::vulkan",
                            "Failed to create {} command pool: {:?}",
                            role.label(),
                            e
                        ));
                    }
                }
            };
            context.name_object(pool, &format!("nova.cmd_pool.{}", role.label()));
            pools[role.index()] = pool;
        }

        let mut frame_buffers = Vec::with_capacity(frames_in_flight);
        for frame in 0..frames_in_flight {
            let mut handles = [vk::CommandBuffer::null(); 3];
            for role in QueueRole::ALL {
                let alloc_info = vk::CommandBufferAllocateInfo::default()
                    .command_pool(pools[role.index()])
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1);

                let allocated =
                    unsafe { context.device().allocate_command_buffers(&alloc_info) };
                match allocated {
                    Ok(buffers) => {
                        context.name_object(
                            buffers[0],
                            &format!("nova.cmd.{}.frame{}", role.label(), frame),
                        );
                        handles[role.index()] = buffers[0];
                    }
                    Err(e) => {
                        // Freeing the pools frees every buffer allocated so far
                        Self::destroy_pools(&context, &pools);
                        return Err(nova_err!(
                            "nova::vulkan",
                            "Failed to allocate {} command buffer for frame {}: {:?}",
                            role.label(),
                            frame,
                            e
                        ));
                    }
                }
            }
            frame_buffers.push([
                CommandBuffer::new(handles[0], QueueRole::Graphics),
                CommandBuffer::new(handles[1], QueueRole::Compute),
                CommandBuffer::new(handles[2], QueueRole::Transfer),
            ]);
        }

        Ok(Self {
            context,
            pools,
            frame_buffers,
        })
    }

    fn destroy_pools(context: &GraphicsContext, pools: &[vk::CommandPool; 3]) {
        unsafe {
            for &pool in pools {
                if pool != vk::CommandPool::null() {
                    context.device().destroy_command_pool(pool, None);
                }
            }
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frame_buffers.len()
    }

    /// Allocate a standalone buffer from a role's pool
    pub fn allocate(&self, role: QueueRole, level: vk::CommandBufferLevel) -> Result<CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pools[role.index()])
            .level(level)
            .command_buffer_count(1);

        let buffers = unsafe {
            self.context
                .device()
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| {
                    nova_err!("nova::vulkan", "Failed to allocate command buffer: {:?}", e)
                })?
        };
        Ok(CommandBuffer::new(buffers[0], role))
    }

    /// Return a standalone buffer to its pool
    pub fn free(&self, buffer: CommandBuffer) {
        unsafe {
            self.context
                .device()
                .free_command_buffers(self.pools[buffer.role.index()], &[buffer.handle]);
        }
    }

    pub fn get_current(&self, frame_index: usize, role: QueueRole) -> &CommandBuffer {
        &self.frame_buffers[frame_index % self.frame_buffers.len()][role.index()]
    }

    pub fn get_current_mut(&mut self, frame_index: usize, role: QueueRole) -> &mut CommandBuffer {
        let frame = frame_index % self.frame_buffers.len();
        &mut self.frame_buffers[frame][role.index()]
    }

    /// Open the frame's buffer for one-time recording
    ///
    /// Tolerates a buffer that is already recording: logs a warning and
    /// hands it back unchanged so a stalled caller can keep going.
    pub fn begin_frame(&mut self, frame_index: usize, role: QueueRole) -> Result<&mut CommandBuffer> {
        let frame = frame_index % self.frame_buffers.len();
        if self.frame_buffers[frame][role.index()].is_recording {
            nova_warn!(
                "nova::vulkan",
                "{} command buffer for frame {} already recording",
                role.label(),
                frame
            );
            return Ok(&mut self.frame_buffers[frame][role.index()]);
        }

        let context = Arc::clone(&self.context);
        let buffer = &mut self.frame_buffers[frame][role.index()];
        buffer.reset(&context)?;
        buffer.begin(&context, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        Ok(buffer)
    }

    /// Close the frame's buffer. Errors if it was never opened.
    pub fn end_frame(&mut self, frame_index: usize, role: QueueRole) -> Result<()> {
        let frame = frame_index % self.frame_buffers.len();
        if !self.frame_buffers[frame][role.index()].is_recording {
            return Err(nova_warn_err!(
                "nova::vulkan",
                "end_frame on a {} command buffer that is not recording",
                role.label()
            ));
        }

        let context = Arc::clone(&self.context);
        self.frame_buffers[frame][role.index()].end(&context)
    }
}

impl Drop for CommandBufferManager {
    fn drop(&mut self) {
        // Buffers may still be referenced by in-flight submissions
        self.context.wait_idle();
        Self::destroy_pools(&self.context, &self.pools);
    }
}
