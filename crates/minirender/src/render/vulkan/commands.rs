//! Command buffer management
//!
//! Command pool ownership, per-image command buffer allocation and scoped
//! single-use submission for one-off transfers.

use ash::{vk, Device};

use crate::render::vulkan::{DeviceContext, VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
///
/// Bound to the graphics queue family. The pool outlives every buffer it
/// hands out; swapchain recreation returns buffers with
/// [`CommandPool::free_command_buffers`] and never destroys the pool itself.
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
    queue: vk::Queue,
}

impl CommandPool {
    /// Create a command pool on the graphics queue family
    pub fn new(context: &DeviceContext) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(context.queue_families().graphics);

        let device = context.raw_device();
        let command_pool = unsafe {
            device.create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        log::debug!("Command pool created");
        Ok(Self {
            device,
            command_pool,
            queue: context.graphics_queue(),
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device.allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Return command buffers to the pool
    ///
    /// The caller must know the GPU is done with them.
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.command_pool, command_buffers);
        }
    }

    /// Allocate primary command buffers that return to the pool on drop
    pub fn allocate_set(&self, count: u32) -> VulkanResult<CommandBufferSet> {
        let buffers = self.allocate_command_buffers(count)?;
        Ok(CommandBufferSet {
            device: self.device.clone(),
            command_pool: self.command_pool,
            buffers,
        })
    }

    /// Record, submit and wait on a throwaway command buffer
    ///
    /// The buffer is freed before returning, whether recording succeeded or not.
    pub fn execute_single_time<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&mut CommandRecorder) -> VulkanResult<()>,
    {
        let command_buffers = self.allocate_command_buffers(1)?;
        let result = self.record_and_submit(command_buffers[0], record);
        self.free_command_buffers(&command_buffers);
        result
    }

    fn record_and_submit<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&mut CommandRecorder) -> VulkanResult<()>,
    {
        let mut recorder = CommandRecorder::new(command_buffer, self.device.clone());
        recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        record(&mut recorder)?;
        let command_buffer = recorder.end()?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device.queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::from)?;
            self.device.queue_wait_idle(self.queue)
                .map_err(VulkanError::from)?;
        }
        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees any buffers still allocated from it
            self.device.destroy_command_pool(self.command_pool, None);
        }
        log::debug!("Command pool destroyed");
    }
}

/// Command buffers owned as a group and freed back to their pool on drop
///
/// Must be dropped before the [`CommandPool`] it came from.
pub struct CommandBufferSet {
    device: Device,
    command_pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandBufferSet {
    /// Raw handles, one per swapchain image
    pub fn handles(&self) -> &[vk::CommandBuffer] {
        &self.buffers
    }

    /// Number of buffers in the set
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the set holds no buffers
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Drop for CommandBufferSet {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            unsafe {
                self.device.free_command_buffers(self.command_pool, &self.buffers);
            }
        }
    }
}

/// Command buffer recorder that tracks recording state
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
    recording: bool,
}

impl CommandRecorder {
    /// Wrap an allocated command buffer
    pub fn new(command_buffer: vk::CommandBuffer, device: Device) -> Self {
        Self {
            command_buffer,
            device,
            recording: false,
        }
    }

    /// Begin command recording
    pub fn begin(&mut self, usage: vk::CommandBufferUsageFlags) -> VulkanResult<&mut Self> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(usage);

        unsafe {
            self.device.begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        self.recording = true;
        Ok(self)
    }

    /// Begin render pass; it ends when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        self.ensure_recording()?;

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(ActiveRenderPass { recorder: self })
    }

    /// End command recording
    pub fn end(mut self) -> VulkanResult<vk::CommandBuffer> {
        self.ensure_recording()?;

        unsafe {
            self.device.end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }

        self.recording = false;
        Ok(self.command_buffer)
    }

    /// Record an image memory barrier
    pub fn cmd_image_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: vk::ImageMemoryBarrier,
    ) -> VulkanResult<()> {
        self.ensure_recording()?;
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        Ok(())
    }

    /// Copy a region between buffers
    pub fn cmd_copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        self.ensure_recording()?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device.cmd_copy_buffer(self.command_buffer, src, dst, &[region]);
        }
        Ok(())
    }

    /// Copy tightly packed buffer contents into the first mip of a color image
    pub fn cmd_copy_buffer_to_image(
        &mut self,
        buffer: vk::Buffer,
        image: vk::Image,
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        self.ensure_recording()?;
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });

        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
            );
        }
        Ok(())
    }

    fn ensure_recording(&self) -> VulkanResult<()> {
        if self.recording {
            Ok(())
        } else {
            Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            })
        }
    }
}

/// Render pass scope; ends the pass on drop
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl<'a> ActiveRenderPass<'a> {
    /// Bind graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind a single vertex buffer at binding 0
    pub fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder.device.cmd_bind_vertex_buffers(self.recorder.command_buffer, 0, &[buffer], &[0]);
        }
    }

    /// Bind a 32-bit index buffer
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder.device.cmd_bind_index_buffer(
                self.recorder.command_buffer,
                buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Bind descriptor sets starting at set 0
    pub fn bind_descriptor_sets(&mut self, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.recorder.device.cmd_bind_descriptor_sets(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                &[],
            );
        }
    }

    /// Draw indexed
    pub fn draw_indexed(&mut self, index_count: u32) {
        unsafe {
            self.recorder.device.cmd_draw_indexed(self.recorder.command_buffer, index_count, 1, 0, 0, 0);
        }
    }
}

impl<'a> Drop for ActiveRenderPass<'a> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
