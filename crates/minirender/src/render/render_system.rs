//! Render system
//!
//! Owns every GPU object and drives the acquire, submit and present loop.
//! Objects that depend on the swapchain format or extent live in a
//! `SwapchainGeneration`, which is dropped and rebuilt as a unit when the
//! surface changes. Everything else survives recreation.

use ash::{vk, Device};
use std::time::Duration;

use crate::assets::{self, AssetError, ImageData};
use crate::config::{AssetConfig, RendererConfig, ShaderConfig};
use crate::render::frame_loop::{AcquireOutcome, FrameBackend, FrameLoop, FrameStatus, RecreateOutcome};
use crate::render::mesh::Mesh;
use crate::render::recreation::{GenerationFactory, GenerationParts, SwapchainState};
use crate::render::uniforms::UniformBufferObject;
use crate::render::vulkan::descriptor_set::{TEXTURE_BINDING, UNIFORM_BINDING};
use crate::render::vulkan::{
    BufferManager, CommandBufferSet, CommandPool, CommandRecorder, DescriptorPool, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, DescriptorSetWriter, DeviceContext, FrameSync, Framebuffer, GraphicsPipeline,
    IndexBuffer, PresentResult, PresentationSurface, PresentationTarget, RenderPass, ShaderModule, Swapchain,
    Texture, UniformBuffer, VertexBuffer, VulkanError, VulkanInstance, VulkanResult,
};

const CHECKER_SIZE: u32 = 256;
const CHECKER_CELL: u32 = 32;
const CHECKER_LIGHT: [u8; 4] = [230, 230, 230, 255];
const CHECKER_DARK: [u8; 4] = [40, 40, 40, 255];

/// Swapchain-dependent objects, torn down together
type SwapchainGeneration = GenerationParts<Vec<Framebuffer>, CommandBufferSet, GraphicsPipeline, RenderPass, Swapchain>;

/// Uniform buffers and descriptor sets, one of each per swapchain image
struct PerImageResources {
    descriptor_sets: Vec<vk::DescriptorSet>,
    descriptor_pool: DescriptorPool,
    uniform_buffers: Vec<UniformBuffer<UniformBufferObject>>,
}

impl PerImageResources {
    fn new(
        context: &DeviceContext,
        buffers: &BufferManager,
        layout: &DescriptorSetLayout,
        texture: &Texture,
        image_count: usize,
    ) -> VulkanResult<Self> {
        let uniform_buffers = (0..image_count)
            .map(|_| buffers.create_uniform_buffer::<UniformBufferObject>())
            .collect::<VulkanResult<Vec<_>>>()?;

        let descriptor_pool = DescriptorPool::for_image_count(context.raw_device(), image_count as u32)?;
        let descriptor_sets = descriptor_pool.allocate_per_image(layout.handle())?;

        let mut writer = DescriptorSetWriter::new();
        for (&set, uniform_buffer) in descriptor_sets.iter().zip(&uniform_buffers) {
            writer = writer
                .write_buffer(set, UNIFORM_BINDING, uniform_buffer.handle(), uniform_buffer.range())
                .write_image(set, TEXTURE_BINDING, texture.image_view(), texture.sampler());
        }
        writer.update(context.device());

        log::debug!(
            "Per-image resources ready: {} uniform buffers, pool sized for {} sets",
            uniform_buffers.len(),
            descriptor_pool.max_sets()
        );

        Ok(Self {
            descriptor_sets,
            descriptor_pool,
            uniform_buffers,
        })
    }
}

/// What every recorded command buffer draws
struct DrawInputs<'a> {
    vertex_buffer: vk::Buffer,
    index_buffer: vk::Buffer,
    index_count: u32,
    descriptor_sets: &'a [vk::DescriptorSet],
    clear_color: [f32; 4],
}

/// Record one command buffer per framebuffer
///
/// Each buffer is recorded once with SIMULTANEOUS_USE and resubmitted every
/// time its image comes around again.
fn record_draw_commands(
    device: &Device,
    command_pool: &CommandPool,
    render_pass: &RenderPass,
    pipeline: &GraphicsPipeline,
    framebuffers: &[Framebuffer],
    extent: vk::Extent2D,
    draw: &DrawInputs<'_>,
) -> VulkanResult<CommandBufferSet> {
    if draw.descriptor_sets.len() != framebuffers.len() {
        return Err(VulkanError::InvalidOperation {
            reason: format!(
                "{} descriptor sets for {} framebuffers",
                draw.descriptor_sets.len(),
                framebuffers.len()
            ),
        });
    }

    let command_buffers = command_pool.allocate_set(framebuffers.len() as u32)?;
    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: draw.clear_color,
        },
    }];

    let targets = framebuffers.iter().zip(draw.descriptor_sets);
    for (&command_buffer, (framebuffer, &descriptor_set)) in command_buffers.handles().iter().zip(targets) {
        let mut recorder = CommandRecorder::new(command_buffer, device.clone());
        recorder.begin(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)?;
        {
            let mut pass = recorder.begin_render_pass(
                render_pass.handle(),
                framebuffer.handle(),
                render_area,
                &clear_values,
            )?;
            pass.bind_pipeline(pipeline.handle());
            pass.bind_vertex_buffer(draw.vertex_buffer);
            pass.bind_index_buffer(draw.index_buffer);
            pass.bind_descriptor_sets(pipeline.layout(), &[descriptor_set]);
            pass.draw_indexed(draw.index_count);
        }
        recorder.end()?;
    }

    log::debug!("Recorded {} command buffers", command_buffers.len());
    Ok(command_buffers)
}

/// Borrowed view of the long-lived objects a swapchain generation is built from
struct GpuFactory<'a> {
    context: &'a DeviceContext,
    surface: &'a PresentationSurface,
    buffers: &'a BufferManager,
    command_pool: &'a CommandPool,
    descriptor_layout: &'a DescriptorSetLayout,
    texture: &'a Texture,
    vertex_buffer: &'a VertexBuffer,
    index_buffer: &'a IndexBuffer,
    vertex_shader: &'a [u8],
    fragment_shader: &'a [u8],
    clear_color: [f32; 4],
    max_frames: usize,
}

impl GpuFactory<'_> {
    fn draw_inputs<'p>(&self, per_image: &'p PerImageResources) -> DrawInputs<'p> {
        DrawInputs {
            vertex_buffer: self.vertex_buffer.handle(),
            index_buffer: self.index_buffer.handle(),
            index_count: self.index_buffer.index_count(),
            descriptor_sets: &per_image.descriptor_sets,
            clear_color: self.clear_color,
        }
    }

    /// Record fresh command buffers against an existing generation
    fn record(&self, generation: &SwapchainGeneration, per_image: &PerImageResources) -> VulkanResult<CommandBufferSet> {
        record_draw_commands(
            self.context.device(),
            self.command_pool,
            &generation.render_pass,
            &generation.pipeline,
            &generation.framebuffers,
            generation.swapchain.extent(),
            &self.draw_inputs(per_image),
        )
    }
}

impl GenerationFactory for GpuFactory<'_> {
    type Swapchain = Swapchain;
    type PerImage = PerImageResources;
    type Generation = SwapchainGeneration;

    fn wait_idle(&mut self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    fn create_swapchain(&mut self, framebuffer_size: (u32, u32)) -> VulkanResult<Swapchain> {
        Swapchain::new(self.context, self.surface, framebuffer_size, self.max_frames as u32)
    }

    fn swapchain_image_count(&self, swapchain: &Swapchain) -> usize {
        swapchain.image_count()
    }

    fn create_per_image(&mut self, image_count: usize) -> VulkanResult<PerImageResources> {
        PerImageResources::new(
            self.context,
            self.buffers,
            self.descriptor_layout,
            self.texture,
            image_count,
        )
    }

    /// Build render pass, pipeline, framebuffers and commands around a swapchain
    fn build_generation(
        &mut self,
        swapchain: Swapchain,
        per_image: &PerImageResources,
    ) -> VulkanResult<SwapchainGeneration> {
        let device = self.context.raw_device();
        let extent = swapchain.extent();

        let render_pass = RenderPass::new_color_pass(device.clone(), swapchain.format().format)?;

        // Shader modules only need to live until the pipeline exists
        let pipeline = {
            let vertex = ShaderModule::from_bytes(device.clone(), self.vertex_shader)?;
            let fragment = ShaderModule::from_bytes(device.clone(), self.fragment_shader)?;
            GraphicsPipeline::new(
                device.clone(),
                render_pass.handle(),
                &vertex,
                &fragment,
                self.descriptor_layout.handle(),
                extent,
            )?
        };

        let framebuffers = Framebuffer::for_each_view(&device, render_pass.handle(), swapchain.image_views(), extent)?;
        let command_buffers = record_draw_commands(
            &device,
            self.command_pool,
            &render_pass,
            &pipeline,
            &framebuffers,
            extent,
            &self.draw_inputs(per_image),
        )?;

        Ok(GenerationParts {
            framebuffers,
            command_buffers,
            pipeline,
            render_pass,
            swapchain,
        })
    }
}

/// Everything the renderer owns
///
/// Field order is teardown order. Swapchain-dependent objects go first and
/// the instance goes last.
struct RenderCore {
    swapchain_state: SwapchainState<SwapchainGeneration, PerImageResources>,
    descriptor_layout: DescriptorSetLayout,
    texture: Texture,
    index_buffer: IndexBuffer,
    vertex_buffer: VertexBuffer,
    frame_syncs: Vec<FrameSync>,
    command_pool: CommandPool,
    buffers: BufferManager,
    context: DeviceContext,
    surface: PresentationSurface,
    // Never read after construction, but must outlive everything above
    _instance: VulkanInstance,

    vertex_shader: Vec<u8>,
    fragment_shader: Vec<u8>,
    clear_color: [f32; 4],
    max_frames: usize,
    timeout_ns: u64,
}

impl RenderCore {
    /// Swapchain state plus a factory borrowing everything else
    fn split(&mut self) -> (&mut SwapchainState<SwapchainGeneration, PerImageResources>, GpuFactory<'_>) {
        let Self {
            swapchain_state,
            descriptor_layout,
            texture,
            index_buffer,
            vertex_buffer,
            command_pool,
            buffers,
            context,
            surface,
            vertex_shader,
            fragment_shader,
            clear_color,
            max_frames,
            ..
        } = self;

        let factory = GpuFactory {
            context,
            surface,
            buffers,
            command_pool,
            descriptor_layout,
            texture,
            vertex_buffer,
            index_buffer,
            vertex_shader,
            fragment_shader,
            clear_color: *clear_color,
            max_frames: *max_frames,
        };
        (swapchain_state, factory)
    }

    fn frame_sync(&self, slot: usize) -> VulkanResult<&FrameSync> {
        self.frame_syncs.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("frame slot {} out of range ({} slots)", slot, self.frame_syncs.len()),
        })
    }

    fn live_generation(&self) -> VulkanResult<&SwapchainGeneration> {
        self.swapchain_state
            .live()
            .map(|live| &live.parts)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "no live swapchain".to_string(),
            })
    }

    /// Tear down the current generation and build the next one
    ///
    /// A zero-sized framebuffer leaves the current generation alone.
    fn rebuild_swapchain<W: PresentationTarget>(&mut self, window: &W) -> VulkanResult<RecreateOutcome> {
        let (state, mut factory) = self.split();
        let outcome = state.rebuild(&mut factory, window.framebuffer_size())?;

        if let (RecreateOutcome::Rebuilt { image_count }, Some(live)) = (outcome, state.live()) {
            let extent = live.parts.swapchain.extent();
            log::info!(
                "Swapchain generation {} ready: {}x{}, {} images",
                live.id,
                extent.width,
                extent.height,
                image_count
            );
        }
        Ok(outcome)
    }

    /// Replace the command buffers of the live generation
    fn rerecord(&mut self) -> VulkanResult<()> {
        let (state, factory) = self.split();
        let command_buffers = match state.live() {
            Some(live) => factory.record(&live.parts, state.per_image())?,
            // Picked up by the next rebuild
            None => return Ok(()),
        };

        if let Some(live) = state.live_mut() {
            live.parts.command_buffers = command_buffers;
        }
        Ok(())
    }
}

impl Drop for RenderCore {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::warn!("Device wait before teardown failed: {}", e);
        }
    }
}

/// One frame's view of the core, handed to the frame loop
struct FrameContext<'a, W> {
    core: &'a mut RenderCore,
    window: &'a W,
}

impl<W: PresentationTarget> FrameBackend for FrameContext<'_, W> {
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.core.frame_sync(slot)?.in_flight.wait(self.core.timeout_ns)
    }

    fn reset_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.core.frame_sync(slot)?.in_flight.reset()
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let signal = self.core.frame_sync(slot)?.image_available.handle();
        let Some(live) = self.core.swapchain_state.live() else {
            return Ok(AcquireOutcome::OutOfDate);
        };

        match live.parts.swapchain.acquire_next_image(signal, self.core.timeout_ns)? {
            Some((index, suboptimal)) => Ok(AcquireOutcome::Image { index, suboptimal }),
            None => {
                log::warn!("Swapchain out of date on acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
        }
    }

    fn update_uniforms(&mut self, image: u32, elapsed: Duration) -> VulkanResult<()> {
        let extent = self.core.live_generation()?.swapchain.extent();
        let ubo = UniformBufferObject::at(elapsed.as_secs_f32(), (extent.width, extent.height));

        self.core
            .swapchain_state
            .per_image()
            .uniform_buffers
            .get(image as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no uniform buffer for image {}", image),
            })?
            .update(&ubo)
    }

    fn submit(&mut self, slot: usize, image: u32) -> VulkanResult<()> {
        let sync = self.core.frame_sync(slot)?;
        let generation = self.core.live_generation()?;
        let command_buffer = generation
            .command_buffers
            .handles()
            .get(image as usize)
            .copied()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no command buffer for image {}", image),
            })?;

        let wait_semaphores = [sync.image_available.handle()];
        // Only color output has to wait for the presentation engine
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.core.context.device().queue_submit(
                self.core.context.graphics_queue(),
                &[submit_info],
                sync.in_flight.handle(),
            )
        }
        .map_err(VulkanError::from)
    }

    fn present(&mut self, slot: usize, image: u32) -> VulkanResult<PresentResult> {
        let wait = self.core.frame_sync(slot)?.render_finished.handle();
        let generation = self.core.live_generation()?;
        let result = generation
            .swapchain
            .present(self.core.context.present_queue(), image, wait)?;

        match result {
            PresentResult::OutOfDate => log::warn!("Swapchain out of date on present"),
            PresentResult::Suboptimal => log::debug!("Swapchain suboptimal on present"),
            PresentResult::Optimal => {}
        }
        Ok(result)
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<RecreateOutcome> {
        self.core.rebuild_swapchain(self.window)
    }
}

/// # Render System
///
/// A single-pass forward renderer that draws one textured, indexed mesh.
///
/// ## Lifecycle
///
/// 1. [`RenderSystem::initialize`] creates the device, uploads geometry and
///    texture, and builds the first swapchain generation.
/// 2. [`RenderSystem::draw_frame`] runs one acquire, submit, present cycle.
///    Out-of-date surfaces are rebuilt and the frame is dropped.
/// 3. [`RenderSystem::cleanup`] drains the GPU and releases everything.
///    Dropping the system does the same without reporting errors.
///
/// The window must outlive the render system.
pub struct RenderSystem {
    core: RenderCore,
    frame_loop: FrameLoop,
}

impl RenderSystem {
    /// Create the device, resources and first swapchain for `window`
    pub fn initialize<W: PresentationTarget>(window: &mut W, config: RendererConfig) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        log::info!("Initializing renderer for {}", config.application_name);

        let (vertex_shader, fragment_shader) = load_shaders(&config.shaders)?;
        let mesh = load_mesh(&config.assets)?;
        let image = load_texture_image(&config.assets);

        let instance = VulkanInstance::new(
            &*window,
            &config.application_name,
            config.application_version,
            config.validation_enabled(),
        )?;
        log::info!(
            "Vulkan instance created, validation layers {}",
            if instance.validation_enabled() { "on" } else { "off" }
        );
        let surface = PresentationSurface::new(&instance, window)?;
        let context = DeviceContext::new(&instance, &surface)?;
        let command_pool = CommandPool::new(&context)?;
        let buffers = BufferManager::new(&context);

        let swapchain = Swapchain::new(
            &context,
            &surface,
            window.framebuffer_size(),
            config.max_frames_in_flight as u32,
        )?;
        let image_count = swapchain.image_count();
        let extent = swapchain.extent();

        let descriptor_layout = DescriptorSetLayoutBuilder::textured_mesh().build(context.device())?;
        let vertex_buffer = buffers.create_vertex_buffer(&command_pool, &mesh.vertices)?;
        let index_buffer = buffers.create_index_buffer(&command_pool, &mesh.indices)?;
        let texture = Texture::from_image_data(&context, &buffers, &command_pool, &image)?;
        log::info!(
            "Uploaded {} vertices, {} indices and a {}x{} texture",
            vertex_buffer.vertex_count(),
            index_buffer.index_count(),
            texture.extent().width,
            texture.extent().height
        );

        let per_image = PerImageResources::new(&context, &buffers, &descriptor_layout, &texture, image_count)?;
        let frame_syncs = FrameSync::create_frames(context.device(), config.max_frames_in_flight)?;

        let mut core = RenderCore {
            swapchain_state: SwapchainState::new(per_image, image_count),
            descriptor_layout,
            texture,
            index_buffer,
            vertex_buffer,
            frame_syncs,
            command_pool,
            buffers,
            context,
            surface,
            _instance: instance,
            vertex_shader,
            fragment_shader,
            clear_color: config.clear_color,
            max_frames: config.max_frames_in_flight,
            timeout_ns: config.frame_timeout_ns(),
        };

        let (state, mut factory) = core.split();
        state.install(&mut factory, swapchain)?;

        log::info!(
            "Renderer ready: {}x{}, {} swapchain images, {} frames in flight, {} triangles",
            extent.width,
            extent.height,
            image_count,
            config.max_frames_in_flight,
            mesh.triangle_count()
        );

        Ok(Self {
            frame_loop: FrameLoop::new(config.max_frames_in_flight, image_count),
            core,
        })
    }

    /// Render and present one frame
    ///
    /// Must not be called again until the previous call has returned.
    pub fn draw_frame<W: PresentationTarget>(&mut self, window: &W) -> VulkanResult<FrameStatus> {
        let mut frame = FrameContext {
            core: &mut self.core,
            window,
        };
        self.frame_loop.draw_frame(&mut frame)
    }

    /// Change the clear color and re-record the command buffers
    pub fn set_clear_color(&mut self, color: [f32; 4]) -> VulkanResult<()> {
        if color == self.core.clear_color {
            return Ok(());
        }

        self.core.clear_color = color;
        self.core.context.wait_idle()?;
        self.core.rerecord()?;
        log::debug!("Clear color set to {:?}", color);
        Ok(())
    }

    /// Mark the surface stale; the next frame rebuilds after presenting
    pub fn notify_resized(&mut self) {
        self.frame_loop.notify_resized();
    }

    /// Rebuild the swapchain now
    ///
    /// Returns [`FrameStatus::Deferred`] while the framebuffer has no area.
    pub fn recreate_swapchain<W: PresentationTarget>(&mut self, window: &W) -> VulkanResult<FrameStatus> {
        let outcome = self.core.rebuild_swapchain(window)?;
        Ok(self.frame_loop.apply_recreate(outcome))
    }

    /// Drain the GPU and destroy every object
    pub fn cleanup(self) -> VulkanResult<()> {
        let context = &self.core.context;
        unsafe {
            context.device().queue_wait_idle(context.graphics_queue())?;
            if context.present_queue() != context.graphics_queue() {
                context.device().queue_wait_idle(context.present_queue())?;
            }
        }
        context.wait_idle()?;

        drop(self);
        log::info!("Renderer shut down");
        Ok(())
    }

    /// Frame slot the next `draw_frame` will use
    pub fn frame_index(&self) -> usize {
        self.frame_loop.current_frame()
    }

    /// Number of frame slots
    pub fn max_frames_in_flight(&self) -> usize {
        self.frame_loop.max_frames()
    }

    /// Current swapchain extent, if a swapchain is live
    pub fn extent(&self) -> Option<(u32, u32)> {
        self.core.swapchain_state.live().map(|live| {
            let extent = live.parts.swapchain.extent();
            (extent.width, extent.height)
        })
    }

    /// Number of swapchain images, if a swapchain is live
    pub fn image_count(&self) -> Option<usize> {
        self.core.swapchain_state.live().map(|live| live.image_count)
    }

    /// Increases by one with every swapchain rebuild
    pub fn generation_id(&self) -> Option<u64> {
        self.core.swapchain_state.live().map(|live| live.id)
    }

    /// Current clear color
    pub fn clear_color(&self) -> [f32; 4] {
        self.core.clear_color
    }

    /// Whether a rebuild was deferred and is still outstanding
    pub fn is_recreate_pending(&self) -> bool {
        self.frame_loop.is_recreate_pending()
    }
}

fn asset_error(error: AssetError) -> VulkanError {
    VulkanError::InitializationFailed(error.to_string())
}

/// Both shader binaries, after checking the files are there
fn load_shaders(config: &ShaderConfig) -> VulkanResult<(Vec<u8>, Vec<u8>)> {
    config
        .check_files_exist()
        .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

    let vertex = assets::read_shader_file(&config.vertex_shader_path).map_err(asset_error)?;
    let fragment = assets::read_shader_file(&config.fragment_shader_path).map_err(asset_error)?;
    Ok((vertex, fragment))
}

/// Configured OBJ mesh, or the built-in quad
fn load_mesh(config: &AssetConfig) -> VulkanResult<Mesh> {
    let mesh = match &config.mesh_path {
        Some(path) => assets::read_obj_file(path).map_err(asset_error)?,
        None => Mesh::quad(),
    };

    if !mesh.is_drawable() {
        return Err(VulkanError::InitializationFailed(format!(
            "Mesh is not drawable: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        )));
    }
    Ok(mesh)
}

/// Configured texture image, or a checkerboard when it is absent or unreadable
fn load_texture_image(config: &AssetConfig) -> ImageData {
    let fallback = || ImageData::checkerboard(CHECKER_SIZE, CHECKER_CELL, CHECKER_LIGHT, CHECKER_DARK);

    match &config.texture_path {
        Some(path) => ImageData::from_file(path).unwrap_or_else(|e| {
            log::warn!("Texture {:?} unavailable, using checkerboard: {}", path, e);
            fallback()
        }),
        None => fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_assets_are_quad_and_checkerboard() {
        let config = AssetConfig::default();

        let mesh = load_mesh(&config).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);

        let image = load_texture_image(&config);
        assert_eq!((image.width, image.height, image.channels), (CHECKER_SIZE, CHECKER_SIZE, 4));
        assert_eq!(&image.data[0..4], &CHECKER_LIGHT);
    }

    #[test]
    fn unreadable_texture_falls_back() {
        let config = AssetConfig {
            texture_path: Some("no/such/texture.png".into()),
            mesh_path: None,
        };
        let image = load_texture_image(&config);
        assert_eq!(image.width, CHECKER_SIZE);
    }

    #[test]
    fn missing_mesh_is_fatal() {
        let config = AssetConfig {
            texture_path: None,
            mesh_path: Some("no/such/model.obj".into()),
        };
        assert!(matches!(load_mesh(&config), Err(VulkanError::InitializationFailed(_))));
    }

    #[test]
    fn missing_shader_file_is_reported_before_reading() {
        let config = ShaderConfig::new("no/such/shader.vert.spv", "no/such/shader.frag.spv");
        match load_shaders(&config) {
            Err(VulkanError::InitializationFailed(message)) => {
                assert!(message.contains("Vertex shader not found"), "{}", message);
                assert!(message.contains("no/such/shader.vert.spv"), "{}", message);
            }
            other => panic!("expected initialization failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_fragment_shader_named_in_error() {
        let vertex = std::env::temp_dir().join(format!("minirender-render-vert-{}.spv", std::process::id()));
        std::fs::write(&vertex, 0x0723_0203u32.to_le_bytes()).unwrap();

        let config = ShaderConfig::new(vertex.to_string_lossy(), "no/such/shader.frag.spv");
        let result = load_shaders(&config);
        std::fs::remove_file(&vertex).unwrap();

        match result {
            Err(VulkanError::InitializationFailed(message)) => {
                assert!(message.contains("Fragment shader not found"), "{}", message);
            }
            other => panic!("expected initialization failure, got {:?}", other.map(|_| ())),
        }
    }
}
