//! Vulkan rendering backend
//!
//! Thin RAII wrappers over `ash`. Each wrapper holds a clone of the device
//! dispatch table and destroys its own handles; the owner decides the order
//! through field declaration order.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor_set;
pub mod framebuffer;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex_layout;
pub mod window;

pub use buffer::{Buffer, BufferManager, IndexBuffer, UniformBuffer, VertexBuffer};
pub use commands::{ActiveRenderPass, CommandBufferSet, CommandPool, CommandRecorder};
pub use context::{
    DeviceContext, PhysicalDeviceInfo, PresentationSurface, QueueFamilyIndices, SurfaceSupport,
    VulkanError, VulkanInstance, VulkanResult,
};
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use framebuffer::Framebuffer;
pub use render_pass::RenderPass;
pub use shader::{GraphicsPipeline, ShaderModule};
pub use swapchain::{PresentResult, Swapchain};
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::Texture;
pub use vertex_layout::VulkanVertexLayout;
pub use window::{PresentationTarget, Window, WindowError, WindowResult};
