//! # Rendering
//!
//! [`RenderSystem`] is the entry point. It sits on the Vulkan wrappers in
//! [`vulkan`] and sequences frames through [`frame_loop`], which has no GPU
//! dependency of its own.

pub mod frame_loop;
pub mod mesh;
pub mod recreation;
pub mod render_system;
pub mod uniforms;
pub mod vulkan;

pub use frame_loop::{AcquireOutcome, FrameBackend, FrameLoop, FrameStatus, RecreateOutcome};
pub use mesh::{Mesh, Vertex};
pub use render_system::RenderSystem;
pub use uniforms::UniformBufferObject;
pub use vulkan::{PresentationTarget, VulkanError, VulkanResult, Window, WindowError};
