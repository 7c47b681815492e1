//! # minirender
//!
//! A single-pass Vulkan forward renderer that draws one textured, indexed
//! mesh spinning about the Z axis.
//!
//! ## Features
//!
//! - **Frames in flight**: per-slot fences and semaphores with bounded waits
//! - **Swapchain recreation**: out-of-date surfaces and resizes rebuild the
//!   swapchain-dependent objects as one generation
//! - **Staged uploads**: vertex, index and texture data go through staging
//!   buffers into device-local memory
//! - **Configuration**: TOML or RON files via serde
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use minirender::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut window = Window::new("minirender", 800, 600)?;
//!     let mut renderer = RenderSystem::initialize(&mut window, RendererConfig::default())?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw_frame(&window)?;
//!     }
//!
//!     renderer.cleanup()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        assets::{AssetError, ImageData},
        config::{Config, ConfigError, RendererConfig, ShaderConfig, ViewerConfig, WindowConfig},
        render::{FrameStatus, Mesh, RenderSystem, Vertex, VulkanError, VulkanResult, Window, WindowError},
    };
}
