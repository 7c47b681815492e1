//! Asset loading
//!
//! Files the renderer consumes at initialization: SPIR-V shader binaries,
//! OBJ meshes and texture images.

pub mod image_loader;
pub mod obj_loader;
pub mod shader_loader;

pub use image_loader::ImageData;
pub use obj_loader::{parse_obj, read_obj_file};
pub use shader_loader::read_shader_file;

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// File contents are not in the expected format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
