//! Configuration system
//!
//! Serde-backed configuration for the renderer and the window that hosts
//! it. Files are TOML or RON, picked by extension.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match ConfigFormat::of(path)? {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::of(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Directories searched, in order, for compiled shaders
const SHADER_DIRS: [&str; 5] = [
    "target/shaders/",
    "shaders/",
    "resources/shaders/",
    "../shaders/",
    "./",
];

/// SPIR-V paths for the vertex and fragment stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Look for each file in the usual shader directories
    ///
    /// Falls back to `shaders/<name>` when a file is found nowhere, so the
    /// later existence check reports a sensible path.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        Self {
            vertex_shader_path: resolve_shader(base_vertex),
            fragment_shader_path: resolve_shader(base_fragment),
        }
    }

    /// Check that both files exist
    pub fn check_files_exist(&self) -> Result<(), ConfigError> {
        for (stage, path) in [("Vertex", &self.vertex_shader_path), ("Fragment", &self.fragment_shader_path)] {
            if !Path::new(path).exists() {
                return Err(ConfigError::Invalid(format!("{} shader not found: {}", stage, path)));
            }
        }
        Ok(())
    }
}

fn resolve_shader(name: &str) -> String {
    SHADER_DIRS
        .iter()
        .map(|dir| format!("{}{}", dir, name))
        .find(|candidate| Path::new(candidate).exists())
        .unwrap_or_else(|| format!("shaders/{}", name))
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("textured.vert.spv", "textured.frag.spv")
    }
}

/// Optional asset files; absent entries fall back to built-in content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Image decoded into the single texture
    pub texture_path: Option<PathBuf>,
    /// OBJ file replacing the built-in quad
    pub mesh_path: Option<PathBuf>,
}

/// # Renderer Configuration
///
/// Application metadata, frame pacing and debug switches for
/// [`RenderSystem`](crate::render::RenderSystem).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Frame slots that may be in flight at once
    pub max_frames_in_flight: usize,
    /// Upper bound on each fence or acquire wait, in milliseconds
    pub frame_timeout_ms: u64,
    /// Whether to enable Vulkan validation layers; `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Initial clear color, RGBA
    pub clear_color: [f32; 4],
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Asset configuration
    pub assets: AssetConfig,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            max_frames_in_flight: 2,
            frame_timeout_ms: 1000,
            enable_validation: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shaders: ShaderConfig::default(),
            assets: AssetConfig::default(),
        }
    }

    /// Set application version
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Set the per-wait timeout
    pub fn with_frame_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.frame_timeout_ms = timeout_ms;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the initial clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Use an image file as the texture
    pub fn with_texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.assets.texture_path = Some(path.into());
        self
    }

    /// Use an OBJ file instead of the built-in quad
    pub fn with_mesh(mut self, path: impl Into<PathBuf>) -> Self {
        self.assets.mesh_path = Some(path.into());
        self
    }

    /// Validation layers on: explicit setting, else debug builds only
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Per-wait timeout in nanoseconds
    pub fn frame_timeout_ns(&self) -> u64 {
        self.frame_timeout_ms.saturating_mul(1_000_000)
    }

    /// Check value ranges; shader files are checked separately
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if self.max_frames_in_flight == 0 {
            return Err(ConfigError::Invalid("Max frames in flight must be at least 1".to_string()));
        }

        if self.max_frames_in_flight > 8 {
            return Err(ConfigError::Invalid("Max frames in flight should not exceed 8".to_string()));
        }

        if self.frame_timeout_ms == 0 {
            return Err(ConfigError::Invalid("Frame timeout must be non-zero".to_string()));
        }

        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid("Clear color must be finite".to_string()));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("minirender")
    }
}

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "minirender".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Top-level document for the viewer: `[window]` and `[renderer]` tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
}

impl Config for RendererConfig {}
impl Config for WindowConfig {}
impl Config for ViewerConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_frames_in_flight, 2);
        assert_eq!(config.frame_timeout_ns(), 1_000_000_000);
    }

    #[test]
    fn frame_count_must_be_in_range() {
        assert!(RendererConfig::default().with_max_frames_in_flight(0).validate().is_err());
        assert!(RendererConfig::default().with_max_frames_in_flight(9).validate().is_err());
        assert!(RendererConfig::default().with_max_frames_in_flight(8).validate().is_ok());
    }

    #[test]
    fn empty_name_and_zero_timeout_rejected() {
        assert!(RendererConfig::new("").validate().is_err());
        assert!(RendererConfig::default().with_frame_timeout_ms(0).validate().is_err());
    }

    #[test]
    fn explicit_validation_setting_wins() {
        assert!(RendererConfig::default().with_validation(true).validation_enabled());
        assert!(!RendererConfig::default().with_validation(false).validation_enabled());
    }

    #[test]
    fn viewer_config_round_trips_through_toml() {
        let mut config = ViewerConfig::default();
        config.window.title = "Spinning quad".to_string();
        config.renderer = RendererConfig::new("viewer")
            .with_max_frames_in_flight(3)
            .with_clear_color([0.1, 0.2, 0.3, 1.0])
            .with_texture("textures/texture.jpg");

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ViewerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let parsed: ViewerConfig = toml::from_str(
            r#"
            [window]
            width = 1280

            [renderer]
            max_frames_in_flight = 3
            "#,
        )
        .unwrap();

        assert_eq!(parsed.window.width, 1280);
        assert_eq!(parsed.window.height, 600);
        assert_eq!(parsed.renderer.max_frames_in_flight, 3);
        assert_eq!(parsed.renderer.frame_timeout_ms, 1000);
        assert!(parsed.renderer.assets.texture_path.is_none());
    }

    #[test]
    fn partial_shader_table_keeps_other_stage_default() {
        let parsed: ViewerConfig = toml::from_str(
            r#"
            [renderer.shaders]
            vertex_shader_path = "custom/mesh.vert.spv"
            "#,
        )
        .unwrap();

        let shaders = &parsed.renderer.shaders;
        assert_eq!(shaders.vertex_shader_path, "custom/mesh.vert.spv");
        assert_eq!(shaders.fragment_shader_path, ShaderConfig::default().fragment_shader_path);
        assert!(shaders.fragment_shader_path.ends_with("textured.frag.spv"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = RendererConfig::default().save_to_file("renderer.json").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn ron_file_round_trip() {
        let path = std::env::temp_dir().join(format!("minirender-config-{}.ron", std::process::id()));
        let config = RendererConfig::new("ron-test").with_frame_timeout_ms(250);
        config.save_to_file(&path).unwrap();
        let loaded = RendererConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_shader_files_are_reported() {
        let shaders = ShaderConfig::new("does/not/exist.vert.spv", "does/not/exist.frag.spv");
        let err = shaders.check_files_exist().unwrap_err();
        assert!(err.to_string().contains("Vertex shader not found"));
    }
}
