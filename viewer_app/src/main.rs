//! Viewer application
//!
//! Opens a window and spins the configured mesh until the window closes.
//! Settings come from `viewer.toml` in the working directory when present.
//!
//! Keys: `Escape` quits, `C` cycles the background color.

use glfw::{Action, Key, WindowEvent};
use minirender::prelude::*;
use std::path::Path;

const CONFIG_PATH: &str = "viewer.toml";

const BACKGROUNDS: [[f32; 4]; 4] = [
    [0.0, 0.0, 0.0, 1.0],
    [0.1, 0.1, 0.2, 1.0],
    [0.2, 0.05, 0.05, 1.0],
    [0.05, 0.15, 0.05, 1.0],
];

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("window: {0}")]
    Window(#[from] WindowError),

    #[error("renderer: {0}")]
    Render(#[from] VulkanError),
}

struct ViewerApp {
    // Declared first so the renderer is gone before the window it draws to
    renderer: RenderSystem,
    window: Window,
    background: usize,
    frames: u64,
}

impl ViewerApp {
    fn new(config: ViewerConfig) -> Result<Self, AppError> {
        let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
        let renderer = RenderSystem::initialize(&mut window, config.renderer)?;

        let background = BACKGROUNDS
            .iter()
            .position(|color| *color == renderer.clear_color())
            .unwrap_or(0);

        Ok(Self {
            renderer,
            window,
            background,
            frames: 0,
        })
    }

    fn run(mut self) -> Result<(), AppError> {
        log::info!("Entering main loop");

        while !self.window.should_close() {
            self.window.poll_events();
            self.handle_events()?;

            match self.renderer.draw_frame(&self.window)? {
                FrameStatus::Deferred => {
                    // Minimized; sleep until something happens
                    self.window.wait_events();
                }
                FrameStatus::SwapchainRecreated => {
                    if let Some((width, height)) = self.renderer.extent() {
                        log::info!("Swapchain rebuilt at {}x{}", width, height);
                    }
                }
                FrameStatus::Presented | FrameStatus::Suboptimal => self.frames += 1,
            }
        }

        log::info!("Presented {} frames", self.frames);
        self.renderer.cleanup()?;
        Ok(())
    }

    fn handle_events(&mut self) -> Result<(), AppError> {
        let events: Vec<WindowEvent> = self.window.flush_events().map(|(_, event)| event).collect();

        for event in events {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                    self.window.set_should_close(true);
                }
                WindowEvent::Key(Key::C, _, Action::Press, _) => {
                    self.background = (self.background + 1) % BACKGROUNDS.len();
                    self.renderer.set_clear_color(BACKGROUNDS[self.background])?;
                }
                WindowEvent::FramebufferSize(width, height) => {
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                    self.renderer.notify_resized();
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn load_config() -> Result<ViewerConfig, ConfigError> {
    if Path::new(CONFIG_PATH).exists() {
        log::info!("Loading configuration from {}", CONFIG_PATH);
        ViewerConfig::load_from_file(CONFIG_PATH)
    } else {
        log::info!("No {} found, using defaults", CONFIG_PATH);
        Ok(ViewerConfig::default())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC occurred: {:?}", panic_info);

        if let Some(location) = panic_info.location() {
            eprintln!("Panic location: {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("Starting viewer");

    let result = load_config()
        .map_err(AppError::from)
        .and_then(ViewerApp::new)
        .and_then(ViewerApp::run);

    match result {
        Ok(()) => {
            log::info!("Viewer finished successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Application error: {}", e);
            Err(e.into())
        }
    }
}
