//! Nebula demo - clears the window to a pulsing blue
//!
//! Exits 0 when the window is closed. Any fatal engine error is logged and
//! the process aborts.

use std::sync::Arc;
use std::time::Duration;

use nebula_engine::nebula::frame::FlashClearRecorder;
use nebula_engine::nebula::window::{EventSource, WindowEvent};
use nebula_engine::nebula::{Config, Engine, Error, Result};
use nebula_engine::{engine_error, engine_info};
use nebula_engine_vulkan::{GpuContext, VulkanGraphicsDevice, VulkanSwapchain};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent as WinitWindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

/// Collects winit events between engine polls
struct WindowState {
    title: String,
    size: PhysicalSize<u32>,
    window: Option<Arc<Window>>,
    creation_error: Option<String>,
    pending: Vec<WindowEvent>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(self.size)
            .with_resizable(true);
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                self.creation_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WinitWindowEvent) {
        let translated = match event {
            WinitWindowEvent::CloseRequested => Some(WindowEvent::Close),
            WinitWindowEvent::Resized(size) => Some(WindowEvent::Resized {
                width: size.width,
                height: size.height,
            }),
            WinitWindowEvent::Occluded(true) => Some(WindowEvent::Minimized),
            WinitWindowEvent::Occluded(false) => Some(WindowEvent::Restored),
            _ => None,
        };
        self.pending.extend(translated);
    }
}

/// winit event loop driven one non-blocking pump per engine poll
struct WinitEvents {
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl WinitEvents {
    fn new(config: &Config) -> Result<Self> {
        let event_loop = EventLoop::new()
            .map_err(|e| Error::InitializationFailed(format!("Failed to create event loop: {}", e)))?;
        Ok(Self {
            event_loop,
            state: WindowState {
                title: config.app_name.clone(),
                size: PhysicalSize::new(config.window_width, config.window_height),
                window: None,
                creation_error: None,
                pending: Vec::new(),
            },
        })
    }

    /// Pump until the window exists
    fn open_window(&mut self) -> Result<Arc<Window>> {
        loop {
            let status = self.event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut self.state);
            if let Some(error) = self.state.creation_error.take() {
                return Err(Error::InitializationFailed(format!("Failed to create window: {}", error)));
            }
            if let Some(window) = &self.state.window {
                return Ok(Arc::clone(window));
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::InitializationFailed(format!(
                    "Event loop exited with code {} before the window opened", code
                )));
            }
        }
    }
}

impl EventSource for WinitEvents {
    fn poll_events(&mut self) -> Vec<WindowEvent> {
        let status = self.event_loop.pump_app_events(Some(Duration::ZERO), &mut self.state);
        let mut events = std::mem::take(&mut self.state.pending);
        if let PumpStatus::Exit(_) = status {
            events.push(WindowEvent::Close);
        }
        events
    }
}

fn run() -> Result<()> {
    let config = Config {
        app_name: "Nebula Demo".to_string(),
        ..Config::default()
    };

    let mut events = WinitEvents::new(&config)?;
    let window = events.open_window()?;
    let size = window.inner_size();

    let context = GpuContext::new(window.as_ref(), &config)?;
    let swapchain = VulkanSwapchain::new(Arc::clone(&context), size.width, size.height, config.present_mode)?;
    let device = Arc::new(VulkanGraphicsDevice::new(context));
    let mut engine = Engine::new(device, Box::new(swapchain), config)?;

    engine_info!("nebula::demo", "Running ({}x{})", size.width, size.height);
    engine.run(&mut events, &mut FlashClearRecorder)?;
    engine.shutdown()?;

    #[cfg(feature = "validation")]
    nebula_engine_vulkan::print_validation_stats_report();

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        engine_error!("nebula::demo", "Fatal error: {}", e);
        std::process::abort();
    }
}
