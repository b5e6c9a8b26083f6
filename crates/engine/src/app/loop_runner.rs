use std::sync::Arc;

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::audio::{AudioSink, NullAudio};
use super::config::{resolve_quick_boot, LoopConfig};
use super::input::KeySnapshot;
use super::metrics::MetricsHandle;
use super::rendering::Renderer;
use super::room_manager::RoomRegistry;
use super::runtime::{Runtime, RuntimeError};
use super::scheduler::{InstantTimeSource, TimeSource};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, registry: RoomRegistry) -> Result<(), AppError> {
    run_app_with_metrics(
        config,
        registry,
        Box::new(NullAudio),
        MetricsHandle::default(),
    )
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    registry: RoomRegistry,
    audio: Box<dyn AudioSink>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let config = LoopConfig {
        quick_boot: resolve_quick_boot(config.quick_boot),
        ..config
    }
    .normalized();
    if registry.is_empty() {
        return Err(RuntimeError::EmptyRegistry.into());
    }
    let mut runtime = Runtime::with_parts(&config, registry, audio, metrics_handle);
    let clock = InstantTimeSource::new();

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let (window_width, window_height) = config.window_size();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(window_width as f64, window_height as f64))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window), config.base_width, config.base_height)
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    info!(
        base_width = config.base_width,
        base_height = config.base_height,
        screen_scale = config.screen_scale,
        target_fps = config.target_fps,
        quick_boot = config.quick_boot,
        boot_delay_ms = config.boot_delay_ms,
        "loop_config"
    );
    // Assets are owned by the host; there is nothing to load before the first room.
    runtime.finish_loading(clock.now_ms(), Ok(()))?;

    let mut input_collector = InputCollector::default();
    let mut last_applied_title: Option<String> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::Focused(false) => input_collector.release_all(),
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector
                        .handle_physical_key(event.physical_key, event.state.is_pressed());
                    if input_collector.quit_requested() {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    runtime.tick(clock.now_ms(), input_collector.snapshot());

                    if let Err(error) = renderer.draw(&runtime.frame_view(), runtime.stage()) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }

                    let next_title = compose_title(&config.window_title, &runtime.debug_lines());
                    if next_title != last_applied_title {
                        let title = next_title.as_deref().unwrap_or(config.window_title.as_str());
                        window.set_title(title);
                        last_applied_title = next_title;
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                info!(total_ticks = runtime.scheduler().total_ticks(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn compose_title(base: &str, debug_lines: &[String]) -> Option<String> {
    if debug_lines.is_empty() {
        return None;
    }
    Some(format!("{base} | {}", debug_lines.join(" | ")))
}

/// Accumulates raw key and button state between ticks.
#[derive(Debug, Default)]
struct InputCollector {
    keys: KeySnapshot,
    quit_requested: bool,
}

impl InputCollector {
    fn handle_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        if key == PhysicalKey::Code(KeyCode::Escape) && is_pressed {
            self.quit_requested = true;
        }
        if let Some(code) = physical_key_code(key) {
            self.keys.set_held(&code, is_pressed);
        }
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        self.keys
            .set_held(&mouse_button_code(button), state == ElementState::Pressed);
    }

    fn release_all(&mut self) {
        self.keys = KeySnapshot::empty();
    }

    fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    fn snapshot(&self) -> &KeySnapshot {
        &self.keys
    }
}

/// Physical codes are named after winit's `KeyCode` variants, e.g. `"KeyZ"`.
fn physical_key_code(key: PhysicalKey) -> Option<String> {
    match key {
        PhysicalKey::Code(code) => Some(format!("{code:?}")),
        PhysicalKey::Unidentified(_) => None,
    }
}

fn mouse_button_code(button: MouseButton) -> String {
    match button {
        MouseButton::Left => "Mouse0".to_string(),
        MouseButton::Middle => "Mouse1".to_string(),
        MouseButton::Right => "Mouse2".to_string(),
        MouseButton::Back => "Mouse3".to_string(),
        MouseButton::Forward => "Mouse4".to_string(),
        MouseButton::Other(index) => format!("Mouse{index}"),
    }
}
