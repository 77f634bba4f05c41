use anyhow::{anyhow, bail, Context, Result};
use onac_core::{Display, Error, Key, KeyEvent, Scene};
use onac_render::{load_font, Renderer, SkiaRenderer};
use onac_timing::Timer;
use pixels::{Pixels, SurfaceTexture};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Fullscreen, Window, WindowId},
};

const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub resolution: (u32, u32),
    pub fullscreen: bool,
    /// Monitor index; the primary monitor when out of range.
    pub screen: usize,
    pub font: Option<PathBuf>,
}

/// winit state. Everything the event callbacks touch lives here.
struct Surface<T> {
    options: WindowOptions,
    timer: T,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    refresh_rate: Option<f64>,
    keys: Vec<KeyEvent>,
    resized: Option<PhysicalSize<u32>>,
    close_requested: bool,
    error: Option<anyhow::Error>,
}

impl<T: Timer<Timestamp = u64>> Surface<T> {
    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .available_monitors()
            .nth(self.options.screen)
            .or_else(|| event_loop.primary_monitor())
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;

        self.refresh_rate = monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let (width, height) = self.options.resolution;
        let mut attributes = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_resizable(false);
        attributes = if self.options.fullscreen {
            attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor.clone()))))
        } else {
            attributes.with_inner_size(PhysicalSize::new(width, height))
        };

        let window = Arc::new(event_loop.create_window(attributes)?);
        let physical_size = window.inner_size();
        info!(
            width = physical_size.width,
            height = physical_size.height,
            scale = window.scale_factor(),
            refresh_hz = ?self.refresh_rate,
            monitor = ?monitor.name(),
            "display opened"
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);
        self.window = Some(window);
        Ok(())
    }

    fn handle_key(&mut self, key: PhysicalKey) {
        if let PhysicalKey::Code(code) = key {
            self.keys.push(KeyEvent {
                key: map_key(code),
                timestamp_ns: self.timer.now(),
            });
        }
    }
}

impl<T: Timer<Timestamp = u64>> ApplicationHandler for Surface<T> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window(event_loop) {
                self.error = Some(e.context("failed to create window and surface"));
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                self.handle_key(event.physical_key);
            }
            WindowEvent::Resized(size) => self.resized = Some(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.resized = Some(window.inner_size());
                }
            }
            _ => {}
        }
    }
}

pub fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::Space => Key::Space,
        KeyCode::Enter | KeyCode::NumpadEnter => Key::Return,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        other => {
            let name = format!("{other:?}");
            let short = name
                .strip_prefix("Key")
                .or_else(|| name.strip_prefix("Digit"))
                .filter(|s| s.len() == 1);
            match short {
                Some(s) => Key::from_name(s),
                None => Key::Other(name.to_ascii_lowercase()),
            }
        }
    }
}

/// A real window driven by pumping the winit event loop from the session
/// thread. `flip` blocks on the vsync'd present.
pub struct WindowDisplay<T> {
    event_loop: EventLoop<()>,
    surface: Surface<T>,
    renderer: SkiaRenderer,
    size: (u32, u32),
}

impl<T: Timer<Timestamp = u64>> WindowDisplay<T> {
    pub fn open(options: WindowOptions, timer: T) -> Result<Self> {
        let mut event_loop = EventLoop::new()?;
        let font = options.font.clone();
        let mut surface = Surface {
            options,
            timer,
            window: None,
            pixels: None,
            refresh_rate: None,
            keys: Vec::new(),
            resized: None,
            close_requested: false,
            error: None,
        };

        let started = Instant::now();
        while surface.window.is_none() {
            let status =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut surface);
            if let Some(e) = surface.error.take() {
                return Err(e);
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited with {code} before the window opened");
            }
            if started.elapsed() > OPEN_TIMEOUT {
                bail!("timed out waiting for the window");
            }
        }

        let size = surface
            .window
            .as_ref()
            .map(|w| (w.inner_size().width, w.inner_size().height))
            .unwrap_or_default();
        let mut renderer = SkiaRenderer::new(size.0, size.1)?;
        if let Some(path) = font {
            let font = load_font(&path)
                .with_context(|| format!("loading font {}", path.display()))?;
            renderer = renderer.with_font(font);
        } else {
            warn!("no font configured, text stimuli will fail");
        }

        Ok(Self {
            event_loop,
            surface,
            renderer,
            size,
        })
    }

    fn pump(&mut self) -> onac_core::Result<()> {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.surface);
        if let PumpStatus::Exit(_) = status {
            self.surface.close_requested = true;
        }
        if let Some(size) = self.surface.resized.take() {
            self.apply_resize(size)?;
        }
        Ok(())
    }

    fn apply_resize(&mut self, size: PhysicalSize<u32>) -> onac_core::Result<()> {
        if (size.width, size.height) == self.size || size.width == 0 || size.height == 0 {
            return Ok(());
        }
        if let Some(pixels) = self.surface.pixels.as_mut() {
            pixels.resize_surface(size.width, size.height).map_err(display_error)?;
            pixels.resize_buffer(size.width, size.height).map_err(display_error)?;
        }
        self.renderer.resize(size.width, size.height)?;
        self.size = (size.width, size.height);
        info!("Display resized to: {}×{}", size.width, size.height);
        Ok(())
    }

    fn pixels(&mut self) -> onac_core::Result<&mut Pixels<'static>> {
        self.surface
            .pixels
            .as_mut()
            .ok_or_else(|| Error::Display("window is closed".into()))
    }
}

/// Drains input, presents, reads the onset, then drains again. Keys pressed
/// before the present are stamped before the onset so response windows
/// opened on this frame never see them.
fn present_and_stamp<S>(
    state: &mut S,
    mut pump: impl FnMut(&mut S) -> onac_core::Result<()>,
    mut present: impl FnMut(&mut S) -> onac_core::Result<()>,
    now: impl Fn(&S) -> u64,
) -> onac_core::Result<u64> {
    pump(state)?;
    present(state)?;
    let onset = now(state);
    pump(state)?;
    Ok(onset)
}

fn display_error(e: impl std::fmt::Display) -> Error {
    Error::Display(e.to_string())
}

impl<T: Timer<Timestamp = u64>> Display for WindowDisplay<T> {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw(&mut self, scene: &Scene) -> onac_core::Result<()> {
        let pixels = self
            .surface
            .pixels
            .as_mut()
            .ok_or_else(|| Error::Display("window is closed".into()))?;
        let stats = self.renderer.render_frame(scene, pixels.frame_mut())?;
        debug!(
            "clear {:.3}ms, layers {:.3}ms ({}), copy {:.3}ms, total {:.3}ms",
            stats.clear.as_secs_f64() * 1e3,
            stats.layers.as_secs_f64() * 1e3,
            stats.layer_count,
            stats.copy.as_secs_f64() * 1e3,
            stats.total.as_secs_f64() * 1e3,
        );
        Ok(())
    }

    fn flip(&mut self) -> onac_core::Result<u64> {
        present_and_stamp(
            self,
            Self::pump,
            |display| display.pixels()?.render().map_err(display_error),
            |display| display.surface.timer.now(),
        )
    }

    fn poll_keys(&mut self) -> Vec<KeyEvent> {
        if let Err(e) = self.pump() {
            warn!(error = %e, "event pump failed");
        }
        let mut keys = std::mem::take(&mut self.surface.keys);
        if std::mem::take(&mut self.surface.close_requested) {
            keys.push(KeyEvent {
                key: Key::Escape,
                timestamp_ns: self.surface.timer.now(),
            });
        }
        keys
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        if let Some(window) = &self.surface.window {
            window.set_cursor_visible(visible);
        }
    }

    fn refresh_rate(&self) -> Option<f64> {
        self.surface.refresh_rate
    }

    fn close(&mut self) -> onac_core::Result<()> {
        self.surface.pixels = None;
        if let Some(window) = self.surface.window.take() {
            window.set_visible(false);
        }
        let _ = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.surface);
        Ok(())
    }
}
