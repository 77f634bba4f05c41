use crate::error::Result;
use crate::input::KeyEvent;
use crate::stimulus::Scene;

/// A presentation surface plus the keyboard attached to it.
///
/// Timestamps are nanoseconds on the session timer, so implementations are
/// built with a clone of that timer.
pub trait Display {
    /// Framebuffer size in pixels.
    fn size(&self) -> (u32, u32);

    /// Renders `scene` into the back buffer.
    fn draw(&mut self, scene: &Scene) -> Result<()>;

    /// Presents the back buffer and returns once the refresh has happened.
    /// The returned timestamp is the onset of the presented frame.
    fn flip(&mut self) -> Result<u64>;

    /// Key presses received since the previous call.
    fn poll_keys(&mut self) -> Vec<KeyEvent>;

    fn set_cursor_visible(&mut self, visible: bool);

    /// Refresh rate reported by the monitor, if any.
    fn refresh_rate(&self) -> Option<f64>;

    fn close(&mut self) -> Result<()>;

    /// True when nobody can press keys, so blocking "press any key" screens
    /// should move on by themselves.
    fn auto_advance(&self) -> bool {
        false
    }
}
