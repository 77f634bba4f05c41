//! The on-screen display: a winit window presented through pixels.

pub mod window;

pub use window::{map_key, WindowDisplay, WindowOptions};
