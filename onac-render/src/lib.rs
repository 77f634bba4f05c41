pub mod render;

pub use render::{
    load_font, load_image_pixmap, render_checkerboard_pixmap, render_text_pixmap, FrameStats,
    Renderer, SkiaRenderer,
};
