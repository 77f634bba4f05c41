use ab_glyph::{point, Font, FontVec, Glyph, GlyphId, PxScale, ScaleFont};
use bytemuck::try_cast_slice_mut;
use onac_cache::{intern_text, AssetCache};
use onac_core::stimulus::{BLACK, WHITE};
use onac_core::{Checkerboard, Error, Position, Result, Rgba, Scene, Stimulus};
use onac_timing::{CalibrationStats, HighPrecisionTimer, Timer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Transform,
};
use tracing::debug;

/// Text wider than this share of the window wraps onto a new line.
const WRAP_FRACTION: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextKey {
    intern_id: usize,
    size_bits: u32,
    color: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BoardKey {
    radius_bits: u32,
    radial_cycles: u32,
    angular_cycles: u32,
    wedge_bits: (u32, u32),
    inverted: bool,
}

impl From<&Checkerboard> for BoardKey {
    fn from(b: &Checkerboard) -> Self {
        Self {
            radius_bits: b.radius.to_bits(),
            radial_cycles: b.radial_cycles,
            angular_cycles: b.angular_cycles,
            wedge_bits: (b.wedge.0.to_bits(), b.wedge.1.to_bits()),
            inverted: b.inverted,
        }
    }
}

struct TextCache {
    font: Option<FontVec>,
    wrap_width: f32,
    map: HashMap<TextKey, Option<Arc<Pixmap>>>,
}

impl TextCache {
    fn new(font: Option<FontVec>, wrap_width: f32) -> Self {
        Self {
            font,
            wrap_width,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, text: &str, size_px: f32, color: Rgba) -> Result<Option<Arc<Pixmap>>> {
        let key = TextKey {
            intern_id: intern_text(text),
            size_bits: size_px.to_bits(),
            color,
        };
        if let Some(p) = self.map.get(&key) {
            return Ok(p.clone());
        }
        let font = self.font.as_ref().ok_or_else(|| {
            Error::Display("text stimulus needs a font; set [paths] font in onac.toml".into())
        })?;
        let pm = render_text_pixmap(text, size_px, font, color, self.wrap_width).map(Arc::new);
        debug!(text, size_px, "rasterized text");
        self.map.insert(key, pm.clone());
        Ok(pm)
    }
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).map_err(|e| Error::asset(path, e))?;
    FontVec::try_from_vec(bytes).map_err(|e| Error::asset(path, e))
}

/// Greedy word wrap. Explicit newlines always break.
pub fn wrap_lines(font: &FontVec, scale: PxScale, text: &str, max_width: f32) -> Vec<String> {
    let sf = font.as_scaled(scale);
    let width = |s: &str| s.chars().map(|c| sf.h_advance(font.glyph_id(c))).sum::<f32>();

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate = format!("{line} {word}");
            if width(&candidate) > max_width {
                lines.push(std::mem::replace(&mut line, word.to_string()));
            } else {
                line = candidate;
            }
        }
        lines.push(line);
    }
    lines
}

/// Rasterizes centred, wrapped text into a premultiplied pixmap. `None` when
/// nothing is visible.
pub fn render_text_pixmap(
    text: &str,
    font_size: f32,
    font: &FontVec,
    color: Rgba,
    max_width: f32,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);
    let lines = wrap_lines(font, scale, text, max_width);
    let line_height = sf.height() + sf.line_gap();

    let widths: Vec<f32> = lines
        .iter()
        .map(|l| l.chars().map(|c| sf.h_advance(font.glyph_id(c))).sum())
        .collect();
    let block_width = widths.iter().copied().fold(0.0f32, f32::max);

    // Layout with each baseline at ascent plus whole lines
    let mut glyphs = Vec::<Glyph>::new();
    for (i, line) in lines.iter().enumerate() {
        let mut pen_x = (block_width - widths[i]) * 0.5;
        let baseline = sf.ascent() + i as f32 * line_height;
        let mut prev: Option<GlyphId> = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(p) = prev {
                pen_x += sf.kern(p, id);
            }
            glyphs.push(Glyph {
                id,
                scale,
                position: point(pen_x, baseline),
            });
            pen_x += sf.h_advance(id);
            prev = Some(id);
        }
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize * 4;
    let dst = pm.data_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize * 4;
            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let src = [
                (color[0] as f32 * a) as u8,
                (color[1] as f32 * a) as u8,
                (color[2] as f32 * a) as u8,
                (a * 255.0) as u8,
            ];
            over(&mut dst[i..i + 4], src);
        });
    }

    Some(pm)
}

/// Decodes an image file into a premultiplied pixmap.
pub fn load_image_pixmap(path: &Path) -> Result<Pixmap> {
    let rgba = image::open(path)
        .map_err(|e| Error::asset(path, e))?
        .to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a < 255 {
            for c in &mut px[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
    }
    let size = IntSize::from_wh(w, h).ok_or_else(|| Error::asset(path, "empty image"))?;
    Pixmap::from_vec(data, size).ok_or_else(|| Error::asset(path, "image too large"))
}

/// Rasterizes a checkerboard into an opaque-on-transparent pixmap.
pub fn render_checkerboard_pixmap(board: &Checkerboard) -> Option<Pixmap> {
    let d = (board.radius * 2.0).ceil().max(1.0) as u32;
    let mut pm = Pixmap::new(d, d)?;
    let r = d as f32 * 0.5;
    let data = pm.data_mut();
    for y in 0..d {
        for x in 0..d {
            let dx = x as f32 + 0.5 - r;
            let dy = r - (y as f32 + 0.5);
            if let Some(v) = board.sample(dx, dy) {
                let i = (y * d + x) as usize * 4;
                data[i..i + 4].copy_from_slice(if v > 0 { &WHITE } else { &BLACK });
            }
        }
    }
    Some(pm)
}

/// Porter-Duff over in premultiplied space.
#[inline]
fn over(dst: &mut [u8], src: [u8; 4]) {
    let inv = 255 - src[3] as u32;
    for c in 0..4 {
        dst[c] = (src[c] as u32 + (dst[c] as u32 * inv + 127) / 255).min(255) as u8;
    }
}

fn paint_for(color: Rgba, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.anti_alias = anti_alias;
    paint.set_color(Color::from_rgba8(color[0], color[1], color[2], color[3]));
    paint
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub clear: Duration,
    pub layers: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub layer_count: usize,
}

pub trait Renderer {
    fn clear(&mut self, background: Rgba);
    fn draw_stimulus(&mut self, stimulus: &Stimulus) -> Result<()>;
    /// Draws `scene` and copies the result into an RGBA `frame_buffer`.
    fn render_frame(&mut self, scene: &Scene, frame_buffer: &mut [u8]) -> Result<FrameStats>;
}

pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),

    text_cache: TextCache,
    images: AssetCache<Pixmap>,
    boards: HashMap<BoardKey, Option<Arc<Pixmap>>>,

    canvas: Pixmap,

    // Performance tracking
    clock: HighPrecisionTimer,
    component_timers: HashMap<&'static str, HighPrecisionTimer>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .ok_or_else(|| Error::Display(format!("invalid canvas size {width}x{height}")))?;
        let mut renderer = SkiaRenderer {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            text_cache: TextCache::new(None, width as f32 * WRAP_FRACTION),
            images: AssetCache::new(),
            boards: HashMap::new(),
            canvas,
            clock: HighPrecisionTimer::new(),
            component_timers: ["clear", "layers", "copy", "total"]
                .iter()
                .map(|&k| (k, HighPrecisionTimer::new()))
                .collect(),
        };
        renderer.clear(BLACK);
        Ok(renderer)
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.text_cache = TextCache::new(Some(font), self.width as f32 * WRAP_FRACTION);
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width, new_height).ok_or_else(|| {
            Error::Display(format!("invalid canvas size {new_width}x{new_height}"))
        })?;
        self.width = new_width;
        self.height = new_height;
        self.center = (new_width as f32 / 2.0, new_height as f32 / 2.0);
        self.text_cache.wrap_width = new_width as f32 * WRAP_FRACTION;
        self.text_cache.map.clear();
        Ok(())
    }

    /// Frame-time statistics for one stage: `clear`, `layers`, `copy` or `total`.
    pub fn stage_stats(&self, stage: &str) -> Option<CalibrationStats> {
        self.component_timers.get(stage).map(|t| t.calibration_stats())
    }

    fn to_canvas(&self, p: Position) -> (f32, f32) {
        (self.center.0 + p.x, self.center.1 - p.y)
    }

    /// Composites `pm` centred on canvas point `pos`.
    pub fn blit(&mut self, pm: &Pixmap, pos: (f32, f32)) {
        let w = pm.width() as i32;
        let h = pm.height() as i32;
        let (cw, ch) = (self.width as i32, self.height as i32);

        let x0 = (pos.0 - w as f32 * 0.5).floor() as i32;
        let y0 = (pos.1 - h as f32 * 0.5).floor() as i32;

        // Cull fully off-screen
        if x0 + w <= 0 || y0 + h <= 0 || x0 >= cw || y0 >= ch {
            return;
        }

        let dst_x = x0.max(0) as usize;
        let dst_y = y0.max(0) as usize;
        let src_x = (-x0).max(0) as usize;
        let src_y = (-y0).max(0) as usize;
        let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
        let copy_h = (h as usize - src_y).min(ch as usize - dst_y);

        let src = pm.data();
        let src_stride = pm.width() as usize * 4;
        let dst_stride = self.width as usize * 4;
        let dst = self.canvas.data_mut();

        let fully_opaque = (0..copy_h).all(|row| {
            let start = (src_y + row) * src_stride + src_x * 4;
            src[start..start + copy_w * 4]
                .iter()
                .skip(3)
                .step_by(4)
                .all(|&a| a == 255)
        });

        for row in 0..copy_h {
            let s = (src_y + row) * src_stride + src_x * 4;
            let d = (dst_y + row) * dst_stride + dst_x * 4;
            let src_row = &src[s..s + copy_w * 4];
            let dst_row = &mut dst[d..d + copy_w * 4];
            if fully_opaque {
                dst_row.copy_from_slice(src_row);
            } else {
                for (dp, sp) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                    if sp[3] != 0 {
                        over(dp, [sp[0], sp[1], sp[2], sp[3]]);
                    }
                }
            }
        }
    }

    fn draw_fixation(&mut self, size: f32, color: Rgba) {
        let thickness = (size * 0.05).max(2.0);
        let (cx, cy) = self.center;
        let paint = paint_for(color, false);
        if let Some(h) = Rect::from_xywh(cx - size * 0.5, cy - thickness * 0.5, size, thickness) {
            self.canvas.fill_rect(h, &paint, Transform::identity(), None);
        }
        if let Some(v) = Rect::from_xywh(cx - thickness * 0.5, cy - size * 0.5, thickness, size) {
            self.canvas.fill_rect(v, &paint, Transform::identity(), None);
        }
    }

    fn draw_dot(&mut self, position: Position, diameter: f32, color: Rgba) {
        let (cx, cy) = self.to_canvas(position);
        let mut pb = PathBuilder::new();
        pb.push_circle(cx, cy, diameter * 0.5);
        if let Some(path) = pb.finish() {
            self.canvas.fill_path(
                &path,
                &paint_for(color, true),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    fn draw_image(&mut self, path: &Path, size: Option<(u32, u32)>, position: Position) -> Result<()> {
        let key = path.to_string_lossy();
        let pm = self
            .images
            .get_or_try_insert_with(&key, || load_image_pixmap(path))?;
        let (cx, cy) = self.to_canvas(position);
        match size {
            Some((w, h)) if (w, h) != (pm.width(), pm.height()) => {
                let sx = w as f32 / pm.width() as f32;
                let sy = h as f32 / pm.height() as f32;
                let transform =
                    Transform::from_row(sx, 0.0, 0.0, sy, cx - w as f32 * 0.5, cy - h as f32 * 0.5);
                let paint = PixmapPaint {
                    quality: FilterQuality::Bilinear,
                    ..PixmapPaint::default()
                };
                let source: &Pixmap = &pm;
                self.canvas
                    .draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
            }
            _ => self.blit(&pm, (cx, cy)),
        }
        Ok(())
    }

    fn draw_checkerboard(&mut self, board: &Checkerboard) {
        let pm = self
            .boards
            .entry(BoardKey::from(board))
            .or_insert_with(|| render_checkerboard_pixmap(board).map(Arc::new))
            .clone();
        if let Some(pm) = pm {
            let pos = self.to_canvas(board.position);
            self.blit(&pm, pos);
        }
    }
}

impl Renderer for SkiaRenderer {
    fn clear(&mut self, background: Rgba) {
        let px = [background[0], background[1], background[2], 255];
        let data = self.canvas.data_mut();
        match try_cast_slice_mut::<u8, u32>(data) {
            Ok(words) => words.fill(u32::from_ne_bytes(px)),
            Err(_) => data.chunks_exact_mut(4).for_each(|c| c.copy_from_slice(&px)),
        }
    }

    fn draw_stimulus(&mut self, stimulus: &Stimulus) -> Result<()> {
        match stimulus {
            Stimulus::Text {
                content,
                height,
                color,
                position,
            } => {
                if let Some(pm) = self.text_cache.get_or_render(content, *height, *color)? {
                    let pos = self.to_canvas(*position);
                    self.blit(&pm, pos);
                }
            }
            Stimulus::Fixation { size, color } => self.draw_fixation(*size, *color),
            Stimulus::Image {
                path,
                size,
                position,
            } => self.draw_image(path, *size, *position)?,
            Stimulus::Checkerboard(board) => self.draw_checkerboard(board),
            Stimulus::Dot {
                position,
                diameter,
                color,
            } => self.draw_dot(*position, *diameter, *color),
        }
        Ok(())
    }

    fn render_frame(&mut self, scene: &Scene, frame_buffer: &mut [u8]) -> Result<FrameStats> {
        let expected = self.width as usize * self.height as usize * 4;
        if frame_buffer.len() != expected {
            return Err(Error::Display(format!(
                "frame buffer holds {} bytes, canvas needs {expected}",
                frame_buffer.len()
            )));
        }

        let t = self.clock.now();
        self.clear(scene.background);
        let t_clear = self.clock.elapsed(t);

        let t = self.clock.now();
        for layer in &scene.layers {
            self.draw_stimulus(layer)?;
        }
        let t_layers = self.clock.elapsed(t);

        // Canvas is opaque, so premultiplied and straight RGBA agree.
        let t = self.clock.now();
        frame_buffer.copy_from_slice(self.canvas.data());
        let t_copy = self.clock.elapsed(t);

        let total = t_clear + t_layers + t_copy;
        for (stage, d) in [
            ("clear", t_clear),
            ("layers", t_layers),
            ("copy", t_copy),
            ("total", total),
        ] {
            if let Some(timer) = self.component_timers.get_mut(stage) {
                timer.record_frame(d);
            }
        }

        Ok(FrameStats {
            clear: t_clear,
            layers: t_layers,
            copy: t_copy,
            total,
            layer_count: scene.layers.len(),
        })
    }
}
