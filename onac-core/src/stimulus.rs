use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Straight (non-premultiplied) RGBA.
pub type Rgba = [u8; 4];

pub const BLACK: Rgba = [0, 0, 0, 255];
pub const WHITE: Rgba = [255, 255, 255, 255];
pub const GREY: Rgba = [128, 128, 128, 255];

/// Converts a signed colour in -1..=1 per channel, as used in the config and
/// stimulus tables, to 8-bit RGBA.
pub fn signed_rgb(r: f32, g: f32, b: f32) -> Rgba {
    let to_u8 = |v: f32| (((v.clamp(-1.0, 1.0) + 1.0) * 0.5) * 255.0).round() as u8;
    [to_u8(r), to_u8(g), to_u8(b), 255]
}

/// Pixel offset from the window centre, y pointing up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const CENTRE: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Maps normalized window units (-1..=1 on each axis) to pixels.
    pub fn from_norm(x: f32, y: f32, size: (u32, u32)) -> Self {
        Self {
            x: x * size.0 as f32 * 0.5,
            y: y * size.1 as f32 * 0.5,
        }
    }
}

/// Contrast-reversing radial checkerboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkerboard {
    pub radius: f32,
    pub radial_cycles: u32,
    pub angular_cycles: u32,
    /// Visible wedge in degrees, clockwise from 12 o'clock.
    pub wedge: (f32, f32),
    pub position: Position,
    /// Swaps black and white squares.
    pub inverted: bool,
}

impl Checkerboard {
    /// +1 or -1 for a pixel at `(dx, dy)` from the board centre (y up), or
    /// `None` outside the disc or the visible wedge.
    pub fn sample(&self, dx: f32, dy: f32) -> Option<i8> {
        let r = (dx * dx + dy * dy).sqrt();
        if r > self.radius {
            return None;
        }
        let mut angle = dx.atan2(dy).to_degrees();
        if angle < 0.0 {
            angle += 360.0;
        }
        let (start, end) = self.wedge;
        let visible = if end - start >= 360.0 {
            true
        } else {
            let s = start.rem_euclid(360.0);
            let e = end.rem_euclid(360.0);
            if (end - start).abs() < f32::EPSILON {
                false
            } else if s < e {
                angle >= s && angle < e
            } else {
                angle >= s || angle < e
            }
        };
        if !visible {
            return None;
        }
        let radial = ((r / self.radius) * self.radial_cycles as f32 * 2.0).floor() as i64;
        let angular = ((angle / 360.0) * self.angular_cycles as f32 * 2.0).floor() as i64;
        let mut value = if (radial + angular) % 2 == 0 { 1 } else { -1 };
        if self.inverted {
            value = -value;
        }
        Some(value)
    }
}

/// One drawable element of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Stimulus {
    Text {
        content: String,
        height: f32,
        color: Rgba,
        position: Position,
    },
    /// A `+` cross of `size` pixels.
    Fixation { size: f32, color: Rgba },
    Image {
        path: PathBuf,
        /// Target size in pixels; `None` keeps the decoded size.
        size: Option<(u32, u32)>,
        position: Position,
    },
    Checkerboard(Checkerboard),
    Dot {
        position: Position,
        diameter: f32,
        color: Rgba,
    },
}

impl Stimulus {
    pub fn text(content: impl Into<String>, height: f32, color: Rgba) -> Self {
        Stimulus::Text {
            content: content.into(),
            height,
            color,
            position: Position::CENTRE,
        }
    }

    pub fn image(path: impl Into<PathBuf>, size: Option<(u32, u32)>) -> Self {
        Stimulus::Image {
            path: path.into(),
            size,
            position: Position::CENTRE,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Stimulus::Text { .. })
    }
}

/// Everything drawn for one refresh: a background fill plus layers, back to front.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub background: Rgba,
    pub layers: Vec<Stimulus>,
}

impl Scene {
    pub fn blank(background: Rgba) -> Self {
        Self {
            background,
            layers: Vec::new(),
        }
    }

    pub fn with(mut self, stimulus: Stimulus) -> Self {
        self.layers.push(stimulus);
        self
    }

    pub fn push(&mut self, stimulus: Stimulus) {
        self.layers.push(stimulus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(wedge: (f32, f32)) -> Checkerboard {
        Checkerboard {
            radius: 100.0,
            radial_cycles: 6,
            angular_cycles: 12,
            wedge,
            position: Position::CENTRE,
            inverted: false,
        }
    }

    #[test]
    fn signed_colours_map_to_bytes() {
        assert_eq!(signed_rgb(-1.0, -1.0, -1.0), BLACK);
        assert_eq!(signed_rgb(1.0, 1.0, 1.0), WHITE);
        assert_eq!(signed_rgb(0.0, 0.0, 0.0), [128, 128, 128, 255]);
    }

    #[test]
    fn half_wedge_hides_the_right_side() {
        let left_half = board((180.0, 360.0));
        assert!(left_half.sample(-50.0, 0.5).is_some());
        assert!(left_half.sample(50.0, 0.5).is_none());
        assert!(board((0.0, 360.0)).sample(50.0, 0.5).is_some());
    }

    #[test]
    fn inversion_flips_every_square() {
        let normal = board((0.0, 360.0));
        let inverted = Checkerboard {
            inverted: true,
            ..normal.clone()
        };
        for (x, y) in [(10.0, 10.0), (-40.0, 25.0), (3.0, -90.0)] {
            assert_eq!(normal.sample(x, y), inverted.sample(x, y).map(|v| -v));
        }
        assert_eq!(normal.sample(200.0, 0.0), None);
    }

    #[test]
    fn norm_positions_scale_with_the_window() {
        let p = Position::from_norm(0.5, -1.0, (1920, 1080));
        assert_eq!(p, Position::new(480.0, -540.0));
    }
}
