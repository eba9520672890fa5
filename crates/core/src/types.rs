use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Screen-coordinate point in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

/// Screen rectangle the detector is restricted to.
/// Serialized as `[left, top, width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[i64; 4]", into = "[i64; 4]")]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }
}

impl TryFrom<[i64; 4]> for Region {
    type Error = String;

    fn try_from([left, top, width, height]: [i64; 4]) -> Result<Self, Self::Error> {
        let coord = |v: i64| i32::try_from(v).map_err(|_| format!("coordinate {} out of range", v));
        let extent = |v: i64| u32::try_from(v).map_err(|_| format!("invalid region extent {}", v));
        Ok(Region {
            left: coord(left)?,
            top: coord(top)?,
            width: extent(width)?,
            height: extent(height)?,
        })
    }
}

impl From<Region> for [i64; 4] {
    fn from(r: Region) -> Self {
        [r.left as i64, r.top as i64, r.width as i64, r.height as i64]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region {}, {} ({}x{})", self.left, self.top, self.width, self.height)
    }
}

/// Raw pixel data (BGRA), either a screen capture or a reference image
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

impl Frame {
    /// Frame of a single BGRA color.
    pub fn filled(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let data = bgra.iter().copied().cycle().take((width * height * 4) as usize).collect();
        Self { data, width, height, bytes_per_row: width * 4 }
    }

    /// Build a frame from one luminance byte per pixel (row-major).
    pub fn from_gray(width: u32, height: u32, luma: &[u8]) -> Self {
        let data = luma.iter().flat_map(|&v| [v, v, v, 255]).collect();
        Self { data, width, height, bytes_per_row: width * 4 }
    }

    /// Decode an image file (png/jpeg/bmp) into a BGRA frame.
    pub fn load(path: &Path) -> Result<Self> {
        let rgba = image::open(path)
            .with_context(|| format!("failed to open reference image {}", path.display()))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.as_raw())
            .ok_or_else(|| anyhow::anyhow!("decoded image {} has an unexpected size", path.display()))
    }

    /// Swizzle tightly packed RGBA bytes into a BGRA frame. `None` if the
    /// buffer does not hold exactly `width * height` pixels.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Option<Self> {
        if width == 0 || height == 0 || rgba.len() != width as usize * height as usize * 4 {
            return None;
        }
        let data = rgba.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0], p[3]]).collect();
        Some(Self { data, width, height, bytes_per_row: width * 4 })
    }

    /// Luminance of the pixel at (x, y), ITU-R BT.601 weights.
    pub fn luma(&self, x: u32, y: u32) -> f64 {
        let idx = (y * self.bytes_per_row + x * 4) as usize;
        let b = self.data[idx] as f64;
        let g = self.data[idx + 1] as f64;
        let r = self.data[idx + 2] as f64;
        0.299 * r + 0.587 * g + 0.114 * b
    }

    /// Copy a rectangle from `src` into this frame at (x, y).
    pub fn blit(&mut self, src: &Frame, x: u32, y: u32) {
        for row in 0..src.height.min(self.height.saturating_sub(y)) {
            let cols = src.width.min(self.width.saturating_sub(x)) as usize * 4;
            let s = (row * src.bytes_per_row) as usize;
            let d = ((y + row) * self.bytes_per_row + x * 4) as usize;
            self.data[d..d + cols].copy_from_slice(&src.data[s..s + cols]);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Logical hotkey trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Flip between running and idle.
    Toggle,
    /// One detection plus optional execution.
    Action,
}

impl Trigger {
    pub fn label(self) -> &'static str {
        match self {
            Trigger::Toggle => "Toggle",
            Trigger::Action => "Action",
        }
    }
}

/// Where hotkeys are observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotkeyScope {
    /// Only while the application window has focus.
    #[default]
    Focused,
    /// System-wide via the OS key observer.
    Global,
}

impl HotkeyScope {
    pub fn label(self) -> &'static str {
        match self {
            HotkeyScope::Focused => "Focused (in app)",
            HotkeyScope::Global => "Global",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_is_swizzled_to_bgra() {
        let f = Frame::from_rgba(2, 1, &[10, 20, 30, 255, 1, 2, 3, 4]).unwrap();
        assert_eq!(f.data, vec![30, 20, 10, 255, 3, 2, 1, 4]);
        assert_eq!(f.bytes_per_row, 8);
        assert!(Frame::from_rgba(2, 2, &[0; 8]).is_none());
        assert!(Frame::from_rgba(0, 0, &[]).is_none());
    }

    #[test]
    fn region_serializes_as_array() {
        let r = Region { left: 10, top: 20, width: 300, height: 40 };
        assert_eq!(serde_json::to_string(&r).unwrap(), "[10,20,300,40]");
        let back: Region = serde_json::from_str("[10,20,300,40]").unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn region_rejects_negative_extent() {
        assert!(serde_json::from_str::<Region>("[0,0,-5,10]").is_err());
    }

    #[test]
    fn blit_places_pixels() {
        let mut dst = Frame::filled(8, 8, [0, 0, 0, 255]);
        let src = Frame::filled(2, 2, [255, 255, 255, 255]);
        dst.blit(&src, 3, 4);
        assert_eq!(dst.luma(3, 4).round(), 255.0);
        assert_eq!(dst.luma(4, 5).round(), 255.0);
        assert_eq!(dst.luma(2, 4), 0.0);
        assert_eq!(dst.luma(5, 4), 0.0);
    }
}
