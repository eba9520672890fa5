pub mod stub;
pub mod hotkey;
pub mod clipboard;

#[cfg(target_os = "macos")]
pub mod darwin;

use std::sync::Arc;

use crate::error::CoreResult;
use crate::types::*;
use crate::logger;

/// Screen grabbing. Returns the frame plus the screen position of its
/// top-left pixel.
pub trait ScreenCapture: Send + Sync {
    fn capture(&self, region: Option<Region>) -> CoreResult<(Frame, Point)>;
}

/// Best placement of `reference` inside `frame`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchScore {
    /// Similarity in [0, 1].
    pub score: f64,
    /// Top-left of the best placement, relative to the frame.
    pub location: Point,
}

/// Template scoring, treated as a black box by the detector.
pub trait Matcher: Send + Sync {
    fn best_match(&self, frame: &Frame, reference: &Frame) -> CoreResult<MatchScore>;
}

/// Synthetic pointer and keyboard events.
pub trait InputInjector: Send + Sync {
    fn move_to(&self, at: Point) -> CoreResult<()>;
    fn click(&self, button: MouseButton, at: Point) -> CoreResult<()>;
    fn double_click(&self, at: Point) -> CoreResult<()>;
    fn type_text(&self, text: &str) -> CoreResult<()>;
    /// Press the keys as one chord, in order, then release them.
    fn press_keys(&self, chord: &[String]) -> CoreResult<()>;
}

pub type HotkeyCallback = Box<dyn Fn() + Send + Sync>;

/// Opaque registration returned by `GlobalKeys::register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyHandle(pub u64);

/// OS-level key observation. Callbacks run on an arbitrary thread.
pub trait GlobalKeys: Send + Sync {
    fn register(&self, key: &str, callback: HotkeyCallback) -> CoreResult<HotkeyHandle>;
    fn unregister(&self, handle: HotkeyHandle);
}

/// Blocking listener for one press/release pair of the left button.
pub trait DragListener: Send + Sync {
    /// `Ok(None)` if the listener stopped before a full pair was seen.
    fn await_click_pair(&self) -> CoreResult<Option<(Point, Point)>>;
}

/// Collaborators bundled for one OS.
pub trait Platform: Send + Sync {
    fn name(&self) -> &'static str;
    fn capture(&self) -> Arc<dyn ScreenCapture>;
    fn matcher(&self) -> Arc<dyn Matcher>;
    fn input(&self) -> Arc<dyn InputInjector>;
    fn drag_listener(&self) -> Option<Arc<dyn DragListener>>;
    fn global_keys(&self) -> Option<Arc<dyn GlobalKeys>>;
    fn cursor_position(&self) -> Option<Point>;

    /// Image currently on the system clipboard, `Ok(None)` if it holds none.
    fn clipboard_image(&self) -> CoreResult<Option<Frame>> {
        clipboard::read_image()
    }
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    logger::register_prefix("hotkey", logger::COLOR_MAGENTA);
    if force_stub {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Box::new(stub::StubPlatform::new());
    }
    #[cfg(target_os = "macos")]
    {
        logger::register_prefix("darwin", logger::COLOR_GRAY);
        return Box::new(darwin::DarwinPlatform::new());
    }
    #[cfg(not(target_os = "macos"))]
    {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        logger::warn("no native capture/input backend for this OS, using stub platform");
        return Box::new(stub::StubPlatform::new());
    }
}
