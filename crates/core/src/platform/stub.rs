use std::sync::Arc;

use rand::Rng;

use crate::error::CoreResult;
use crate::logger;
use crate::sleep::sleep_ms;
use crate::types::*;
use super::*;

const MAX_WIDTH: u32 = 640;
const MAX_HEIGHT: u32 = 360;

/// Logs every call instead of touching the OS. Detection scores are random
/// so the scheduler has something to react to.
pub struct StubPlatform {
    capture: Arc<StubCapture>,
    matcher: Arc<dyn Matcher>,
    input: Arc<StubInput>,
    drag: Arc<StubDrag>,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self {
            capture: Arc::new(StubCapture),
            matcher: Arc::new(StubMatcher),
            input: Arc::new(StubInput),
            drag: Arc::new(StubDrag),
        }
    }

}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StubPlatform {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn capture(&self) -> Arc<dyn ScreenCapture> {
        self.capture.clone()
    }

    fn matcher(&self) -> Arc<dyn Matcher> {
        self.matcher.clone()
    }

    fn input(&self) -> Arc<dyn InputInjector> {
        self.input.clone()
    }

    fn drag_listener(&self) -> Option<Arc<dyn DragListener>> {
        Some(self.drag.clone())
    }

    fn global_keys(&self) -> Option<Arc<dyn GlobalKeys>> {
        hotkey::system_keys()
    }

    fn cursor_position(&self) -> Option<Point> {
        Some(Point::new(960, 540))
    }

    fn clipboard_image(&self) -> CoreResult<Option<Frame>> {
        logger::info_p("stub", "clipboard_image()");
        Ok(Some(Frame::filled(40, 30, [0, 0, 255, 255])))
    }
}

struct StubCapture;

impl ScreenCapture for StubCapture {
    fn capture(&self, region: Option<Region>) -> CoreResult<(Frame, Point)> {
        logger::info_p("stub", &format!("capture({:?})", region));
        let (w, h, origin) = match region {
            Some(r) => (r.width.min(MAX_WIDTH), r.height.min(MAX_HEIGHT), r.origin()),
            None => (MAX_WIDTH, MAX_HEIGHT, Point::default()),
        };
        Ok((Frame::filled(w.max(1), h.max(1), [32, 32, 32, 255]), origin))
    }
}

struct StubMatcher;

impl Matcher for StubMatcher {
    fn best_match(&self, frame: &Frame, reference: &Frame) -> CoreResult<MatchScore> {
        let mut rng = rand::thread_rng();
        let max_x = frame.width.saturating_sub(reference.width) as i32;
        let max_y = frame.height.saturating_sub(reference.height) as i32;
        Ok(MatchScore {
            score: rng.gen_range(0.5..1.0),
            location: Point::new(rng.gen_range(0..=max_x), rng.gen_range(0..=max_y)),
        })
    }
}

struct StubInput;

impl InputInjector for StubInput {
    fn move_to(&self, at: Point) -> CoreResult<()> {
        logger::info_p("stub", &format!("move_to({})", at));
        Ok(())
    }

    fn click(&self, button: MouseButton, at: Point) -> CoreResult<()> {
        logger::info_p("stub", &format!("click({:?}, {})", button, at));
        Ok(())
    }

    fn double_click(&self, at: Point) -> CoreResult<()> {
        logger::info_p("stub", &format!("double_click({})", at));
        Ok(())
    }

    fn type_text(&self, text: &str) -> CoreResult<()> {
        logger::info_p("stub", &format!("type_text(\"{}\")", text));
        Ok(())
    }

    fn press_keys(&self, chord: &[String]) -> CoreResult<()> {
        logger::info_p("stub", &format!("press_keys({})", chord.join("+")));
        Ok(())
    }
}

/// Pretends the user dragged across the middle of a 1920x1080 screen.
struct StubDrag;

impl DragListener for StubDrag {
    fn await_click_pair(&self) -> CoreResult<Option<(Point, Point)>> {
        logger::info_p("stub", "await_click_pair()");
        sleep_ms(500);
        Ok(Some((Point::new(480, 270), Point::new(1440, 810))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_is_capped_and_offset() {
        let p = StubPlatform::new();
        let region = Region { left: 100, top: 50, width: 2000, height: 20 };
        let (frame, origin) = p.capture().capture(Some(region)).unwrap();
        assert_eq!((frame.width, frame.height), (640, 20));
        assert_eq!(origin, Point::new(100, 50));
    }

    #[test]
    fn random_scores_stay_in_range() {
        let p = StubPlatform::new();
        let frame = Frame::filled(100, 80, [0, 0, 0, 255]);
        let reference = Frame::filled(10, 10, [0, 0, 0, 255]);
        for _ in 0..50 {
            let m = p.matcher().best_match(&frame, &reference).unwrap();
            assert!((0.5..1.0).contains(&m.score));
            assert!(m.location.x <= 90 && m.location.y <= 70);
        }
    }

    #[test]
    fn ncc_scores_stub_capture_exactly() {
        let p = StubPlatform::new();
        let (frame, _) = p.capture().capture(None).unwrap();
        let same = Frame::filled(8, 8, [32, 32, 32, 255]);
        assert_eq!(crate::matching::NccMatcher.best_match(&frame, &same).unwrap().score, 1.0);
    }

    #[test]
    fn clipboard_holds_a_synthetic_image() {
        let f = StubPlatform::new().clipboard_image().unwrap().unwrap();
        assert_eq!((f.width, f.height), (40, 30));
    }
}
