use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::platform::{MatchScore, Matcher, ScreenCapture};
use crate::types::{Frame, Point, Region};

/// Result of one capture-and-score pass
#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    Match { center: Point, score: f64 },
    NoMatch { score: f64 },
    /// Capture or scoring failed; the caller backs off and retries.
    CaptureFailed { reason: String },
}

/// Similarity threshold in [0, 1], shared between the interactive thread
/// and the automation worker.
#[derive(Debug)]
pub struct Threshold(AtomicU64);

impl Threshold {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.clamp(0.0, 1.0).to_bits()))
    }

    pub fn from_percent(percent: u8) -> Self {
        Self::new(percent as f64 / 100.0)
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }
}

/// Turn a raw score into an outcome. `score == threshold` is a match.
/// The center is `offset + location + reference_size / 2` per axis.
pub fn classify(m: MatchScore, threshold: f64, offset: Point, reference: (u32, u32)) -> DetectOutcome {
    if m.score >= threshold {
        let (w, h) = reference;
        let center = Point::new(
            offset.x + m.location.x + (w / 2) as i32,
            offset.y + m.location.y + (h / 2) as i32,
        );
        DetectOutcome::Match { center, score: m.score }
    } else {
        DetectOutcome::NoMatch { score: m.score }
    }
}

/// Capture → score → classify. Stateless apart from the shared threshold.
#[derive(Clone)]
pub struct Detector {
    capture: Arc<dyn ScreenCapture>,
    matcher: Arc<dyn Matcher>,
    threshold: Arc<Threshold>,
}

impl Detector {
    pub fn new(capture: Arc<dyn ScreenCapture>, matcher: Arc<dyn Matcher>, threshold: Arc<Threshold>) -> Self {
        Self { capture, matcher, threshold }
    }

    pub fn threshold(&self) -> &Arc<Threshold> {
        &self.threshold
    }

    pub fn detect_once(&self, reference: &Frame, region: Option<Region>) -> DetectOutcome {
        let (frame, offset) = match self.capture.capture(region) {
            Ok(v) => v,
            Err(e) => return DetectOutcome::CaptureFailed { reason: e.to_string() },
        };
        match self.matcher.best_match(&frame, reference) {
            Ok(m) => classify(m, self.threshold.get(), offset, (reference.width, reference.height)),
            Err(e) => DetectOutcome::CaptureFailed { reason: e.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedMatcher, ScriptedCapture};

    fn detector(score: f64, location: Point, offset: Point, threshold: f64) -> (Detector, Arc<ScriptedCapture>) {
        let capture = Arc::new(ScriptedCapture::new(Frame::filled(400, 300, [0, 0, 0, 255]), offset));
        let matcher = Arc::new(FixedMatcher::new(score, location));
        let det = Detector::new(capture.clone(), matcher, Arc::new(Threshold::new(threshold)));
        (det, capture)
    }

    #[test]
    fn boundary_score_is_a_match() {
        for t in [0.0, 0.35, 0.8, 0.95, 1.0] {
            let m = MatchScore { score: t, location: Point::default() };
            assert!(matches!(classify(m, t, Point::default(), (2, 2)), DetectOutcome::Match { .. }), "t={}", t);
        }
    }

    #[test]
    fn match_iff_score_reaches_threshold() {
        let thresholds = [0.0, 0.25, 0.5, 0.8, 1.0];
        let scores = [0.0, 0.1, 0.249, 0.25, 0.5, 0.79, 0.8, 0.81, 0.99, 1.0];
        for &t in &thresholds {
            for &s in &scores {
                let m = MatchScore { score: s, location: Point::default() };
                let is_match = matches!(classify(m, t, Point::default(), (1, 1)), DetectOutcome::Match { .. });
                assert_eq!(is_match, s >= t, "s={} t={}", s, t);
            }
        }
    }

    #[test]
    fn center_of_40x30_reference() {
        let (det, _) = detector(1.0, Point::new(200, 150), Point::new(0, 0), 0.8);
        let reference = Frame::filled(40, 30, [0, 0, 0, 255]);
        assert_eq!(
            det.detect_once(&reference, None),
            DetectOutcome::Match { center: Point::new(220, 165), score: 1.0 }
        );
    }

    #[test]
    fn center_includes_region_offset_and_floors() {
        let (det, capture) = detector(0.9, Point::new(5, 7), Point::new(100, 50), 0.8);
        let reference = Frame::filled(11, 9, [0, 0, 0, 255]);
        let region = Region { left: 100, top: 50, width: 400, height: 300 };
        assert_eq!(
            det.detect_once(&reference, Some(region)),
            DetectOutcome::Match { center: Point::new(110, 61), score: 0.9 }
        );
        assert_eq!(capture.last_region(), Some(Some(region)));
    }

    #[test]
    fn below_threshold_reports_score() {
        let (det, _) = detector(0.42, Point::default(), Point::default(), 0.8);
        let reference = Frame::filled(4, 4, [0, 0, 0, 255]);
        assert_eq!(det.detect_once(&reference, None), DetectOutcome::NoMatch { score: 0.42 });
    }

    #[test]
    fn capture_error_is_not_fatal() {
        let (det, capture) = detector(1.0, Point::default(), Point::default(), 0.8);
        capture.fail_next(1);
        let reference = Frame::filled(4, 4, [0, 0, 0, 255]);
        assert!(matches!(det.detect_once(&reference, None), DetectOutcome::CaptureFailed { .. }));
        assert!(matches!(det.detect_once(&reference, None), DetectOutcome::Match { .. }));
    }

    #[test]
    fn threshold_is_clamped() {
        let t = Threshold::new(1.7);
        assert_eq!(t.get(), 1.0);
        t.set(-0.2);
        assert_eq!(t.get(), 0.0);
        assert_eq!(Threshold::from_percent(80).get(), 0.8);
    }
}
