//! Interactive search-region selection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::logger;
use crate::platform::DragListener;
use crate::status::StatusSender;
use crate::types::{Point, Region};

/// Drags narrower or shorter than this fall back to full screen.
pub const MIN_REGION_SIZE: u32 = 10;

/// Current search region, `None` = full screen. The detector copies it
/// out before each capture; the render path keeps its own copy.
#[derive(Debug, Clone, Default)]
pub struct RegionSlot(Arc<Mutex<Option<Region>>>);

impl RegionSlot {
    pub fn get(&self) -> Option<Region> {
        *self.lock()
    }

    pub fn set(&self, region: Option<Region>) {
        *self.lock() = region;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Region>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionEvent {
    Selected(Region),
    TooSmall,
    Cancelled,
    Failed(String),
}

/// Normalised rectangle spanned by two corners, or `None` if either
/// side is below `MIN_REGION_SIZE`.
pub fn normalize(a: Point, b: Point) -> Option<Region> {
    let width = a.x.abs_diff(b.x);
    let height = a.y.abs_diff(b.y);
    if width < MIN_REGION_SIZE || height < MIN_REGION_SIZE {
        return None;
    }
    Some(Region { left: a.x.min(b.x), top: a.y.min(b.y), width, height })
}

/// Runs at most one drag selection at a time on a detached worker.
pub struct RegionCapture {
    in_progress: Arc<AtomicBool>,
    tx: mpsc::Sender<RegionEvent>,
    rx: mpsc::Receiver<RegionEvent>,
    status: StatusSender,
}

impl RegionCapture {
    pub fn new(status: StatusSender) -> Self {
        logger::register_prefix("region", logger::COLOR_BLUE);
        let (tx, rx) = mpsc::channel();
        Self { in_progress: Arc::new(AtomicBool::new(false)), tx, rx, status: status.scoped("region") }
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Start listening for a drag. Returns false if one is already running.
    pub fn begin_selection(&self, listener: Arc<dyn DragListener>) -> bool {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.status.publish("Drag with left mouse to set search region...");

        let in_progress = Arc::clone(&self.in_progress);
        let tx = self.tx.clone();
        let status = self.status.clone();
        let spawned = thread::Builder::new().name("region-select".into()).spawn(move || {
            let event = match listener.await_click_pair() {
                Ok(Some((press, release))) => match normalize(press, release) {
                    Some(region) => {
                        status.publish(format!(
                            "Region set to ({}, {}) size {}x{}.",
                            region.left, region.top, region.width, region.height
                        ));
                        RegionEvent::Selected(region)
                    }
                    None => {
                        status.publish("Region too small. Using full screen.");
                        RegionEvent::TooSmall
                    }
                },
                Ok(None) => {
                    status.publish("Region selection cancelled.");
                    RegionEvent::Cancelled
                }
                Err(e) => {
                    status.publish(format!("Region selection failed: {}", e));
                    RegionEvent::Failed(e.to_string())
                }
            };
            in_progress.store(false, Ordering::Release);
            tx.send(event).ok();
        });

        if let Err(e) = spawned {
            self.in_progress.store(false, Ordering::Release);
            self.status.publish(format!("Region selection failed: {}", e));
            return false;
        }
        true
    }

    /// Apply a finished selection to `slot`. Called once per tick by the
    /// interactive loop.
    pub fn poll(&self, slot: &RegionSlot) -> Option<RegionEvent> {
        let event = self.rx.try_recv().ok()?;
        match &event {
            RegionEvent::Selected(region) => slot.set(Some(*region)),
            RegionEvent::TooSmall => slot.set(None),
            RegionEvent::Cancelled | RegionEvent::Failed(_) => {}
        }
        Some(event)
    }

    pub fn use_full_screen(&self, slot: &RegionSlot) {
        slot.set(None);
        self.status.publish("Search mode set to full screen.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status;
    use crate::testing::ScriptedDrag;
    use std::time::{Duration, Instant};

    fn wait_for_event(capture: &RegionCapture, slot: &RegionSlot) -> RegionEvent {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(ev) = capture.poll(slot) {
                return ev;
            }
            assert!(Instant::now() < deadline, "no region event");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn slot_survives_a_poisoned_lock() {
        let slot = RegionSlot::default();
        let inner = slot.clone();
        let _ = thread::spawn(move || {
            let _guard = inner.0.lock().unwrap();
            panic!("poison the slot");
        })
        .join();
        assert!(slot.0.is_poisoned());

        let region = Region { left: 1, top: 2, width: 30, height: 40 };
        slot.set(Some(region));
        assert_eq!(slot.get(), Some(region));
    }

    #[test]
    fn normalizes_any_drag_direction() {
        let r = normalize(Point::new(300, 250), Point::new(100, 50)).unwrap();
        assert_eq!(r, Region { left: 100, top: 50, width: 200, height: 200 });
    }

    #[test]
    fn small_drags_are_discarded() {
        assert!(normalize(Point::new(0, 0), Point::new(9, 100)).is_none());
        assert!(normalize(Point::new(0, 0), Point::new(100, 9)).is_none());
        assert!(normalize(Point::new(0, 0), Point::new(10, 10)).is_some());
    }

    #[test]
    fn selection_publishes_region() {
        let (tx, mut board) = status::channel();
        let capture = RegionCapture::new(tx);
        let slot = RegionSlot::default();
        let drag = Arc::new(ScriptedDrag::new(Ok(Some((Point::new(50, 60), Point::new(10, 20))))));
        assert!(capture.begin_selection(drag));
        let ev = wait_for_event(&capture, &slot);
        assert_eq!(ev, RegionEvent::Selected(Region { left: 10, top: 20, width: 40, height: 40 }));
        assert_eq!(slot.get(), Some(Region { left: 10, top: 20, width: 40, height: 40 }));
        assert!(!capture.in_progress());
        board.drain();
        assert_eq!(board.current(), "Region set to (10, 20) size 40x40.");
    }

    #[test]
    fn too_small_resets_to_full_screen() {
        let (tx, _board) = status::channel();
        let capture = RegionCapture::new(tx);
        let slot = RegionSlot::default();
        slot.set(Some(Region { left: 0, top: 0, width: 50, height: 50 }));
        let drag = Arc::new(ScriptedDrag::new(Ok(Some((Point::new(0, 0), Point::new(3, 3))))));
        assert!(capture.begin_selection(drag));
        assert_eq!(wait_for_event(&capture, &slot), RegionEvent::TooSmall);
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn second_selection_rejected_while_first_runs() {
        let (tx, _board) = status::channel();
        let capture = RegionCapture::new(tx);
        let slot = RegionSlot::default();
        let drag = Arc::new(ScriptedDrag::blocking(Ok(Some((Point::new(0, 0), Point::new(40, 40))))));
        assert!(capture.begin_selection(drag.clone()));
        assert!(!capture.begin_selection(drag.clone()));
        drag.release();
        assert!(matches!(wait_for_event(&capture, &slot), RegionEvent::Selected(_)));
        assert!(capture.begin_selection(drag.clone()));
        drag.release();
        wait_for_event(&capture, &slot);
    }

    #[test]
    fn cancelled_listener_keeps_region() {
        let (tx, _board) = status::channel();
        let capture = RegionCapture::new(tx);
        let slot = RegionSlot::default();
        let kept = Region { left: 1, top: 2, width: 30, height: 40 };
        slot.set(Some(kept));
        assert!(capture.begin_selection(Arc::new(ScriptedDrag::new(Ok(None)))));
        assert_eq!(wait_for_event(&capture, &slot), RegionEvent::Cancelled);
        assert_eq!(slot.get(), Some(kept));
    }
}
