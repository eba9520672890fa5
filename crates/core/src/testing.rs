//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::{CoreError, CoreResult};
use crate::platform::*;
use crate::types::*;

/// Hands out the same frame every time, optionally failing a few calls first.
pub struct ScriptedCapture {
    frame: Frame,
    offset: Point,
    failures: AtomicUsize,
    calls: AtomicUsize,
    last_region: Mutex<Option<Option<Region>>>,
}

impl ScriptedCapture {
    pub fn new(frame: Frame, offset: Point) -> Self {
        Self {
            frame,
            offset,
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            last_region: Mutex::new(None),
        }
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Region passed to the most recent call, `None` if never called.
    pub fn last_region(&self) -> Option<Option<Region>> {
        *self.last_region.lock().unwrap()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ScreenCapture for ScriptedCapture {
    fn capture(&self, region: Option<Region>) -> CoreResult<(Frame, Point)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_region.lock().unwrap() = Some(region);
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(CoreError::Capture("scripted failure".into()));
        }
        Ok((self.frame.clone(), self.offset))
    }
}

/// Always reports the same placement; the score can be changed mid-test.
pub struct FixedMatcher {
    score: AtomicU64,
    location: Point,
}

impl FixedMatcher {
    pub fn new(score: f64, location: Point) -> Self {
        Self { score: AtomicU64::new(score.to_bits()), location }
    }

    pub fn set_score(&self, score: f64) {
        self.score.store(score.to_bits(), Ordering::SeqCst);
    }
}

impl Matcher for FixedMatcher {
    fn best_match(&self, _frame: &Frame, _reference: &Frame) -> CoreResult<MatchScore> {
        Ok(MatchScore { score: f64::from_bits(self.score.load(Ordering::SeqCst)), location: self.location })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    MoveTo(Point),
    Click(MouseButton, Point),
    DoubleClick(Point),
    Type(String),
    Keys(Vec<String>),
}

/// Records every injected event in order.
#[derive(Default)]
pub struct RecordingInjector {
    events: Mutex<Vec<InputEvent>>,
    calls: AtomicUsize,
    fail_at: Mutex<Option<usize>>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Make the n-th call (0-based) fail without recording it.
    pub fn fail_on_call(&self, n: usize) {
        *self.fail_at.lock().unwrap() = Some(n);
    }

    fn record(&self, event: InputEvent) -> CoreResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_at.lock().unwrap() == Some(call) {
            return Err(CoreError::Injection("injected failure".into()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl InputInjector for RecordingInjector {
    fn move_to(&self, at: Point) -> CoreResult<()> {
        self.record(InputEvent::MoveTo(at))
    }

    fn click(&self, button: MouseButton, at: Point) -> CoreResult<()> {
        self.record(InputEvent::Click(button, at))
    }

    fn double_click(&self, at: Point) -> CoreResult<()> {
        self.record(InputEvent::DoubleClick(at))
    }

    fn type_text(&self, text: &str) -> CoreResult<()> {
        self.record(InputEvent::Type(text.to_string()))
    }

    fn press_keys(&self, chord: &[String]) -> CoreResult<()> {
        self.record(InputEvent::Keys(chord.to_vec()))
    }
}

/// Fake OS key observer. `fire` plays the role of the OS thread.
#[derive(Default)]
pub struct CountingKeys {
    next: AtomicU64,
    active: Mutex<HashMap<u64, (String, HotkeyCallback)>>,
    registrations: AtomicUsize,
    fail_key: Mutex<Option<String>>,
}

impl CountingKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse registration of `key` from now on.
    pub fn fail_on(&self, key: &str) {
        *self.fail_key.lock().unwrap() = Some(key.to_string());
    }

    pub fn active(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.active.lock().unwrap().values().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn fire(&self, key: &str) {
        let active = self.active.lock().unwrap();
        for (k, cb) in active.values() {
            if k == key {
                cb();
            }
        }
    }
}

impl GlobalKeys for CountingKeys {
    fn register(&self, key: &str, callback: HotkeyCallback) -> CoreResult<HotkeyHandle> {
        if self.fail_key.lock().unwrap().as_deref() == Some(key) {
            return Err(CoreError::Configuration(format!("cannot register {}", key)));
        }
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.active.lock().unwrap().insert(id, (key.to_string(), callback));
        Ok(HotkeyHandle(id))
    }

    fn unregister(&self, handle: HotkeyHandle) {
        self.active.lock().unwrap().remove(&handle.0);
    }
}

/// Drag listener returning a canned result, optionally only after `release`.
pub struct ScriptedDrag {
    result: Option<(Point, Point)>,
    error: Option<String>,
    gated: bool,
    permits: Mutex<usize>,
    cv: Condvar,
}

impl ScriptedDrag {
    pub fn new(result: CoreResult<Option<(Point, Point)>>) -> Self {
        let (result, error) = match result {
            Ok(r) => (r, None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self { result, error, gated: false, permits: Mutex::new(0), cv: Condvar::new() }
    }

    /// Like `new`, but every call blocks until `release` is called once.
    pub fn blocking(result: CoreResult<Option<(Point, Point)>>) -> Self {
        Self { gated: true, ..Self::new(result) }
    }

    pub fn release(&self) {
        *self.permits.lock().unwrap() += 1;
        self.cv.notify_all();
    }
}

impl DragListener for ScriptedDrag {
    fn await_click_pair(&self) -> CoreResult<Option<(Point, Point)>> {
        if self.gated {
            let mut permits = self.permits.lock().unwrap();
            while *permits == 0 {
                permits = self.cv.wait(permits).unwrap();
            }
            *permits -= 1;
        }
        match &self.error {
            Some(e) => Err(CoreError::Capture(e.clone())),
            None => Ok(self.result),
        }
    }
}
