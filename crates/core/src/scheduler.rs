use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::actions::ActionItem;
use crate::detect::{DetectOutcome, Detector, Threshold};
use crate::executor::{execute, ExecOutcome};
use crate::logger;
use crate::platform::InputInjector;
use crate::region::RegionSlot;
use crate::sleep::{sleep_interruptible, CancelToken, POLL_INTERVAL};
use crate::status::StatusSender;
use crate::types::{Frame, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunPhase {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl RunPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunPhase::Running,
            2 => RunPhase::Stopping,
            _ => RunPhase::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RunPhase::Idle => "Idle",
            RunPhase::Running => "Running",
            RunPhase::Stopping => "Stopping",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartResult {
    Started,
    AlreadyRunning,
    NoReference,
    ManualBusy,
    SpawnFailed,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Pause between detection cycles.
    pub loop_delay: Duration,
    /// Pause after a failed capture.
    pub failure_backoff: Duration,
    /// Upper bound on `stop(true)`.
    pub stop_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            loop_delay: Duration::from_millis(250),
            failure_backoff: Duration::from_millis(300),
            stop_timeout: Duration::from_secs(2),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    phase: AtomicU8,
    cancel: CancelToken,
    detector: Detector,
    input: Arc<dyn InputInjector>,
    reference: Mutex<Option<Arc<Frame>>>,
    sequence: Mutex<Arc<[ActionItem]>>,
    region: RegionSlot,
    status: StatusSender,
    loop_delay: Duration,
    failure_backoff: Duration,
    stop_timeout: Duration,
    manual_busy: AtomicBool,
}

impl Shared {
    fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn reference(&self) -> Option<Arc<Frame>> {
        lock(&self.reference).clone()
    }

    fn sequence(&self) -> Arc<[ActionItem]> {
        Arc::clone(&lock(&self.sequence))
    }

    /// Execute the current sequence at `center` and report a failure.
    fn run_actions(&self, center: Point, token: &CancelToken) -> ExecOutcome {
        let sequence = self.sequence();
        let outcome = execute(&sequence, center, token, self.input.as_ref());
        if let ExecOutcome::Failed { step, reason } = &outcome {
            let label = sequence.get(*step).map(|a| a.kind.label()).unwrap_or("?");
            self.status.publish(format!("Action '{}' failed: {}", label, reason));
        }
        outcome
    }

    fn publish_detection(&self, outcome: &DetectOutcome) {
        match outcome {
            DetectOutcome::Match { center, score } => {
                self.status.publish(format!("Match {:.1}% at {}", score * 100.0, center))
            }
            DetectOutcome::NoMatch { score } => {
                self.status.publish(format!("No match ({:.1}%).", score * 100.0))
            }
            DetectOutcome::CaptureFailed { reason } => {
                self.status.publish(format!("Detection failed: {}", reason))
            }
        }
    }
}

/// Stores Idle when the worker exits, however it exits.
struct IdleOnExit<'a>(&'a Shared);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) {
        self.0.phase.store(RunPhase::Idle as u8, Ordering::Release);
        logger::info_p("sched", "worker exited");
    }
}

fn worker_loop(shared: &Shared) {
    let _idle = IdleOnExit(shared);
    let token = &shared.cancel;

    while !token.is_cancelled() {
        let Some(reference) = shared.reference() else {
            shared.status.publish("No reference image loaded.");
            if !sleep_interruptible(shared.failure_backoff, token) {
                break;
            }
            continue;
        };

        let outcome = shared.detector.detect_once(&reference, shared.region.get());
        shared.publish_detection(&outcome);
        let pause = match outcome {
            DetectOutcome::CaptureFailed { .. } => shared.failure_backoff,
            DetectOutcome::NoMatch { .. } => shared.loop_delay,
            DetectOutcome::Match { center, .. } => {
                if shared.run_actions(center, token) == ExecOutcome::Cancelled {
                    break;
                }
                shared.loop_delay
            }
        };

        if !sleep_interruptible(pause, token) {
            break;
        }
    }
}

/// Owns the automation worker. Every method is callable from the
/// interactive thread; the worker only reads shared state.
pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        detector: Detector,
        input: Arc<dyn InputInjector>,
        region: RegionSlot,
        status: StatusSender,
        config: SchedulerConfig,
    ) -> Self {
        logger::register_prefix("sched", logger::COLOR_GREEN);
        logger::register_prefix("exec", logger::COLOR_GRAY);
        let shared = Shared {
            phase: AtomicU8::new(RunPhase::Idle as u8),
            cancel: CancelToken::new(),
            detector,
            input,
            reference: Mutex::new(None),
            sequence: Mutex::new(Arc::from(Vec::<ActionItem>::new())),
            region,
            status: status.scoped("sched"),
            loop_delay: config.loop_delay,
            failure_backoff: config.failure_backoff,
            stop_timeout: config.stop_timeout,
            manual_busy: AtomicBool::new(false),
        };
        Self { shared: Arc::new(shared), worker: Mutex::new(None) }
    }

    pub fn phase(&self) -> RunPhase {
        self.shared.phase()
    }

    pub fn is_running(&self) -> bool {
        self.phase() == RunPhase::Running
    }

    pub fn manual_busy(&self) -> bool {
        self.shared.manual_busy.load(Ordering::Acquire)
    }

    pub fn threshold(&self) -> &Arc<Threshold> {
        self.shared.detector.threshold()
    }

    pub fn set_reference(&self, frame: Frame) {
        *lock(&self.shared.reference) = Some(Arc::new(frame));
    }

    pub fn clear_reference(&self) {
        *lock(&self.shared.reference) = None;
    }

    pub fn reference(&self) -> Option<Arc<Frame>> {
        self.shared.reference()
    }

    /// Takes effect at the next execution; a run in progress keeps its copy.
    pub fn set_sequence(&self, sequence: Arc<[ActionItem]>) {
        *lock(&self.shared.sequence) = sequence;
    }

    pub fn start(&self) -> StartResult {
        let mut worker = lock(&self.worker);
        if self.shared.reference().is_none() {
            self.shared.status.publish("Load a reference image first.");
            return StartResult::NoReference;
        }
        if self.manual_busy() {
            self.shared.status.publish("Manual action in progress.");
            return StartResult::ManualBusy;
        }
        if self
            .shared
            .phase
            .compare_exchange(RunPhase::Idle as u8, RunPhase::Running as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return StartResult::AlreadyRunning;
        }

        // previous worker already stored Idle, so it is at most a few
        // instructions from returning
        if let Some(old) = worker.take() {
            old.join().ok();
        }

        self.shared.cancel.reset();
        let shared = Arc::clone(&self.shared);
        match thread::Builder::new().name("automation".into()).spawn(move || worker_loop(&shared)) {
            Ok(handle) => {
                *worker = Some(handle);
                self.shared.status.publish("Automation running...");
                StartResult::Started
            }
            Err(e) => {
                self.shared.phase.store(RunPhase::Idle as u8, Ordering::Release);
                self.shared.status.publish(format!("Automation error: {}", e));
                StartResult::SpawnFailed
            }
        }
    }

    /// Cancel the worker. With `wait`, block until it exits (bounded by
    /// the stop timeout); otherwise the worker finishes the transition.
    pub fn stop(&self, wait: bool) {
        let mut worker = lock(&self.worker);
        self.shared.cancel.cancel();
        self.shared
            .phase
            .compare_exchange(RunPhase::Running as u8, RunPhase::Stopping as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok();
        if !wait {
            return;
        }

        if let Some(handle) = worker.take() {
            let deadline = Instant::now() + self.shared.stop_timeout;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(POLL_INTERVAL);
            }
            if handle.is_finished() {
                handle.join().ok();
            } else {
                logger::warn_p("sched", "worker did not stop in time, detaching");
            }
        }
        self.shared.status.publish("Automation stopped.");
    }

    pub fn toggle(&self) {
        match self.phase() {
            RunPhase::Running => self.stop(false),
            RunPhase::Idle => {
                self.start();
            }
            RunPhase::Stopping => self.shared.status.publish("Automation is stopping..."),
        }
    }

    /// One detection plus optional execution on a detached thread. Only
    /// allowed while idle.
    pub fn run_once(&self) -> bool {
        if self.phase() != RunPhase::Idle {
            self.shared.status.publish("Stop automation before running manual action.");
            return false;
        }
        let Some(reference) = self.shared.reference() else {
            self.shared.status.publish("Unable to run detection (load a reference image first).");
            return false;
        };
        if self
            .shared
            .manual_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.shared.status.publish("Manual action in progress.");
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new().name("manual-run".into()).spawn(move || {
            let outcome = shared.detector.detect_once(&reference, shared.region.get());
            shared.publish_detection(&outcome);
            if let DetectOutcome::Match { center, .. } = outcome {
                shared.run_actions(center, &CancelToken::never());
            }
            shared.manual_busy.store(false, Ordering::Release);
        });
        if let Err(e) = spawned {
            self.shared.manual_busy.store(false, Ordering::Release);
            self.shared.status.publish(format!("Automation error: {}", e));
            return false;
        }
        true
    }
}
