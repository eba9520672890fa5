use std::path::{Path, PathBuf};
use std::sync::mpsc;

use spotter_core::actions::ActionSequence;
use spotter_core::error::CoreResult;
use spotter_core::hotkeys::{self, HotkeyManager, KeyOutcome};
use spotter_core::persist;
use spotter_core::platform::Platform;
use spotter_core::region::{RegionCapture, RegionEvent, RegionSlot};
use spotter_core::scheduler::{RunPhase, Scheduler};
use spotter_core::settings::{Settings, MAX_SIMILARITY, MIN_SIMILARITY};
use spotter_core::status::{StatusBoard, StatusSender};
use spotter_core::types::{Frame, HotkeyScope, Point, Region, Trigger};

use crate::confirm::ConfirmDialog;
use crate::form::{ActionForm, FormEvent, PathPrompt, PromptPurpose};

pub struct App {
    pub scheduler: Scheduler,
    pub hotkeys: HotkeyManager,
    pub platform: Box<dyn Platform>,
    pub region_capture: RegionCapture,
    pub region: RegionSlot,
    /// Render copy of the region; the slot is only read by the detector.
    pub region_view: Option<Region>,
    pub sequence: ActionSequence,
    pub selected: usize,
    pub form: Option<ActionForm>,
    pub prompt: Option<PathPrompt>,
    pub confirm: Option<ConfirmDialog>,
    pub status: StatusBoard,
    pub status_tx: StatusSender,
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub sequence_path: String,
    pub reference_size: Option<(u32, u32)>,
    pub cursor: Option<Point>,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub should_quit: bool,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: Scheduler,
        hotkeys: HotkeyManager,
        platform: Box<dyn Platform>,
        region: RegionSlot,
        status: StatusBoard,
        status_tx: StatusSender,
        settings: Settings,
        settings_path: PathBuf,
        log_rx: mpsc::Receiver<String>,
    ) -> Self {
        let reference_size = scheduler.reference().map(|f| (f.width, f.height));
        Self {
            scheduler,
            hotkeys,
            platform,
            region_capture: RegionCapture::new(status_tx.clone()),
            region_view: region.get(),
            region,
            sequence: ActionSequence::new(),
            selected: 0,
            form: None,
            prompt: None,
            confirm: None,
            status,
            status_tx,
            settings,
            settings_path,
            sequence_path: "actions.json".to_string(),
            reference_size,
            cursor: None,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            should_quit: false,
        }
    }

    /// Pull everything other threads produced since the last frame.
    pub fn tick(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
        self.status.drain();
        for trigger in self.hotkeys.drain() {
            hotkeys::dispatch(trigger, &self.scheduler);
        }
        if let Some(event) = self.region_capture.poll(&self.region) {
            if matches!(event, RegionEvent::Selected(_) | RegionEvent::TooSmall) {
                self.region_view = self.region.get();
                self.settings.region = self.region_view;
            }
        }
        self.cursor = self.platform.cursor_position();
    }

    /// An overlay owns the keyboard.
    pub fn text_input_active(&self) -> bool {
        self.form.is_some() || self.prompt.is_some()
    }

    pub fn phase(&self) -> RunPhase {
        self.scheduler.phase()
    }

    /// Give the hotkey manager first look at a key. Returns true if the
    /// key was consumed.
    pub fn offer_hotkey(&mut self, key: &str) -> bool {
        let text_focused = self.text_input_active();
        match self.hotkeys.on_key(key, text_focused) {
            KeyOutcome::Ignored => false,
            KeyOutcome::Fired(trigger) => {
                hotkeys::dispatch(trigger, &self.scheduler);
                true
            }
            KeyOutcome::Assigned(..) => {
                self.settings.set_binding(self.hotkeys.binding());
                true
            }
            KeyOutcome::CaptureCancelled => true,
        }
    }

    // -- automation --

    pub fn start_stop(&mut self) {
        match self.phase() {
            RunPhase::Idle => {
                self.scheduler.start();
            }
            _ => self.scheduler.stop(true),
        }
    }

    pub fn run_once(&mut self) {
        self.scheduler.run_once();
    }

    pub fn adjust_similarity(&mut self, delta: i16) {
        let next = (self.settings.similarity as i16 + delta).clamp(MIN_SIMILARITY as i16, MAX_SIMILARITY as i16) as u8;
        self.set_similarity(next);
    }

    fn set_similarity(&mut self, percent: u8) {
        self.settings.similarity = percent.clamp(MIN_SIMILARITY, MAX_SIMILARITY);
        self.scheduler.threshold().set(self.settings.threshold());
    }

    pub fn load_reference(&mut self, path: &Path) {
        match Frame::load(path) {
            Ok(frame) => {
                self.reference_size = Some((frame.width, frame.height));
                self.status_tx.publish(format!("Loaded image ({}x{}).", frame.width, frame.height));
                self.scheduler.set_reference(frame);
                self.settings.reference = Some(path.to_path_buf());
            }
            Err(e) => self.status_tx.publish(format!("Image load failed: {:#}", e)),
        }
    }

    /// Ctrl+V: take the reference image from the clipboard.
    pub fn paste_reference(&mut self) {
        let pasted = self.platform.clipboard_image();
        self.accept_pasted(pasted);
    }

    fn accept_pasted(&mut self, pasted: CoreResult<Option<Frame>>) {
        match pasted {
            Ok(Some(frame)) => {
                self.reference_size = Some((frame.width, frame.height));
                self.status_tx.publish(format!("Loaded image ({}x{}).", frame.width, frame.height));
                self.scheduler.set_reference(frame);
                // nothing on disk to restore next session
                self.settings.reference = None;
            }
            Ok(None) => self.status_tx.publish("Clipboard does not contain an image."),
            Err(e) => self.status_tx.publish(format!("Clipboard error: {}", e)),
        }
    }

    pub fn clear_reference(&mut self) {
        if self.phase() != RunPhase::Idle {
            self.status_tx.publish("Stop automation before clearing the image.");
            return;
        }
        self.scheduler.clear_reference();
        self.reference_size = None;
        self.settings.reference = None;
        self.status_tx.publish("Target image cleared.");
    }

    // -- region --

    pub fn select_region(&mut self) {
        let Some(listener) = self.platform.drag_listener() else {
            self.status_tx.publish("Region selection is not available on this platform.");
            return;
        };
        if !self.region_capture.begin_selection(listener) {
            self.status_tx.publish("Region selection already in progress.");
        }
    }

    pub fn use_full_screen(&mut self) {
        self.region_capture.use_full_screen(&self.region);
        self.region_view = None;
        self.settings.region = None;
    }

    // -- hotkeys --

    pub fn begin_hotkey_capture(&mut self, trigger: Trigger) {
        self.hotkeys.begin_capture(trigger);
    }

    pub fn toggle_scope(&mut self) {
        let next = match self.hotkeys.scope() {
            HotkeyScope::Focused => HotkeyScope::Global,
            HotkeyScope::Global => HotkeyScope::Focused,
        };
        // failures are already on the status line
        self.hotkeys.set_scope(next).ok();
        self.settings.set_binding(self.hotkeys.binding());
    }

    // -- action list --

    fn publish_sequence(&self) {
        self.scheduler.set_sequence(self.sequence.snapshot());
    }

    pub fn open_form(&mut self) {
        self.form = Some(ActionForm::new());
    }

    pub fn form_key(&mut self, key: &str, ch: Option<char>) {
        if key == "f2" {
            if let (Some(form), Some(at)) = (self.form.as_mut(), self.cursor) {
                form.fill_position(at);
            }
            return;
        }
        let default_delay = self.settings.default_delay_ms;
        let Some(form) = self.form.as_mut() else { return };
        match form.handle_key(key, ch, default_delay) {
            FormEvent::Pending => {}
            FormEvent::Cancelled => self.form = None,
            FormEvent::Submitted(Err(e)) => self.status_tx.publish(e.to_string()),
            FormEvent::Submitted(Ok(item)) => {
                let label = item.kind.label();
                match self.sequence.push(item) {
                    Ok(()) => {
                        self.selected = self.sequence.len() - 1;
                        self.publish_sequence();
                        self.status_tx.publish(format!("Added action '{}'.", label));
                        self.form = None;
                    }
                    Err(e) => self.status_tx.publish(e.to_string()),
                }
            }
        }
    }

    pub fn delete_selected(&mut self) {
        if self.sequence.is_empty() {
            self.status_tx.publish("No actions to delete.");
            return;
        }
        match self.sequence.remove(self.selected) {
            Some(removed) => {
                self.selected = self.selected.min(self.sequence.len().saturating_sub(1));
                self.publish_sequence();
                self.status_tx.publish(format!("Removed action '{}'.", removed.kind.label()));
            }
            None => self.status_tx.publish("Select an action to delete."),
        }
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.sequence.len() {
            self.selected += 1;
        }
    }

    // -- files --

    pub fn open_prompt(&mut self, purpose: PromptPurpose) {
        let initial = match purpose {
            PromptPurpose::LoadReference => self
                .settings
                .reference
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => self.sequence_path.clone(),
        };
        self.prompt = Some(PathPrompt::new(purpose, initial));
    }

    pub fn prompt_key(&mut self, key: &str, ch: Option<char>) {
        let Some(prompt) = self.prompt.as_mut() else { return };
        let purpose = prompt.purpose;
        match prompt.handle_key(key, ch) {
            FormEvent::Pending => {}
            FormEvent::Cancelled => {
                self.prompt = None;
                let msg = match purpose {
                    PromptPurpose::SaveSequence => "Save cancelled.",
                    PromptPurpose::LoadSequence => "Load cancelled.",
                    PromptPurpose::LoadReference => "Image load cancelled.",
                };
                self.status_tx.publish(msg);
            }
            FormEvent::Submitted(path) => {
                self.prompt = None;
                match purpose {
                    PromptPurpose::SaveSequence => self.save_sequence(&path),
                    PromptPurpose::LoadSequence => self.load_sequence(&path),
                    PromptPurpose::LoadReference => self.load_reference(Path::new(&path)),
                }
            }
        }
    }

    fn save_sequence(&mut self, path: &str) {
        self.sequence_path = path.to_string();
        let result = persist::save_sequence(
            Path::new(path),
            self.sequence.items(),
            self.region_view,
            self.settings.similarity,
        );
        match result {
            Ok(()) => self.status_tx.publish(format!("Saved {} actions.", self.sequence.len())),
            Err(e) => self.status_tx.publish(format!("Save failed: {}", e)),
        }
    }

    fn load_sequence(&mut self, path: &str) {
        self.sequence_path = path.to_string();
        let loaded = match persist::load_sequence(Path::new(path)) {
            Ok(l) => l,
            Err(e) => {
                self.status_tx.publish(format!("Load failed: {}", e));
                return;
            }
        };
        self.sequence.replace_all(loaded.actions);
        self.selected = 0;
        self.publish_sequence();
        if let Some(region) = loaded.region {
            self.region.set(Some(region));
            self.region_view = Some(region);
            self.settings.region = Some(region);
        }
        if let Some(similarity) = loaded.similarity {
            self.set_similarity(similarity);
        }
        let msg = if loaded.skipped > 0 {
            format!("Loaded {} actions from file ({} skipped).", self.sequence.len(), loaded.skipped)
        } else {
            format!("Loaded {} actions from file.", self.sequence.len())
        };
        self.status_tx.publish(msg);
    }

    // -- log panel --

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    // -- quit --

    pub fn request_quit(&mut self) {
        if self.phase() == RunPhase::Idle {
            self.should_quit = true;
        } else {
            self.confirm = Some(ConfirmDialog::new("Automation is running. Quit?"));
        }
    }

    pub fn confirm_key(&mut self, key: &str) {
        let Some(dialog) = self.confirm.as_mut() else { return };
        if let Some(yes) = dialog.handle_key(key) {
            self.confirm = None;
            self.should_quit = yes;
        }
    }
}
