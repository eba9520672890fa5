use std::sync::mpsc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::platform::{GlobalKeys, HotkeyHandle};
use crate::scheduler::Scheduler;
use crate::status::StatusSender;
use crate::types::{HotkeyScope, Trigger};

pub const DEFAULT_TOGGLE_KEY: &str = "f9";
pub const DEFAULT_ACTION_KEY: &str = "f10";

/// Key names are stored lower-case, e.g. `f9`, `x`, `space`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    pub toggle_key: String,
    pub action_key: String,
    pub scope: HotkeyScope,
}

impl Default for HotkeyBinding {
    fn default() -> Self {
        Self {
            toggle_key: DEFAULT_TOGGLE_KEY.to_string(),
            action_key: DEFAULT_ACTION_KEY.to_string(),
            scope: HotkeyScope::Focused,
        }
    }
}

impl HotkeyBinding {
    pub fn key_for(&self, trigger: Trigger) -> &str {
        match trigger {
            Trigger::Toggle => &self.toggle_key,
            Trigger::Action => &self.action_key,
        }
    }

    /// Toggle wins if both triggers share a key.
    pub fn trigger_for(&self, key: &str) -> Option<Trigger> {
        if key.eq_ignore_ascii_case(&self.toggle_key) {
            Some(Trigger::Toggle)
        } else if key.eq_ignore_ascii_case(&self.action_key) {
            Some(Trigger::Action)
        } else {
            None
        }
    }

    fn set(&mut self, trigger: Trigger, key: String) {
        match trigger {
            Trigger::Toggle => self.toggle_key = key,
            Trigger::Action => self.action_key = key,
        }
    }
}

/// Hand-off from OS callback threads to the interactive thread.
pub struct TriggerQueue {
    tx: mpsc::Sender<Trigger>,
    rx: mpsc::Receiver<Trigger>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> mpsc::Sender<Trigger> {
        self.tx.clone()
    }

    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<Trigger> {
        self.rx.try_iter().collect()
    }
}

impl Default for TriggerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not a hotkey; the caller may treat it as a regular key.
    Ignored,
    Fired(Trigger),
    Assigned(Trigger, String),
    CaptureCancelled,
}

pub struct HotkeyManager {
    binding: HotkeyBinding,
    capturing: Option<Trigger>,
    provider: Option<Arc<dyn GlobalKeys>>,
    handles: Vec<HotkeyHandle>,
    queue: TriggerQueue,
    status: StatusSender,
}

impl HotkeyManager {
    /// Starts in Focused scope; call `set_scope` to apply a saved Global scope.
    pub fn new(binding: HotkeyBinding, provider: Option<Arc<dyn GlobalKeys>>, status: StatusSender) -> Self {
        Self {
            binding: HotkeyBinding { scope: HotkeyScope::Focused, ..binding },
            capturing: None,
            provider,
            handles: Vec::new(),
            queue: TriggerQueue::new(),
            status: status.scoped("hotkey"),
        }
    }

    pub fn binding(&self) -> &HotkeyBinding {
        &self.binding
    }

    pub fn scope(&self) -> HotkeyScope {
        self.binding.scope
    }

    pub fn capturing(&self) -> Option<Trigger> {
        self.capturing
    }

    pub fn registered_count(&self) -> usize {
        self.handles.len()
    }

    /// Wait for the next key press to become the binding for `trigger`.
    /// Returns false if another capture is already waiting.
    pub fn begin_capture(&mut self, trigger: Trigger) -> bool {
        if self.capturing.is_some() {
            return false;
        }
        self.capturing = Some(trigger);
        self.status.publish(format!("Press a key for the {} hotkey (Esc to cancel).", trigger.label()));
        true
    }

    pub fn cancel_capture(&mut self) {
        if self.capturing.take().is_some() {
            self.status.publish("Hotkey assignment cancelled.");
        }
    }

    /// Feed a key press seen by the interactive window.
    pub fn on_key(&mut self, key: &str, text_input_focused: bool) -> KeyOutcome {
        if let Some(trigger) = self.capturing {
            if key.eq_ignore_ascii_case("esc") {
                self.cancel_capture();
                return KeyOutcome::CaptureCancelled;
            }
            self.capturing = None;
            let key = key.to_lowercase();
            self.binding.set(trigger, key.clone());
            self.status.publish(format!("{} hotkey set to {}.", trigger.label(), key.to_uppercase()));
            if self.binding.scope == HotkeyScope::Global {
                if let Err(e) = self.register_global() {
                    self.fall_back_to_focused(&e);
                }
            }
            return KeyOutcome::Assigned(trigger, key);
        }

        if self.binding.scope != HotkeyScope::Focused || text_input_focused {
            return KeyOutcome::Ignored;
        }
        match self.binding.trigger_for(key) {
            Some(trigger) => KeyOutcome::Fired(trigger),
            None => KeyOutcome::Ignored,
        }
    }

    pub fn set_scope(&mut self, scope: HotkeyScope) -> CoreResult<()> {
        match scope {
            HotkeyScope::Focused => {
                self.unregister_all();
                self.binding.scope = HotkeyScope::Focused;
                self.status.publish("Hotkeys limited to app window.");
                Ok(())
            }
            HotkeyScope::Global => match self.register_global() {
                Ok(()) => {
                    self.binding.scope = HotkeyScope::Global;
                    self.status.publish("Global hotkeys enabled.");
                    Ok(())
                }
                Err(e) => {
                    self.fall_back_to_focused(&e);
                    Err(e)
                }
            },
        }
    }

    fn fall_back_to_focused(&mut self, e: &CoreError) {
        self.unregister_all();
        self.binding.scope = HotkeyScope::Focused;
        self.status.publish(format!("Global hotkey error: {}", e));
    }

    fn register_global(&mut self) -> CoreResult<()> {
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| CoreError::Configuration("global hotkeys are not available on this platform".into()))?;
        self.unregister_all();
        for trigger in [Trigger::Toggle, Trigger::Action] {
            let tx = self.queue.sender();
            let key = self.binding.key_for(trigger).to_string();
            let handle = provider.register(&key, Box::new(move || {
                tx.send(trigger).ok();
            }))?;
            self.handles.push(handle);
        }
        Ok(())
    }

    fn unregister_all(&mut self) {
        if let Some(provider) = &self.provider {
            for handle in self.handles.drain(..) {
                provider.unregister(handle);
            }
        }
        self.handles.clear();
    }

    /// Triggers fired by the OS since the last call.
    pub fn drain(&self) -> Vec<Trigger> {
        self.queue.drain()
    }

    pub fn shutdown(&mut self) {
        self.capturing = None;
        self.unregister_all();
    }
}

/// Route a trigger to the scheduler. Runs on the interactive thread.
pub fn dispatch(trigger: Trigger, scheduler: &Scheduler) {
    match trigger {
        Trigger::Toggle => scheduler.toggle(),
        Trigger::Action => {
            scheduler.run_once();
        }
    }
}
