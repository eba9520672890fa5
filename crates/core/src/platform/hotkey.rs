//! Process-wide global key observer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{CoreError, CoreResult};
use crate::logger;
use super::{GlobalKeys, HotkeyCallback, HotkeyHandle};

#[derive(Default)]
struct Registry {
    next: u64,
    entries: HashMap<u64, (String, Arc<HotkeyCallback>)>,
}

/// Key-name keyed callback table fed by one OS listener thread.
#[derive(Default)]
pub struct SystemKeys {
    registry: Mutex<Registry>,
    started: Mutex<bool>,
}

impl SystemKeys {
    fn new() -> Self {
        Self::default()
    }

    /// Invoke every callback bound to `key`. Callbacks run outside the lock.
    fn dispatch(&self, key: &str) {
        let callbacks: Vec<Arc<HotkeyCallback>> = match self.registry.lock() {
            Ok(reg) => reg.entries.values().filter(|(k, _)| k == key).map(|(_, cb)| cb.clone()).collect(),
            Err(_) => return,
        };
        for cb in callbacks {
            cb();
        }
    }

    fn ensure_listener(&'static self) -> CoreResult<()> {
        let mut started = self.started.lock().map_err(|_| CoreError::Configuration("hotkey state poisoned".into()))?;
        if !*started {
            start_listener(self)?;
            *started = true;
        }
        Ok(())
    }
}

impl GlobalKeys for &'static SystemKeys {
    fn register(&self, key: &str, callback: HotkeyCallback) -> CoreResult<HotkeyHandle> {
        if !is_observable(key) {
            return Err(CoreError::Configuration(format!("key '{}' cannot be observed globally", key)));
        }
        self.ensure_listener()?;
        let mut reg = self.registry.lock().map_err(|_| CoreError::Configuration("hotkey state poisoned".into()))?;
        reg.next += 1;
        let id = reg.next;
        reg.entries.insert(id, (key.to_lowercase(), Arc::new(callback)));
        logger::info_p("hotkey", &format!("registered global key {}", key));
        Ok(HotkeyHandle(id))
    }

    fn unregister(&self, handle: HotkeyHandle) {
        if let Ok(mut reg) = self.registry.lock() {
            if let Some((key, _)) = reg.entries.remove(&handle.0) {
                logger::info_p("hotkey", &format!("unregistered global key {}", key));
            }
        }
    }
}

static SYSTEM_KEYS: OnceLock<SystemKeys> = OnceLock::new();

/// The OS key observer, or `None` where global keys are unsupported.
pub fn system_keys() -> Option<Arc<dyn GlobalKeys>> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    let keys: &'static SystemKeys = SYSTEM_KEYS.get_or_init(SystemKeys::new);
    Some(Arc::new(keys))
}

/// Whether the listener can ever report `key`.
fn is_observable(key: &str) -> bool {
    let key = key.to_lowercase();
    (0..128).any(|code| key_name(code) == Some(key.as_str()))
}

/// macOS virtual keycode to the key names used by bindings.
fn key_name(keycode: i64) -> Option<&'static str> {
    Some(match keycode {
        0 => "a", 1 => "s", 2 => "d", 3 => "f", 4 => "h", 5 => "g", 6 => "z", 7 => "x",
        8 => "c", 9 => "v", 11 => "b", 12 => "q", 13 => "w", 14 => "e", 15 => "r",
        16 => "y", 17 => "t", 18 => "1", 19 => "2", 20 => "3", 21 => "4", 22 => "6",
        23 => "5", 25 => "9", 26 => "7", 28 => "8", 29 => "0", 31 => "o", 32 => "u",
        34 => "i", 35 => "p", 37 => "l", 38 => "j", 40 => "k", 45 => "n", 46 => "m",
        36 => "enter", 48 => "tab", 49 => "space", 51 => "backspace", 53 => "esc",
        122 => "f1", 120 => "f2", 99 => "f3", 118 => "f4", 96 => "f5", 97 => "f6",
        98 => "f7", 100 => "f8", 101 => "f9", 109 => "f10", 103 => "f11", 111 => "f12",
        123 => "left", 124 => "right", 125 => "down", 126 => "up",
        115 => "home", 119 => "end", 116 => "pageup", 121 => "pagedown",
        _ => return None,
    })
}

/// Listen-only CGEventTap on a dedicated run-loop thread. Key-down events
/// are translated to key names and dispatched to the registry.
#[cfg(target_os = "macos")]
fn start_listener(keys: &'static SystemKeys) -> CoreResult<()> {
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicPtr, Ordering};
    use std::sync::mpsc;

    use core_foundation::base::TCFType;
    use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
    use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};

    type CGEventTapProxy = *mut c_void;
    type CGEventRef = *mut c_void;
    type CGEventMask = u64;
    type CGEventType = u32;

    type CGEventTapCallBack =
        unsafe extern "C" fn(CGEventTapProxy, CGEventType, CGEventRef, *mut c_void) -> CGEventRef;

    const K_CG_HID_EVENT_TAP: u32 = 0;
    const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
    const K_CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;
    const CG_EVENT_KEY_DOWN: u32 = 10;
    const CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFFFFFE;
    const K_CG_KEYBOARD_EVENT_AUTOREPEAT: u32 = 8;
    const K_CG_KEYBOARD_EVENT_KEYCODE: u32 = 9;

    extern "C" {
        fn CGEventTapCreate(
            tap: u32,
            place: u32,
            options: u32,
            events_of_interest: CGEventMask,
            callback: CGEventTapCallBack,
            user_info: *mut c_void,
        ) -> *mut c_void;
        fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
        fn CGEventTapEnable(tap: *mut c_void, enable: bool);
    }

    static TAP: AtomicPtr<c_void> = AtomicPtr::new(std::ptr::null_mut());

    unsafe extern "C" fn on_event(
        _proxy: CGEventTapProxy,
        event_type: CGEventType,
        event: CGEventRef,
        user_info: *mut c_void,
    ) -> CGEventRef {
        unsafe {
            if event_type == CG_EVENT_TAP_DISABLED_BY_TIMEOUT {
                let tap = TAP.load(Ordering::Acquire);
                if !tap.is_null() {
                    CGEventTapEnable(tap, true);
                }
                return event;
            }
            if event_type != CG_EVENT_KEY_DOWN
                || CGEventGetIntegerValueField(event, K_CG_KEYBOARD_EVENT_AUTOREPEAT) != 0
            {
                return event;
            }
            let keycode = CGEventGetIntegerValueField(event, K_CG_KEYBOARD_EVENT_KEYCODE);
            if let Some(name) = key_name(keycode) {
                let keys = &*(user_info as *const SystemKeys);
                keys.dispatch(name);
            }
            event
        }
    }

    let (ready_tx, ready_rx) = mpsc::channel::<bool>();
    let user_info = keys as *const SystemKeys as usize;
    std::thread::Builder::new()
        .name("global-keys".into())
        .spawn(move || unsafe {
            let tap = CGEventTapCreate(
                K_CG_HID_EVENT_TAP,
                K_CG_HEAD_INSERT_EVENT_TAP,
                K_CG_EVENT_TAP_OPTION_LISTEN_ONLY,
                1 << CG_EVENT_KEY_DOWN,
                on_event,
                user_info as *mut c_void,
            );
            if tap.is_null() {
                ready_tx.send(false).ok();
                return;
            }
            let port = CFMachPort::wrap_under_create_rule(tap as CFMachPortRef);
            let Ok(source) = port.create_runloop_source(0) else {
                ready_tx.send(false).ok();
                return;
            };
            TAP.store(tap, Ordering::Release);
            CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes);
            CGEventTapEnable(tap, true);
            ready_tx.send(true).ok();
            CFRunLoop::run_current();
        })
        .map_err(|e| CoreError::Configuration(format!("cannot start key listener: {}", e)))?;

    match ready_rx.recv() {
        Ok(true) => {
            logger::info_p("hotkey", "global key listener started");
            Ok(())
        }
        _ => {
            logger::error_p("hotkey", "failed to create event tap, grant Accessibility permission to your terminal");
            Err(CoreError::Configuration(
                "failed to create event tap (grant Accessibility permission to your terminal)".into(),
            ))
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn start_listener(_keys: &'static SystemKeys) -> CoreResult<()> {
    Err(CoreError::Configuration("global hotkeys are not supported on this platform".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_reaches_matching_callbacks_only() {
        let keys = SystemKeys::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let mut reg = keys.registry.lock().unwrap();
            for (id, key) in [(1, "f9"), (2, "f10"), (3, "f9")] {
                let hits = hits.clone();
                let cb: HotkeyCallback = Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                });
                reg.entries.insert(id, (key.to_string(), Arc::new(cb)));
            }
        }
        keys.dispatch("f9");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        keys.dispatch("f11");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn keycodes_map_to_binding_names() {
        assert_eq!(key_name(101), Some("f9"));
        assert_eq!(key_name(109), Some("f10"));
        assert_eq!(key_name(53), Some("esc"));
        assert_eq!(key_name(0), Some("a"));
        assert_eq!(key_name(10), None);
    }

    #[test]
    fn unobservable_keys_are_refused_before_listening() {
        let keys: &'static SystemKeys = Box::leak(Box::new(SystemKeys::new()));
        for key in ["[", "]", "backtab", "delete", "{"] {
            let err = keys.register(key, Box::new(|| {})).unwrap_err();
            assert!(matches!(err, CoreError::Configuration(ref m) if m.contains("cannot be observed")));
        }
        assert!(!*keys.started.lock().unwrap());
        assert!(keys.registry.lock().unwrap().entries.is_empty());
        assert!(is_observable("F9") && is_observable("pagedown") && is_observable("a"));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn unsupported_platform_has_no_provider() {
        assert!(system_keys().is_none());
    }
}
