use std::ffi::c_void;
use std::process::{Command as ProcessCommand, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortInvalidate, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::display::CGDisplay;
use core_graphics::event::*;
use core_graphics::event_source::*;
use core_graphics::geometry::*;
use core_graphics::window::*;

use crate::error::{CoreError, CoreResult};
use crate::logger;
use crate::matching::NccMatcher;
use crate::sleep::sleep_ms;
use crate::types::*;
use super::*;

/// Give up on a region drag after this long.
const DRAG_TIMEOUT: Duration = Duration::from_secs(30);

// AppleScript key codes for named keys
fn applescript_key_code(key: &str) -> Option<u16> {
    match key {
        "enter" | "return" => Some(36),
        "escape" | "esc" => Some(53),
        "delete" | "backspace" => Some(51),
        "tab" => Some(48),
        "space" => Some(49),
        "up" => Some(126),
        "down" => Some(125),
        "left" => Some(123),
        "right" => Some(124),
        "home" => Some(115),
        "end" => Some(119),
        "pageup" => Some(116),
        "pagedown" => Some(121),
        "f1" => Some(122),
        "f2" => Some(120),
        "f3" => Some(99),
        "f4" => Some(118),
        "f5" => Some(96),
        "f6" => Some(97),
        "f7" => Some(98),
        "f8" => Some(100),
        "f9" => Some(101),
        "f10" => Some(109),
        "f11" => Some(103),
        "f12" => Some(111),
        _ => None,
    }
}

fn applescript_modifier(key: &str) -> Option<&'static str> {
    match key {
        "cmd" | "command" | "win" => Some("command down"),
        "shift" => Some("shift down"),
        "ctrl" | "control" => Some("control down"),
        "alt" | "option" => Some("option down"),
        _ => None,
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build the System Events command for one chord, e.g. `["ctrl", "t"]`.
fn chord_script(chord: &[String]) -> CoreResult<String> {
    let Some((main, mods)) = chord.split_last() else {
        return Err(CoreError::Injection("empty key chord".into()));
    };
    let mut modifiers: Vec<&str> = mods.iter().filter_map(|m| applescript_modifier(&m.to_lowercase())).collect();

    let main_lower = main.to_lowercase();
    if main.chars().count() == 1 && main.chars().all(|c| c.is_ascii_uppercase()) && !modifiers.contains(&"shift down") {
        modifiers.push("shift down");
    }
    let key_part = if let Some(code) = applescript_key_code(&main_lower) {
        format!("key code {}", code)
    } else if main_lower.chars().count() == 1 {
        format!("keystroke \"{}\"", escape_applescript(&main_lower))
    } else {
        return Err(CoreError::Injection(format!("unknown key: {}", main)));
    };

    let modifier_str = if modifiers.is_empty() {
        String::new()
    } else {
        format!(" using {{{}}}", modifiers.join(", "))
    };
    Ok(format!("tell application \"System Events\" to {}{}", key_part, modifier_str))
}

fn run_osascript(script: &str) -> CoreResult<()> {
    let status = ProcessCommand::new("osascript")
        .arg("-e")
        .arg(script)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| CoreError::Injection(format!("osascript: {}", e)))?;
    if !status.success() {
        return Err(CoreError::Injection(format!("osascript exited with {}", status)));
    }
    Ok(())
}

pub struct DarwinPlatform {
    capture: Arc<DarwinCapture>,
    matcher: Arc<NccMatcher>,
    input: Arc<DarwinInput>,
    drag: Arc<DarwinDrag>,
}

impl DarwinPlatform {
    pub fn new() -> Self {
        Self {
            capture: Arc::new(DarwinCapture),
            matcher: Arc::new(NccMatcher),
            input: Arc::new(DarwinInput),
            drag: Arc::new(DarwinDrag),
        }
    }
}

impl Platform for DarwinPlatform {
    fn name(&self) -> &'static str {
        "darwin"
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
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState).ok()?;
        let p = CGEvent::new(source).ok()?.location();
        Some(Point::new(p.x.round() as i32, p.y.round() as i32))
    }
}

struct DarwinCapture;

impl ScreenCapture for DarwinCapture {
    fn capture(&self, region: Option<Region>) -> CoreResult<(Frame, Point)> {
        let (bounds, origin) = match region {
            Some(r) => (
                CGRect::new(
                    &CGPoint::new(r.left as f64, r.top as f64),
                    &CGSize::new(r.width as f64, r.height as f64),
                ),
                r.origin(),
            ),
            None => (CGDisplay::main().bounds(), Point::default()),
        };

        let image = create_image(
            bounds,
            kCGWindowListOptionOnScreenOnly,
            kCGNullWindowID,
            kCGWindowImageNominalResolution,
        )
        .ok_or_else(|| CoreError::Capture("screen capture returned no image (check Screen Recording permission)".into()))?;

        let data = image.data();
        Ok((
            Frame {
                data: data.bytes().to_vec(),
                width: image.width() as u32,
                height: image.height() as u32,
                bytes_per_row: image.bytes_per_row() as u32,
            },
            origin,
        ))
    }
}

struct DarwinInput;

impl DarwinInput {
    fn source() -> CoreResult<CGEventSource> {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| CoreError::Injection("cannot create event source".into()))
    }

    fn post_mouse(kind: CGEventType, at: Point, button: CGMouseButton, clicks: i64) -> CoreResult<()> {
        let point = CGPoint::new(at.x as f64, at.y as f64);
        let event = CGEvent::new_mouse_event(Self::source()?, kind, point, button)
            .map_err(|_| CoreError::Injection(format!("cannot create mouse event at {}", at)))?;
        if clicks > 1 {
            event.set_integer_value_field(EventField::MOUSE_EVENT_CLICK_STATE, clicks);
        }
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn click_pair(button: MouseButton, at: Point, clicks: i64) -> CoreResult<()> {
        let (down, up, cg_button) = match button {
            MouseButton::Left => (CGEventType::LeftMouseDown, CGEventType::LeftMouseUp, CGMouseButton::Left),
            MouseButton::Right => (CGEventType::RightMouseDown, CGEventType::RightMouseUp, CGMouseButton::Right),
        };
        Self::post_mouse(down, at, cg_button, clicks)?;
        sleep_ms(15);
        Self::post_mouse(up, at, cg_button, clicks)?;
        sleep_ms(15);
        Ok(())
    }
}

impl InputInjector for DarwinInput {
    fn move_to(&self, at: Point) -> CoreResult<()> {
        Self::post_mouse(CGEventType::MouseMoved, at, CGMouseButton::Left, 1)
    }

    fn click(&self, button: MouseButton, at: Point) -> CoreResult<()> {
        self.move_to(at)?;
        Self::click_pair(button, at, 1)
    }

    fn double_click(&self, at: Point) -> CoreResult<()> {
        self.move_to(at)?;
        Self::click_pair(MouseButton::Left, at, 1)?;
        Self::click_pair(MouseButton::Left, at, 2)
    }

    fn type_text(&self, text: &str) -> CoreResult<()> {
        logger::info_p("darwin", &format!("type {} chars", text.chars().count()));
        run_osascript(&format!(
            "tell application \"System Events\" to keystroke \"{}\"",
            escape_applescript(text)
        ))
    }

    fn press_keys(&self, chord: &[String]) -> CoreResult<()> {
        run_osascript(&chord_script(chord)?)?;
        sleep_ms(50);
        Ok(())
    }
}

/// Blocks the calling thread on a listen-only tap until one left press
/// and the following release have been seen.
struct DarwinDrag;

#[derive(Default)]
struct DragState {
    press: Option<Point>,
    release: Option<Point>,
}

type CGEventTapCallBack = unsafe extern "C" fn(*mut c_void, u32, *mut c_void, *mut c_void) -> *mut c_void;

const K_CG_HID_EVENT_TAP: u32 = 0;
const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
const K_CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;
const CG_EVENT_LEFT_MOUSE_DOWN: u32 = 1;
const CG_EVENT_LEFT_MOUSE_UP: u32 = 2;

extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: CGEventTapCallBack,
        user_info: *mut c_void,
    ) -> *mut c_void;
    fn CGEventTapEnable(tap: *mut c_void, enable: bool);
    fn CGEventGetLocation(event: *mut c_void) -> CGPoint;
}

unsafe extern "C" fn on_mouse(
    _proxy: *mut c_void,
    event_type: u32,
    event: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void {
    unsafe {
        let state = &*(user_info as *const Mutex<DragState>);
        let p = CGEventGetLocation(event);
        let at = Point::new(p.x.round() as i32, p.y.round() as i32);
        if let Ok(mut s) = state.lock() {
            match event_type {
                CG_EVENT_LEFT_MOUSE_DOWN if s.press.is_none() => s.press = Some(at),
                CG_EVENT_LEFT_MOUSE_UP if s.press.is_some() => s.release = Some(at),
                _ => {}
            }
        }
        event
    }
}

impl DragListener for DarwinDrag {
    fn await_click_pair(&self) -> CoreResult<Option<(Point, Point)>> {
        let state = Box::new(Mutex::new(DragState::default()));
        let state_ptr = &*state as *const Mutex<DragState> as *mut c_void;

        let mask = (1u64 << CG_EVENT_LEFT_MOUSE_DOWN) | (1u64 << CG_EVENT_LEFT_MOUSE_UP);
        let tap = unsafe {
            CGEventTapCreate(
                K_CG_HID_EVENT_TAP,
                K_CG_HEAD_INSERT_EVENT_TAP,
                K_CG_EVENT_TAP_OPTION_LISTEN_ONLY,
                mask,
                on_mouse,
                state_ptr,
            )
        };
        if tap.is_null() {
            return Err(CoreError::Configuration(
                "failed to create mouse tap (grant Accessibility permission to your terminal)".into(),
            ));
        }
        let port = unsafe { CFMachPort::wrap_under_create_rule(tap as CFMachPortRef) };
        let source = port
            .create_runloop_source(0)
            .map_err(|_| CoreError::Configuration("cannot attach mouse tap to run loop".into()))?;
        let run_loop = CFRunLoop::get_current();
        let mode = unsafe { kCFRunLoopDefaultMode };
        run_loop.add_source(&source, mode);
        unsafe { CGEventTapEnable(tap, true) };

        let deadline = Instant::now() + DRAG_TIMEOUT;
        let result = loop {
            CFRunLoop::run_in_mode(mode, Duration::from_millis(100), true);
            let done = state.lock().map(|s| s.press.zip(s.release)).unwrap_or(None);
            if done.is_some() || Instant::now() >= deadline {
                break done;
            }
        };

        unsafe {
            CGEventTapEnable(tap, false);
            CFMachPortInvalidate(port.as_concrete_TypeRef());
        }
        run_loop.remove_source(&source, mode);

        if result.is_none() {
            logger::warn_p("darwin", "region drag timed out");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn chord_with_modifiers() {
        assert_eq!(
            chord_script(&chord(&["ctrl", "shift", "t"])).unwrap(),
            "tell application \"System Events\" to keystroke \"t\" using {control down, shift down}"
        );
    }

    #[test]
    fn named_keys_use_key_codes() {
        assert_eq!(
            chord_script(&chord(&["enter"])).unwrap(),
            "tell application \"System Events\" to key code 36"
        );
        assert_eq!(
            chord_script(&chord(&["cmd", "f9"])).unwrap(),
            "tell application \"System Events\" to key code 101 using {command down}"
        );
    }

    #[test]
    fn uppercase_letter_adds_shift() {
        assert_eq!(
            chord_script(&chord(&["A"])).unwrap(),
            "tell application \"System Events\" to keystroke \"a\" using {shift down}"
        );
    }

    #[test]
    fn unknown_key_is_an_injection_error() {
        assert!(matches!(chord_script(&chord(&["hyper"])), Err(CoreError::Injection(_))));
        assert!(chord_script(&[]).is_err());
    }
}
