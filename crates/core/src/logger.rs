use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};
use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: Option<File>,
    tui_tx: Option<mpsc::Sender<String>>,
    prefixes: HashMap<String, u8>, // prefix -> color index
}

// Color indices for TUI rendering (mapped in ui.rs)
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_GREEN: u8 = 3;
pub const COLOR_MAGENTA: u8 = 4;

/// Initialize the global logger and truncate `app.log` in `log_dir`.
/// If the file cannot be opened, log lines still reach the TUI.
pub fn init(log_dir: &Path) {
    fs::create_dir_all(log_dir).ok();
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join("app.log"))
        .ok();

    LOGGER
        .set(Mutex::new(Logger { file, tui_tx: None, prefixes: HashMap::new() }))
        .ok();
}

/// Wire the TUI log channel.
pub fn set_tui_sender(tx: mpsc::Sender<String>) {
    if let Some(Ok(mut l)) = LOGGER.get().map(|l| l.lock()) {
        l.tui_tx = Some(tx);
    }
}

/// Register a prefix with a color used by `*_p` calls.
pub fn register_prefix(prefix: &str, color: u8) {
    if let Some(Ok(mut l)) = LOGGER.get().map(|l| l.lock()) {
        l.prefixes.insert(prefix.to_string(), color);
    }
}

/// File gets plain text; the TUI channel gets \x1f-separated fields:
/// level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage
fn write_log(level: &str, prefix: &str, msg: &str) {
    let Some(logger) = LOGGER.get() else { return };
    let Ok(mut l) = logger.lock() else { return };

    let ts = Local::now().format("%H:%M:%S").to_string();
    let color = l.prefixes.get(prefix).copied().unwrap_or(0);

    let file_line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level, msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
    };
    if let Some(file) = l.file.as_mut() {
        writeln!(file, "{}", file_line).ok();
    }

    if let Some(tx) = &l.tui_tx {
        tx.send(format!("{}\x1f{}\x1f{}\x1f{}\x1f{}", level, prefix, color, ts, msg)).ok();
    }
}

pub fn info(msg: &str) {
    write_log("INFO", "", msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", msg);
}

pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, msg);
}
