use std::io;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};

use anyhow::Result;
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use spotter_core::detect::{Detector, Threshold};
use spotter_core::hotkeys::HotkeyManager;
use spotter_core::platform::create_platform;
use spotter_core::region::RegionSlot;
use spotter_core::scheduler::{Scheduler, SchedulerConfig};
use spotter_core::settings::Settings;
use spotter_core::types::{Frame, HotkeyScope};
use spotter_core::{logger, status};

struct Args {
    force_stub: bool,
    reference: Option<PathBuf>,
    settings: Option<PathBuf>,
}

fn parse_args() -> Args {
    let mut args = Args { force_stub: false, reference: None, settings: None };
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--stub" => args.force_stub = true,
            "--reference" => args.reference = it.next().map(PathBuf::from),
            "--settings" => args.settings = it.next().map(PathBuf::from),
            other => eprintln!("ignoring unknown argument {}", other),
        }
    }
    args
}

fn main() -> Result<()> {
    let args = parse_args();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    logger::init(&cwd.join("logs"));

    let platform = create_platform(args.force_stub);

    let settings_path = args.settings.unwrap_or_else(|| cwd.join("settings.json"));
    let settings = Settings::load(&settings_path);

    let (log_tx, log_rx) = mpsc::channel::<String>();
    logger::set_tui_sender(log_tx);
    logger::info(&format!("spotter started on {} platform", platform.name()));

    let (status_tx, status_board) = status::channel();

    let region = RegionSlot::default();
    region.set(settings.region);

    let threshold = Arc::new(Threshold::from_percent(settings.similarity));
    let detector = Detector::new(platform.capture(), platform.matcher(), threshold);
    let config = SchedulerConfig { loop_delay: settings.loop_delay(), ..SchedulerConfig::default() };
    let scheduler = Scheduler::new(detector, platform.input(), region.clone(), status_tx.clone(), config);

    let mut settings = settings;
    if let Some(path) = args.reference.or_else(|| settings.reference.clone()) {
        match Frame::load(&path) {
            Ok(frame) => {
                logger::info(&format!("reference {} ({}x{})", path.display(), frame.width, frame.height));
                scheduler.set_reference(frame);
                settings.reference = Some(path);
            }
            Err(e) => {
                logger::warn(&format!("cannot load reference {}: {:#}", path.display(), e));
                settings.reference = None;
            }
        }
    }

    let mut hotkeys = HotkeyManager::new(settings.binding(), platform.global_keys(), status_tx.clone());
    if settings.scope == HotkeyScope::Global {
        // a failure leaves the manager in Focused scope and is on the status line
        hotkeys.set_scope(HotkeyScope::Global).ok();
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = spotter_tui::App::new(
        scheduler,
        hotkeys,
        platform,
        region,
        status_board,
        status_tx,
        settings,
        settings_path,
        log_rx,
    );

    let result = spotter_tui::event::run(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    app.scheduler.stop(true);
    app.hotkeys.shutdown();
    app.settings.set_binding(app.hotkeys.binding());
    app.settings.save(&app.settings_path);
    logger::info("spotter stopped");

    result
}
