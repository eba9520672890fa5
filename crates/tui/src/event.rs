use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use spotter_core::types::Trigger;

use crate::App;
use crate::form::PromptPurpose;
use crate::ui;

/// Key names shared with hotkey bindings and the form handlers.
pub fn key_name(key: &KeyEvent) -> Option<String> {
    let name = match key.code {
        KeyCode::Char(' ') => "space".to_string(),
        KeyCode::Char(c) => c.to_lowercase().to_string(),
        KeyCode::F(n) => format!("f{}", n),
        KeyCode::Enter => "enter".into(),
        KeyCode::Esc => "esc".into(),
        KeyCode::Tab => "tab".into(),
        KeyCode::BackTab => "backtab".into(),
        KeyCode::Backspace => "backspace".into(),
        KeyCode::Delete => "delete".into(),
        KeyCode::Up => "up".into(),
        KeyCode::Down => "down".into(),
        KeyCode::Left => "left".into(),
        KeyCode::Right => "right".into(),
        KeyCode::Home => "home".into(),
        KeyCode::End => "end".into(),
        KeyCode::PageUp => "pageup".into(),
        KeyCode::PageDown => "pagedown".into(),
        _ => return None,
    };
    Some(name)
}

fn typed_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => Some(c),
        _ => None,
    }
}

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.tick();

        terminal.draw(|f| ui::draw(f, app))?;

        // Short poll so status, triggers and region results show up promptly
        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    handle_key(app, &key);
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_log_up(3),
                    MouseEventKind::ScrollDown => app.scroll_log_down(3),
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

pub fn handle_key(app: &mut App, key: &KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.request_quit();
        return;
    }
    let Some(name) = key_name(key) else { return };
    let ch = typed_char(key);

    if app.confirm.is_some() {
        app.confirm_key(&name);
        return;
    }
    if app.hotkeys.capturing().is_some() {
        app.offer_hotkey(&name);
        return;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('v') {
        app.paste_reference();
        return;
    }
    if app.form.is_some() {
        app.form_key(&name, ch);
        return;
    }
    if app.prompt.is_some() {
        app.prompt_key(&name, ch);
        return;
    }
    if app.offer_hotkey(&name) {
        return;
    }

    match name.as_str() {
        "q" => app.request_quit(),
        "s" => app.start_stop(),
        "m" => app.run_once(),
        "r" => app.select_region(),
        "f" => app.use_full_screen(),
        "h" => app.toggle_scope(),
        "t" => app.begin_hotkey_capture(Trigger::Toggle),
        "a" => app.begin_hotkey_capture(Trigger::Action),
        "e" | "n" => app.open_form(),
        "x" | "delete" => app.delete_selected(),
        "w" => app.open_prompt(PromptPurpose::SaveSequence),
        "o" => app.open_prompt(PromptPurpose::LoadSequence),
        "i" => app.open_prompt(PromptPurpose::LoadReference),
        "c" => app.clear_reference(),
        "l" => app.toggle_log(),
        "[" => app.adjust_similarity(-1),
        "]" => app.adjust_similarity(1),
        "{" => app.adjust_similarity(-5),
        "}" => app.adjust_similarity(5),
        "up" | "k" => app.move_up(),
        "down" | "j" => app.move_down(),
        "pageup" => app.scroll_log_up(10),
        "pagedown" => app.scroll_log_down(10),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn names_match_binding_vocabulary() {
        assert_eq!(key_name(&key(KeyCode::F(9))).as_deref(), Some("f9"));
        assert_eq!(key_name(&key(KeyCode::Char('Q'))).as_deref(), Some("q"));
        assert_eq!(key_name(&key(KeyCode::Char(' '))).as_deref(), Some("space"));
        assert_eq!(key_name(&key(KeyCode::BackTab)).as_deref(), Some("backtab"));
        assert_eq!(key_name(&key(KeyCode::PageDown)).as_deref(), Some("pagedown"));
        assert_eq!(key_name(&key(KeyCode::Insert)), None);
    }

    #[test]
    fn typed_char_ignores_control_chords() {
        assert_eq!(typed_char(&key(KeyCode::Char('x'))), Some('x'));
        assert_eq!(typed_char(&KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL)), None);
        assert_eq!(typed_char(&key(KeyCode::Enter)), None);
    }
}
